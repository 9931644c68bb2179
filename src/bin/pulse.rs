//! Pulse CLI - Command-line interface for Mindful Pulse
//!
//! Commands:
//! - recommend: Recommend activities for a set of stress indicators
//! - score: Replay recorded sampler input and print channel scores
//! - stats: Compute meditation statistics from a session log
//! - record: Append a completed session to a session store
//! - doctor: Diagnose configuration and environment

use clap::{Parser, Subcommand, ValueEnum};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use mindful_pulse::config::PulseConfig;
use mindful_pulse::pipeline::recommend_for;
use mindful_pulse::sampler::facial::{decay_score, score_expressions, REQUIRED_NETWORKS};
use mindful_pulse::sampler::{TypingSampler, VoiceWindow};
use mindful_pulse::stats::compute_stats;
use mindful_pulse::store::{JsonFileDocumentStore, SessionStore, StaticIdentity, SESSIONS_COLLECTION};
use mindful_pulse::timer::CompletedSession;
use mindful_pulse::types::{MeditationSession, SessionType, StressIndicators, TimeRange};
use mindful_pulse::{PulseError, PRODUCER_NAME, PULSE_VERSION};

/// Pulse - stress scoring and meditation tracking
#[derive(Parser)]
#[command(name = "pulse")]
#[command(version = PULSE_VERSION)]
#[command(about = "Score stress signals, recommend activities and track meditation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recommend activities for the given stress indicators
    Recommend {
        /// Facial stress (0-100)
        #[arg(long)]
        facial: Option<f64>,

        /// Typing stress (0-100)
        #[arg(long)]
        typing: Option<f64>,

        /// Voice stress (0-100)
        #[arg(long)]
        voice: Option<f64>,

        /// External sentiment (0-1, 0.5 is neutral)
        #[arg(long)]
        sentiment: Option<f64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replay recorded sampler input and print one score per line
    Score {
        /// Channel to score
        #[arg(value_enum)]
        channel: ScoreChannel,

        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Configuration file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Compute statistics from a session log (NDJSON)
    Stats {
        /// Session log path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Reporting window (defaults to the configured range)
        #[arg(long, value_enum)]
        range: Option<RangeArg>,

        /// Evaluate the window at this RFC 3339 instant instead of now
        #[arg(long)]
        now: Option<String>,

        /// Configuration file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Record a completed session in a session store directory
    Record {
        /// Store directory
        #[arg(long)]
        store: PathBuf,

        /// Signed-in user id
        #[arg(long)]
        user: Option<String>,

        /// Session type (guided, silent, breathing)
        #[arg(long = "type")]
        session_type: String,

        /// Duration in minutes
        #[arg(long)]
        minutes: u32,

        /// Stress level at completion (0-100)
        #[arg(long)]
        stress: Option<f64>,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Configuration file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ScoreChannel {
    /// NDJSON, one frame per line: an array of emotion → probability maps
    Facial,
    /// NDJSON, one frame per line: an array of dB magnitudes
    Voice,
    /// One keydown timestamp (RFC 3339) per line
    Typing,
}

#[derive(Clone, Copy, ValueEnum)]
enum RangeArg {
    Week,
    Month,
    Year,
}

impl From<RangeArg> for TimeRange {
    fn from(range: RangeArg) -> Self {
        match range {
            RangeArg::Week => TimeRange::Week,
            RangeArg::Month => TimeRange::Month,
            RangeArg::Year => TimeRange::Year,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PulseCliError> {
    match cli.command {
        Commands::Recommend {
            facial,
            typing,
            voice,
            sentiment,
            json,
        } => cmd_recommend(
            StressIndicators {
                facial_stress: facial,
                typing_stress: typing,
                voice_stress: voice,
                sentiment,
            },
            json,
        ),

        Commands::Score {
            channel,
            input,
            config,
        } => cmd_score(channel, &input, config.as_deref()),

        Commands::Stats {
            input,
            range,
            now,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let range = range.map(TimeRange::from).unwrap_or(config.stats.default_range);
            cmd_stats(&input, range, now.as_deref())
        }

        Commands::Record {
            store,
            user,
            session_type,
            minutes,
            stress,
        } => cmd_record(&store, user, &session_type, minutes, stress),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

fn cmd_recommend(indicators: StressIndicators, json: bool) -> Result<(), PulseCliError> {
    let response = recommend_for(&indicators);

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("Mean stress: {:.1}", response.mean_stress);
    println!("{}", response.description);
    println!();
    for rec in &response.recommendations {
        println!(
            "  {} ({} min, {:?} intensity): {}",
            rec.title, rec.duration_minutes, rec.intensity, rec.description
        );
    }
    Ok(())
}

fn cmd_score(
    channel: ScoreChannel,
    input: &Path,
    config: Option<&Path>,
) -> Result<(), PulseCliError> {
    let config = load_config(config)?;
    let data = read_input(input)?;
    let lines = data
        .lines()
        .map(str::trim)
        .enumerate()
        .filter(|(_, line)| !line.is_empty());

    match channel {
        ScoreChannel::Facial => {
            let mut score = 0.0;
            for (index, line) in lines {
                let faces: Vec<HashMap<String, f64>> = parse_line(index, line)?;
                score = match faces.first() {
                    Some(expressions) => score_expressions(expressions),
                    None => decay_score(score, config.facial.no_face_decay),
                };
                println!("{}", serde_json::json!({ "frame": index, "stress": score }));
            }
        }
        ScoreChannel::Voice => {
            let mut window = VoiceWindow::new(config.voice.window_size);
            for (index, line) in lines {
                let spectrum: Vec<f32> = parse_line(index, line)?;
                window.push_spectrum(&spectrum);
                println!(
                    "{}",
                    serde_json::json!({ "frame": index, "stress": window.stress() })
                );
            }
        }
        ScoreChannel::Typing => {
            let mut sampler = TypingSampler::new(&config.typing);
            sampler.start();
            for (index, line) in lines {
                let at = parse_instant(line).map_err(|e| {
                    PulseCliError::ParseError(format!("line {}: {}", index + 1, e))
                })?;
                if let Some(sample) = sampler.record_key(at) {
                    println!("{}", serde_json::to_string(&sample)?);
                }
            }
        }
    }
    Ok(())
}

fn cmd_stats(input: &Path, range: TimeRange, now: Option<&str>) -> Result<(), PulseCliError> {
    let now = match now {
        Some(s) => parse_instant(s)?,
        None => Utc::now(),
    };
    let data = read_input(input)?;

    let mut sessions: Vec<MeditationSession> = Vec::new();
    for (index, line) in data.lines().map(str::trim).enumerate() {
        if line.is_empty() {
            continue;
        }
        sessions.push(parse_line(index, line)?);
    }
    debug!(count = sessions.len(), "sessions loaded");

    let stats = compute_stats(&sessions, range.window_start(now));
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn cmd_record(
    store: &Path,
    user: Option<String>,
    session_type: &str,
    minutes: u32,
    stress: Option<f64>,
) -> Result<(), PulseCliError> {
    let session_type: SessionType = session_type.parse()?;
    let identity = match user {
        Some(id) => StaticIdentity::signed_in(id),
        None => StaticIdentity::anonymous(),
    };

    let mut sessions = SessionStore::new(JsonFileDocumentStore::new(store), identity);
    let saved = sessions.record_session(
        &CompletedSession {
            session_type,
            duration_minutes: minutes,
            completed_at: Utc::now(),
        },
        stress,
    )?;

    println!("{}", serde_json::to_string_pretty(&saved)?);
    Ok(())
}

fn cmd_doctor(config_path: Option<&Path>, json: bool) -> Result<(), PulseCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "pulse_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Pulse version {}", PULSE_VERSION),
    });

    let config = match config_path {
        Some(path) => match PulseConfig::load(path) {
            Ok(config) => {
                checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!("Config file valid ({})", path.display()),
                });
                config
            }
            Err(e) => {
                checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: e.to_string(),
                });
                PulseConfig::default()
            }
        },
        None => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: "Using built-in defaults".to_string(),
            });
            PulseConfig::default()
        }
    };

    let model_path = &config.facial.model_path;
    let missing: Vec<&str> = REQUIRED_NETWORKS
        .iter()
        .copied()
        .filter(|name| !model_path.join(name).exists())
        .collect();
    checks.push(if !model_path.is_dir() {
        DoctorCheck {
            name: "models".to_string(),
            status: CheckStatus::Warning,
            message: format!(
                "Model directory {} not found; facial sampling unavailable",
                model_path.display()
            ),
        }
    } else if !missing.is_empty() {
        DoctorCheck {
            name: "models".to_string(),
            status: CheckStatus::Warning,
            message: format!("Missing networks: {}", missing.join(", ")),
        }
    } else {
        DoctorCheck {
            name: "models".to_string(),
            status: CheckStatus::Ok,
            message: format!("All networks present in {}", model_path.display()),
        }
    });

    if let Some(store) = &config.stats.store_path {
        let log = JsonFileDocumentStore::new(store).collection_path(SESSIONS_COLLECTION);
        checks.push(DoctorCheck {
            name: "store".to_string(),
            status: if log.exists() {
                CheckStatus::Ok
            } else {
                CheckStatus::Warning
            },
            message: format!("Session log {}", log.display()),
        });
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (replay input ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: PULSE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Pulse Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(PulseCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn load_config(path: Option<&Path>) -> Result<PulseConfig, PulseCliError> {
    match path {
        Some(path) => Ok(PulseConfig::load(path)?),
        None => Ok(PulseConfig::default()),
    }
}

fn read_input(input: &Path) -> Result<String, PulseCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn parse_line<T: serde::de::DeserializeOwned>(index: usize, line: &str) -> Result<T, PulseCliError> {
    serde_json::from_str(line)
        .map_err(|e| PulseCliError::ParseError(format!("line {}: {}", index + 1, e)))
}

fn parse_instant(s: &str) -> Result<DateTime<Utc>, PulseCliError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PulseCliError::ParseError(format!("invalid timestamp '{}': {}", s, e)))
}

// Error types

#[derive(Debug)]
enum PulseCliError {
    Io(io::Error),
    Pulse(PulseError),
    Json(serde_json::Error),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for PulseCliError {
    fn from(e: io::Error) -> Self {
        PulseCliError::Io(e)
    }
}

impl From<PulseError> for PulseCliError {
    fn from(e: PulseError) -> Self {
        PulseCliError::Pulse(e)
    }
}

impl From<serde_json::Error> for PulseCliError {
    fn from(e: serde_json::Error) -> Self {
        PulseCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PulseCliError> for CliError {
    fn from(e: PulseCliError) -> Self {
        match e {
            PulseCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PulseCliError::Pulse(e) => {
                let hint = match &e {
                    PulseError::AuthenticationRequired(_) => Some("Pass --user".to_string()),
                    PulseError::ConfigError(_) => Some("Run 'pulse doctor --config <file>'".to_string()),
                    PulseError::PersistenceFailure(_) => {
                        Some("Check that the store directory is writable".to_string())
                    }
                    _ => None,
                };
                CliError {
                    code: e.code().to_string(),
                    message: e.to_string(),
                    hint,
                }
            }
            PulseCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PulseCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            PulseCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
