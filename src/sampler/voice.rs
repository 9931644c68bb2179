//! Voice stress sampler
//!
//! Tracks loudness and the dominant spectral bin over a sliding window and
//! scores their level and variability.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::VoiceConfig;
use crate::error::PulseError;
use crate::sampler::lifecycle::{Generation, SamplerPhase, SamplerState, TickTicket};
use crate::sampler::{AudioDevice, MediaStream, SpectrumStream};
use crate::types::{clamp_stress, StressChannel, StressSample};

const VOLUME_WEIGHT: f64 = 0.7;
const FREQUENCY_WEIGHT: f64 = 0.3;
const VOLUME_MEAN_WEIGHT: f64 = 0.6;
const VOLUME_SPREAD_WEIGHT: f64 = 0.4;

/// Sliding window of linear volumes and dominant-frequency bins
#[derive(Debug, Clone)]
pub struct VoiceWindow {
    capacity: usize,
    volumes: VecDeque<f64>,
    frequencies: VecDeque<f64>,
}

impl VoiceWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            volumes: VecDeque::with_capacity(capacity),
            frequencies: VecDeque::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    pub fn clear(&mut self) {
        self.volumes.clear();
        self.frequencies.clear();
    }

    /// Add one analysis frame from a dB magnitude spectrum
    pub fn push_spectrum(&mut self, spectrum_db: &[f32]) {
        self.push(linear_volume(spectrum_db), dominant_bin(spectrum_db) as f64);
    }

    pub fn push(&mut self, volume: f64, frequency: f64) {
        self.volumes.push_back(volume);
        self.frequencies.push_back(frequency);
        while self.volumes.len() > self.capacity {
            self.volumes.pop_front();
            self.frequencies.pop_front();
        }
    }

    /// Stress over the current window; 0 until two frames are present.
    ///
    /// Formula:
    /// ```text
    /// volume_stress    = 100 * (0.6 * mean(vol) + 0.4 * std(vol))
    /// frequency_stress = 100 * std(freq) / mean(freq)
    /// stress           = round(0.7 * volume_stress + 0.3 * frequency_stress)
    /// ```
    pub fn stress(&self) -> f64 {
        if self.volumes.len() < 2 || self.frequencies.len() < 2 {
            return 0.0;
        }

        let volume_stress = (mean(&self.volumes) * VOLUME_MEAN_WEIGHT
            + std_dev(&self.volumes) * VOLUME_SPREAD_WEIGHT)
            * 100.0;

        let mean_frequency = mean(&self.frequencies);
        let frequency_stress = if mean_frequency > 0.0 {
            std_dev(&self.frequencies) / mean_frequency * 100.0
        } else {
            0.0
        };

        clamp_stress((volume_stress * VOLUME_WEIGHT + frequency_stress * FREQUENCY_WEIGHT).round())
    }
}

/// Mean magnitude in dB converted to a linear amplitude
pub fn linear_volume(spectrum_db: &[f32]) -> f64 {
    if spectrum_db.is_empty() {
        return 0.0;
    }
    let mean_db = spectrum_db.iter().map(|v| *v as f64).sum::<f64>() / spectrum_db.len() as f64;
    let linear = 10f64.powf(mean_db / 20.0);
    if linear.is_finite() {
        linear
    } else {
        0.0
    }
}

/// Index of the loudest bin; the first maximum wins
pub fn dominant_bin(spectrum_db: &[f32]) -> usize {
    let mut best = 0;
    let mut max = f32::NEG_INFINITY;
    for (i, value) in spectrum_db.iter().enumerate() {
        if *value > max {
            max = *value;
            best = i;
        }
    }
    best
}

fn mean(values: &VecDeque<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
fn std_dev(values: &VecDeque<f64>) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Microphone-backed voice sampler
///
/// Unlike the facial sampler there is no model to load: the sampler starts
/// in `Loaded` and emits a score on every tick.
pub struct VoiceSampler<S: SpectrumStream> {
    state: SamplerState<S>,
    generation: Generation,
    window: VoiceWindow,
    spectrum: Vec<f32>,
    score: f64,
}

impl<S: SpectrumStream> VoiceSampler<S> {
    pub fn new(config: &VoiceConfig) -> Self {
        Self {
            state: SamplerState::Loaded,
            generation: Generation::default(),
            window: VoiceWindow::new(config.window_size),
            spectrum: Vec::new(),
            score: 0.0,
        }
    }

    pub fn phase(&self) -> SamplerPhase {
        self.state.phase()
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn window(&self) -> &VoiceWindow {
        &self.window
    }

    /// Acquire the microphone. Returns the live ticket if already recording.
    pub fn start<D>(&mut self, device: &mut D) -> Result<TickTicket, PulseError>
    where
        D: AudioDevice<Stream = S>,
    {
        if let Some(ticket) = self.state.ticket() {
            return Ok(ticket);
        }

        let stream = device.open_audio().map_err(|e| {
            warn!(error = %e, "microphone unavailable");
            e
        })?;

        let ticket = self.generation.next_ticket();
        self.window.clear();
        self.state = SamplerState::Streaming { stream, ticket };
        info!("voice sampling started");
        Ok(ticket)
    }

    /// Analyse the current spectrum and emit a score.
    ///
    /// A read failure stops the sampler and releases the microphone.
    pub fn tick(
        &mut self,
        ticket: TickTicket,
        now: DateTime<Utc>,
    ) -> Result<Option<StressSample>, PulseError> {
        if !self.generation.is_current(ticket) {
            debug!("ignoring stale voice tick");
            return Ok(None);
        }
        let Some(stream) = self.state.live_stream(ticket) else {
            return Ok(None);
        };

        self.spectrum.clear();
        if let Err(e) = stream.frequency_data(&mut self.spectrum) {
            warn!(error = %e, "audio analysis failed, stopping sampler");
            self.stop();
            return Err(e);
        }

        self.window.push_spectrum(&self.spectrum);
        self.score = self.window.stress();
        debug!(score = self.score, frames = self.window.len(), "voice score updated");

        Ok(Some(StressSample::new(StressChannel::Voice, self.score, now)))
    }

    /// Release the microphone, clear history and invalidate tickets. Idempotent.
    pub fn stop(&mut self) {
        self.generation.invalidate();
        if let Some(mut stream) = self.state.take_stream() {
            stream.stop();
            info!("voice sampling stopped");
        }
        self.window.clear();
    }
}

impl<S: SpectrumStream> Drop for VoiceSampler<S> {
    fn drop(&mut self) {
        self.stop();
    }
}
