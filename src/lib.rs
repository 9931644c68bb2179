//! Mindful Pulse - On-device stress scoring and meditation tracking
//!
//! Pulse turns raw interaction signals into a stress estimate and acts on it:
//! samplers (facial expression, typing cadence, voice spectrum) → aggregation
//! → activity recommendations → session timers → session store and statistics.
//!
//! ## Modules
//!
//! - **Sampling**: caller-driven samplers for each stress channel
//! - **Scoring**: weighted aggregation and catalog-based recommendations
//! - **Sessions**: countdown, guided and breathing timers plus persistence

pub mod aggregator;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod recommend;
pub mod sampler;
pub mod stats;
pub mod store;
pub mod timer;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use aggregator::{overall_stress, StressAggregator};
pub use config::PulseConfig;
pub use error::PulseError;
pub use pipeline::{recommend_json, StressProcessor, StressReport};
pub use recommend::{describe_stress_level, recommend, CATALOG};
pub use stats::compute_stats;
pub use store::{DocumentStore, IdentityProvider, SessionStore};
pub use timer::{BreathingCycle, CompletedSession, CountdownTimer, GuidedSession, TimerEvent};

/// Pulse version reported by the CLI and FFI
pub const PULSE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "mindful-pulse";
