//! Stress signal samplers
//!
//! Each sampler reads one raw input (camera frames, key events, microphone
//! spectrum) and emits normalized [`StressSample`](crate::types::StressSample)s.
//!
//! Samplers never spawn threads or timers. The host drives them by calling
//! `tick` from its own redraw or interval loop, passing the [`TickTicket`]
//! returned by `start`. Stopping a sampler releases its hardware handle and
//! invalidates the ticket, so a tick that was already scheduled becomes a no-op.

pub mod facial;
pub mod lifecycle;
pub mod typing;
pub mod voice;

pub use facial::{DisplaySmoother, EmotionClassifier, FaceDetection, FacialSampler};
pub use lifecycle::{SamplerPhase, SamplerState, TickTicket};
pub use typing::{KeyEventSource, ManualKeySource, TypingSampler};
pub use voice::{VoiceSampler, VoiceWindow};

use crate::error::PulseError;

/// A hardware stream handle that must be released deterministically
pub trait MediaStream {
    /// Stop all tracks and release the underlying device
    fn stop(&mut self);
}

/// Camera stream yielding frames for the facial classifier
pub trait VideoStream: MediaStream {
    type Frame;

    /// Latest frame, or `None` when no frame is ready yet
    fn read_frame(&mut self) -> Option<Self::Frame>;
}

/// Host environment granting exclusive camera access
pub trait VideoDevice {
    type Stream: VideoStream;

    /// Request the camera; permission refusal maps to `PulseError::PermissionDenied`
    fn open_video(&mut self) -> Result<Self::Stream, PulseError>;
}

/// Microphone stream exposing frequency-domain magnitudes
pub trait SpectrumStream: MediaStream {
    /// Fill `out` with the current magnitude spectrum in dB
    fn frequency_data(&mut self, out: &mut Vec<f32>) -> Result<(), PulseError>;
}

/// Host environment granting exclusive microphone access
pub trait AudioDevice {
    type Stream: SpectrumStream;

    /// Request the microphone; permission refusal maps to `PulseError::PermissionDenied`
    fn open_audio(&mut self) -> Result<Self::Stream, PulseError>;
}
