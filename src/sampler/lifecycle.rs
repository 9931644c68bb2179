//! Sampler lifecycle state
//!
//! ```text
//! Unloaded -> Loaded -> Streaming -> Loaded
//!     \-> Failed -> (reload) -> Loaded
//! ```
//!
//! A stream handle only exists inside `Streaming`, so "streaming without a
//! loaded model" cannot be represented.

/// Proof that a tick belongs to the current streaming run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickTicket {
    generation: u64,
}

/// Lifecycle of a hardware-backed sampler owning stream handle `S`
#[derive(Debug)]
pub enum SamplerState<S> {
    /// Prerequisites (models) not loaded yet
    Unloaded,
    /// Ready to acquire a stream
    Loaded,
    /// Stream acquired and ticking
    Streaming { stream: S, ticket: TickTicket },
    /// Prerequisite load failed; sampling is blocked until a reload succeeds
    Failed { reason: String },
}

/// Copyable view of [`SamplerState`] for status reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplerPhase {
    Unloaded,
    Loaded,
    Streaming,
    Failed,
}

impl<S> SamplerState<S> {
    pub fn phase(&self) -> SamplerPhase {
        match self {
            SamplerState::Unloaded => SamplerPhase::Unloaded,
            SamplerState::Loaded => SamplerPhase::Loaded,
            SamplerState::Streaming { .. } => SamplerPhase::Streaming,
            SamplerState::Failed { .. } => SamplerPhase::Failed,
        }
    }

    /// Stream handle if `ticket` is the live one
    pub fn live_stream(&mut self, ticket: TickTicket) -> Option<&mut S> {
        match self {
            SamplerState::Streaming {
                stream,
                ticket: current,
            } if *current == ticket => Some(stream),
            _ => None,
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, SamplerState::Streaming { .. })
    }

    /// Current ticket while streaming
    pub fn ticket(&self) -> Option<TickTicket> {
        match self {
            SamplerState::Streaming { ticket, .. } => Some(*ticket),
            _ => None,
        }
    }

    /// Leave `Streaming` and hand back the stream so the caller can release it.
    ///
    /// Any other state is left untouched.
    pub fn take_stream(&mut self) -> Option<S> {
        if !self.is_streaming() {
            return None;
        }
        match std::mem::replace(self, SamplerState::Loaded) {
            SamplerState::Streaming { stream, .. } => Some(stream),
            _ => None,
        }
    }
}

/// Monotonic ticket issuer
#[derive(Debug, Default)]
pub struct Generation {
    current: u64,
}

impl Generation {
    /// Invalidate every ticket issued so far and return a fresh one
    pub fn next_ticket(&mut self) -> TickTicket {
        self.current = self.current.wrapping_add(1);
        TickTicket {
            generation: self.current,
        }
    }

    /// Invalidate every ticket issued so far
    pub fn invalidate(&mut self) {
        self.current = self.current.wrapping_add(1);
    }

    pub fn is_current(&self, ticket: TickTicket) -> bool {
        ticket.generation == self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tickets_are_invalidated() {
        let mut generation = Generation::default();
        let first = generation.next_ticket();
        assert!(generation.is_current(first));

        generation.invalidate();
        assert!(!generation.is_current(first));

        let second = generation.next_ticket();
        assert_ne!(first, second);
        assert!(generation.is_current(second));
    }

    #[test]
    fn test_live_stream_requires_matching_ticket() {
        let mut generation = Generation::default();
        let stale = generation.next_ticket();
        let ticket = generation.next_ticket();
        let mut state = SamplerState::Streaming {
            stream: 7u8,
            ticket,
        };

        assert!(state.live_stream(stale).is_none());
        assert_eq!(state.live_stream(ticket).copied(), Some(7));
    }

    #[test]
    fn test_take_stream_returns_to_loaded() {
        let mut generation = Generation::default();
        let mut state = SamplerState::Streaming {
            stream: "camera",
            ticket: generation.next_ticket(),
        };

        assert_eq!(state.take_stream(), Some("camera"));
        assert_eq!(state.phase(), SamplerPhase::Loaded);
        assert_eq!(state.take_stream(), None);

        let mut failed: SamplerState<&str> = SamplerState::Failed {
            reason: "missing".to_string(),
        };
        assert_eq!(failed.take_stream(), None);
        assert_eq!(failed.phase(), SamplerPhase::Failed);
    }
}
