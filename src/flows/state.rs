//! Flow State
//!
//! Lifecycle of one interaction.

/// Interaction state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FlowState {
    /// Nothing started.
    #[default]
    Idle,
    /// `interact`/`introspect` in flight.
    Interacting,
    /// A response is current and waits for the caller's next step.
    AwaitingRemediation,
    /// Token exchange in flight.
    Exchanging,
    Succeeded,
    Failed,
    Cancelled,
}

impl FlowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Interacting => "interacting",
            Self::AwaitingRemediation => "awaiting_remediation",
            Self::Exchanging => "exchanging",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Absorbing states: only `start` leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Whether `start` is allowed.
    pub fn can_start(&self) -> bool {
        *self == Self::Idle || self.is_terminal()
    }

    /// Whether an operation is on the wire.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Interacting | Self::Exchanging)
    }
}

impl std::fmt::Display for FlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_allowed_from_idle_and_terminal_states() {
        assert!(FlowState::Idle.can_start());
        assert!(FlowState::Failed.can_start());
        assert!(FlowState::Cancelled.can_start());
        assert!(FlowState::Succeeded.can_start());
        assert!(!FlowState::AwaitingRemediation.can_start());
        assert!(!FlowState::Interacting.can_start());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!FlowState::Exchanging.is_terminal());
        assert!(FlowState::Exchanging.is_busy());
        assert_eq!(FlowState::AwaitingRemediation.to_string(), "awaiting_remediation");
    }
}
