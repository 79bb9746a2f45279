//! Flow Events
//!
//! Notifications a flow emits while it runs. Listeners are called in
//! registration order on the task that produced the event; a
//! [`ChannelListener`] moves delivery onto whatever task drains its
//! receiver.

use tokio::sync::mpsc;

use crate::flows::FlowState;
use crate::model::Response;
use crate::types::Token;

/// Something observable happened in a flow.
#[derive(Clone, Debug)]
pub enum FlowEvent {
    /// The flow moved between states.
    StateChanged { from: FlowState, to: FlowState },
    /// A new response became current.
    Response(Response),
    /// The interaction ended with tokens.
    Token(Token),
    /// An operation failed.
    Error { code: &'static str, message: String },
}

impl FlowEvent {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "state_changed",
            Self::Response(_) => "response",
            Self::Token(_) => "token",
            Self::Error { .. } => "error",
        }
    }
}

/// Receiver of flow events.
#[cfg_attr(test, mockall::automock)]
pub trait FlowListener: Send + Sync {
    fn on_event(&self, event: &FlowEvent);
}

/// Forwards events into an unbounded channel.
pub struct ChannelListener {
    sender: mpsc::UnboundedSender<FlowEvent>,
}

impl ChannelListener {
    /// Listener plus the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FlowEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl FlowListener for ChannelListener {
    fn on_event(&self, event: &FlowEvent) {
        // receiver gone: nobody is listening any more
        let _ = self.sender.send(event.clone());
    }
}
