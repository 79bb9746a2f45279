//! IDX Flows
//!
//! The interaction code state machine and the pieces it is built from:
//!
//! - **Interaction Code Flow**: `interact`, `introspect`, remediation
//!   submission, cancellation and redirect handling
//! - **Token Exchange**: `grant_type=interaction_code` requests
//! - **Events**: state, response, token and error notifications

pub mod events;
pub mod interaction_code;
pub mod state;
pub mod token_exchange;

pub use events::{ChannelListener, FlowEvent, FlowListener};
pub use interaction_code::{
    create_interaction_code_flow, InteractionCodeFlow, InteractionCodeFlowImpl,
};
pub use state::FlowState;

#[cfg(test)]
pub use events::MockFlowListener;
