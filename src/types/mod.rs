//! IDX Types
//!
//! Configuration, persisted context, tokens and callback types.

pub mod callback;
pub mod config;
pub mod context;
pub mod token;

pub use callback::*;
pub use config::*;
pub use context::*;
pub use token::*;
