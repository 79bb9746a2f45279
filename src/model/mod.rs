//! Response Model
//!
//! Typed view of an IDX response: remediations with their forms,
//! authenticators and messages.

pub mod authenticator;
pub mod field;
pub mod message;
pub mod remediation;
pub mod response;

pub use authenticator::*;
pub use field::*;
pub use message::*;
pub use remediation::*;
pub use response::*;
