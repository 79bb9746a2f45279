//! IDX Core Components
//!
//! Core infrastructure for IDX operations.

pub mod endpoints;
pub mod pkce;
pub mod state;
pub mod transport;

pub use endpoints::*;
pub use pkce::*;
pub use state::*;
pub use transport::*;
