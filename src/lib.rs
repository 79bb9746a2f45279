//! IDX Integration Module
//!
//! Client for the Okta Interaction Code ("IDX") flow: a server-driven,
//! multi-step sign-in where every response lists the remediations (next
//! steps) the user can take, and a successful interaction ends in an OAuth2
//! token exchange.
//!
//! # Features
//!
//! - `interact` / `introspect` with PKCE and a `state` nonce
//! - Typed remediations, forms and authenticators parsed per protocol version
//! - Capabilities: send/resend/recover, polling, social IDP redirects,
//!   WebAuthn, Duo, profile and password policy, plus injectable extensions
//! - Token exchange from a success response or a redirect callback
//! - Persistable interaction context for resuming after a restart
//!
//! # Example
//!
//! ```rust,ignore
//! use idx_integration::{create_interaction_code_flow, idx_config, InteractionCodeFlow};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = idx_config()
//!         .issuer("https://example.okta.com/oauth2/default")
//!         .client_id("0oa3en4fIMQ3ddc204w5")
//!         .redirect_uri("com.example.app:/callback")
//!         .add_scope("openid")
//!         .add_scope("profile")
//!         .build()?;
//!
//!     let flow = create_interaction_code_flow(config)?;
//!     let response = flow.start(None).await?;
//!
//!     let mut identify = response.remediations.get("identify").cloned().unwrap();
//!     identify.set_value("identifier", "mary@example.com")?;
//!     let mut response = identify.proceed().await?;
//!
//!     while !response.is_login_successful() {
//!         // render response.remediations, collect input, proceed ...
//!         # break;
//!     }
//!
//!     let token = flow.exchange_code(&response).await?;
//!     println!("{:?}", token);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: configuration, interaction context, tokens, redirect callbacks
//! - `error`: error hierarchy
//! - `core`: HTTP transport, PKCE, endpoint derivation, state nonce
//! - `model`: responses, remediations, forms, authenticators, messages
//! - `capability`: optional behaviors of remediations and authenticators
//! - `parser`: version-keyed response decoding
//! - `flows`: the interaction code state machine and token exchange
//! - `builders`: fluent configuration builder
//! - `fixtures`: canned server documents for tests

pub mod builders;
pub mod capability;
pub mod core;
pub mod error;
pub mod fixtures;
pub mod flows;
pub mod model;
pub mod parser;
pub mod types;

// Re-export builders
pub use builders::{idx_config, IdxConfigBuilder};

// Re-export errors
pub use error::{
    create_error_from_response, map_token_error, parse_error_response, ConfigurationError,
    FlowError, IdxError, IdxResult, NetworkError, OAuth2ErrorResponse, ProtocolError,
    ProviderError, ValidationError,
};

// Re-export types
pub use types::{
    CallbackParams, Context, IdxConfig, IdxConfigFile, RedirectResult, Token, TokenResponse,
};

// Re-export core components
pub use core::{
    // Transport
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockHttpTransport,
    ReqwestHttpTransport,
    // PKCE
    DefaultPkceGenerator, MockPkceGenerator, PkceGenerator, PkceMethod, PkceParams,
    // Endpoints
    IdxEndpoints,
};

// Re-export the response model
pub use model::{
    App, Authenticator, AuthenticatorCollection, AuthenticatorKind, AuthenticatorMethod,
    AuthenticatorState, Field, FieldValue, Form, Intent, Message, MessageCollection,
    MessageSeverity, Remediation, RemediationCollection, RemediationHandler, RemediationKind,
    Response, User,
};

// Re-export capabilities
pub use capability::{
    Capability, CapabilityCollection, CapabilityFactory, CapabilityType, Duo,
    ExtensionCapability, PasswordSettings, Pollable, Profile, Recoverable, Resendable, Sendable,
    SocialIdp, SocialIdpService, WebAuthnAuthentication, WebAuthnRegistration,
};

// Re-export parsing
pub use parser::{ParseContext, ResponseDecoder, ResponseParser, V1Decoder};

// Re-export flows
pub use flows::{
    create_interaction_code_flow, ChannelListener, FlowEvent, FlowListener, FlowState,
    InteractionCodeFlow, InteractionCodeFlowImpl,
};
