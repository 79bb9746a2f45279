//! IDX Error Types
//!
//! Error hierarchy for the interaction code flow.
//!
//! Server-reported business failures (wrong password, locked account) are not
//! errors: they arrive as [`Message`](crate::model::Message)s inside a
//! successfully parsed [`Response`](crate::model::Response).

use std::time::Duration;
use thiserror::Error;

/// Root error type for IDX operations.
#[derive(Error, Debug)]
pub enum IdxError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl IdxError {
    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "IDX_CONFIG",
            Self::Network(_) => "IDX_NETWORK",
            Self::Protocol(_) => "IDX_PROTOCOL",
            Self::Validation(_) => "IDX_VALIDATION",
            Self::Flow(_) => "IDX_FLOW",
            Self::Provider(_) => "IDX_PROVIDER",
        }
    }

    /// Check if the error is worth retrying by the caller.
    ///
    /// The flow itself never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_retryable(),
            Self::Flow(FlowError::OperationInProgress) => true,
            Self::Provider(ProviderError::ServerError { .. }) => true,
            Self::Provider(ProviderError::TemporarilyUnavailable { .. }) => true,
            _ => false,
        }
    }

    /// Get retry-after duration if applicable.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Provider(ProviderError::TemporarilyUnavailable { retry_after }) => *retry_after,
            Self::Network(NetworkError::RateLimited { retry_after }) => {
                Some(Duration::from_secs(*retry_after as u64))
            }
            _ => None,
        }
    }

    /// Check if the caller can fix its input and call `proceed` again.
    pub fn is_locally_recoverable(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if the interaction must be started again from scratch.
    pub fn needs_restart(&self) -> bool {
        match self {
            Self::Flow(FlowError::NotAuthenticating) => true,
            Self::Flow(FlowError::StaleRemediation { .. }) => true,
            Self::Provider(ProviderError::InvalidGrant { .. }) => true,
            _ => false,
        }
    }
}

/// Configuration error.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid issuer URL: {url}")]
    InvalidIssuer { url: String },

    #[error("Invalid redirect URI: {url}")]
    InvalidRedirectUri { url: String },

    #[error("Unsupported protocol version: {version}")]
    UnsupportedVersion { version: String },
}

/// Network/transport error.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request timeout after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("TLS error: {message}")]
    TlsError { message: String },

    #[error("Rate limited, retry after {retry_after} seconds")]
    RateLimited { retry_after: u32 },
}

impl NetworkError {
    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::TlsError { .. })
    }
}

/// Protocol/response error.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Cannot create request: {message}")]
    CannotCreateRequest { message: String },

    #[error("Invalid response data: {message}")]
    InvalidResponseData { message: String },

    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },

    #[error("Unsupported response version: {version}")]
    UnsupportedVersion { version: String },

    #[error("Unknown remediation option: {name}")]
    UnknownRemediationOption { name: String },

    #[error("Missing capability: {name}")]
    MissingCapability { name: String },

    #[error("Success response missing")]
    SuccessResponseMissing,

    #[error("Unexpected redirect to: {location}")]
    UnexpectedRedirect { location: String },

    #[error("Response too large: {size} bytes")]
    ResponseTooLarge { size: usize },

    #[error("Unexpected HTTP status {status}")]
    UnexpectedStatus { status: u16 },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

/// Form validation error, raised before any network call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required parameter: {name}")]
    MissingRequiredParameter { name: String },

    #[error("Invalid parameter: {name}")]
    InvalidParameter { name: String },

    #[error("Parameter is immutable: {name}")]
    ImmutableParameter { name: String },

    #[error("Invalid option for parameter {name}")]
    InvalidOption { name: String },
}

/// Flow state-machine error.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Operation {operation} is not valid in state {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("Another operation is already in progress")]
    OperationInProgress,

    #[error("No interaction is in progress")]
    NotAuthenticating,

    #[error("Operation was superseded by a cancel or restart")]
    Superseded,

    #[error("Remediation {name} belongs to a superseded response")]
    StaleRemediation { name: String },

    #[error("Redirect could not be exchanged: {reason}")]
    InvalidRedirect { reason: String },
}

/// Provider (authorization server) error.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Invalid client credentials")]
    InvalidClient { error_description: Option<String> },

    #[error("Invalid grant: {message}")]
    InvalidGrant { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Invalid scope: {scope}")]
    InvalidScope { scope: String },

    #[error("Unauthorized client for this grant type")]
    UnauthorizedClient { error_description: Option<String> },

    #[error("Unsupported grant type: {grant_type}")]
    UnsupportedGrantType { grant_type: String },

    #[error("Server error: {message}")]
    ServerError { message: String },

    #[error("Server temporarily unavailable")]
    TemporarilyUnavailable { retry_after: Option<Duration> },
}

/// Result type for IDX operations.
pub type IdxResult<T> = Result<T, IdxError>;

/// OAuth2 error response from the authorization server.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct OAuth2ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub error_uri: Option<String>,
}

/// Map token endpoint error response to error type.
pub fn map_token_error(response: &OAuth2ErrorResponse) -> ProviderError {
    let description = || {
        response
            .error_description
            .clone()
            .unwrap_or_else(|| response.error.clone())
    };

    match response.error.as_str() {
        "invalid_client" => ProviderError::InvalidClient {
            error_description: response.error_description.clone(),
        },
        "invalid_grant" => ProviderError::InvalidGrant {
            message: description(),
        },
        "invalid_scope" => ProviderError::InvalidScope {
            scope: response.error_description.clone().unwrap_or_default(),
        },
        "unauthorized_client" => ProviderError::UnauthorizedClient {
            error_description: response.error_description.clone(),
        },
        "unsupported_grant_type" => ProviderError::UnsupportedGrantType {
            grant_type: response.error_description.clone().unwrap_or_default(),
        },
        "server_error" => ProviderError::ServerError {
            message: description(),
        },
        "temporarily_unavailable" => ProviderError::TemporarilyUnavailable { retry_after: None },
        _ => ProviderError::InvalidRequest {
            message: description(),
        },
    }
}

/// Parse error response from HTTP body.
pub fn parse_error_response(body: &str) -> Option<OAuth2ErrorResponse> {
    serde_json::from_str(body).ok()
}

/// Create error from a non-success HTTP response.
pub fn create_error_from_response(status: u16, body: &str) -> IdxError {
    if let Some(response) = parse_error_response(body) {
        return IdxError::Provider(map_token_error(&response));
    }

    match status {
        400 => ProviderError::InvalidRequest {
            message: "Bad request".to_string(),
        }
        .into(),
        401 => ProviderError::InvalidClient {
            error_description: Some("Unauthorized".to_string()),
        }
        .into(),
        403 => ProviderError::UnauthorizedClient {
            error_description: Some("Forbidden".to_string()),
        }
        .into(),
        429 => ProviderError::TemporarilyUnavailable {
            retry_after: Some(Duration::from_secs(60)),
        }
        .into(),
        500..=599 => ProviderError::ServerError {
            message: format!("HTTP {}", status),
        }
        .into(),
        _ => ProtocolError::UnexpectedStatus { status }.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_retryable() {
        assert!(IdxError::Network(NetworkError::Timeout {
            timeout: Duration::from_secs(30)
        })
        .is_retryable());
        assert!(!IdxError::Network(NetworkError::TlsError {
            message: "bad cert".to_string()
        })
        .is_retryable());
        assert!(!IdxError::Validation(ValidationError::MissingRequiredParameter {
            name: "identifier".to_string()
        })
        .is_retryable());
    }

    #[test]
    fn test_validation_is_locally_recoverable() {
        let error: IdxError = ValidationError::MissingRequiredParameter {
            name: "identifier".to_string(),
        }
        .into();
        assert!(error.is_locally_recoverable());
        assert_eq!(error.error_code(), "IDX_VALIDATION");

        let error: IdxError = ProtocolError::SuccessResponseMissing.into();
        assert!(!error.is_locally_recoverable());
    }

    #[test]
    fn test_parse_error_response() {
        let body = r#"{"error":"invalid_grant","error_description":"PKCE verification failed"}"#;
        let error = create_error_from_response(400, body);
        match error {
            IdxError::Provider(ProviderError::InvalidGrant { message }) => {
                assert_eq!(message, "PKCE verification failed");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_status_fallback() {
        assert!(matches!(
            create_error_from_response(503, "<html>"),
            IdxError::Provider(ProviderError::ServerError { .. })
        ));
        assert!(matches!(
            create_error_from_response(302, ""),
            IdxError::Protocol(ProtocolError::UnexpectedStatus { status: 302 })
        ));
    }
}
