//! Response Parsing
//!
//! Version-keyed decoding of IDX documents into the response model.

pub mod v1;

pub use v1::V1Decoder;

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::capability::CapabilityFactory;
use crate::error::{IdxResult, ProtocolError};
use crate::model::{RemediationHandler, Response};
use crate::types::DEFAULT_POLL_INTERVAL_MS;

/// Per-parse inputs wired into the produced response.
#[derive(Clone)]
pub struct ParseContext {
    /// Generation stamped on the response and all of its remediations.
    pub generation: u64,
    /// Receiver for remediation submissions and capability actions.
    pub handler: Option<Weak<dyn RemediationHandler>>,
    /// Poll interval for poll forms without `refresh`.
    pub default_poll_interval: Duration,
}

impl Default for ParseContext {
    fn default() -> Self {
        Self {
            generation: 0,
            handler: None,
            default_poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

/// Decoder for one protocol version.
pub trait ResponseDecoder: Send + Sync {
    /// Version tag this decoder understands.
    fn version(&self) -> &str;

    fn decode(
        &self,
        document: Value,
        context: &ParseContext,
        factories: &[Arc<dyn CapabilityFactory>],
    ) -> IdxResult<Response>;
}

/// Parses IDX documents with the decoder registered for their version.
#[derive(Clone)]
pub struct ResponseParser {
    decoders: HashMap<String, Arc<dyn ResponseDecoder>>,
    factories: Vec<Arc<dyn CapabilityFactory>>,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseParser {
    /// Parser with the built-in decoders.
    pub fn new() -> Self {
        Self::empty().with_decoder(Arc::new(V1Decoder))
    }

    /// Parser with no decoders registered.
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
            factories: Vec::new(),
        }
    }

    /// Register a decoder, replacing any for the same version.
    pub fn with_decoder(mut self, decoder: Arc<dyn ResponseDecoder>) -> Self {
        self.decoders.insert(decoder.version().to_string(), decoder);
        self
    }

    /// Add a capability factory.
    pub fn with_capability_factory(mut self, factory: Arc<dyn CapabilityFactory>) -> Self {
        self.factories.push(factory);
        self
    }

    pub fn supports(&self, version: &str) -> bool {
        self.decoders.contains_key(version)
    }

    /// Parse a response body.
    ///
    /// The document's own `version` wins over `expected_version`.
    pub fn parse(
        &self,
        body: &str,
        expected_version: &str,
        context: &ParseContext,
    ) -> IdxResult<Response> {
        if body.trim().is_empty() {
            return Err(ProtocolError::InvalidResponseData {
                message: "empty response body".to_string(),
            }
            .into());
        }

        let document: Value = serde_json::from_str(body).map_err(|e| ProtocolError::InvalidJson {
            message: e.to_string(),
        })?;
        self.parse_value(document, expected_version, context)
    }

    pub fn parse_value(
        &self,
        document: Value,
        expected_version: &str,
        context: &ParseContext,
    ) -> IdxResult<Response> {
        if !document.is_object() {
            return Err(ProtocolError::InvalidResponseData {
                message: "response is not a JSON object".to_string(),
            }
            .into());
        }

        let version = document
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or(expected_version)
            .to_string();

        let decoder = self
            .decoders
            .get(&version)
            .ok_or(ProtocolError::UnsupportedVersion { version })?;

        decoder.decode(document, context, &self.factories)
    }
}

/// Whether a body is an IDX document rather than an OAuth2 error.
pub fn is_idx_document(body: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .map(|document| document.get("version").is_some() && document.get("error").is_none())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IdxError;

    #[test]
    fn test_unknown_version_is_rejected() {
        let parser = ResponseParser::new();
        let result = parser.parse(
            r#"{"version":"2.0.0","stateHandle":"abc"}"#,
            "1.0.0",
            &ParseContext::default(),
        );

        match result {
            Err(IdxError::Protocol(ProtocolError::UnsupportedVersion { version })) => {
                assert_eq!(version, "2.0.0")
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_missing_version_uses_expected() {
        let parser = ResponseParser::empty();
        assert!(matches!(
            parser.parse(r#"{"stateHandle":"abc"}"#, "1.0.0", &ParseContext::default()),
            Err(IdxError::Protocol(ProtocolError::UnsupportedVersion { .. }))
        ));
        assert!(ResponseParser::new().supports("1.0.0"));
    }

    #[test]
    fn test_malformed_bodies() {
        let parser = ResponseParser::new();
        let context = ParseContext::default();

        assert!(matches!(
            parser.parse("", "1.0.0", &context),
            Err(IdxError::Protocol(ProtocolError::InvalidResponseData { .. }))
        ));
        assert!(matches!(
            parser.parse("{not json", "1.0.0", &context),
            Err(IdxError::Protocol(ProtocolError::InvalidJson { .. }))
        ));
        assert!(matches!(
            parser.parse("[]", "1.0.0", &context),
            Err(IdxError::Protocol(ProtocolError::InvalidResponseData { .. }))
        ));
    }

    #[test]
    fn test_is_idx_document() {
        assert!(is_idx_document(r#"{"version":"1.0.0","messages":{"value":[]}}"#));
        assert!(!is_idx_document(r#"{"error":"invalid_grant"}"#));
        assert!(!is_idx_document("<html>"));
    }
}
