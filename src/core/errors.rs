// Error taxonomy for the synthesis pipeline
//
// Using thiserror for ergonomic error definitions with:
// - Type-safe error matching
// - Automatic Display/Error trait implementations
// - Source error chaining
//
// Propagation policy:
// - ValidationError is terminal (reported before any network call)
// - ProviderError is always recovered by the local compositing fallback
// - MalformedEncodingError is propagated to whoever decoded the input

use std::time::Duration;
use thiserror::Error;

use crate::core::types::ProviderId;

/// Bad input image encoding
#[derive(Debug, Error)]
pub enum MalformedEncodingError {
    #[error("Invalid data URL format: expected exactly one ',' separator")]
    BadSeparator,

    #[error("Invalid MIME type segment: {0:?}")]
    InvalidMimeSegment(String),

    #[error("Not an image MIME type: {0}")]
    NotAnImage(String),

    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Empty image payload")]
    EmptyPayload,

    #[error("Neither image could be decoded (person: {person}; garment: {garment})")]
    Undecodable { person: String, garment: String },
}

/// Remote provider failures. Every variant triggers the local fallback.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} returned HTTP {status}: {body}")]
    Http {
        provider: ProviderId,
        status: u16,
        body: String,
    },

    #[error("{provider} response did not contain an output URL")]
    MissingOutput { provider: ProviderId },

    #[error("{provider} transport error: {cause}")]
    Transport {
        provider: ProviderId,
        #[source]
        cause: reqwest::Error,
    },

    #[error("{provider} did not respond within {after:?}")]
    Timeout { provider: ProviderId, after: Duration },

    #[error("Circuit breaker for {provider} is open, failing fast")]
    CircuitOpen { provider: ProviderId },

    #[error("{provider} returned an unreadable response: {detail}")]
    InvalidResponse { provider: ProviderId, detail: String },

    #[error("Failed to build {provider} request: {detail}")]
    Request { provider: ProviderId, detail: String },
}

impl ProviderError {
    /// Short machine-readable reason
    pub fn reason(&self) -> &'static str {
        match self {
            ProviderError::Http { .. } => "http",
            ProviderError::MissingOutput { .. } => "missing output",
            ProviderError::Transport { .. } => "transport",
            ProviderError::Timeout { .. } => "timeout",
            ProviderError::CircuitOpen { .. } => "circuit open",
            ProviderError::InvalidResponse { .. } => "invalid response",
            ProviderError::Request { .. } => "request",
        }
    }

    pub fn provider(&self) -> ProviderId {
        match self {
            ProviderError::Http { provider, .. }
            | ProviderError::MissingOutput { provider }
            | ProviderError::Transport { provider, .. }
            | ProviderError::Timeout { provider, .. }
            | ProviderError::CircuitOpen { provider }
            | ProviderError::InvalidResponse { provider, .. }
            | ProviderError::Request { provider, .. } => *provider,
        }
    }

    /// Whether the failure says the provider itself is unhealthy.
    ///
    /// Only these count toward the shared circuit breaker; a 4xx caused by one
    /// caller's credential or payload must not block other callers.
    pub fn is_provider_fault(&self) -> bool {
        match self {
            ProviderError::Transport { .. } | ProviderError::Timeout { .. } => true,
            ProviderError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// HTTP status when the provider answered with a non-success code
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ProviderError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// User-input errors detected before any provider is invoked
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please upload both your photo and a garment image! (missing: your photo)")]
    MissingPersonImage,

    #[error("Please upload both your photo and a garment image! (missing: garment image)")]
    MissingGarmentImage,

    #[error("Please upload both your photo and a garment image!")]
    MissingBothImages,

    #[error("Please enter your API key for {display_name}")]
    MissingCredential { display_name: String },
}

/// Diagnostics probe refused before any request is sent
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeRejected {
    #[error("Not a valid URL: {0}")]
    InvalidUrl(String),

    #[error("Only configured provider endpoints can be probed, got {0}")]
    UnlistedTarget(String),

    #[error("Method {0} is not allowed for probes")]
    MethodNotAllowed(String),
}

/// Raster backend failures (decode / encode)
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("Image decoding failed: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Image encoding failed: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Encoded output rejected: {0}")]
    InvalidOutput(#[from] MalformedEncodingError),

    #[error("Blocking task failed: {0}")]
    TaskJoin(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Provider timeout must be between 1 and 300 seconds, got {0}")]
    InvalidTimeout(u64),

    #[error("Invalid endpoint for {provider}: {url}")]
    InvalidEndpoint { provider: ProviderId, url: String },

    #[error("Invalid circuit breaker config: {0}")]
    InvalidCircuitBreaker(String),

    #[error("Invalid server config: {0}")]
    InvalidServerConfig(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

// Convenience type aliases for Results
pub type ProviderResult<T> = Result<T, ProviderError>;
pub type RasterResult<T> = Result<T, RasterError>;
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_reasons() {
        let err = ProviderError::Http {
            provider: ProviderId::NanoBanana,
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(err.reason(), "http");
        assert_eq!(err.http_status(), Some(500));
        assert_eq!(err.provider(), ProviderId::NanoBanana);

        let err = ProviderError::MissingOutput {
            provider: ProviderId::DeepAi,
        };
        assert_eq!(err.reason(), "missing output");
        assert_eq!(err.http_status(), None);
    }

    #[test]
    fn test_only_provider_side_failures_are_faults() {
        let http = |status| ProviderError::Http {
            provider: ProviderId::NanoBanana,
            status,
            body: String::new(),
        };
        assert!(http(500).is_provider_fault());
        assert!(http(503).is_provider_fault());
        assert!(!http(401).is_provider_fault());
        assert!(!http(403).is_provider_fault());
        assert!(!http(400).is_provider_fault());

        assert!(ProviderError::Timeout {
            provider: ProviderId::DeepAi,
            after: Duration::from_secs(20),
        }
        .is_provider_fault());
        assert!(!ProviderError::MissingOutput {
            provider: ProviderId::DeepAi
        }
        .is_provider_fault());
    }

    #[test]
    fn test_validation_messages_name_the_provider() {
        let err = ValidationError::MissingCredential {
            display_name: "Nano Banana API".to_string(),
        };
        assert_eq!(err.to_string(), "Please enter your API key for Nano Banana API");
    }
}
