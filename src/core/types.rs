// Data model for the synthesis pipeline

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::core::errors::{MalformedEncodingError, ProviderError};

/// Closed set of providers known to the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderId {
    Canvas,
    #[serde(rename = "nanobanana")]
    NanoBanana,
    #[serde(rename = "deepai")]
    DeepAi,
    #[serde(rename = "huggingface")]
    HuggingFace,
    Replicate,
    Stability,
    Clarifai,
    Adobe,
    Rekognition,
    GoogleVision,
    Azure,
}

impl ProviderId {
    /// The local compositing provider
    pub const LOCAL: ProviderId = ProviderId::Canvas;

    pub const ALL: [ProviderId; 11] = [
        ProviderId::Canvas,
        ProviderId::NanoBanana,
        ProviderId::DeepAi,
        ProviderId::HuggingFace,
        ProviderId::Replicate,
        ProviderId::Stability,
        ProviderId::Clarifai,
        ProviderId::Adobe,
        ProviderId::Rekognition,
        ProviderId::GoogleVision,
        ProviderId::Azure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Canvas => "canvas",
            ProviderId::NanoBanana => "nanobanana",
            ProviderId::DeepAi => "deepai",
            ProviderId::HuggingFace => "huggingface",
            ProviderId::Replicate => "replicate",
            ProviderId::Stability => "stability",
            ProviderId::Clarifai => "clarifai",
            ProviderId::Adobe => "adobe",
            ProviderId::Rekognition => "rekognition",
            ProviderId::GoogleVision => "google-vision",
            ProviderId::Azure => "azure",
        }
    }

    /// Parse the wire id (as used in forms and JSON)
    pub fn parse(id: &str) -> Option<ProviderId> {
        let id = id.trim();
        Self::ALL.into_iter().find(|p| p.as_str() == id)
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTier {
    Free,
    Paid,
}

/// Static catalog entry. Read-only for the life of the process.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderDescriptor {
    pub id: ProviderId,
    pub display_name: &'static str,
    pub description: &'static str,
    pub needs_credential: bool,
    pub tier: ProviderTier,
}

/// Self-describing image value: MIME type plus binary payload.
///
/// Invariants: `mime_type` starts with `image/`, payload is non-empty.
/// Immutable once constructed; the payload is shared, so clones are cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    mime_type: String,
    payload: Arc<Vec<u8>>,
    size_bytes: usize,
}

impl EncodedImage {
    /// Build from raw bytes, checking the invariants
    pub fn new(mime_type: impl Into<String>, payload: Vec<u8>) -> Result<Self, MalformedEncodingError> {
        let mime_type = mime_type.into();
        if !mime_type.starts_with("image/") {
            return Err(MalformedEncodingError::NotAnImage(mime_type));
        }
        if payload.is_empty() {
            return Err(MalformedEncodingError::EmptyPayload);
        }
        let size_bytes = payload.len();
        Ok(Self {
            mime_type,
            payload: Arc::new(payload),
            size_bytes,
        })
    }

    /// Like `new`, but with a size already derived from the transfer encoding
    pub(crate) fn with_size(
        mime_type: impl Into<String>,
        payload: Vec<u8>,
        size_bytes: usize,
    ) -> Result<Self, MalformedEncodingError> {
        let mut image = Self::new(mime_type, payload)?;
        image.size_bytes = size_bytes;
        Ok(image)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Shared handle to the payload, for moving into blocking tasks without copying
    pub fn shared_payload(&self) -> Arc<Vec<u8>> {
        Arc::clone(&self.payload)
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// File extension matching the MIME subtype, used for upload file names
    pub fn extension(&self) -> &str {
        match self.mime_type.trim_start_matches("image/") {
            "jpeg" | "jpg" | "pjpeg" => "jpg",
            "svg+xml" => "svg",
            other => other,
        }
    }
}

/// Axis-aligned region in pixel space of a particular image
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Non-negative origin and a positive, finite extent
    pub fn is_valid(&self) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.width > 0.0
            && self.height > 0.0
            && self.right().is_finite()
            && self.bottom().is_finite()
    }
}

/// Input to a provider. Images are optional so validation can report which is missing.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub person_image: Option<EncodedImage>,
    pub garment_image: Option<EncodedImage>,
    pub provider_id: ProviderId,
    pub credentials: Option<String>,
}

impl SynthesisRequest {
    pub fn new(person: EncodedImage, garment: EncodedImage, provider_id: ProviderId) -> Self {
        Self {
            person_image: Some(person),
            garment_image: Some(garment),
            provider_id,
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: impl Into<String>) -> Self {
        self.credentials = Some(credentials.into());
        self
    }

    /// Credential with surrounding whitespace removed; None when blank
    pub fn credential(&self) -> Option<&str> {
        self.credentials
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

/// Both images of a request that already passed validation
#[derive(Debug, Clone)]
pub struct ValidatedInputs {
    pub person: EncodedImage,
    pub garment: EncodedImage,
    pub credential: Option<String>,
}

/// A provider's output: inline image (local) or a reference URI (remote)
#[derive(Debug, Clone, PartialEq)]
pub enum ResultImage {
    Encoded(EncodedImage),
    Uri(String),
}

/// Exactly one per successful request; never partially populated
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisResult {
    pub result_image: ResultImage,
    pub quality_label: String,
    pub source_provider: ProviderId,
}

/// Quality tag produced by the compositing engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MergeQuality {
    /// Person crop composited onto the garment canvas
    Merged,
    /// One input failed to decode; the other is returned unchanged
    Degraded,
}

impl MergeQuality {
    pub fn label(&self) -> &'static str {
        match self {
            MergeQuality::Merged => "Canvas Merged",
            MergeQuality::Degraded => "Original",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutput {
    pub image: EncodedImage,
    pub quality: MergeQuality,
}

/// Orchestrator states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SynthesisState {
    Idle,
    Validating,
    Invoking,
    FallingBack,
    Succeeded,
    Failed,
}

/// Surfaced to the caller whenever the local fallback replaced a remote result
#[derive(Debug)]
pub struct FallbackNotice {
    pub error: ProviderError,
    pub message: String,
}

impl FallbackNotice {
    pub fn new(error: ProviderError) -> Self {
        let message = format!("{} - Falling back to canvas merge...", error);
        Self { error, message }
    }
}

/// Terminal `Succeeded` outcome of an orchestrator run
#[derive(Debug)]
pub struct SynthesisReport {
    pub result: SynthesisResult,
    pub fallback: Option<FallbackNotice>,
    pub trace: Vec<SynthesisState>,
}

impl SynthesisReport {
    pub fn used_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn final_state(&self) -> SynthesisState {
        self.trace.last().copied().unwrap_or(SynthesisState::Succeeded)
    }
}
