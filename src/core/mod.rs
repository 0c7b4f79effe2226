pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::Config;
pub use errors::{
    ConfigError, MalformedEncodingError, ProbeRejected, ProviderError, RasterError,
    ValidationError,
};
pub use types::{
    EncodedImage, FallbackNotice, MergeOutput, MergeQuality, ProviderDescriptor, ProviderId,
    ProviderTier, Rect, ResultImage, SynthesisReport, SynthesisRequest, SynthesisResult,
    SynthesisState,
};
