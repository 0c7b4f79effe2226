// Library exports for the virtual try-on synthesis workflow

// Core modules
pub mod core;
pub mod middleware;
pub mod orchestration;
pub mod services;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types and functions
pub use core::{
    config::Config,
    errors::{ConfigError, MalformedEncodingError, ProviderError, RasterError, ValidationError},
    types::{
        EncodedImage, FallbackNotice, ProviderDescriptor, ProviderId, ResultImage,
        SynthesisReport, SynthesisRequest, SynthesisResult, SynthesisState,
    },
};

pub use middleware::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

pub use orchestration::synthesis_orchestrator::SynthesisOrchestrator;

pub use services::{CompositingEngine, ProviderClient, ProviderRegistry};

pub use utils::{Metrics, MetricsSnapshot};
