// Synthesis Orchestrator: validates a request, runs the selected provider and
// degrades to local compositing when a remote provider fails.
//
// Once validation passes, every run ends in Succeeded.

use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::core::config::Config;
use crate::core::errors::{ConfigError, ValidationError};
use crate::core::types::{
    FallbackNotice, ProviderDescriptor, SynthesisReport, SynthesisRequest, SynthesisResult,
    SynthesisState, ValidatedInputs,
};
use crate::services::providers::{catalog, LocalProvider, ProviderRegistry};
use crate::utils::Metrics;

/// Check inputs and credential before any provider is invoked
pub fn validate(
    request: &SynthesisRequest,
    descriptor: &ProviderDescriptor,
) -> Result<ValidatedInputs, ValidationError> {
    let (person, garment) = match (&request.person_image, &request.garment_image) {
        (Some(person), Some(garment)) => (person.clone(), garment.clone()),
        (None, None) => return Err(ValidationError::MissingBothImages),
        (None, Some(_)) => return Err(ValidationError::MissingPersonImage),
        (Some(_), None) => return Err(ValidationError::MissingGarmentImage),
    };

    let credential = request.credential().map(str::to_string);
    if descriptor.needs_credential && credential.is_none() {
        return Err(ValidationError::MissingCredential {
            display_name: descriptor.display_name.to_string(),
        });
    }

    Ok(ValidatedInputs {
        person,
        garment,
        credential,
    })
}

/// Drives one request through Idle -> Validating -> Invoking -> ... per run
pub struct SynthesisOrchestrator {
    registry: Arc<ProviderRegistry>,
    metrics: Option<Metrics>,
}

impl SynthesisOrchestrator {
    pub fn new(registry: Arc<ProviderRegistry>, metrics: Option<Metrics>) -> Self {
        Self { registry, metrics }
    }

    /// Orchestrator over the configured provider registry
    pub fn from_config(config: &Config, metrics: Option<Metrics>) -> Result<Self, ConfigError> {
        let registry = ProviderRegistry::from_config(config, metrics.clone())?;
        Ok(Self::new(Arc::new(registry), metrics))
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Run one request to a terminal state.
    ///
    /// `Err` only for validation failures, before any network call. Provider
    /// errors are recovered locally and reported in `SynthesisReport::fallback`.
    #[instrument(skip(self, request), fields(provider = %request.provider_id))]
    pub async fn run(&self, request: SynthesisRequest) -> Result<SynthesisReport, ValidationError> {
        let mut trace = vec![SynthesisState::Idle];
        if let Some(ref m) = self.metrics {
            m.record_synthesis_request(request.provider_id);
        }

        transition(&mut trace, SynthesisState::Validating);
        let descriptor = catalog::descriptor(request.provider_id);
        let inputs = match validate(&request, descriptor) {
            Ok(inputs) => inputs,
            Err(e) => {
                transition(&mut trace, SynthesisState::Failed);
                info!("Request rejected: {}", e);
                if let Some(ref m) = self.metrics {
                    m.record_validation_failure();
                }
                return Err(e);
            }
        };

        transition(&mut trace, SynthesisState::Invoking);
        let client = self.registry.client(request.provider_id);

        let report = match client.synthesize(&inputs).await {
            Ok(result) => {
                transition(&mut trace, SynthesisState::Succeeded);
                SynthesisReport {
                    result,
                    fallback: None,
                    trace,
                }
            }
            Err(provider_error) => {
                transition(&mut trace, SynthesisState::FallingBack);
                warn!(
                    "{} failed ({}): {} - falling back to canvas merge",
                    descriptor.display_name,
                    provider_error.reason(),
                    provider_error
                );
                if let Some(ref m) = self.metrics {
                    m.record_fallback();
                }

                let mut result = run_to_completion(self.registry.local().clone(), inputs).await;
                result.quality_label = format!(
                    "{} (fallback from {})",
                    result.quality_label, descriptor.display_name
                );

                transition(&mut trace, SynthesisState::Succeeded);
                SynthesisReport {
                    result,
                    fallback: Some(FallbackNotice::new(provider_error)),
                    trace,
                }
            }
        };

        if let Some(ref m) = self.metrics {
            m.record_synthesis_succeeded();
        }
        info!(
            "Synthesis finished via {} ({})",
            report.result.source_provider, report.result.quality_label
        );
        Ok(report)
    }
}

fn transition(trace: &mut Vec<SynthesisState>, next: SynthesisState) {
    debug!("{:?} -> {:?}", trace.last(), next);
    trace.push(next);
}

/// Local fallback on its own task so an abandoned caller does not interrupt it
async fn run_to_completion(
    local: LocalProvider,
    inputs: ValidatedInputs,
) -> SynthesisResult {
    let passthrough = LocalProvider::passthrough(&inputs);
    match tokio::spawn(async move { local.synthesize(&inputs).await }).await {
        Ok(result) => result,
        Err(e) => {
            error!("Local fallback task failed: {}", e);
            passthrough
        }
    }
}
