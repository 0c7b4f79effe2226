use tracing::{instrument, warn};

use crate::core::types::{
    MergeQuality, ProviderId, ResultImage, SynthesisResult, ValidatedInputs,
};
use crate::services::compositing::CompositingEngine;

/// Local compositing provider. Cannot fail.
#[derive(Clone)]
pub struct LocalProvider {
    engine: CompositingEngine,
}

impl LocalProvider {
    pub fn new(engine: CompositingEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &CompositingEngine {
        &self.engine
    }

    /// Merge the two inputs on the local engine.
    ///
    /// When neither image decodes there is nothing to composite; the garment
    /// image is handed back unchanged as an "Original" result.
    #[instrument(skip_all, fields(backend = self.engine.backend_name()))]
    pub async fn synthesize(&self, inputs: &ValidatedInputs) -> SynthesisResult {
        match self.engine.merge(&inputs.person, &inputs.garment).await {
            Ok(output) => SynthesisResult {
                result_image: ResultImage::Encoded(output.image),
                quality_label: output.quality.label().to_string(),
                source_provider: ProviderId::LOCAL,
            },
            Err(e) => {
                warn!("Local compositing impossible, passing garment image through: {}", e);
                Self::passthrough(inputs)
            }
        }
    }

    /// Garment image unchanged, tagged as a degraded local result
    pub fn passthrough(inputs: &ValidatedInputs) -> SynthesisResult {
        SynthesisResult {
            result_image: ResultImage::Encoded(inputs.garment.clone()),
            quality_label: MergeQuality::Degraded.label().to_string(),
            source_provider: ProviderId::LOCAL,
        }
    }
}
