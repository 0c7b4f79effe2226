//! Static provider catalog.
//!
//! Loaded once at process start and never mutated; requests name a provider
//! by [`ProviderId`] instead of relying on ambient selection state.

use crate::core::types::{ProviderDescriptor, ProviderId, ProviderTier};

static CATALOG: [ProviderDescriptor; 11] = [
    ProviderDescriptor {
        id: ProviderId::Canvas,
        display_name: "Canvas Merge (Free)",
        description: "Basic image merging using canvas",
        needs_credential: false,
        tier: ProviderTier::Free,
    },
    ProviderDescriptor {
        id: ProviderId::NanoBanana,
        display_name: "Nano Banana API",
        description: "Advanced virtual try-on",
        needs_credential: true,
        tier: ProviderTier::Free,
    },
    ProviderDescriptor {
        id: ProviderId::DeepAi,
        display_name: "DeepAI Image Generator API",
        description: "AI-powered image generation",
        needs_credential: true,
        tier: ProviderTier::Free,
    },
    ProviderDescriptor {
        id: ProviderId::HuggingFace,
        display_name: "Hugging Face Inference API",
        description: "Open-source ML models",
        needs_credential: true,
        tier: ProviderTier::Free,
    },
    ProviderDescriptor {
        id: ProviderId::Replicate,
        display_name: "Replicate API (Free Tier)",
        description: "Virtual try-on with credits",
        needs_credential: true,
        tier: ProviderTier::Free,
    },
    ProviderDescriptor {
        id: ProviderId::Stability,
        display_name: "Stability AI (Free Credits)",
        description: "Image generation API",
        needs_credential: true,
        tier: ProviderTier::Free,
    },
    ProviderDescriptor {
        id: ProviderId::Clarifai,
        display_name: "Clarifai Community AI APIs",
        description: "Community AI models",
        needs_credential: true,
        tier: ProviderTier::Free,
    },
    ProviderDescriptor {
        id: ProviderId::Adobe,
        display_name: "Adobe Photoshop API",
        description: "Professional image editing",
        needs_credential: true,
        tier: ProviderTier::Paid,
    },
    ProviderDescriptor {
        id: ProviderId::Rekognition,
        display_name: "Amazon Rekognition Custom Labels",
        description: "AWS custom ML models",
        needs_credential: true,
        tier: ProviderTier::Paid,
    },
    ProviderDescriptor {
        id: ProviderId::GoogleVision,
        display_name: "Google Cloud Vision API",
        description: "Custom ML vision models",
        needs_credential: true,
        tier: ProviderTier::Paid,
    },
    ProviderDescriptor {
        id: ProviderId::Azure,
        display_name: "Microsoft Azure AI Vision",
        description: "Azure cognitive services",
        needs_credential: true,
        tier: ProviderTier::Paid,
    },
];

pub fn all() -> &'static [ProviderDescriptor] {
    &CATALOG
}

pub fn descriptor(id: ProviderId) -> &'static ProviderDescriptor {
    // CATALOG is declared in ProviderId::ALL order
    &CATALOG[id as usize]
}

pub fn by_tier(tier: ProviderTier) -> impl Iterator<Item = &'static ProviderDescriptor> {
    CATALOG.iter().filter(move |d| d.tier == tier)
}
