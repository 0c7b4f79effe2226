pub mod synthesis_orchestrator;

pub use synthesis_orchestrator::{validate, SynthesisOrchestrator};
