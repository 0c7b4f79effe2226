pub mod codec;
pub mod compositing;
pub mod diagnostics;
pub mod providers;

// Re-export commonly used services
pub use compositing::CompositingEngine;
pub use providers::{LocalProvider, ProviderClient, ProviderRegistry, RemoteProvider};
