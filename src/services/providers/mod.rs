// Provider dispatch: one client per catalog id, remote or local.
//
// Vendors with a wire implementation get a RemoteProvider; every other
// catalog entry resolves to local compositing.

pub mod catalog;
pub mod local;
pub mod remote;

use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::core::config::Config;
use crate::core::errors::{ConfigError, ProviderResult};
use crate::core::types::{ProviderId, SynthesisResult, ValidatedInputs};
use crate::middleware::circuit_breaker::CircuitBreakerStats;
use crate::services::compositing::CompositingEngine;
use crate::utils::Metrics;

pub use local::LocalProvider;
pub use remote::{DeepAiApi, NanoBananaApi, RemoteApi, RemoteProvider};

/// A synthesis strategy
#[derive(Clone)]
pub enum ProviderClient {
    Remote(Arc<RemoteProvider>),
    Local(LocalProvider),
}

impl ProviderClient {
    pub fn id(&self) -> ProviderId {
        match self {
            ProviderClient::Remote(remote) => remote.provider(),
            ProviderClient::Local(_) => ProviderId::LOCAL,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, ProviderClient::Remote(_))
    }

    /// Only the remote variant can return an error
    pub async fn synthesize(&self, inputs: &ValidatedInputs) -> ProviderResult<SynthesisResult> {
        match self {
            ProviderClient::Remote(remote) => remote.synthesize(inputs).await,
            ProviderClient::Local(local) => Ok(local.synthesize(inputs).await),
        }
    }
}

/// Resolves a catalog id to its client
pub struct ProviderRegistry {
    remote: HashMap<ProviderId, Arc<RemoteProvider>>,
    local: LocalProvider,
    http_client: reqwest::Client,
}

impl ProviderRegistry {
    pub fn new(local: LocalProvider, http_client: reqwest::Client) -> Self {
        Self {
            remote: HashMap::new(),
            local,
            http_client,
        }
    }

    /// Registry with every implemented remote vendor, built from configuration
    pub fn from_config(config: &Config, metrics: Option<Metrics>) -> Result<Self, ConfigError> {
        let http_client = remote::build_http_client(config).map_err(ConfigError::HttpClient)?;
        let engine = CompositingEngine::with_default_backend(metrics.clone());
        let mut registry = Self::new(LocalProvider::new(engine), http_client.clone());

        for provider in remote::remote_providers(config, &http_client, metrics) {
            registry.register(provider);
        }

        info!(
            "Provider registry ready: {} remote, {} local-routed",
            registry.remote.len(),
            ProviderId::ALL.len() - registry.remote.len()
        );
        Ok(registry)
    }

    pub fn register(&mut self, provider: Arc<RemoteProvider>) {
        self.remote.insert(provider.provider(), provider);
    }

    pub fn client(&self, id: ProviderId) -> ProviderClient {
        match self.remote.get(&id) {
            Some(remote) => ProviderClient::Remote(Arc::clone(remote)),
            None => ProviderClient::Local(self.local.clone()),
        }
    }

    pub fn local(&self) -> &LocalProvider {
        &self.local
    }

    /// Shared client, reused by diagnostics probes
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Endpoints of every registered remote provider, sorted
    pub fn endpoints(&self) -> Vec<String> {
        let mut endpoints: Vec<_> = self.remote.values().map(|r| r.endpoint().to_string()).collect();
        endpoints.sort();
        endpoints
    }

    pub fn circuit_stats(&self) -> Vec<CircuitBreakerStats> {
        let mut stats: Vec<_> = self
            .remote
            .values()
            .map(|r| r.circuit_breaker().stats())
            .collect();
        stats.sort_by_key(|s| s.provider.as_str());
        stats
    }
}
