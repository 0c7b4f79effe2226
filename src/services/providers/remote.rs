use reqwest::multipart::{Form, Part};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use crate::core::config::Config;
use crate::core::errors::{ProviderError, ProviderResult};
use crate::core::types::{
    EncodedImage, ProviderId, ResultImage, SynthesisResult, ValidatedInputs,
};
use crate::middleware::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::services::codec;
use crate::utils::Metrics;

/// Vendor-specific wire shape of a remote try-on API.
///
/// Implementations only build the request and name the response fields
/// that carry the output reference; transport, timeouts and error mapping
/// live in [`RemoteProvider`].
pub trait RemoteApi: Send + Sync {
    fn provider(&self) -> ProviderId;

    fn endpoint(&self) -> &str;

    /// Label attached to a genuine result from this vendor
    fn quality_label(&self) -> &'static str;

    fn build_request(
        &self,
        http: &reqwest::Client,
        inputs: &ValidatedInputs,
        credential: &str,
    ) -> ProviderResult<reqwest::RequestBuilder>;

    /// JSON fields checked in order for the output URI
    fn output_fields(&self) -> &'static [&'static str];
}

/// Nano Banana: multipart upload of both images, bearer token
pub struct NanoBananaApi {
    endpoint: String,
}

impl NanoBananaApi {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

impl RemoteApi for NanoBananaApi {
    fn provider(&self) -> ProviderId {
        ProviderId::NanoBanana
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn quality_label(&self) -> &'static str {
        "AI Enhanced (Nano Banana)"
    }

    fn build_request(
        &self,
        http: &reqwest::Client,
        inputs: &ValidatedInputs,
        credential: &str,
    ) -> ProviderResult<reqwest::RequestBuilder> {
        let form = Form::new()
            .part("person_image", image_part(self.provider(), &inputs.person, "user")?)
            .part("garment_image", image_part(self.provider(), &inputs.garment, "dress")?);

        Ok(http
            .post(&self.endpoint)
            .bearer_auth(credential)
            .multipart(form))
    }

    fn output_fields(&self) -> &'static [&'static str] {
        &["output_url", "image_url"]
    }
}

/// DeepAI image editor: JSON body with the person photo and an edit prompt
pub struct DeepAiApi {
    endpoint: String,
    prompt: String,
}

impl DeepAiApi {
    pub fn new(endpoint: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            prompt: prompt.into(),
        }
    }
}

impl RemoteApi for DeepAiApi {
    fn provider(&self) -> ProviderId {
        ProviderId::DeepAi
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn quality_label(&self) -> &'static str {
        "AI Enhanced (DeepAI)"
    }

    fn build_request(
        &self,
        http: &reqwest::Client,
        inputs: &ValidatedInputs,
        credential: &str,
    ) -> ProviderResult<reqwest::RequestBuilder> {
        let body = serde_json::json!({
            "image": codec::encode(&inputs.person),
            "text": self.prompt,
        });

        Ok(http
            .post(&self.endpoint)
            .header("api-key", credential)
            .json(&body))
    }

    fn output_fields(&self) -> &'static [&'static str] {
        &["output_url"]
    }
}

fn image_part(provider: ProviderId, image: &EncodedImage, stem: &str) -> ProviderResult<Part> {
    let blob = codec::to_transferable_blob(image);
    Part::bytes(blob.bytes)
        .file_name(format!("{}.{}", stem, image.extension()))
        .mime_str(&blob.content_type)
        .map_err(|e| ProviderError::Request {
            provider,
            detail: e.to_string(),
        })
}

/// First non-empty string among `fields` in a JSON object
pub fn extract_output(body: &serde_json::Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|field| body.get(*field).and_then(|v| v.as_str()))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Longest provider error body kept in a `ProviderError::Http`
pub const ERROR_BODY_LIMIT: usize = 2048;

/// Read at most `limit` bytes of an error response; marks a cut with "..."
async fn read_error_body(mut response: reqwest::Response, limit: usize) -> String {
    let mut buf = Vec::new();
    while buf.len() <= limit {
        match response.chunk().await {
            Ok(Some(chunk)) => buf.extend_from_slice(&chunk),
            // A broken error body is still an HTTP error; keep what arrived
            Ok(None) | Err(_) => break,
        }
    }
    truncate_body(&buf, limit)
}

fn truncate_body(bytes: &[u8], limit: usize) -> String {
    if bytes.len() <= limit {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    let cut = String::from_utf8_lossy(&bytes[..limit]);
    // Drop a code point split by the cut
    format!("{}...", cut.trim_end_matches('\u{FFFD}'))
}

/// Build the shared HTTP client for remote providers
pub fn build_http_client(config: &Config) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.provider_timeout())
        .connect_timeout(config.connect_timeout())
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
}

/// Remote try-on provider with circuit breaker, timeout and metrics
pub struct RemoteProvider {
    api: Box<dyn RemoteApi>,
    http_client: reqwest::Client,
    circuit_breaker: CircuitBreaker,
    timeout: Duration,
    metrics: Option<Metrics>,
}

impl RemoteProvider {
    pub fn new(
        api: Box<dyn RemoteApi>,
        http_client: reqwest::Client,
        circuit_breaker: CircuitBreakerConfig,
        timeout: Duration,
        metrics: Option<Metrics>,
    ) -> Self {
        let circuit_breaker = CircuitBreaker::new(api.provider(), circuit_breaker);
        Self {
            api,
            http_client,
            circuit_breaker,
            timeout,
            metrics,
        }
    }

    pub fn provider(&self) -> ProviderId {
        self.api.provider()
    }

    pub fn endpoint(&self) -> &str {
        self.api.endpoint()
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    /// One HTTP call to the vendor; the output URI on success.
    ///
    /// Dropping the returned future aborts the in-flight request.
    #[instrument(skip(self, inputs), fields(provider = %self.api.provider()))]
    pub async fn synthesize(&self, inputs: &ValidatedInputs) -> ProviderResult<SynthesisResult> {
        let provider = self.api.provider();

        if !self.circuit_breaker.allow_request() {
            warn!("Circuit breaker for {} is open, failing fast", provider);
            return Err(ProviderError::CircuitOpen { provider });
        }

        let start = Instant::now();
        let result = match tokio::time::timeout(self.timeout, self.call(inputs)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                provider,
                after: self.timeout,
            }),
        };
        let duration = start.elapsed();

        if let Some(ref m) = self.metrics {
            m.record_remote_call(result.is_ok(), duration);
        }

        match result {
            Ok(uri) => {
                self.circuit_breaker.record_success();
                debug!("{} produced {} in {:?}", provider, uri, duration);
                Ok(SynthesisResult {
                    result_image: ResultImage::Uri(uri),
                    quality_label: self.api.quality_label().to_string(),
                    source_provider: provider,
                })
            }
            Err(e) => {
                if e.is_provider_fault() && self.circuit_breaker.record_failure() {
                    if let Some(ref m) = self.metrics {
                        m.record_circuit_breaker_trip();
                    }
                }
                Err(e)
            }
        }
    }

    async fn call(&self, inputs: &ValidatedInputs) -> ProviderResult<String> {
        let provider = self.api.provider();
        let credential = inputs.credential.as_deref().ok_or_else(|| ProviderError::Request {
            provider,
            detail: "missing credential".to_string(),
        })?;

        let request = self.api.build_request(&self.http_client, inputs, credential)?;

        let start = Instant::now();
        debug!("POST {}", self.api.endpoint());
        let response = request
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = response.status();
        debug!(
            "{} responded {} after {:?}",
            self.api.endpoint(),
            status,
            start.elapsed()
        );

        if !status.is_success() {
            return Err(ProviderError::Http {
                provider,
                status: status.as_u16(),
                body: read_error_body(response, ERROR_BODY_LIMIT).await,
            });
        }

        let body = response.text().await.map_err(|e| self.map_transport(e))?;

        let json: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| ProviderError::InvalidResponse {
                provider,
                detail: e.to_string(),
            })?;

        extract_output(&json, self.api.output_fields())
            .ok_or(ProviderError::MissingOutput { provider })
    }

    fn map_transport(&self, cause: reqwest::Error) -> ProviderError {
        let provider = self.api.provider();
        if cause.is_timeout() {
            ProviderError::Timeout {
                provider,
                after: self.timeout,
            }
        } else {
            ProviderError::Transport { provider, cause }
        }
    }
}

/// Remote clients for every vendor with a wire implementation
pub fn remote_providers(
    config: &Config,
    http_client: &reqwest::Client,
    metrics: Option<Metrics>,
) -> Vec<Arc<RemoteProvider>> {
    let apis: Vec<Box<dyn RemoteApi>> = vec![
        Box::new(NanoBananaApi::new(config.providers.nanobanana_endpoint.clone())),
        Box::new(DeepAiApi::new(
            config.providers.deepai_endpoint.clone(),
            config.providers.deepai_prompt.clone(),
        )),
    ];

    apis.into_iter()
        .map(|api| {
            Arc::new(RemoteProvider::new(
                api,
                http_client.clone(),
                CircuitBreakerConfig::from(&config.circuit_breaker),
                config.provider_timeout(),
                metrics.clone(),
            ))
        })
        .collect()
}
