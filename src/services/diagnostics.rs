//! Troubleshooting helpers for image payloads, provider endpoints and the
//! local compositing path.
//!
//! None of these return errors: every failure is captured in the report so
//! the caller can print or serialize it as-is.

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, instrument};

use crate::core::errors::ProbeRejected;
use crate::core::types::{EncodedImage, MergeQuality};
use crate::services::codec;
use crate::services::compositing::CompositingEngine;
use crate::utils::image_ops::solid_png;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImageDataReport {
    pub valid: bool,
    pub mime_type: Option<String>,
    pub size_bytes: Option<usize>,
    /// Rounded, e.g. "12 KB"
    pub size_kb: Option<String>,
    pub error: Option<String>,
}

impl ImageDataReport {
    fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            mime_type: None,
            size_bytes: None,
            size_kb: None,
            error: Some(error.into()),
        }
    }
}

/// Check that a data URL carries a decodable image payload
pub fn validate_image_data(data_url: &str) -> ImageDataReport {
    if data_url.trim().is_empty() {
        return ImageDataReport::invalid("No data URL provided");
    }

    match codec::decode(data_url) {
        Ok(image) => ImageDataReport {
            valid: true,
            mime_type: Some(image.mime_type().to_string()),
            size_bytes: Some(image.size_bytes()),
            size_kb: Some(format!(
                "{} KB",
                (image.size_bytes() as f64 / 1024.0).round() as u64
            )),
            error: None,
        },
        Err(e) => ImageDataReport::invalid(e.to_string()),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointProbe {
    pub url: String,
    pub method: String,
    pub status: Option<u16>,
    pub status_text: Option<String>,
    pub response_time_ms: u128,
    pub headers: BTreeMap<String, String>,
    pub error: Option<String>,
}

const PROBE_METHODS: [reqwest::Method; 4] = [
    reqwest::Method::GET,
    reqwest::Method::HEAD,
    reqwest::Method::OPTIONS,
    reqwest::Method::POST,
];

/// Gate for probes triggered by remote callers: the target must be one of
/// `allowed` (compared as parsed URLs) and the method a plain read or POST.
pub fn check_probe_target(
    url: &str,
    method: &reqwest::Method,
    allowed: &[String],
) -> Result<reqwest::Url, ProbeRejected> {
    if !PROBE_METHODS.contains(method) {
        return Err(ProbeRejected::MethodNotAllowed(method.to_string()));
    }

    let target = reqwest::Url::parse(url.trim()).map_err(|_| ProbeRejected::InvalidUrl(url.to_string()))?;
    let listed = allowed
        .iter()
        .filter_map(|a| reqwest::Url::parse(a).ok())
        .any(|a| a == target);
    if !listed {
        return Err(ProbeRejected::UnlistedTarget(target.to_string()));
    }
    Ok(target)
}

/// Send a bare request to `url` and record status, latency and headers.
///
/// No target filtering happens here; callers exposed to the network go
/// through [`check_probe_target`] first.
#[instrument(skip(http))]
pub async fn probe_endpoint(http: &reqwest::Client, url: &str, method: reqwest::Method) -> EndpointProbe {
    let start = Instant::now();
    let result = http.request(method.clone(), url).send().await;
    let response_time_ms = start.elapsed().as_millis();

    match result {
        Ok(response) => {
            let status = response.status();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();
            debug!("Probe {} {} -> {} in {}ms", method, url, status, response_time_ms);
            EndpointProbe {
                url: url.to_string(),
                method: method.to_string(),
                status: Some(status.as_u16()),
                status_text: status.canonical_reason().map(str::to_string),
                response_time_ms,
                headers,
                error: None,
            }
        }
        Err(e) => {
            debug!("Probe {} {} failed after {}ms: {}", method, url, response_time_ms, e);
            EndpointProbe {
                url: url.to_string(),
                method: method.to_string(),
                status: None,
                status_text: None,
                response_time_ms,
                headers: BTreeMap::new(),
                error: Some(e.to_string()),
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SelfTestReport {
    pub success: bool,
    pub backend: String,
    pub message: String,
    pub output_bytes: Option<usize>,
}

/// Merge two synthetic rasters on `engine` and report the outcome
pub async fn compositing_self_test(engine: &CompositingEngine) -> SelfTestReport {
    let backend = engine.backend_name().to_string();
    let fixtures = solid_png(100, 100, [0, 255, 0, 255])
        .and_then(|person| Ok((person, solid_png(200, 300, [255, 255, 255, 255])?)));

    let (person, garment) = match fixtures {
        Ok(pair) => pair,
        Err(e) => {
            return SelfTestReport {
                success: false,
                backend,
                message: format!("Could not build test images: {}", e),
                output_bytes: None,
            }
        }
    };

    let images = EncodedImage::new("image/png", person)
        .and_then(|p| Ok((p, EncodedImage::new("image/png", garment)?)));
    let (person, garment) = match images {
        Ok(pair) => pair,
        Err(e) => {
            return SelfTestReport {
                success: false,
                backend,
                message: format!("Could not wrap test images: {}", e),
                output_bytes: None,
            }
        }
    };

    match engine.merge(&person, &garment).await {
        Ok(output) if output.quality == MergeQuality::Merged => SelfTestReport {
            success: true,
            backend,
            message: "Canvas merge working".to_string(),
            output_bytes: Some(output.image.size_bytes()),
        },
        Ok(output) => SelfTestReport {
            success: false,
            backend,
            message: format!("Merge degraded to {}", output.quality.label()),
            output_bytes: Some(output.image.size_bytes()),
        },
        Err(e) => SelfTestReport {
            success: false,
            backend,
            message: e.to_string(),
            output_bytes: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{png_image, spawn_stub};
    use axum::http::StatusCode;
    use std::time::Duration;

    #[test]
    fn test_validate_good_data_url() {
        let url = codec::encode(&png_image(8, 8, [1, 2, 3, 255]));
        let report = validate_image_data(&url);
        assert!(report.valid);
        assert_eq!(report.mime_type.as_deref(), Some("image/png"));
        assert!(report.size_bytes.unwrap() > 0);
        assert_eq!(report.size_kb.as_deref(), Some("0 KB"));
        assert!(report.error.is_none());
    }

    #[test]
    fn test_validate_reports_problems() {
        assert_eq!(
            validate_image_data("").error.as_deref(),
            Some("No data URL provided")
        );

        let report = validate_image_data("data:text/plain;base64,aGVsbG8=");
        assert!(!report.valid);
        assert!(report.error.unwrap().contains("Not an image"));

        assert!(!validate_image_data("no separator here").valid);
    }

    #[tokio::test]
    async fn test_probe_reachable_endpoint() {
        let stub = spawn_stub(StatusCode::CREATED, serde_json::json!({}), Duration::ZERO).await;
        let probe = probe_endpoint(&reqwest::Client::new(), &stub.url, reqwest::Method::POST).await;
        assert_eq!(probe.status, Some(201));
        assert_eq!(probe.status_text.as_deref(), Some("Created"));
        assert_eq!(probe.headers.get("content-type").map(String::as_str), Some("application/json"));
        assert!(probe.error.is_none());
        assert_eq!(stub.hits(), 1);
    }

    #[test]
    fn test_only_configured_endpoints_are_reachable() {
        let allowed = vec!["https://api.nanobanana.ai/api/try-on".to_string()];

        let url = check_probe_target("https://api.nanobanana.ai/api/try-on", &reqwest::Method::GET, &allowed).unwrap();
        assert_eq!(url.host_str(), Some("api.nanobanana.ai"));

        assert!(matches!(
            check_probe_target("http://169.254.169.254/latest/meta-data/", &reqwest::Method::GET, &allowed),
            Err(ProbeRejected::UnlistedTarget(_))
        ));
        assert!(matches!(
            check_probe_target("http://127.0.0.1:8080/admin", &reqwest::Method::GET, &allowed),
            Err(ProbeRejected::UnlistedTarget(_))
        ));
        // Same host, different path
        assert!(matches!(
            check_probe_target("https://api.nanobanana.ai/internal", &reqwest::Method::GET, &allowed),
            Err(ProbeRejected::UnlistedTarget(_))
        ));
        assert!(matches!(
            check_probe_target("https://api.nanobanana.ai/api/try-on", &reqwest::Method::DELETE, &allowed),
            Err(ProbeRejected::MethodNotAllowed(_))
        ));
        assert!(matches!(
            check_probe_target("not a url", &reqwest::Method::GET, &allowed),
            Err(ProbeRejected::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_probe_unreachable_endpoint() {
        let probe = probe_endpoint(&reqwest::Client::new(), "http://127.0.0.1:9/", reqwest::Method::GET).await;
        assert_eq!(probe.status, None);
        assert!(probe.error.is_some());
    }

    #[tokio::test]
    async fn test_compositing_self_test() {
        let report = compositing_self_test(&CompositingEngine::with_default_backend(None)).await;
        assert!(report.success, "{}", report.message);
        assert_eq!(report.backend, "image-rs");
        assert!(report.output_bytes.unwrap() > 0);
    }
}
