//! Shared test utilities.
//!
//! Synthetic image fixtures and an in-process stub provider: a real axum
//! server on `127.0.0.1:0` that answers every POST with a canned status and
//! JSON body, after an optional delay, and remembers what it was sent.

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::core::types::EncodedImage;
use crate::utils::image_ops::solid_png;

// =========================================================================
// Image fixtures
// =========================================================================

pub fn png_image(width: u32, height: u32, color: [u8; 4]) -> EncodedImage {
    EncodedImage::new("image/png", solid_png(width, height, color).unwrap()).unwrap()
}

/// Claims to be a PNG but is not decodable
pub fn garbage_image() -> EncodedImage {
    EncodedImage::new("image/png", b"definitely not a png".to_vec()).unwrap()
}

// =========================================================================
// Stub provider
// =========================================================================

#[derive(Debug, Clone, Default)]
pub struct SeenRequest {
    pub authorization: Option<String>,
    pub api_key: Option<String>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

pub struct StubProvider {
    pub url: String,
    hits: Arc<AtomicUsize>,
    seen: Arc<Mutex<Option<SeenRequest>>>,
}

impl StubProvider {
    /// Number of requests the stub has received
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<SeenRequest> {
        self.seen.lock().clone()
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Start a stub provider answering `POST /try-on`
pub async fn spawn_stub(status: StatusCode, body: serde_json::Value, delay: Duration) -> StubProvider {
    let hits = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(None));

    let handler_hits = hits.clone();
    let handler_seen = seen.clone();
    let app = Router::new().route(
        "/try-on",
        post(move |headers: HeaderMap, request_body: Bytes| {
            let hits = handler_hits.clone();
            let seen = handler_seen.clone();
            let body = body.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                *seen.lock() = Some(SeenRequest {
                    authorization: header(&headers, "authorization"),
                    api_key: header(&headers, "api-key"),
                    content_type: header(&headers, "content-type"),
                    body: request_body.to_vec(),
                });
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                (status, Json(body))
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    StubProvider {
        url: format!("http://{}/try-on", addr),
        hits,
        seen,
    }
}
