// Local compositing: paste an approximate face crop of the person photo onto
// the garment photo, clipped to a rounded rectangle.
//
// This is the fallback floor of the pipeline. Given at least one decodable
// input it always yields an image.

pub mod image_backend;
pub mod raster;

use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::core::errors::{MalformedEncodingError, RasterError};
use crate::core::types::{EncodedImage, MergeOutput, MergeQuality, Rect};
use crate::utils::image_ops::{composite_and_encode_async, load_raster_async};
use crate::utils::Metrics;

pub use image_backend::ImageRsBackend;
pub use raster::{Raster, RasterBackend, RoundedRect};

// Geometry in percent; integer percentages keep the arithmetic exact
const FACE_WIDTH_PCT: f64 = 25.0;
const FACE_ASPECT_PCT: f64 = 120.0;
const FACE_TOP_PCT: f64 = 8.0;

const CROP_X_PCT: f64 = 25.0;
const CROP_Y_PCT: f64 = 10.0;
const CROP_WIDTH_PCT: f64 = 50.0;
const CROP_HEIGHT_PCT: f64 = 40.0;

/// Corner radius of the clip mask, in canvas pixels
pub const CLIP_CORNER_RADIUS: f64 = 50.0;

fn pct(value: f64, percent: f64) -> f64 {
    value * percent / 100.0
}

/// Where the face crop lands on the garment canvas.
///
/// Width is a quarter of the canvas, height 1.2x the width, horizontally
/// centered, 8% down from the top. Kept small so the face does not spill over
/// the garment.
pub fn placement_region(canvas_width: u32, canvas_height: u32) -> Rect {
    let (w, h) = (canvas_width as f64, canvas_height as f64);
    let width = pct(w, FACE_WIDTH_PCT);
    let height = pct(width, FACE_ASPECT_PCT);
    Rect::new((w - width) / 2.0, pct(h, FACE_TOP_PCT), width, height)
}

/// Approximate face region of the person photo (no detection is performed)
pub fn face_crop_region(person_width: u32, person_height: u32) -> Rect {
    let (w, h) = (person_width as f64, person_height as f64);
    Rect::new(
        pct(w, CROP_X_PCT),
        pct(h, CROP_Y_PCT),
        pct(w, CROP_WIDTH_PCT),
        pct(h, CROP_HEIGHT_PCT),
    )
}

/// Deterministic two-image compositor
#[derive(Clone)]
pub struct CompositingEngine {
    backend: Arc<dyn RasterBackend>,
    metrics: Option<Metrics>,
}

impl CompositingEngine {
    pub fn new(backend: Arc<dyn RasterBackend>, metrics: Option<Metrics>) -> Self {
        Self { backend, metrics }
    }

    /// Engine on the default `image` crate backend
    pub fn with_default_backend(metrics: Option<Metrics>) -> Self {
        Self::new(Arc::new(ImageRsBackend::new()), metrics)
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Composite the person's face crop onto the garment image.
    ///
    /// Both images are decoded concurrently. If exactly one fails to decode,
    /// the other is returned unchanged as a degraded result. Only when
    /// neither decodes is an error returned.
    #[instrument(skip_all, fields(
        backend = self.backend.name(),
        person_bytes = person.size_bytes(),
        garment_bytes = garment.size_bytes()
    ))]
    pub async fn merge(
        &self,
        person: &EncodedImage,
        garment: &EncodedImage,
    ) -> Result<MergeOutput, MalformedEncodingError> {
        let (person_raster, garment_raster) = tokio::join!(
            load_raster_async(self.backend.clone(), person.shared_payload()),
            load_raster_async(self.backend.clone(), garment.shared_payload()),
        );

        let (person_raster, garment_raster) = match (person_raster, garment_raster) {
            (Ok(p), Ok(g)) => (p, g),
            (Ok(_), Err(e)) => {
                warn!("Garment image failed to decode, returning person image: {}", e);
                return Ok(self.degraded(person));
            }
            (Err(e), Ok(_)) => {
                warn!("Person image failed to decode, returning garment image: {}", e);
                return Ok(self.degraded(garment));
            }
            (Err(pe), Err(ge)) => {
                return Err(MalformedEncodingError::Undecodable {
                    person: pe.to_string(),
                    garment: ge.to_string(),
                });
            }
        };

        let dst = placement_region(garment_raster.width(), garment_raster.height());
        let src = face_crop_region(person_raster.width(), person_raster.height());
        debug!(
            "Compositing {}x{} crop {:?} into {}x{} canvas at {:?}",
            person_raster.width(),
            person_raster.height(),
            src,
            garment_raster.width(),
            garment_raster.height(),
            dst
        );

        // The garment raster is the full-size background canvas
        let merged = composite_and_encode_async(
            self.backend.clone(),
            garment_raster,
            person_raster,
            src,
            dst,
            RoundedRect::new(dst, CLIP_CORNER_RADIUS),
        )
        .await;

        match merged {
            Ok(image) => {
                if let Some(ref m) = self.metrics {
                    m.record_local_merge(false);
                }
                Ok(MergeOutput {
                    image,
                    quality: MergeQuality::Merged,
                })
            }
            Err(e) => {
                warn!("Compositing failed after decode, returning garment image: {}", e);
                Ok(self.degraded(garment))
            }
        }
    }

    fn degraded(&self, image: &EncodedImage) -> MergeOutput {
        if let Some(ref m) = self.metrics {
            m.record_local_merge(true);
        }
        MergeOutput {
            image: image.clone(),
            quality: MergeQuality::Degraded,
        }
    }

    /// Decode check used by diagnostics
    pub async fn probe_decode(&self, image: &EncodedImage) -> Result<(u32, u32), RasterError> {
        let raster = load_raster_async(self.backend.clone(), image.shared_payload()).await?;
        Ok((raster.width(), raster.height()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::image_ops::solid_png;
    use image::Rgba;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    fn png(width: u32, height: u32, color: [u8; 4]) -> EncodedImage {
        EncodedImage::new("image/png", solid_png(width, height, color).unwrap()).unwrap()
    }

    fn garbage() -> EncodedImage {
        EncodedImage::new("image/png", b"definitely not a png".to_vec()).unwrap()
    }

    #[test]
    fn test_placement_region_geometry() {
        assert_eq!(placement_region(400, 800), Rect::new(150.0, 64.0, 100.0, 120.0));
    }

    #[test]
    fn test_face_crop_geometry() {
        assert_eq!(face_crop_region(300, 600), Rect::new(75.0, 60.0, 150.0, 240.0));
    }

    #[test]
    fn test_regions_are_valid_for_tiny_images() {
        assert!(placement_region(1, 1).is_valid());
        assert!(face_crop_region(1, 1).is_valid());
    }

    #[tokio::test]
    async fn test_merge_composites_onto_garment_canvas() {
        let metrics = Metrics::new();
        let engine = CompositingEngine::with_default_backend(Some(metrics.clone()));

        let out = engine.merge(&png(300, 600, RED), &png(400, 800, BLUE)).await.unwrap();
        assert_eq!(out.quality, MergeQuality::Merged);
        assert_eq!(out.quality.label(), "Canvas Merged");
        assert_eq!(out.image.mime_type(), "image/png");

        let merged = image::load_from_memory(out.image.payload()).unwrap().to_rgba8();
        assert_eq!(merged.dimensions(), (400, 800));
        assert_eq!(*merged.get_pixel(200, 124), Rgba(RED));
        assert_eq!(*merged.get_pixel(150, 64), Rgba(BLUE));
        assert_eq!(*merged.get_pixel(200, 400), Rgba(BLUE));

        assert_eq!(metrics.snapshot().local_merges, 1);
    }

    #[tokio::test]
    async fn test_merge_degrades_when_garment_is_undecodable() {
        let engine = CompositingEngine::with_default_backend(None);
        let person = png(30, 60, RED);

        let out = engine.merge(&person, &garbage()).await.unwrap();
        assert_eq!(out.quality, MergeQuality::Degraded);
        assert_eq!(out.quality.label(), "Original");
        assert_eq!(out.image, person);
    }

    #[tokio::test]
    async fn test_merge_degrades_when_person_is_undecodable() {
        let engine = CompositingEngine::with_default_backend(None);
        let garment = png(40, 80, BLUE);

        let out = engine.merge(&garbage(), &garment).await.unwrap();
        assert_eq!(out.quality, MergeQuality::Degraded);
        assert_eq!(out.image, garment);
    }

    #[tokio::test]
    async fn test_merge_fails_when_neither_decodes() {
        let engine = CompositingEngine::with_default_backend(None);
        assert!(matches!(
            engine.merge(&garbage(), &garbage()).await,
            Err(MalformedEncodingError::Undecodable { .. })
        ));
    }
}
