//! Minimal raster interface the compositing engine draws through.
//!
//! The [`RasterBackend`] trait covers the three operations the engine needs:
//! load, clipped region draw, and encode. The production implementation is
//! [`ImageRsBackend`](super::image_backend::ImageRsBackend), built on the
//! `image` crate.

use image::{Rgba, RgbaImage};

use crate::core::errors::RasterResult;
use crate::core::types::{EncodedImage, Rect};

/// Decoded RGBA raster with a pixel accessor
#[derive(Debug, Clone)]
pub struct Raster {
    pixels: RgbaImage,
}

impl Raster {
    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.pixels.get_pixel(x, y)
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut RgbaImage {
        &mut self.pixels
    }

    pub fn into_rgba(self) -> RgbaImage {
        self.pixels
    }
}

/// Rounded-rectangle clip mask
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundedRect {
    pub rect: Rect,
    pub radius: f64,
}

impl RoundedRect {
    pub fn new(rect: Rect, radius: f64) -> Self {
        Self { rect, radius }
    }

    /// Radius after scaling down to fit, as a canvas `roundRect` does
    pub fn effective_radius(&self) -> f64 {
        self.radius
            .max(0.0)
            .min(self.rect.width / 2.0)
            .min(self.rect.height / 2.0)
    }

    /// Whether the point lies inside the rounded rectangle (edges inclusive)
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let r = self.rect;
        if x < r.x || y < r.y || x > r.right() || y > r.bottom() {
            return false;
        }

        // Distance to the nearest corner-circle center; zero on the straight edges
        let radius = self.effective_radius();
        let cx = clamp_between(x, r.x + radius, r.right() - radius);
        let cy = clamp_between(y, r.y + radius, r.bottom() - radius);
        let (dx, dy) = (x - cx, y - cy);
        dx * dx + dy * dy <= radius * radius
    }
}

// f64::clamp panics when the bounds cross, which rounding can cause for r == w/2
fn clamp_between(v: f64, a: f64, b: f64) -> f64 {
    v.clamp(a.min(b), a.max(b))
}

/// Graphics backend used by the compositing engine.
///
/// Clipping is scoped to a single `draw_clipped_region` call, so no clip
/// state survives into later draws.
pub trait RasterBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Decode encoded bytes into a raster
    fn load_raster(&self, bytes: &[u8]) -> RasterResult<Raster>;

    /// Draw `src` of `source` scaled into `dst` of `canvas`, masked by `clip`
    fn draw_clipped_region(
        &self,
        canvas: &mut Raster,
        source: &Raster,
        src: Rect,
        dst: Rect,
        clip: RoundedRect,
    );

    /// Losslessly encode a raster
    fn encode_raster(&self, raster: &Raster) -> RasterResult<EncodedImage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radius_scales_down_to_fit() {
        let clip = RoundedRect::new(Rect::new(0.0, 0.0, 100.0, 120.0), 50.0);
        assert_eq!(clip.effective_radius(), 50.0);

        let clip = RoundedRect::new(Rect::new(0.0, 0.0, 40.0, 60.0), 50.0);
        assert_eq!(clip.effective_radius(), 20.0);
    }

    #[test]
    fn test_rounded_rect_contains() {
        let clip = RoundedRect::new(Rect::new(150.0, 64.0, 100.0, 120.0), 50.0);

        // Center and straight edges
        assert!(clip.contains(200.0, 124.0));
        assert!(clip.contains(200.0, 64.5));
        assert!(clip.contains(150.5, 124.0));

        // Corners are cut off
        assert!(!clip.contains(151.0, 65.0));
        assert!(!clip.contains(249.0, 183.0));

        // Outside the bounding box
        assert!(!clip.contains(100.0, 100.0));
        assert!(!clip.contains(200.0, 200.0));
    }
}
