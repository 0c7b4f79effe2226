use image::{ImageFormat, Pixel};
use std::io::Cursor;

use super::raster::{Raster, RasterBackend, RoundedRect};
use crate::core::errors::{RasterError, RasterResult};
use crate::core::types::{EncodedImage, Rect};

/// Pure-Rust raster backend on top of the `image` crate.
///
/// Sampling is nearest-neighbour from the source region; blending is
/// straight-alpha source-over.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageRsBackend;

impl ImageRsBackend {
    pub fn new() -> Self {
        Self
    }
}

impl RasterBackend for ImageRsBackend {
    fn name(&self) -> &str {
        "image-rs"
    }

    fn load_raster(&self, bytes: &[u8]) -> RasterResult<Raster> {
        let decoded = image::load_from_memory(bytes).map_err(RasterError::Decode)?;
        Ok(Raster::from_rgba(decoded.to_rgba8()))
    }

    fn draw_clipped_region(
        &self,
        canvas: &mut Raster,
        source: &Raster,
        src: Rect,
        dst: Rect,
        clip: RoundedRect,
    ) {
        if !src.is_valid() || !dst.is_valid() || source.width() == 0 || source.height() == 0 {
            return;
        }

        let (canvas_w, canvas_h) = (canvas.width(), canvas.height());
        let x0 = dst.x.floor() as u32;
        let y0 = dst.y.floor() as u32;
        let x1 = (dst.right().ceil() as u32).min(canvas_w);
        let y1 = (dst.bottom().ceil() as u32).min(canvas_h);

        // Samples stay inside both the source region and the source image
        let max_sx = (src.right().ceil() as u32).min(source.width()).saturating_sub(1);
        let max_sy = (src.bottom().ceil() as u32).min(source.height()).saturating_sub(1);
        let min_sx = (src.x.floor() as u32).min(max_sx);
        let min_sy = (src.y.floor() as u32).min(max_sy);

        let scale_x = src.width / dst.width;
        let scale_y = src.height / dst.height;

        for py in y0..y1 {
            let cy = py as f64 + 0.5;
            if cy < dst.y || cy > dst.bottom() {
                continue;
            }
            let sy = ((src.y + (cy - dst.y) * scale_y).floor() as u32).clamp(min_sy, max_sy);

            for px in x0..x1 {
                let cx = px as f64 + 0.5;
                if cx < dst.x || cx > dst.right() || !clip.contains(cx, cy) {
                    continue;
                }
                let sx = ((src.x + (cx - dst.x) * scale_x).floor() as u32).clamp(min_sx, max_sx);

                let top = source.pixel(sx, sy);
                canvas.pixels_mut().get_pixel_mut(px, py).blend(&top);
            }
        }
    }

    fn encode_raster(&self, raster: &Raster) -> RasterResult<EncodedImage> {
        let mut png_bytes = Vec::new();
        raster
            .pixels()
            .write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
            .map_err(RasterError::Encode)?;
        Ok(EncodedImage::new("image/png", png_bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn solid(width: u32, height: u32, color: Rgba<u8>) -> Raster {
        Raster::from_rgba(RgbaImage::from_pixel(width, height, color))
    }

    #[test]
    fn test_draw_respects_clip_and_region() {
        let backend = ImageRsBackend::new();
        let mut canvas = solid(400, 800, BLUE);
        let person = solid(300, 600, RED);

        let dst = Rect::new(150.0, 64.0, 100.0, 120.0);
        let src = Rect::new(75.0, 60.0, 150.0, 240.0);
        backend.draw_clipped_region(&mut canvas, &person, src, dst, RoundedRect::new(dst, 50.0));

        assert_eq!(canvas.pixel(200, 124), RED);
        // Rounded corner of the destination keeps the background
        assert_eq!(canvas.pixel(150, 64), BLUE);
        assert_eq!(canvas.pixel(249, 183), BLUE);
        // Outside the destination entirely
        assert_eq!(canvas.pixel(10, 10), BLUE);
        assert_eq!(canvas.pixel(200, 190), BLUE);
    }

    #[test]
    fn test_draw_samples_only_the_source_region() {
        let backend = ImageRsBackend::new();
        let mut canvas = solid(10, 10, BLUE);

        // Left half green, right half red; crop only the right half
        let mut pixels = RgbaImage::from_pixel(4, 2, RED);
        for y in 0..2 {
            for x in 0..2 {
                pixels.put_pixel(x, y, Rgba([0, 255, 0, 255]));
            }
        }
        let source = Raster::from_rgba(pixels);

        let dst = Rect::new(0.0, 0.0, 10.0, 10.0);
        let src = Rect::new(2.0, 0.0, 2.0, 2.0);
        backend.draw_clipped_region(&mut canvas, &source, src, dst, RoundedRect::new(dst, 0.0));

        for y in 0..10 {
            for x in 0..10 {
                assert_eq!(canvas.pixel(x, y), RED);
            }
        }
    }

    #[test]
    fn test_encode_then_load() {
        let backend = ImageRsBackend::new();
        let encoded = backend.encode_raster(&solid(3, 2, RED)).unwrap();
        assert_eq!(encoded.mime_type(), "image/png");

        let loaded = backend.load_raster(encoded.payload()).unwrap();
        assert_eq!((loaded.width(), loaded.height()), (3, 2));
        assert_eq!(loaded.pixel(2, 1), RED);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let backend = ImageRsBackend::new();
        assert!(matches!(
            backend.load_raster(b"not an image"),
            Err(RasterError::Decode(_))
        ));
    }
}
