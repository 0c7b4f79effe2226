use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;

use crate::core::errors::{RasterError, RasterResult};
use crate::core::types::{EncodedImage, Rect};
use crate::services::compositing::raster::{Raster, RasterBackend, RoundedRect};

/// Asynchronously decode raster bytes using spawn_blocking.
///
/// Image decoding is CPU-intensive, especially for large photos, and would
/// otherwise stall the async runtime.
pub async fn load_raster_async(
    backend: Arc<dyn RasterBackend>,
    bytes: Arc<Vec<u8>>,
) -> RasterResult<Raster> {
    tokio::task::spawn_blocking(move || backend.load_raster(&bytes))
        .await
        .map_err(|e| RasterError::TaskJoin(e.to_string()))?
}

/// Asynchronously draw a clipped region and encode the canvas in a single blocking operation.
///
/// Cheaper than separate draw and encode tasks since only one blocking task is spawned.
pub async fn composite_and_encode_async(
    backend: Arc<dyn RasterBackend>,
    mut canvas: Raster,
    source: Raster,
    src: Rect,
    dst: Rect,
    clip: RoundedRect,
) -> RasterResult<EncodedImage> {
    tokio::task::spawn_blocking(move || {
        backend.draw_clipped_region(&mut canvas, &source, src, dst, clip);
        backend.encode_raster(&canvas)
    })
    .await
    .map_err(|e| RasterError::TaskJoin(e.to_string()))?
}

/// Encode a solid-colour PNG. Used for self-tests and fixtures.
pub fn solid_png(width: u32, height: u32, color: [u8; 4]) -> RasterResult<Vec<u8>> {
    let img = RgbaImage::from_pixel(width, height, Rgba(color));
    let mut png_bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(RasterError::Encode)?;
    Ok(png_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::compositing::image_backend::ImageRsBackend;

    #[tokio::test]
    async fn test_load_raster_async() {
        let png = solid_png(4, 3, [255, 0, 0, 255]).unwrap();
        let raster = load_raster_async(Arc::new(ImageRsBackend::new()), Arc::new(png))
            .await
            .unwrap();
        assert_eq!((raster.width(), raster.height()), (4, 3));
    }

    #[tokio::test]
    async fn test_composite_and_encode_async() {
        let backend: Arc<dyn RasterBackend> = Arc::new(ImageRsBackend::new());
        let canvas = Raster::from_rgba(RgbaImage::from_pixel(20, 20, Rgba([0, 0, 255, 255])));
        let source = Raster::from_rgba(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let dst = Rect::new(5.0, 5.0, 10.0, 10.0);

        let encoded = composite_and_encode_async(
            backend.clone(),
            canvas,
            source,
            Rect::new(0.0, 0.0, 10.0, 10.0),
            dst,
            RoundedRect::new(dst, 2.0),
        )
        .await
        .unwrap();

        let merged = backend.load_raster(encoded.payload()).unwrap();
        assert_eq!(merged.pixel(10, 10), Rgba([255, 0, 0, 255]));
        assert_eq!(merged.pixel(0, 0), Rgba([0, 0, 255, 255]));
    }
}
