/// Local compositing of two image files, no provider involved
///
/// Usage: cargo run --release --bin merge_local -- person.jpg garment.jpg [out]
///
/// The output extension always follows the written image: a merge is PNG,
/// a degraded result keeps its input's format.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use tryon_workflow::core::types::{EncodedImage, MergeQuality};
use tryon_workflow::services::compositing::{face_crop_region, placement_region, CompositingEngine};

fn load(path: &str) -> Result<EncodedImage> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path))?;
    let mime_type = image::guess_format(&bytes)
        .map(|f| f.to_mime_type().to_string())
        .unwrap_or_else(|_| "image/png".to_string());
    EncodedImage::new(mime_type, bytes).with_context(|| format!("Invalid image file {}", path))
}

fn output_path(requested: Option<&str>, image: &EncodedImage) -> PathBuf {
    Path::new(requested.unwrap_or("merged")).with_extension(image.extension())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <person> <garment> [out]", args[0]);
        std::process::exit(1);
    }

    let person = load(&args[1])?;
    let garment = load(&args[2])?;
    println!("Person:  {} ({} bytes)", args[1], person.size_bytes());
    println!("Garment: {} ({} bytes)", args[2], garment.size_bytes());

    if let (Ok(p), Ok(g)) = (image::load_from_memory(person.payload()), image::load_from_memory(garment.payload())) {
        println!("Crop:      {:?}", face_crop_region(p.width(), p.height()));
        println!("Placement: {:?}", placement_region(g.width(), g.height()));
    }

    let engine = CompositingEngine::with_default_backend(None);
    let merged = engine.merge(&person, &garment).await?;
    if merged.quality == MergeQuality::Degraded {
        println!("Warning: one input could not be decoded, writing the other unchanged");
    }

    let output = output_path(args.get(3).map(String::as_str), &merged.image);
    std::fs::write(&output, merged.image.payload())
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!(
        "✓ {} -> {} ({} bytes)",
        merged.quality.label(),
        output.display(),
        merged.image.size_bytes()
    );

    Ok(())
}
