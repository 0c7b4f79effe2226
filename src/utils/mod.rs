pub mod image_ops;
pub mod metrics;

// Re-export commonly used items
pub use image_ops::{composite_and_encode_async, load_raster_async, solid_png};
pub use metrics::{Metrics, MetricsSnapshot};
