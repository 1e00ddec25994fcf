//! CrossCal: radiometric cross-calibration of LISS III / AWiFS imagery
//!
//! This library cross-calibrates the multispectral bands of LISS III or
//! AWiFS against a reference sensor (Landsat 8, Sentinel-2) by computing a
//! per-band Spectral Band Adjustment Factor (SBAF) over the common
//! footprint of the two images. Raw digital numbers are converted to
//! top-of-atmosphere reflectance, stacked into composites, geometrically
//! aligned onto the reference grid, and scaled band by band so that both
//! sensors agree in mean radiometric response.
//!
//! Both input images must share one projection system; the pipeline
//! validates this and fails rather than producing misaligned output.

pub mod core;
pub mod io;
pub mod types;

// Re-export main types and functions for easier access
pub use types::{
    BandImage, BandStack, BoundingBox, CalError, CalResult, CalibrationConfig, GeoTransform,
    RasterProfile,
};

pub use core::{pipeline, ReflectanceConverter, SbafOutcome};
pub use io::SensorMetadata;
