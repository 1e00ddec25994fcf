//! Input/output: sensor metadata files and GDAL raster access

pub mod metadata;
pub mod raster;

// Re-export main types
pub use metadata::SensorMetadata;
pub use raster::{
    band_number, list_rasters, read_band, read_profile, read_stack, write_band, write_stack,
    RASTER_EXTENSIONS,
};
