use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Pixel values of a single spectral band (rows x cols)
pub type BandImage = Array2<f32>;

/// Multi-band pixel stack, band-major (band x rows x cols)
pub type BandStack = Array3<f32>;

/// Affine mapping from pixel/line coordinates to georeferenced coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64, // negative for north-up rasters
}

impl GeoTransform {
    pub fn from_gdal(gt: &[f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// Georeferenced footprint of a raster with this transform and pixel dimensions
    pub fn bounding_box(&self, width: usize, height: usize) -> BoundingBox {
        let min_x = self.top_left_x;
        let max_y = self.top_left_y;
        BoundingBox {
            min_x,
            max_x: min_x + self.pixel_width * width as f64,
            min_y: max_y + self.pixel_height * height as f64,
            max_y,
        }
    }
}

/// Georeferenced bounding box in projected coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

/// Spatial profile of a raster file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterProfile {
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub geo_transform: GeoTransform,
    pub projection_wkt: String,
    pub no_data: Option<f64>,
}

impl RasterProfile {
    pub fn bounding_box(&self) -> BoundingBox {
        self.geo_transform.bounding_box(self.width, self.height)
    }

    /// Same profile with a different band count
    pub fn with_band_count(&self, band_count: usize) -> Self {
        Self {
            band_count,
            ..self.clone()
        }
    }
}

/// Explicit pipeline configuration, validated before any stage runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Directory of raw LISS III / AWiFS single-band rasters plus metadata file
    pub target_dir: PathBuf,
    /// Directory of reference sensor single-band reflectance rasters
    pub reference_dir: PathBuf,
}

impl CalibrationConfig {
    pub fn new(target_dir: impl Into<PathBuf>, reference_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            reference_dir: reference_dir.into(),
        }
    }

    pub fn validate(&self) -> CalResult<()> {
        for dir in [&self.target_dir, &self.reference_dir] {
            if !dir.is_dir() {
                return Err(CalError::InputDiscovery(format!(
                    "input directory does not exist: {}",
                    dir.display()
                )));
            }
        }
        Ok(())
    }
}

/// Error types for cross-calibration processing
#[derive(Debug, thiserror::Error)]
pub enum CalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Input discovery error: {0}")]
    InputDiscovery(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Geometric precondition error: {0}")]
    Geometry(String),

    #[error("Numeric error: {0}")]
    Numeric(String),
}

impl CalError {
    /// Process exit status for the error category, one code per fatal class
    pub fn exit_code(&self) -> i32 {
        match self {
            CalError::InputDiscovery(_) => 2,
            CalError::Metadata(_) => 3,
            CalError::Geometry(_) => 4,
            CalError::Numeric(_) => 5,
            CalError::Io(_) | CalError::Gdal(_) => 6,
        }
    }
}

/// Result type for cross-calibration operations
pub type CalResult<T> = Result<T, CalError>;
