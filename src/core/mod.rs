//! Core calibration processing modules

pub mod align;
pub mod composite;
pub mod pipeline;
pub mod reflectance;
pub mod sbaf;

// Re-export main types
pub use align::{clip_to_reference, resample_to_reference};
pub use composite::{build_composite, REFLECTANCE_SCALE};
pub use reflectance::{solar_irradiance, ReflectanceConverter};
pub use sbaf::SbafOutcome;
