use crate::core::composite::{build_composite, REFLECTANCE_SCALE};
use crate::core::reflectance::ReflectanceConverter;
use crate::core::sbaf::{self, SbafOutcome};
use crate::types::{CalResult, CalibrationConfig};
use std::fs;

/// Subdirectory of the target image directory receiving the per-band
/// reflectance rasters, recreated on every run
pub const REFLECTANCE_DIR: &str = "Reflectance";

pub const TARGET_COMPOSITE: &str = "composite_liss.TIF";
pub const REFERENCE_COMPOSITE: &str = "composite_ref.TIF";

/// Run the full cross-calibration pipeline.
///
/// Stages execute strictly in sequence: reflectance conversion of the raw
/// target bands, compositing of both images, geometric alignment and
/// per-band SBAF calibration. Any stage failure aborts the whole run.
pub fn run(config: &CalibrationConfig) -> CalResult<SbafOutcome> {
    config.validate()?;

    let reflectance_dir = config.target_dir.join(REFLECTANCE_DIR);
    if reflectance_dir.exists() {
        fs::remove_dir_all(&reflectance_dir)?;
    }
    fs::create_dir_all(&reflectance_dir)?;

    ReflectanceConverter::convert_directory(&config.target_dir, &reflectance_dir)?;

    let target_composite = build_composite(&reflectance_dir, TARGET_COMPOSITE, 1.0)?;
    let reference_composite =
        build_composite(&config.reference_dir, REFERENCE_COMPOSITE, REFLECTANCE_SCALE)?;

    let outcome = sbaf::calibrate(&target_composite, &reference_composite)?;
    log::info!("Calibration complete, factors: {:?}", outcome.factors);
    Ok(outcome)
}
