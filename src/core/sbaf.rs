use crate::core::align;
use crate::io;
use crate::types::{BandStack, CalError, CalResult};
use ndarray::{s, ArrayView2};
use std::fs;
use std::path::{Path, PathBuf};

/// Output directory for the calibrated per-band rasters, recreated on
/// every run
pub const CALIBRATED_DIR: &str = "Calibrated";

/// First physical band number of the sensor; band array index 0 maps to
/// band 2
const FIRST_BAND_NO: usize = 2;

/// Result of a calibration run: one factor and one written raster per
/// band, plus the full calibrated stack
#[derive(Debug)]
pub struct SbafOutcome {
    pub factors: Vec<f64>,
    pub calibrated: BandStack,
    pub band_paths: Vec<PathBuf>,
}

/// Compute and apply per-band SBAF factors.
///
/// The target composite is resampled and clipped onto the reference
/// composite's grid, then each band is scaled by the ratio of the two
/// sensors' mean reflectance over the common footprint. Calibrated bands
/// are written to a fresh `Calibrated` directory; all intermediates
/// (resampled, clipped, both composites) are removed once the outputs are
/// on disk.
pub fn calibrate(target_composite: &Path, reference_composite: &Path) -> CalResult<SbafOutcome> {
    let resampled = align::resample_to_reference(target_composite, reference_composite)?;
    let clipped = align::clip_to_reference(&resampled, reference_composite)?;

    log::info!("Calculating SBAF.");
    let (target, clip_profile) = io::read_stack(&clipped)?;
    let (reference, _) = io::read_stack(reference_composite)?;
    log::debug!("Target shape: {:?}", target.dim());
    log::debug!("Reference shape: {:?}", reference.dim());

    if target.dim() != reference.dim() {
        return Err(CalError::Geometry(format!(
            "clipped target shape {:?} does not match reference shape {:?} ({} vs {})",
            target.dim(),
            reference.dim(),
            clipped.display(),
            reference_composite.display()
        )));
    }

    let cal_dir = target_composite
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(CALIBRATED_DIR);
    if cal_dir.exists() {
        fs::remove_dir_all(&cal_dir)?;
    }
    fs::create_dir_all(&cal_dir)?;

    let band_count = target.dim().0;
    let band_profile = clip_profile.with_band_count(1);
    let mut factors = Vec::with_capacity(band_count);
    let mut band_paths = Vec::with_capacity(band_count);
    let mut calibrated = BandStack::zeros(target.dim());

    for idx in 0..band_count {
        let band_no = idx + FIRST_BAND_NO;
        let target_band = target.slice(s![idx, .., ..]);
        let reference_band = reference.slice(s![idx, .., ..]);

        let factor = band_factor(reference_band, target_band, band_no)?;
        log::info!("Calibrating band {}...", band_no);
        log::info!("Factor: {}", factor);

        let cal_band = target_band.mapv(|v| v * factor as f32);
        let path = cal_dir.join(format!("Band_{}_cal.TIF", band_no));
        io::write_band(&path, &cal_band, &band_profile)?;

        calibrated.slice_mut(s![idx, .., ..]).assign(&cal_band);
        factors.push(factor);
        band_paths.push(path);
    }

    // Intermediates go only after every calibrated band is on disk
    for scratch in [
        clipped.as_path(),
        resampled.as_path(),
        target_composite,
        reference_composite,
    ] {
        fs::remove_file(scratch)?;
    }

    Ok(SbafOutcome {
        factors,
        calibrated,
        band_paths,
    })
}

/// SBAF factor for one band: mean of valid reference pixels over mean of
/// valid target pixels
fn band_factor(
    reference_band: ArrayView2<f32>,
    target_band: ArrayView2<f32>,
    band_no: usize,
) -> CalResult<f64> {
    let ref_mean = mean_valid(reference_band).ok_or_else(|| {
        CalError::Numeric(format!("reference band {} has no valid pixels", band_no))
    })?;
    let target_mean = mean_valid(target_band).ok_or_else(|| {
        CalError::Numeric(format!("target band {} has no valid pixels", band_no))
    })?;
    if target_mean == 0.0 {
        return Err(CalError::Numeric(format!(
            "target band {} mean is zero, SBAF factor undefined",
            band_no
        )));
    }
    Ok(ref_mean / target_mean)
}

/// Mean of the non-NaN pixels, `None` when every pixel is invalid
fn mean_valid(band: ArrayView2<f32>) -> Option<f64> {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for &v in band.iter() {
        if !v.is_nan() {
            sum += v as f64;
            count += 1;
        }
    }
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_mean_valid_ignores_nan() {
        let band = array![[1.0f32, f32::NAN], [3.0, f32::NAN]];
        assert_relative_eq!(mean_valid(band.view()).unwrap(), 2.0);
    }

    #[test]
    fn test_mean_valid_all_nan() {
        let band = array![[f32::NAN, f32::NAN]];
        assert_eq!(mean_valid(band.view()), None);
    }

    #[test]
    fn test_band_factor_ratio_of_means() {
        let target = array![[0.1f32, 0.2], [0.3, f32::NAN]];
        let reference = array![[0.2f32, 0.4], [0.6, 0.8]];
        let factor = band_factor(reference.view(), target.view(), 2).unwrap();
        assert_relative_eq!(factor, 0.5 / 0.2, max_relative = 1e-6);
    }

    #[test]
    fn test_factor_equalizes_means() {
        // Core correctness law: scaling the target by the factor matches
        // the reference band mean
        let target = array![[0.10f32, 0.14], [0.18, 0.22]];
        let reference = array![[0.25f32, 0.31], [0.37, 0.43]];
        let factor = band_factor(reference.view(), target.view(), 3).unwrap();

        let scaled = target.mapv(|v| v * factor as f32);
        assert_relative_eq!(
            mean_valid(scaled.view()).unwrap(),
            mean_valid(reference.view()).unwrap(),
            max_relative = 1e-6
        );
    }

    #[test]
    fn test_all_invalid_target_band_is_error() {
        let target = array![[f32::NAN, f32::NAN]];
        let reference = array![[0.2f32, 0.4]];
        assert!(matches!(
            band_factor(reference.view(), target.view(), 2),
            Err(CalError::Numeric(_))
        ));
    }

    #[test]
    fn test_zero_target_mean_is_error() {
        let target = array![[0.0f32, 0.0]];
        let reference = array![[0.2f32, 0.4]];
        assert!(matches!(
            band_factor(reference.view(), target.view(), 2),
            Err(CalError::Numeric(_))
        ));
    }
}
