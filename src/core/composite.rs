use crate::io;
use crate::types::{BandStack, CalError, CalResult};
use ndarray::s;
use std::path::{Path, PathBuf};

/// Scale factor turning reference-sensor integer reflectance (Landsat 8 /
/// Sentinel-2 level-2 convention) into fractional reflectance
pub const REFLECTANCE_SCALE: f32 = 1.0e-4;

/// Stack the single-band rasters of one image directory into a multi-band
/// composite, in spectral band order.
///
/// Every contributing band must share the spatial dimensions of the first
/// one; `scale` is applied to each pixel as it is stacked (1.0 for the
/// target image, [`REFLECTANCE_SCALE`] for the reference image). Returns
/// the path of the written composite.
pub fn build_composite(dir: &Path, output_name: &str, scale: f32) -> CalResult<PathBuf> {
    log::info!("Stacking: {}", dir.display());

    // A composite left behind by an earlier aborted run is not an input band
    let files: Vec<_> = io::list_rasters(dir)?
        .into_iter()
        .filter(|f| f.file_name().and_then(|n| n.to_str()) != Some(output_name))
        .collect();
    if files.is_empty() {
        return Err(CalError::InputDiscovery(format!(
            "no raster files to stack in {}",
            dir.display()
        )));
    }
    let (first, profile) = io::read_band(&files[0])?;
    let (height, width) = first.dim();

    let mut stack = BandStack::zeros((files.len(), height, width));
    for (idx, file) in files.iter().enumerate() {
        let band = if idx == 0 {
            first.clone()
        } else {
            let (band, band_profile) = io::read_band(file)?;
            if (band_profile.height, band_profile.width) != (height, width) {
                return Err(CalError::Geometry(format!(
                    "band dimensions {}x{} of {} do not match {}x{} of {}",
                    band_profile.height,
                    band_profile.width,
                    file.display(),
                    height,
                    width,
                    files[0].display()
                )));
            }
            band
        };
        stack.slice_mut(s![idx, .., ..]).assign(&band.mapv(|v| v * scale));
    }

    let mut profile = profile.with_band_count(files.len());
    profile.no_data = Some(f64::NAN);

    let output = dir.join(output_name);
    io::write_stack(&output, &stack, &profile)?;
    log::debug!("Composite written: {}", output.display());
    Ok(output)
}
