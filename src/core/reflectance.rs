use crate::io::{self, SensorMetadata};
use crate::types::{BandImage, CalError, CalResult};
use std::f64::consts::PI;
use std::path::{Path, PathBuf};

/// Mean exo-atmospheric solar irradiance per spectral band (W/m2/um),
/// LISS III / AWiFS bands 2-5
const ESUN: [(u32, f64); 4] = [(2, 1849.5), (3, 1553.0), (4, 1092.0), (5, 239.52)];

/// DN quantization range of the sensor (10-bit)
const DN_RANGE: f64 = 1024.0;

/// Solar irradiance constant for a band number; unknown bands are an error
pub fn solar_irradiance(band_no: u32) -> CalResult<f64> {
    ESUN.iter()
        .find(|(band, _)| *band == band_no)
        .map(|(_, esun)| *esun)
        .ok_or_else(|| {
            CalError::Metadata(format!(
                "no solar irradiance constant for band {} (known bands: 2-5)",
                band_no
            ))
        })
}

/// Converts raw DN bands to top-of-atmosphere reflectance
pub struct ReflectanceConverter {
    metadata: SensorMetadata,
}

impl ReflectanceConverter {
    pub fn new(metadata: SensorMetadata) -> Self {
        Self { metadata }
    }

    /// Read sensor metadata from an image directory
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> CalResult<Self> {
        Ok(Self::new(SensorMetadata::from_dir(dir)?))
    }

    /// Convert one raw band file and write the reflectance raster into
    /// `output_dir` as `<stem>_ref.TIF`
    pub fn convert_band(
        &self,
        input: &Path,
        band_no: u32,
        output_dir: &Path,
    ) -> CalResult<PathBuf> {
        let esun = solar_irradiance(band_no)?;
        let lmax = self.metadata.field(&format!("B{}_Lmax", band_no))?;
        let lmin = self.metadata.field(&format!("B{}_Lmin", band_no))?;
        let sun_elev = self.metadata.field("SunElevationAtCenter")?;

        log::debug!(
            "Band {}: Lmin={}, Lmax={}, sun elevation={} deg",
            band_no,
            lmin,
            lmax,
            sun_elev
        );

        let (dn, profile) = io::read_band(input)?;
        let reflectance = dn_to_reflectance(&dn, lmin, lmax, sun_elev, esun);
        let reflectance = suppress_upper_tail(reflectance);

        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                CalError::InputDiscovery(format!("invalid raster filename: {}", input.display()))
            })?;
        let output = output_dir.join(format!("{}_ref.TIF", stem));

        let mut profile = profile;
        profile.no_data = Some(f64::NAN);
        io::write_band(&output, &reflectance, &profile)?;
        Ok(output)
    }

    /// Convert every raw band raster found in `input_dir`, deriving each
    /// band number from the digits in its filename
    pub fn convert_directory(input_dir: &Path, output_dir: &Path) -> CalResult<Vec<PathBuf>> {
        log::info!(
            "Radiance to reflectance conversion: {}",
            input_dir.display()
        );

        let converter = Self::from_dir(input_dir)?;
        let mut outputs = Vec::new();
        for input in io::list_rasters(input_dir)? {
            let name = input.file_name().and_then(|n| n.to_str()).unwrap_or("");
            let band_no = io::band_number(name).ok_or_else(|| {
                CalError::InputDiscovery(format!(
                    "cannot derive band number from filename: {}",
                    input.display()
                ))
            })?;
            outputs.push(converter.convert_band(&input, band_no, output_dir)?);
        }
        Ok(outputs)
    }
}

/// TOA reflectance from raw DN: linear radiance transfer followed by
/// solar-geometry normalization. Zero DN and out-of-range reflectance
/// become NaN.
pub fn dn_to_reflectance(
    dn: &BandImage,
    lmin: f64,
    lmax: f64,
    sun_elev_deg: f64,
    esun: f64,
) -> BandImage {
    let gain = (lmax - lmin) / DN_RANGE;
    let scale = PI / (esun * sun_elev_deg.to_radians().sin());

    dn.mapv(|v| {
        if v == 0.0 {
            return f32::NAN;
        }
        let radiance = lmin + gain * v as f64;
        let reflectance = (scale * radiance) as f32;
        if (0.0..=1.0).contains(&reflectance) {
            reflectance
        } else {
            f32::NAN
        }
    })
}

/// Compress the extreme upper tail: when the valid maximum exceeds the
/// 99.99th percentile, values at or above that percentile are replaced by
/// the 99.999th-percentile value
pub fn suppress_upper_tail(mut reflectance: BandImage) -> BandImage {
    let mut valid: Vec<f32> = reflectance.iter().cloned().filter(|v| !v.is_nan()).collect();
    valid.sort_by(|a, b| a.partial_cmp(b).expect("no NaN after filter"));

    let (Some(p_cut), Some(p_fill)) = (percentile(&valid, 99.99), percentile(&valid, 99.999))
    else {
        return reflectance;
    };
    let max = *valid.last().expect("non-empty after percentile");

    if max > p_cut {
        reflectance.mapv_inplace(|v| if v >= p_cut { p_fill } else { v });
    }
    reflectance
}

/// Linear-interpolation percentile of sorted values, `None` when empty
fn percentile(sorted: &[f32], pct: f64) -> Option<f32> {
    if sorted.is_empty() {
        return None;
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = sorted[rank.floor() as usize] as f64;
    let hi = sorted[rank.ceil() as usize] as f64;
    Some((lo + (hi - lo) * rank.fract()) as f32)
}
