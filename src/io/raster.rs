use crate::types::{BandImage, BandStack, CalError, CalResult, GeoTransform, RasterProfile};
use gdal::raster::Buffer;
use gdal::{Dataset, DriverManager};
use ndarray::{Array3, s};
use std::fs;
use std::path::{Path, PathBuf};

/// Accepted raster filename extensions, case-sensitive (matches the
/// heritage processing chain: lowercase/uppercase GeoTIFF plus ERDAS .img)
pub const RASTER_EXTENSIONS: [&str; 3] = ["tif", "TIF", "img"];

/// Spatial profile of a raster file without reading pixel data
pub fn read_profile<P: AsRef<Path>>(path: P) -> CalResult<RasterProfile> {
    let dataset = Dataset::open(path.as_ref())?;
    profile_of(&dataset)
}

fn profile_of(dataset: &Dataset) -> CalResult<RasterProfile> {
    let (width, height) = dataset.raster_size();
    let geo_transform = dataset.geo_transform()?;
    let no_data = dataset.rasterband(1)?.no_data_value();
    Ok(RasterProfile {
        width,
        height,
        band_count: dataset.raster_count() as usize,
        geo_transform: GeoTransform::from_gdal(&geo_transform),
        projection_wkt: dataset.projection(),
        no_data,
    })
}

/// Read the first band of a raster as f32 together with its profile
pub fn read_band<P: AsRef<Path>>(path: P) -> CalResult<(BandImage, RasterProfile)> {
    let dataset = Dataset::open(path.as_ref())?;
    let profile = profile_of(&dataset)?;
    let (width, height) = (profile.width, profile.height);

    let rasterband = dataset.rasterband(1)?;
    let buffer = rasterband.read_as::<f32>((0, 0), (width, height), (width, height), None)?;
    let image = BandImage::from_shape_vec((height, width), buffer.data).map_err(|e| {
        CalError::Geometry(format!(
            "failed to reshape band data from {}: {}",
            path.as_ref().display(),
            e
        ))
    })?;

    Ok((image, profile))
}

/// Read all bands of a raster into a band-major f32 stack
pub fn read_stack<P: AsRef<Path>>(path: P) -> CalResult<(BandStack, RasterProfile)> {
    let dataset = Dataset::open(path.as_ref())?;
    let profile = profile_of(&dataset)?;
    let (width, height) = (profile.width, profile.height);

    let mut stack = Array3::<f32>::zeros((profile.band_count, height, width));
    for band_idx in 0..profile.band_count {
        let rasterband = dataset.rasterband(band_idx as isize + 1)?;
        let buffer = rasterband.read_as::<f32>((0, 0), (width, height), (width, height), None)?;
        let band = BandImage::from_shape_vec((height, width), buffer.data).map_err(|e| {
            CalError::Geometry(format!(
                "failed to reshape band {} from {}: {}",
                band_idx + 1,
                path.as_ref().display(),
                e
            ))
        })?;
        stack.slice_mut(s![band_idx, .., ..]).assign(&band);
    }

    Ok((stack, profile))
}

/// Write a single-band Float32 GeoTIFF
pub fn write_band<P: AsRef<Path>>(
    path: P,
    image: &BandImage,
    profile: &RasterProfile,
) -> CalResult<()> {
    let stack = image.clone().insert_axis(ndarray::Axis(0));
    write_stack(path, &stack, &profile.with_band_count(1))
}

/// Write a band-major Float32 multi-band GeoTIFF.
///
/// The file is created under a temporary sibling name and renamed into
/// place once fully written, so an interrupted run never leaves a
/// truncated raster under the final name.
pub fn write_stack<P: AsRef<Path>>(
    path: P,
    stack: &BandStack,
    profile: &RasterProfile,
) -> CalResult<()> {
    let path = path.as_ref();
    let (band_count, height, width) = stack.dim();
    if band_count != profile.band_count {
        return Err(CalError::Geometry(format!(
            "profile declares {} bands but stack has {} for {}",
            profile.band_count,
            band_count,
            path.display()
        )));
    }
    log::debug!(
        "Writing {}x{}x{} raster: {}",
        band_count,
        height,
        width,
        path.display()
    );

    let tmp_path = temporary_name(path);
    {
        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let mut dataset = driver.create_with_band_type::<f32, _>(
            &tmp_path,
            width as isize,
            height as isize,
            band_count as isize,
        )?;

        dataset.set_geo_transform(&profile.geo_transform.to_gdal())?;
        if !profile.projection_wkt.is_empty() {
            dataset.set_projection(&profile.projection_wkt)?;
        }

        for band_idx in 0..band_count {
            let mut rasterband = dataset.rasterband(band_idx as isize + 1)?;
            let flat_data: Vec<f32> = stack.slice(s![band_idx, .., ..]).iter().cloned().collect();
            let buffer = Buffer::new((width, height), flat_data);
            rasterband.write((0, 0), (width, height), &buffer)?;
            rasterband.set_no_data_value(Some(profile.no_data.unwrap_or(f64::NAN)))?;
        }
        dataset.flush_cache();
    }
    fs::rename(&tmp_path, path)?;

    Ok(())
}

fn temporary_name(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}

/// Band number encoded in a raster filename (concatenated digit characters
/// of the stem, e.g. `BAND3.tif` -> 3)
pub fn band_number(file_name: &str) -> Option<u32> {
    let stem = file_name.split('.').next().unwrap_or(file_name);
    let digits: String = stem.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Single-band raster files in a directory, in spectral band order.
///
/// Files are matched by the case-sensitive extension list and sorted by
/// the band number extracted from the filename (then by name), so the Nth
/// stacked band always corresponds to the Nth physical band.
pub fn list_rasters(dir: &Path) -> CalResult<Vec<PathBuf>> {
    let mut names: Vec<String> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| RASTER_EXTENSIONS.iter().any(|ext| name.ends_with(ext)))
        .collect();

    if names.is_empty() {
        return Err(CalError::InputDiscovery(format!(
            "no raster files ({}) found in {}",
            RASTER_EXTENSIONS.join(", "),
            dir.display()
        )));
    }

    names.sort_by_key(|name| (band_number(name).unwrap_or(u32::MAX), name.clone()));
    Ok(names.into_iter().map(|name| dir.join(name)).collect())
}
