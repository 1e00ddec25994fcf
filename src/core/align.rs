use crate::io;
use crate::types::{BoundingBox, CalError, CalResult, GeoTransform, RasterProfile};
use gdal::raster::reproject;
use gdal::{Dataset, DriverManager};
use ndarray::{s, Array3};
use std::path::{Path, PathBuf};

/// Regrid the target raster to the reference raster's pixel resolution.
///
/// Only the pixel size changes; the coordinate reference system and the
/// target's own extent are kept. Writes `<stem>_resample.TIF` next to the
/// target and returns its path.
pub fn resample_to_reference(target: &Path, reference: &Path) -> CalResult<PathBuf> {
    log::info!(
        "Resampling: {} to grid of {}",
        target.display(),
        reference.display()
    );

    let src = Dataset::open(target)?;
    let ref_ds = Dataset::open(reference)?;
    ensure_same_projection(&src, &ref_ds, target, reference)?;

    let ref_gt = GeoTransform::from_gdal(&ref_ds.geo_transform()?);
    let x_res = ref_gt.pixel_width;
    let y_res = -ref_gt.pixel_height;

    let src_gt = GeoTransform::from_gdal(&src.geo_transform()?);
    let (grid_gt, (width, height)) = resample_grid(&src_gt, src.raster_size(), x_res, y_res)?;

    let output = sibling_path(target, "_resample")?;
    {
        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let mut dst = driver.create_with_band_type::<f32, _>(
            &output,
            width as isize,
            height as isize,
            src.raster_count(),
        )?;
        dst.set_geo_transform(&grid_gt.to_gdal())?;
        let projection = src.projection();
        if !projection.is_empty() {
            dst.set_projection(&projection)?;
        }
        for band_idx in 1..=src.raster_count() {
            dst.rasterband(band_idx)?.set_no_data_value(Some(f64::NAN))?;
        }
        reproject(&src, &dst)?;
        dst.flush_cache();
    }

    Ok(output)
}

/// Crop the resampled raster to the reference raster's footprint.
///
/// Assumes [`resample_to_reference`] already matched the pixel grid; the
/// output is explicitly tagged with the reference projection. Writes
/// `<stem>_clip.TIF` next to the input and returns its path.
pub fn clip_to_reference(resampled: &Path, reference: &Path) -> CalResult<PathBuf> {
    log::info!(
        "Clipping: {} to footprint of {}",
        resampled.display(),
        reference.display()
    );

    let ref_ds = Dataset::open(reference)?;
    let src = Dataset::open(resampled)?;
    ensure_same_projection(&src, &ref_ds, resampled, reference)?;

    let ref_gt = GeoTransform::from_gdal(&ref_ds.geo_transform()?);
    let (ref_width, ref_height) = ref_ds.raster_size();
    let bbox = ref_gt.bounding_box(ref_width, ref_height);

    let src_gt = GeoTransform::from_gdal(&src.geo_transform()?);
    let (x_off, y_off, width, height) = clip_window(&src_gt, src.raster_size(), &bbox)
        .map_err(|e| match e {
            CalError::Geometry(msg) => CalError::Geometry(format!(
                "{} (clipping {} to {})",
                msg,
                resampled.display(),
                reference.display()
            )),
            other => other,
        })?;

    let band_count = src.raster_count() as usize;
    let mut stack = Array3::<f32>::zeros((band_count, height, width));
    for band_idx in 0..band_count {
        let rasterband = src.rasterband(band_idx as isize + 1)?;
        let buffer =
            rasterband.read_as::<f32>((x_off, y_off), (width, height), (width, height), None)?;
        let band = ndarray::Array2::from_shape_vec((height, width), buffer.data).map_err(|e| {
            CalError::Geometry(format!("failed to reshape clipped band data: {}", e))
        })?;
        stack.slice_mut(s![band_idx, .., ..]).assign(&band);
    }

    let profile = RasterProfile {
        width,
        height,
        band_count,
        geo_transform: GeoTransform {
            top_left_x: bbox.min_x,
            pixel_width: src_gt.pixel_width,
            rotation_x: 0.0,
            top_left_y: bbox.max_y,
            rotation_y: 0.0,
            pixel_height: src_gt.pixel_height,
        },
        projection_wkt: ref_ds.projection(),
        no_data: Some(f64::NAN),
    };

    let output = sibling_path(resampled, "_clip")?;
    io::write_stack(&output, &stack, &profile)?;
    Ok(output)
}

/// Output grid covering the source extent at the requested resolution
pub fn resample_grid(
    src_gt: &GeoTransform,
    src_size: (usize, usize),
    x_res: f64,
    y_res: f64,
) -> CalResult<(GeoTransform, (usize, usize))> {
    if x_res <= 0.0 || y_res <= 0.0 {
        return Err(CalError::Geometry(format!(
            "invalid reference pixel resolution: {} x {}",
            x_res, y_res
        )));
    }

    let (src_width, src_height) = src_size;
    let bbox = src_gt.bounding_box(src_width, src_height);
    let width = ((bbox.max_x - bbox.min_x) / x_res).ceil() as usize;
    let height = ((bbox.max_y - bbox.min_y) / y_res).ceil() as usize;
    if width == 0 || height == 0 {
        return Err(CalError::Geometry(format!(
            "source extent collapses to an empty grid at resolution {} x {}",
            x_res, y_res
        )));
    }

    let grid_gt = GeoTransform {
        top_left_x: bbox.min_x,
        pixel_width: x_res,
        rotation_x: 0.0,
        top_left_y: bbox.max_y,
        rotation_y: 0.0,
        pixel_height: -y_res,
    };
    Ok((grid_gt, (width, height)))
}

/// Pixel window of `bbox` within a raster: (x offset, y offset, width, height)
pub fn clip_window(
    src_gt: &GeoTransform,
    src_size: (usize, usize),
    bbox: &BoundingBox,
) -> CalResult<(isize, isize, usize, usize)> {
    if src_gt.rotation_x != 0.0 || src_gt.rotation_y != 0.0 {
        return Err(CalError::Geometry(
            "rotated rasters are not supported".to_string(),
        ));
    }

    let x_off = ((bbox.min_x - src_gt.top_left_x) / src_gt.pixel_width).round() as isize;
    let y_off = ((bbox.max_y - src_gt.top_left_y) / src_gt.pixel_height).round() as isize;
    let width = ((bbox.max_x - bbox.min_x) / src_gt.pixel_width).round() as usize;
    let height = ((bbox.min_y - bbox.max_y) / src_gt.pixel_height).round() as usize;

    let (src_width, src_height) = src_size;
    if x_off < 0
        || y_off < 0
        || width == 0
        || height == 0
        || x_off as usize + width > src_width
        || y_off as usize + height > src_height
    {
        return Err(CalError::Geometry(format!(
            "reference footprint [{}, {}] {}x{} falls outside the raster ({}x{} pixels)",
            x_off, y_off, width, height, src_width, src_height
        )));
    }

    Ok((x_off, y_off, width, height))
}

/// Both rasters must share one coordinate reference system; clipping two
/// differently projected rasters would silently produce wrong output
fn ensure_same_projection(
    a: &Dataset,
    b: &Dataset,
    a_path: &Path,
    b_path: &Path,
) -> CalResult<()> {
    let (proj_a, proj_b) = (a.projection(), b.projection());
    if proj_a != proj_b {
        return Err(CalError::Geometry(format!(
            "coordinate reference systems differ between {} and {}",
            a_path.display(),
            b_path.display()
        )));
    }
    Ok(())
}

fn sibling_path(path: &Path, suffix: &str) -> CalResult<PathBuf> {
    let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
        CalError::InputDiscovery(format!("invalid raster filename: {}", path.display()))
    })?;
    Ok(path.with_file_name(format!("{}{}.TIF", stem, suffix)))
}
