use approx::assert_relative_eq;
use crosscal::core::pipeline;
use crosscal::io::{read_band, write_band};
use crosscal::types::{CalError, CalibrationConfig, GeoTransform, RasterProfile};
use gdal::spatial_ref::SpatialRef;
use ndarray::Array2;
use std::f64::consts::PI;
use std::fs;
use std::path::Path;

const WIDTH: usize = 16;
const HEIGHT: usize = 16;
const DN: f64 = 512.0;
const SUN_ELEV_DEG: f64 = 45.0;

fn utm_profile(epsg: u32) -> RasterProfile {
    RasterProfile {
        width: WIDTH,
        height: HEIGHT,
        band_count: 1,
        geo_transform: GeoTransform {
            top_left_x: 500_000.0,
            pixel_width: 24.0,
            rotation_x: 0.0,
            top_left_y: 3_200_000.0,
            rotation_y: 0.0,
            pixel_height: -24.0,
        },
        projection_wkt: SpatialRef::from_epsg(epsg).unwrap().to_wkt().unwrap(),
        no_data: Some(f64::NAN),
    }
}

/// Reflectance the converter should produce for DN 512 with Lmin=0,
/// Lmax=100 at 45 degrees solar elevation
fn expected_reflectance(band_no: u32) -> f64 {
    let esun = match band_no {
        2 => 1849.5,
        3 => 1553.0,
        _ => unreachable!(),
    };
    let radiance = 100.0 * DN / 1024.0;
    PI * radiance / (esun * SUN_ELEV_DEG.to_radians().sin())
}

fn write_constant_band(dir: &Path, name: &str, value: f32, epsg: u32) {
    let image = Array2::from_elem((HEIGHT, WIDTH), value);
    write_band(dir.join(name), &image, &utm_profile(epsg)).unwrap();
}

fn setup_scenario(root: &Path, ref_epsg: u32) -> CalibrationConfig {
    let target_dir = root.join("liss");
    let reference_dir = root.join("reference");
    fs::create_dir_all(&target_dir).unwrap();
    fs::create_dir_all(&reference_dir).unwrap();

    // Target: two raw DN bands plus the sensor metadata file
    write_constant_band(&target_dir, "BAND2.tif", DN as f32, 32643);
    write_constant_band(&target_dir, "BAND3.tif", DN as f32, 32643);
    fs::write(
        target_dir.join("LISS_META.txt"),
        "B2_Lmax = 100\nB2_Lmin = 0\nB3_Lmax = 100\nB3_Lmin = 0\nSunElevationAtCenter = 45\n",
    )
    .unwrap();

    // Reference: scaled-integer reflectance bands whose means are exactly
    // twice the target's post-conversion means
    for band_no in [2u32, 3] {
        let value = (2.0 * expected_reflectance(band_no) / 1.0e-4) as f32;
        write_constant_band(&reference_dir, &format!("B{}.tif", band_no), value, ref_epsg);
    }

    CalibrationConfig::new(target_dir, reference_dir)
}

#[test]
fn test_end_to_end_two_band_calibration() {
    let root = tempfile::tempdir().unwrap();
    let config = setup_scenario(root.path(), 32643);

    let outcome = pipeline::run(&config).unwrap();

    // Exactly one factor per band, each 2.0
    assert_eq!(outcome.factors.len(), 2);
    for factor in &outcome.factors {
        assert_relative_eq!(*factor, 2.0, max_relative = 1e-4);
    }

    // Calibrated band means equal the reference means
    let cal_dir = config.target_dir.join("Reflectance").join("Calibrated");
    for (idx, band_no) in [2u32, 3].iter().enumerate() {
        let path = cal_dir.join(format!("Band_{}_cal.TIF", band_no));
        assert_eq!(outcome.band_paths[idx], path);

        let (band, _) = read_band(&path).unwrap();
        let mean = band.iter().filter(|v| !v.is_nan()).sum::<f32>() as f64
            / band.iter().filter(|v| !v.is_nan()).count() as f64;
        assert_relative_eq!(
            mean,
            2.0 * expected_reflectance(*band_no),
            max_relative = 1e-4
        );
    }
}

#[test]
fn test_cleanup_leaves_only_final_outputs() {
    let root = tempfile::tempdir().unwrap();
    let config = setup_scenario(root.path(), 32643);
    pipeline::run(&config).unwrap();

    let reflectance_dir = config.target_dir.join("Reflectance");
    let names: Vec<String> = fs::read_dir(&reflectance_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();

    // Per-band reflectance rasters and the Calibrated directory remain,
    // no composite/resample/clip intermediates do
    assert!(names.iter().any(|n| n == "BAND2_ref.TIF"));
    assert!(names.iter().any(|n| n == "BAND3_ref.TIF"));
    assert!(names.iter().any(|n| n == "Calibrated"));
    assert!(!names.iter().any(|n| n.contains("composite")));
    assert!(!names.iter().any(|n| n.contains("resample")));
    assert!(!names.iter().any(|n| n.contains("clip")));

    // The reference composite is removed from the reference directory too
    let ref_names: Vec<String> = fs::read_dir(&config.reference_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert!(!ref_names.iter().any(|n| n.contains("composite")));
}

#[test]
fn test_rerun_recreates_output_directories() {
    let root = tempfile::tempdir().unwrap();
    let config = setup_scenario(root.path(), 32643);
    pipeline::run(&config).unwrap();

    // Plant a stale file in Calibrated; a rerun must wipe it
    let cal_dir = config.target_dir.join("Reflectance").join("Calibrated");
    fs::write(cal_dir.join("stale.txt"), b"old").unwrap();

    pipeline::run(&config).unwrap();
    assert!(!cal_dir.join("stale.txt").exists());
    assert!(cal_dir.join("Band_2_cal.TIF").exists());
}

#[test]
fn test_projection_mismatch_fails_run() {
    let root = tempfile::tempdir().unwrap();
    let config = setup_scenario(root.path(), 32644);

    assert!(matches!(
        pipeline::run(&config),
        Err(CalError::Geometry(_))
    ));
}

#[test]
fn test_missing_metadata_field_fails_run() {
    let root = tempfile::tempdir().unwrap();
    let config = setup_scenario(root.path(), 32643);
    fs::write(
        config.target_dir.join("LISS_META.txt"),
        "B2_Lmax = 100\nB2_Lmin = 0\nSunElevationAtCenter = 45\n",
    )
    .unwrap();

    // B3 gain coefficients are absent
    assert!(matches!(
        pipeline::run(&config),
        Err(CalError::Metadata(_))
    ));
}

#[test]
fn test_empty_target_directory_fails_discovery() {
    let root = tempfile::tempdir().unwrap();
    let target_dir = root.path().join("liss");
    let reference_dir = root.path().join("reference");
    fs::create_dir_all(&target_dir).unwrap();
    fs::create_dir_all(&reference_dir).unwrap();
    fs::write(target_dir.join("LISS_META.txt"), "B2_Lmax = 100\n").unwrap();

    let config = CalibrationConfig::new(target_dir, reference_dir);
    assert!(matches!(
        pipeline::run(&config),
        Err(CalError::InputDiscovery(_))
    ));
}
