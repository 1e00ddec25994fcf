use crate::types::{CalError, CalResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Suffix of the sensor metadata file shipped alongside the raw bands
const METADATA_SUFFIX: &str = "_META.txt";

/// Parsed view of a sensor metadata file (`KEY = value` per line)
#[derive(Debug, Clone)]
pub struct SensorMetadata {
    path: PathBuf,
    lines: Vec<String>,
}

impl SensorMetadata {
    /// Locate the metadata file in an image directory and load its lines
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> CalResult<Self> {
        let path = find_metadata_file(dir.as_ref())?;
        Self::from_file(path)
    }

    pub fn from_file<P: Into<PathBuf>>(path: P) -> CalResult<Self> {
        let path = path.into();
        log::debug!("Reading sensor metadata: {}", path.display());
        let content = fs::read_to_string(&path)?;
        Ok(Self {
            lines: content.lines().map(str::to_string).collect(),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Numeric value of a metadata field.
    ///
    /// The field name must match the text left of the first `=` exactly;
    /// the value is the substring after the final `=`. When a field occurs
    /// on several lines the last one wins.
    pub fn field(&self, name: &str) -> CalResult<f64> {
        let mut value: Option<&str> = None;
        for line in &self.lines {
            if let Some((key, _)) = line.split_once('=') {
                if key.trim() == name {
                    value = line.rsplit('=').next();
                }
            }
        }

        let raw = value.ok_or_else(|| {
            CalError::Metadata(format!(
                "field '{}' not found in {}",
                name,
                self.path.display()
            ))
        })?;

        raw.trim().parse::<f64>().map_err(|_| {
            CalError::Metadata(format!(
                "field '{}' in {} has non-numeric value '{}'",
                name,
                self.path.display(),
                raw.trim()
            ))
        })
    }
}

/// Find the `*_META.txt` file in a directory
fn find_metadata_file(dir: &Path) -> CalResult<PathBuf> {
    let mut candidates: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(METADATA_SUFFIX))
        })
        .collect();
    candidates.sort();

    candidates.into_iter().next().ok_or_else(|| {
        CalError::InputDiscovery(format!(
            "no '*{}' metadata file found in {}",
            METADATA_SUFFIX,
            dir.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_meta(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("BAND_META.txt");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_field_lookup() {
        let dir = tempfile::tempdir().unwrap();
        write_meta(
            dir.path(),
            "B2_Lmax = 12.064\nB2_Lmin = 0.0\nSunElevationAtCenter = 43.29\n",
        );
        let meta = SensorMetadata::from_dir(dir.path()).unwrap();
        assert_eq!(meta.field("B2_Lmax").unwrap(), 12.064);
        assert_eq!(meta.field("SunElevationAtCenter").unwrap(), 43.29);
    }

    #[test]
    fn test_last_match_wins() {
        let dir = tempfile::tempdir().unwrap();
        write_meta(dir.path(), "B2_Lmax = 1.0\nB2_Lmax = 2.0\n");
        let meta = SensorMetadata::from_dir(dir.path()).unwrap();
        assert_eq!(meta.field("B2_Lmax").unwrap(), 2.0);
    }

    #[test]
    fn test_exact_field_name_match() {
        // "B2_Lmax" must not be picked up when looking for "B2_L"
        let dir = tempfile::tempdir().unwrap();
        write_meta(dir.path(), "B2_Lmax = 1.0\n");
        let meta = SensorMetadata::from_dir(dir.path()).unwrap();
        assert!(matches!(meta.field("B2_L"), Err(CalError::Metadata(_))));
    }

    #[test]
    fn test_missing_field_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write_meta(dir.path(), "B2_Lmax = 1.0\n");
        let meta = SensorMetadata::from_dir(dir.path()).unwrap();
        assert!(matches!(meta.field("B9_Lmax"), Err(CalError::Metadata(_))));
    }

    #[test]
    fn test_non_numeric_value_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write_meta(dir.path(), "DateOfPass = 25-NOV-2021\n");
        let meta = SensorMetadata::from_dir(dir.path()).unwrap();
        assert!(matches!(
            meta.field("DateOfPass"),
            Err(CalError::Metadata(_))
        ));
    }

    #[test]
    fn test_value_after_final_equals() {
        let dir = tempfile::tempdir().unwrap();
        write_meta(dir.path(), "B3_Lmin == 0.5\n");
        let meta = SensorMetadata::from_dir(dir.path()).unwrap();
        assert_eq!(meta.field("B3_Lmin").unwrap(), 0.5);
    }

    #[test]
    fn test_no_metadata_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            SensorMetadata::from_dir(dir.path()),
            Err(CalError::InputDiscovery(_))
        ));
    }
}
