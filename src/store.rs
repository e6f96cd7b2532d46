use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};
use crate::model::{Record, ReferenceDataset};
use crate::parser::geojson;
use crate::schema::DatasetSchema;

#[cfg(feature = "shapefile")]
const DATASET_EXTENSIONS: &[&str] = &["geojson", "json", "shp"];
#[cfg(not(feature = "shapefile"))]
const DATASET_EXTENSIONS: &[&str] = &["geojson", "json"];

impl ReferenceDataset {
    // dir 内で名前順に最初のデータファイルを読み込む
    pub fn load<P: AsRef<Path>>(dir: P, schema: DatasetSchema) -> Result<Self> {
        let dir = dir.as_ref();
        let path = find_dataset_file(dir)?;
        let records = read_records(&path)?;

        info!(
            "Loaded {} {} reference records from {:?}",
            records.len(),
            schema.name,
            path
        );
        Ok(ReferenceDataset::new(schema, records))
    }
}

fn find_dataset_file(dir: &Path) -> Result<PathBuf> {
    if !dir.is_dir() {
        return Err(Error::MissingReferenceData {
            path: dir.to_path_buf(),
            reason: "directory not found".to_string(),
        });
    }

    let mut candidates: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && has_dataset_extension(path))
        .collect();
    candidates.sort();

    candidates
        .into_iter()
        .next()
        .ok_or_else(|| Error::MissingReferenceData {
            path: dir.to_path_buf(),
            reason: format!("no file with extension {:?}", DATASET_EXTENSIONS),
        })
}

fn has_dataset_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            DATASET_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

fn read_records(path: &Path) -> Result<Vec<Record>> {
    let is_shapefile = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("shp"))
        .unwrap_or(false);

    if is_shapefile {
        read_shapefile_records(path)
    } else {
        geojson::parse_records(&fs::read_to_string(path)?)
    }
}

#[cfg(feature = "shapefile")]
fn read_shapefile_records(path: &Path) -> Result<Vec<Record>> {
    crate::parser::shapefile::read_records(path)
}

#[cfg(not(feature = "shapefile"))]
fn read_shapefile_records(path: &Path) -> Result<Vec<Record>> {
    Err(Error::UnsupportedFormat(format!(
        "{}: shapefile support requires the `shapefile` feature",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DatasetKind;
    use tempfile::TempDir;

    #[test]
    fn test_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let err =
            ReferenceDataset::load(temp_dir.path().join("Yield"), DatasetKind::Yield.schema())
                .unwrap_err();
        assert!(matches!(err, Error::MissingReferenceData { .. }));
    }

    #[test]
    fn test_directory_without_dataset() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "no data").unwrap();
        let err = ReferenceDataset::load(temp_dir.path(), DatasetKind::Yield.schema()).unwrap_err();
        assert!(matches!(err, Error::MissingReferenceData { .. }));
    }

    #[test]
    fn test_loads_uppercase_extension() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("YIELD.GEOJSON"),
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1, 2]},
                 "properties": {"WetMass": 3.5}}
            ]}"#,
        )
        .unwrap();

        let dataset = ReferenceDataset::load(temp_dir.path(), DatasetKind::Yield.schema()).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.schema.measured_field, "WetMass");
    }
}
