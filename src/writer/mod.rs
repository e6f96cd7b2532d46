#[cfg(feature = "shapefile")]
pub mod shapefile;

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::info;

use crate::error::Result;
use crate::model::GeneratedDataset;
use crate::parser::geojson::records_to_value;
use crate::zip_handler::ZipPackager;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    GeoJson,
    Shapefile,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "geojson" | "json" => Ok(OutputFormat::GeoJson),
            "shapefile" | "shp" => Ok(OutputFormat::Shapefile),
            other => Err(format!("unknown output format: {}", other)),
        }
    }
}

#[derive(Default)]
pub struct GeoJsonWriter {
    pretty: bool,
}

impl GeoJsonWriter {
    pub fn new() -> Self {
        Self { pretty: false }
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    pub fn to_bytes(&self, dataset: &GeneratedDataset) -> Result<Vec<u8>> {
        let value = records_to_value(&dataset.records);
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(&value)?
        } else {
            serde_json::to_vec(&value)?
        };
        Ok(bytes)
    }

    pub fn write(&self, dataset: &GeneratedDataset, output_path: &Path) -> Result<()> {
        fs::write(output_path, self.to_bytes(dataset)?)?;
        info!(
            "Written {} records as GeoJSON: {:?}",
            dataset.len(),
            output_path
        );
        Ok(())
    }
}

// シェープファイルは work_dir に書き出してから ZIP に詰める
pub fn build_archive(
    dataset: &GeneratedDataset,
    format: OutputFormat,
    work_dir: &Path,
) -> Result<Vec<u8>> {
    let stem = &dataset.schema.output_stem;
    let mut packager = ZipPackager::new();

    match format {
        OutputFormat::GeoJson => {
            packager.add(
                format!("{}.geojson", stem),
                GeoJsonWriter::new().to_bytes(dataset)?,
            );
        }
        OutputFormat::Shapefile => {
            for path in write_shapefile(dataset, work_dir)? {
                packager.add_file(&path)?;
            }
        }
    }

    packager.finish()
}

pub fn write_archive(
    dataset: &GeneratedDataset,
    format: OutputFormat,
    output_dir: &Path,
    prefix: Option<&str>,
) -> Result<PathBuf> {
    let file_name = match prefix {
        Some(prefix) => format!("{}_{}", prefix, dataset.schema.archive_name),
        None => dataset.schema.archive_name.clone(),
    };
    let output_path = output_dir.join(file_name);

    let bytes = match format {
        OutputFormat::GeoJson => build_archive(dataset, format, output_dir)?,
        OutputFormat::Shapefile => {
            // 並列実行でも衝突しないよう、書き込みごとに専用の作業ディレクトリを使う
            let work_dir = tempfile::Builder::new()
                .prefix(".field-mock-")
                .tempdir_in(output_dir)?;
            build_archive(dataset, format, work_dir.path())?
        }
    };

    fs::write(&output_path, bytes)?;
    info!("Written archive: {:?}", output_path);
    Ok(output_path)
}

#[cfg(feature = "shapefile")]
fn write_shapefile(dataset: &GeneratedDataset, work_dir: &Path) -> Result<Vec<PathBuf>> {
    shapefile::ShapefileWriter::new().write(dataset, work_dir)
}

#[cfg(not(feature = "shapefile"))]
fn write_shapefile(_dataset: &GeneratedDataset, _work_dir: &Path) -> Result<Vec<PathBuf>> {
    Err(crate::error::Error::UnsupportedFormat(
        "shapefile output requires the `shapefile` feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Offset;
    use crate::model::Record;
    use crate::parser::geojson::parse_records;
    use crate::schema::DatasetKind;
    use geo::Point;
    use std::io::{Cursor, Read};
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn dataset() -> GeneratedDataset {
        GeneratedDataset {
            schema: DatasetKind::Application.schema(),
            records: vec![
                Record::new(Point::new(-97.1, 36.1))
                    .with("Product", "UAN 32")
                    .with("AppliedRate", 18.7),
                Record::new(Point::new(-97.2, 36.2))
                    .with("Product", "UAN 32")
                    .with("AppliedRate", 16.2),
            ],
            anchor: Point::new(-97.15, 36.15),
            offset: Offset::new(0.7, -3.68),
        }
    }

    #[test]
    fn test_geojson_archive_contents() {
        let temp_dir = TempDir::new().unwrap();
        let bytes = build_archive(&dataset(), OutputFormat::GeoJson, temp_dir.path()).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut text = String::new();
        archive
            .by_name("Application.geojson")
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();

        let records = parse_records(&text).unwrap();
        assert_eq!(records, dataset().records);
    }

    #[test]
    fn test_write_archive_with_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_archive(
            &dataset(),
            OutputFormat::GeoJson,
            temp_dir.path(),
            Some("north40"),
        )
        .unwrap();

        assert_eq!(
            path.file_name().and_then(|s| s.to_str()),
            Some("north40_Application_Shapefile.zip")
        );
        assert!(path.exists());
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("SHP".parse::<OutputFormat>(), Ok(OutputFormat::Shapefile));
        assert_eq!("geojson".parse::<OutputFormat>(), Ok(OutputFormat::GeoJson));
        assert!("csv".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_archives_with_distinct_prefixes_coexist() {
        let temp_dir = TempDir::new().unwrap();
        let a = write_archive(&dataset(), OutputFormat::GeoJson, temp_dir.path(), Some("field_kml"))
            .unwrap();
        let b = write_archive(
            &dataset(),
            OutputFormat::GeoJson,
            temp_dir.path(),
            Some("field_geojson"),
        )
        .unwrap();

        assert_ne!(a, b);
        assert!(a.exists() && b.exists());
    }

    #[test]
    fn test_shapefile_work_dir_is_removed() {
        let temp_dir = TempDir::new().unwrap();
        // 失敗しても成功しても作業ディレクトリは残らない
        let _ = write_archive(&dataset(), OutputFormat::Shapefile, temp_dir.path(), Some("north40"));

        let leftovers: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .collect();
        assert!(leftovers.is_empty());
    }

    #[cfg(not(feature = "shapefile"))]
    #[test]
    fn test_shapefile_needs_feature() {
        use crate::error::Error;

        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            build_archive(&dataset(), OutputFormat::Shapefile, temp_dir.path()),
            Err(Error::UnsupportedFormat(_))
        ));
    }
}
