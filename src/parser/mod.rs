pub mod geojson;
pub mod kml;
#[cfg(feature = "shapefile")]
pub mod shapefile;

use std::fs;
use std::path::Path;

use tracing::info;

use crate::boundary::FeatureCollection;
use crate::error::{Error, Result};
use crate::zip_handler::ZipHandler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryFormat {
    GeoJson,
    Kml,
    Zip,
    Shapefile,
}

impl BoundaryFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "geojson" | "json" => Ok(BoundaryFormat::GeoJson),
            "kml" => Ok(BoundaryFormat::Kml),
            "zip" => Ok(BoundaryFormat::Zip),
            "shp" => Ok(BoundaryFormat::Shapefile),
            _ => Err(Error::UnsupportedFormat(format!(
                "{}: expected .geojson, .json, .kml, .zip or .shp",
                path.display()
            ))),
        }
    }
}

pub fn load_boundary_file(path: &Path) -> Result<FeatureCollection> {
    let format = BoundaryFormat::from_path(path)?;
    info!("Loading boundary {:?} as {:?}", path, format);

    match format {
        BoundaryFormat::GeoJson => geojson::parse_feature_collection(&fs::read_to_string(path)?),
        BoundaryFormat::Kml => kml::parse_kml(&fs::read_to_string(path)?),
        BoundaryFormat::Zip => ZipHandler::new(path).read_boundary(),
        BoundaryFormat::Shapefile => read_shapefile_boundary(path),
    }
}

// ディスク上に無いエントリ用に、ファイル名で形式を判定する
pub fn parse_boundary_text(name: &str, text: &str) -> Result<FeatureCollection> {
    match BoundaryFormat::from_path(Path::new(name))? {
        BoundaryFormat::GeoJson => geojson::parse_feature_collection(text),
        BoundaryFormat::Kml => kml::parse_kml(text),
        other => Err(Error::UnsupportedFormat(format!(
            "{} ({:?}) is not a text format",
            name, other
        ))),
    }
}

#[cfg(feature = "shapefile")]
pub(crate) fn read_shapefile_boundary(path: &Path) -> Result<FeatureCollection> {
    shapefile::read_boundary(path)
}

#[cfg(not(feature = "shapefile"))]
pub(crate) fn read_shapefile_boundary(path: &Path) -> Result<FeatureCollection> {
    Err(Error::UnsupportedFormat(format!(
        "{}: shapefile support requires the `shapefile` feature",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            BoundaryFormat::from_path(Path::new("field.GeoJSON")).unwrap(),
            BoundaryFormat::GeoJson
        );
        assert_eq!(
            BoundaryFormat::from_path(Path::new("a/b/field.kml")).unwrap(),
            BoundaryFormat::Kml
        );
        assert!(matches!(
            BoundaryFormat::from_path(Path::new("field.wkt")),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_load_geojson_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("field.geojson");
        fs::write(
            &path,
            r#"{"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]}"#,
        )
        .unwrap();

        let fc = load_boundary_file(&path).unwrap();
        assert_eq!(fc.features.len(), 1);
        assert!(fc.features[0].is_polygonal());
    }

    #[test]
    fn test_binary_name_is_not_text() {
        assert!(matches!(
            parse_boundary_text("upload.zip", ""),
            Err(Error::UnsupportedFormat(_))
        ));
    }
}
