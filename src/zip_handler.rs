use std::fs::File;
use std::io::{BufReader, Cursor, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::boundary::FeatureCollection;
use crate::error::{Error, Result};
use crate::parser::{parse_boundary_text, read_shapefile_boundary};

pub struct ZipHandler {
    path: PathBuf,
}

impl ZipHandler {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    // GeoJSON / KML のエントリを優先し、無ければ /vsizip/ 経由でシェープファイルを読む
    pub fn read_boundary(&self) -> Result<FeatureCollection> {
        let file = File::open(&self.path)?;
        let mut archive = ZipArchive::new(BufReader::new(file))?;

        let mut shapefile_entry: Option<String> = None;
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            // macOS が付け足すリソースフォークは無視する
            if name.starts_with("__MACOSX") {
                continue;
            }

            let lower = name.to_ascii_lowercase();
            if lower.ends_with(".geojson") || lower.ends_with(".json") || lower.ends_with(".kml") {
                info!("Reading boundary entry {} from {:?}", name, self.path);
                let mut text = String::new();
                entry.read_to_string(&mut text)?;
                return parse_boundary_text(&name, &text);
            }
            if lower.ends_with(".shp") && shapefile_entry.is_none() {
                shapefile_entry = Some(name);
            }
        }

        match shapefile_entry {
            Some(entry) => {
                let vsi = format!("/vsizip/{}/{}", self.path.display(), entry);
                debug!("Opening zipped shapefile via {}", vsi);
                read_shapefile_boundary(Path::new(&vsi))
            }
            None => Err(Error::UnsupportedFormat(format!(
                "{}: archive contains no .geojson, .json, .kml or .shp entry",
                self.path.display()
            ))),
        }
    }
}

#[derive(Default)]
pub struct ZipPackager {
    entries: Vec<(String, Vec<u8>)>,
}

impl ZipPackager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, bytes: Vec<u8>) -> &mut Self {
        self.entries.push((name.into(), bytes));
        self
    }

    pub fn add_file(&mut self, path: &Path) -> Result<&mut Self> {
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::MalformedInput(format!("{:?} has no file name", path)))?
            .to_string();
        let bytes = std::fs::read(path)?;
        Ok(self.add(name, bytes))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn finish(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, bytes) in &self.entries {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(bytes)?;
        }

        let cursor = writer.finish()?;
        let bytes = cursor.into_inner();
        debug!(
            "Packaged {} entries into {} bytes",
            self.entries.len(),
            bytes.len()
        );
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const BOUNDARY_KML: &str = r#"<kml><Placemark><name>Home</name><Polygon><outerBoundaryIs>
        <LinearRing><coordinates>0,0 2,0 2,2 0,2 0,0</coordinates></LinearRing>
        </outerBoundaryIs></Polygon></Placemark></kml>"#;

    #[test]
    fn test_package_and_read_back() {
        let mut packager = ZipPackager::new();
        packager
            .add("a.txt", b"alpha".to_vec())
            .add("b.txt", b"beta".to_vec());
        let bytes = packager.finish().unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        let mut text = String::new();
        archive
            .by_name("b.txt")
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "beta");
    }

    #[test]
    fn test_read_zipped_kml_boundary() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = temp_dir.path().join("upload.zip");

        let mut packager = ZipPackager::new();
        packager
            .add("__MACOSX/._field.kml", b"junk".to_vec())
            .add("field.kml", BOUNDARY_KML.as_bytes().to_vec());
        std::fs::write(&zip_path, packager.finish().unwrap()).unwrap();

        let fc = ZipHandler::new(&zip_path).read_boundary().unwrap();
        assert_eq!(fc.features.len(), 1);
        assert_eq!(fc.features[0].properties["Name"], "Home");
    }

    #[test]
    fn test_archive_without_boundary() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = temp_dir.path().join("empty.zip");

        let mut packager = ZipPackager::new();
        packager.add("readme.txt", b"nothing here".to_vec());
        std::fs::write(&zip_path, packager.finish().unwrap()).unwrap();

        assert!(matches!(
            ZipHandler::new(&zip_path).read_boundary(),
            Err(Error::UnsupportedFormat(_))
        ));
    }
}
