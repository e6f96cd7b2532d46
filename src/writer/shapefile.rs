use std::path::{Path, PathBuf};

use gdal::spatial_ref::SpatialRef;
use gdal::vector::{
    FieldValue, LayerAccess, LayerOptions, OGRFieldType, OGRwkbGeometryType, ToGdal,
};
use gdal::DriverManager;
use tracing::info;

use crate::error::{Error, Result};
use crate::model::{AttributeValue, GeneratedDataset, Record, Shape};

const EXTENSIONS: &[&str] = &["shp", "shx", "dbf", "prj"];

#[derive(Default)]
pub struct ShapefileWriter {}

impl ShapefileWriter {
    pub fn new() -> Self {
        Self {}
    }

    pub fn write(&self, dataset: &GeneratedDataset, dir: &Path) -> Result<Vec<PathBuf>> {
        let stem = &dataset.schema.output_stem;
        let shp_path = dir.join(format!("{}.shp", stem));

        let geometry_type = layer_geometry_type(&dataset.records)?;
        let field_names = dataset.field_names();
        let field_types: Vec<(&str, u32)> = field_names
            .iter()
            .map(|name| (name.as_str(), field_type(&dataset.records, name)))
            .collect();

        {
            let driver = DriverManager::get_driver_by_name("ESRI Shapefile")?;
            let mut output = driver.create_vector_only(&shp_path)?;
            let srs = SpatialRef::from_epsg(4326)?;
            let layer = output.create_layer(LayerOptions {
                name: stem,
                srs: Some(&srs),
                ty: geometry_type,
                ..Default::default()
            })?;
            layer.create_defn_fields(&field_types)?;

            let mut layer = layer;
            for record in &dataset.records {
                let geometry = match &record.geometry {
                    Shape::Point(p) => p.to_gdal()?,
                    Shape::Polygon(p) => p.to_gdal()?,
                    Shape::MultiPolygon(mp) => mp.to_gdal()?,
                };

                // NULL の列は書き込まずに未設定のままにする
                let (names, values): (Vec<&str>, Vec<FieldValue>) = record
                    .attributes
                    .iter()
                    .filter_map(|(name, value)| {
                        to_field_value(value).map(|v| (name.as_str(), v))
                    })
                    .unzip();
                layer.create_feature_fields(geometry, &names, &values)?;
            }
        }

        let written: Vec<PathBuf> = EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{}.{}", stem, ext)))
            .filter(|path| path.exists())
            .collect();
        info!(
            "Written {} records as shapefile: {:?}",
            dataset.len(),
            shp_path
        );
        Ok(written)
    }
}

fn layer_geometry_type(records: &[Record]) -> Result<u32> {
    let mut kinds = records.iter().map(|r| match r.geometry {
        Shape::Point(_) => OGRwkbGeometryType::wkbPoint,
        Shape::Polygon(_) | Shape::MultiPolygon(_) => OGRwkbGeometryType::wkbMultiPolygon,
    });
    let first = kinds.next().unwrap_or(OGRwkbGeometryType::wkbPoint);
    if kinds.any(|k| k != first) {
        return Err(Error::UnsupportedFormat(
            "a shapefile layer cannot mix points and polygons".to_string(),
        ));
    }
    Ok(first)
}

fn field_type(records: &[Record], name: &str) -> u32 {
    let mut ty = OGRFieldType::OFTInteger64;
    for value in records.iter().filter_map(|r| r.get(name)) {
        match value {
            AttributeValue::Text(_) => return OGRFieldType::OFTString,
            AttributeValue::Real(_) => ty = OGRFieldType::OFTReal,
            AttributeValue::Null | AttributeValue::Bool(_) | AttributeValue::Integer(_) => {}
        }
    }
    ty
}

fn to_field_value(value: &AttributeValue) -> Option<FieldValue> {
    match value {
        AttributeValue::Null => None,
        AttributeValue::Bool(b) => Some(FieldValue::Integer64Value(i64::from(*b))),
        AttributeValue::Integer(i) => Some(FieldValue::Integer64Value(*i)),
        AttributeValue::Real(f) => Some(FieldValue::RealValue(*f)),
        AttributeValue::Text(s) => Some(FieldValue::StringValue(s.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Offset;
    use crate::parser::shapefile::read_records;
    use crate::schema::DatasetKind;
    use geo::Point;
    use tempfile::TempDir;

    fn init_gdal() -> bool {
        DriverManager::get_driver_by_name("ESRI Shapefile").is_ok()
    }

    #[test]
    fn test_write_and_read_back() {
        if !init_gdal() {
            eprintln!("Skipping test: ESRI Shapefile driver not available");
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        let dataset = GeneratedDataset {
            schema: DatasetKind::Yield.schema(),
            records: vec![
                Record::new(Point::new(-97.1, 36.1))
                    .with("Crop", "173")
                    .with("WetMass", 812.5)
                    .with("Time", "07/04/2024 10:15:30 AM"),
                Record::new(Point::new(-97.2, 36.2))
                    .with("Crop", "173")
                    .with("WetMass", 790.0)
                    .with("Time", "07/04/2024 10:15:31 AM"),
            ],
            anchor: Point::new(-97.15, 36.15),
            offset: Offset::default(),
        };

        let written = ShapefileWriter::new()
            .write(&dataset, temp_dir.path())
            .unwrap();
        assert!(written.iter().any(|p| p.extension().unwrap() == "dbf"));

        let records = read_records(&temp_dir.path().join("new_yield.shp")).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].geometry.as_point(), Some(Point::new(-97.1, 36.1)));
        assert_eq!(
            records[1].get("WetMass").and_then(AttributeValue::as_f64),
            Some(790.0)
        );
    }
}
