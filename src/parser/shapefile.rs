use std::path::Path;

use gdal::vector::{FieldValue, LayerAccess};
use gdal::Dataset;
use serde_json::{Map, Value};
use tracing::info;

use crate::boundary::{Feature, FeatureCollection, FeatureGeometry};
use crate::error::{Error, Result};
use crate::model::{AttributeValue, Record, Shape};

// path は /vsizip/ パスでもよい
pub fn read_boundary(path: &Path) -> Result<FeatureCollection> {
    let dataset = Dataset::open(path)?;
    let mut layer = dataset.layer(0)?;

    let mut features = Vec::new();
    for feature in layer.features() {
        let geometry = match feature.geometry() {
            Some(geometry) => Some(match geometry.to_geo()? {
                geo::Geometry::Polygon(p) => FeatureGeometry::Polygon(p),
                geo::Geometry::MultiPolygon(mp) => FeatureGeometry::MultiPolygon(mp),
                other => FeatureGeometry::Unsupported(geometry_kind(&other).to_string()),
            }),
            None => None,
        };

        let properties: Map<String, Value> = feature
            .fields()
            .map(|(name, value)| (name, field_to_json(value)))
            .collect();
        features.push(Feature {
            geometry,
            properties,
        });
    }

    info!("Read {} boundary features from {:?}", features.len(), path);
    Ok(FeatureCollection::new(features))
}

pub fn read_records(path: &Path) -> Result<Vec<Record>> {
    let dataset = Dataset::open(path)?;
    let mut layer = dataset.layer(0)?;

    let mut records = Vec::new();
    for (idx, feature) in layer.features().enumerate() {
        let geometry = feature
            .geometry()
            .ok_or_else(|| Error::MalformedInput(format!("feature {} has no geometry", idx)))?;
        let shape = match geometry.to_geo()? {
            geo::Geometry::Point(p) => Shape::Point(p),
            geo::Geometry::Polygon(p) => Shape::Polygon(p),
            geo::Geometry::MultiPolygon(mp) => Shape::MultiPolygon(mp),
            other => {
                return Err(Error::UnsupportedFormat(format!(
                    "{} geometry in point dataset",
                    geometry_kind(&other)
                )))
            }
        };

        let attributes = feature
            .fields()
            .map(|(name, value)| (name, field_to_attribute(value)))
            .collect();
        records.push(Record {
            geometry: shape,
            attributes,
        });
    }

    Ok(records)
}

fn geometry_kind(geometry: &geo::Geometry<f64>) -> &'static str {
    match geometry {
        geo::Geometry::Point(_) => "Point",
        geo::Geometry::Line(_) => "Line",
        geo::Geometry::LineString(_) => "LineString",
        geo::Geometry::Polygon(_) => "Polygon",
        geo::Geometry::MultiPoint(_) => "MultiPoint",
        geo::Geometry::MultiLineString(_) => "MultiLineString",
        geo::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo::Geometry::Rect(_) => "Rect",
        geo::Geometry::Triangle(_) => "Triangle",
    }
}

fn field_to_attribute(value: Option<FieldValue>) -> AttributeValue {
    match value {
        None => AttributeValue::Null,
        Some(FieldValue::IntegerValue(i)) => AttributeValue::Integer(i as i64),
        Some(FieldValue::Integer64Value(i)) => AttributeValue::Integer(i),
        Some(FieldValue::RealValue(f)) => AttributeValue::Real(f),
        Some(FieldValue::StringValue(s)) => AttributeValue::Text(s),
        Some(FieldValue::DateValue(d)) => AttributeValue::Text(d.to_string()),
        Some(FieldValue::DateTimeValue(dt)) => AttributeValue::Text(dt.to_rfc3339()),
        Some(other) => AttributeValue::Text(format!("{:?}", other)),
    }
}

fn field_to_json(value: Option<FieldValue>) -> Value {
    match field_to_attribute(value) {
        AttributeValue::Null => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(b),
        AttributeValue::Integer(i) => Value::from(i),
        AttributeValue::Real(f) => Value::from(f),
        AttributeValue::Text(s) => Value::String(s),
    }
}
