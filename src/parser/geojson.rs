use geo::{Coord, LineString, MultiPolygon, Point, Polygon};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::boundary::{Feature, FeatureCollection, FeatureGeometry};
use crate::error::{Error, Result};
use crate::model::{AttributeValue, Record, Shape};

#[derive(Debug, Deserialize)]
struct RawFeature {
    #[serde(default)]
    geometry: Option<RawGeometry>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct RawGeometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

// FeatureCollection、単一の Feature、ジオメトリ単体のいずれも受け付ける
pub fn parse_feature_collection(json: &str) -> Result<FeatureCollection> {
    let raw = raw_features(json)?;
    let features = raw
        .into_iter()
        .map(|f| {
            let geometry = f.geometry.map(|g| boundary_geometry(&g)).transpose()?;
            Ok(Feature {
                geometry,
                properties: f.properties.unwrap_or_default(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(FeatureCollection::new(features))
}

pub fn parse_records(json: &str) -> Result<Vec<Record>> {
    raw_features(json)?
        .into_iter()
        .enumerate()
        .map(|(idx, f)| {
            let geometry = f.geometry.ok_or_else(|| {
                Error::MalformedInput(format!("feature {} has no geometry", idx))
            })?;
            let attributes = f
                .properties
                .unwrap_or_default()
                .into_iter()
                .map(|(key, value)| (key, attribute_from_json(value)))
                .collect();
            Ok(Record {
                geometry: record_shape(&geometry)?,
                attributes,
            })
        })
        .collect()
}

pub fn records_to_value(records: &[Record]) -> Value {
    let features: Vec<Value> = records
        .iter()
        .map(|record| {
            let properties: Map<String, Value> = record
                .attributes
                .iter()
                .map(|(key, value)| (key.clone(), attribute_to_json(value)))
                .collect();
            json!({
                "type": "Feature",
                "geometry": shape_to_json(&record.geometry),
                "properties": properties,
            })
        })
        .collect();

    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

fn raw_features(json: &str) -> Result<Vec<RawFeature>> {
    let value: Value = serde_json::from_str(json)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MalformedInput("GeoJSON object has no \"type\"".to_string()))?;

    match kind {
        "FeatureCollection" => {
            let features = value.get("features").cloned().unwrap_or(Value::Array(vec![]));
            Ok(serde_json::from_value(features)?)
        }
        "Feature" => Ok(vec![serde_json::from_value(value)?]),
        _ => Ok(vec![RawFeature {
            geometry: Some(serde_json::from_value(value)?),
            properties: None,
        }]),
    }
}

fn boundary_geometry(raw: &RawGeometry) -> Result<FeatureGeometry> {
    match raw.kind.as_str() {
        "Polygon" => Ok(FeatureGeometry::Polygon(polygon(&raw.coordinates)?)),
        "MultiPolygon" => Ok(FeatureGeometry::MultiPolygon(multi_polygon(&raw.coordinates)?)),
        other => Ok(FeatureGeometry::Unsupported(other.to_string())),
    }
}

fn record_shape(raw: &RawGeometry) -> Result<Shape> {
    match raw.kind.as_str() {
        "Point" => {
            let position: Vec<f64> = serde_json::from_value(raw.coordinates.clone())?;
            Ok(Shape::Point(Point::from(coord(&position)?)))
        }
        "Polygon" => Ok(Shape::Polygon(polygon(&raw.coordinates)?)),
        "MultiPolygon" => Ok(Shape::MultiPolygon(multi_polygon(&raw.coordinates)?)),
        other => Err(Error::UnsupportedFormat(format!(
            "{} geometry in point dataset",
            other
        ))),
    }
}

fn coord(position: &[f64]) -> Result<Coord<f64>> {
    match position {
        [x, y, ..] => Ok(Coord { x: *x, y: *y }),
        _ => Err(Error::MalformedInput(format!(
            "position needs at least two values, got {:?}",
            position
        ))),
    }
}

fn ring(positions: &[Vec<f64>]) -> Result<LineString<f64>> {
    positions
        .iter()
        .map(|p| coord(p))
        .collect::<Result<Vec<_>>>()
        .map(LineString::new)
}

fn polygon_from_rings(rings: &[Vec<Vec<f64>>]) -> Result<Polygon<f64>> {
    let (exterior, interiors) = rings
        .split_first()
        .ok_or_else(|| Error::MalformedInput("polygon without rings".to_string()))?;
    let interiors = interiors
        .iter()
        .map(|r| ring(r))
        .collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(ring(exterior)?, interiors))
}

fn polygon(coordinates: &Value) -> Result<Polygon<f64>> {
    let rings: Vec<Vec<Vec<f64>>> = serde_json::from_value(coordinates.clone())?;
    polygon_from_rings(&rings)
}

fn multi_polygon(coordinates: &Value) -> Result<MultiPolygon<f64>> {
    let polygons: Vec<Vec<Vec<Vec<f64>>>> = serde_json::from_value(coordinates.clone())?;
    polygons
        .iter()
        .map(|rings| polygon_from_rings(rings))
        .collect::<Result<Vec<_>>>()
        .map(MultiPolygon::new)
}

fn ring_to_json(ring: &LineString<f64>) -> Value {
    Value::Array(ring.coords().map(|c| json!([c.x, c.y])).collect())
}

fn polygon_to_json(polygon: &Polygon<f64>) -> Value {
    Value::Array(
        std::iter::once(polygon.exterior())
            .chain(polygon.interiors().iter())
            .map(ring_to_json)
            .collect(),
    )
}

fn shape_to_json(shape: &Shape) -> Value {
    match shape {
        Shape::Point(p) => json!({ "type": "Point", "coordinates": [p.x(), p.y()] }),
        Shape::Polygon(p) => json!({ "type": "Polygon", "coordinates": polygon_to_json(p) }),
        Shape::MultiPolygon(mp) => json!({
            "type": "MultiPolygon",
            "coordinates": mp.0.iter().map(polygon_to_json).collect::<Vec<_>>(),
        }),
    }
}

fn attribute_from_json(value: Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null,
        Value::Bool(b) => AttributeValue::Bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Integer(i),
            None => n
                .as_f64()
                .map(AttributeValue::Real)
                .unwrap_or(AttributeValue::Null),
        },
        Value::String(s) => AttributeValue::Text(s),
        other => AttributeValue::Text(other.to_string()),
    }
}

fn attribute_to_json(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Null => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Integer(i) => json!(i),
        // JSON has no NaN/inf; serde_json turns those into null anyway
        AttributeValue::Real(f) => json!(f),
        AttributeValue::Text(s) => Value::String(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_collection_with_mixed_geometries() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"Name": "north"},
                 "geometry": {"type": "Polygon",
                              "coordinates": [[[-97.1, 36.1], [-97.0, 36.1], [-97.0, 36.2], [-97.1, 36.1]]]}},
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "Point", "coordinates": [-97.05, 36.15]}},
                {"type": "Feature", "properties": null, "geometry": null}
            ]
        }"#;

        let fc = parse_feature_collection(json).unwrap();
        assert_eq!(fc.features.len(), 3);
        assert!(fc.features[0].is_polygonal());
        assert_eq!(fc.features[0].properties["Name"], "north");
        assert_eq!(
            fc.features[1].geometry,
            Some(FeatureGeometry::Unsupported("Point".to_string()))
        );
        assert_eq!(fc.features[2].geometry, None);
    }

    #[test]
    fn test_bare_multipolygon_with_altitude() {
        let json = r#"{"type": "MultiPolygon", "coordinates": [
            [[[0, 0, 100], [1, 0, 100], [1, 1, 100], [0, 0, 100]]],
            [[[5, 5], [6, 5], [6, 6], [5, 5]], [[5.2, 5.1], [5.8, 5.1], [5.8, 5.7], [5.2, 5.1]]]
        ]}"#;

        let fc = parse_feature_collection(json).unwrap();
        let Some(FeatureGeometry::MultiPolygon(mp)) = &fc.features[0].geometry else {
            panic!("expected a multipolygon");
        };
        assert_eq!(mp.0.len(), 2);
        assert_eq!(mp.0[1].interiors().len(), 1);
    }

    #[test]
    fn test_records_keep_property_order_and_types() {
        let json = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [116.92, -30.65]},
             "properties": {"WetMass": 12.5, "Crop": 173, "Time": "03/14/2022 10:15:30 AM", "Moisture": null}}
        ]}"#;

        let records = parse_records(json).unwrap();
        let names: Vec<&str> = records[0].field_names().collect();
        assert_eq!(names, vec!["WetMass", "Crop", "Time", "Moisture"]);
        assert_eq!(records[0].get("Crop"), Some(&AttributeValue::Integer(173)));
        assert_eq!(records[0].get("WetMass"), Some(&AttributeValue::Real(12.5)));
        assert_eq!(
            records[0].geometry.as_point(),
            Some(Point::new(116.92, -30.65))
        );
    }

    #[test]
    fn test_records_reject_lines() {
        let json = r#"{"type": "Feature", "properties": {},
            "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}}"#;
        assert!(matches!(
            parse_records(json),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_written_collection_reads_back() {
        let records = vec![Record::new(Point::new(1.5, -2.5))
            .with("Product", "UAN 32")
            .with("AppliedRate", 17.0)];
        let value = records_to_value(&records);

        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["features"][0]["geometry"]["coordinates"][0], 1.5);
        assert_eq!(value["features"][0]["properties"]["Product"], "UAN 32");

        let parsed = parse_records(&value.to_string()).unwrap();
        assert_eq!(parsed, records);
    }

    #[test]
    fn test_missing_type_is_malformed() {
        assert!(matches!(
            parse_feature_collection(r#"{"features": []}"#),
            Err(Error::MalformedInput(_))
        ));
    }
}
