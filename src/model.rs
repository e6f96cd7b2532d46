use geo::{MultiPolygon, Point, Polygon};

use crate::geometry::Offset;
use crate::schema::DatasetSchema;

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Point(Point<f64>),
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

impl Shape {
    pub fn kind(&self) -> &'static str {
        match self {
            Shape::Point(_) => "Point",
            Shape::Polygon(_) => "Polygon",
            Shape::MultiPolygon(_) => "MultiPolygon",
        }
    }

    pub fn as_point(&self) -> Option<Point<f64>> {
        match self {
            Shape::Point(p) => Some(*p),
            _ => None,
        }
    }
}

impl From<Point<f64>> for Shape {
    fn from(point: Point<f64>) -> Self {
        Shape::Point(point)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl AttributeValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Integer(v) => Some(*v as f64),
            AttributeValue::Real(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Real(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub geometry: Shape,
    pub attributes: Vec<(String, AttributeValue)>,
}

impl Record {
    pub fn new(geometry: impl Into<Shape>) -> Self {
        Self {
            geometry: geometry.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut AttributeValue> {
        self.attributes
            .iter_mut()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    // 既存の列は位置を保ったまま上書きし、無ければ末尾に追加する
    pub fn set(&mut self, name: &str, value: impl Into<AttributeValue>) {
        let value = value.into();
        match self.get_mut(name) {
            Some(slot) => *slot = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|(key, _)| key.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ReferenceDataset {
    pub schema: DatasetSchema,
    pub records: Vec<Record>,
}

impl ReferenceDataset {
    pub fn new(schema: DatasetSchema, records: Vec<Record>) -> Self {
        Self { schema, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // 初出順に並べた全列名
    pub fn field_names(&self) -> Vec<String> {
        field_names(&self.records)
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedDataset {
    pub schema: DatasetSchema,
    pub records: Vec<Record>,
    // 参照重心の移動先（境界内の点）
    pub anchor: Point<f64>,
    pub offset: Offset,
}

impl GeneratedDataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn field_names(&self) -> Vec<String> {
        field_names(&self.records)
    }
}

fn field_names(records: &[Record]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for record in records {
        for name in record.field_names() {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_overwrites_in_place() {
        let mut record = Record::new(Point::new(0.0, 0.0))
            .with("Crop", "Corn")
            .with("WetMass", 10.0);

        record.set("Crop", "173");
        record.set("Moisture", 15.5);

        let names: Vec<&str> = record.field_names().collect();
        assert_eq!(names, vec!["Crop", "WetMass", "Moisture"]);
        assert_eq!(record.get("Crop"), Some(&AttributeValue::Text("173".into())));
    }

    #[test]
    fn test_numeric_accessors() {
        assert_eq!(AttributeValue::Integer(3).as_f64(), Some(3.0));
        assert_eq!(AttributeValue::Real(2.5).as_f64(), Some(2.5));
        assert_eq!(AttributeValue::from("x").as_f64(), None);
        assert!(AttributeValue::Null.is_null());
    }
}
