use geo::{Area, BooleanOps, BoundingRect, Coord, MultiPolygon, Point, Polygon, Rect};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::geometry::{representative_point, validate_polygon};

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureGeometry {
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
    // ポリゴン以外の種類。スキップした内容の報告にだけ使う
    Unsupported(String),
}

impl FeatureGeometry {
    pub fn kind(&self) -> &str {
        match self {
            FeatureGeometry::Polygon(_) => "Polygon",
            FeatureGeometry::MultiPolygon(_) => "MultiPolygon",
            FeatureGeometry::Unsupported(kind) => kind,
        }
    }

    fn polygons(&self) -> Vec<Polygon<f64>> {
        match self {
            FeatureGeometry::Polygon(p) => vec![p.clone()],
            FeatureGeometry::MultiPolygon(mp) => mp.0.clone(),
            FeatureGeometry::Unsupported(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Option<FeatureGeometry>,
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn new(geometry: FeatureGeometry) -> Self {
        Self {
            geometry: Some(geometry),
            properties: Map::new(),
        }
    }

    pub fn is_polygonal(&self) -> bool {
        matches!(
            self.geometry,
            Some(FeatureGeometry::Polygon(_)) | Some(FeatureGeometry::MultiPolygon(_))
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn extend(&mut self, other: FeatureCollection) {
        self.features.extend(other.features);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    shape: MultiPolygon<f64>,
}

impl Boundary {
    pub fn new(shape: MultiPolygon<f64>) -> Result<Self> {
        if shape.0.is_empty() {
            return Err(Error::MissingBoundary);
        }
        for polygon in &shape.0 {
            validate_polygon(polygon)?;
        }
        Ok(Self { shape })
    }

    pub fn shape(&self) -> &MultiPolygon<f64> {
        &self.shape
    }

    pub fn into_shape(self) -> MultiPolygon<f64> {
        self.shape
    }

    pub fn representative_point(&self) -> Result<Point<f64>> {
        representative_point(&self.shape)
    }

    // 平面上の面積（平方度）
    pub fn area(&self) -> f64 {
        self.shape.unsigned_area()
    }

    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.shape.bounding_rect()
    }

    // 外接矩形の中心
    pub fn center(&self) -> Option<Point<f64>> {
        self.bounds().map(|rect| {
            let Coord { x, y } = rect.center();
            Point::new(x, y)
        })
    }
}

// 手描きとアップロードのポリゴンを一つの境界にまとめる（重なりは一度だけ数える）
pub fn resolve(drawn: &[Feature], uploaded: Option<&FeatureCollection>) -> Result<Boundary> {
    let uploaded_features = uploaded.map(|fc| fc.features.as_slice()).unwrap_or(&[]);

    let mut polygons = Vec::new();
    let mut skipped = 0usize;
    for feature in drawn.iter().chain(uploaded_features.iter()) {
        match &feature.geometry {
            Some(geometry) if feature.is_polygonal() => polygons.extend(geometry.polygons()),
            Some(geometry) => {
                debug!("Skipping {} feature in boundary input", geometry.kind());
                skipped += 1;
            }
            None => skipped += 1,
        }
    }

    if polygons.is_empty() {
        return Err(Error::MissingBoundary);
    }

    for polygon in &polygons {
        validate_polygon(polygon)?;
    }

    // 一つずつ和集合を取って重なり部分を一回だけ数える
    let mut merged = MultiPolygon::new(Vec::new());
    for polygon in polygons.iter() {
        merged = merged.union(&MultiPolygon::new(vec![polygon.clone()]));
    }

    info!(
        "Resolved boundary from {} polygons ({} drawn, {} uploaded features, {} skipped) into {} parts",
        polygons.len(),
        drawn.len(),
        uploaded_features.len(),
        skipped,
        merged.0.len()
    );

    if merged.0.is_empty() {
        return Err(Error::InvalidGeometry(
            "boundary polygons enclose no area".to_string(),
        ));
    }

    Ok(Boundary { shape: merged })
}
