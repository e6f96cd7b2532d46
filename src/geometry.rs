use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Centroid, Coord, InteriorPoint, Line, MultiPolygon, Point, Polygon, Translate};

use crate::error::{Error, Result};
use crate::model::{Record, Shape};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Offset {
    pub dx: f64,
    pub dy: f64,
}

impl Offset {
    pub fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    pub fn apply(&self, shape: &Shape) -> Shape {
        translate(shape, *self)
    }
}

pub fn centroid_of(shape: &Shape) -> Option<Point<f64>> {
    match shape {
        Shape::Point(p) => Some(*p),
        Shape::Polygon(p) => p.centroid(),
        Shape::MultiPolygon(mp) => mp.centroid(),
    }
}

// 境界の内側に必ず入る点
pub fn representative_point(boundary: &MultiPolygon<f64>) -> Result<Point<f64>> {
    boundary.interior_point().ok_or_else(|| {
        Error::InvalidGeometry("no interior point exists for the boundary".to_string())
    })
}

// 経緯度の差分そのまま（投影補正なし）
pub fn offset_between(reference: Point<f64>, target: Point<f64>) -> Offset {
    Offset::new(target.x() - reference.x(), target.y() - reference.y())
}

pub fn translate(shape: &Shape, offset: Offset) -> Shape {
    match shape {
        Shape::Point(p) => Shape::Point(p.translate(offset.dx, offset.dy)),
        Shape::Polygon(p) => Shape::Polygon(p.translate(offset.dx, offset.dy)),
        Shape::MultiPolygon(mp) => Shape::MultiPolygon(mp.translate(offset.dx, offset.dy)),
    }
}

pub fn translate_records(records: &mut [Record], offset: Offset) {
    for record in records.iter_mut() {
        record.geometry = translate(&record.geometry, offset);
    }
}

// 和集合や内部点の計算に使えないポリゴンを弾く
pub fn validate_polygon(polygon: &Polygon<f64>) -> Result<()> {
    let mut rings: Vec<Vec<Coord<f64>>> = Vec::new();
    for (idx, ring) in std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .enumerate()
    {
        if ring.0.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
            return Err(Error::InvalidGeometry(format!(
                "ring {} contains a non-finite coordinate",
                idx
            )));
        }
        if !ring.is_closed() {
            return Err(Error::InvalidGeometry(format!("ring {} is not closed", idx)));
        }

        // 連続する重複頂点は一つにまとめる
        let mut coords = ring.0.clone();
        coords.dedup();
        if coords.len() < 4 {
            return Err(Error::InvalidGeometry(format!(
                "ring {} has {} distinct coordinates, at least 4 are required",
                idx,
                coords.len()
            )));
        }
        rings.push(coords);
    }

    let mut segments: Vec<Segment> = rings
        .iter()
        .enumerate()
        .flat_map(|(ring, coords)| {
            let count = coords.len() - 1;
            coords.windows(2).enumerate().map(move |(index, pair)| {
                Segment::new(ring, index, count, Line::new(pair[0], pair[1]))
            })
        })
        .collect();

    // x 方向の範囲が重なる線分の組だけを判定する
    segments.sort_by(|a, b| a.min_x.total_cmp(&b.min_x));

    for (i, a) in segments.iter().enumerate() {
        for b in &segments[i + 1..] {
            if b.min_x > a.max_x {
                break;
            }
            if a.ring == b.ring && are_adjacent(a.index, b.index, a.count) {
                continue;
            }

            let crossing = match line_intersection(a.line, b.line) {
                None => false,
                // 別のリング同士が一点で接するのは有効
                Some(LineIntersection::SinglePoint {
                    is_proper: false, ..
                }) => a.ring == b.ring,
                Some(_) => true,
            };
            if crossing {
                return Err(Error::InvalidGeometry(format!(
                    "self-intersection between ring {} segment {} and ring {} segment {}",
                    a.ring, a.index, b.ring, b.index
                )));
            }
        }
    }

    Ok(())
}

struct Segment {
    ring: usize,
    index: usize,
    count: usize,
    line: Line<f64>,
    min_x: f64,
    max_x: f64,
}

impl Segment {
    fn new(ring: usize, index: usize, count: usize, line: Line<f64>) -> Self {
        Self {
            ring,
            index,
            count,
            line,
            min_x: line.start.x.min(line.end.x),
            max_x: line.start.x.max(line.end.x),
        }
    }
}

fn are_adjacent(a: usize, b: usize, count: usize) -> bool {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    hi - lo == 1 || (lo == 0 && hi == count - 1)
}
