use geo::{Coord, LineString, MultiPolygon, Polygon};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Value};
use tracing::debug;

use crate::boundary::{Feature, FeatureCollection, FeatureGeometry};
use crate::error::{Error, Result};

const OTHER_GEOMETRIES: &[&str] = &["Point", "LineString", "Track", "MultiTrack", "Model"];

#[derive(Default)]
struct PolygonState {
    outer: Option<LineString<f64>>,
    inners: Vec<LineString<f64>>,
}

#[derive(Default)]
struct PlacemarkState {
    name: Option<String>,
    polygons: Vec<Polygon<f64>>,
    other_kind: Option<String>,
}

impl PlacemarkState {
    fn into_feature(self) -> Feature {
        let mut polygons = self.polygons;
        let geometry = match polygons.len() {
            0 => FeatureGeometry::Unsupported(
                self.other_kind.unwrap_or_else(|| "Placemark".to_string()),
            ),
            1 => FeatureGeometry::Polygon(polygons.remove(0)),
            _ => FeatureGeometry::MultiPolygon(MultiPolygon::new(polygons)),
        };

        let mut properties = Map::new();
        if let Some(name) = self.name {
            properties.insert("Name".to_string(), Value::String(name));
        }
        Feature {
            geometry: Some(geometry),
            properties,
        }
    }
}

pub fn parse_kml(xml: &str) -> Result<FeatureCollection> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut placemark: Option<PlacemarkState> = None;
    let mut polygon: Option<PolygonState> = None;
    let mut features = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match name.as_str() {
                    "Placemark" => placemark = Some(PlacemarkState::default()),
                    "Polygon" => polygon = Some(PolygonState::default()),
                    kind if OTHER_GEOMETRIES.contains(&kind) && polygon.is_none() => {
                        if let Some(pm) = placemark.as_mut() {
                            pm.other_kind.get_or_insert_with(|| kind.to_string());
                        }
                    }
                    _ => {}
                }
                text.clear();
                stack.push(name);
            }
            Event::Text(t) => {
                text.push_str(&t.unescape()?);
            }
            Event::CData(c) => {
                text.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                stack.pop();
                match name.as_str() {
                    "coordinates" => {
                        if let Some(state) = polygon.as_mut() {
                            let ring = parse_coordinates(&text)?;
                            if stack.iter().any(|s| s == "innerBoundaryIs") {
                                state.inners.push(ring);
                            } else if stack.iter().any(|s| s == "outerBoundaryIs") {
                                state.outer = Some(ring);
                            }
                        }
                    }
                    "name" => {
                        // Placemark 直下の name のみ採用する
                        if stack.last().map(String::as_str) == Some("Placemark") {
                            if let Some(pm) = placemark.as_mut() {
                                pm.name = Some(text.trim().to_string());
                            }
                        }
                    }
                    "Polygon" => {
                        if let Some(state) = polygon.take() {
                            match (state.outer, placemark.as_mut()) {
                                (Some(outer), Some(pm)) => {
                                    pm.polygons.push(Polygon::new(outer, state.inners))
                                }
                                (None, _) => {
                                    return Err(Error::MalformedInput(
                                        "KML Polygon without outerBoundaryIs".to_string(),
                                    ))
                                }
                                (Some(_), None) => debug!("Ignoring Polygon outside a Placemark"),
                            }
                        }
                    }
                    "Placemark" => {
                        if let Some(pm) = placemark.take() {
                            features.push(pm.into_feature());
                        }
                    }
                    _ => {}
                }
                text.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    debug!("Parsed {} placemarks from KML", features.len());
    Ok(FeatureCollection::new(features))
}

// 空白区切りの lon,lat[,alt]
fn parse_coordinates(text: &str) -> Result<LineString<f64>> {
    let coords = text
        .split_whitespace()
        .map(|tuple| {
            let mut parts = tuple.split(',').map(|v| v.trim().parse::<f64>());
            match (parts.next(), parts.next()) {
                (Some(Ok(x)), Some(Ok(y))) => Ok(Coord { x, y }),
                _ => Err(Error::MalformedInput(format!(
                    "invalid KML coordinate tuple {:?}",
                    tuple
                ))),
            }
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(LineString::new(coords))
}
