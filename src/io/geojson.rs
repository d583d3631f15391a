use std::{fs, path::Path, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::Value;

use crate::error::InputError;
use crate::geom::{Crs, PartitionLayer};

/// Loads a GeoJSON FeatureCollection of polygon features as a partition layer.
///
/// The unit identifier is read from the `id_field` property. The CRS comes from
/// `declared` or the collection's `crs` member; when both are given they must
/// agree, and when neither is, the layer is rejected.
pub fn read_geojson_layer(path: &Path, name: &str, id_field: &str, declared: Option<Crs>) -> Result<PartitionLayer> {
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read GeoJSON file: {}", path.display()))?;
    parse_geojson_layer(&bytes, name, id_field, declared)
        .with_context(|| format!("Invalid boundary layer: {}", path.display()))
}

/// Parses GeoJSON bytes into a partition layer (see [`read_geojson_layer`]).
pub fn parse_geojson_layer(bytes: &[u8], name: &str, id_field: &str, declared: Option<Crs>) -> Result<PartitionLayer> {
    let value: Value = serde_json::from_slice(bytes).context("Failed to parse GeoJSON bytes")?;
    let layer: Arc<str> = Arc::from(name);

    if value["type"].as_str() != Some("FeatureCollection") {
        bail!("expected a GeoJSON FeatureCollection");
    }

    let crs = match (declared, embedded_crs(&value)?) {
        (Some(declared), Some(embedded)) if declared != embedded => {
            return Err(InputError::CrsMismatch {
                layer,
                found: embedded.to_string(),
                expected: declared.to_string(),
            }.into())
        }
        (Some(crs), _) | (None, Some(crs)) => crs,
        (None, None) => return Err(InputError::MissingCrs { layer }.into()),
    };

    let features = value["features"].as_array()
        .ok_or_else(|| anyhow!("FeatureCollection has no features array"))?;

    let mut ids = Vec::with_capacity(features.len());
    let mut shapes = Vec::with_capacity(features.len());
    for (index, feature) in features.iter().enumerate() {
        let id = match &feature["properties"][id_field] {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return Err(InputError::MissingId { layer: layer.clone(), index }.into()),
        };

        let geometry = &feature["geometry"];
        let coords = geometry["coordinates"].as_array();
        let shape = match (geometry["type"].as_str(), coords) {
            (Some("Polygon"), Some(rings)) => MultiPolygon(vec![parse_polygon_coords(rings)?]),
            (Some("MultiPolygon"), Some(polygons)) => polygons.iter()
                .map(|polygon| polygon.as_array()
                    .ok_or_else(|| anyhow!("Invalid MultiPolygon: polygon is not an array"))
                    .and_then(|rings| parse_polygon_coords(rings)))
                .collect::<Result<Vec<_>>>()
                .map(MultiPolygon)?,
            (None, _) | (Some("Polygon" | "MultiPolygon"), None) => {
                return Err(InputError::EmptyGeometry { layer: layer.clone(), id }.into())
            }
            (Some(kind), _) => {
                return Err(InputError::NonPolygonal { layer: layer.clone(), id, kind: kind.to_string() }.into())
            }
        };

        ids.push(id);
        shapes.push(shape);
    }

    Ok(PartitionLayer::new(name, crs, ids, shapes)?)
}

/// The legacy (pre-RFC 7946) named `crs` member, if present.
fn embedded_crs(value: &Value) -> Result<Option<Crs>> {
    match value["crs"]["properties"]["name"].as_str() {
        Some(name) => Ok(Some(name.parse::<Crs>()?)),
        None => Ok(None),
    }
}

/// Parse GeoJSON Polygon coordinates: `[exterior, hole, hole, ...]`.
fn parse_polygon_coords(rings: &[Value]) -> Result<Polygon<f64>> {
    let mut rings = rings.iter().map(|ring| {
        ring.as_array()
            .ok_or_else(|| anyhow!("Invalid Polygon: ring is not an array"))
            .and_then(|coords| parse_ring_coords(coords))
    });

    let exterior = rings.next()
        .ok_or_else(|| anyhow!("Invalid Polygon: missing exterior ring"))??;
    let interiors = rings.collect::<Result<Vec<_>>>()?;

    Ok(Polygon::new(exterior, interiors))
}

/// Parse a ring (exterior or interior) from GeoJSON coordinates.
/// Format: [[x, y], [x, y], ...]
fn parse_ring_coords(coords: &[Value]) -> Result<LineString<f64>> {
    let mut points = Vec::with_capacity(coords.len());

    for coord_pair in coords {
        let pair = coord_pair.as_array()
            .filter(|pair| pair.len() >= 2)
            .ok_or_else(|| anyhow!("Invalid coordinate: expected [x, y]"))?;
        let x = pair[0].as_f64()
            .ok_or_else(|| anyhow!("Invalid coordinate: x must be a number"))?;
        let y = pair[1].as_f64()
            .ok_or_else(|| anyhow!("Invalid coordinate: y must be a number"))?;
        points.push(Coord { x, y });
    }

    // Ensure ring is closed (first point == last point)
    if !points.is_empty() && points[0] != points[points.len() - 1] {
        points.push(points[0]);
    }

    Ok(LineString(points))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARES: &str = r#"{
        "type": "FeatureCollection",
        "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::5070" } },
        "features": [
            { "type": "Feature", "properties": { "CODE": "A" },
              "geometry": { "type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]] } },
            { "type": "Feature", "properties": { "CODE": 7 },
              "geometry": { "type": "MultiPolygon", "coordinates": [
                  [[[10,0],[20,0],[20,10],[10,10]]],
                  [[[30,0],[40,0],[40,10],[30,10],[30,0]], [[32,2],[34,2],[34,4],[32,4],[32,2]]]
              ] } }
        ]
    }"#;

    #[test]
    fn reads_polygons_and_multipolygons() {
        let layer = parse_geojson_layer(SQUARES.as_bytes(), "hoods", "CODE", None).unwrap();
        assert_eq!(layer.crs(), &Crs::epsg(5070));
        assert_eq!(layer.ids().iter().map(|id| id.to_string()).collect::<Vec<_>>(), vec!["A", "7"]);
        assert_eq!(layer.areas()[0], 100.0);
        // Unclosed ring is closed; the hole is subtracted.
        assert_eq!(layer.areas()[1], 100.0 + 100.0 - 4.0);
    }

    #[test]
    fn declared_crs_must_agree_with_embedded() {
        let err = parse_geojson_layer(SQUARES.as_bytes(), "hoods", "CODE", Some(Crs::epsg(3035))).unwrap_err();
        assert!(matches!(err.downcast_ref::<InputError>(), Some(InputError::CrsMismatch { .. })));
        assert!(parse_geojson_layer(SQUARES.as_bytes(), "hoods", "CODE", Some(Crs::epsg(5070))).is_ok());
    }

    #[test]
    fn missing_crs_is_an_input_error() {
        let json = r#"{ "type": "FeatureCollection", "features": [] }"#;
        let err = parse_geojson_layer(json.as_bytes(), "hoods", "CODE", None).unwrap_err();
        assert!(matches!(err.downcast_ref::<InputError>(), Some(InputError::MissingCrs { .. })));
    }

    #[test]
    fn non_polygonal_geometry_is_rejected() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": { "CODE": "P" },
                  "geometry": { "type": "Point", "coordinates": [1, 2] } }
            ]
        }"#;
        let err = parse_geojson_layer(json.as_bytes(), "hoods", "CODE", Some(Crs::epsg(5070))).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InputError>(),
            Some(InputError::NonPolygonal { kind, .. }) if kind == "Point"
        ));
    }

    #[test]
    fn missing_identifier_is_rejected() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": {},
                  "geometry": { "type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]] } }
            ]
        }"#;
        let err = parse_geojson_layer(json.as_bytes(), "hoods", "CODE", Some(Crs::epsg(5070))).unwrap_err();
        assert!(matches!(err.downcast_ref::<InputError>(), Some(InputError::MissingId { index: 0, .. })));
    }
}
