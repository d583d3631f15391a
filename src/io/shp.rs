use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use shapefile::{dbase::{FieldValue, Record}, PolygonRing, Reader, Shape};

use crate::error::InputError;
use crate::geom::{Crs, PartitionLayer};

/// Loads polygon units from a `.shp` file (with its `.dbf`). Shapefiles carry
/// no machine-readable CRS identifier, so the caller must declare it.
pub fn read_shapefile_layer(path: &Path, name: &str, id_field: &str, declared: Option<Crs>) -> Result<PartitionLayer> {
    let layer: Arc<str> = Arc::from(name);
    let crs = declared.ok_or_else(|| InputError::MissingCrs { layer: layer.clone() })?;

    let mut reader = Reader::from_path(path)
        .with_context(|| format!("Failed to open shapefile: {}", path.display()))?;

    let mut ids = Vec::new();
    let mut shapes = Vec::new();
    for (index, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = result.context("Error reading shape+record")?;

        let id = identifier(&record, id_field)
            .ok_or_else(|| InputError::MissingId { layer: layer.clone(), index })?;

        let shape = match shape {
            Shape::Polygon(polygon) => shp_to_geo(&polygon),
            Shape::NullShape => return Err(InputError::EmptyGeometry { layer, id }.into()),
            other => {
                return Err(InputError::NonPolygonal {
                    layer,
                    id,
                    kind: format!("{:?}", other.shapetype()),
                }.into())
            }
        };

        ids.push(id);
        shapes.push(shape);
    }

    PartitionLayer::new(name, crs, ids, shapes)
        .with_context(|| format!("Invalid boundary layer: {}", path.display()))
}

/// Get an identifier from a character or numeric dBase field.
fn identifier(record: &Record, field: &str) -> Option<String> {
    match record.get(field)? {
        FieldValue::Character(Some(s)) => Some(s.trim().to_string()),
        FieldValue::Numeric(Some(n)) if n.fract() == 0.0 => Some(format!("{}", *n as i64)),
        FieldValue::Integer(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Convert shapefile::Polygon to geo::MultiPolygon<f64>.
/// Shapefile stores each outer ring followed by its holes.
fn shp_to_geo(polygon: &shapefile::Polygon) -> MultiPolygon<f64> {
    /// Ensure first and last are the same for geo::LineString coords
    fn to_linestring(points: &[shapefile::Point]) -> LineString<f64> {
        let mut coords = points.iter().map(|pt| Coord { x: pt.x, y: pt.y }).collect::<Vec<_>>();
        if !coords.is_empty() && coords[0] != coords[coords.len() - 1] {
            coords.push(coords[0]);
        }
        LineString(coords)
    }

    let mut polys = Vec::new();
    let mut current_exterior: Option<LineString<f64>> = None;
    let mut current_holes = Vec::new();

    for ring in polygon.rings() {
        match ring {
            PolygonRing::Outer(points) => {
                // flush previous polygon
                if let Some(exterior) = current_exterior.take() {
                    polys.push(Polygon::new(exterior, std::mem::take(&mut current_holes)));
                }
                current_exterior = Some(to_linestring(points));
            }
            PolygonRing::Inner(points) => current_holes.push(to_linestring(points)),
        }
    }
    if let Some(exterior) = current_exterior {
        polys.push(Polygon::new(exterior, current_holes));
    }

    MultiPolygon(polys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;
    use shapefile::Point;

    #[test]
    fn groups_holes_with_their_exterior() {
        let polygon = shapefile::Polygon::with_rings(vec![
            PolygonRing::Outer(vec![
                Point::new(0.0, 0.0), Point::new(0.0, 10.0), Point::new(10.0, 10.0),
                Point::new(10.0, 0.0), Point::new(0.0, 0.0),
            ]),
            PolygonRing::Inner(vec![
                Point::new(2.0, 2.0), Point::new(4.0, 2.0), Point::new(4.0, 4.0),
                Point::new(2.0, 4.0), Point::new(2.0, 2.0),
            ]),
            PolygonRing::Outer(vec![
                Point::new(20.0, 0.0), Point::new(20.0, 5.0), Point::new(25.0, 5.0),
                Point::new(25.0, 0.0), Point::new(20.0, 0.0),
            ]),
        ]);

        let multi = shp_to_geo(&polygon);
        assert_eq!(multi.0.len(), 2);
        assert_eq!(multi.0[0].interiors().len(), 1);
        assert!((multi.unsigned_area() - (100.0 - 4.0 + 25.0)).abs() < 1e-9);
    }

    #[test]
    fn requires_declared_crs() {
        let err = read_shapefile_layer(Path::new("missing.shp"), "fsa", "CFSAUID", None).unwrap_err();
        assert!(matches!(err.downcast_ref::<InputError>(), Some(InputError::MissingCrs { .. })));
    }
}
