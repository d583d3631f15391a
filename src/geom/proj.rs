use geo::{Coord, MapCoords, MultiPolygon};
use proj4rs::{proj::Proj, transform::transform};
use tracing::info;

use crate::error::InputError;
use crate::geom::{Crs, CrsKind, PartitionLayer};

impl PartitionLayer {
    /// Reproject the layer from a geographic CRS (degrees) into the registered
    /// projected CRS `to`. Only ever invoked explicitly by the caller.
    pub fn reproject(&self, to: &Crs) -> Result<PartitionLayer, InputError> {
        if self.crs() == to { return Ok(self.clone()) }

        let fail = |reason: String| InputError::Projection {
            layer: self.name_arc(),
            from: self.crs().to_string(),
            to: to.to_string(),
            reason,
        };

        if self.crs().kind() != CrsKind::Geographic {
            return Err(fail("only geographic (lon/lat) layers can be reprojected".into()))
        }

        let from_def = self.crs().proj4().ok_or_else(|| fail("source CRS is not registered".into()))?;
        let to_def = to.proj4().ok_or_else(|| fail("target CRS is not registered".into()))?;

        let from = Proj::from_proj_string(from_def).map_err(|e| fail(format!("{e:?}")))?;
        let dest = Proj::from_proj_string(to_def).map_err(|e| fail(format!("{e:?}")))?;

        // Map coords → radians in, metres out.
        let project = |coord: Coord<f64>| -> Result<Coord<f64>, String> {
            let mut point = (coord.x.to_radians(), coord.y.to_radians(), 0.0);
            transform(&from, &dest, &mut point).map_err(|e| format!("{e:?}"))?;
            Ok(Coord { x: point.0, y: point.1 })
        };

        let shapes = self.shapes().iter()
            .map(|shape| shape.try_map_coords(project))
            .collect::<Result<Vec<MultiPolygon<f64>>, String>>()
            .map_err(fail)?;

        info!(layer = self.name(), from = %self.crs(), to = %to, units = self.len(), "reprojected layer");

        self.with_shapes(to.clone(), shapes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn lonlat_layer() -> PartitionLayer {
        // Roughly 0.01° × 0.01° around downtown Toronto.
        let shape = MultiPolygon(vec![polygon![
            (x: -79.39, y: 43.65),
            (x: -79.38, y: 43.65),
            (x: -79.38, y: 43.66),
            (x: -79.39, y: 43.66),
            (x: -79.39, y: 43.65),
        ]]);
        PartitionLayer::new("hoods", Crs::epsg(4326), vec!["a".into()], vec![shape]).unwrap()
    }

    #[test]
    fn reprojects_into_metres() {
        let projected = lonlat_layer().reproject(&Crs::new("ESRI", 102001)).unwrap();
        assert_eq!(projected.crs(), &Crs::new("ESRI", 102001));

        // 0.01° lat ≈ 1112 m, 0.01° lon at 43.65°N ≈ 805 m.
        let area = projected.areas()[0];
        assert!(area > 0.8e6 && area < 1.0e6, "unexpected area {area}");
    }

    #[test]
    fn refuses_projected_sources() {
        let layer = lonlat_layer().reproject(&Crs::epsg(5070)).unwrap();
        assert!(matches!(layer.reproject(&Crs::epsg(3035)), Err(InputError::Projection { .. })));
    }

    #[test]
    fn refuses_unregistered_targets() {
        assert!(matches!(lonlat_layer().reproject(&Crs::epsg(32198)), Err(InputError::Projection { .. })));
    }
}
