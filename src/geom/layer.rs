use std::sync::Arc;

use ahash::AHashMap;
use geo::{Area, BooleanOps, BoundingRect, MultiPolygon, Relate};
use rstar::{RTree, AABB};

use crate::error::InputError;
use crate::geom::{bbox::{envelope_of, BoundingBox}, Crs};

/// One polygon partition of the territory: uniquely identified units with
/// their geometry and area, in a single coordinate reference system.
/// Immutable once built.
#[derive(Debug, Clone)]
pub struct PartitionLayer {
    name: Arc<str>,
    crs: Crs,
    ids: Vec<Arc<str>>,
    shapes: Vec<MultiPolygon<f64>>,
    areas: Vec<f64>,
    index: AHashMap<Arc<str>, usize>,
    rtree: RTree<BoundingBox>,
}

impl PartitionLayer {
    /// Build a layer, rejecting duplicate identifiers and empty or zero-area units.
    pub fn new(
        name: &str,
        crs: Crs,
        ids: Vec<String>,
        shapes: Vec<MultiPolygon<f64>>,
    ) -> Result<Self, InputError> {
        let name: Arc<str> = Arc::from(name);

        if ids.len() != shapes.len() {
            return Err(InputError::LengthMismatch { layer: name, ids: ids.len(), shapes: shapes.len() })
        }

        let ids: Vec<Arc<str>> = ids.into_iter().map(Arc::from).collect();

        let mut index = AHashMap::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            if id.trim().is_empty() {
                return Err(InputError::MissingId { layer: name, index: i })
            }
            if index.insert(id.clone(), i).is_some() {
                return Err(InputError::DuplicateId { layer: name, id: id.to_string() })
            }
        }

        let mut areas = Vec::with_capacity(shapes.len());
        let mut boxes = Vec::with_capacity(shapes.len());
        for (i, shape) in shapes.iter().enumerate() {
            let area = shape.unsigned_area();
            let rect = shape.bounding_rect();
            match rect {
                Some(rect) if area.is_finite() && area > 0.0 => {
                    areas.push(area);
                    boxes.push(BoundingBox::new(i, rect));
                }
                _ => return Err(InputError::EmptyGeometry { layer: name, id: ids[i].to_string() }),
            }
        }

        Ok(Self {
            name,
            crs,
            ids,
            shapes,
            areas,
            index,
            rtree: RTree::bulk_load(boxes),
        })
    }

    #[inline] pub fn name(&self) -> &str { &self.name }

    #[inline] pub fn crs(&self) -> &Crs { &self.crs }

    #[inline] pub fn len(&self) -> usize { self.ids.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    #[inline] pub fn ids(&self) -> &[Arc<str>] { &self.ids }

    #[inline] pub fn shapes(&self) -> &[MultiPolygon<f64>] { &self.shapes }

    /// Total area of each unit, in squared CRS units.
    #[inline] pub fn areas(&self) -> &[f64] { &self.areas }

    #[inline] pub fn index_of(&self, id: &str) -> Option<usize> { self.index.get(id).copied() }

    #[inline] pub(crate) fn name_arc(&self) -> Arc<str> { self.name.clone() }

    /// Indices of units whose bounding boxes intersect the envelope, in ascending order.
    pub(crate) fn candidates(&self, envelope: &AABB<[f64; 2]>) -> Vec<usize> {
        let mut found = self.rtree
            .locate_in_envelope_intersecting(envelope)
            .map(|bb| bb.idx())
            .collect::<Vec<_>>();
        found.sort_unstable();
        found
    }

    /// Fails if any two units overlap by more than `rel_tol` of the smaller unit's area.
    /// Pure boundary touches (edge or point) are NOT considered overlaps.
    pub fn assert_no_overlaps(&self, rel_tol: f64) -> Result<(), InputError> {
        for i in 0..self.shapes.len() {
            let Some(rect) = self.shapes[i].bounding_rect() else { continue };

            for j in self.candidates(&envelope_of(&rect, 0.0)) {
                if j <= i { continue; }

                // One relate() call gives the full DE-9IM.
                let im = self.shapes[i].relate(&self.shapes[j]);
                if !im.is_intersects() || im.is_touches() { continue; }

                // Digitization noise along shared edges is tolerated.
                let shared = self.shapes[i].intersection(&self.shapes[j]).unsigned_area();
                if shared > rel_tol * self.areas[i].min(self.areas[j]) {
                    return Err(InputError::OverlappingUnits {
                        layer: self.name.clone(),
                        first: self.ids[i].to_string(),
                        second: self.ids[j].to_string(),
                    })
                }
            }
        }

        Ok(())
    }

    /// Same units, new geometry (used by reprojection).
    pub(crate) fn with_shapes(&self, crs: Crs, shapes: Vec<MultiPolygon<f64>>) -> Result<Self, InputError> {
        Self::new(
            &self.name,
            crs,
            self.ids.iter().map(|id| id.to_string()).collect(),
            shapes,
        )
    }
}
