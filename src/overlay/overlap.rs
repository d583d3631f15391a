use std::sync::Arc;

use ahash::AHashMap;
use geo::{Area, BooleanOps, BoundingRect};
use tracing::{debug, info};

use crate::config::InterpConfig;
use crate::error::{InputError, Result};
use crate::geom::{envelope_of, PartitionLayer};

/// Relative slack allowed on area invariants for floating-point error in
/// the boolean operations.
pub const AREA_TOLERANCE: f64 = 1e-6;

/// A unit identifier with its total area.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitArea {
    pub id: Arc<str>,
    pub area: f64,
}

/// Area of the non-empty intersection between one source and one target unit.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapRecord {
    pub source_id: Arc<str>,
    pub target_id: Arc<str>,
    pub area: f64,
}

/// The raw overlap table for a partition pair, with the area catalogs of both
/// layers so that later stages never need the geometry again.
#[derive(Debug, Clone)]
pub struct OverlapTable {
    pub(crate) source_layer: Arc<str>,
    pub(crate) target_layer: Arc<str>,
    pub(crate) sources: Vec<UnitArea>,
    pub(crate) targets: Vec<UnitArea>,
    pub(crate) records: Vec<OverlapRecord>,
}

impl OverlapTable {
    #[inline] pub fn records(&self) -> &[OverlapRecord] { &self.records }

    #[inline] pub fn sources(&self) -> &[UnitArea] { &self.sources }

    #[inline] pub fn targets(&self) -> &[UnitArea] { &self.targets }

    #[inline] pub fn len(&self) -> usize { self.records.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.records.is_empty() }

    /// Σ intersection area per source unit, in source catalog order.
    pub fn intersected_area_by_source(&self) -> Vec<f64> {
        let index = self.sources.iter().enumerate()
            .map(|(i, unit)| (unit.id.clone(), i))
            .collect::<AHashMap<_, _>>();

        let mut sums = vec![0.0; self.sources.len()];
        for record in &self.records {
            if let Some(&i) = index.get(&record.source_id) {
                sums[i] += record.area;
            }
        }
        sums
    }
}

/// Both layers must be in the configured CRS, and that CRS must be equal-area.
fn check_crs(source: &PartitionLayer, target: &PartitionLayer, config: &InterpConfig) -> Result<()> {
    for layer in [source, target] {
        if layer.crs() != &config.crs {
            return Err(InputError::CrsMismatch {
                layer: layer.name_arc(),
                found: layer.crs().to_string(),
                expected: config.crs.to_string(),
            }.into())
        }
    }
    config.crs.ensure_equal_area(&config.extra_equal_area)?;
    Ok(())
}

/// Overlaps of one source unit with every candidate target, in target order.
fn overlaps_of(source: &PartitionLayer, target: &PartitionLayer, i: usize) -> Result<Vec<OverlapRecord>> {
    let shape = &source.shapes()[i];
    let source_area = source.areas()[i];
    let Some(rect) = shape.bounding_rect() else { return Ok(Vec::new()) };

    let mut records = Vec::new();
    let mut covered = 0.0;
    for j in target.candidates(&envelope_of(&rect, 0.0)) {
        let area = shape.intersection(&target.shapes()[j]).unsigned_area();

        // Lines and points carry no area.
        if !(area > 0.0) { continue; }

        let limit = source_area.min(target.areas()[j]);
        if area > limit * (1.0 + AREA_TOLERANCE) {
            return Err(InputError::OversizedIntersection {
                source_id: source.ids()[i].to_string(),
                target_id: target.ids()[j].to_string(),
                area,
            }.into())
        }

        covered += area;
        records.push(OverlapRecord {
            source_id: source.ids()[i].clone(),
            target_id: target.ids()[j].clone(),
            area,
        });
    }

    // A tiling target layer can cover a source unit at most once.
    if covered > source_area * (1.0 + AREA_TOLERANCE) {
        return Err(InputError::OverCovered {
            source_id: source.ids()[i].to_string(),
            covered: covered / source_area,
        }.into())
    }

    debug!(source = %source.ids()[i], targets = records.len(), fraction = covered / source_area, "overlaps");
    Ok(records)
}

/// Every non-empty pairwise intersection between `source` and `target`.
/// Records are ordered by source layer order, then target layer order,
/// whether or not the computation runs in parallel.
pub fn compute_overlaps(source: &PartitionLayer, target: &PartitionLayer, config: &InterpConfig) -> Result<OverlapTable> {
    check_crs(source, target, config)?;

    #[cfg(feature = "parallel")]
    let per_source: Vec<Vec<OverlapRecord>> = {
        use rayon::prelude::*;
        (0..source.len()).into_par_iter()
            .map(|i| overlaps_of(source, target, i))
            .collect::<Result<_>>()?
    };

    #[cfg(not(feature = "parallel"))]
    let per_source: Vec<Vec<OverlapRecord>> = (0..source.len())
        .map(|i| overlaps_of(source, target, i))
        .collect::<Result<_>>()?;

    let records = per_source.into_iter().flatten().collect::<Vec<_>>();

    info!(
        source_layer = source.name(),
        target_layer = target.name(),
        sources = source.len(),
        targets = target.len(),
        overlaps = records.len(),
        "computed pairwise overlaps"
    );

    let catalog = |layer: &PartitionLayer| layer.ids().iter()
        .zip(layer.areas())
        .map(|(id, &area)| UnitArea { id: id.clone(), area })
        .collect::<Vec<_>>();

    Ok(OverlapTable {
        source_layer: source.name_arc(),
        target_layer: target.name_arc(),
        sources: catalog(source),
        targets: catalog(target),
        records,
    })
}
