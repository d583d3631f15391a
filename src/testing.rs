//! Small fixtures shared by the unit tests.

use std::{collections::BTreeMap, sync::Arc};

use geo::{MultiPolygon, Rect};

use crate::geom::{Crs, PartitionLayer};
use crate::mapping::{BuildOptions, MappingManifest, MappingTable, SourceUnit, TargetUnit, MANIFEST_VERSION};
use crate::overlay::MappingEntry;

pub(crate) fn square(x: f64, y: f64, w: f64, h: f64) -> MultiPolygon<f64> {
    MultiPolygon(vec![Rect::new((x, y), (x + w, y + h)).to_polygon()])
}

/// A layer in EPSG:5070 from (id, x, y, w, h) rectangles.
pub(crate) fn layer(name: &str, units: &[(&str, f64, f64, f64, f64)]) -> PartitionLayer {
    PartitionLayer::new(
        name,
        Crs::epsg(5070),
        units.iter().map(|u| u.0.to_string()).collect(),
        units.iter().map(|&(_, x, y, w, h)| square(x, y, w, h)).collect(),
    ).unwrap()
}

/// A mapping table straight from catalogs and entries.
pub(crate) fn table(sources: &[(&str, f64)], targets: &[(&str, f64)], entries: &[(&str, &str, f64)]) -> MappingTable {
    let manifest = MappingManifest {
        version: MANIFEST_VERSION,
        crs: Crs::epsg(5070),
        min_weight: 0.001,
        source_layer: "source".into(),
        target_layer: "target".into(),
        entry_count: entries.len(),
        options: BuildOptions::default(),
        inputs: BTreeMap::new(),
        sources: sources.iter()
            .map(|&(id, area)| SourceUnit { id: Arc::from(id), area, discarded_weight: 0.0 })
            .collect(),
        targets: targets.iter()
            .map(|&(id, area)| TargetUnit { id: Arc::from(id), area })
            .collect(),
    };
    let entries = entries.iter()
        .map(|&(s, t, weight)| MappingEntry { source_id: Arc::from(s), target_id: Arc::from(t), weight })
        .collect();
    MappingTable::from_parts(manifest, entries).unwrap()
}

/// The two-source, one-target case: A (100) gives 40% to T, B (50) gives 60%.
pub(crate) fn worked_example() -> MappingTable {
    table(
        &[("A", 100.0), ("B", 50.0)],
        &[("T", 70.0)],
        &[("A", "T", 0.4), ("B", "T", 0.6)],
    )
}
