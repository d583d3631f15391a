use std::sync::Arc;

use ahash::AHashMap;
use tracing::{debug, info};

use crate::error::{ConfigError, InputError, Result};
use crate::overlay::{OverlapTable, UnitArea};

/// One retained (source, target) pair: the share of the source unit's area
/// that falls inside the target unit, in (0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct MappingEntry {
    pub source_id: Arc<str>,
    pub target_id: Arc<str>,
    pub weight: f64,
}

/// Weight dropped by the sliver filter for one source unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Discarded {
    pub weight: f64,
    pub count: usize,
}

/// Weights after the sliver filter, plus the per-source audit of what was dropped.
#[derive(Debug, Clone)]
pub struct NormalizedOverlaps {
    pub(crate) source_layer: Arc<str>,
    pub(crate) target_layer: Arc<str>,
    pub(crate) sources: Vec<UnitArea>,
    pub(crate) targets: Vec<UnitArea>,
    pub(crate) entries: Vec<MappingEntry>,
    /// Aligned with `sources`.
    pub(crate) discarded: Vec<Discarded>,
    pub(crate) min_weight: f64,
}

impl NormalizedOverlaps {
    #[inline] pub fn entries(&self) -> &[MappingEntry] { &self.entries }

    #[inline] pub fn min_weight(&self) -> f64 { self.min_weight }

    /// Dropped weight per source unit, in source catalog order.
    pub fn discarded(&self) -> impl Iterator<Item = (&str, &Discarded)> {
        self.sources.iter().map(|unit| &*unit.id).zip(self.discarded.iter())
    }
}

/// Convert intersection areas into fractions of each source unit's area and
/// drop entries below `min_weight`.
///
/// The threshold trades digitization artifacts (too low) against real
/// partial overlaps (too high); it is a tunable, not a validated constant.
pub fn normalize(overlaps: &OverlapTable, min_weight: f64) -> Result<NormalizedOverlaps> {
    if !(0.0..1.0).contains(&min_weight) {
        return Err(ConfigError::MinWeight(min_weight).into())
    }

    let index = overlaps.sources.iter().enumerate()
        .map(|(i, unit)| (unit.id.clone(), i))
        .collect::<AHashMap<_, _>>();

    let mut entries = Vec::with_capacity(overlaps.records.len());
    let mut discarded = vec![Discarded::default(); overlaps.sources.len()];

    for record in &overlaps.records {
        let i = *index.get(&record.source_id).ok_or_else(|| InputError::UnknownId {
            layer: overlaps.source_layer.clone(),
            id: record.source_id.to_string(),
        })?;

        // The overlap calculator already bounds area by the source area up to
        // floating-point tolerance; the clamp only absorbs that rounding.
        let weight = (record.area / overlaps.sources[i].area).min(1.0);

        if weight < min_weight {
            debug!(source_id = %record.source_id, target_id = %record.target_id, weight, "discarded sliver");
            discarded[i].weight += weight;
            discarded[i].count += 1;
            continue;
        }

        entries.push(MappingEntry {
            source_id: record.source_id.clone(),
            target_id: record.target_id.clone(),
            weight,
        });
    }

    let dropped = discarded.iter().map(|d| d.count).sum::<usize>();
    info!(
        kept = entries.len(),
        dropped,
        min_weight,
        "normalized overlap weights"
    );

    Ok(NormalizedOverlaps {
        source_layer: overlaps.source_layer.clone(),
        target_layer: overlaps.target_layer.clone(),
        sources: overlaps.sources.clone(),
        targets: overlaps.targets.clone(),
        entries,
        discarded,
        min_weight,
    })
}
