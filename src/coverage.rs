use std::{path::Path, sync::Arc};

use ahash::AHashSet;
use serde::Serialize;
use tracing::{info, warn};

use crate::interp::{SourceStatistics, TargetEstimate, UndefinedEstimate};
use crate::io::write_json;
use crate::mapping::MappingTable;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceCoverage {
    pub id: Arc<str>,
    pub area: f64,
    pub retained_weight: f64,
    pub discarded_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetCoverage {
    pub id: Arc<str>,
    pub covered_fraction: f64,
    pub source_count: usize,
}

/// A unit or estimate that falls short of full coverage. Never fatal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoverageWarning {
    /// Part of a source unit's area is unaccounted for by the mapping.
    Source { id: Arc<str>, retained_weight: f64, discarded_weight: f64 },
    /// Part of a target unit's area is not covered by any mapped source.
    Target { id: Arc<str>, covered_fraction: f64 },
    /// A source that appears in the mapping has no statistics row.
    UnmatchedSource { id: Arc<str> },
    /// An estimate could not be formed.
    UndefinedEstimate(UndefinedEstimate),
}

impl CoverageWarning {
    fn log(&self) {
        match self {
            Self::Source { id, retained_weight, discarded_weight } => warn!(
                source_id = %id, retained_weight, discarded_weight, "source unit only partially mapped"
            ),
            Self::Target { id, covered_fraction } => warn!(
                target_id = %id, covered_fraction, "target unit only partially covered"
            ),
            Self::UnmatchedSource { id } => warn!(
                source_id = %id, "mapped source unit has no statistics row"
            ),
            Self::UndefinedEstimate(undefined) => warn!(
                target_id = %undefined.target_id, field = %undefined.field, reason = ?undefined.reason, "undefined estimate"
            ),
        }
    }
}

/// Per-unit coverage diagnostics and the warnings derived from them.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageReport {
    pub bound: f64,
    pub sources: Vec<SourceCoverage>,
    pub targets: Vec<TargetCoverage>,
    pub warnings: Vec<CoverageWarning>,
}

impl CoverageReport {
    /// Retained weight per source and covered fraction per target, flagging
    /// units under `bound`.
    pub fn for_mapping(table: &MappingTable, bound: f64) -> Self {
        let mut warnings = Vec::new();

        let sources = table.by_source().into_iter()
            .zip(table.sources())
            .map(|(group, unit)| {
                let retained_weight = group.total_weight();
                if retained_weight < bound {
                    warnings.push(CoverageWarning::Source {
                        id: unit.id.clone(),
                        retained_weight,
                        discarded_weight: unit.discarded_weight,
                    });
                }
                SourceCoverage { id: unit.id.clone(), area: unit.area, retained_weight, discarded_weight: unit.discarded_weight }
            })
            .collect::<Vec<_>>();

        let targets = table.by_target().into_iter()
            .zip(table.targets())
            .map(|(group, unit)| {
                let covered = group.members.iter()
                    .filter_map(|&(source, weight)| table.source(source).map(|s| weight * s.area))
                    .sum::<f64>();
                let covered_fraction = covered / unit.area;
                if covered_fraction < bound {
                    warnings.push(CoverageWarning::Target { id: unit.id.clone(), covered_fraction });
                }
                TargetCoverage { id: unit.id.clone(), covered_fraction, source_count: group.members.len() }
            })
            .collect::<Vec<_>>();

        Self::finish(bound, sources, targets, warnings)
    }

    /// Coverage of an interpolation run: low-coverage targets, mapped sources
    /// without statistics, and every undefined estimate.
    pub fn for_estimate(estimate: &TargetEstimate, stats: &SourceStatistics, bound: f64) -> Self {
        let mut warnings = Vec::new();
        let mut unmatched = AHashSet::new();

        let targets = estimate.rows().iter()
            .map(|row| {
                let provenance = &row.provenance;
                if provenance.coverage < bound {
                    warnings.push(CoverageWarning::Target { id: row.target_id.clone(), covered_fraction: provenance.coverage });
                }
                for (source, _) in &provenance.contributors {
                    if !stats.contains(source) && unmatched.insert(source.clone()) {
                        warnings.push(CoverageWarning::UnmatchedSource { id: source.clone() });
                    }
                }
                TargetCoverage {
                    id: row.target_id.clone(),
                    covered_fraction: provenance.coverage,
                    source_count: provenance.contributors.len(),
                }
            })
            .collect::<Vec<_>>();

        warnings.extend(estimate.undefined().iter().cloned().map(CoverageWarning::UndefinedEstimate));

        Self::finish(bound, Vec::new(), targets, warnings)
    }

    fn finish(bound: f64, sources: Vec<SourceCoverage>, targets: Vec<TargetCoverage>, warnings: Vec<CoverageWarning>) -> Self {
        for warning in &warnings {
            warning.log();
        }
        info!(
            sources = sources.len(),
            targets = targets.len(),
            warnings = warnings.len(),
            bound,
            "coverage report"
        );
        Self { bound, sources, targets, warnings }
    }

    #[inline] pub fn is_clean(&self) -> bool { self.warnings.is_empty() }

    pub fn source_warnings(&self) -> usize {
        self.warnings.iter().filter(|w| matches!(w, CoverageWarning::Source { .. })).count()
    }

    pub fn target_warnings(&self) -> usize {
        self.warnings.iter().filter(|w| matches!(w, CoverageWarning::Target { .. })).count()
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        write_json(self, path)
    }
}
