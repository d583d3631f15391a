use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{FieldKind, IntensiveWeighting, InterpConfig};
use crate::error::{ClassificationError, Error, Result};
use crate::interp::{Provenance, SourceStatistics, TargetEstimate, TargetRow, UndefinedEstimate, UndefinedReason};
use crate::mapping::{Group, MappingTable};

/// Resolved per-field plan: column in the statistics and how to aggregate.
struct FieldPlan<'a> {
    name: &'a str,
    kind: FieldKind,
    column: usize,
}

/// Redistributes source statistics onto the target partition.
///
/// Extensive fields are split by weight (Σ F·w); intensive fields are
/// weight-averaged (Σ G·w / Σ w, or Σ G·w·P / Σ w·P under population weighting).
/// Every requested field must be classified in `config` and present in `stats`.
/// A target whose value cannot be formed gets `None` and an [`UndefinedEstimate`].
pub fn interpolate(table: &MappingTable, stats: &SourceStatistics, fields: &[&str], config: &InterpConfig) -> Result<TargetEstimate> {
    let plans = fields.iter()
        .map(|&name| {
            let kind = config.kind_of(name)?;
            let column = stats.field_index(name)
                .ok_or_else(|| ClassificationError::UnknownField { field: name.to_string() })?;
            Ok::<_, Error>(FieldPlan { name, kind, column })
        })
        .collect::<Result<Vec<_>>>()?;

    // Population weighting only matters (and is only validated) when an intensive field is requested.
    let population = match plans.iter().any(|p| p.kind == FieldKind::Intensive) {
        false => None,
        true => match config.intensive_weighting()? {
            IntensiveWeighting::Area => {
                info!("intensive fields weighted by area only");
                None
            }
            IntensiveWeighting::Population(field) => {
                let column = stats.field_index(field)
                    .ok_or_else(|| ClassificationError::UnknownField { field: field.to_string() })?;
                info!(population_field = field, "intensive fields weighted by area × population");
                Some((field, column))
            }
        },
    };

    let mut rows = Vec::with_capacity(table.targets().len());
    let mut undefined = Vec::new();

    for group in table.by_target() {
        let target_id: Arc<str> = Arc::from(group.key);
        let provenance = provenance_of(table, &group);

        let values = plans.iter()
            .map(|plan| match estimate(&group, stats, plan, population) {
                Ok(value) => Some(value),
                Err(reason) => {
                    debug!(target_id = %target_id, field = plan.name, ?reason, "estimate undefined");
                    undefined.push(UndefinedEstimate { target_id: target_id.clone(), field: plan.name.to_string(), reason });
                    None
                }
            })
            .collect();

        rows.push(TargetRow { target_id, values, provenance });
    }

    if !undefined.is_empty() {
        warn!(count = undefined.len(), "some target estimates are undefined");
    }
    info!(targets = rows.len(), fields = plans.len(), "interpolated source statistics");

    Ok(TargetEstimate {
        fields: plans.iter().map(|plan| (plan.name.to_string(), plan.kind)).collect(),
        rows,
        undefined,
    })
}

fn provenance_of(table: &MappingTable, group: &Group<'_>) -> Provenance {
    let covered = group.members.iter()
        .filter_map(|&(source, weight)| table.source(source).map(|unit| weight * unit.area))
        .sum::<f64>();
    let coverage = table.target(group.key).map_or(0.0, |unit| covered / unit.area);

    Provenance {
        contributors: group.members.iter().map(|&(source, weight)| (Arc::from(source), weight)).collect(),
        total_weight: group.total_weight(),
        coverage,
    }
}

/// One (target, field) estimate, accumulated in entry order.
fn estimate(
    group: &Group<'_>,
    stats: &SourceStatistics,
    plan: &FieldPlan<'_>,
    population: Option<(&str, usize)>,
) -> std::result::Result<f64, UndefinedReason> {
    if group.members.is_empty() {
        return Err(UndefinedReason::NoCoverage)
    }

    let mut numerator = 0.0;
    let mut mass = 0.0;
    for &(source, weight) in &group.members {
        let row = stats.row_of(source)
            .ok_or_else(|| UndefinedReason::MissingSourceRow { source_id: Arc::from(source) })?;
        let value = stats.cell(row, plan.column)
            .ok_or_else(|| UndefinedReason::MissingSourceValue { source_id: Arc::from(source), field: plan.name.to_string() })?;

        match (plan.kind, population) {
            (FieldKind::Extensive, _) => numerator += value * weight,
            (FieldKind::Intensive, None) => {
                numerator += value * weight;
                mass += weight;
            }
            (FieldKind::Intensive, Some((field, column))) => {
                let people = stats.cell(row, column)
                    .ok_or_else(|| UndefinedReason::MissingSourceValue { source_id: Arc::from(source), field: field.to_string() })?;
                numerator += value * weight * people;
                mass += weight * people;
            }
        }
    }

    match plan.kind {
        FieldKind::Extensive => Ok(numerator),
        FieldKind::Intensive if mass > 0.0 => Ok(numerator / mass),
        FieldKind::Intensive => Err(UndefinedReason::ZeroWeight),
    }
}
