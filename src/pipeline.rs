//! Stage façade: each stage takes immutable inputs and returns new values.

use tracing::info;

use crate::config::InterpConfig;
use crate::coverage::CoverageReport;
use crate::error::Result;
use crate::geom::PartitionLayer;
use crate::interp::{interpolate, SourceStatistics, TargetEstimate};
use crate::mapping::MappingTable;
use crate::metrics::RunMetrics;
use crate::overlay::{compute_overlaps, normalize, OverlapTable};

/// Everything the geometric stages produce.
#[derive(Debug)]
pub struct MappingBuild {
    pub table: MappingTable,
    pub overlaps: OverlapTable,
    pub report: CoverageReport,
}

#[derive(Debug)]
pub struct InterpolationRun {
    pub estimate: TargetEstimate,
    pub report: CoverageReport,
}

/// partition check → overlap → normalize → mapping table → coverage.
pub fn build_mapping(
    source: &PartitionLayer,
    target: &PartitionLayer,
    config: &InterpConfig,
    metrics: &mut RunMetrics,
) -> Result<MappingBuild> {
    config.validate()?;

    metrics.stage("partition_check", || {
        source.assert_no_overlaps(config.partition_tolerance)?;
        target.assert_no_overlaps(config.partition_tolerance)
    })?;
    metrics.record_rows("source_units", source.len());
    metrics.record_rows("target_units", target.len());

    let overlaps = metrics.stage("overlap", || compute_overlaps(source, target, config))?;
    metrics.record_rows("overlap_records", overlaps.len());

    let normalized = metrics.stage("normalize", || normalize(&overlaps, config.min_weight))?;
    metrics.record_warnings(
        "discarded_entries",
        normalized.discarded().map(|(_, dropped)| dropped.count).sum(),
    );

    let table = metrics.stage("mapping", || MappingTable::from_normalized(normalized, config.crs.clone()))?;
    metrics.record_rows("mapping_entries", table.len());

    let report = metrics.stage("coverage", || CoverageReport::for_mapping(&table, config.coverage_bound));
    metrics.record_warnings("source_coverage", report.source_warnings());
    metrics.record_warnings("target_coverage", report.target_warnings());

    info!(entries = table.len(), warnings = report.warnings.len(), "mapping build complete");
    Ok(MappingBuild { table, overlaps, report })
}

/// interpolate → coverage of the estimate.
pub fn run_interpolation(
    table: &MappingTable,
    stats: &SourceStatistics,
    fields: &[&str],
    config: &InterpConfig,
    metrics: &mut RunMetrics,
) -> Result<InterpolationRun> {
    config.validate()?;
    metrics.record_rows("statistics_rows", stats.len());

    let estimate = metrics.stage("interpolate", || interpolate(table, stats, fields, config))?;
    metrics.record_rows("target_rows", estimate.len());
    metrics.record_warnings("undefined_estimates", estimate.undefined().len());

    let report = metrics.stage("coverage", || CoverageReport::for_estimate(&estimate, stats, config.coverage_bound));
    metrics.record_warnings("target_coverage", report.target_warnings());

    Ok(InterpolationRun { estimate, report })
}
