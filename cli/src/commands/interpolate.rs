use anyhow::{bail, Result};
use areal::{
    join_events, read_table, run_interpolation, write_table, FieldKind, InterpConfig, MappingTable, RunMetrics,
    RunStatus, SourceStatistics,
};
use tracing::warn;

use crate::commands::{reject_stdout, sidecar};

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::InterpolateArgs) -> Result<()> {
    reject_stdout(&args.output)?;

    let mut metrics = RunMetrics::new("interpolate");
    let result = interpolate(args, &mut metrics);
    metrics.finish(if result.is_ok() { RunStatus::Succeeded } else { RunStatus::Failed });
    metrics.write(&sidecar(&args.output, "metrics.json"))?;
    result
}

fn interpolate(args: &crate::cli::InterpolateArgs, metrics: &mut RunMetrics) -> Result<()> {
    let table = metrics.stage("load_mapping", || MappingTable::read(&args.mapping))?;
    let config = resolve_config(args, &table)?;
    config.log_summary();

    let fields = match args.fields.is_empty() {
        true => config.fields.keys().cloned().collect::<Vec<_>>(),
        false => args.fields.clone(),
    };
    if fields.is_empty() {
        bail!("no fields to interpolate: pass --fields or classify fields with --extensive/--intensive");
    }

    // The population field rides along so intensive fields can be weighted by it.
    let mut columns = fields.iter().map(String::as_str).collect::<Vec<_>>();
    if let Some(population) = config.population_field.as_deref() {
        if !columns.contains(&population) { columns.push(population); }
    }

    let stats = metrics.stage("load_statistics", || -> Result<_> {
        let df = read_table(&args.statistics, &[args.id_column.as_str()])?;
        SourceStatistics::from_dataframe(&df, &args.id_column, &columns)
    })?;

    let fields = fields.iter().map(String::as_str).collect::<Vec<_>>();
    let run = run_interpolation(&table, &stats, &fields, &config, metrics)?;

    let dataset = match &args.events {
        Some(path) => metrics.stage("join_events", || -> Result<_> {
            let events = read_table(path, &[args.events_id.as_str()])?;
            join_events(&run.estimate, &events, &args.events_id)
        })?,
        None => run.estimate.to_dataframe()?,
    };

    metrics.stage("write", || -> Result<()> {
        write_table(&dataset, &args.output)?;
        run.report.write(&sidecar(&args.output, "coverage.json"))
    })?;
    metrics.record_rows("output_rows", dataset.height());

    println!(
        "[interpolate] {} targets × {} fields, {} undefined estimates, {} coverage warnings -> {}",
        run.estimate.len(),
        fields.len(),
        run.estimate.undefined().len(),
        run.report.warnings.len(),
        args.output.display(),
    );
    Ok(())
}

/// Config file and flags, with the table's CRS as fallback and the CLI field
/// classes layered on top.
fn resolve_config(args: &crate::cli::InterpolateArgs, table: &MappingTable) -> Result<InterpConfig> {
    let mut config = args.settings.resolve(Some(table.crs()))?;
    if &config.crs != table.crs() {
        warn!(config = %config.crs, table = %table.crs(), "configured CRS differs from the mapping table's");
    }

    for field in &args.extensive {
        config.fields.insert(field.clone(), FieldKind::Extensive);
    }
    for field in &args.intensive {
        config.fields.insert(field.clone(), FieldKind::Intensive);
    }
    if let Some(population) = &args.population_field {
        config.population_field = Some(population.clone());
    }
    Ok(config)
}
