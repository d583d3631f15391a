use anyhow::Result;
use areal::{CoverageReport, CoverageWarning, MappingTable};
use tracing::warn;

use crate::commands::reject_stdout;

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::ValidateArgs) -> Result<()> {
    if let Some(output) = &args.output { reject_stdout(output)?; }

    let table = MappingTable::read(&args.mapping)?;
    let config = args.settings.resolve(Some(table.crs()))?;
    if &config.crs != table.crs() {
        warn!(config = %config.crs, table = %table.crs(), "configured CRS differs from the mapping table's");
    }
    if config.min_weight != table.min_weight() {
        warn!(config = config.min_weight, table = table.min_weight(), "configured min_weight differs from the mapping table's");
    }
    let report = CoverageReport::for_mapping(&table, config.coverage_bound);

    println!(
        "[validate] {}: {} entries, {} sources, {} targets, crs {}, min_weight {}",
        args.mapping.display(),
        table.len(),
        table.sources().len(),
        table.targets().len(),
        table.crs(),
        table.min_weight(),
    );
    for warning in &report.warnings {
        match warning {
            CoverageWarning::Source { id, retained_weight, discarded_weight } => println!(
                "  source {id}: retained {retained_weight:.4}, discarded {discarded_weight:.4}"
            ),
            CoverageWarning::Target { id, covered_fraction } => println!(
                "  target {id}: covered {covered_fraction:.4}"
            ),
            other => println!("  {other:?}"),
        }
    }
    println!("[validate] {} coverage warnings below {}", report.warnings.len(), report.bound);

    if let Some(output) = &args.output {
        report.write(output)?;
    }
    Ok(())
}
