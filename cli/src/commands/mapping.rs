use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use areal::{
    build_mapping, manifest_path, read_layer, BuildOptions, Crs, InterpConfig, LayerOptions, MappingManifest,
    PartitionLayer, RunMetrics, RunStatus,
};
use tracing::info;

use crate::commands::{reject_stdout, sidecar};

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::MappingArgs) -> Result<()> {
    reject_stdout(&args.output)?;
    let config = args.settings.resolve(None)?;
    config.log_summary();
    let options = build_options(args)?;

    let inputs = input_files(&args.source, "source")
        .into_iter()
        .chain(input_files(&args.target, "target"))
        .collect::<Vec<_>>();

    if !args.force && is_current(&args.output, &config, &options, &inputs)? {
        info!(output = %args.output.display(), "mapping table is up to date, skipping rebuild");
        println!("[mapping] {} is up to date (use --force to rebuild)", args.output.display());
        return Ok(())
    }

    let mut metrics = RunMetrics::new("mapping");
    let result = build(args, &config, options, &inputs, &mut metrics);
    metrics.finish(if result.is_ok() { RunStatus::Succeeded } else { RunStatus::Failed });
    metrics.write(&sidecar(&args.output, "metrics.json"))?;
    result
}

fn build(
    args: &crate::cli::MappingArgs,
    config: &InterpConfig,
    options: BuildOptions,
    inputs: &[(String, PathBuf)],
    metrics: &mut RunMetrics,
) -> Result<()> {
    let (source, target) = metrics.stage("load", || -> Result<_> {
        let source = load(&args.source, "source", &options.source, config, options.reproject)?;
        let target = load(&args.target, "target", &options.target, config, options.reproject)?;
        Ok((source, target))
    })?;

    let mut build = build_mapping(&source, &target, config, metrics)?;
    build.table.record_options(options);
    for (role, path) in inputs {
        build.table.record_input(role, path)?;
    }

    metrics.stage("write", || -> Result<()> {
        build.table.write(&args.output)?;
        build.report.write(&sidecar(&args.output, "coverage.json"))
    })?;

    println!(
        "[mapping] {} entries ({} sources → {} targets), {} coverage warnings -> {}",
        build.table.len(),
        source.len(),
        target.len(),
        build.report.warnings.len(),
        args.output.display(),
    );
    Ok(())
}

/// Loads a layer, reprojecting into the configured CRS only when asked to.
fn load(path: &Path, role: &str, options: &LayerOptions, config: &InterpConfig, reproject: bool) -> Result<PartitionLayer> {
    let layer = read_layer(path, role, &options.id_field, options.declared_crs.clone())?;
    info!(layer = role, units = layer.len(), crs = %layer.crs(), "loaded boundary layer");

    if reproject && layer.crs() != &config.crs {
        return layer.reproject(&config.crs)
            .with_context(|| format!("Failed to reproject {}", path.display()))
    }
    Ok(layer)
}

/// Everything besides file contents and config that shapes the table.
fn build_options(args: &crate::cli::MappingArgs) -> Result<BuildOptions> {
    let layer = |id_field: &str, declared: Option<&str>| -> Result<LayerOptions> {
        Ok(LayerOptions { id_field: id_field.to_string(), declared_crs: declared.map(str::parse::<Crs>).transpose()? })
    };
    Ok(BuildOptions {
        source: layer(&args.source_id, args.source_crs.as_deref())?,
        target: layer(&args.target_id, args.target_crs.as_deref())?,
        reproject: args.reproject,
    })
}

/// Files whose contents determine the table: a shapefile's identifiers live in its `.dbf`.
fn input_files(path: &Path, role: &str) -> Vec<(String, PathBuf)> {
    let mut files = vec![(role.to_string(), path.to_path_buf())];
    if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("shp")) {
        files.push((format!("{role}.dbf"), path.with_extension("dbf")));
    }
    files
}

fn is_current(output: &Path, config: &InterpConfig, options: &BuildOptions, inputs: &[(String, PathBuf)]) -> Result<bool> {
    let manifest = manifest_path(output);
    if !output.exists() || !manifest.exists() {
        return Ok(false)
    }
    let inputs = inputs.iter().map(|(role, path)| (role.as_str(), path.as_path())).collect::<Vec<_>>();
    MappingManifest::read(&manifest)?.is_current(config, options, &inputs)
}
