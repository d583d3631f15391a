pub mod interpolate;
pub mod mapping;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use areal::{Crs, InterpConfig};

use crate::cli::ConfigArgs;

/// Batch outputs are files; streaming to stdout is not supported.
pub fn reject_stdout(path: &Path) -> Result<()> {
    if path == Path::new("-") { bail!("stdout is not supported, pass a file path: {}", path.display()); }
    Ok(())
}

/// `<output>.<suffix>`, e.g. `mapping.csv.coverage.json`.
pub fn sidecar(output: &Path, suffix: &str) -> PathBuf {
    let mut name = output.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".{suffix}"));
    output.with_file_name(name)
}

impl ConfigArgs {
    /// Config file (if any), then flag overrides. `fallback_crs` is used when
    /// neither names a CRS.
    pub fn resolve(&self, fallback_crs: Option<&Crs>) -> Result<InterpConfig> {
        let crs = self.crs.as_deref().map(str::parse::<Crs>).transpose()?;

        let mut config = match (&self.config, crs) {
            (Some(path), crs) => {
                let mut config = InterpConfig::from_json_file(path)?;
                if let Some(crs) = crs { config.crs = crs; }
                config
            }
            (None, Some(crs)) => InterpConfig::new(crs),
            (None, None) => match fallback_crs {
                Some(crs) => InterpConfig::new(crs.clone()),
                None => bail!("no CRS given: pass --crs or a --config file with a \"crs\" entry"),
            },
        };

        if let Some(min_weight) = self.min_weight { config.min_weight = min_weight; }
        if let Some(bound) = self.coverage_bound { config.coverage_bound = bound; }
        if let Some(tolerance) = self.partition_tolerance { config.partition_tolerance = tolerance; }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::{Cli, Commands};

    fn settings(argv: &[&str]) -> ConfigArgs {
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Validate(args) => args.settings,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn validate_falls_back_to_the_table_crs() {
        let config = settings(&["areal", "validate", "mapping.csv", "--coverage-bound", "0.9"])
            .resolve(Some(&Crs::epsg(5070)))
            .unwrap();
        assert_eq!(config.crs, Crs::epsg(5070));
        assert_eq!(config.coverage_bound, 0.9);
    }

    #[test]
    fn validate_reads_the_config_file_and_flags_override_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "crs": "EPSG:5070", "coverage_bound": 0.8, "partition_tolerance": 0.01 }"#).unwrap();
        let path = path.to_str().unwrap();

        let config = settings(&["areal", "validate", "mapping.csv", "--config", path])
            .resolve(None)
            .unwrap();
        assert_eq!(config.coverage_bound, 0.8);
        assert_eq!(config.partition_tolerance, 0.01);

        let config = settings(&["areal", "validate", "mapping.csv", "--config", path, "--coverage-bound", "0.95"])
            .resolve(None)
            .unwrap();
        assert_eq!(config.coverage_bound, 0.95);
    }

    #[test]
    fn out_of_range_override_is_rejected() {
        let args = settings(&["areal", "validate", "mapping.csv", "--partition-tolerance", "2"]);
        assert!(args.resolve(Some(&Crs::epsg(5070))).is_err());
    }
}
