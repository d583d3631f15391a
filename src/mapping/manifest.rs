use std::{collections::BTreeMap, fs::File, io::BufReader, path::{Path, PathBuf}, sync::Arc};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::InterpConfig;
use crate::geom::Crs;
use crate::io::{sha256_file, write_json};

pub const MANIFEST_VERSION: u32 = 2;

/// Catalog row for a source unit: total area and the weight the sliver filter dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceUnit {
    pub id: Arc<str>,
    pub area: f64,
    #[serde(default)]
    pub discarded_weight: f64,
}

/// Catalog row for a target unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetUnit {
    pub id: Arc<str>,
    pub area: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFile {
    pub path: String,
    pub sha256: String,
}

/// How one boundary layer was read: the property holding unit identifiers and
/// the CRS assumed when the file declares none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerOptions {
    pub id_field: String,
    #[serde(default)]
    pub declared_crs: Option<Crs>,
}

/// Loading choices that change the table's keys or geometry without touching
/// the boundary files themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOptions {
    pub source: LayerOptions,
    pub target: LayerOptions,
    pub reproject: bool,
}

/// Sidecar of a persisted mapping table: the parameters it was built with,
/// the full unit catalogs of both partitions (so that units without any
/// retained overlap are still known), and hashes of the boundary files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingManifest {
    pub version: u32,
    pub crs: Crs,
    pub min_weight: f64,
    pub source_layer: String,
    pub target_layer: String,
    pub entry_count: usize,
    #[serde(default)]
    pub options: BuildOptions,
    #[serde(default)]
    pub inputs: BTreeMap<String, InputFile>,
    pub sources: Vec<SourceUnit>,
    pub targets: Vec<TargetUnit>,
}

/// `<table path>.manifest.json`
pub fn manifest_path(table: &Path) -> PathBuf {
    let mut name = table.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".manifest.json");
    table.with_file_name(name)
}

impl MappingManifest {
    /// Read manifest from a JSON file.
    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to read mapping manifest: {}", path.display()))?;
        let manifest: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse mapping manifest: {}", path.display()))?;
        Ok(manifest)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_json(self, path)
    }

    /// Record the content hash of a boundary file under `role` ("source", "target").
    pub fn record_input(&mut self, role: &str, path: &Path) -> Result<()> {
        let sha256 = sha256_file(path)?;
        self.inputs.insert(role.to_string(), InputFile { path: path.display().to_string(), sha256 });
        Ok(())
    }

    /// True when the table was built from byte-identical boundary files with the
    /// same CRS, threshold and loading options, i.e. rebuilding would reproduce it.
    pub fn is_current(&self, config: &InterpConfig, options: &BuildOptions, inputs: &[(&str, &Path)]) -> Result<bool> {
        if self.version != MANIFEST_VERSION || self.crs != config.crs || self.min_weight != config.min_weight {
            return Ok(false)
        }
        if &self.options != options {
            info!("boundary loading options changed since last build");
            return Ok(false)
        }

        for &(role, path) in inputs {
            let Some(recorded) = self.inputs.get(role) else { return Ok(false) };
            if recorded.sha256 != sha256_file(path)? {
                info!(role, path = %path.display(), "boundary layer changed since last build");
                return Ok(false)
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> MappingManifest {
        MappingManifest {
            version: MANIFEST_VERSION,
            crs: Crs::epsg(5070),
            min_weight: 0.001,
            source_layer: "fsa".into(),
            target_layer: "hood".into(),
            entry_count: 0,
            options: options("code"),
            inputs: BTreeMap::new(),
            sources: vec![SourceUnit { id: Arc::from("A"), area: 1.0, discarded_weight: 0.0 }],
            targets: vec![TargetUnit { id: Arc::from("T"), area: 1.0 }],
        }
    }

    fn options(source_id: &str) -> BuildOptions {
        BuildOptions {
            source: LayerOptions { id_field: source_id.into(), declared_crs: None },
            target: LayerOptions { id_field: "hood_id".into(), declared_crs: Some(Crs::epsg(5070)) },
            reproject: false,
        }
    }

    #[test]
    fn sidecar_path_appends_suffix() {
        assert_eq!(manifest_path(Path::new("out/mapping.csv")), PathBuf::from("out/mapping.csv.manifest.json"));
    }

    #[test]
    fn detects_changed_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("fsa.geojson");
        std::fs::write(&source, "v1").unwrap();

        let config = InterpConfig::new(Crs::epsg(5070));
        let mut manifest = manifest();
        manifest.record_input("source", &source).unwrap();
        assert!(manifest.is_current(&config, &options("code"), &[("source", &source)]).unwrap());

        std::fs::write(&source, "v2").unwrap();
        assert!(!manifest.is_current(&config, &options("code"), &[("source", &source)]).unwrap());
    }

    #[test]
    fn parameter_changes_invalidate() {
        let mut config = InterpConfig::new(Crs::epsg(5070));
        config.min_weight = 0.01;
        assert!(!manifest().is_current(&config, &options("code"), &[]).unwrap());
        assert!(!manifest().is_current(&InterpConfig::new(Crs::epsg(3035)), &options("code"), &[]).unwrap());
    }

    #[test]
    fn loading_option_changes_invalidate() {
        let config = InterpConfig::new(Crs::epsg(5070));
        assert!(manifest().is_current(&config, &options("code"), &[]).unwrap());

        // Same files read with another identifier property give other keys.
        assert!(!manifest().is_current(&config, &options("alt"), &[]).unwrap());

        let mut reprojected = options("code");
        reprojected.reproject = true;
        assert!(!manifest().is_current(&config, &reprojected, &[]).unwrap());

        let mut declared = options("code");
        declared.source.declared_crs = Some(Crs::epsg(4326));
        assert!(!manifest().is_current(&config, &declared, &[]).unwrap());
    }

    #[test]
    fn older_manifests_are_stale() {
        let mut old = manifest();
        old.version = 1;
        old.options = BuildOptions::default();
        assert!(!old.is_current(&InterpConfig::new(Crs::epsg(5070)), &options("code"), &[]).unwrap());
    }

    #[test]
    fn json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.json");
        manifest().write(&path).unwrap();
        assert_eq!(MappingManifest::read(&path).unwrap(), manifest());
    }
}
