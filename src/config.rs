use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ClassificationError, ConfigError};
use crate::geom::Crs;

/// Default minimum retained weight: overlaps under 0.1% of a source unit are
/// treated as boundary-digitization slivers.
pub const DEFAULT_MIN_WEIGHT: f64 = 0.001;

/// Default acceptance bound for source retained weight and target coverage.
pub const DEFAULT_COVERAGE_BOUND: f64 = 0.99;

/// Default share of the smaller unit's area two units of one layer may have in
/// common before the layer is rejected as not being a partition.
pub const DEFAULT_PARTITION_TOLERANCE: f64 = 1e-3;

/// How a field behaves under redistribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Counts and sums: split proportionally to weight, total conserved.
    Extensive,
    /// Rates, ratios and averages: weight-averaged, never split.
    Intensive,
}

/// Weighting applied to intensive fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntensiveWeighting<'a> {
    /// Plain area weights. An approximation for rates, stated as such.
    Area,
    /// Area weight × source population.
    Population(&'a str),
}

/// Every tunable of the interpolation engine. Nothing here is inferred:
/// the CRS and field classes must be supplied, and the two numeric
/// thresholds fall back to named defaults that are logged on use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterpConfig {
    /// CRS both boundary layers must share for overlap computation.
    pub crs: Crs,

    /// Mapping entries with weight below this are discarded as slivers.
    #[serde(default = "default_min_weight")]
    pub min_weight: f64,

    /// Units whose retained weight / coverage falls below this are flagged.
    #[serde(default = "default_coverage_bound")]
    pub coverage_bound: f64,

    /// Internal overlap tolerated between units of one layer, relative to the smaller unit.
    #[serde(default = "default_partition_tolerance")]
    pub partition_tolerance: f64,

    /// Extensive/intensive classification per field name.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldKind>,

    /// Population field used to weight intensive fields, if any.
    #[serde(default)]
    pub population_field: Option<String>,

    /// CRSes outside the built-in registry that the user declares equal-area.
    #[serde(default)]
    pub extra_equal_area: Vec<Crs>,
}

fn default_min_weight() -> f64 { DEFAULT_MIN_WEIGHT }

fn default_coverage_bound() -> f64 { DEFAULT_COVERAGE_BOUND }

fn default_partition_tolerance() -> f64 { DEFAULT_PARTITION_TOLERANCE }

impl InterpConfig {
    pub fn new(crs: Crs) -> Self {
        Self {
            crs,
            min_weight: DEFAULT_MIN_WEIGHT,
            coverage_bound: DEFAULT_COVERAGE_BOUND,
            partition_tolerance: DEFAULT_PARTITION_TOLERANCE,
            fields: BTreeMap::new(),
            population_field: None,
            extra_equal_area: Vec::new(),
        }
    }

    /// Builder-style field classification.
    pub fn with_field(mut self, name: &str, kind: FieldKind) -> Self {
        self.fields.insert(name.to_string(), kind);
        self
    }

    /// Reads a JSON configuration file and validates it.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;
        let config: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Range checks on the numeric tunables.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.min_weight) {
            return Err(ConfigError::MinWeight(self.min_weight))
        }
        if !(self.coverage_bound > 0.0 && self.coverage_bound <= 1.0) {
            return Err(ConfigError::CoverageBound(self.coverage_bound))
        }
        if !(0.0..1.0).contains(&self.partition_tolerance) {
            return Err(ConfigError::PartitionTolerance(self.partition_tolerance))
        }
        Ok(())
    }

    /// Declared class of `field`; refuses to guess.
    pub fn kind_of(&self, field: &str) -> Result<FieldKind, ClassificationError> {
        self.fields.get(field).copied()
            .ok_or_else(|| ClassificationError::Unclassified { field: field.to_string() })
    }

    /// Intensive weighting policy; a population field must itself be extensive.
    pub fn intensive_weighting(&self) -> Result<IntensiveWeighting<'_>, ClassificationError> {
        match &self.population_field {
            None => Ok(IntensiveWeighting::Area),
            Some(field) => match self.kind_of(field)? {
                FieldKind::Extensive => Ok(IntensiveWeighting::Population(field)),
                FieldKind::Intensive => Err(ClassificationError::PopulationNotExtensive { field: field.clone() }),
            },
        }
    }

    /// Log the effective settings once per run.
    pub fn log_summary(&self) {
        info!(
            crs = %self.crs,
            min_weight = self.min_weight,
            coverage_bound = self.coverage_bound,
            partition_tolerance = self.partition_tolerance,
            fields = self.fields.len(),
            population_field = self.population_field.as_deref().unwrap_or("-"),
            "interpolation settings"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_omitted() {
        let config: InterpConfig = serde_json::from_str(r#"{ "crs": "ESRI:102001" }"#).unwrap();
        assert_eq!(config.min_weight, DEFAULT_MIN_WEIGHT);
        assert_eq!(config.coverage_bound, DEFAULT_COVERAGE_BOUND);
        assert_eq!(config.partition_tolerance, DEFAULT_PARTITION_TOLERANCE);
        assert!(config.fields.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn crs_is_required() {
        assert!(serde_json::from_str::<InterpConfig>(r#"{ "min_weight": 0.01 }"#).is_err());
    }

    #[test]
    fn parses_field_classes() {
        let config: InterpConfig = serde_json::from_str(r#"{
            "crs": "EPSG:5070",
            "fields": { "population": "extensive", "median_income": "intensive" },
            "population_field": "population"
        }"#).unwrap();

        assert_eq!(config.kind_of("population").unwrap(), FieldKind::Extensive);
        assert_eq!(config.kind_of("median_income").unwrap(), FieldKind::Intensive);
        assert!(matches!(config.kind_of("rent"), Err(ClassificationError::Unclassified { .. })));
        assert_eq!(config.intensive_weighting().unwrap(), IntensiveWeighting::Population("population"));
    }

    #[test]
    fn population_field_must_be_extensive() {
        let mut config = InterpConfig::new(Crs::epsg(5070)).with_field("rate", FieldKind::Intensive);
        config.population_field = Some("rate".into());
        assert!(matches!(
            config.intensive_weighting(),
            Err(ClassificationError::PopulationNotExtensive { .. })
        ));

        config.population_field = Some("missing".into());
        assert!(matches!(config.intensive_weighting(), Err(ClassificationError::Unclassified { .. })));
    }

    #[test]
    fn rejects_out_of_range_thresholds() {
        let mut config = InterpConfig::new(Crs::epsg(5070));
        config.min_weight = 1.0;
        assert!(matches!(config.validate(), Err(ConfigError::MinWeight(_))));

        config.min_weight = 0.0;
        config.coverage_bound = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::CoverageBound(_))));

        config.coverage_bound = DEFAULT_COVERAGE_BOUND;
        config.partition_tolerance = -0.1;
        assert!(matches!(config.validate(), Err(ConfigError::PartitionTolerance(_))));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(serde_json::from_str::<InterpConfig>(r#"{ "crs": "EPSG:5070", "min_overlap": 0.1 }"#).is_err());
    }
}
