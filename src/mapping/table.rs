use std::{collections::BTreeMap, path::Path, sync::Arc};

use ahash::{AHashMap, AHashSet};
use anyhow::Context;
use polars::{frame::DataFrame, prelude::{Column, DataType, NamedFrom}};
use tracing::info;

use crate::error::{InputError, Result};
use crate::geom::Crs;
use crate::io::{numeric_column, read_table_typed, string_column, write_table};
use crate::mapping::manifest::{manifest_path, BuildOptions, MappingManifest, SourceUnit, TargetUnit, MANIFEST_VERSION};
use crate::overlay::{MappingEntry, NormalizedOverlaps, AREA_TOLERANCE};

/// The many-to-many (source, target, weight) mapping for one partition pair.
///
/// This is the durable artifact of the geometric stages: everything downstream
/// works from it alone. Read-only once built.
#[derive(Debug, Clone)]
pub struct MappingTable {
    manifest: MappingManifest,
    entries: Vec<MappingEntry>,
    source_index: AHashMap<Arc<str>, usize>,
    target_index: AHashMap<Arc<str>, usize>,
}

/// One key of a grouped view with its (counterpart, weight) members in entry order.
#[derive(Debug, Clone, PartialEq)]
pub struct Group<'a> {
    pub key: &'a str,
    pub members: Vec<(&'a str, f64)>,
}

impl Group<'_> {
    /// Σ weight over the members.
    pub fn total_weight(&self) -> f64 {
        self.members.iter().map(|&(_, w)| w).sum()
    }
}

impl MappingTable {
    /// Assemble the table from normalized, filtered weights.
    pub fn from_normalized(normalized: NormalizedOverlaps, crs: Crs) -> Result<Self> {
        let NormalizedOverlaps { source_layer, target_layer, sources, targets, entries, discarded, min_weight } = normalized;

        let manifest = MappingManifest {
            version: MANIFEST_VERSION,
            crs,
            min_weight,
            source_layer: source_layer.to_string(),
            target_layer: target_layer.to_string(),
            entry_count: entries.len(),
            options: BuildOptions::default(),
            inputs: BTreeMap::new(),
            sources: sources.into_iter().zip(discarded)
                .map(|(unit, dropped)| SourceUnit { id: unit.id, area: unit.area, discarded_weight: dropped.weight })
                .collect(),
            targets: targets.into_iter()
                .map(|unit| TargetUnit { id: unit.id, area: unit.area })
                .collect(),
        };

        let table = Self::from_parts(manifest, entries)?;
        info!(
            entries = table.entries.len(),
            sources = table.manifest.sources.len(),
            targets = table.manifest.targets.len(),
            "built mapping table"
        );
        Ok(table)
    }

    /// Re-validate a manifest and entry list: known ids, weights in (0, 1],
    /// no repeated pair, per-source weight sum ≤ 1.
    pub fn from_parts(manifest: MappingManifest, entries: Vec<MappingEntry>) -> Result<Self> {
        let invalid = |msg: String| InputError::InvalidMapping(msg);

        fn catalog_index<'a>(ids: impl Iterator<Item = &'a Arc<str>>, layer: &str) -> Result<AHashMap<Arc<str>, usize>> {
            let mut index = AHashMap::new();
            for (i, id) in ids.enumerate() {
                if index.insert(id.clone(), i).is_some() {
                    return Err(InputError::DuplicateId { layer: Arc::from(layer), id: id.to_string() }.into())
                }
            }
            Ok(index)
        }

        let source_index = catalog_index(manifest.sources.iter().map(|u| &u.id), &manifest.source_layer)?;
        let target_index = catalog_index(manifest.targets.iter().map(|u| &u.id), &manifest.target_layer)?;

        if let Some(unit) = manifest.sources.iter().find(|u| !(u.area > 0.0))
            .map(|u| &u.id)
            .or_else(|| manifest.targets.iter().find(|u| !(u.area > 0.0)).map(|u| &u.id))
        {
            return Err(invalid(format!("unit {unit:?} has non-positive area")).into())
        }

        let mut seen = AHashSet::with_capacity(entries.len());
        let mut retained = vec![0.0; manifest.sources.len()];
        for entry in &entries {
            let Some(&i) = source_index.get(&entry.source_id) else {
                return Err(InputError::UnknownId { layer: Arc::from(manifest.source_layer.as_str()), id: entry.source_id.to_string() }.into())
            };
            if !target_index.contains_key(&entry.target_id) {
                return Err(InputError::UnknownId { layer: Arc::from(manifest.target_layer.as_str()), id: entry.target_id.to_string() }.into())
            }
            if !(entry.weight > 0.0 && entry.weight <= 1.0) {
                return Err(invalid(format!(
                    "weight {} for ({}, {}) is outside (0, 1]", entry.weight, entry.source_id, entry.target_id
                )).into())
            }
            if !seen.insert((entry.source_id.clone(), entry.target_id.clone())) {
                return Err(invalid(format!("pair ({}, {}) appears twice", entry.source_id, entry.target_id)).into())
            }
            retained[i] += entry.weight;
        }

        if let Some((i, total)) = retained.iter().enumerate().find(|&(_, &w)| w > 1.0 + AREA_TOLERANCE) {
            return Err(invalid(format!(
                "weights of source {:?} sum to {total}", manifest.sources[i].id
            )).into())
        }

        Ok(Self { manifest, entries, source_index, target_index })
    }

    #[inline] pub fn entries(&self) -> &[MappingEntry] { &self.entries }

    #[inline] pub fn len(&self) -> usize { self.entries.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    #[inline] pub fn manifest(&self) -> &MappingManifest { &self.manifest }

    /// Hash a boundary file into the manifest so later runs can skip the rebuild.
    pub fn record_input(&mut self, role: &str, path: &Path) -> anyhow::Result<()> {
        self.manifest.record_input(role, path)
    }

    /// Record how the boundary layers were loaded (identifier fields, CRS, reprojection).
    pub fn record_options(&mut self, options: BuildOptions) {
        self.manifest.options = options;
    }

    #[inline] pub fn sources(&self) -> &[SourceUnit] { &self.manifest.sources }

    #[inline] pub fn targets(&self) -> &[TargetUnit] { &self.manifest.targets }

    #[inline] pub fn crs(&self) -> &Crs { &self.manifest.crs }

    #[inline] pub fn min_weight(&self) -> f64 { self.manifest.min_weight }

    #[inline] pub fn source(&self, id: &str) -> Option<&SourceUnit> {
        self.source_index.get(id).map(|&i| &self.manifest.sources[i])
    }

    #[inline] pub fn target(&self, id: &str) -> Option<&TargetUnit> {
        self.target_index.get(id).map(|&i| &self.manifest.targets[i])
    }

    /// source_id → [(target_id, weight)], every source in catalog order.
    pub fn by_source(&self) -> Vec<Group<'_>> {
        let mut groups = self.manifest.sources.iter()
            .map(|unit| Group { key: &*unit.id, members: Vec::new() })
            .collect::<Vec<_>>();
        for entry in &self.entries {
            if let Some(&i) = self.source_index.get(&entry.source_id) {
                groups[i].members.push((&*entry.target_id, entry.weight));
            }
        }
        groups
    }

    /// target_id → [(source_id, weight)], every target in catalog order.
    pub fn by_target(&self) -> Vec<Group<'_>> {
        let mut groups = self.manifest.targets.iter()
            .map(|unit| Group { key: &*unit.id, members: Vec::new() })
            .collect::<Vec<_>>();
        for entry in &self.entries {
            if let Some(&i) = self.target_index.get(&entry.target_id) {
                groups[i].members.push((&*entry.source_id, entry.weight));
            }
        }
        groups
    }

    /// Σ retained weight of a source unit.
    pub fn retained_weight(&self, source_id: &str) -> Option<f64> {
        self.source(source_id)?;
        Some(self.entries.iter()
            .filter(|e| &*e.source_id == source_id)
            .map(|e| e.weight)
            .sum())
    }

    /// Fraction of a target unit's own area covered by its mapped sources:
    /// Σ weight × source area / target area.
    pub fn covered_fraction(&self, target_id: &str) -> Option<f64> {
        let target = self.target(target_id)?;
        let covered = self.entries.iter()
            .filter(|e| &*e.target_id == target_id)
            .filter_map(|e| self.source(&e.source_id).map(|s| e.weight * s.area))
            .sum::<f64>();
        Some(covered / target.area)
    }

    /// The persisted columns: `source_id`, `target_id`, `weight`.
    pub fn to_dataframe(&self) -> anyhow::Result<DataFrame> {
        Ok(DataFrame::new(vec![
            Column::new("source_id".into(), self.entries.iter().map(|e| &*e.source_id).collect::<Vec<_>>()),
            Column::new("target_id".into(), self.entries.iter().map(|e| &*e.target_id).collect::<Vec<_>>()),
            Column::new("weight".into(), self.entries.iter().map(|e| e.weight).collect::<Vec<_>>()),
        ])?)
    }

    /// Writes the entry table (CSV or Parquet by extension) and its JSON manifest.
    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        write_table(&self.to_dataframe()?, path)
            .with_context(|| format!("Failed to write mapping table: {}", path.display()))?;
        self.manifest.write(&manifest_path(path))?;
        info!(path = %path.display(), entries = self.entries.len(), "wrote mapping table");
        Ok(())
    }

    /// Reads a table written by [`MappingTable::write`] and re-validates it.
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let manifest = MappingManifest::read(&manifest_path(path))?;
        let df = read_table_typed(path, &[
            ("source_id", DataType::String),
            ("target_id", DataType::String),
            ("weight", DataType::Float64),
        ])?;

        let sources = string_column(&df, "source_id")?;
        let targets = string_column(&df, "target_id")?;
        let weights = numeric_column(&df, "weight")?;

        let entries = sources.into_iter().zip(targets).zip(weights).enumerate()
            .map(|(row, ((s, t), w))| match (s, t, w) {
                (Some(s), Some(t), Some(w)) => Ok(MappingEntry { source_id: Arc::from(s), target_id: Arc::from(t), weight: w }),
                _ => Err(InputError::InvalidMapping(format!("row {row} has a null cell"))),
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if entries.len() != manifest.entry_count {
            return Err(InputError::InvalidMapping(format!(
                "manifest lists {} entries, table has {}", manifest.entry_count, entries.len()
            )).into())
        }

        Ok(Self::from_parts(manifest, entries)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::overlay::{Discarded, UnitArea};

    fn unit(id: &str, area: f64) -> UnitArea { UnitArea { id: Arc::from(id), area } }

    fn entry(s: &str, t: &str, weight: f64) -> MappingEntry {
        MappingEntry { source_id: Arc::from(s), target_id: Arc::from(t), weight }
    }

    /// A (100) and B (50) both reach T; A also reaches U; V is untouched.
    fn example() -> MappingTable {
        MappingTable::from_normalized(NormalizedOverlaps {
            source_layer: Arc::from("fsa"),
            target_layer: Arc::from("hood"),
            sources: vec![unit("A", 100.0), unit("B", 50.0)],
            targets: vec![unit("T", 70.0), unit("U", 60.0), unit("V", 10.0)],
            entries: vec![entry("A", "T", 0.4), entry("A", "U", 0.6), entry("B", "T", 0.6)],
            discarded: vec![Discarded::default(), Discarded { weight: 0.0005, count: 1 }],
            min_weight: 0.001,
        }, Crs::epsg(5070)).unwrap()
    }

    #[test]
    fn views_are_consistent_with_entries() {
        let table = example();

        let by_source = table.by_source();
        assert_eq!(by_source.len(), 2);
        assert_eq!(by_source[0].key, "A");
        assert_eq!(by_source[0].members, vec![("T", 0.4), ("U", 0.6)]);
        assert_eq!(by_source[1].members, vec![("T", 0.6)]);

        let by_target = table.by_target();
        assert_eq!(by_target.iter().map(|g| g.key).collect::<Vec<_>>(), vec!["T", "U", "V"]);
        assert_eq!(by_target[0].members, vec![("A", 0.4), ("B", 0.6)]);
        assert!(by_target[2].members.is_empty());

        let from_sources = by_source.iter().map(|g| g.members.len()).sum::<usize>();
        let from_targets = by_target.iter().map(|g| g.members.len()).sum::<usize>();
        assert_eq!(from_sources, table.len());
        assert_eq!(from_targets, table.len());
    }

    #[test]
    fn coverage_queries() {
        let table = example();
        assert!((table.retained_weight("A").unwrap() - 1.0).abs() < 1e-12);
        assert!((table.retained_weight("B").unwrap() - 0.6).abs() < 1e-12);
        assert_eq!(table.retained_weight("Z"), None);

        // T receives 0.4 × 100 + 0.6 × 50 = 70 of its 70.
        assert!((table.covered_fraction("T").unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(table.covered_fraction("V"), Some(0.0));
        assert_eq!(table.sources()[1].discarded_weight, 0.0005);
    }

    #[test]
    fn rejects_unknown_ids_and_bad_weights() {
        let manifest = example().manifest().clone();

        let err = MappingTable::from_parts(manifest.clone(), vec![entry("A", "W", 0.5)]).unwrap_err();
        assert!(matches!(err, Error::Input(InputError::UnknownId { .. })));

        let err = MappingTable::from_parts(manifest.clone(), vec![entry("A", "T", 1.5)]).unwrap_err();
        assert!(matches!(err, Error::Input(InputError::InvalidMapping(_))));

        let err = MappingTable::from_parts(manifest.clone(), vec![entry("A", "T", 0.0)]).unwrap_err();
        assert!(matches!(err, Error::Input(InputError::InvalidMapping(_))));

        let err = MappingTable::from_parts(manifest.clone(), vec![entry("A", "T", 0.7), entry("A", "U", 0.7)]).unwrap_err();
        assert!(matches!(err, Error::Input(InputError::InvalidMapping(_))));

        let err = MappingTable::from_parts(manifest, vec![entry("A", "T", 0.3), entry("A", "T", 0.3)]).unwrap_err();
        assert!(matches!(err, Error::Input(InputError::InvalidMapping(_))));
    }

    #[test]
    fn persisted_table_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["mapping.csv", "mapping.parquet"] {
            let path = dir.path().join(name);
            let table = example();
            table.write(&path).unwrap();
            assert!(manifest_path(&path).exists());

            let back = MappingTable::read(&path).unwrap();
            assert_eq!(back.entries(), table.entries());
            assert_eq!(back.manifest(), table.manifest());
        }
    }

    #[test]
    fn empty_table_round_trips() {
        // Every overlap fell under the threshold: both catalogs, no entries.
        let empty = MappingTable::from_normalized(NormalizedOverlaps {
            source_layer: Arc::from("fsa"),
            target_layer: Arc::from("hood"),
            sources: vec![unit("A", 100.0)],
            targets: vec![unit("T", 0.05)],
            entries: vec![],
            discarded: vec![Discarded { weight: 0.0005, count: 1 }],
            min_weight: 0.001,
        }, Crs::epsg(5070)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        for name in ["empty.csv", "empty.parquet"] {
            let path = dir.path().join(name);
            empty.write(&path).unwrap();

            let back = MappingTable::read(&path).unwrap();
            assert!(back.is_empty());
            assert_eq!(back.targets().len(), 1);
            assert_eq!(back.covered_fraction("T"), Some(0.0));
        }
    }
}
