use std::sync::Arc;

use polars::{frame::DataFrame, prelude::{Column, NamedFrom}};
use serde::Serialize;

use crate::config::FieldKind;

/// Why a target has no value for a field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UndefinedReason {
    /// No source unit maps to the target.
    NoCoverage,
    /// A contributing source has no row in the statistics.
    MissingSourceRow { source_id: Arc<str> },
    /// A contributing source has a row but a null value for the field
    /// (or for the population field under population weighting).
    MissingSourceValue { source_id: Arc<str>, field: String },
    /// Intensive weighting mass Σ w (or Σ w·P) is zero.
    ZeroWeight,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UndefinedEstimate {
    pub target_id: Arc<str>,
    pub field: String,
    pub reason: UndefinedReason,
}

/// Which sources fed a target estimate, and how much of the target they cover.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Provenance {
    pub contributors: Vec<(Arc<str>, f64)>,
    pub total_weight: f64,
    pub coverage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetRow {
    pub target_id: Arc<str>,
    pub values: Vec<Option<f64>>,
    pub provenance: Provenance,
}

/// Interpolated statistics for every target unit, in catalog order.
#[derive(Debug, Clone)]
pub struct TargetEstimate {
    pub(crate) fields: Vec<(String, FieldKind)>,
    pub(crate) rows: Vec<TargetRow>,
    pub(crate) undefined: Vec<UndefinedEstimate>,
}

impl TargetEstimate {
    #[inline] pub fn fields(&self) -> &[(String, FieldKind)] { &self.fields }

    #[inline] pub fn rows(&self) -> &[TargetRow] { &self.rows }

    #[inline] pub fn undefined(&self) -> &[UndefinedEstimate] { &self.undefined }

    #[inline] pub fn len(&self) -> usize { self.rows.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    pub fn field_index(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|(name, _)| name == field)
    }

    pub fn row(&self, target_id: &str) -> Option<&TargetRow> {
        self.rows.iter().find(|row| &*row.target_id == target_id)
    }

    /// Estimate for (target, field); outer `None` when either is unknown.
    pub fn value(&self, target_id: &str, field: &str) -> Option<Option<f64>> {
        let i = self.field_index(field)?;
        Some(self.row(target_id)?.values[i])
    }

    /// Σ of the defined estimates of `field` across targets.
    pub fn total(&self, field: &str) -> Option<f64> {
        let i = self.field_index(field)?;
        Some(self.rows.iter().filter_map(|row| row.values[i]).sum())
    }

    /// `target_id`, one nullable column per field, then `total_weight`,
    /// `coverage_fraction`, `source_count`.
    pub fn to_dataframe(&self) -> anyhow::Result<DataFrame> {
        let mut columns = Vec::with_capacity(self.fields.len() + 4);
        columns.push(Column::new(
            "target_id".into(),
            self.rows.iter().map(|row| &*row.target_id).collect::<Vec<_>>(),
        ));
        for (i, (name, _)) in self.fields.iter().enumerate() {
            columns.push(Column::new(
                name.as_str().into(),
                self.rows.iter().map(|row| row.values[i]).collect::<Vec<_>>(),
            ));
        }
        columns.push(Column::new(
            "total_weight".into(),
            self.rows.iter().map(|row| row.provenance.total_weight).collect::<Vec<_>>(),
        ));
        columns.push(Column::new(
            "coverage_fraction".into(),
            self.rows.iter().map(|row| row.provenance.coverage).collect::<Vec<_>>(),
        ));
        columns.push(Column::new(
            "source_count".into(),
            self.rows.iter().map(|row| row.provenance.contributors.len() as u32).collect::<Vec<_>>(),
        ));
        Ok(DataFrame::new(columns)?)
    }
}
