use std::sync::Arc;

use ahash::AHashMap;
use polars::frame::DataFrame;
use tracing::{debug, warn};

use crate::error::{InputError, Result};
use crate::io::{numeric_column, string_column};

/// Per-source-unit statistics: one row per source id, one nullable numeric
/// column per field.
#[derive(Debug, Clone)]
pub struct SourceStatistics {
    ids: Vec<Arc<str>>,
    index: AHashMap<Arc<str>, usize>,
    names: Vec<String>,
    columns: Vec<Vec<Option<f64>>>,
}

impl SourceStatistics {
    /// Non-finite cells (NaN, ±inf) are treated as missing values.
    pub fn new(ids: Vec<String>, fields: Vec<(String, Vec<Option<f64>>)>) -> Result<Self> {
        let layer: Arc<str> = Arc::from("statistics");

        let mut index = AHashMap::with_capacity(ids.len());
        let ids = ids.into_iter()
            .enumerate()
            .map(|(i, id)| {
                let id: Arc<str> = Arc::from(id);
                match index.insert(id.clone(), i) {
                    Some(_) => Err(InputError::DuplicateId { layer: layer.clone(), id: id.to_string() }),
                    None => Ok(id),
                }
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut names = Vec::with_capacity(fields.len());
        let mut columns = Vec::with_capacity(fields.len());
        for (name, mut values) in fields {
            if values.len() != ids.len() {
                return Err(InputError::ColumnLength { field: name, expected: ids.len(), found: values.len() }.into())
            }
            let mut non_finite = 0;
            for value in values.iter_mut().filter(|v| v.is_some_and(|x| !x.is_finite())) {
                *value = None;
                non_finite += 1;
            }
            if non_finite > 0 {
                warn!(field = %name, count = non_finite, "non-finite statistic values treated as missing");
            }
            names.push(name);
            columns.push(values);
        }

        debug!(rows = ids.len(), fields = names.len(), "loaded source statistics");
        Ok(Self { ids, index, names, columns })
    }

    /// Pulls `fields` out of a DataFrame keyed by `id_column`. A null id is an
    /// input error; a non-numeric field column is an input error.
    pub fn from_dataframe(df: &DataFrame, id_column: &str, fields: &[&str]) -> anyhow::Result<Self> {
        let ids = string_column(df, id_column)?
            .into_iter()
            .enumerate()
            .map(|(index, id)| id.ok_or_else(|| InputError::MissingId { layer: Arc::from("statistics"), index }))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let columns = fields.iter()
            .map(|&field| Ok((field.to_string(), numeric_column(df, field)?)))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self::new(ids, columns)?)
    }

    #[inline] pub fn len(&self) -> usize { self.ids.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    #[inline] pub fn ids(&self) -> &[Arc<str>] { &self.ids }

    #[inline] pub fn field_names(&self) -> &[String] { &self.names }

    #[inline] pub fn contains(&self, id: &str) -> bool { self.index.contains_key(id) }

    #[inline] pub fn row_of(&self, id: &str) -> Option<usize> { self.index.get(id).copied() }

    pub fn field_index(&self, field: &str) -> Option<usize> {
        self.names.iter().position(|name| name == field)
    }

    /// Cell at (row, field column).
    #[inline] pub(crate) fn cell(&self, row: usize, field: usize) -> Option<f64> {
        self.columns[field][row]
    }

    /// Value of `field` for source `id`; outer `None` when the id or field is unknown.
    pub fn value(&self, id: &str, field: &str) -> Option<Option<f64>> {
        Some(self.cell(self.row_of(id)?, self.field_index(field)?))
    }

    /// Σ of the non-missing values of `field`.
    pub fn total(&self, field: &str) -> Option<f64> {
        let column = &self.columns[self.field_index(field)?];
        Some(column.iter().flatten().sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use polars::prelude::{Column, NamedFrom};

    #[test]
    fn builds_from_dataframe() {
        let df = DataFrame::new(vec![
            Column::new("fsa".into(), &["M5V", "M4C"]),
            Column::new("population".into(), &[Some(100i64), None]),
            Column::new("income".into(), &[52_000.0, 61_500.0]),
        ]).unwrap();

        let stats = SourceStatistics::from_dataframe(&df, "fsa", &["population", "income"]).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats.value("M5V", "population"), Some(Some(100.0)));
        assert_eq!(stats.value("M4C", "population"), Some(None));
        assert_eq!(stats.value("M4C", "rent"), None);
        assert_eq!(stats.total("income"), Some(113_500.0));
        assert_eq!(stats.total("population"), Some(100.0));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = SourceStatistics::new(
            vec!["A".into(), "A".into()],
            vec![("x".into(), vec![Some(1.0), Some(2.0)])],
        ).unwrap_err();
        assert!(matches!(err, Error::Input(InputError::DuplicateId { .. })));
    }

    #[test]
    fn rejects_text_fields() {
        let df = DataFrame::new(vec![
            Column::new("id".into(), &["A"]),
            Column::new("name".into(), &["Annex"]),
        ]).unwrap();
        let err = SourceStatistics::from_dataframe(&df, "id", &["name"]).unwrap_err();
        assert!(matches!(err.downcast_ref::<InputError>(), Some(InputError::NonNumericField { .. })));
    }

    #[test]
    fn non_finite_values_become_missing() {
        let stats = SourceStatistics::new(
            vec!["A".into(), "B".into()],
            vec![("x".into(), vec![Some(f64::NAN), Some(2.0)])],
        ).unwrap();
        assert_eq!(stats.value("A", "x"), Some(None));
        assert_eq!(stats.total("x"), Some(2.0));
    }
}
