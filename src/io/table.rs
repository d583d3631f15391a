use std::{fs::File, io::BufWriter, path::Path, sync::Arc};

use anyhow::{bail, Context, Result};
use polars::{
    frame::DataFrame,
    io::{SerReader, SerWriter},
    prelude::{CsvReadOptions, CsvReader, CsvWriter, DataType, Field, ParquetReader, ParquetWriter, Schema},
};
use serde::Serialize;

use crate::error::InputError;

/// Tabular formats understood by the pipeline, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat { Csv, Parquet }

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()).map(|ext| ext.to_ascii_lowercase()) {
            Some(ext) if ext == "csv" => Ok(Self::Csv),
            Some(ext) if ext == "parquet" || ext == "pq" => Ok(Self::Parquet),
            _ => bail!("unsupported table format (expected .csv or .parquet): {}", path.display()),
        }
    }
}

/// Reads a CSV or Parquet file into a DataFrame.
/// Columns named in `string_columns` are forced to String so identifiers keep
/// their leading zeros; each must be present.
pub fn read_table(path: &Path, string_columns: &[&str]) -> Result<DataFrame> {
    let columns = string_columns.iter().map(|&name| (name, DataType::String)).collect::<Vec<_>>();
    read_table_typed(path, &columns)
}

/// Like [`read_table`], with an explicit dtype per named column. A header-only
/// CSV gives polars nothing to infer from, so fixed-schema tables name every
/// column here.
pub fn read_table_typed(path: &Path, columns: &[(&str, DataType)]) -> Result<DataFrame> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open table: {}", path.display()))?;

    let mut df = match TableFormat::from_path(path)? {
        TableFormat::Csv => {
            let schema = Schema::from_iter(columns.iter()
                .map(|(name, dtype)| Field::new((*name).into(), dtype.clone())));
            let options = CsvReadOptions::default()
                .with_has_header(true)
                .with_schema_overwrite(Some(Arc::new(schema)));
            CsvReader::new(file)
                .with_options(options)
                .finish()
                .with_context(|| format!("Failed to read CSV file: {}", path.display()))?
        }
        TableFormat::Parquet => ParquetReader::new(file)
            .finish()
            .with_context(|| format!("Failed to read Parquet file: {}", path.display()))?,
    };

    for (name, dtype) in columns {
        let column = df.column(name)
            .map_err(|_| InputError::MissingColumn { column: name.to_string() })?;
        if column.dtype() != dtype {
            let cast = column.as_materialized_series().cast(dtype)?;
            df.with_column(cast)?;
        }
    }

    Ok(df)
}

/// Writes a DataFrame as CSV or Parquet, depending on the extension of `path`.
pub fn write_table(df: &DataFrame, path: &Path) -> Result<()> {
    let format = TableFormat::from_path(path)?;
    let file = File::create(path)
        .with_context(|| format!("Failed to create table: {}", path.display()))?;
    let writer = BufWriter::new(file);

    let mut df = df.clone();
    match format {
        TableFormat::Csv => { CsvWriter::new(writer).finish(&mut df)?; }
        TableFormat::Parquet => { ParquetWriter::new(writer).finish(&mut df)?; }
    }
    Ok(())
}

/// Numeric view of a column; integers and floats are widened to f64, nulls kept.
pub fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df.column(name)
        .map_err(|_| InputError::MissingColumn { column: name.to_string() })?;
    if !column.dtype().is_numeric() {
        return Err(InputError::NonNumericField { field: name.to_string() }.into())
    }
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

/// String view of a column; nulls are kept as `None`.
pub fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df.column(name)
        .map_err(|_| InputError::MissingColumn { column: name.to_string() })?;
    let series = column.as_materialized_series().cast(&DataType::String)?;
    Ok(series.str()?.into_iter().map(|value| value.map(str::to_string)).collect())
}

/// Pretty-printed JSON artifact (reports, manifests, metrics).
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create JSON file: {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("Failed to write JSON file: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::{Column, NamedFrom};

    fn frame() -> DataFrame {
        DataFrame::new(vec![
            Column::new("fsa".into(), ["M5V", "M4C"]),
            Column::new("population".into(), [Some(100i64), None]),
            Column::new("median_income".into(), [52000.5, 61000.0]),
        ]).unwrap()
    }

    #[test]
    fn csv_round_trip_keeps_identifiers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.csv");
        write_table(&frame(), &path).unwrap();

        let df = read_table(&path, &["fsa"]).unwrap();
        assert_eq!(string_column(&df, "fsa").unwrap(), vec![Some("M5V".into()), Some("M4C".into())]);
        assert_eq!(numeric_column(&df, "population").unwrap(), vec![Some(100.0), None]);
        assert_eq!(numeric_column(&df, "median_income").unwrap(), vec![Some(52000.5), Some(61000.0)]);
    }

    #[test]
    fn parquet_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.parquet");
        write_table(&frame(), &path).unwrap();

        let df = read_table(&path, &["fsa"]).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(numeric_column(&df, "median_income").unwrap()[1], Some(61000.0));
    }

    #[test]
    fn numeric_ids_become_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.csv");
        std::fs::write(&path, "code,value\n001,1\n020,2\n").unwrap();

        let df = read_table(&path, &["code"]).unwrap();
        assert_eq!(string_column(&df, "code").unwrap(), vec![Some("001".into()), Some("020".into())]);
    }

    #[test]
    fn header_only_csv_keeps_declared_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "code,value\n").unwrap();

        let df = read_table_typed(&path, &[("code", DataType::String), ("value", DataType::Float64)]).unwrap();
        assert_eq!(df.height(), 0);
        assert_eq!(df.column("value").unwrap().dtype(), &DataType::Float64);
        assert!(numeric_column(&df, "value").unwrap().is_empty());
    }

    #[test]
    fn text_fields_are_not_numeric() {
        assert!(numeric_column(&frame(), "fsa").is_err());
        assert!(numeric_column(&frame(), "absent").is_err());
    }

    #[test]
    fn unknown_extension_is_rejected() {
        assert!(TableFormat::from_path(Path::new("out.xlsx")).is_err());
    }
}
