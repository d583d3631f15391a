use std::sync::Arc;

use ahash::AHashMap;
use anyhow::{bail, Result};
use polars::{frame::DataFrame, prelude::{Column, NamedFrom}};
use tracing::{info, warn};

use crate::error::InputError;
use crate::interp::TargetEstimate;
use crate::io::{numeric_column, string_column};

/// Attaches a target-indexed event table to the estimate frame.
///
/// `events` must already be aggregated to one row per target id in
/// `id_column`; its other columns must be numeric. Rows follow the target
/// catalog. Event ids outside the catalog are rejected; targets with no event
/// row get nulls.
pub fn join_events(estimate: &TargetEstimate, events: &DataFrame, id_column: &str) -> Result<DataFrame> {
    let mut joined = estimate.to_dataframe()?;
    let layer: Arc<str> = Arc::from("events");

    let targets = estimate.rows().iter()
        .enumerate()
        .map(|(i, row)| (row.target_id.clone(), i))
        .collect::<AHashMap<_, _>>();

    // event row → target position
    let mut slot = vec![None; estimate.len()];
    for (index, id) in string_column(events, id_column)?.into_iter().enumerate() {
        let id = id.ok_or_else(|| InputError::MissingId { layer: layer.clone(), index })?;
        let Some(&target) = targets.get(id.as_str()) else {
            return Err(InputError::UnknownId { layer: layer.clone(), id }.into())
        };
        if slot[target].replace(index).is_some() {
            return Err(InputError::DuplicateId { layer: layer.clone(), id }.into())
        }
    }

    let names = events.get_column_names().into_iter()
        .filter(|name| name.as_str() != id_column)
        .map(|name| name.to_string())
        .collect::<Vec<_>>();

    for name in &names {
        if joined.column(name).is_ok() {
            bail!("event column {name:?} collides with an estimate column");
        }
        let values = numeric_column(events, name)?;
        let aligned = slot.iter()
            .map(|row| row.and_then(|row| values[row]))
            .collect::<Vec<_>>();
        joined.with_column(Column::new(name.as_str().into(), aligned))?;
    }

    let unmatched = slot.iter().filter(|row| row.is_none()).count();
    if unmatched > 0 {
        warn!(targets = unmatched, "targets without an event row keep null event values");
    }
    info!(columns = names.len(), rows = joined.height(), "joined event table");

    Ok(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldKind, InterpConfig};
    use crate::geom::Crs;
    use crate::interp::{interpolate, SourceStatistics};
    use crate::testing::table;

    fn estimate() -> TargetEstimate {
        let table = table(&[("A", 100.0)], &[("T", 50.0), ("U", 50.0)], &[("A", "T", 0.5), ("A", "U", 0.5)]);
        let stats = SourceStatistics::new(vec!["A".into()], vec![("count".into(), vec![Some(10.0)])]).unwrap();
        let config = InterpConfig::new(Crs::epsg(5070)).with_field("count", FieldKind::Extensive);
        interpolate(&table, &stats, &["count"], &config).unwrap()
    }

    #[test]
    fn aligns_events_to_catalog_and_keeps_gaps_null() {
        let events = DataFrame::new(vec![
            Column::new("hood".into(), &["U"]),
            Column::new("incidents".into(), &[7i64]),
        ]).unwrap();

        let joined = join_events(&estimate(), &events, "hood").unwrap();
        assert_eq!(joined.height(), 2);
        let incidents = joined.column("incidents").unwrap().as_materialized_series().f64().unwrap().clone();
        assert_eq!(incidents.into_iter().collect::<Vec<_>>(), vec![None, Some(7.0)]);
    }

    #[test]
    fn rejects_events_for_unknown_targets() {
        let events = DataFrame::new(vec![
            Column::new("hood".into(), &["Z"]),
            Column::new("incidents".into(), &[1i64]),
        ]).unwrap();

        let err = join_events(&estimate(), &events, "hood").unwrap_err();
        assert!(matches!(err.downcast_ref::<InputError>(), Some(InputError::UnknownId { .. })));
    }

    #[test]
    fn rejects_duplicate_event_rows() {
        let events = DataFrame::new(vec![
            Column::new("hood".into(), &["T", "T"]),
            Column::new("incidents".into(), &[1i64, 2]),
        ]).unwrap();

        let err = join_events(&estimate(), &events, "hood").unwrap_err();
        assert!(matches!(err.downcast_ref::<InputError>(), Some(InputError::DuplicateId { .. })));
    }
}
