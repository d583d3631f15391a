use std::sync::Arc;

use thiserror::Error;

/// Fatal problems with the boundary layers, tables, or persisted artifacts.
/// Raised before (or instead of) any computation on the offending input.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("layer {layer:?} has no coordinate reference system")]
    MissingCrs { layer: Arc<str> },

    #[error("layer {layer:?} uses {found}, expected {expected}")]
    CrsMismatch { layer: Arc<str>, found: String, expected: String },

    #[error("{crs} is not an equal-area coordinate reference system; overlap areas would be biased")]
    NotEqualArea { crs: String },

    #[error("cannot reproject layer {layer:?} from {from} to {to}: {reason}")]
    Projection { layer: Arc<str>, from: String, to: String, reason: String },

    #[error("unit {id:?} in layer {layer:?} has non-polygonal geometry ({kind})")]
    NonPolygonal { layer: Arc<str>, id: String, kind: String },

    #[error("unit {id:?} in layer {layer:?} has empty or zero-area geometry")]
    EmptyGeometry { layer: Arc<str>, id: String },

    #[error("identifier {id:?} appears more than once in {layer:?}")]
    DuplicateId { layer: Arc<str>, id: String },

    #[error("identifier {id:?} is not a unit of {layer:?}")]
    UnknownId { layer: Arc<str>, id: String },

    #[error("layer {layer:?} is missing identifier for record {index}")]
    MissingId { layer: Arc<str>, index: usize },

    #[error("layer {layer:?}: {ids} identifiers for {shapes} shapes")]
    LengthMismatch { layer: Arc<str>, ids: usize, shapes: usize },

    #[error("units {first:?} and {second:?} of layer {layer:?} overlap in area")]
    OverlappingUnits { layer: Arc<str>, first: String, second: String },

    #[error("intersection of {source_id:?} and {target_id:?} has area {area}, larger than either unit")]
    OversizedIntersection { source_id: String, target_id: String, area: f64 },

    #[error("source unit {source_id:?} is covered {covered} times its own area by the target layer")]
    OverCovered { source_id: String, covered: f64 },

    #[error("column {field:?} has {found} values, expected {expected}")]
    ColumnLength { field: String, expected: usize, found: usize },

    #[error("field {field:?} is not numeric")]
    NonNumericField { field: String },

    #[error("table is missing column {column:?}")]
    MissingColumn { column: String },

    #[error("invalid mapping artifact: {0}")]
    InvalidMapping(String),
}

/// Fatal problems with the extensive/intensive classification of requested fields.
#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("field {field:?} has no extensive/intensive classification")]
    Unclassified { field: String },

    #[error("field {field:?} is not present in the source statistics")]
    UnknownField { field: String },

    #[error("population field {field:?} must be classified extensive")]
    PopulationNotExtensive { field: String },
}

/// Out-of-range configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("min_weight must be in [0, 1), got {0}")]
    MinWeight(f64),

    #[error("coverage_bound must be in (0, 1], got {0}")]
    CoverageBound(f64),

    #[error("partition_tolerance must be in [0, 1), got {0}")]
    PartitionTolerance(f64),

    #[error("invalid coordinate reference system {0:?}")]
    Crs(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;
