#![doc = "Areal-weighted interpolation between two non-nesting polygon partitions"]
mod config;
mod coverage;
mod error;
mod geom;
mod interp;
mod io;
mod join;
mod mapping;
mod metrics;
mod overlay;
mod pipeline;

#[cfg(test)]
mod testing;

#[doc(inline)]
pub use config::{
    FieldKind, IntensiveWeighting, InterpConfig, DEFAULT_COVERAGE_BOUND, DEFAULT_MIN_WEIGHT, DEFAULT_PARTITION_TOLERANCE,
};

#[doc(inline)]
pub use coverage::{CoverageReport, CoverageWarning, SourceCoverage, TargetCoverage};

#[doc(inline)]
pub use error::{ClassificationError, ConfigError, Error, InputError, Result};

#[doc(inline)]
pub use geom::{Crs, CrsKind, PartitionLayer};

#[doc(inline)]
pub use interp::{interpolate, Provenance, SourceStatistics, TargetEstimate, TargetRow, UndefinedEstimate, UndefinedReason};

#[doc(inline)]
pub use io::{
    parse_geojson_layer, read_geojson_layer, read_layer, read_shapefile_layer, read_table, read_table_typed, sha256_file,
    write_json, write_table, TableFormat,
};

#[doc(inline)]
pub use join::join_events;

#[doc(inline)]
pub use mapping::{
    manifest_path, BuildOptions, Group, InputFile, LayerOptions, MappingManifest, MappingTable, SourceUnit, TargetUnit,
    MANIFEST_VERSION,
};

#[doc(inline)]
pub use metrics::{RunMetrics, RunStatus, StageMetrics};

#[doc(inline)]
pub use overlay::{
    compute_overlaps, normalize, Discarded, MappingEntry, NormalizedOverlaps, OverlapRecord, OverlapTable, UnitArea,
    AREA_TOLERANCE,
};

#[doc(inline)]
pub use pipeline::{build_mapping, run_interpolation, InterpolationRun, MappingBuild};
