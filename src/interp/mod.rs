mod estimate;
mod interpolate;
mod stats;

pub use estimate::{Provenance, TargetEstimate, TargetRow, UndefinedEstimate, UndefinedReason};
pub use interpolate::interpolate;
pub use stats::SourceStatistics;
