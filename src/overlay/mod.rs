mod overlap;
mod weights;

pub use overlap::{compute_overlaps, OverlapRecord, OverlapTable, UnitArea, AREA_TOLERANCE};
pub use weights::{normalize, Discarded, MappingEntry, NormalizedOverlaps};
