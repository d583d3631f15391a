mod bbox;
mod crs;
mod layer;
mod proj;

pub(crate) use bbox::envelope_of;
pub use crs::{Crs, CrsKind};
pub use layer::PartitionLayer;
