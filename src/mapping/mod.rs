mod manifest;
mod table;

pub use manifest::{manifest_path, BuildOptions, InputFile, LayerOptions, MappingManifest, SourceUnit, TargetUnit, MANIFEST_VERSION};
pub use table::{Group, MappingTable};
