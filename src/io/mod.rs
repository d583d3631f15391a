mod geojson;
mod hash;
mod shp;
mod table;

use std::path::Path;

use anyhow::{bail, Result};

use crate::geom::{Crs, PartitionLayer};

pub use geojson::{parse_geojson_layer, read_geojson_layer};
pub use hash::sha256_file;
pub use shp::read_shapefile_layer;
pub use table::{numeric_column, read_table, read_table_typed, string_column, write_json, write_table, TableFormat};

/// Loads a boundary layer, dispatching on the file extension (`.geojson`/`.json` or `.shp`).
pub fn read_layer(path: &Path, name: &str, id_field: &str, declared: Option<Crs>) -> Result<PartitionLayer> {
    match path.extension().and_then(|ext| ext.to_str()).map(|ext| ext.to_ascii_lowercase()).as_deref() {
        Some("geojson" | "json") => read_geojson_layer(path, name, id_field, declared),
        Some("shp") => read_shapefile_layer(path, name, id_field, declared),
        _ => bail!("unsupported boundary format (expected .geojson or .shp): {}", path.display()),
    }
}
