use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, InputError};

/// Broad class of a coordinate reference system, as far as area computation cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrsKind {
    /// Longitude/latitude in degrees. Planar areas are meaningless here.
    Geographic,
    /// Projected, area-preserving.
    EqualArea,
    /// Projected, but not area-preserving (conformal, equidistant, ...).
    Other,
    /// Not in the registry.
    Unknown,
}

/// A coordinate reference system identifier such as `EPSG:5070` or `ESRI:102001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crs {
    authority: String,
    code: u32,
}

struct KnownCrs {
    authority: &'static str,
    code: u32,
    kind: CrsKind,
    proj4: &'static str,
}

const REGISTRY: &[KnownCrs] = &[
    KnownCrs { authority: "EPSG", code: 4326, kind: CrsKind::Geographic,
        proj4: "+proj=longlat +datum=WGS84 +no_defs +type=crs" },
    KnownCrs { authority: "EPSG", code: 4269, kind: CrsKind::Geographic,
        proj4: "+proj=longlat +datum=NAD83 +no_defs +type=crs" },
    KnownCrs { authority: "EPSG", code: 4617, kind: CrsKind::Geographic,
        proj4: "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs +type=crs" },
    // NAD83 / Conus Albers
    KnownCrs { authority: "EPSG", code: 5070, kind: CrsKind::EqualArea,
        proj4: "+proj=aea +lat_0=23 +lon_0=-96 +lat_1=29.5 +lat_2=45.5 +x_0=0 +y_0=0 +datum=NAD83 +units=m +no_defs +type=crs" },
    // ETRS89-extended / LAEA Europe
    KnownCrs { authority: "EPSG", code: 3035, kind: CrsKind::EqualArea,
        proj4: "+proj=laea +lat_0=52 +lon_0=10 +x_0=4321000 +y_0=3210000 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs +type=crs" },
    // NAD83 / BC Albers
    KnownCrs { authority: "EPSG", code: 3005, kind: CrsKind::EqualArea,
        proj4: "+proj=aea +lat_0=45 +lon_0=-126 +lat_1=50 +lat_2=58.5 +x_0=1000000 +y_0=0 +datum=NAD83 +units=m +no_defs +type=crs" },
    // NAD83 / California Albers
    KnownCrs { authority: "EPSG", code: 3310, kind: CrsKind::EqualArea,
        proj4: "+proj=aea +lat_0=0 +lon_0=-120 +lat_1=34 +lat_2=40.5 +x_0=0 +y_0=-4000000 +datum=NAD83 +units=m +no_defs +type=crs" },
    // Canada Albers Equal Area Conic
    KnownCrs { authority: "ESRI", code: 102001, kind: CrsKind::EqualArea,
        proj4: "+proj=aea +lat_0=40 +lon_0=-96 +lat_1=50 +lat_2=70 +x_0=0 +y_0=0 +datum=NAD83 +units=m +no_defs +type=crs" },
    // North America Albers Equal Area Conic
    KnownCrs { authority: "ESRI", code: 102008, kind: CrsKind::EqualArea,
        proj4: "+proj=aea +lat_0=40 +lon_0=-96 +lat_1=20 +lat_2=60 +x_0=0 +y_0=0 +datum=NAD83 +units=m +no_defs +type=crs" },
    // NAD83 / Statistics Canada Lambert (conformal, NOT equal-area)
    KnownCrs { authority: "EPSG", code: 3347, kind: CrsKind::Other,
        proj4: "+proj=lcc +lat_0=63.390675 +lon_0=-91.8666666666667 +lat_1=49 +lat_2=77 +x_0=6200000 +y_0=3000000 +datum=NAD83 +units=m +no_defs +type=crs" },
    // WGS 84 / Pseudo-Mercator
    KnownCrs { authority: "EPSG", code: 3857, kind: CrsKind::Other,
        proj4: "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +nadgrids=@null +no_defs +type=crs" },
];

impl Crs {
    pub fn new(authority: &str, code: u32) -> Self {
        Self { authority: authority.to_ascii_uppercase(), code }
    }

    /// Shorthand for `EPSG:<code>`.
    pub fn epsg(code: u32) -> Self { Self::new("EPSG", code) }

    #[inline] pub fn authority(&self) -> &str { &self.authority }

    #[inline] pub fn code(&self) -> u32 { self.code }

    fn known(&self) -> Option<&'static KnownCrs> {
        REGISTRY.iter().find(|k| k.authority == self.authority && k.code == self.code)
    }

    pub fn kind(&self) -> CrsKind {
        self.known().map_or(CrsKind::Unknown, |k| k.kind)
    }

    /// PROJ.4 definition, if the system is registered.
    pub fn proj4(&self) -> Option<&'static str> {
        self.known().map(|k| k.proj4)
    }

    /// Succeeds for registered equal-area systems and for systems the caller
    /// explicitly declares equal-area in `declared`.
    pub fn ensure_equal_area(&self, declared: &[Crs]) -> Result<(), InputError> {
        if self.kind() == CrsKind::EqualArea || declared.contains(self) {
            Ok(())
        } else {
            Err(InputError::NotEqualArea { crs: self.to_string() })
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.authority, self.code)
    }
}

impl FromStr for Crs {
    type Err = ConfigError;

    /// Accepts `EPSG:5070`, `esri:102001`, `urn:ogc:def:crs:EPSG::5070`
    /// (optionally versioned, e.g. `urn:ogc:def:crs:EPSG:9.8:5070`) and `OGC:CRS84`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || ConfigError::Crs(s.to_string());

        let lower = s.to_ascii_lowercase();
        if lower.ends_with("crs84") {
            return Ok(Self::epsg(4326));
        }

        let parts = if let Some(rest) = lower.strip_prefix("urn:ogc:def:crs:") {
            // AUTH:[version]:CODE
            let mut fields = rest.split(':');
            let authority = fields.next().ok_or_else(err)?;
            let code = fields.last().ok_or_else(err)?;
            (authority.to_string(), code.to_string())
        } else {
            let (authority, code) = lower.split_once(':').ok_or_else(err)?;
            (authority.to_string(), code.to_string())
        };

        let code = parts.1.trim().parse::<u32>().map_err(|_| err())?;
        if parts.0.is_empty() { return Err(err()) }
        Ok(Self::new(&parts.0, code))
    }
}

impl TryFrom<String> for Crs {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

impl From<Crs> for String {
    fn from(value: Crs) -> Self { value.to_string() }
}
