use std::path::PathBuf;

/// Areal-weighted interpolation CLI (argument schema only)
#[derive(clap::Parser, Debug)]
#[command(name = "areal", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv, -vvv); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Build the source → target mapping table from two boundary layers (forbids stdout)
    Mapping(MappingArgs),

    /// Redistribute source statistics onto the target partition (forbids stdout)
    Interpolate(InterpolateArgs),

    /// Re-read a persisted mapping table and report its coverage
    Validate(ValidateArgs),
}

/// Settings shared by every subcommand; flags override the JSON config file.
#[derive(clap::Args, Debug)]
pub struct ConfigArgs {
    /// JSON configuration file
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Equal-area CRS for overlap computation, e.g. EPSG:5070 or ESRI:102001
    #[arg(long)]
    pub crs: Option<String>,

    /// Discard mapping entries with weight below this
    #[arg(long)]
    pub min_weight: Option<f64>,

    /// Flag units whose coverage falls below this
    #[arg(long)]
    pub coverage_bound: Option<f64>,

    /// Overlap tolerated between units of one layer, relative to the smaller unit
    #[arg(long)]
    pub partition_tolerance: Option<f64>,
}

#[derive(clap::Args, Debug)]
pub struct MappingArgs {
    /// Source partition boundaries (.geojson or .shp)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub source: PathBuf,

    /// Target partition boundaries (.geojson or .shp)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub target: PathBuf,

    /// Property holding the source unit identifier
    #[arg(long)]
    pub source_id: String,

    /// Property holding the target unit identifier
    #[arg(long)]
    pub target_id: String,

    /// CRS of the source file, when it does not declare one
    #[arg(long)]
    pub source_crs: Option<String>,

    /// CRS of the target file, when it does not declare one
    #[arg(long)]
    pub target_crs: Option<String>,

    /// Reproject geographic layers into the configured CRS
    #[arg(long)]
    pub reproject: bool,

    /// Rebuild even if the existing table was built from the same inputs
    #[arg(long)]
    pub force: bool,

    /// Output mapping table (.csv or .parquet; "-" is rejected)
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: PathBuf,

    #[command(flatten)]
    pub settings: ConfigArgs,
}

#[derive(clap::Args, Debug)]
pub struct InterpolateArgs {
    /// Mapping table written by `areal mapping`
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub mapping: PathBuf,

    /// Source statistics table (.csv or .parquet)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub statistics: PathBuf,

    /// Column of the statistics table holding the source unit identifier
    #[arg(long)]
    pub id_column: String,

    /// Fields to interpolate, defaults to every classified field
    #[arg(long, value_delimiter = ',')]
    pub fields: Vec<String>,

    /// Classify fields as extensive (counts, totals)
    #[arg(long, value_delimiter = ',')]
    pub extensive: Vec<String>,

    /// Classify fields as intensive (rates, averages)
    #[arg(long, value_delimiter = ',')]
    pub intensive: Vec<String>,

    /// Extensive field used to weight intensive fields
    #[arg(long)]
    pub population_field: Option<String>,

    /// Target-indexed event table to join onto the estimates
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub events: Option<PathBuf>,

    /// Column of the event table holding the target unit identifier
    #[arg(long, default_value = "target_id")]
    pub events_id: String,

    /// Output dataset (.csv or .parquet; "-" is rejected)
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: PathBuf,

    #[command(flatten)]
    pub settings: ConfigArgs,
}

#[derive(clap::Args, Debug)]
pub struct ValidateArgs {
    /// Mapping table written by `areal mapping`
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub mapping: PathBuf,

    /// Write the coverage report as JSON ("-" is rejected)
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub settings: ConfigArgs,
}
