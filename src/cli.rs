use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};

/// Urban expansion analysis CLI
#[derive(Parser, Debug)]
#[command(name = "urban-sprawl", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the monthly pipeline described by a config file
    Run(RunArgs),

    /// Vectorize a decoded raster mask into GeoJSON polygons
    Vectorize(VectorizeArgs),

    /// Assign growth clusters to a GeoJSON polygon layer
    Cluster(ClusterArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Pipeline config (JSON); relative paths resolve against its directory
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub config: PathBuf,

    /// Report year, e.g. 2025
    #[arg(long)]
    pub year: i32,

    /// Report month (1-12)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
    pub month: u32,

    /// Recompute outputs even if they already exist
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct VectorizeArgs {
    /// Raster document (JSON grid)
    #[arg(value_hint = ValueHint::FilePath)]
    pub raster: PathBuf,

    /// Output GeoJSON file ("-" is rejected)
    #[arg(value_hint = ValueHint::FilePath)]
    pub out: PathBuf,

    /// Join diagonal pixels (8-connectivity)
    #[arg(long)]
    pub eight: bool,
}

#[derive(Args, Debug)]
pub struct ClusterArgs {
    /// Input GeoJSON in a projected CRS
    #[arg(value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Output GeoJSON file ("-" is rejected)
    #[arg(value_hint = ValueHint::FilePath)]
    pub out: PathBuf,

    /// Buffer distance in CRS units
    #[arg(long, default_value_t = urban_sprawl::cluster::DEFAULT_BUFFER_DISTANCE)]
    pub buffer: f64,
}
