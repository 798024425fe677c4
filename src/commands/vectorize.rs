use anyhow::{Context, Result};
use tracing::{info, warn};
use urban_sprawl::io::{geojson::write_geojson, raster::read_raster};
use urban_sprawl::raster::{vectorize, Connectivity};

use crate::cli::{Cli, VectorizeArgs};
use crate::commands::write_file;

pub fn run(_cli: &Cli, args: &VectorizeArgs) -> Result<()> {
    let bytes = std::fs::read(&args.raster)
        .with_context(|| format!("[vectorize] Failed to read {}", args.raster.display()))?;
    let mask = read_raster(&bytes)?;

    info!("[vectorize] {} positive pixels covering {:.2} squared CRS units", mask.positive_count(), mask.positive_area());
    let connectivity = if args.eight { Connectivity::Eight } else { Connectivity::Four };
    let polygons = vectorize(&mask, connectivity)?;
    if polygons.is_empty() {
        warn!("[vectorize] no positive pixels in {}", args.raster.display());
    }

    write_file(&args.out, &write_geojson(&polygons)?)?;
    info!("[vectorize] {} polygons -> {}", polygons.len(), args.out.display());
    Ok(())
}
