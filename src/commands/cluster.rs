use anyhow::{Context, Result};
use tracing::info;
use urban_sprawl::cluster::{build_clusters, summarize_clusters};
use urban_sprawl::io::geojson::{read_geojson, write_geojson};

use crate::cli::{Cli, ClusterArgs};
use crate::commands::write_file;

pub fn run(_cli: &Cli, args: &ClusterArgs) -> Result<()> {
    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("[cluster] Failed to read {}", args.input.display()))?;
    let polygons = read_geojson(&bytes)?;

    let clustered = build_clusters(&polygons, args.buffer)?;
    let summaries = summarize_clusters(&clustered, None)?;
    write_file(&args.out, &write_geojson(&clustered)?)?;

    info!("[cluster] {} features in {} clusters -> {}", clustered.len(), summaries.len(), args.out.display());
    for s in &summaries {
        println!("{}\t{}\t{:.4}", s.cluster_id, s.members, s.area_ha);
    }
    Ok(())
}
