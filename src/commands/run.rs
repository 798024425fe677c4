use std::path::Path;

use anyhow::Result;
use tracing::info;
use urban_sprawl::io::store::DiskStore;
use urban_sprawl::pipeline::{run_monthly, PipelineConfig, RunPeriod};

use crate::cli::{Cli, RunArgs};

pub fn run(_cli: &Cli, args: &RunArgs) -> Result<()> {
    let config = PipelineConfig::load(&args.config)?;
    let period = RunPeriod::new(args.year, args.month)?;

    let inputs = DiskStore::new(args.config.parent().unwrap_or(Path::new(".")));
    let mut outputs = DiskStore::new(&config.output_dir);
    info!("[run] config={} -> {}", args.config.display(), outputs.root().display());

    let summary = run_monthly(&config, period, &inputs, &mut outputs, args.force)?;
    for mask in &summary.masks {
        let ha = mask.zonal.rows().iter().map(|r| (r.intersecting_ha, r.total_ha))
            .fold((0.0, 0.0), |acc, r| (acc.0 + r.0, acc.1 + r.1));
        println!("{period} {}: {:.2} ha intersecting of {:.2} ha in zones", mask.label, ha.0, ha.1);
    }
    Ok(())
}
