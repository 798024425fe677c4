//! Monthly run orchestration: masks → overlays → clusters → zonal summaries → report.

mod config;
mod period;
mod report;

pub use config::{ChangeInput, ChangeRule, MaskInput, PipelineConfig, RestrictionInput, ZoneInput};
pub use period::RunPeriod;
pub use report::{build_report, ReportData, ReportZone, REPORT_TOP_ZONES};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cluster::{build_clusters, summarize_clusters, ClusterSummary};
use crate::crs::Crs;
use crate::feature::FeatureCollection;
use crate::io::{csv, geojson, raster as raster_io, store::{DatasetSink, DatasetSource}};
use crate::overlay::{split_by_restrictions, RestrictionSplit};
use crate::raster::{change_mask, vectorize, RasterMask};
use crate::zonal::{single_zone_summary, zonal_summary, ZonalRow, ZonalSummary};

/// Zone label of the one-row urban buffer summary.
pub const URBAN_BUFFER_ZONE: &str = "urban_buffer";

/// Why an optional step did not run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingOptionalInput { input: String },
    CachedOutput { path: String },
    EmptyInput,
}

/// Result of a step that may be skipped.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome<T> {
    Done(T),
    Skipped(SkipReason),
}

impl<T> StepOutcome<T> {
    pub fn done(&self) -> Option<&T> {
        match self { StepOutcome::Done(v) => Some(v), StepOutcome::Skipped(_) => None }
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match self { StepOutcome::Done(_) => None, StepOutcome::Skipped(r) => Some(r) }
    }
}

/// Output keys of one run, relative to the output store.
#[derive(Debug, Clone)]
pub struct RunLayout {
    period: RunPeriod,
}

impl RunLayout {
    pub fn new(period: RunPeriod) -> Self { Self { period } }

    fn key(&self, dir: &str, file: String) -> String { format!("{}/{dir}/{file}", self.period.label()) }

    pub fn derived_mask(&self, label: &str) -> String { self.key("dw", format!("{label}.json")) }
    pub fn intersections(&self, label: &str) -> String { self.key("intersections", format!("{label}_intersections.geojson")) }
    pub fn non_intersections(&self, label: &str) -> String { self.key("intersections", format!("{label}_no_intersections.geojson")) }
    pub fn clusters(&self, label: &str) -> String { self.key("intersections", format!("{label}_intersections_cluster.geojson")) }
    pub fn cluster_summary(&self, label: &str) -> String { self.key("stats", format!("resumen_clusters_{label}.csv")) }
    pub fn zonal_summary(&self, label: &str) -> String { self.key("stats", format!("resumen_expansion_{label}.csv")) }
    pub fn region_summary(&self, label: &str) -> String { self.key("stats", format!("resumen_expansion_buffer_{label}.csv")) }
    pub fn report(&self) -> String { self.key("stats", "urban_sprawl_report.json".into()) }
}

/// What one mask produced.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskRun {
    pub label: String,
    /// Why the overlay was not recomputed; `CachedOutput` when its outputs were read back.
    pub overlay_skip: Option<SkipReason>,
    pub intersecting: FeatureCollection,
    pub non_intersecting: FeatureCollection,
    pub clusters: StepOutcome<Vec<ClusterSummary>>,
    pub zonal: ZonalSummary,
    pub region: StepOutcome<ZonalRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub period: RunPeriod,
    pub masks: Vec<MaskRun>,
    pub report: ReportData,
}

/// Reference layers, loaded once per run and reprojected to the working CRS.
struct References {
    restrictions: Vec<(String, FeatureCollection)>,
    zones: FeatureCollection,
    urban_buffer: Option<FeatureCollection>,
}

fn read_vector(inputs: &dyn DatasetSource, path: &str, crs: &Crs) -> Result<FeatureCollection> {
    let bytes = inputs.get(path)?;
    geojson::read_geojson(&bytes)
        .and_then(|fc| fc.to_crs(crs))
        .with_context(|| format!("[pipeline] Failed to load {path}"))
}

fn read_mask(inputs: &dyn DatasetSource, path: &str) -> Result<RasterMask> {
    raster_io::read_raster(&inputs.get(path)?).with_context(|| format!("[pipeline] Failed to load raster {path}"))
}

impl References {
    fn load(config: &PipelineConfig, inputs: &dyn DatasetSource) -> Result<Self> {
        let crs = config.equal_area_crs();
        let restrictions = config.restrictions.iter()
            .map(|layer| Ok((layer.name.clone(), read_vector(inputs, &layer.path, &crs)?)))
            .collect::<Result<Vec<_>>>()?;
        let zones = read_vector(inputs, &config.zones.path, &crs)?;

        let urban_buffer = match &config.urban_buffer {
            Some(path) if inputs.has(path) => Some(read_vector(inputs, path, &crs)?),
            Some(path) => {
                warn!("[pipeline] urban buffer {path} not found");
                None
            }
            None => None,
        };
        Ok(Self { restrictions, zones, urban_buffer })
    }
}

/// Masks to process, in label order. Derived masks are cached under `dw/`.
fn collect_masks<S>(config: &PipelineConfig, layout: &RunLayout, inputs: &dyn DatasetSource, outputs: &mut S, force: bool)
    -> Result<Vec<(String, RasterMask)>>
where S: DatasetSource + DatasetSink
{
    let mut masks = config.masks.iter()
        .map(|m| Ok((m.label.clone(), read_mask(inputs, &m.path)?)))
        .collect::<Result<Vec<_>>>()?;

    let Some(change) = &config.change else { return Ok(masks) };
    let mut probabilities = None;
    for rule in &change.rules {
        let key = layout.derived_mask(&rule.label);
        if outputs.has(&key) && !force {
            info!("[pipeline] reusing derived mask {key}");
            masks.push((rule.label.clone(), raster_io::read_raster(&outputs.get(&key)?)?));
            continue;
        }
        if probabilities.is_none() {
            probabilities = Some((read_mask(inputs, &change.before)?, read_mask(inputs, &change.current)?));
        }
        let Some((before, current)) = &probabilities else { continue };
        let mask = change_mask(before, current, change.stable_max, rule.min)?;
        info!("[pipeline] {}: {} candidate pixels, {:.2} squared CRS units (min {})",
            rule.label, mask.positive_count(), mask.positive_area(), rule.min);
        outputs.put(&key, &raster_io::write_raster(&mask)?)?;
        masks.push((rule.label.clone(), mask));
    }
    Ok(masks)
}

/// Vectorize one mask and split it by the restriction layers, or read back a previous split.
fn overlay_step<S>(config: &PipelineConfig, refs: &References, layout: &RunLayout, label: &str, mask: &RasterMask, outputs: &mut S, force: bool)
    -> Result<(RestrictionSplit, Option<SkipReason>)>
where S: DatasetSource + DatasetSink
{
    let (inter_key, non_key) = (layout.intersections(label), layout.non_intersections(label));
    if !force && outputs.has(&inter_key) && outputs.has(&non_key) {
        let crs = config.equal_area_crs();
        let split = RestrictionSplit {
            intersecting: geojson::read_geojson(&outputs.get(&inter_key)?)?.to_crs(&crs)?,
            non_intersecting: geojson::read_geojson(&outputs.get(&non_key)?)?.to_crs(&crs)?,
        };
        let reason = SkipReason::CachedOutput { path: inter_key };
        info!("[pipeline] {label}: overlay skipped: {reason:?}");
        return Ok((split, Some(reason)));
    }

    let expansion = vectorize(mask, config.connectivity)?;
    if expansion.is_empty() {
        warn!("[pipeline] {label}: no expansion pixels");
    }
    let expansion = expansion.to_crs(&config.equal_area_crs())?;
    debug!("[pipeline] {label}: {} expansion polygons, {:.2} ha, extent {:?}",
        expansion.len(), expansion.total_area() / 10_000.0, expansion.bounds());

    let split = split_by_restrictions(&expansion, &refs.restrictions)?;
    if split.intersecting.is_empty() {
        warn!("[pipeline] {label}: no intersections with restriction layers");
    }
    outputs.put(&inter_key, &geojson::write_geojson(&split.intersecting)?)?;
    outputs.put(&non_key, &geojson::write_geojson(&split.non_intersecting)?)?;
    info!("[pipeline] {label}: {} intersecting, {} non-intersecting features",
        split.intersecting.len(), split.non_intersecting.len());
    Ok((split, None))
}

fn cluster_step<S: DatasetSink>(config: &PipelineConfig, layout: &RunLayout, label: &str, intersecting: &FeatureCollection, outputs: &mut S)
    -> Result<StepOutcome<Vec<ClusterSummary>>>
{
    let clustered = build_clusters(intersecting, config.cluster_buffer)?;
    let summaries = summarize_clusters(&clustered, Some(config.top_clusters))?;
    outputs.put(&layout.clusters(label), &geojson::write_geojson(&clustered)?)?;
    outputs.put(&layout.cluster_summary(label), &csv::write_cluster_csv(&summaries)?)?;

    if intersecting.is_empty() {
        info!("[pipeline] {label}: clustering skipped: {:?}", SkipReason::EmptyInput);
        return Ok(StepOutcome::Skipped(SkipReason::EmptyInput));
    }
    info!("[pipeline] {label}: {} clusters (largest {:.2} ha)",
        summaries.len(), summaries.first().map_or(0.0, |s| s.area_ha));
    Ok(StepOutcome::Done(summaries))
}

fn region_step<S: DatasetSink>(config: &PipelineConfig, refs: &References, layout: &RunLayout, label: &str, split: &RestrictionSplit, outputs: &mut S)
    -> Result<StepOutcome<ZonalRow>>
{
    let Some(region) = &refs.urban_buffer else {
        let reason = SkipReason::MissingOptionalInput { input: config.urban_buffer.clone().unwrap_or_else(|| "urban_buffer".into()) };
        info!("[pipeline] {label}: buffer summary skipped: {reason:?}");
        return Ok(StepOutcome::Skipped(reason));
    };
    let row = single_zone_summary(region, URBAN_BUFFER_ZONE, &split.intersecting, &split.non_intersecting)?;
    outputs.put(&layout.region_summary(label), &csv::write_region_csv(&row)?)?;
    Ok(StepOutcome::Done(row))
}

/// Run every configured mask for `period`, reading inputs from `inputs` and writing
/// all artifacts to `outputs`. Without `force`, existing overlay outputs are reused.
pub fn run_monthly<S>(config: &PipelineConfig, period: RunPeriod, inputs: &dyn DatasetSource, outputs: &mut S, force: bool)
    -> Result<RunSummary>
where S: DatasetSource + DatasetSink
{
    let layout = RunLayout::new(period);
    info!("[pipeline] run {period} (window end {}, previous {})", period.window_end(), period.previous());

    let refs = References::load(config, inputs)?;
    let masks = collect_masks(config, &layout, inputs, outputs, force)?;

    let mut runs = Vec::with_capacity(masks.len());
    for (label, mask) in &masks {
        let (split, overlay_skip) = overlay_step(config, &refs, &layout, label, mask, outputs, force)
            .with_context(|| format!("[pipeline] Overlay failed for {label}"))?;
        let clusters = cluster_step(config, &layout, label, &split.intersecting, outputs)?;

        let zonal = zonal_summary(&refs.zones, &config.zones.name_field, &split.intersecting, &split.non_intersecting)
            .with_context(|| format!("[pipeline] Zonal summary failed for {label}"))?;
        if zonal.is_empty() {
            warn!("[pipeline] {label}: no expansion inside any zone");
        }
        outputs.put(&layout.zonal_summary(label), &csv::write_zonal_csv(&zonal)?)?;

        let region = region_step(config, &refs, &layout, label, &split, outputs)?;
        runs.push(MaskRun {
            label: label.clone(),
            overlay_skip,
            intersecting: split.intersecting,
            non_intersecting: split.non_intersecting,
            clusters,
            zonal,
            region,
        });
    }

    let Some(primary) = runs.first() else {
        anyhow::bail!("[pipeline] No masks to process");
    };
    let report = build_report(
        period,
        (primary.label.as_str(), &primary.zonal),
        runs.get(1).map(|run| (run.label.as_str(), &run.zonal)),
    );
    let report_json = serde_json::to_vec_pretty(&report).context("[pipeline] Failed to serialize report")?;
    outputs.put(&layout.report(), &report_json)?;
    info!("[pipeline] run {period} done: {} masks", runs.len());

    Ok(RunSummary { period, masks: runs, report })
}
