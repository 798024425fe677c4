use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::cluster::DEFAULT_BUFFER_DISTANCE;
use crate::crs::Crs;
use crate::raster::Connectivity;
use crate::zonal::DEFAULT_ZONE_FIELD;

/// A precomputed change mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskInput {
    pub label: String,
    pub path: String,
}

/// One threshold applied to the current "built" probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRule {
    pub label: String,
    pub min: f64,
}

/// Two "built" probability grids from which masks are derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeInput {
    pub before: String,
    pub current: String,
    #[serde(default = "default_stable_max")]
    pub stable_max: f64,
    #[serde(default = "default_rules")]
    pub rules: Vec<ChangeRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestrictionInput {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneInput {
    pub path: String,
    #[serde(default = "default_zone_field")]
    pub name_field: String,
}

/// Run configuration. Input paths are keys into the input store; the CLI roots
/// that store at the config file's directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub output_dir: PathBuf,
    #[serde(default)]
    pub masks: Vec<MaskInput>,
    #[serde(default)]
    pub change: Option<ChangeInput>,
    pub restrictions: Vec<RestrictionInput>,
    pub zones: ZoneInput,
    #[serde(default)]
    pub urban_buffer: Option<String>,
    #[serde(default = "default_equal_area_epsg")]
    pub equal_area_epsg: u32,
    #[serde(default = "default_cluster_buffer")]
    pub cluster_buffer: f64,
    #[serde(default)]
    pub connectivity: Connectivity,
    #[serde(default = "default_top_clusters")]
    pub top_clusters: usize,
}

fn default_stable_max() -> f64 { 0.2 }
fn default_rules() -> Vec<ChangeRule> {
    vec![
        ChangeRule { label: "new_urban".into(), min: 0.5 },
        ChangeRule { label: "new_urban_strict".into(), min: 0.7 },
    ]
}
fn default_zone_field() -> String { DEFAULT_ZONE_FIELD.to_string() }
fn default_equal_area_epsg() -> u32 { Crs::MAGNA_ORIGEN_NACIONAL.epsg() }
fn default_cluster_buffer() -> f64 { DEFAULT_BUFFER_DISTANCE }
fn default_top_clusters() -> usize { 10 }

impl PipelineConfig {
    /// Parse and validate a JSON config. A relative `output_dir` is resolved against `base`.
    pub fn from_json(bytes: &[u8], base: &Path) -> Result<Self> {
        let mut config: PipelineConfig = serde_json::from_slice(bytes)
            .context("[pipeline::config] Failed to parse config")?;
        if config.output_dir.is_relative() {
            config.output_dir = base.join(&config.output_dir);
        }
        config.validate()?;
        Ok(config)
    }

    /// Read a config file; its directory is the base for relative paths.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("[pipeline::config] Failed to read {}", path.display()))?;
        let base = path.parent().unwrap_or(Path::new("."));
        Self::from_json(&bytes, base)
            .with_context(|| format!("[pipeline::config] Invalid config {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.masks.is_empty() && self.change.as_ref().is_none_or(|c| c.rules.is_empty()) {
            bail!("[pipeline::config] No expansion masks: set `masks` or `change` rules");
        }
        if !self.cluster_buffer.is_finite() || self.cluster_buffer < 0.0 {
            bail!("[pipeline::config] cluster_buffer must be a non-negative length, got {}", self.cluster_buffer);
        }
        self.equal_area_crs().proj4()?;
        if self.equal_area_crs().is_geographic() {
            bail!("[pipeline::config] equal_area_epsg {} is geographic", self.equal_area_epsg);
        }

        let mut labels = self.mask_labels();
        let total = labels.len();
        labels.sort_unstable();
        labels.dedup();
        if labels.len() != total {
            bail!("[pipeline::config] Mask labels must be unique");
        }
        Ok(())
    }

    #[inline] pub fn equal_area_crs(&self) -> Crs { Crs::from_epsg(self.equal_area_epsg) }

    /// Labels in processing order: explicit masks first, then change rules.
    pub fn mask_labels(&self) -> Vec<&str> {
        self.masks.iter().map(|m| m.label.as_str())
            .chain(self.change.iter().flat_map(|c| c.rules.iter().map(|r| r.label.as_str())))
            .collect()
    }
}
