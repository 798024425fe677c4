pub mod cluster;
pub mod run;
pub mod vectorize;

use std::path::Path;

use anyhow::{bail, Result};
use urban_sprawl::io::store::{DatasetSink, DiskStore};

/// Write `bytes` to a file path atomically; stdout is not supported.
pub(crate) fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if path == Path::new("-") { bail!("stdout is not supported; provide a real file path."); }
    let name = path.file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("invalid output path {}", path.display()))?;
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    DiskStore::new(dir).put(name, bytes)
}
