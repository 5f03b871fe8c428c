//! Fetching Spansh dump files into a local cache

pub mod cache;
pub mod client;

pub use cache::*;
pub use client::*;

use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

use crate::ui::{Phase, Ui};

/// Return the cached path of `dataset`, downloading it first when it is
/// missing or `force` is set
pub fn ensure_dataset_downloaded(
    dataset: &str,
    cache_dir: Option<PathBuf>,
    base_url: &str,
    force: bool,
    ui: &mut impl Ui,
) -> Result<PathBuf> {
    ui.set_phase(Phase::Checking);
    let cache = CacheManager::new(cache_dir)?;
    let path = cache.dataset_path(dataset);

    if !force && cache.is_cached(dataset) {
        info!(dataset, path = %path.display(), "using cached dump");
        ui.log(format!("Using cached {}", path.display()));
        return Ok(path);
    }

    ui.set_phase(Phase::Downloading);
    ui.set_info(dataset.to_string());
    let client = DumpClient::new(base_url)?;
    client.download(dataset, &path, ui)?;
    ui.clear_progress();
    info!(dataset, path = %path.display(), "downloaded dump");

    Ok(path)
}
