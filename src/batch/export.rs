//! Writing stored systems back out in the dump layout

use flate2::write::GzEncoder;
use flate2::Compression;
use indicatif::ProgressBar;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

use crate::error::Result;
use crate::mapping::dump_system;
use crate::store::GalaxyStore;

/// Write the given systems (all of them when `ids` is empty) as a JSON
/// array, one system per line. Returns how many were written.
pub fn export_systems<W: Write>(
    store: &GalaxyStore,
    ids: &[u64],
    out: &mut W,
    progress: &ProgressBar,
) -> Result<usize> {
    let ids = if ids.is_empty() {
        store.system_ids()?
    } else {
        ids.to_vec()
    };
    progress.set_length(ids.len() as u64);

    let mut written = 0;
    writeln!(out, "[")?;
    for id64 in ids {
        progress.inc(1);
        let Some(aggregate) = store.fetch_system(id64)? else {
            warn!(id64, "system not found, skipping");
            continue;
        };
        if written > 0 {
            writeln!(out, ",")?;
        }
        serde_json::to_writer(&mut *out, &dump_system(&aggregate))?;
        written += 1;
    }
    if written > 0 {
        writeln!(out)?;
    }
    writeln!(out, "]")?;
    out.flush()?;
    Ok(written)
}

/// Export to a file, gzip-compressed when the name ends in `.gz`
pub fn export_file(
    store: &GalaxyStore,
    ids: &[u64],
    output: &Path,
    progress: &ProgressBar,
) -> Result<usize> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = BufWriter::new(File::create(output)?);

    let written = if output.extension().is_some_and(|ext| ext == "gz") {
        let mut encoder = GzEncoder::new(file, Compression::default());
        let written = export_systems(store, ids, &mut encoder, progress)?;
        encoder.finish()?.flush()?;
        written
    } else {
        let mut file = file;
        export_systems(store, ids, &mut file, progress)?
    };

    info!(output = %output.display(), systems = written, "export finished");
    Ok(written)
}
