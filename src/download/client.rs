use anyhow::{Context, Result};
use reqwest::blocking::Client;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::ui::Ui;

pub const DEFAULT_BASE_URL: &str = "https://downloads.spansh.co.uk";

pub struct DumpClient {
    client: Client,
    base_url: String,
}

impl DumpClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("spansh-galaxy-store/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn dataset_url(&self, dataset: &str) -> String {
        format!("{}/{}.json.gz", self.base_url, dataset)
    }

    /// Stream the dump for `dataset` to `dest`. The file only appears
    /// under its final name once the transfer completed.
    pub fn download(&self, dataset: &str, dest: &Path, ui: &mut impl Ui) -> Result<()> {
        let url = self.dataset_url(dataset);
        let mut response = self
            .client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Failed to start download of {}", url))?;

        let partial = partial_path(dest);
        let file = File::create(&partial)
            .with_context(|| format!("Failed to create {:?}", partial))?;
        let mut sink = ProgressWriter {
            inner: BufWriter::new(file),
            written: 0,
            total: response.content_length().unwrap_or(0),
            ui: &mut *ui,
        };

        let bytes = std::io::copy(&mut response, &mut sink)
            .with_context(|| format!("Transfer of {} interrupted", url))?;
        sink.flush().context("Failed to flush download")?;
        drop(sink);
        std::fs::rename(&partial, dest).context("Failed to move download into place")?;

        info!(%url, bytes, dest = %dest.display(), "download finished");
        ui.log(format!("Downloaded {}", format_bytes(bytes, 0)));
        Ok(())
    }
}

/// Reports every chunk written through it to the UI
struct ProgressWriter<'a, W, U> {
    inner: W,
    written: u64,
    total: u64,
    ui: &'a mut U,
}

impl<W: Write, U: Ui> Write for ProgressWriter<'_, W, U> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        self.ui
            .set_progress(self.written, self.total, format_bytes(self.written, self.total));
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// `1.5 MB`, or `1.5 MB / 3.0 MB` when the total is known
fn format_bytes(current: u64, total: u64) -> String {
    const UNITS: [(u64, &str); 3] = [(1_000_000_000, "GB"), (1_000_000, "MB"), (1_000, "KB")];

    let human = |bytes: u64| {
        UNITS
            .iter()
            .find(|(size, _)| bytes >= *size)
            .map(|(size, unit)| format!("{:.1} {}", bytes as f64 / *size as f64, unit))
            .unwrap_or_else(|| format!("{} B", bytes))
    };

    match total {
        0 => human(current),
        _ => format!("{} / {}", human(current), human(total)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::SilentUi;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500, 999), "500 B / 999 B");
        assert_eq!(format_bytes(1500, 3000), "1.5 KB / 3.0 KB");
        assert_eq!(format_bytes(1_500_000, 0), "1.5 MB");
        assert_eq!(format_bytes(2_000_000_000, 0), "2.0 GB");
    }

    #[test]
    fn test_dataset_url() {
        let client = DumpClient::new("https://downloads.spansh.co.uk/").unwrap();
        assert_eq!(
            client.dataset_url("galaxy_1day"),
            "https://downloads.spansh.co.uk/galaxy_1day.json.gz"
        );
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/tmp/galaxy.json.gz")),
            PathBuf::from("/tmp/galaxy.json.gz.part")
        );
    }

    #[test]
    fn test_progress_writer_counts_bytes() {
        let mut ui = SilentUi::new();
        let mut sink = ProgressWriter {
            inner: Vec::new(),
            written: 0,
            total: 10,
            ui: &mut ui,
        };
        sink.write_all(b"hello").unwrap();
        sink.write_all(b"world").unwrap();
        assert_eq!(sink.written, 10);
        assert_eq!(sink.inner, b"helloworld");
    }
}
