//! Parallel import of system documents
//!
//! Documents are read in batches and spread over a rayon pool. Each
//! worker holds its own SQLite connection and applies one document per
//! transaction, so a failing document never takes its neighbours down.

use indicatif::ProgressBar;
use rayon::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::reader::{open_dump, Document};
use crate::config::ImportConfig;
use crate::error::{Error, Result};
use crate::mapping::load_system;
use crate::store::{Changes, GalaxyStore};

const BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub jobs: usize,
    pub document_timeout: Duration,
    pub max_retries: u32,
    pub busy_timeout: Duration,
}

impl From<&ImportConfig> for ImportOptions {
    fn from(config: &ImportConfig) -> Self {
        Self {
            jobs: config.workers(),
            document_timeout: config.document_timeout(),
            max_retries: config.max_retries,
            busy_timeout: config.busy_timeout(),
        }
    }
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self::from(&ImportConfig::default())
    }
}

/// What happened to one document
#[derive(Debug)]
pub struct DocumentOutcome {
    pub line: usize,
    /// Natural key of the system, once decoding got that far
    pub key: Option<String>,
    pub attempts: u32,
    pub result: Result<Changes>,
}

impl DocumentOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// `line 12 (id64=1)` or just `line 12`
    pub fn label(&self) -> String {
        match &self.key {
            Some(key) => format!("line {} ({})", self.line, key),
            None => format!("line {}", self.line),
        }
    }
}

/// Per-document outcomes of one import run
#[derive(Debug, Default)]
pub struct ImportReport {
    pub outcomes: Vec<DocumentOutcome>,
}

impl ImportReport {
    pub fn documents(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &DocumentOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }

    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    /// Entity changes summed over the successful documents
    pub fn changes(&self) -> Changes {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .fold(Changes::default(), |acc, c| Changes {
                applied: acc.applied + c.applied,
                skipped: acc.skipped + c.skipped,
            })
    }

    fn extend(&mut self, outcomes: Vec<DocumentOutcome>) {
        self.outcomes.extend(outcomes);
    }
}

/// Imports documents into one database file
pub struct Importer {
    db_path: PathBuf,
    options: ImportOptions,
    pool: rayon::ThreadPool,
}

impl Importer {
    /// Create the tables if needed and set up the worker pool
    pub fn new(db_path: &Path, options: ImportOptions) -> Result<Self> {
        GalaxyStore::open_with_timeout(db_path, options.busy_timeout)?.create_tables()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.jobs.max(1))
            .build()
            .map_err(|e| Error::Config(format!("cannot start import workers: {}", e)))?;
        Ok(Self {
            db_path: db_path.to_path_buf(),
            options,
            pool,
        })
    }

    /// Import every document of a dump file
    pub fn import_file(&self, input: &Path, progress: &ProgressBar) -> Result<ImportReport> {
        let mut reader = open_dump(input)?;
        let mut report = ImportReport::default();
        let start = Instant::now();

        loop {
            let batch = reader.next_batch(BATCH_SIZE)?;
            if batch.is_empty() {
                break;
            }
            let outcomes = self.import_batch(&batch, progress)?;
            let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
            info!(
                documents = outcomes.len(),
                failed,
                total = report.documents() + outcomes.len(),
                "imported batch"
            );
            report.extend(outcomes);
        }

        let changes = report.changes();
        info!(
            input = %input.display(),
            documents = report.documents(),
            failed = report.failed(),
            applied = changes.applied,
            skipped = changes.skipped,
            elapsed = ?start.elapsed(),
            "import finished"
        );
        Ok(report)
    }

    /// Import one batch in parallel. Outcomes come back in input order.
    pub fn import_batch(
        &self,
        batch: &[Document],
        progress: &ProgressBar,
    ) -> Result<Vec<DocumentOutcome>> {
        let per_worker = batch.len().div_ceil(self.options.jobs.max(1)).max(1);
        let chunks = self.pool.install(|| {
            batch
                .par_chunks(per_worker)
                .map(|chunk| {
                    let mut store =
                        GalaxyStore::open_with_timeout(&self.db_path, self.options.busy_timeout)?;
                    Ok(chunk
                        .iter()
                        .map(|doc| {
                            let outcome = self.import_one(&mut store, doc);
                            progress.inc(1);
                            outcome
                        })
                        .collect::<Vec<_>>())
                })
                .collect::<Result<Vec<_>>>()
        })?;
        Ok(chunks.into_iter().flatten().collect())
    }

    fn import_one(&self, store: &mut GalaxyStore, doc: &Document) -> DocumentOutcome {
        let mut outcome = DocumentOutcome {
            line: doc.line,
            key: None,
            attempts: 0,
            result: Ok(Changes::default()),
        };

        let aggregate = match serde_json::from_str::<Value>(&doc.text)
            .map_err(Error::from)
            .and_then(|value| load_system(&value))
        {
            Ok(aggregate) => aggregate,
            Err(e) => {
                warn!(line = doc.line, error = %e, "document rejected");
                outcome.result = Err(e);
                return outcome;
            }
        };
        outcome.key = Some(aggregate.root.key());

        let budget = self.options.document_timeout;
        outcome.result = loop {
            outcome.attempts += 1;
            let deadline = Instant::now() + budget;
            match store.apply_system_within(&aggregate, deadline, budget) {
                Err(e) if e.is_retryable() && outcome.attempts <= self.options.max_retries => {
                    debug!(
                        system = %aggregate.root.key(),
                        attempt = outcome.attempts,
                        error = %e,
                        "retrying document"
                    );
                    std::thread::sleep(Duration::from_millis(50 * u64::from(outcome.attempts)));
                }
                result => break result,
            }
        };

        match &outcome.result {
            Ok(changes) => debug!(
                system = %aggregate.root.key(),
                applied = changes.applied,
                skipped = changes.skipped,
                "document applied"
            ),
            Err(e) => warn!(line = doc.line, system = %aggregate.root.key(), error = %e, "document failed"),
        }
        outcome
    }
}
