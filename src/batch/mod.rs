//! Batch import and export of whole dump files

pub mod export;
pub mod import;
pub mod reader;

pub use export::{export_file, export_systems};
pub use import::{DocumentOutcome, ImportOptions, ImportReport, Importer};
pub use reader::{open_dump, Document, DocumentReader};
