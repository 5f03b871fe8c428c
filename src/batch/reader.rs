//! Reading dump files document by document
//!
//! Spansh dumps are a JSON array with one system per line:
//!
//! ```text
//! [
//! {"id64": 1, ...},
//! {"id64": 2, ...}
//! ]
//! ```
//!
//! Newline-delimited JSON (no brackets, no commas) reads the same way.
//! Either may be gzip-compressed (`.gz`).

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use crate::error::Result;

/// One raw document and the line it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub line: usize,
    pub text: String,
}

/// Open a dump file, transparently decompressing `.gz`
pub fn open_dump(path: &Path) -> Result<DocumentReader<Box<dyn BufRead + Send>>> {
    let file = File::open(path)?;
    let reader: Box<dyn BufRead + Send> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(BufReader::new(GzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(DocumentReader::new(reader))
}

pub struct DocumentReader<R> {
    lines: Lines<R>,
    line: usize,
}

impl<R: BufRead> DocumentReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }

    /// Up to `size` further documents; empty once the input is exhausted
    pub fn next_batch(&mut self, size: usize) -> Result<Vec<Document>> {
        let mut batch = Vec::with_capacity(size);
        while batch.len() < size {
            match self.next() {
                Some(doc) => batch.push(doc?),
                None => break,
            }
        }
        Ok(batch)
    }
}

impl<R: BufRead> Iterator for DocumentReader<R> {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line += 1;

            let text = line.trim();
            let text = text.strip_suffix(',').unwrap_or(text).trim_end();
            if text.is_empty() || text == "[" || text == "]" {
                continue;
            }
            return Some(Ok(Document {
                line: self.line,
                text: text.to_string(),
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};

    const ARRAY: &str = "[\n{\"id64\": 1},\n    {\"id64\": 2}\n]\n";

    #[test]
    fn test_json_array_layout() {
        let docs: Vec<_> = DocumentReader::new(Cursor::new(ARRAY))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(
            docs,
            vec![
                Document { line: 2, text: "{\"id64\": 1}".into() },
                Document { line: 3, text: "{\"id64\": 2}".into() },
            ]
        );
    }

    #[test]
    fn test_ndjson_and_blank_lines() {
        let input = "{\"id64\": 1}\n\n{\"id64\": 2}\n";
        let mut reader = DocumentReader::new(Cursor::new(input));
        let batch = reader.next_batch(10).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1].line, 3);
        assert!(reader.next_batch(10).unwrap().is_empty());
    }

    #[test]
    fn test_batches_are_bounded() {
        let input: String = (0..5).map(|i| format!("{{\"id64\": {}}}\n", i)).collect();
        let mut reader = DocumentReader::new(Cursor::new(input));
        assert_eq!(reader.next_batch(2).unwrap().len(), 2);
        assert_eq!(reader.next_batch(2).unwrap().len(), 2);
        assert_eq!(reader.next_batch(2).unwrap().len(), 1);
    }

    #[test]
    fn test_gzip_dump() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("galaxy.json.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(ARRAY.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let docs: Vec<_> = open_dump(&path).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(docs.len(), 2);
    }
}
