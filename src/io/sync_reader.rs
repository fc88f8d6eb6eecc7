//! Synchronous CSV reader with iterator interface
//!
//! Streams ledger commands from a CSV file one row at a time. Row parsing and
//! conversion live in the csv_format module.
//!
//! ```no_run
//! use wallet_ledger::io::sync_reader::SyncReader;
//! use std::path::Path;
//!
//! let reader = SyncReader::new(Path::new("ledger.csv")).unwrap();
//! for result in reader {
//!     match result {
//!         Ok(command) => println!("Replaying: {:?}", command),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! - Fatal errors (file not found, I/O errors) are returned from `new()`
//! - Individual row errors are yielded as Err variants carrying the line number

use crate::io::csv_format::{convert_csv_record, CsvRecord, LedgerCommand};
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::path::Path;

/// Synchronous CSV reader over ledger commands
#[derive(Debug)]
pub struct SyncReader {
    reader: csv::Reader<File>,
    line_num: usize,
}

impl SyncReader {
    /// Open a CSV file for streaming iteration
    ///
    /// Fields are trimmed and rows may omit trailing optional columns.
    pub fn new(path: &Path) -> Result<Self, String> {
        let file = File::open(path)
            .map_err(|e| format!("Failed to open file '{}': {}", path.display(), e))?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(Self {
            reader,
            line_num: 0,
        })
    }
}

impl Iterator for SyncReader {
    type Item = Result<LedgerCommand, String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<CsvRecord>();
        let row = deserializer.next()?;

        self.line_num += 1;
        // +1 for the header row
        let line = self.line_num + 1;

        Some(match row {
            Ok(csv_record) => {
                convert_csv_record(csv_record).map_err(|e| format!("Line {}: {}", line, e))
            }
            Err(e) => Err(format!("Line {}: CSV parse error: {}", line, e)),
        })
    }
}
