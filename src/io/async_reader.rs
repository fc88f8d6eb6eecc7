//! Asynchronous CSV reader with batch interface
//!
//! ```text
//! CSV Reader → AsyncReader → Batches of LedgerCommands
//!                  ↓
//!           csv_format module
//! ```

use crate::io::csv_format::{convert_csv_record, CsvRecord, LedgerCommand};
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tracing::warn;

/// Asynchronous CSV reader
///
/// Reads ledger commands in batches. Rows that fail to parse are logged and
/// skipped.
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
    line_num: usize,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self {
            csv_reader,
            line_num: 0,
        }
    }

    /// Read up to `batch_size` commands
    ///
    /// Returns an empty vector once the end of the input is reached.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<LedgerCommand> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize::<CsvRecord>();

        while batch.len() < batch_size {
            let Some(row) = records.next().await else {
                break;
            };
            self.line_num += 1;
            let line = self.line_num + 1;

            match row {
                Ok(csv_record) => match convert_csv_record(csv_record) {
                    Ok(command) => batch.push(command),
                    Err(e) => warn!(line, error = %e, "Skipping invalid ledger command"),
                },
                Err(e) => warn!(line, error = %e, "Skipping unparsable CSV row"),
            }
        }

        batch
    }
}
