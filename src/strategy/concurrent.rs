//! Concurrent batch replay strategy
//!
//! ```text
//! ConcurrentStrategy
//!     ├── BatchConfig    (batch_size, max_concurrent_batches)
//!     ├── AsyncReader    (batch CSV reading)
//!     └── LedgerReplayer (setup rows as barriers, one task per wallet group)
//! ```
//!
//! Batches are replayed one after another. Within a batch, commands that share
//! no wallet run in parallel on a multi-thread runtime, while commands linked
//! by a common wallet stay on one task in input order, so the balances match
//! the sequential strategy.

use crate::config::LedgerConfig;
use crate::io::async_reader::AsyncReader;
use crate::io::csv_format::write_balances_csv;
use crate::strategy::replay::LedgerReplayer;
use crate::strategy::{report_outcome, ProcessingStrategy};
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

/// Configuration for batch replay
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Number of commands per batch
    pub batch_size: usize,
    /// Worker threads of the replay runtime
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a BatchConfig; zero values fall back to the defaults
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                batch_size,
                default = default.batch_size,
                "Invalid batch_size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                max_concurrent_batches,
                default = default.max_concurrent_batches,
                "Invalid max_concurrent_batches, using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Concurrent batch replay strategy
#[derive(Debug, Clone)]
pub struct ConcurrentStrategy {
    batch: BatchConfig,
    ledger: LedgerConfig,
}

impl ConcurrentStrategy {
    pub fn new(batch: BatchConfig, ledger: LedgerConfig) -> Self {
        Self { batch, ledger }
    }
}

impl ProcessingStrategy for ConcurrentStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.batch.max_concurrent_batches)
            .enable_all()
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        let balances = runtime.block_on(async {
            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| format!("Failed to open file '{}': {}", input_path.display(), e))?;

            // csv-async reads futures::io, tokio files need the compat layer
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);
            let replayer = LedgerReplayer::new(self.ledger.clone());

            let mut batch_num = 0usize;
            loop {
                let batch = reader.read_batch(self.batch.batch_size).await;
                if batch.is_empty() {
                    break;
                }
                batch_num += 1;
                debug!(batch = batch_num, size = batch.len(), "Replaying batch");

                for outcome in replayer.apply_batch(batch).await {
                    report_outcome(&outcome.command, &outcome.result);
                }
            }

            Ok::<_, String>(replayer.balances().await)
        })?;

        write_balances_csv(&balances, output)
    }
}
