//! Sequential replay strategy
//!
//! Streams commands with the synchronous `SyncReader` and replays them one at
//! a time on a current-thread runtime. Input order is the commit order.

use crate::config::LedgerConfig;
use crate::io::csv_format::write_balances_csv;
use crate::io::sync_reader::SyncReader;
use crate::strategy::replay::LedgerReplayer;
use crate::strategy::{report_outcome, ProcessingStrategy};
use std::io::Write;
use std::path::Path;
use tracing::warn;

/// Sequential replay strategy
///
/// ```no_run
/// use wallet_ledger::config::LedgerConfig;
/// use wallet_ledger::strategy::{ProcessingStrategy, SequentialStrategy};
/// use std::path::Path;
///
/// let strategy = SequentialStrategy::new(LedgerConfig::default());
/// strategy
///     .process(Path::new("ledger.csv"), &mut std::io::stdout())
///     .expect("Replay failed");
/// ```
#[derive(Debug, Clone)]
pub struct SequentialStrategy {
    config: LedgerConfig,
}

impl SequentialStrategy {
    pub fn new(config: LedgerConfig) -> Self {
        Self { config }
    }
}

impl ProcessingStrategy for SequentialStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let reader = SyncReader::new(input_path)?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        let balances = runtime.block_on(async {
            let replayer = LedgerReplayer::new(self.config.clone());

            for row in reader {
                match row {
                    Ok(command) => {
                        let result = replayer.apply(&command).await;
                        report_outcome(&command, &result);
                    }
                    Err(e) => warn!(error = %e, "Skipping invalid row"),
                }
            }

            replayer.balances().await
        });

        write_balances_csv(&balances, output)
    }
}
