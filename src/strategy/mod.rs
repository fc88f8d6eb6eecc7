//! Replay strategies
//!
//! A strategy reads ledger commands from a CSV file, replays them through a
//! `LedgerReplayer` and writes the final wallet balances. Strategies are
//! selected at runtime through [`create_strategy`].

use crate::cli::StrategyType;
use crate::config::LedgerConfig;
use crate::io::LedgerCommand;
use crate::types::LedgerError;
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

pub mod concurrent;
pub mod replay;
pub mod sequential;

pub use concurrent::{BatchConfig, ConcurrentStrategy};
pub use replay::{partition_by_wallets, LedgerReplayer, LogNotifier, ReplayOutcome};
pub use sequential::SequentialStrategy;

/// Complete replay pipeline from an input file to balance output
pub trait ProcessingStrategy: Send + Sync {
    /// Replay the commands of `input_path` and write `account,balance` rows
    ///
    /// Invalid rows and rejected commands are logged and skipped. Only fatal
    /// failures (unreadable input, runtime or output errors) return `Err`.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String>;
}

/// Create a replay strategy
///
/// `batch` only applies to the concurrent strategy; defaults are used when
/// absent.
pub fn create_strategy(
    strategy_type: StrategyType,
    batch: Option<BatchConfig>,
    ledger: LedgerConfig,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sequential => Box::new(SequentialStrategy::new(ledger)),
        StrategyType::Concurrent => Box::new(ConcurrentStrategy::new(
            batch.unwrap_or_default(),
            ledger,
        )),
    }
}

pub(crate) fn report_outcome(command: &LedgerCommand, result: &Result<(), LedgerError>) {
    match result {
        Ok(()) => debug!(?command, "Applied"),
        Err(e) => warn!(?command, kind = ?e.kind(), error = %e, "Command rejected"),
    }
}
