//! Wallet ledger replay CLI
//!
//! ```bash
//! wallet-ledger ledger.csv > balances.csv
//! wallet-ledger --strategy sequential ledger.csv > balances.csv
//! wallet-ledger --strategy concurrent --batch-size 2000 --max-concurrent 8 ledger.csv
//! RUST_LOG=wallet_ledger=debug wallet-ledger --log-json ledger.csv
//! ```
//!
//! Balances go to stdout, logs to stderr. Settings are read from
//! `WALLET_LEDGER_*` variables (a `.env` file is honored) and flags override
//! them.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (missing arguments, unreadable input, output failure)

use std::process;
use wallet_ledger::config::LedgerConfig;
use wallet_ledger::{cli, logging, strategy};

fn main() {
    dotenvy::dotenv().ok();

    let args = cli::parse_args();
    logging::init(args.log_json);

    let ledger_config = args.apply_overrides(LedgerConfig::from_env());
    let batch_config = matches!(args.strategy, cli::StrategyType::Concurrent)
        .then(|| args.to_batch_config());
    let strategy = strategy::create_strategy(args.strategy, batch_config, ledger_config);

    let mut output = std::io::stdout();
    if let Err(e) = strategy.process(&args.input_file, &mut output) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
