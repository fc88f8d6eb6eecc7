//! Benchmark suite comparing replay strategies
//!
//! ```bash
//! cargo bench
//! ```
//!
//! Inputs are generated per run: a set of funded wallets followed by a ring of
//! transfers, each covered by the sender's own top-up.

use divan::Bencher;
use std::io::Write;
use tempfile::NamedTempFile;
use wallet_ledger::cli::StrategyType;
use wallet_ledger::config::LedgerConfig;
use wallet_ledger::strategy::{create_strategy, BatchConfig};

const WALLETS: usize = 50;

fn main() {
    divan::main();
}

/// Write a replay input with `transfers` ring transfers over WALLETS wallets
fn generate_input(transfers: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    writeln!(file, "op,account,counterparty,internal,amount,total,pin,note").unwrap();
    writeln!(file, "internal,,,1,,,,Bank").unwrap();

    for account in 1..=WALLETS {
        writeln!(file, "open,{},,,,,,", account).unwrap();
        writeln!(file, "pin,{},,,,,0000,", account).unwrap();
        writeln!(file, "top_up,{},,1,{},,,", account, transfers * 10).unwrap();
    }
    for n in 0..transfers {
        let from = n % WALLETS + 1;
        let to = (n + 1) % WALLETS + 1;
        writeln!(file, "transfer,{},{},,10,,0000,", from, to).unwrap();
    }

    file.flush().expect("Failed to flush temp file");
    file
}

#[divan::bench(args = [100, 1_000, 10_000])]
fn sequential(bencher: Bencher, transfers: usize) {
    let input = generate_input(transfers);
    let strategy = create_strategy(StrategyType::Sequential, None, LedgerConfig::default());

    bencher.bench(|| {
        let mut output = Vec::new();
        strategy
            .process(input.path(), &mut output)
            .expect("Replay failed");
        output
    });
}

#[divan::bench(args = [100, 1_000, 10_000])]
fn concurrent(bencher: Bencher, transfers: usize) {
    let input = generate_input(transfers);
    let strategy = create_strategy(
        StrategyType::Concurrent,
        Some(BatchConfig::default()),
        LedgerConfig::default(),
    );

    bencher.bench(|| {
        let mut output = Vec::new();
        strategy
            .process(input.path(), &mut output)
            .expect("Replay failed");
        output
    });
}
