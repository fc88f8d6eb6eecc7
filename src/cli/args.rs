use crate::config::LedgerConfig;
use crate::strategy::BatchConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Replay wallet ledger commands and print final balances
#[derive(Parser, Debug)]
#[command(name = "wallet-ledger")]
#[command(about = "Replay wallet ledger commands from CSV and print final balances", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing ledger commands
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    /// Replay strategy
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "concurrent",
        help = "Replay strategy: 'sequential' in input order or 'concurrent' per acting account"
    )]
    pub strategy: StrategyType,

    /// Number of commands per batch (concurrent mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of commands per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Worker threads (concurrent mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Worker threads of the replay runtime (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    /// Deadline of each atomic unit, overrides WALLET_LEDGER_UNIT_TIMEOUT_MS
    #[arg(long = "unit-timeout-ms", value_name = "MS")]
    pub unit_timeout_ms: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long = "log-json")]
    pub log_json: bool,
}

/// Available replay strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sequential,
    Concurrent,
}

impl CliArgs {
    /// BatchConfig from the flags, defaults for anything not given
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_none() && self.max_concurrent_batches.is_none() {
            return BatchConfig::default();
        }

        let default = BatchConfig::default();
        BatchConfig::new(
            self.batch_size.unwrap_or(default.batch_size),
            self.max_concurrent_batches
                .unwrap_or(default.max_concurrent_batches),
        )
    }

    /// Layer flag overrides over an environment-derived config
    pub fn apply_overrides(&self, config: LedgerConfig) -> LedgerConfig {
        match self.unit_timeout_ms {
            Some(ms) => LedgerConfig::new(
                config.cache_namespace,
                config.history_page_size,
                Duration::from_millis(ms),
                config.cache_ttl,
                config.notification_buffer,
            )
            .with_backends(config.database_url, config.redis_url),
            None => config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::default_strategy(&["program", "input.csv"], StrategyType::Concurrent)]
    #[case::explicit_sequential(&["program", "--strategy", "sequential", "input.csv"], StrategyType::Sequential)]
    #[case::explicit_concurrent(&["program", "--strategy", "concurrent", "input.csv"], StrategyType::Concurrent)]
    fn test_strategy_parsing(#[case] args: &[&str], #[case] expected: StrategyType) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.strategy, expected);
    }

    #[rstest]
    #[case::all_defaults(&["program", "input.csv"], 1000, num_cpus::get())]
    #[case::custom_batch_size(&["program", "--batch-size", "2000", "input.csv"], 2000, num_cpus::get())]
    #[case::custom_max_concurrent(&["program", "--max-concurrent", "8", "input.csv"], 1000, 8)]
    #[case::zero_batch_size(&["program", "--batch-size", "0", "input.csv"], 1000, num_cpus::get())]
    #[case::zero_max_concurrent(&["program", "--max-concurrent", "0", "input.csv"], 1000, num_cpus::get())]
    fn test_batch_config_conversion(
        #[case] args: &[&str],
        #[case] expected_batch_size: usize,
        #[case] expected_max_concurrent: usize,
    ) {
        let config = CliArgs::try_parse_from(args).unwrap().to_batch_config();

        assert_eq!(config.batch_size, expected_batch_size);
        assert_eq!(config.max_concurrent_batches, expected_max_concurrent);
    }

    #[rstest]
    #[case::flag_wins(&["program", "--unit-timeout-ms", "250", "input.csv"], Duration::from_millis(250))]
    #[case::env_kept(&["program", "input.csv"], Duration::from_secs(9))]
    #[case::zero_falls_back(&["program", "--unit-timeout-ms", "0", "input.csv"], Duration::from_secs(5))]
    fn test_unit_timeout_override(#[case] args: &[&str], #[case] expected: Duration) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        let from_env = LedgerConfig {
            unit_timeout: Duration::from_secs(9),
            database_url: Some("postgres://localhost/ledger".to_string()),
            ..LedgerConfig::default()
        };

        let config = parsed.apply_overrides(from_env);

        assert_eq!(config.unit_timeout, expected);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/ledger")
        );
    }

    #[test]
    fn test_log_json_flag() {
        assert!(!CliArgs::try_parse_from(["program", "input.csv"]).unwrap().log_json);
        assert!(
            CliArgs::try_parse_from(["program", "--log-json", "input.csv"])
                .unwrap()
                .log_json
        );
    }

    #[rstest]
    #[case::missing_input(&["program"])]
    #[case::invalid_strategy(&["program", "--strategy", "async", "input.csv"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        assert!(CliArgs::try_parse_from(args).is_err());
    }
}
