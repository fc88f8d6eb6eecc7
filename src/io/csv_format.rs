//! CSV format handling for ledger commands and balance output
//!
//! This module centralizes all CSV format concerns, providing:
//! - CsvRecord structure for deserialization
//! - Conversion from CSV records to ledger commands
//! - Balance output serialization
//!
//! All functions are pure (no I/O) for easy testing.
//!
//! # Input Format
//!
//! Columns: `op,account,counterparty,internal,amount,total,pin,note`
//!
//! | op | meaning | required columns |
//! |---|---|---|
//! | `open` | open a wallet, `note` is the owner's name | `account` |
//! | `internal` | register an internal account, `note` is its name, `amount` its tax percent | `internal`, `note` |
//! | `pin` | set the PIN of an account | `account`, `pin` |
//! | `top_up` | `account` receives `amount` from `internal` | `account`, `internal`, `amount` |
//! | `transfer` | `account` sends `amount` to `counterparty` | `account`, `counterparty`, `amount` |
//!
//! `total` defaults to `amount` when empty.

use crate::types::{AccountId, Amount, CreateTransaction, InternalAccountId, TransactionKind};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// CSV record structure for deserialization
///
/// Every column but `op` is optional; which ones are required depends on the
/// operation.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct CsvRecord {
    pub op: String,
    pub account: Option<AccountId>,
    pub counterparty: Option<AccountId>,
    pub internal: Option<InternalAccountId>,
    pub amount: Option<String>,
    pub total: Option<String>,
    pub pin: Option<String>,
    pub note: Option<String>,
}

/// One replayable ledger command
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerCommand {
    /// Open a wallet with a zero balance
    OpenWallet {
        account: AccountId,
        name: Option<String>,
    },

    /// Register an internal settlement account
    AddInternalAccount {
        id: InternalAccountId,
        name: String,
        tax_rate: Decimal,
    },

    /// Set the PIN the credential layer verifies transfers against
    SetPin { account: AccountId, pin: String },

    /// Create a top-up or transfer
    Transact(CreateTransaction),
}

impl LedgerCommand {
    /// Whether the command prepares state rather than moving money
    pub fn is_setup(&self) -> bool {
        !matches!(self, LedgerCommand::Transact(_))
    }

    /// Account whose wallet the command acts on, if any
    pub fn acting_account(&self) -> Option<AccountId> {
        match self {
            LedgerCommand::OpenWallet { account, .. } | LedgerCommand::SetPin { account, .. } => {
                Some(*account)
            }
            LedgerCommand::AddInternalAccount { .. } => None,
            LedgerCommand::Transact(request) => Some(request.acting_account),
        }
    }

    /// Wallets whose balance the command can read or change
    ///
    /// A transfer touches both the sender and the receiver; a top-up only the
    /// receiving wallet, since internal accounts carry no balance.
    pub fn touched_accounts(&self) -> Vec<AccountId> {
        match self {
            LedgerCommand::Transact(request) => {
                let mut accounts = vec![request.acting_account];
                if let Some(receiver) = request.receiver_account {
                    if receiver != request.acting_account {
                        accounts.push(receiver);
                    }
                }
                accounts
            }
            _ => self.acting_account().into_iter().collect(),
        }
    }
}

/// Convert a CsvRecord to a LedgerCommand
///
/// # Arguments
///
/// * `csv_record` - The deserialized CSV record
///
/// # Returns
///
/// Result containing either:
/// - Ok(LedgerCommand) - Successfully converted record
/// - Err(String) - Error message describing the conversion failure
pub fn convert_csv_record(csv_record: CsvRecord) -> Result<LedgerCommand, String> {
    let op = csv_record.op.trim().to_lowercase();
    let note = non_empty(csv_record.note);

    match op.as_str() {
        "open" => Ok(LedgerCommand::OpenWallet {
            account: required(csv_record.account, &op, "account")?,
            name: note,
        }),
        "internal" => {
            let id = required(csv_record.internal, &op, "internal")?;
            let tax_rate = match non_empty(csv_record.amount) {
                Some(raw) => Decimal::from_str(&raw)
                    .map_err(|_| format!("Invalid tax rate '{}' for internal account {}", raw, id))?,
                None => Decimal::ZERO,
            };
            Ok(LedgerCommand::AddInternalAccount {
                id,
                name: required(note, &op, "note")?,
                tax_rate,
            })
        }
        "pin" => Ok(LedgerCommand::SetPin {
            account: required(csv_record.account, &op, "account")?,
            pin: required(non_empty(csv_record.pin), &op, "pin")?,
        }),
        _ => {
            let kind = TransactionKind::from_str(&op).map_err(|e| e.to_string())?;
            let account = required(csv_record.account, &op, "account")?;
            let amount = parse_amount(required(non_empty(csv_record.amount), &op, "amount")?)?;
            let total = match non_empty(csv_record.total) {
                Some(raw) => parse_amount(raw)?,
                None => amount,
            };

            let mut request = match kind {
                TransactionKind::TopUp => CreateTransaction::top_up(
                    account,
                    required(csv_record.internal, &op, "internal")?,
                    amount,
                    total,
                ),
                TransactionKind::Transfer => {
                    let mut request = CreateTransaction::transfer(
                        account,
                        required(csv_record.counterparty, &op, "counterparty")?,
                        amount,
                        total,
                        "",
                    );
                    request.pin = non_empty(csv_record.pin);
                    request
                }
            };
            request.note = note;
            Ok(LedgerCommand::Transact(request))
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<T>(value: Option<T>, op: &str, column: &str) -> Result<T, String> {
    value.ok_or_else(|| format!("'{}' command requires the '{}' column", op, column))
}

fn parse_amount(raw: String) -> Result<Amount, String> {
    raw.parse::<Amount>()
        .map_err(|_| format!("Invalid amount '{}': expected an integer in minor units", raw))
}

/// Write wallet balances to CSV format
///
/// Writes `account,balance` rows sorted by account for deterministic output.
pub fn write_balances_csv(
    balances: &[(AccountId, Amount)],
    output: &mut dyn Write,
) -> Result<(), String> {
    let mut writer = csv::Writer::from_writer(output);

    writer
        .write_record(["account", "balance"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted = balances.to_vec();
    sorted.sort_by_key(|(account, _)| *account);

    for (account, balance) in sorted {
        writer
            .write_record([account.to_string(), balance.to_string()])
            .map_err(|e| format!("Failed to write balance of account {}: {}", account, e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush CSV writer: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn record(op: &str) -> CsvRecord {
        CsvRecord {
            op: op.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_convert_open() {
        let csv_record = CsvRecord {
            account: Some(1),
            note: Some("Ana".to_string()),
            ..record("open")
        };

        assert_eq!(
            convert_csv_record(csv_record).unwrap(),
            LedgerCommand::OpenWallet {
                account: 1,
                name: Some("Ana".to_string())
            }
        );
    }

    #[test]
    fn test_convert_internal_with_tax() {
        let csv_record = CsvRecord {
            internal: Some(10),
            amount: Some("2.5".to_string()),
            note: Some("Bank Transfer".to_string()),
            ..record("internal")
        };

        assert_eq!(
            convert_csv_record(csv_record).unwrap(),
            LedgerCommand::AddInternalAccount {
                id: 10,
                name: "Bank Transfer".to_string(),
                tax_rate: Decimal::new(25, 1),
            }
        );
    }

    #[test]
    fn test_convert_transfer_defaults_total() {
        let csv_record = CsvRecord {
            account: Some(1),
            counterparty: Some(2),
            amount: Some(" 30000 ".to_string()),
            pin: Some("1234".to_string()),
            ..record("TRANSFER")
        };

        let LedgerCommand::Transact(request) = convert_csv_record(csv_record).unwrap() else {
            panic!("expected a transaction command");
        };
        assert_eq!(request, CreateTransaction::transfer(1, 2, 30_000, 30_000, "1234"));
        assert_eq!(
            LedgerCommand::Transact(request).touched_accounts(),
            vec![1, 2]
        );
    }

    #[test]
    fn test_convert_transfer_without_pin() {
        let csv_record = CsvRecord {
            account: Some(1),
            counterparty: Some(2),
            amount: Some("100".to_string()),
            ..record("transfer")
        };

        let LedgerCommand::Transact(request) = convert_csv_record(csv_record).unwrap() else {
            panic!("expected a transaction command");
        };
        assert_eq!(request.pin, None);
    }

    #[test]
    fn test_convert_top_up() {
        let csv_record = CsvRecord {
            account: Some(1),
            internal: Some(10),
            amount: Some("50000".to_string()),
            total: Some("50500".to_string()),
            note: Some("salary".to_string()),
            ..record("top_up")
        };

        let command = convert_csv_record(csv_record).unwrap();

        assert!(!command.is_setup());
        assert_eq!(command.acting_account(), Some(1));
        assert_eq!(command.touched_accounts(), vec![1]);
        assert_eq!(
            command,
            LedgerCommand::Transact(
                CreateTransaction::top_up(1, 10, 50_000, 50_500).with_note("salary")
            )
        );
    }

    #[rstest]
    #[case::unknown_op(record("withdrawal"), "Invalid transaction type")]
    #[case::open_without_account(record("open"), "requires the 'account' column")]
    #[case::pin_without_pin(CsvRecord { account: Some(1), ..record("pin") }, "requires the 'pin' column")]
    #[case::top_up_without_internal(
        CsvRecord { account: Some(1), amount: Some("5".to_string()), ..record("top_up") },
        "requires the 'internal' column"
    )]
    #[case::transfer_without_amount(
        CsvRecord { account: Some(1), counterparty: Some(2), ..record("transfer") },
        "requires the 'amount' column"
    )]
    #[case::decimal_amount(
        CsvRecord { account: Some(1), counterparty: Some(2), amount: Some("1.5".to_string()), ..record("transfer") },
        "Invalid amount"
    )]
    fn test_convert_errors(#[case] csv_record: CsvRecord, #[case] expected_error: &str) {
        let error = convert_csv_record(csv_record).unwrap_err();
        assert!(error.contains(expected_error), "unexpected error: {}", error);
    }

    #[rstest]
    #[case::sorted(vec![(3, 0), (1, 70_000), (2, 30_000)], "account,balance\n1,70000\n2,30000\n3,0\n")]
    #[case::empty(vec![], "account,balance\n")]
    fn test_write_balances_csv(#[case] balances: Vec<(AccountId, Amount)>, #[case] expected: &str) {
        let mut output = Vec::new();

        write_balances_csv(&balances, &mut output).unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), expected);
    }
}
