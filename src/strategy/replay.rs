//! Replay of ledger commands against an in-memory ledger
//!
//! `LedgerReplayer` wires a full `WalletService` over in-memory backends so the
//! CLI exercises the same create-transaction path as a served deployment:
//! planning, PIN gate, atomic unit, invalidation and notification.

use crate::config::LedgerConfig;
use crate::core::{LedgerStore, Notifier, StaticPinVerifier, WalletService};
use crate::io::LedgerCommand;
use crate::store::{InMemoryCache, InMemoryLedgerStore};
use crate::types::{AccountId, Amount, InternalAccount, LedgerError, Profile};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

/// Notifier that only records deliveries in the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, account: AccountId, message: String) {
        debug!(account, %message, "Notification");
    }
}

/// Outcome of replaying one command
#[derive(Debug, Clone)]
pub struct ReplayOutcome {
    pub command: LedgerCommand,
    pub result: Result<(), LedgerError>,
}

/// Shared replay target
///
/// Cheap to clone; clones share the same store, PINs and service.
#[derive(Clone)]
pub struct LedgerReplayer {
    store: Arc<InMemoryLedgerStore>,
    pins: Arc<StaticPinVerifier>,
    service: WalletService,
}

impl LedgerReplayer {
    pub fn new(config: LedgerConfig) -> Self {
        let store = Arc::new(InMemoryLedgerStore::new());
        let pins = Arc::new(StaticPinVerifier::new());
        let ledger_store: Arc<dyn LedgerStore> = store.clone();
        let service = WalletService::new(
            ledger_store,
            Arc::new(InMemoryCache::new()),
            Arc::new(LogNotifier),
            pins.clone(),
            config,
        );

        Self {
            store,
            pins,
            service,
        }
    }

    pub fn service(&self) -> &WalletService {
        &self.service
    }

    /// Apply one command
    pub async fn apply(&self, command: &LedgerCommand) -> Result<(), LedgerError> {
        match command {
            LedgerCommand::OpenWallet { account, name } => self
                .store
                .open_wallet(*account, Profile::new(String::new(), name.clone())),
            LedgerCommand::AddInternalAccount { id, name, tax_rate } => {
                self.store.add_internal_account(InternalAccount {
                    id: *id,
                    name: name.clone(),
                    image: None,
                    tax_rate: *tax_rate,
                    created_at: Utc::now(),
                });
                Ok(())
            }
            LedgerCommand::SetPin { account, pin } => {
                self.pins.set_pin(*account, pin.clone());
                Ok(())
            }
            LedgerCommand::Transact(request) => self
                .service
                .create_transaction(request.clone())
                .await
                .map(|_| ()),
        }
    }

    /// Apply commands one after another, in order
    pub async fn apply_in_order(&self, commands: Vec<LedgerCommand>) -> Vec<ReplayOutcome> {
        let mut outcomes = Vec::with_capacity(commands.len());

        for command in commands {
            let result = self.apply(&command).await;
            outcomes.push(ReplayOutcome { command, result });
        }

        outcomes
    }

    /// Replay one batch with parallelism across independent wallets
    ///
    /// Setup commands are ordering barriers: the ledger commands before one
    /// finish before it runs, and the ones after it start only once it has.
    /// Between barriers, ledger commands are grouped by the wallets they touch
    /// so that any two commands sharing a wallet, directly or through a chain
    /// of transfers, run on the same task in input order. The final balances
    /// therefore match a sequential replay of the same batch.
    pub async fn apply_batch(&self, batch: Vec<LedgerCommand>) -> Vec<ReplayOutcome> {
        let mut outcomes = Vec::with_capacity(batch.len());
        let mut segment = Vec::new();

        for command in batch {
            if command.is_setup() {
                outcomes.extend(self.apply_segment(std::mem::take(&mut segment)).await);
                let result = self.apply(&command).await;
                outcomes.push(ReplayOutcome { command, result });
            } else {
                segment.push(command);
            }
        }
        outcomes.extend(self.apply_segment(segment).await);

        outcomes
    }

    /// Run ledger commands with one task per group of connected wallets
    async fn apply_segment(&self, commands: Vec<LedgerCommand>) -> Vec<ReplayOutcome> {
        let mut groups = partition_by_wallets(commands);
        if groups.len() <= 1 {
            return match groups.pop() {
                Some(commands) => self.apply_in_order(commands).await,
                None => Vec::new(),
            };
        }

        let mut tasks = Vec::with_capacity(groups.len());
        for commands in groups {
            let replayer = self.clone();
            tasks.push(tokio::spawn(async move {
                replayer.apply_in_order(commands).await
            }));
        }

        let mut outcomes = Vec::new();
        for task in tasks {
            match task.await {
                Ok(group_outcomes) => outcomes.extend(group_outcomes),
                Err(e) => error!(error = %e, "Replay task failed"),
            }
        }

        outcomes
    }

    /// Final balances sorted by account
    pub async fn balances(&self) -> Vec<(AccountId, Amount)> {
        self.store.balances().await
    }
}

/// Disjoint sets over account ids
#[derive(Default)]
struct AccountSets {
    parent: HashMap<AccountId, AccountId>,
}

impl AccountSets {
    fn find(&mut self, account: AccountId) -> AccountId {
        let mut root = *self.parent.entry(account).or_insert(account);
        while let Some(&next) = self.parent.get(&root) {
            if next == root {
                break;
            }
            root = next;
        }

        // path compression
        let mut current = account;
        while current != root {
            let next = self.parent[&current];
            self.parent.insert(current, root);
            current = next;
        }

        root
    }

    fn union(&mut self, a: AccountId, b: AccountId) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            self.parent.insert(root_a.max(root_b), root_a.min(root_b));
        }
    }
}

/// Split commands into groups that share no wallet
///
/// Commands touching a common wallet, directly or through a chain of
/// commands, land in the same group. Groups keep input order internally and
/// are returned in order of their first command. Commands that touch no
/// wallet each form their own group.
pub fn partition_by_wallets(commands: Vec<LedgerCommand>) -> Vec<Vec<LedgerCommand>> {
    let mut sets = AccountSets::default();
    for command in &commands {
        let touched = command.touched_accounts();
        if let Some((&first, rest)) = touched.split_first() {
            sets.find(first);
            for &other in rest {
                sets.union(first, other);
            }
        }
    }

    let mut groups: Vec<Vec<LedgerCommand>> = Vec::new();
    let mut group_of_root: HashMap<AccountId, usize> = HashMap::new();

    for command in commands {
        let Some(&first) = command.touched_accounts().first() else {
            groups.push(vec![command]);
            continue;
        };
        let root = sets.find(first);
        let index = *group_of_root.entry(root).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[index].push(command);
    }

    groups
}
