//! Per-account notification fan-out
//!
//! A single dispatcher task owns the map of live subscriptions. Handles talk to
//! it over a bounded command channel, so registering, unregistering and
//! delivering never contend on a shared lock.
//!
//! Delivery is fire-and-forget: [`Notifier::notify`] never blocks and never
//! fails. A full command queue or a full subscriber buffer drops the message
//! with a log line; subscriptions whose receiver was dropped are pruned on the
//! next delivery to their account.

use crate::core::traits::Notifier;
use crate::types::AccountId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub type SubscriptionId = u64;

/// A live connection of one account
///
/// Dropping the subscription closes it.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub account: AccountId,
    receiver: mpsc::Receiver<String>,
}

impl Subscription {
    /// Wait for the next message; `None` once the subscription is closed
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }

    /// Take a message if one is already queued
    pub fn try_recv(&mut self) -> Option<String> {
        self.receiver.try_recv().ok()
    }
}

#[derive(Debug)]
enum Command {
    Register {
        account: AccountId,
        id: SubscriptionId,
        sender: mpsc::Sender<String>,
    },
    Unregister {
        id: SubscriptionId,
    },
    Deliver {
        account: AccountId,
        message: String,
    },
}

/// Task owning the subscription map
pub struct NotificationDispatcher {
    commands: mpsc::Receiver<Command>,
    subscribers: HashMap<AccountId, Vec<(SubscriptionId, mpsc::Sender<String>)>>,
}

impl NotificationDispatcher {
    /// Spawn the dispatcher on the current runtime and return a handle to it
    ///
    /// `buffer` bounds both the command queue and each subscriber's queue. The
    /// task stops once every handle is dropped.
    pub fn spawn(buffer: usize) -> NotificationHandle {
        let buffer = buffer.max(1);
        let (sender, receiver) = mpsc::channel(buffer);

        let dispatcher = NotificationDispatcher {
            commands: receiver,
            subscribers: HashMap::new(),
        };
        tokio::spawn(dispatcher.run());

        NotificationHandle {
            commands: sender,
            next_id: Arc::new(AtomicU64::new(1)),
            buffer,
        }
    }

    async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            self.handle(command);
        }
        debug!("Notification dispatcher stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Register {
                account,
                id,
                sender,
            } => {
                self.subscribers
                    .entry(account)
                    .or_default()
                    .push((id, sender));
            }
            Command::Unregister { id } => {
                for subscriptions in self.subscribers.values_mut() {
                    subscriptions.retain(|(sub_id, _)| *sub_id != id);
                }
                self.subscribers.retain(|_, subscriptions| !subscriptions.is_empty());
            }
            Command::Deliver { account, message } => {
                let Some(subscriptions) = self.subscribers.get_mut(&account) else {
                    debug!(account, "No live connection for notification");
                    return;
                };

                subscriptions.retain(|(id, sender)| match sender.try_send(message.clone()) {
                    Ok(()) => true,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        debug!(account, subscription = id, "Subscriber buffer full, message dropped");
                        true
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        debug!(account, subscription = id, "Pruned closed subscription");
                        false
                    }
                });
                if subscriptions.is_empty() {
                    self.subscribers.remove(&account);
                }
            }
        }
    }
}

/// Cloneable handle to a running [`NotificationDispatcher`]
#[derive(Clone, Debug)]
pub struct NotificationHandle {
    commands: mpsc::Sender<Command>,
    next_id: Arc<AtomicU64>,
    buffer: usize,
}

impl NotificationHandle {
    /// Open a subscription for an account
    ///
    /// If the dispatcher is gone the returned subscription is already closed.
    pub async fn register(&self, account: AccountId) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.buffer);

        if self
            .commands
            .send(Command::Register {
                account,
                id,
                sender,
            })
            .await
            .is_err()
        {
            warn!(account, "Notification dispatcher is not running");
        }

        Subscription {
            id,
            account,
            receiver,
        }
    }

    /// Close a subscription
    pub async fn unregister(&self, id: SubscriptionId) {
        if self.commands.send(Command::Unregister { id }).await.is_err() {
            warn!(subscription = id, "Notification dispatcher is not running");
        }
    }
}

impl Notifier for NotificationHandle {
    fn notify(&self, account: AccountId, message: String) {
        if let Err(error) = self.commands.try_send(Command::Deliver { account, message }) {
            warn!(account, error = %error, "Notification dropped");
        }
    }
}
