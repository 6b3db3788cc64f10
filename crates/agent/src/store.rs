//! Conversation store: owns every history partition.
//!
//! An exchange locks its partition from the moment it appends the user turn
//! until it finishes, so exchanges sharing a partition run one after another
//! and their turns never interleave.

use std::collections::HashMap;
use std::sync::Arc;

use relayclaw_config::HistoryScope;
use relayclaw_core::error::Error;
use relayclaw_core::message::{History, Turn};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Partition key used when every channel shares one history.
const SHARED_PARTITION: &str = "*";

#[derive(Default)]
struct Inner {
    system_prompt: Option<String>,
    partitions: HashMap<String, Arc<Mutex<History>>>,
}

pub struct ConversationStore {
    scope: HistoryScope,
    inner: Mutex<Inner>,
}

impl ConversationStore {
    pub fn new(scope: HistoryScope) -> Self {
        Self {
            scope,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn scope(&self) -> HistoryScope {
        self.scope
    }

    /// Set the system prompt that seeds every partition.
    ///
    /// Allowed once, and only before any exchange has touched the store.
    pub async fn set_system_prompt(&self, prompt: impl Into<String>) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        if inner.system_prompt.is_some() {
            return Err(Error::Config {
                message: "system prompt already set".into(),
            });
        }
        if !inner.partitions.is_empty() {
            return Err(Error::Config {
                message: "system prompt must be set before the first exchange".into(),
            });
        }
        inner.system_prompt = Some(prompt.into());
        Ok(())
    }

    fn partition_key<'a>(&self, channel: &'a str) -> &'a str {
        match self.scope {
            HistoryScope::Shared => SHARED_PARTITION,
            HistoryScope::PerChannel => channel,
        }
    }

    /// Lock the history a message from `channel` belongs to.
    ///
    /// The guard is owned so it can be held across the whole exchange.
    pub async fn lock(&self, channel: &str) -> OwnedMutexGuard<History> {
        let partition = {
            let mut inner = self.inner.lock().await;
            let seed = inner.system_prompt.clone();
            inner
                .partitions
                .entry(self.partition_key(channel).to_string())
                .or_insert_with(|| {
                    let history = match seed {
                        Some(prompt) => History::with_system_prompt(prompt),
                        None => History::new(),
                    };
                    Arc::new(Mutex::new(history))
                })
                .clone()
        };
        partition.lock_owned().await
    }

    /// A copy of the turns in the partition for `channel`.
    pub async fn snapshot(&self, channel: &str) -> Vec<Turn> {
        self.lock(channel).await.turns.clone()
    }

    pub async fn partition_count(&self) -> usize {
        self.inner.lock().await.partitions.len()
    }
}
