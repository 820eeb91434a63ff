//! One quota ledger per client context.
//!
//! Ledgers are created lazily. Once more than [`DEFAULT_MAX_OPEN_LEDGERS`]
//! contexts are open, the least recently used idle ones are dropped. With a
//! state directory configured, each context persists under
//! `<state_dir>/<sha256(context)>/`, so arbitrary client ids never reach
//! the filesystem verbatim and evicted contexts reload their usage. Without
//! one, an evicted context starts over.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use sha2::{Digest, Sha256};

use crate::clock::Clock;
use crate::entitlement::EntitlementResolver;
use crate::error::CoreError;
use crate::quota::QuotaLedger;
use crate::store::{JsonFileStore, LedgerStore, MemoryStore};

/// Context used when the caller does not identify itself.
pub const DEFAULT_CLIENT_CONTEXT: &str = "default";

/// Open ledgers kept before idle ones are evicted.
pub const DEFAULT_MAX_OPEN_LEDGERS: usize = 1024;

/// Maximum length of a client context id.
pub const MAX_CLIENT_CONTEXT_LEN: usize = 128;

/// Reject empty, oversized, or control-character context ids.
pub fn validate_client_context(context: &str) -> Result<(), CoreError> {
    if context.is_empty() || context.len() > MAX_CLIENT_CONTEXT_LEN {
        return Err(CoreError::Validation(format!(
            "Client id must be 1-{MAX_CLIENT_CONTEXT_LEN} characters"
        )));
    }
    if context.chars().any(char::is_control) {
        return Err(CoreError::Validation(
            "Client id must not contain control characters".to_string(),
        ));
    }
    Ok(())
}

/// Directory name for a context's persisted state.
pub fn context_dir_name(context: &str) -> String {
    format!("{:x}", Sha256::digest(context.as_bytes()))
}

struct OpenLedger {
    ledger: Arc<QuotaLedger>,
    last_used: u64,
}

#[derive(Default)]
struct OpenLedgers {
    entries: HashMap<String, OpenLedger>,
    tick: u64,
}

impl OpenLedgers {
    /// Drop idle ledgers, oldest first, until there is room for one more.
    ///
    /// A ledger is idle when the registry holds its only reference. Busy
    /// ledgers are never dropped, so the map can briefly exceed `capacity`.
    fn make_room(&mut self, capacity: usize) {
        if self.entries.len() < capacity {
            return;
        }
        let mut idle: Vec<(u64, String)> = self
            .entries
            .iter()
            .filter(|(_, open)| Arc::strong_count(&open.ledger) == 1)
            .map(|(context, open)| (open.last_used, context.clone()))
            .collect();
        idle.sort_unstable();

        let excess = self.entries.len() + 1 - capacity;
        for (_, context) in idle.into_iter().take(excess) {
            self.entries.remove(&context);
            tracing::debug!(context = %context, "Evicted idle quota ledger");
        }
    }
}

pub struct LedgerRegistry {
    ledgers: Mutex<OpenLedgers>,
    capacity: usize,
    state_dir: Option<PathBuf>,
    resolver: Arc<dyn EntitlementResolver>,
    clock: Arc<dyn Clock>,
}

impl LedgerRegistry {
    /// `state_dir: None` keeps every ledger in memory.
    pub fn new(
        state_dir: Option<PathBuf>,
        resolver: Arc<dyn EntitlementResolver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledgers: Mutex::new(OpenLedgers::default()),
            capacity: DEFAULT_MAX_OPEN_LEDGERS,
            state_dir,
            resolver,
            clock,
        }
    }

    /// Keep at most `capacity` idle ledgers open.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn resolver(&self) -> &Arc<dyn EntitlementResolver> {
        &self.resolver
    }

    /// The ledger for `context`, opening it on first use.
    pub fn ledger_for(&self, context: &str) -> Arc<QuotaLedger> {
        let mut ledgers = self.ledgers.lock().unwrap_or_else(PoisonError::into_inner);
        ledgers.tick += 1;
        let tick = ledgers.tick;
        if let Some(open) = ledgers.entries.get_mut(context) {
            open.last_used = tick;
            return Arc::clone(&open.ledger);
        }
        ledgers.make_room(self.capacity);

        let store: Arc<dyn LedgerStore> = match &self.state_dir {
            Some(dir) => Arc::new(JsonFileStore::new(dir.join(context_dir_name(context)))),
            None => Arc::new(MemoryStore::new()),
        };
        let ledger = Arc::new(QuotaLedger::open(
            store,
            Arc::clone(&self.resolver),
            Arc::clone(&self.clock),
        ));
        tracing::debug!(context, "Opened quota ledger");
        ledgers.entries.insert(
            context.to_string(),
            OpenLedger {
                ledger: Arc::clone(&ledger),
                last_used: tick,
            },
        );
        ledger
    }

    pub fn len(&self) -> usize {
        self.ledgers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
