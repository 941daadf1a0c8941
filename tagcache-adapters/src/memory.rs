//! In-process map-backed adapters for single-process and test use.
//!
//! [`MemoryStorage`] and [`MemoryMetadata`] implement the two port contracts
//! against plain hash maps. They are suitable for unit tests and for callers
//! that want tagged-cache semantics without any external store; they do not
//! share state across processes.
//!
//! # Lock expiration
//!
//! `MemoryMetadata` owns a background sweeper task that force-releases
//! expired locks and wakes waiters. The task is started in the constructor
//! and aborted when the adapter is dropped, so its lifetime is tied to the
//! adapter instance - there is no process-wide singleton and shutdown is
//! deterministic. Waiters additionally bound their own sleep by the current
//! holder's expiry, so acquisition after a crash does not depend on sweeper
//! granularity.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};

use tagcache_core::{LockId, MetadataHash, MetadataPort, PortError, PortResult, StoragePort, TagVersion};

/// How often the sweeper scans the lock table for expired holders.
const SWEEP_INTERVAL: Duration = Duration::from_millis(250);

fn lock_poisoned() -> PortError {
    PortError::new("adapter state lock poisoned")
}

// ============================================================================
// STORAGE ADAPTER
// ============================================================================

struct StoredValue {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(deadline) if now >= deadline)
    }
}

/// Map-backed [`StoragePort`].
///
/// Entries carry their own deadline; expiry is checked lazily on read, so an
/// expired entry occupies memory until the next read touches it.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, StoredValue>>,
}

impl MemoryStorage {
    /// Create an empty in-memory storage adapter.
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> PortResult<MutexGuard<'_, HashMap<String, StoredValue>>> {
        self.entries.lock().map_err(|_| lock_poisoned())
    }

    fn get_live(
        entries: &mut HashMap<String, StoredValue>,
        key: &str,
        now: Instant,
    ) -> Option<Vec<u8>> {
        match entries.get(key) {
            Some(stored) if stored.is_expired(now) => {
                entries.remove(key);
                None
            }
            Some(stored) => Some(stored.value.clone()),
            None => None,
        }
    }
}

#[async_trait]
impl StoragePort for MemoryStorage {
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> PortResult<()> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries()?
            .insert(key.to_string(), StoredValue { value, expires_at });
        Ok(())
    }

    async fn get(&self, key: &str) -> PortResult<Option<Vec<u8>>> {
        let mut entries = self.entries()?;
        Ok(Self::get_live(&mut entries, key, Instant::now()))
    }

    async fn delete(&self, key: &str) -> PortResult<bool> {
        let mut entries = self.entries()?;
        let now = Instant::now();
        match entries.remove(key) {
            Some(stored) => Ok(!stored.is_expired(now)),
            None => Ok(false),
        }
    }

    async fn mget(&self, keys: &[String]) -> PortResult<Vec<Option<Vec<u8>>>> {
        let mut entries = self.entries()?;
        let now = Instant::now();
        Ok(keys
            .iter()
            .map(|key| Self::get_live(&mut entries, key, now))
            .collect())
    }

    async fn mdelete(&self, keys: &[String]) -> PortResult<()> {
        let mut entries = self.entries()?;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }
}

// ============================================================================
// METADATA ADAPTER
// ============================================================================

struct TagEntry {
    token: TagVersion,
    expires_at: Option<Instant>,
}

impl TagEntry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(deadline) if now >= deadline)
    }
}

struct Holder {
    id: LockId,
    expires_at: Instant,
}

struct LockSlot {
    holder: Option<Holder>,
    notify: Arc<Notify>,
}

impl LockSlot {
    fn new() -> Self {
        Self {
            holder: None,
            notify: Arc::new(Notify::new()),
        }
    }
}

struct MetadataState {
    tags: Mutex<HashMap<(String, String), TagEntry>>,
    locks: Mutex<HashMap<String, LockSlot>>,
}

impl MetadataState {
    /// Force-release expired holders and wake their waiters.
    ///
    /// Slots that are unheld and unobserved (no waiter holds a clone of the
    /// notify handle) are pruned so the table does not grow forever.
    fn sweep(&self, now: Instant) {
        let Ok(mut locks) = self.locks.lock() else {
            return;
        };
        locks.retain(|_, slot| {
            if let Some(holder) = &slot.holder {
                if now >= holder.expires_at {
                    tracing::debug!(holder = %holder.id, "force-releasing expired lock");
                    slot.holder = None;
                    slot.notify.notify_waiters();
                }
            }
            slot.holder.is_some() || Arc::strong_count(&slot.notify) > 1
        });
    }
}

/// Map-backed [`MetadataPort`] with an owned lock-expiration sweeper.
///
/// Must be constructed inside a Tokio runtime (the sweeper task is spawned
/// in the constructor).
pub struct MemoryMetadata {
    state: Arc<MetadataState>,
    sweeper: JoinHandle<()>,
}

impl MemoryMetadata {
    /// Create a fresh in-memory metadata adapter and start its sweeper.
    pub fn new() -> Self {
        let state = Arc::new(MetadataState {
            tags: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        });
        let sweep_state = Arc::clone(&state);
        let sweeper = tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                sweep_state.sweep(Instant::now());
            }
        });
        Self { state, sweeper }
    }

    fn slot_key(namespace: &str, key: &str, metadata_hash: &MetadataHash) -> String {
        format!("{namespace}\u{1f}{key}\u{1f}{metadata_hash}")
    }
}

impl Default for MemoryMetadata {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MemoryMetadata {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

#[async_trait]
impl MetadataPort for MemoryMetadata {
    async fn get_or_set_tag_values(
        &self,
        namespace: &str,
        tag_names: &[String],
        ttl: Option<Duration>,
    ) -> PortResult<Vec<TagVersion>> {
        let mut tags = self.state.tags.lock().map_err(|_| lock_poisoned())?;
        let now = Instant::now();
        let mut tokens = Vec::with_capacity(tag_names.len());
        for tag_name in tag_names {
            let entry_key = (namespace.to_string(), tag_name.clone());
            let entry = tags.get(&entry_key).filter(|entry| !entry.is_expired(now));
            match entry {
                Some(entry) => tokens.push(entry.token),
                None => {
                    // First use (or expired token): generate a fresh one.
                    let token = TagVersion::random();
                    tags.insert(
                        entry_key,
                        TagEntry {
                            token,
                            expires_at: ttl.map(|ttl| now + ttl),
                        },
                    );
                    tokens.push(token);
                }
            }
        }
        Ok(tokens)
    }

    async fn invalidate_tags(&self, namespace: &str, tag_names: &[String]) -> PortResult<()> {
        let mut tags = self.state.tags.lock().map_err(|_| lock_poisoned())?;
        for tag_name in tag_names {
            // Replacing the token (rather than deleting it) keeps the tag's
            // TTL bookkeeping local to this entry.
            let entry_key = (namespace.to_string(), tag_name.clone());
            let expires_at = tags.get(&entry_key).and_then(|entry| entry.expires_at);
            tags.insert(
                entry_key,
                TagEntry {
                    token: TagVersion::random(),
                    expires_at,
                },
            );
        }
        Ok(())
    }

    async fn lock(
        &self,
        namespace: &str,
        key: &str,
        metadata_hash: &MetadataHash,
        timeout: Duration,
        wait: Duration,
    ) -> PortResult<Option<LockId>> {
        let slot_key = Self::slot_key(namespace, key, metadata_hash);
        let deadline = Instant::now() + wait;
        loop {
            // Take the slot if it is free or its holder has expired;
            // otherwise register for wakeup *before* releasing the table so
            // a release cannot slip by unnoticed.
            let notify;
            let holder_expires_at;
            let mut notified;
            {
                let mut locks = self.state.locks.lock().map_err(|_| lock_poisoned())?;
                let now = Instant::now();
                let slot = locks.entry(slot_key.clone()).or_insert_with(LockSlot::new);
                match &slot.holder {
                    Some(holder) if now < holder.expires_at => {
                        notify = Arc::clone(&slot.notify);
                        holder_expires_at = holder.expires_at;
                    }
                    _ => {
                        let id = LockId::random();
                        slot.holder = Some(Holder {
                            id: id.clone(),
                            expires_at: now + timeout,
                        });
                        return Ok(Some(id));
                    }
                }

                notified = Box::pin(notify.notified());
                notified.as_mut().enable();
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            // Wake either on release or when the holder must have expired,
            // whichever comes first within the wait budget.
            let wake_at = deadline.min(holder_expires_at);
            let _ = timeout_at(wake_at, notified).await;
        }
    }

    async fn unlock(
        &self,
        namespace: &str,
        key: &str,
        metadata_hash: &MetadataHash,
        id: LockId,
    ) -> PortResult<()> {
        let slot_key = Self::slot_key(namespace, key, metadata_hash);
        let mut locks = self.state.locks.lock().map_err(|_| lock_poisoned())?;
        if let Some(slot) = locks.get_mut(&slot_key) {
            if slot.holder.as_ref().is_some_and(|holder| holder.id == id) {
                slot.holder = None;
                slot.notify.notify_waiters();
            }
        }
        Ok(())
    }
}
