//! Read-through cache for JSON-shaped query results.
//!
//! A builder opts in with `.cache(id, ttl, invalidate)`. The executor looks the
//! key up in the process-wide [`Store`] before touching the database and writes
//! the serialized result back on a miss. Store failures are logged and ignored.

use crate::error::DatResult;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

/// Key-value store with per-entry time-to-live.
pub trait Store: Send + Sync {
    fn get(&self, key: &str) -> DatResult<Option<Vec<u8>>>;

    /// Store `value` under `key`; a zero `ttl` means no expiry.
    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> DatResult<()>;

    fn delete(&self, key: &str) -> DatResult<()>;

    /// Remove every entry.
    fn flush(&self) -> DatResult<()>;
}

// ==================== MemoryStore ====================

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

#[derive(Debug)]
struct MemoryInner {
    capacity: usize,
    map: HashMap<String, Entry>,
    order: VecDeque<String>,
}

/// In-process LRU store.
///
/// Holds at most `capacity` entries; the least recently used one is evicted
/// first. Expired entries are dropped on access.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                capacity,
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Number of live (possibly expired but not yet collected) entries.
    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl MemoryInner {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k.as_str() == key)
            && let Some(k) = self.order.remove(pos)
        {
            self.order.push_back(k);
        }
    }

    fn remove(&mut self, key: &str) {
        if self.map.remove(key).is_some()
            && let Some(pos) = self.order.iter().position(|k| k.as_str() == key)
        {
            let _ = self.order.remove(pos);
        }
    }

    fn evict_if_needed(&mut self) {
        if self.capacity == 0 {
            self.map.clear();
            self.order.clear();
            return;
        }
        while self.map.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            let _ = self.map.remove(&oldest);
        }
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> DatResult<Option<Vec<u8>>> {
        let mut inner = self.lock();
        let expired = match inner.map.get(key) {
            None => return Ok(None),
            Some(entry) => entry.expires_at.is_some_and(|at| at <= Instant::now()),
        };
        if expired {
            inner.remove(key);
            return Ok(None);
        }
        inner.touch(key);
        Ok(inner.map.get(key).map(|e| e.value.clone()))
    }

    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> DatResult<()> {
        let mut inner = self.lock();
        let expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        let entry = Entry { value, expires_at };
        if inner.map.insert(key.to_string(), entry).is_some() {
            inner.touch(key);
        } else {
            inner.order.push_back(key.to_string());
            inner.evict_if_needed();
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> DatResult<()> {
        self.lock().remove(key);
        Ok(())
    }

    fn flush(&self) -> DatResult<()> {
        let mut inner = self.lock();
        inner.map.clear();
        inner.order.clear();
        Ok(())
    }
}

// ==================== NoopStore ====================

/// A store that never holds anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopStore;

impl Store for NoopStore {
    fn get(&self, _key: &str) -> DatResult<Option<Vec<u8>>> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> DatResult<()> {
        Ok(())
    }

    fn delete(&self, _key: &str) -> DatResult<()> {
        Ok(())
    }

    fn flush(&self) -> DatResult<()> {
        Ok(())
    }
}

// ==================== Global store ====================

static STORE: RwLock<Option<Arc<dyn Store>>> = RwLock::new(None);

/// Install the process-wide store used by cached builders.
pub fn set_store(store: Arc<dyn Store>) {
    *STORE.write().unwrap_or_else(|e| e.into_inner()) = Some(store);
}

/// Remove the process-wide store; cached builders then always hit the database.
pub fn clear_store() {
    *STORE.write().unwrap_or_else(|e| e.into_inner()) = None;
}

/// The installed store, if any.
pub fn store() -> Option<Arc<dyn Store>> {
    STORE.read().unwrap_or_else(|e| e.into_inner()).clone()
}

// ==================== Keys ====================

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a hash of `data`, as 16 lowercase hex digits.
pub fn fnv1a64_hex(data: &[u8]) -> String {
    let hash = data.iter().fold(FNV_OFFSET, |h, b| {
        (h ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
    });
    format!("{hash:016x}")
}

/// Cache key for a statement: the caller id, or a hash of the SQL and the
/// rendered remainder arguments.
pub(crate) fn cache_key(id: &str, sql: &str, args: &str) -> String {
    if !id.is_empty() {
        return id.to_string();
    }
    let mut data = Vec::with_capacity(sql.len() + args.len() + 1);
    data.extend_from_slice(sql.as_bytes());
    data.push(0);
    data.extend_from_slice(args.as_bytes());
    fnv1a64_hex(&data)
}
