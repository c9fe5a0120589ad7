use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Keys of requests currently being served. A second request for a busy key is turned away
/// instead of running the same pipeline twice.
#[derive(Clone, Default)]
pub struct InFlight {
    keys: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `key` until the returned guard is dropped. `None` when it is already claimed.
    pub fn try_acquire(&self, key: impl Into<String>) -> Option<InFlightGuard> {
        let key = key.into();
        let mut keys = match self.keys.lock() {
            Ok(keys) => keys,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !keys.insert(key.clone()) {
            return None;
        }
        Some(InFlightGuard {
            keys: self.keys.clone(),
            key,
        })
    }

    pub fn is_busy(&self, key: &str) -> bool {
        match self.keys.lock() {
            Ok(keys) => keys.contains(key),
            Err(poisoned) => poisoned.into_inner().contains(key),
        }
    }
}

pub struct InFlightGuard {
    keys: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        match self.keys.lock() {
            Ok(mut keys) => {
                keys.remove(&self.key);
            }
            Err(poisoned) => {
                poisoned.into_inner().remove(&self.key);
            }
        }
    }
}
