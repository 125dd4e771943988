//! Bookkeeping guarded by the pool gate
//!
//! Every object the pool knows about lives in one table keyed by the address of
//! its `Arc` allocation, tagged with the state it is in. Owned objects are the
//! `Available` and `Rented` ones; `PendingDeletion` objects were evicted while
//! rented and wait to be destroyed on return. Available objects are also
//! indexed oldest-first in `available`.
//!
//! Nothing here runs caller callbacks. Transitions that drop objects from the
//! pool hand them back so the caller can tear them down after unlocking.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

pub(crate) type EntryKey = usize;

/// Identity of a pooled object
pub(crate) fn key_of<T>(object: &Arc<T>) -> EntryKey {
    Arc::as_ptr(object) as usize
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryState {
    Available,
    Rented,
    PendingDeletion,
}

struct Slot<T> {
    object: Arc<T>,
    stamp: Duration,
    state: EntryState,
    // Position in the available queue while `state == Available`
    queue_seq: u64,
}

type QueueKey = (Duration, u64);

pub(crate) struct PoolState<T> {
    entries: HashMap<EntryKey, Slot<T>>,
    available: BTreeMap<QueueKey, EntryKey>,
    next_seq: u64,
    owned: usize,
    max_pool_size: usize,
    disposed: bool,
}

impl<T> PoolState<T> {
    pub fn new(max_pool_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            available: BTreeMap::new(),
            next_seq: 0,
            owned: 0,
            max_pool_size,
            disposed: false,
        }
    }

    pub fn owned_count(&self) -> usize {
        self.owned
    }

    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    pub fn rented_count(&self) -> usize {
        self.owned - self.available.len()
    }

    pub fn pending_count(&self) -> usize {
        self.entries.len() - self.owned
    }

    pub fn max_pool_size(&self) -> usize {
        self.max_pool_size
    }

    pub fn set_max_pool_size(&mut self, size: usize) {
        self.max_pool_size = size;
    }

    pub fn is_full(&self) -> bool {
        self.owned >= self.max_pool_size
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn state_of(&self, key: EntryKey) -> Option<EntryState> {
        self.entries.get(&key).map(|slot| slot.state)
    }

    pub fn object(&self, key: EntryKey) -> Option<Arc<T>> {
        self.entries.get(&key).map(|slot| Arc::clone(&slot.object))
    }

    /// Take the oldest available object and mark it rented at `now`
    pub fn rent_oldest(&mut self, now: Duration) -> Option<Arc<T>> {
        let (_, key) = self.available.pop_first()?;
        let slot = self.entries.get_mut(&key)?;
        slot.state = EntryState::Rented;
        slot.stamp = now;
        Some(Arc::clone(&slot.object))
    }

    /// Take ownership of a freshly created object that is already handed out
    pub fn admit_rented(&mut self, object: Arc<T>, now: Duration) {
        let slot = Slot {
            object,
            stamp: now,
            state: EntryState::Rented,
            queue_seq: 0,
        };
        self.entries.insert(key_of(&slot.object), slot);
        self.owned += 1;
    }

    /// Put a rented object back in the available queue
    pub fn make_available(&mut self, key: EntryKey, now: Duration) {
        let seq = self.next_seq;
        let Some(slot) = self.entries.get_mut(&key) else {
            return;
        };
        if slot.state != EntryState::Rented {
            return;
        }
        slot.state = EntryState::Available;
        slot.stamp = now;
        slot.queue_seq = seq;
        self.available.insert((now, seq), key);
        self.next_seq += 1;
    }

    /// Remove an entry regardless of its state
    pub fn remove(&mut self, key: EntryKey) -> Option<Arc<T>> {
        let slot = self.entries.remove(&key)?;
        match slot.state {
            EntryState::Available => {
                self.available.remove(&(slot.stamp, slot.queue_seq));
                self.owned -= 1;
            }
            EntryState::Rented => self.owned -= 1,
            EntryState::PendingDeletion => {}
        }
        Some(slot.object)
    }

    /// Remove up to `limit` idle objects, oldest first
    pub fn evict_idle(&mut self, limit: usize) -> Vec<Arc<T>> {
        let mut evicted = Vec::with_capacity(limit.min(self.available.len()));
        while evicted.len() < limit {
            let Some((_, key)) = self.available.pop_first() else {
                break;
            };
            if let Some(slot) = self.entries.remove(&key) {
                self.owned -= 1;
                evicted.push(slot.object);
            }
        }
        evicted
    }

    /// Move up to `limit` rented objects to pending deletion
    pub fn defer_rented(&mut self, limit: usize) -> usize {
        let mut deferred = 0;
        for slot in self.entries.values_mut() {
            if deferred == limit {
                break;
            }
            if slot.state == EntryState::Rented {
                slot.state = EntryState::PendingDeletion;
                deferred += 1;
            }
        }
        self.owned -= deferred;
        deferred
    }

    /// Up to `limit` pending-deletion entries, in table order
    pub fn pending_keys(&self, limit: usize) -> Vec<EntryKey> {
        self.entries
            .iter()
            .filter(|(_, slot)| slot.state == EntryState::PendingDeletion)
            .map(|(key, _)| *key)
            .take(limit)
            .collect()
    }

    /// Take a pending-deletion entry back into ownership as rented
    pub fn reclaim(&mut self, key: EntryKey) -> bool {
        match self.entries.get_mut(&key) {
            Some(slot) if slot.state == EntryState::PendingDeletion => {
                slot.state = EntryState::Rented;
                self.owned += 1;
                true
            }
            _ => false,
        }
    }

    /// Evict every owned object whose last activity is at least `retention` old
    ///
    /// Idle ones are removed and returned; rented ones become pending deletion.
    /// Returns the removed objects and how many were deferred.
    pub fn expire(&mut self, now: Duration, retention: Duration) -> (Vec<Arc<T>>, usize) {
        let expired: Vec<EntryKey> = self
            .entries
            .iter()
            .filter(|(_, slot)| slot.state != EntryState::PendingDeletion)
            .filter(|(_, slot)| now.saturating_sub(slot.stamp) >= retention)
            .map(|(key, _)| *key)
            .collect();

        let mut removed = Vec::new();
        let mut deferred = 0;
        for key in expired {
            match self.state_of(key) {
                Some(EntryState::Available) => removed.extend(self.remove(key)),
                Some(EntryState::Rented) => {
                    if let Some(slot) = self.entries.get_mut(&key) {
                        slot.state = EntryState::PendingDeletion;
                        self.owned -= 1;
                        deferred += 1;
                    }
                }
                _ => {}
            }
        }
        (removed, deferred)
    }

    /// Drop every owned object: idle ones are returned, rented ones deferred
    pub fn clear(&mut self) -> (Vec<Arc<T>>, usize) {
        let idle = self.evict_idle(usize::MAX);
        let deferred = self.defer_rented(usize::MAX);
        debug_assert_eq!(self.owned, 0);
        (idle, deferred)
    }

    /// Terminal transition; the pool owns nothing afterwards
    pub fn dispose(&mut self) -> (Vec<Arc<T>>, usize) {
        let cleared = self.clear();
        self.max_pool_size = 0;
        self.disposed = true;
        cleared
    }
}
