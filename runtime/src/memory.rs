//! In-process admission gate.
//!
//! One mutex per activity guards a composite `{stock, participants}` slot, so the
//! combined admission decision is a plain critical section and activities never
//! contend with each other. Entries expire lazily against the injected clock,
//! mirroring key expiry in a shared cache.
//!
//! Slots are only allocated by writes that store something; reads and updates of
//! an unknown activity answer from an empty slot without allocating one. Expired
//! slots are reclaimed by [`InMemoryAdmissionGate::evict_expired`], which a
//! long-running process should call periodically.
//!
//! Suitable for a single node and for tests. Multi-node deployments use the Redis
//! gate from `flashsale-redis`.

use chrono::{DateTime, Utc};
use flashsale_core::environment::Clock;
use flashsale_core::{
    ActivityId, Admission, AdmissionGate, MarkOutcome, ParticipationGuard, RequesterId,
    ReserveOutcome, StockLedger, StoreError, StoreFuture,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct Slot {
    stock: Option<u32>,
    stock_expires_at: Option<DateTime<Utc>>,
    participants: HashSet<RequesterId>,
    participants_expire_at: Option<DateTime<Utc>>,
    // Set once evicted; holders of a stale handle must look the slot up again.
    retired: bool,
}

impl Slot {
    fn purge_expired(&mut self, now: DateTime<Utc>) {
        if self.stock_expires_at.is_some_and(|at| at <= now) {
            self.stock = None;
            self.stock_expires_at = None;
        }
        if self.participants_expire_at.is_some_and(|at| at <= now) {
            self.participants.clear();
            self.participants_expire_at = None;
        }
    }

    fn mark(&mut self, requester: RequesterId, expires_at: DateTime<Utc>) -> MarkOutcome {
        if self.participants.insert(requester) {
            self.participants_expire_at = Some(expires_at);
            MarkOutcome::Marked
        } else {
            MarkOutcome::AlreadyMarked
        }
    }

    fn is_empty(&self) -> bool {
        self.stock.is_none() && self.participants.is_empty()
    }
}

/// Mutex-per-activity implementation of [`AdmissionGate`].
pub struct InMemoryAdmissionGate {
    slots: Mutex<HashMap<ActivityId, Arc<Mutex<Slot>>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryAdmissionGate {
    /// Create an empty gate using `clock` for entry expiry.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn table(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<ActivityId, Arc<Mutex<Slot>>>>, StoreError> {
        self.slots
            .lock()
            .map_err(|_| StoreError::Cache("admission slot table poisoned".into()))
    }

    /// Run `f` inside the activity's critical section, after lazy expiry,
    /// allocating the slot if needed.
    fn with_slot<T>(
        &self,
        id: ActivityId,
        mut f: impl FnMut(&mut Slot, DateTime<Utc>) -> T,
    ) -> Result<T, StoreError> {
        loop {
            let slot = Arc::clone(self.table()?.entry(id).or_default());
            let now = self.clock.now();
            let mut guard = slot
                .lock()
                .map_err(|_| StoreError::Cache(format!("admission slot {id} poisoned")))?;
            if guard.retired {
                continue;
            }
            guard.purge_expired(now);
            return Ok(f(&mut guard, now));
        }
    }

    /// Like [`Self::with_slot`], but an activity without a live slot answers
    /// `absent` and nothing is allocated.
    fn with_existing_slot<T>(
        &self,
        id: ActivityId,
        absent: T,
        f: impl FnOnce(&mut Slot, DateTime<Utc>) -> T,
    ) -> Result<T, StoreError> {
        let Some(slot) = self.table()?.get(&id).cloned() else {
            return Ok(absent);
        };
        let now = self.clock.now();
        let mut guard = slot
            .lock()
            .map_err(|_| StoreError::Cache(format!("admission slot {id} poisoned")))?;
        if guard.retired {
            return Ok(absent);
        }
        guard.purge_expired(now);
        Ok(f(&mut guard, now))
    }

    /// Number of allocated slots.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.table().map_or(0, |slots| slots.len())
    }

    fn ready<T: Send + 'static>(result: Result<T, StoreError>) -> StoreFuture<'static, T> {
        Box::pin(std::future::ready(result))
    }

    fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
        now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(24))
    }

    /// Drop slots whose entries have all expired or been cleared, returning how
    /// many were dropped.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Cache` if a lock was poisoned.
    pub fn evict_expired(&self) -> Result<usize, StoreError> {
        let now = self.clock.now();
        let mut slots = self.table()?;
        let before = slots.len();
        slots.retain(|_, slot| {
            slot.lock().map_or(true, |mut slot| {
                slot.purge_expired(now);
                if slot.is_empty() {
                    slot.retired = true;
                }
                !slot.retired
            })
        });
        Ok(before - slots.len())
    }
}

impl std::fmt::Debug for InMemoryAdmissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryAdmissionGate").finish_non_exhaustive()
    }
}

impl StockLedger for InMemoryAdmissionGate {
    fn try_reserve(&self, id: ActivityId, quantity: u32) -> StoreFuture<'_, ReserveOutcome> {
        let absent = ReserveOutcome::InsufficientStock;
        Self::ready(self.with_existing_slot(id, absent, |slot, _| match slot.stock {
            Some(stock) if stock >= quantity => {
                slot.stock = Some(stock - quantity);
                ReserveOutcome::Reserved {
                    remaining: stock - quantity,
                }
            }
            _ => ReserveOutcome::InsufficientStock,
        }))
    }

    fn restore(&self, id: ActivityId, quantity: u32) -> StoreFuture<'_, Option<u32>> {
        Self::ready(self.with_existing_slot(id, None, |slot, _| {
            slot.stock = slot.stock.map(|stock| stock.saturating_add(quantity));
            slot.stock
        }))
    }

    fn withdraw(&self, id: ActivityId, quantity: u32) -> StoreFuture<'_, Option<u32>> {
        Self::ready(self.with_existing_slot(id, None, |slot, _| {
            slot.stock.map(|stock| {
                let removed = stock.min(quantity);
                slot.stock = Some(stock - removed);
                removed
            })
        }))
    }

    fn set_remaining(
        &self,
        id: ActivityId,
        value: u32,
        ttl: Duration,
    ) -> StoreFuture<'_, Option<u32>> {
        Self::ready(self.with_slot(id, |slot, now| {
            slot.stock_expires_at = Some(Self::expiry(now, ttl));
            slot.stock.replace(value)
        }))
    }

    fn seed_if_absent(
        &self,
        id: ActivityId,
        value: u32,
        ttl: Duration,
    ) -> StoreFuture<'_, bool> {
        Self::ready(self.with_slot(id, |slot, now| {
            if slot.stock.is_some() {
                return false;
            }
            slot.stock = Some(value);
            slot.stock_expires_at = Some(Self::expiry(now, ttl));
            true
        }))
    }

    fn remaining(&self, id: ActivityId) -> StoreFuture<'_, Option<u32>> {
        Self::ready(self.with_existing_slot(id, None, |slot, _| slot.stock))
    }

    fn refresh_expiry(&self, id: ActivityId, ttl: Duration) -> StoreFuture<'_, ()> {
        Self::ready(self.with_existing_slot(id, (), |slot, now| {
            let at = Self::expiry(now, ttl);
            if slot.stock.is_some() {
                slot.stock_expires_at = Some(at);
            }
            if !slot.participants.is_empty() {
                slot.participants_expire_at = Some(at);
            }
        }))
    }

    fn clear_stock(&self, id: ActivityId) -> StoreFuture<'_, ()> {
        Self::ready(self.with_existing_slot(id, (), |slot, _| {
            slot.stock = None;
            slot.stock_expires_at = None;
        }))
    }
}

impl ParticipationGuard for InMemoryAdmissionGate {
    fn try_mark(
        &self,
        id: ActivityId,
        requester: RequesterId,
        ttl: Duration,
    ) -> StoreFuture<'_, MarkOutcome> {
        Self::ready(self.with_slot(id, |slot, now| {
            slot.mark(requester, Self::expiry(now, ttl))
        }))
    }

    fn unmark(&self, id: ActivityId, requester: RequesterId) -> StoreFuture<'_, bool> {
        Self::ready(self.with_existing_slot(id, false, |slot, _| {
            slot.participants.remove(&requester)
        }))
    }

    fn is_marked(&self, id: ActivityId, requester: RequesterId) -> StoreFuture<'_, bool> {
        Self::ready(self.with_existing_slot(id, false, |slot, _| {
            slot.participants.contains(&requester)
        }))
    }

    fn clear_marks(&self, id: ActivityId) -> StoreFuture<'_, ()> {
        Self::ready(self.with_existing_slot(id, (), |slot, _| {
            slot.participants.clear();
            slot.participants_expire_at = None;
        }))
    }
}

impl AdmissionGate for InMemoryAdmissionGate {
    fn admit(
        &self,
        id: ActivityId,
        requester: RequesterId,
        quantity: u32,
        ttl: Duration,
    ) -> StoreFuture<'_, Admission> {
        let absent = Admission::NotInitialized;
        Self::ready(self.with_existing_slot(id, absent, |slot, now| {
            if slot.participants.contains(&requester) {
                return Admission::AlreadyParticipated;
            }
            let Some(stock) = slot.stock else {
                return Admission::NotInitialized;
            };
            if stock < quantity {
                return Admission::OutOfStock;
            }
            slot.stock = Some(stock - quantity);
            slot.mark(requester, Self::expiry(now, ttl));
            Admission::Admitted {
                remaining: stock - quantity,
            }
        }))
    }
}
