//! Admission gate wrapper that fails selected primitives on demand.

use flashsale_core::{
    ActivityId, Admission, AdmissionGate, MarkOutcome, ParticipationGuard, RequesterId,
    ReserveOutcome, StockLedger, StoreError, StoreFuture,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Delegates to an inner gate unless a failure switch is on.
pub struct FlakyAdmissionGate {
    inner: Arc<dyn AdmissionGate>,
    fail_admit: AtomicBool,
    fail_restore: AtomicBool,
    fail_unmark: AtomicBool,
}

impl FlakyAdmissionGate {
    /// Wrap `inner` with every switch off
    #[must_use]
    pub fn new(inner: Arc<dyn AdmissionGate>) -> Self {
        Self {
            inner,
            fail_admit: AtomicBool::new(false),
            fail_restore: AtomicBool::new(false),
            fail_unmark: AtomicBool::new(false),
        }
    }

    /// Make `admit` fail
    pub fn fail_admit(&self, fail: bool) {
        self.fail_admit.store(fail, Ordering::SeqCst);
    }

    /// Make `restore` fail
    pub fn fail_restore(&self, fail: bool) {
        self.fail_restore.store(fail, Ordering::SeqCst);
    }

    /// Make `unmark` fail
    pub fn fail_unmark(&self, fail: bool) {
        self.fail_unmark.store(fail, Ordering::SeqCst);
    }

    fn tripped<'a, T: Send + 'a>(switch: &AtomicBool, what: &str) -> Option<StoreFuture<'a, T>> {
        switch.load(Ordering::SeqCst).then(|| {
            let error = StoreError::Cache(format!("injected failure: {what}"));
            Box::pin(std::future::ready(Err(error))) as StoreFuture<'a, T>
        })
    }
}

impl std::fmt::Debug for FlakyAdmissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlakyAdmissionGate")
            .field("fail_admit", &self.fail_admit)
            .field("fail_restore", &self.fail_restore)
            .field("fail_unmark", &self.fail_unmark)
            .finish_non_exhaustive()
    }
}

impl StockLedger for FlakyAdmissionGate {
    fn try_reserve(&self, id: ActivityId, quantity: u32) -> StoreFuture<'_, ReserveOutcome> {
        self.inner.try_reserve(id, quantity)
    }

    fn restore(&self, id: ActivityId, quantity: u32) -> StoreFuture<'_, Option<u32>> {
        Self::tripped(&self.fail_restore, "restore")
            .unwrap_or_else(|| self.inner.restore(id, quantity))
    }

    fn withdraw(&self, id: ActivityId, quantity: u32) -> StoreFuture<'_, Option<u32>> {
        self.inner.withdraw(id, quantity)
    }

    fn set_remaining(
        &self,
        id: ActivityId,
        value: u32,
        ttl: Duration,
    ) -> StoreFuture<'_, Option<u32>> {
        self.inner.set_remaining(id, value, ttl)
    }

    fn seed_if_absent(
        &self,
        id: ActivityId,
        value: u32,
        ttl: Duration,
    ) -> StoreFuture<'_, bool> {
        self.inner.seed_if_absent(id, value, ttl)
    }

    fn remaining(&self, id: ActivityId) -> StoreFuture<'_, Option<u32>> {
        self.inner.remaining(id)
    }

    fn refresh_expiry(&self, id: ActivityId, ttl: Duration) -> StoreFuture<'_, ()> {
        self.inner.refresh_expiry(id, ttl)
    }

    fn clear_stock(&self, id: ActivityId) -> StoreFuture<'_, ()> {
        self.inner.clear_stock(id)
    }
}

impl ParticipationGuard for FlakyAdmissionGate {
    fn try_mark(
        &self,
        id: ActivityId,
        requester: RequesterId,
        ttl: Duration,
    ) -> StoreFuture<'_, MarkOutcome> {
        self.inner.try_mark(id, requester, ttl)
    }

    fn unmark(&self, id: ActivityId, requester: RequesterId) -> StoreFuture<'_, bool> {
        Self::tripped(&self.fail_unmark, "unmark")
            .unwrap_or_else(|| self.inner.unmark(id, requester))
    }

    fn is_marked(&self, id: ActivityId, requester: RequesterId) -> StoreFuture<'_, bool> {
        self.inner.is_marked(id, requester)
    }

    fn clear_marks(&self, id: ActivityId) -> StoreFuture<'_, ()> {
        self.inner.clear_marks(id)
    }
}

impl AdmissionGate for FlakyAdmissionGate {
    fn admit(
        &self,
        id: ActivityId,
        requester: RequesterId,
        quantity: u32,
        ttl: Duration,
    ) -> StoreFuture<'_, Admission> {
        Self::tripped(&self.fail_admit, "admit")
            .unwrap_or_else(|| self.inner.admit(id, requester, quantity, ttl))
    }
}
