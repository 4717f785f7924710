//! Fast-path stock ledger, participation guard and the combined admission gate.
//!
//! These are the only globally mutable shared resources of the allocation core.
//! Every mutation goes through one of the atomic primitives below; no caller ever
//! reads a value and writes it back.

use crate::StoreFuture;
use crate::types::{ActivityId, RequesterId};
use std::time::Duration;

/// Result of [`StockLedger::try_reserve`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// Units were taken; `remaining` is the value after the decrement
    Reserved {
        /// Stock left after this reservation
        remaining: u32,
    },
    /// Not enough units (or no entry at all); nothing changed
    InsufficientStock,
}

/// Result of [`ParticipationGuard::try_mark`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The requester was not marked and now is
    Marked,
    /// The requester already held a mark; nothing changed
    AlreadyMarked,
}

/// Result of the combined admission decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// One unit taken and the requester marked, atomically
    Admitted {
        /// Stock left after this admission
        remaining: u32,
    },
    /// Requester not marked but no stock left
    OutOfStock,
    /// Requester already marked; stock untouched
    AlreadyParticipated,
    /// The ledger has no entry for this activity (never seeded, evicted or expired)
    NotInitialized,
}

/// Fast shared counter of remaining units per activity.
///
/// A missing entry means "unknown", not zero: callers seed it from the durable
/// counter with [`Self::seed_if_absent`].
pub trait StockLedger: Send + Sync {
    /// If `remaining >= quantity`, decrement by `quantity`; otherwise change nothing.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::StoreError) if the backend fails.
    fn try_reserve(&self, id: ActivityId, quantity: u32) -> StoreFuture<'_, ReserveOutcome>;

    /// Add units back. Returns the new value, or `None` when no entry exists
    /// (the next warm-up re-seeds from the durable counter).
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::StoreError) if the backend fails.
    fn restore(&self, id: ActivityId, quantity: u32) -> StoreFuture<'_, Option<u32>>;

    /// Remove up to `quantity` units, clamping at zero. Returns the units actually
    /// removed, or `None` when no entry exists.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::StoreError) if the backend fails.
    fn withdraw(&self, id: ActivityId, quantity: u32) -> StoreFuture<'_, Option<u32>>;

    /// Atomically replace the value and return the previous one (`None` if absent).
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::StoreError) if the backend fails.
    fn set_remaining(
        &self,
        id: ActivityId,
        value: u32,
        ttl: Duration,
    ) -> StoreFuture<'_, Option<u32>>;

    /// Create the entry only if it does not exist. Returns whether it was written.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::StoreError) if the backend fails.
    fn seed_if_absent(&self, id: ActivityId, value: u32, ttl: Duration)
    -> StoreFuture<'_, bool>;

    /// Current value, if any.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::StoreError) if the backend fails.
    fn remaining(&self, id: ActivityId) -> StoreFuture<'_, Option<u32>>;

    /// Reset the time-to-live of the stock entry and the participation set.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::StoreError) if the backend fails.
    fn refresh_expiry(&self, id: ActivityId, ttl: Duration) -> StoreFuture<'_, ()>;

    /// Drop the stock entry.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::StoreError) if the backend fails.
    fn clear_stock(&self, id: ActivityId) -> StoreFuture<'_, ()>;
}

/// Shared record of which requesters hold a reservation per activity.
pub trait ParticipationGuard: Send + Sync {
    /// Test membership and insert in one step. The activity's set expires after `ttl`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::StoreError) if the backend fails.
    fn try_mark(
        &self,
        id: ActivityId,
        requester: RequesterId,
        ttl: Duration,
    ) -> StoreFuture<'_, MarkOutcome>;

    /// Remove a mark. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::StoreError) if the backend fails.
    fn unmark(&self, id: ActivityId, requester: RequesterId) -> StoreFuture<'_, bool>;

    /// Whether the requester is currently marked.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::StoreError) if the backend fails.
    fn is_marked(&self, id: ActivityId, requester: RequesterId) -> StoreFuture<'_, bool>;

    /// Drop every mark for the activity.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::StoreError) if the backend fails.
    fn clear_marks(&self, id: ActivityId) -> StoreFuture<'_, ()>;
}

/// Stock ledger and participation guard fused behind one indivisible decision.
///
/// `admit` must evaluate "stock >= quantity AND requester not marked" and commit
/// "decrement AND mark" as one step. Two separate calls to
/// [`StockLedger::try_reserve`] and [`ParticipationGuard::try_mark`] are not
/// equivalent.
///
/// When both conditions fail the requester's mark wins: a repeat caller always
/// sees `AlreadyParticipated`, even after the sale sold out.
pub trait AdmissionGate: StockLedger + ParticipationGuard {
    /// Run the combined admission decision.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::StoreError) if the backend fails.
    fn admit(
        &self,
        id: ActivityId,
        requester: RequesterId,
        quantity: u32,
        ttl: Duration,
    ) -> StoreFuture<'_, Admission>;
}
