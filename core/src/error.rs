//! Error types for the flash-sale core.
//!
//! Two layers: [`StoreError`] is what a collaborator (database, cache, catalog)
//! reports, and [`FlashSaleError`] is the caller-visible taxonomy every
//! operation maps into. [`CompensationFailure`] never reaches a caller; it is
//! escalated through logs and metrics only.

use crate::types::{ActivityId, OrderNumber, RequesterId};
use thiserror::Error;

/// Result type alias for flash-sale operations.
pub type Result<T> = std::result::Result<T, FlashSaleError>;

/// Failure reported by a backing store or other collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Relational store failure (connection, query, transaction).
    #[error("Database error: {0}")]
    Database(String),

    /// Fast key-value store failure.
    #[error("Cache error: {0}")]
    Cache(String),

    /// A uniqueness or optimistic-concurrency constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The addressed row or key does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Stored data could not be decoded into domain types.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Caller-visible error taxonomy.
///
/// Display strings are the messages returned in the `ExecuteFlashSale` envelope.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FlashSaleError {
    // ═══════════════════════════════════════════════════════════
    // Validation
    // ═══════════════════════════════════════════════════════════
    /// No activity with this id.
    #[error("Flash sale activity not found")]
    ActivityNotFound,

    /// The sale window has not started yet.
    #[error("Flash sale has not started yet")]
    ActivityNotYetOpen {
        /// Milliseconds until the sale opens
        wait_millis: i64,
    },

    /// The sale window is over or the activity was disabled.
    #[error("Flash sale has ended")]
    ActivityClosed,

    // ═══════════════════════════════════════════════════════════
    // Admission
    // ═══════════════════════════════════════════════════════════
    /// No stock left at the combined admission step.
    #[error("Sold out")]
    OutOfStock,

    /// The requester already holds a reservation or order for this activity.
    #[error("You have already participated in this flash sale")]
    AlreadyParticipated,

    // ═══════════════════════════════════════════════════════════
    // Persistence
    // ═══════════════════════════════════════════════════════════
    /// A backing store failed. Any reservation taken was compensated.
    #[error("System error, please retry")]
    PersistenceFailure {
        /// Internal cause, never shown to callers
        reason: String,
    },

    // ═══════════════════════════════════════════════════════════
    // Administration and lookup
    // ═══════════════════════════════════════════════════════════
    /// Activity spec failed validation.
    #[error("Invalid activity: {reason}")]
    InvalidActivity {
        /// What was wrong
        reason: String,
    },

    /// Activity references a product the catalog does not know.
    #[error("Product not found")]
    ProductNotFound,

    /// No order with this number, or it belongs to another requester.
    #[error("Order not found")]
    OrderNotFound,

    /// The order is past the point where it may be cancelled.
    #[error("Order can no longer be cancelled")]
    OrderNotCancellable,

    /// Another write kept changing the activity's stock; the update was not applied.
    #[error("Activity was modified concurrently, please retry")]
    ConcurrentUpdate,
}

impl FlashSaleError {
    /// Whether this is a terminal rejection that left no side effects.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::ActivityNotFound
                | Self::ActivityNotYetOpen { .. }
                | Self::ActivityClosed
                | Self::OutOfStock
                | Self::AlreadyParticipated
        )
    }

    /// Remaining wait for `ActivityNotYetOpen`, zero otherwise.
    #[must_use]
    pub const fn wait_millis(&self) -> i64 {
        match self {
            Self::ActivityNotYetOpen { wait_millis } => *wait_millis,
            _ => 0,
        }
    }

    /// Short stable label, used as a metrics dimension.
    #[must_use]
    pub const fn outcome(&self) -> &'static str {
        match self {
            Self::ActivityNotFound => "activity_not_found",
            Self::ActivityNotYetOpen { .. } => "not_yet_open",
            Self::ActivityClosed => "closed",
            Self::OutOfStock => "out_of_stock",
            Self::AlreadyParticipated => "already_participated",
            Self::PersistenceFailure { .. } => "persistence_failure",
            Self::InvalidActivity { .. } => "invalid_activity",
            Self::ProductNotFound => "product_not_found",
            Self::OrderNotFound => "order_not_found",
            Self::OrderNotCancellable => "order_not_cancellable",
            Self::ConcurrentUpdate => "concurrent_update",
        }
    }
}

impl From<StoreError> for FlashSaleError {
    fn from(error: StoreError) -> Self {
        Self::PersistenceFailure {
            reason: error.to_string(),
        }
    }
}

/// Which compensation step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompensationStep {
    /// Removing the partially written order
    DeleteOrder,
    /// Returning the unit to the stock ledger
    RestoreStock,
    /// Clearing the participation mark
    Unmark,
}

impl std::fmt::Display for CompensationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::DeleteOrder => "delete_order",
            Self::RestoreStock => "restore_stock",
            Self::Unmark => "unmark",
        })
    }
}

/// A reservation that could not be fully undone and needs manual reconciliation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error(
    "Compensation incomplete for order {order_number} (activity {activity_id}, requester {requester_id}): {}",
    format_failures(.failures)
)]
pub struct CompensationFailure {
    /// Activity whose reservation leaked
    pub activity_id: ActivityId,
    /// Requester whose reservation leaked
    pub requester_id: RequesterId,
    /// Order number generated for the reservation
    pub order_number: OrderNumber,
    /// Every step that failed, with its cause
    pub failures: Vec<(CompensationStep, StoreError)>,
}

fn format_failures(failures: &[(CompensationStep, StoreError)]) -> String {
    failures
        .iter()
        .map(|(step, error)| format!("{step}: {error}"))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_are_side_effect_free_kinds() {
        assert!(FlashSaleError::OutOfStock.is_rejection());
        assert!(FlashSaleError::ActivityNotYetOpen { wait_millis: 5 }.is_rejection());
        assert!(
            !FlashSaleError::PersistenceFailure {
                reason: "boom".into()
            }
            .is_rejection()
        );
    }

    #[test]
    fn test_persistence_failure_hides_reason() {
        let err: FlashSaleError = StoreError::Database("connection reset".into()).into();
        assert_eq!(err.to_string(), "System error, please retry");
        assert_eq!(err.outcome(), "persistence_failure");
    }

    #[test]
    fn test_wait_millis_only_for_not_yet_open() {
        assert_eq!(
            FlashSaleError::ActivityNotYetOpen { wait_millis: 1000 }.wait_millis(),
            1000
        );
        assert_eq!(FlashSaleError::ActivityClosed.wait_millis(), 0);
    }

    #[test]
    fn test_compensation_failure_display_lists_steps() {
        let failure = CompensationFailure {
            activity_id: ActivityId::new(),
            requester_id: RequesterId::new(),
            order_number: OrderNumber::new("X1"),
            failures: vec![
                (CompensationStep::RestoreStock, StoreError::Cache("down".into())),
                (CompensationStep::Unmark, StoreError::Cache("down".into())),
            ],
        };
        let text = failure.to_string();
        assert!(text.contains("order X1"));
        assert!(text.contains("restore_stock: Cache error: down"));
        assert!(text.contains("unmark: Cache error: down"));
    }
}
