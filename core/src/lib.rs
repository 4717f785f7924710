//! # Flash Sale Core
//!
//! Domain types, error taxonomy and collaborator traits for the flash-sale
//! allocation core.
//!
//! A flash sale hands out a small, fixed number of units to a very large number
//! of concurrent requesters during a short window. This crate defines *what* the
//! allocation core talks to; the coordinator that drives it lives in
//! `flashsale-runtime` and the backends live in their own crates.
//!
//! ## Collaborators
//!
//! - [`ActivityStore`]: durable activities and their durable stock counter
//! - [`StockLedger`] / [`ParticipationGuard`]: fast shared state, fused by
//!   [`AdmissionGate`] into one indivisible admission decision
//! - [`OrderRecorder`]: transactional order insert + durable decrement
//! - [`OrderNumberGenerator`]: globally unique order numbers
//! - [`ProductCatalog`]: read-only product lookup
//! - [`environment::Clock`]: time source
//!
//! Every async collaborator returns a boxed future ([`StoreFuture`]) so it can be
//! injected as `Arc<dyn Trait>`.

use std::future::Future;
use std::pin::Pin;

pub mod activity_store;
pub mod catalog;
pub mod error;
pub mod ledger;
pub mod orders;
pub mod types;

pub use activity_store::{ActivityStore, StockDelta};
pub use catalog::ProductCatalog;
pub use error::{CompensationFailure, CompensationStep, FlashSaleError, StoreError};
pub use ledger::{
    Admission, AdmissionGate, MarkOutcome, ParticipationGuard, ReserveOutcome, StockLedger,
};
pub use orders::{OrderNumberGenerator, OrderRecorder};
pub use types::*;

/// Boxed future returned by every store collaborator.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Environment traits shared by every layer.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use flashsale_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let _now = clock.now();
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
