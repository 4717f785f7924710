//! # Flash Sale Testing
//!
//! Testing utilities for the flash-sale core.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`MutableClock`])
//! - [`InMemoryFlashSaleStore`]: activities and orders with failure injection
//! - [`StaticProductCatalog`]: in-memory product lookup
//! - [`FlakyAdmissionGate`]: wraps a gate and fails selected primitives
//! - [`TestBed`]: a fully wired in-memory `FlashSaleService`
//! - [`properties`]: proptest strategies
//!
//! ## Example
//!
//! ```
//! use flashsale_core::{PaymentMethod, RequesterId};
//! use flashsale_testing::TestBed;
//!
//! # tokio_test::block_on(async {
//! let bed = TestBed::new();
//! let activity = bed.open_activity(1).await;
//!
//! let result = bed
//!     .service
//!     .execute_flash_sale(RequesterId::new(), activity.id, PaymentMethod::Alipay)
//!     .await;
//! assert!(result.success);
//! # });
//! ```

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities panic only on poisoned locks

use chrono::{DateTime, Utc};
use flashsale_core::environment::Clock;

pub mod catalog;
pub mod gate;
pub mod harness;
pub mod store;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, Mutex};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use flashsale_testing::mocks::FixedClock;
    /// use flashsale_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that tests move explicitly. Clones share the same time.
    #[derive(Debug, Clone)]
    pub struct MutableClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl MutableClock {
        /// Create a clock starting at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Jump to `time`
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.lock().unwrap() = time;
        }

        /// Move forward (or backward, with a negative duration)
        pub fn advance(&self, by: chrono::Duration) {
            *self.time.lock().unwrap() += by;
        }
    }

    impl Clock for MutableClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap()
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_epoch())
    }

    /// 2025-01-01 00:00:00 UTC
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_epoch() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc)
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use flashsale_core::PaymentMethod;
    use proptest::prelude::*;

    /// Any payment method
    pub fn payment_method() -> impl Strategy<Value = PaymentMethod> {
        prop_oneof![
            Just(PaymentMethod::Alipay),
            Just(PaymentMethod::WechatPay),
            Just(PaymentMethod::BankTransfer),
            Just(PaymentMethod::CashOnDelivery),
        ]
    }

    /// A burst of requests as indices into a pool of `requesters` requesters.
    ///
    /// Indices repeat, so the same requester retries within a burst.
    pub fn request_burst(
        requesters: usize,
        max_len: usize,
    ) -> impl Strategy<Value = Vec<usize>> {
        prop::collection::vec(0..requesters.max(1), 1..=max_len.max(1))
    }
}

/// Install a test tracing subscriber once (respects `RUST_LOG`).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use catalog::StaticProductCatalog;
pub use gate::FlakyAdmissionGate;
pub use harness::TestBed;
pub use mocks::{FixedClock, MutableClock, test_clock, test_epoch};
pub use store::{CreateFault, InMemoryFlashSaleStore};
