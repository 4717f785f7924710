//! Fully wired in-memory flash-sale service.

use crate::catalog::StaticProductCatalog;
use crate::gate::FlakyAdmissionGate;
use crate::mocks::{MutableClock, test_epoch};
use crate::store::InMemoryFlashSaleStore;
use flashsale_core::environment::Clock;
use flashsale_core::{Activity, ActivitySpec, Money, ProductSummary};
use flashsale_runtime::{
    FlashSaleEnvironment, FlashSaleService, FlashSaleSettings, InMemoryAdmissionGate,
    SequencedOrderNumbers,
};
use std::sync::Arc;

/// In-memory service plus handles to every collaborator for assertions and
/// fault injection.
#[derive(Debug, Clone)]
pub struct TestBed {
    /// Service under test
    pub service: FlashSaleService,
    /// Durable activities and orders
    pub store: InMemoryFlashSaleStore,
    /// Gate seen by the service
    pub gate: Arc<FlakyAdmissionGate>,
    /// Gate underneath the fault switches
    pub ledger: Arc<InMemoryAdmissionGate>,
    /// Products
    pub catalog: StaticProductCatalog,
    /// Time, starting at 2025-01-01 00:00:00 UTC
    pub clock: MutableClock,
}

impl Default for TestBed {
    fn default() -> Self {
        Self::new()
    }
}

impl TestBed {
    /// Wire a service with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(FlashSaleSettings::default())
    }

    /// Wire a service with custom settings
    #[must_use]
    pub fn with_settings(settings: FlashSaleSettings) -> Self {
        let clock = MutableClock::new(test_epoch());
        let store = InMemoryFlashSaleStore::new();
        let catalog = StaticProductCatalog::new();
        let ledger = Arc::new(InMemoryAdmissionGate::new(Arc::new(clock.clone())));
        let gate = Arc::new(FlakyAdmissionGate::new(ledger.clone()));

        let env = FlashSaleEnvironment {
            activities: Arc::new(store.clone()),
            orders: Arc::new(store.clone()),
            gate: gate.clone(),
            order_numbers: Arc::new(SequencedOrderNumbers::starting_at(1, 0)),
            catalog: Arc::new(catalog.clone()),
            clock: Arc::new(clock.clone()),
            settings,
        };

        Self {
            service: FlashSaleService::new(env),
            store,
            gate,
            ledger,
            catalog,
            clock,
        }
    }

    /// Register a product
    pub fn product(&self) -> ProductSummary {
        self.catalog.add("Limited Edition Sneakers", Money::from_cents(129_900))
    }

    /// Spec for a live activity: opened an hour ago, closes in an hour
    #[must_use]
    pub fn live_spec(&self, product: &ProductSummary, stock: u32) -> ActivitySpec {
        let now = self.clock.now();
        ActivitySpec {
            product_id: product.id,
            sale_price: Money::from_cents(9_900),
            total_stock: stock,
            start_time: now - chrono::Duration::hours(1),
            end_time: now + chrono::Duration::hours(1),
            active: true,
        }
    }

    /// Create a live activity with `stock` units through the admin path
    pub async fn open_activity(&self, stock: u32) -> Activity {
        let product = self.product();
        self.service
            .create_activity(self.live_spec(&product, stock))
            .await
            .unwrap()
    }
}
