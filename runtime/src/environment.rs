//! Injected collaborators and runtime settings.

use flashsale_core::environment::Clock;
use flashsale_core::{
    ActivityStore, AdmissionGate, OrderNumberGenerator, OrderRecorder, ProductCatalog,
};
use std::sync::Arc;
use std::time::Duration;

/// Tunables for the allocation core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlashSaleSettings {
    /// Deadline for the durable order write. On expiry the reservation is compensated.
    pub persist_timeout: Duration,
    /// How long fast-store entries outlive the activity's end.
    pub expiry_margin: Duration,
    /// Look-ahead window for upcoming activities.
    pub upcoming_horizon: chrono::Duration,
}

impl Default for FlashSaleSettings {
    fn default() -> Self {
        Self {
            persist_timeout: Duration::from_millis(2000),
            expiry_margin: Duration::from_secs(24 * 3600),
            upcoming_horizon: chrono::Duration::hours(24),
        }
    }
}

/// Everything the coordinator, compensator and admin talk to.
///
/// Production wires Postgres and Redis implementations; tests wire the in-memory
/// ones from `flashsale-testing`.
#[derive(Clone)]
pub struct FlashSaleEnvironment {
    /// Durable activities
    pub activities: Arc<dyn ActivityStore>,
    /// Durable orders
    pub orders: Arc<dyn OrderRecorder>,
    /// Stock ledger + participation guard
    pub gate: Arc<dyn AdmissionGate>,
    /// Order number source
    pub order_numbers: Arc<dyn OrderNumberGenerator>,
    /// Product lookup
    pub catalog: Arc<dyn ProductCatalog>,
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Tunables
    pub settings: FlashSaleSettings,
}

impl std::fmt::Debug for FlashSaleEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlashSaleEnvironment")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
