//! Application state shared by the handlers.

use flashsale_runtime::FlashSaleService;
use metrics_exporter_prometheus::PrometheusHandle;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// The allocation core
    pub service: FlashSaleService,
    /// Scrape handle for `GET /metrics`; `None` when no recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("service", &self.service)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub const fn new(service: FlashSaleService) -> Self {
        Self {
            service,
            metrics: None,
        }
    }

    /// Serve Prometheus metrics from this handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
