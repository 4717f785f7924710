//! Read-only product catalog lookup.

use crate::StoreFuture;
use crate::types::{ProductId, ProductSummary};

/// Resolves product references. The catalog itself is owned elsewhere.
pub trait ProductCatalog: Send + Sync {
    /// Fetch a product summary, `None` if the product does not exist.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::StoreError) if the backend fails.
    fn product(&self, id: ProductId) -> StoreFuture<'_, Option<ProductSummary>>;
}
