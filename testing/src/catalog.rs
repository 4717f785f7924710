//! In-memory product catalog.

use flashsale_core::{Money, ProductCatalog, ProductId, ProductSummary, StoreFuture};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// [`ProductCatalog`] backed by a `HashMap`. Clones share the same products.
#[derive(Clone, Debug, Default)]
pub struct StaticProductCatalog {
    products: Arc<RwLock<HashMap<ProductId, ProductSummary>>>,
}

impl StaticProductCatalog {
    /// Create an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new product and return it
    pub fn add(&self, name: &str, list_price: Money) -> ProductSummary {
        let product = ProductSummary {
            id: ProductId::new(),
            name: name.to_string(),
            list_price,
        };
        self.insert(product.clone());
        product
    }

    /// Register an existing product summary
    pub fn insert(&self, product: ProductSummary) {
        self.products.write().unwrap().insert(product.id, product);
    }

    /// Remove a product
    pub fn remove(&self, id: ProductId) {
        self.products.write().unwrap().remove(&id);
    }
}

impl ProductCatalog for StaticProductCatalog {
    fn product(&self, id: ProductId) -> StoreFuture<'_, Option<ProductSummary>> {
        let product = self.products.read().unwrap().get(&id).cloned();
        Box::pin(std::future::ready(Ok(product)))
    }
}
