//! Product lookups against the `products` table.

use crate::rows::{ProductRow, db_error};
use flashsale_core::{ProductCatalog, ProductId, ProductSummary, StoreFuture};
use sqlx::PgPool;

/// Read-only view of the product catalog.
#[derive(Clone, Debug)]
pub struct PostgresProductCatalog {
    pool: PgPool,
}

impl PostgresProductCatalog {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ProductCatalog for PostgresProductCatalog {
    fn product(&self, id: ProductId) -> StoreFuture<'_, Option<ProductSummary>> {
        Box::pin(async move {
            let row: Option<ProductRow> =
                sqlx::query_as("SELECT id, name, list_price_cents FROM products WHERE id = $1")
                    .bind(id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(db_error("get product"))?;

            row.map(ProductSummary::try_from).transpose()
        })
    }
}
