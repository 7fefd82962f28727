//! Product catalog.

use serde_json::Value;
use stockmaster_shared::{ApiError, Envelope, Product, ProductFilters};

use super::{query_string, segment};
use crate::api_client::ApiClient;

impl ApiClient {
    /// List products. The envelope carries `count`, `total`, `page` and `pages`.
    pub async fn get_products(
        &self,
        filters: Option<&ProductFilters>,
    ) -> Result<Envelope<Vec<Product>>, ApiError> {
        self.get_json(&format!("/products{}", query_string(filters))).await
    }

    pub async fn get_product(&self, id: &str) -> Result<Envelope<Product>, ApiError> {
        self.get_json(&format!("/products/{}", segment(id))).await
    }

    /// Create a product (manager only). Unset fields are omitted from the body.
    pub async fn create_product(&self, product: &Product) -> Result<Envelope<Product>, ApiError> {
        self.post_json("/products", product).await
    }

    pub async fn update_product(
        &self,
        id: &str,
        product: &Product,
    ) -> Result<Envelope<Product>, ApiError> {
        self.put_json(&format!("/products/{}", segment(id)), product).await
    }

    pub async fn delete_product(&self, id: &str) -> Result<Envelope<Value>, ApiError> {
        self.delete(&format!("/products/{}", segment(id))).await
    }

    pub async fn get_categories(&self) -> Result<Envelope<Value>, ApiError> {
        self.get_json("/products/categories/list").await
    }

    /// Products at or below their reorder level.
    pub async fn get_low_stock_products(&self) -> Result<Envelope<Vec<Product>>, ApiError> {
        self.get_json("/products/alerts/low-stock").await
    }

    pub async fn get_out_of_stock_products(&self) -> Result<Envelope<Vec<Product>>, ApiError> {
        self.get_json("/products/alerts/out-of-stock").await
    }
}
