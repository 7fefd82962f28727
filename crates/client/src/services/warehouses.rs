//! Warehouses.

use serde_json::Value;
use stockmaster_shared::{ApiError, Envelope, Warehouse};

use super::segment;
use crate::api_client::ApiClient;

impl ApiClient {
    pub async fn get_warehouses(&self) -> Result<Envelope<Vec<Warehouse>>, ApiError> {
        self.get_json("/warehouses").await
    }

    pub async fn get_warehouse(&self, id: &str) -> Result<Envelope<Warehouse>, ApiError> {
        self.get_json(&format!("/warehouses/{}", segment(id))).await
    }

    pub async fn create_warehouse(
        &self,
        warehouse: &Warehouse,
    ) -> Result<Envelope<Warehouse>, ApiError> {
        self.post_json("/warehouses", warehouse).await
    }

    pub async fn update_warehouse(
        &self,
        id: &str,
        warehouse: &Warehouse,
    ) -> Result<Envelope<Warehouse>, ApiError> {
        self.put_json(&format!("/warehouses/{}", segment(id)), warehouse).await
    }

    pub async fn delete_warehouse(&self, id: &str) -> Result<Envelope<Value>, ApiError> {
        self.delete(&format!("/warehouses/{}", segment(id))).await
    }
}
