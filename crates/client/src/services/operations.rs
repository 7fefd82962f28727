//! Inventory operations (receipts, deliveries, transfers, adjustments) and movement history.
//!
//! The four operation resources share one REST shape, so each public call is
//! a thin typed wrapper over the private helpers at the bottom of this file.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use stockmaster_shared::{
    Adjustment, AdjustmentFilters, ApiError, CancelRequest, Delivery, DeliveryFilters, Envelope,
    HistoryFilters, Movement, OperationFilters, ProcessRequest, Receipt, ReceiptFilters, Transfer,
    TransferFilters,
};

use super::{query_string, segment};
use crate::api_client::ApiClient;

const RECEIPTS: &str = "receipts";
const DELIVERIES: &str = "deliveries";
const TRANSFERS: &str = "transfers";
const ADJUSTMENTS: &str = "adjustments";

impl ApiClient {
    // --- Receipts ---

    pub async fn get_receipts(
        &self,
        filters: Option<&ReceiptFilters>,
    ) -> Result<Envelope<Vec<Receipt>>, ApiError> {
        self.list_operations(RECEIPTS, filters).await
    }

    pub async fn get_receipt(&self, id: &str) -> Result<Envelope<Receipt>, ApiError> {
        self.get_operation(RECEIPTS, id).await
    }

    pub async fn create_receipt(&self, receipt: &Receipt) -> Result<Envelope<Receipt>, ApiError> {
        self.post_json(&format!("/{RECEIPTS}"), receipt).await
    }

    pub async fn update_receipt(
        &self,
        id: &str,
        receipt: &Receipt,
    ) -> Result<Envelope<Receipt>, ApiError> {
        self.update_operation(RECEIPTS, id, receipt).await
    }

    /// Receive the given items into stock.
    pub async fn process_receipt<I: Serialize>(
        &self,
        id: &str,
        items: &[I],
    ) -> Result<Envelope<Receipt>, ApiError> {
        self.process_operation(RECEIPTS, id, items).await
    }

    pub async fn cancel_receipt(
        &self,
        id: &str,
        reason: Option<&str>,
    ) -> Result<Envelope<Receipt>, ApiError> {
        self.cancel_operation(RECEIPTS, id, reason).await
    }

    // --- Deliveries ---

    pub async fn get_deliveries(
        &self,
        filters: Option<&DeliveryFilters>,
    ) -> Result<Envelope<Vec<Delivery>>, ApiError> {
        self.list_operations(DELIVERIES, filters).await
    }

    pub async fn get_delivery(&self, id: &str) -> Result<Envelope<Delivery>, ApiError> {
        self.get_operation(DELIVERIES, id).await
    }

    pub async fn create_delivery(
        &self,
        delivery: &Delivery,
    ) -> Result<Envelope<Delivery>, ApiError> {
        self.post_json(&format!("/{DELIVERIES}"), delivery).await
    }

    pub async fn update_delivery(
        &self,
        id: &str,
        delivery: &Delivery,
    ) -> Result<Envelope<Delivery>, ApiError> {
        self.update_operation(DELIVERIES, id, delivery).await
    }

    /// Ship the given items out of stock.
    pub async fn process_delivery<I: Serialize>(
        &self,
        id: &str,
        items: &[I],
    ) -> Result<Envelope<Delivery>, ApiError> {
        self.process_operation(DELIVERIES, id, items).await
    }

    pub async fn cancel_delivery(
        &self,
        id: &str,
        reason: Option<&str>,
    ) -> Result<Envelope<Delivery>, ApiError> {
        self.cancel_operation(DELIVERIES, id, reason).await
    }

    // --- Transfers ---

    pub async fn get_transfers(
        &self,
        filters: Option<&TransferFilters>,
    ) -> Result<Envelope<Vec<Transfer>>, ApiError> {
        self.list_operations(TRANSFERS, filters).await
    }

    pub async fn get_transfer(&self, id: &str) -> Result<Envelope<Transfer>, ApiError> {
        self.get_operation(TRANSFERS, id).await
    }

    pub async fn create_transfer(
        &self,
        transfer: &Transfer,
    ) -> Result<Envelope<Transfer>, ApiError> {
        self.post_json(&format!("/{TRANSFERS}"), transfer).await
    }

    pub async fn update_transfer(
        &self,
        id: &str,
        transfer: &Transfer,
    ) -> Result<Envelope<Transfer>, ApiError> {
        self.update_operation(TRANSFERS, id, transfer).await
    }

    pub async fn process_transfer<I: Serialize>(
        &self,
        id: &str,
        items: &[I],
    ) -> Result<Envelope<Transfer>, ApiError> {
        self.process_operation(TRANSFERS, id, items).await
    }

    pub async fn cancel_transfer(
        &self,
        id: &str,
        reason: Option<&str>,
    ) -> Result<Envelope<Transfer>, ApiError> {
        self.cancel_operation(TRANSFERS, id, reason).await
    }

    // --- Stock adjustments (manager only; no update endpoint) ---

    pub async fn get_adjustments(
        &self,
        filters: Option<&AdjustmentFilters>,
    ) -> Result<Envelope<Vec<Adjustment>>, ApiError> {
        self.list_operations(ADJUSTMENTS, filters).await
    }

    pub async fn get_adjustment(&self, id: &str) -> Result<Envelope<Adjustment>, ApiError> {
        self.get_operation(ADJUSTMENTS, id).await
    }

    pub async fn create_adjustment(
        &self,
        adjustment: &Adjustment,
    ) -> Result<Envelope<Adjustment>, ApiError> {
        self.post_json(&format!("/{ADJUSTMENTS}"), adjustment).await
    }

    pub async fn process_adjustment<I: Serialize>(
        &self,
        id: &str,
        items: &[I],
    ) -> Result<Envelope<Adjustment>, ApiError> {
        self.process_operation(ADJUSTMENTS, id, items).await
    }

    pub async fn cancel_adjustment(
        &self,
        id: &str,
        reason: Option<&str>,
    ) -> Result<Envelope<Adjustment>, ApiError> {
        self.cancel_operation(ADJUSTMENTS, id, reason).await
    }

    // --- Movement history ---

    pub async fn get_movement_history(
        &self,
        filters: Option<&HistoryFilters>,
    ) -> Result<Envelope<Vec<Movement>>, ApiError> {
        self.get_json(&format!("/history{}", query_string(filters))).await
    }

    pub async fn get_product_history(
        &self,
        product_id: &str,
    ) -> Result<Envelope<Vec<Movement>>, ApiError> {
        self.get_json(&format!("/history/product/{}", segment(product_id)))
            .await
    }

    pub async fn get_movement_stats(&self) -> Result<Envelope<Value>, ApiError> {
        self.get_json("/history/stats").await
    }

    // --- Shared operation helpers ---

    async fn list_operations<T: DeserializeOwned>(
        &self,
        resource: &str,
        filters: Option<&OperationFilters>,
    ) -> Result<Envelope<Vec<T>>, ApiError> {
        self.get_json(&format!("/{resource}{}", query_string(filters)))
            .await
    }

    async fn get_operation<T: DeserializeOwned>(
        &self,
        resource: &str,
        id: &str,
    ) -> Result<Envelope<T>, ApiError> {
        self.get_json(&format!("/{resource}/{}", segment(id))).await
    }

    async fn update_operation<B: Serialize, T: DeserializeOwned>(
        &self,
        resource: &str,
        id: &str,
        record: &B,
    ) -> Result<Envelope<T>, ApiError> {
        self.put_json(&format!("/{resource}/{}", segment(id)), record)
            .await
    }

    async fn process_operation<I: Serialize, T: DeserializeOwned>(
        &self,
        resource: &str,
        id: &str,
        items: &[I],
    ) -> Result<Envelope<T>, ApiError> {
        self.post_json(
            &format!("/{resource}/{}/process", segment(id)),
            &ProcessRequest { items },
        )
        .await
    }

    async fn cancel_operation<T: DeserializeOwned>(
        &self,
        resource: &str,
        id: &str,
        reason: Option<&str>,
    ) -> Result<Envelope<T>, ApiError> {
        self.post_json(
            &format!("/{resource}/{}/cancel", segment(id)),
            &CancelRequest {
                reason: reason.map(str::to_string),
            },
        )
        .await
    }
}
