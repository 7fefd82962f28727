//! Authentication and staff management.

use serde_json::Value;
use stockmaster_shared::{
    ApiError, Envelope, LoginData, LoginRequest, RegisterRequest, RequestOtpRequest,
    ResetPasswordRequest, StaffStatusUpdate, User, VerifyOtpRequest,
};

use super::segment;
use crate::api_client::ApiClient;

impl ApiClient {
    /// Log in. On success the token and user profile are persisted for later requests.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<Envelope<LoginData>, ApiError> {
        let envelope: Envelope<LoginData> = self.post_json("/auth/login", credentials).await?;

        if envelope.success {
            if let Some(data) = envelope.data.as_ref() {
                self.session().set_token(Some(&data.token));
                self.session().set_user(&data.user);
                crate::log_info!("Logged in as {}", data.user.email.as_deref().unwrap_or("<unknown>"));
            }
        }

        Ok(envelope)
    }

    /// Create an account (managers create staff accounts).
    pub async fn register(&self, request: &RegisterRequest) -> Result<Envelope<User>, ApiError> {
        self.post_json("/auth/register", request).await
    }

    /// Ask for a password-reset one-time code.
    pub async fn request_otp(&self, request: &RequestOtpRequest) -> Result<Envelope<Value>, ApiError> {
        self.post_json("/auth/request-otp", request).await
    }

    pub async fn verify_otp(&self, request: &VerifyOtpRequest) -> Result<Envelope<Value>, ApiError> {
        self.post_json("/auth/verify-otp", request).await
    }

    pub async fn reset_password(
        &self,
        request: &ResetPasswordRequest,
    ) -> Result<Envelope<Value>, ApiError> {
        self.post_json("/auth/reset-password", request).await
    }

    /// Profile of the signed-in user, fetched from the server.
    pub async fn get_current_user(&self) -> Result<Envelope<User>, ApiError> {
        self.get_json("/auth/me").await
    }

    /// All warehouse staff accounts (manager only).
    pub async fn get_warehouse_staff(&self) -> Result<Envelope<Vec<User>>, ApiError> {
        self.get_json("/auth/staff").await
    }

    pub async fn update_staff_status(
        &self,
        staff_id: &str,
        is_active: bool,
    ) -> Result<Envelope<User>, ApiError> {
        self.put_json(
            &format!("/auth/staff/{}/status", segment(staff_id)),
            &StaffStatusUpdate { is_active },
        )
        .await
    }

    pub async fn delete_staff(&self, staff_id: &str) -> Result<Envelope<Value>, ApiError> {
        self.delete(&format!("/auth/staff/{}", segment(staff_id))).await
    }

    /// Forget the stored token and profile. No request is sent.
    pub fn logout(&self) {
        self.session().clear();
        crate::log_info!("Logged out");
    }

    /// Profile persisted at login, without a round trip.
    pub fn stored_user(&self) -> Option<User> {
        self.session().user()
    }
}
