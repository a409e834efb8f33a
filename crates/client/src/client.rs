//! Typed client for the Parcel Desk JSON API.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, de::DeserializeOwned};
use tracing::instrument;
use url::Url;

use parcel_desk_core::api::{
    CollectOrderRequest, CreatedOrderResponse, ErrorResponse, ExpectOrderRequest, MessageResponse,
    MyOrdersResponse, OrderResponse, ProfileRequest, ProfileResponse, PromoteRequest,
    PromoteResponse, RetrieveOrderRequest, RetrieveResponse, SecuritiesResponse, StatsResponse,
    VerifiedOrdersResponse,
};
use parcel_desk_core::{Order, OrderId, Profile, UserId, VerifiedOrder};

use crate::error::ClientError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client bound to one API base URL and one caller's token.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    token: SecretString,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client for `base_url`, authenticating as `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not parse or the HTTP client cannot
    /// be built.
    pub fn new(base_url: &str, token: SecretString) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(base_url)?;
        // Url::join replaces the last segment unless the path ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// The caller's own orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects it.
    #[instrument(skip(self))]
    pub async fn my_orders(&self) -> Result<Vec<Order>, ClientError> {
        let body: MyOrdersResponse = self.send(self.request(Method::GET, "orders")?).await?;
        Ok(body.orders)
    }

    /// Register an expected delivery.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects it.
    #[instrument(skip(self))]
    pub async fn expect_order(
        &self,
        order_tracking_id: &str,
        expected_date: &str,
    ) -> Result<CreatedOrderResponse, ClientError> {
        let body = ExpectOrderRequest {
            order_tracking_id: Some(order_tracking_id.to_owned()),
            expected_date: Some(expected_date.to_owned()),
        };
        self.send_json(Method::POST, "orders/expect", &body).await
    }

    /// Verify an order with its one-time code (handover deployments).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects it.
    #[instrument(skip(self, otp))]
    pub async fn verify_with_otp(&self, otp: &str) -> Result<RetrieveResponse, ClientError> {
        let body = RetrieveOrderRequest {
            order_tracking_id: None,
            otp: Some(otp.to_owned()),
        };
        self.send_json(Method::POST, "orders/retrieve", &body).await
    }

    /// Retrieve an order by tracking id (single-step deployments).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects it.
    #[instrument(skip(self))]
    pub async fn retrieve_by_tracking(
        &self,
        order_tracking_id: &str,
    ) -> Result<RetrieveResponse, ClientError> {
        let body = RetrieveOrderRequest {
            order_tracking_id: Some(order_tracking_id.to_owned()),
            otp: None,
        };
        self.send_json(Method::POST, "orders/retrieve", &body).await
    }

    /// Orders waiting at the security desk.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects it.
    #[instrument(skip(self))]
    pub async fn verified_orders(&self) -> Result<Vec<VerifiedOrder>, ClientError> {
        let body: VerifiedOrdersResponse = self
            .send(self.request(Method::GET, "orders/verified")?)
            .await?;
        Ok(body.orders)
    }

    /// Hand a verified order over to its owner.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects it.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn collect(&self, order_id: OrderId) -> Result<Order, ClientError> {
        let body = CollectOrderRequest {
            order_id: Some(order_id.to_string()),
        };
        let response: OrderResponse = self.send_json(Method::POST, "orders/collect", &body).await?;
        Ok(response.order)
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// The caller's profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or no profile exists yet.
    pub async fn profile(&self) -> Result<Profile, ClientError> {
        let body: ProfileResponse = self.send(self.request(Method::GET, "profile")?).await?;
        Ok(body.profile)
    }

    /// Complete or edit the caller's sign-up details.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects it.
    pub async fn save_profile(
        &self,
        username: &str,
        room_number: &str,
    ) -> Result<Profile, ClientError> {
        let body = ProfileRequest {
            username: Some(username.to_owned()),
            room_number: Some(room_number.to_owned()),
        };
        let response: ProfileResponse = self.send_json(Method::POST, "profile", &body).await?;
        Ok(response.profile)
    }

    // =========================================================================
    // Admin
    // =========================================================================

    /// Security guards, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the caller is not an admin.
    pub async fn securities(&self) -> Result<Vec<Profile>, ClientError> {
        let body: SecuritiesResponse = self
            .send(self.request(Method::GET, "admin/securities")?)
            .await?;
        Ok(body.securities)
    }

    /// Promote a user to security by username.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects it.
    #[instrument(skip(self))]
    pub async fn promote(&self, username: &str) -> Result<PromoteResponse, ClientError> {
        let body = PromoteRequest {
            username: Some(username.to_owned()),
        };
        self.send_json(Method::POST, "admin/securities", &body).await
    }

    /// Demote a security guard back to user.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects it.
    #[instrument(skip(self), fields(target = %user_id))]
    pub async fn demote(&self, user_id: UserId) -> Result<MessageResponse, ClientError> {
        let mut url = self.base_url.join("admin/securities")?;
        url.query_pairs_mut()
            .append_pair("userId", &user_id.to_string());
        let request = self
            .http
            .delete(url)
            .bearer_auth(self.token.expose_secret());
        self.send(request).await
    }

    /// Counts by order status and profile role.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the caller is not an admin.
    pub async fn stats(&self) -> Result<StatsResponse, ClientError> {
        self.send(self.request(Method::GET, "admin/stats")?).await
    }

    // =========================================================================
    // Plumbing
    // =========================================================================

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let url = self.base_url.join(path)?;
        Ok(self
            .http
            .request(method, url)
            .bearer_auth(self.token.expose_secret()))
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        self.send(self.request(method, path)?.json(body)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

/// Turn a non-success response into [`ClientError::Api`], preferring the
/// server's `{"error": ...}` message over the raw body.
async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.error)
        .unwrap_or(body);

    tracing::debug!(status = status.as_u16(), %message, "API request failed");
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}
