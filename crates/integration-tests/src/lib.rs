//! Shared harness for Parcel Desk end-to-end tests.
//!
//! [`TestApp`] builds the full router over an in-memory store with rate
//! limiting off, mints bearer tokens the way the identity provider does, and
//! can either drive the router in-process or serve it on a real listener.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p parcel-desk-integration-tests
//!
//! # Including the PostgreSQL store tests
//! PARCEL_TEST_DATABASE_URL=postgres://... cargo test -p parcel-desk-integration-tests -- --ignored
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use jsonwebtoken::{EncodingKey, Header};
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

use parcel_desk_core::{RetrievalFlow, Role, RoomNumber, UserId, Username};
use parcel_desk_server::config::{
    AuthConfig, DEFAULT_JWT_AUDIENCE, ServerConfig, StoreBackend,
};
use parcel_desk_server::db::{MemoryStore, NewProfile, ProfileStore};
use parcel_desk_server::services::auth::{Claims, UserMetadata};
use parcel_desk_server::state::AppState;

/// Signing secret shared by the test server and the token minting helpers.
pub const TEST_JWT_SECRET: &str = "kq8Zr2vLx9Tn4Wb7Yc1Hd6Jf3Mg5Ps0Q";

/// A signed-in test identity.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub user_id: UserId,
    pub token: String,
}

/// The router over a fresh in-memory store.
pub struct TestApp {
    pub router: axum::Router,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    /// A handover deployment.
    #[must_use]
    pub fn new() -> Self {
        Self::with_flow(RetrievalFlow::Handover)
    }

    /// A deployment with the given retrieval flow.
    #[must_use]
    pub fn with_flow(flow: RetrievalFlow) -> Self {
        let store = Arc::new(MemoryStore::new());
        let config = ServerConfig {
            database_url: None,
            host: Ipv4Addr::LOCALHOST.into(),
            port: 0,
            auth: AuthConfig {
                jwt_secret: SecretString::from(TEST_JWT_SECRET),
                audience: DEFAULT_JWT_AUDIENCE.to_owned(),
            },
            retrieval_flow: flow,
            store: StoreBackend::Memory,
            rate_limit_enabled: false,
            sentry_dsn: None,
            sentry_environment: None,
        };
        let state = AppState::new(config, store.clone());
        Self {
            router: parcel_desk_server::app(state),
            store,
        }
    }

    /// A user with a profile and the given role.
    pub async fn user(&self, username: &str, room: &str, role: Role) -> TestUser {
        let user_id = UserId::generate();
        self.store
            .insert_profile_if_absent(&NewProfile {
                user_id,
                username: Username::parse(username).unwrap(),
                room_number: RoomNumber::parse(room).unwrap(),
            })
            .await
            .unwrap();
        if role != Role::User {
            self.store.force_role(user_id, role).await.unwrap();
        }
        TestUser {
            user_id,
            token: mint_token(user_id, None),
        }
    }

    /// Send one request through the router and decode the JSON response.
    /// A non-JSON or empty body decodes as `Value::Null`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get(&self, path: &str, user: &TestUser) -> (StatusCode, Value) {
        self.request(Method::GET, path, Some(&user.token), None).await
    }

    pub async fn post(&self, path: &str, user: &TestUser, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, path, Some(&user.token), Some(body))
            .await
    }

    /// Serve the router on an ephemeral local port; returns its base URL.
    pub async fn serve(&self) -> String {
        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let router = self.router.clone();
        tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });
        format!("http://{addr}")
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Mint an HS256 token for `user_id`, valid for an hour.
#[must_use]
pub fn mint_token(user_id: UserId, metadata: Option<UserMetadata>) -> String {
    let claims = Claims {
        sub: user_id,
        exp: chrono::Utc::now().timestamp() + 3600,
        aud: DEFAULT_JWT_AUDIENCE.to_owned(),
        email: Some(format!("{user_id}@hostel.test")),
        user_metadata: metadata,
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

/// Token for an identity that has no profile, optionally carrying sign-up
/// metadata.
#[must_use]
pub fn new_identity(signup: Option<(&str, &str)>) -> TestUser {
    let user_id = UserId::generate();
    let metadata = signup.map(|(username, room)| UserMetadata {
        username: Some(username.to_owned()),
        room_number: Some(room.to_owned()),
    });
    TestUser {
        user_id,
        token: mint_token(user_id, metadata),
    }
}

/// The `error` field of an error body.
#[must_use]
pub fn error_message(body: &Value) -> &str {
    body["error"].as_str().unwrap_or_default()
}
