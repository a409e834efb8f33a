//! Order lifecycle engine.
//!
//! Legal moves are `expected -> verified -> collected` (handover flow) and
//! `expected -> retrieved` (single-step flow). Each move is one conditional
//! write through [`OrderStore::transition_order`]; when the row is missing,
//! owned by someone else, or in another state, the write matches nothing
//! and the caller sees a single not-found error.

use chrono::{NaiveDate, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::instrument;

use parcel_desk_core::api::{CollectOrderRequest, ExpectOrderRequest, RetrieveOrderRequest};
use parcel_desk_core::{
    Order, OrderId, Otp, RetrievalFlow, TrackingId, Transition, UserId, VerifiedOrder,
};

use crate::db::{NewOrder, OrderSelector, OrderStore, RepositoryError, Store};

/// Fresh codes tried before giving up on an insert.
const MAX_OTP_ATTEMPTS: usize = 5;

/// Errors from lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("You already have an expected order with this tracking ID")]
    DuplicateActive,

    /// Owner-side transition matched no row.
    #[error(
        "No expected order found for your account. Either the order doesn't exist, \
         has already been retrieved, or belongs to another user."
    )]
    NoExpectedOrder,

    /// Collect matched no row.
    #[error("No verified order found with this ID")]
    NoVerifiedOrder,

    #[error("could not issue a unique verification code")]
    OtpExhausted,

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// A freshly registered order.
#[derive(Debug, Clone)]
pub struct CreatedOrder {
    pub order: Order,
    /// Plaintext code, returned to the owner exactly once.
    pub otp: Option<Otp>,
}

/// Hex SHA-256 of a one-time code; the only form that is stored.
#[must_use]
pub fn otp_digest(otp: &Otp) -> String {
    hex::encode(Sha256::digest(otp.expose().as_bytes()))
}

fn generate_otp() -> Result<Otp, LifecycleError> {
    let n: u32 = rand::rng().random_range(0..1_000_000);
    Otp::from_number(n).ok_or(LifecycleError::OtpExhausted)
}

/// Read a required, trimmed, non-empty string field.
fn required<'r>(value: Option<&'r str>, message: &str) -> Result<&'r str, LifecycleError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| LifecycleError::InvalidInput(message.to_owned()))
}

/// Order lifecycle operations over a [`Store`].
pub struct OrderLifecycle<'a> {
    store: &'a dyn Store,
    flow: RetrievalFlow,
}

impl<'a> OrderLifecycle<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store, flow: RetrievalFlow) -> Self {
        Self { store, flow }
    }

    /// Register an expected delivery for `owner`.
    ///
    /// In the handover flow a one-time code is issued and its digest stored.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for a missing or malformed tracking id or date
    /// - `DuplicateActive` if the owner already has this tracking id in
    ///   status `expected`
    #[instrument(skip(self, req), fields(user_id = %owner))]
    pub async fn create(
        &self,
        owner: UserId,
        req: &ExpectOrderRequest,
    ) -> Result<CreatedOrder, LifecycleError> {
        const MISSING: &str = "Order tracking ID and expected date are required";
        let tracking = required(req.order_tracking_id.as_deref(), MISSING)?;
        let date = required(req.expected_date.as_deref(), MISSING)?;

        let tracking =
            TrackingId::parse(tracking).map_err(|e| LifecycleError::InvalidInput(e.to_string()))?;
        let expected_date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
            LifecycleError::InvalidInput("Expected date must be formatted YYYY-MM-DD".to_owned())
        })?;

        for attempt in 1..=MAX_OTP_ATTEMPTS {
            let otp = if self.flow.issues_otp() {
                Some(generate_otp()?)
            } else {
                None
            };
            let new = NewOrder {
                id: OrderId::generate(),
                user_id: owner,
                order_tracking_id: tracking.clone(),
                expected_date,
                otp_digest: otp.as_ref().map(otp_digest),
                created_at: Utc::now(),
            };

            match self.store.insert_order(&new).await {
                Ok(order) => {
                    tracing::info!(order_id = %order.id, "Order registered");
                    return Ok(CreatedOrder { order, otp });
                }
                Err(RepositoryError::DuplicateActiveOrder) => {
                    return Err(LifecycleError::DuplicateActive);
                }
                Err(RepositoryError::OtpCollision) => {
                    tracing::debug!(attempt, "Verification code collision, reissuing");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(LifecycleError::OtpExhausted)
    }

    /// The owner's side of the handover: verify with the one-time code, or
    /// retrieve by tracking id in single-step deployments.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the body lacks the field this flow reads, or the
    ///   code is not six digits
    /// - `NoExpectedOrder` if no `expected` order of the owner matches
    #[instrument(skip(self, req), fields(user_id = %owner, flow = %self.flow))]
    pub async fn retrieve(
        &self,
        owner: UserId,
        req: &RetrieveOrderRequest,
    ) -> Result<Order, LifecycleError> {
        let selector = match self.flow {
            RetrievalFlow::Handover => {
                let raw = required(req.otp.as_deref(), "Verification code is required")?;
                let otp =
                    Otp::parse(raw).map_err(|e| LifecycleError::InvalidInput(e.to_string()))?;
                OrderSelector::OwnedOtp {
                    owner,
                    otp_digest: otp_digest(&otp),
                }
            }
            RetrievalFlow::SingleStep => {
                let raw = required(req.order_tracking_id.as_deref(), "Order tracking ID is required")?;
                let tracking = TrackingId::parse(raw)
                    .map_err(|e| LifecycleError::InvalidInput(e.to_string()))?;
                OrderSelector::OwnedTracking { owner, tracking }
            }
        };

        let order = self
            .store
            .transition_order(&selector, self.flow.owner_transition(), Utc::now())
            .await?
            .ok_or(LifecycleError::NoExpectedOrder)?;

        tracing::info!(order_id = %order.id, status = %order.status, "Order claimed by owner");
        Ok(order)
    }

    /// Security hands a verified order over.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the order id is missing
    /// - `NoVerifiedOrder` if the id is malformed, unknown, or the order is
    ///   not `verified` (including a second collect of the same order)
    #[instrument(skip(self, req))]
    pub async fn collect(&self, req: &CollectOrderRequest) -> Result<Order, LifecycleError> {
        let raw = required(req.order_id.as_deref(), "Order ID is required")?;
        let Ok(order_id) = raw.parse::<OrderId>() else {
            return Err(LifecycleError::NoVerifiedOrder);
        };

        let order = self
            .store
            .transition_order(&OrderSelector::Id(order_id), Transition::Collect, Utc::now())
            .await?
            .ok_or(LifecycleError::NoVerifiedOrder)?;

        tracing::info!(order_id = %order.id, "Order collected");
        Ok(order)
    }

    /// The owner's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::Repository` if the store fails.
    pub async fn list_for_owner(&self, owner: UserId) -> Result<Vec<Order>, LifecycleError> {
        Ok(self.store.list_orders_for_owner(owner).await?)
    }

    /// Orders awaiting handover, most recently verified first.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::Repository` if the store fails.
    pub async fn list_verified(&self) -> Result<Vec<VerifiedOrder>, LifecycleError> {
        Ok(self.store.list_verified_orders().await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use parcel_desk_core::OrderStatus;

    use super::*;
    use crate::db::MemoryStore;

    fn expect_req(tracking: &str, date: &str) -> ExpectOrderRequest {
        ExpectOrderRequest {
            order_tracking_id: Some(tracking.to_owned()),
            expected_date: Some(date.to_owned()),
        }
    }

    fn otp_req(otp: &str) -> RetrieveOrderRequest {
        RetrieveOrderRequest {
            order_tracking_id: None,
            otp: Some(otp.to_owned()),
        }
    }

    fn collect_req(id: &str) -> CollectOrderRequest {
        CollectOrderRequest {
            order_id: Some(id.to_owned()),
        }
    }

    #[test]
    fn test_otp_digest_is_hex_sha256() {
        let otp = Otp::parse("123456").unwrap();
        assert_eq!(
            otp_digest(&otp),
            "8d969eef6ecad3c29a3a629280e686cf0c3f5d5a86aff3ca12020c923adc6c92"
        );
    }

    #[test]
    fn test_generated_codes_are_six_digits() {
        for _ in 0..100 {
            let otp = generate_otp().unwrap();
            assert_eq!(otp.expose().len(), 6);
        }
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let store = MemoryStore::new();
        let engine = OrderLifecycle::new(&store, RetrievalFlow::Handover);
        let owner = UserId::generate();

        for req in [
            ExpectOrderRequest::default(),
            expect_req("   ", "2025-06-01"),
            expect_req("AWB123", ""),
            expect_req("AWB123", "01/06/2025"),
            expect_req(&"X".repeat(129), "2025-06-01"),
        ] {
            assert!(matches!(
                engine.create(owner, &req).await,
                Err(LifecycleError::InvalidInput(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_handover_flow_end_to_end() {
        let store = MemoryStore::new();
        let engine = OrderLifecycle::new(&store, RetrievalFlow::Handover);
        let owner = UserId::generate();

        let created = engine
            .create(owner, &expect_req("AWB123", "2025-06-01"))
            .await
            .unwrap();
        assert_eq!(created.order.status, OrderStatus::Expected);
        let otp = created.otp.unwrap();

        let verified = engine.retrieve(owner, &otp_req(otp.expose())).await.unwrap();
        assert_eq!(verified.status, OrderStatus::Verified);
        assert!(verified.verified_at.is_some());

        // The code is spent.
        assert!(matches!(
            engine.retrieve(owner, &otp_req(otp.expose())).await,
            Err(LifecycleError::NoExpectedOrder)
        ));

        let listed = engine.list_verified().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.order.id);

        let collected = engine
            .collect(&collect_req(&created.order.id.to_string()))
            .await
            .unwrap();
        assert_eq!(collected.status, OrderStatus::Collected);
        assert!(collected.collected_at.is_some());
        assert!(engine.list_verified().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_owner_and_wrong_code_look_the_same() {
        let store = MemoryStore::new();
        let engine = OrderLifecycle::new(&store, RetrievalFlow::Handover);
        let owner = UserId::generate();
        let created = engine
            .create(owner, &expect_req("AWB123", "2025-06-01"))
            .await
            .unwrap();
        let code = created.otp.unwrap();
        let wrong = if code.expose() == "000000" { "000001" } else { "000000" };

        let stolen = engine
            .retrieve(UserId::generate(), &otp_req(code.expose()))
            .await
            .unwrap_err();
        let guessed = engine.retrieve(owner, &otp_req(wrong)).await.unwrap_err();
        assert_eq!(stolen.to_string(), guessed.to_string());
        assert!(matches!(stolen, LifecycleError::NoExpectedOrder));
    }

    #[tokio::test]
    async fn test_malformed_code_is_invalid_input() {
        let store = MemoryStore::new();
        let engine = OrderLifecycle::new(&store, RetrievalFlow::Handover);
        let owner = UserId::generate();

        assert!(matches!(
            engine.retrieve(owner, &otp_req("12ab56")).await,
            Err(LifecycleError::InvalidInput(_))
        ));
        assert!(matches!(
            engine
                .retrieve(
                    owner,
                    &RetrieveOrderRequest {
                        order_tracking_id: Some("AWB123".to_owned()),
                        otp: None,
                    }
                )
                .await,
            Err(LifecycleError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_single_step_flow() {
        let store = MemoryStore::new();
        let engine = OrderLifecycle::new(&store, RetrievalFlow::SingleStep);
        let owner = UserId::generate();

        let created = engine
            .create(owner, &expect_req("AWB9", "2025-06-01"))
            .await
            .unwrap();
        assert!(created.otp.is_none());

        assert!(matches!(
            engine.retrieve(owner, &otp_req("123456")).await,
            Err(LifecycleError::InvalidInput(_))
        ));

        let req = RetrieveOrderRequest {
            order_tracking_id: Some(" AWB9 ".to_owned()),
            otp: None,
        };
        let retrieved = engine.retrieve(owner, &req).await.unwrap();
        assert_eq!(retrieved.status, OrderStatus::Retrieved);
        assert!(retrieved.retrieved_at.is_some());
        assert!(retrieved.verified_at.is_none());

        assert!(matches!(
            engine.retrieve(owner, &req).await,
            Err(LifecycleError::NoExpectedOrder)
        ));
        // A retrieved order can never be collected.
        assert!(matches!(
            engine.collect(&collect_req(&created.order.id.to_string())).await,
            Err(LifecycleError::NoVerifiedOrder)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_active_registration() {
        let store = MemoryStore::new();
        let engine = OrderLifecycle::new(&store, RetrievalFlow::Handover);
        let owner = UserId::generate();
        let req = expect_req("AWB123", "2025-06-01");

        engine.create(owner, &req).await.unwrap();
        assert!(matches!(
            engine.create(owner, &req).await,
            Err(LifecycleError::DuplicateActive)
        ));
        engine.create(UserId::generate(), &req).await.unwrap();
    }

    #[tokio::test]
    async fn test_collect_requires_verified() {
        let store = MemoryStore::new();
        let engine = OrderLifecycle::new(&store, RetrievalFlow::Handover);
        let created = engine
            .create(UserId::generate(), &expect_req("AWB1", "2025-06-01"))
            .await
            .unwrap();

        assert!(matches!(
            engine.collect(&collect_req(&created.order.id.to_string())).await,
            Err(LifecycleError::NoVerifiedOrder)
        ));
        assert!(matches!(
            engine.collect(&CollectOrderRequest::default()).await,
            Err(LifecycleError::InvalidInput(_))
        ));
        assert!(matches!(
            engine.collect(&collect_req("definitely-not-a-uuid")).await,
            Err(LifecycleError::NoVerifiedOrder)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_collect_has_one_winner() {
        let store = MemoryStore::new();
        let engine = OrderLifecycle::new(&store, RetrievalFlow::Handover);
        let owner = UserId::generate();
        let created = engine
            .create(owner, &expect_req("AWB1", "2025-06-01"))
            .await
            .unwrap();
        engine
            .retrieve(owner, &otp_req(created.otp.unwrap().expose()))
            .await
            .unwrap();

        let req = collect_req(&created.order.id.to_string());
        let (a, b) = tokio::join!(engine.collect(&req), engine.collect(&req));

        let wins = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(wins, 1);
        assert!(
            matches!(a, Err(LifecycleError::NoVerifiedOrder))
                || matches!(b, Err(LifecycleError::NoVerifiedOrder))
        );
    }
}
