//! Order repository for `PostgreSQL`.
//!
//! Queries are built at runtime with `sqlx::query_as` so the workspace builds
//! without a live database or prepared query metadata.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use parcel_desk_core::api::OrderStats;
use parcel_desk_core::{Order, OrderId, OrderStatus, Transition, UserId, VerifiedOrder};

use super::{NewOrder, OrderSelector, OrderStore, PgStore, RepositoryError};

/// Columns returned for every order query.
const ORDER_COLUMNS: &str = "id, user_id, order_tracking_id, expected_date, status, \
     created_at, verified_at, collected_at, retrieved_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    order_tracking_id: String,
    expected_date: NaiveDate,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    verified_at: Option<DateTime<Utc>>,
    collected_at: Option<DateTime<Utc>>,
    retrieved_at: Option<DateTime<Utc>>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: OrderId::new(row.id),
            user_id: UserId::new(row.user_id),
            order_tracking_id: row.order_tracking_id,
            expected_date: row.expected_date,
            status: row.status,
            created_at: row.created_at,
            verified_at: row.verified_at,
            collected_at: row.collected_at,
            retrieved_at: row.retrieved_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VerifiedOrderRow {
    id: Uuid,
    order_tracking_id: String,
    expected_date: NaiveDate,
    verified_at: Option<DateTime<Utc>>,
    student_name: String,
    room_number: String,
}

impl From<VerifiedOrderRow> for VerifiedOrder {
    fn from(row: VerifiedOrderRow) -> Self {
        Self {
            id: OrderId::new(row.id),
            order_tracking_id: row.order_tracking_id,
            expected_date: row.expected_date,
            verified_at: row.verified_at,
            student_name: row.student_name,
            room_number: row.room_number,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderCountsRow {
    total: i64,
    expected: i64,
    verified: i64,
    collected: i64,
    retrieved: i64,
}

// =============================================================================
// Repository
// =============================================================================

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_order(&self, new: &NewOrder) -> Result<Order, RepositoryError> {
        let sql = format!(
            r#"
            INSERT INTO parcel."order"
                (id, user_id, order_tracking_id, expected_date, status, otp_digest, created_at)
            VALUES ($1, $2, $3, $4, 'expected', $5, $6)
            RETURNING {ORDER_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(new.id.as_uuid())
            .bind(new.user_id.as_uuid())
            .bind(new.order_tracking_id.as_str())
            .bind(new.expected_date)
            .bind(new.otp_digest.as_deref())
            .bind(new.created_at)
            .fetch_one(self.pool())
            .await
            .map_err(RepositoryError::from_insert)?;

        Ok(row.into())
    }

    async fn list_orders_for_owner(&self, owner: UserId) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM parcel."order"
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#
        );

        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(owner.as_uuid())
            .fetch_all(self.pool())
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_verified_orders(&self) -> Result<Vec<VerifiedOrder>, RepositoryError> {
        let rows = sqlx::query_as::<_, VerifiedOrderRow>(
            r#"
            SELECT o.id, o.order_tracking_id, o.expected_date, o.verified_at,
                   COALESCE(p.username, $1) AS student_name,
                   COALESCE(p.room_number, $2) AS room_number
            FROM parcel."order" o
            LEFT JOIN parcel.profile p ON p.user_id = o.user_id
            WHERE o.status = 'verified'
            ORDER BY o.verified_at DESC
            "#,
        )
        .bind(VerifiedOrder::UNKNOWN_STUDENT)
        .bind(VerifiedOrder::UNKNOWN_ROOM)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn transition_order(
        &self,
        selector: &OrderSelector,
        transition: Transition,
        at: DateTime<Utc>,
    ) -> Result<Option<Order>, RepositoryError> {
        // $1 new status, $2 stamp, $3 required status, $4.. selector
        let predicate = match selector {
            OrderSelector::Id(_) => "id = $4",
            OrderSelector::OwnedTracking { .. } => "user_id = $4 AND order_tracking_id = $5",
            OrderSelector::OwnedOtp { .. } => "user_id = $4 AND otp_digest = $5",
        };
        let sql = format!(
            r#"
            UPDATE parcel."order"
            SET status = $1, {stamp} = $2, otp_digest = NULL
            WHERE status = $3 AND {predicate}
            RETURNING {ORDER_COLUMNS}
            "#,
            stamp = transition.stamp_column(),
        );

        let query = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(transition.produces())
            .bind(at)
            .bind(transition.requires());
        let query = match selector {
            OrderSelector::Id(id) => query.bind(id.as_uuid()),
            OrderSelector::OwnedTracking { owner, tracking } => {
                query.bind(owner.as_uuid()).bind(tracking.as_str())
            }
            OrderSelector::OwnedOtp { owner, otp_digest } => {
                query.bind(owner.as_uuid()).bind(otp_digest.as_str())
            }
        };

        let row = query.fetch_optional(self.pool()).await?;
        Ok(row.map(Into::into))
    }

    async fn order_counts(&self) -> Result<OrderStats, RepositoryError> {
        let row = sqlx::query_as::<_, OrderCountsRow>(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE status = 'expected') AS expected,
                   COUNT(*) FILTER (WHERE status = 'verified') AS verified,
                   COUNT(*) FILTER (WHERE status = 'collected') AS collected,
                   COUNT(*) FILTER (WHERE status = 'retrieved') AS retrieved
            FROM parcel."order"
            "#,
        )
        .fetch_one(self.pool())
        .await?;

        Ok(OrderStats {
            total: row.total,
            expected: row.expected,
            verified: row.verified,
            collected: row.collected,
            retrieved: row.retrieved,
        })
    }
}
