//! In-process store for tests and local development.
//!
//! Each operation takes one async mutex for its whole duration, so the
//! conditional updates here are atomic in the same way a single SQL
//! statement is.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use parcel_desk_core::api::{OrderStats, UserStats};
use parcel_desk_core::{Order, OrderStatus, Profile, Role, Transition, UserId, VerifiedOrder};

use super::{
    NewOrder, NewProfile, OrderSelector, OrderStore, ProfileStore, RepositoryError, Store,
};

#[derive(Debug)]
struct StoredOrder {
    order: Order,
    otp_digest: Option<String>,
}

impl StoredOrder {
    fn is_open(&self) -> bool {
        self.order.status == OrderStatus::Expected
    }
}

#[derive(Debug, Default)]
struct Tables {
    profiles: HashMap<UserId, Profile>,
    /// Insertion order.
    orders: Vec<StoredOrder>,
}

/// [`Store`] backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T>(items: &mut [T], created_at: impl Fn(&T) -> DateTime<Utc>) {
    // Stable sort on reversed input keeps later inserts first on ties.
    items.reverse();
    items.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, new: &NewOrder) -> Result<Order, RepositoryError> {
        let mut tables = self.tables.lock().await;

        let mut open = tables
            .orders
            .iter()
            .filter(|o| o.is_open() && o.order.user_id == new.user_id);
        if open
            .clone()
            .any(|o| o.order.order_tracking_id == new.order_tracking_id.as_str())
        {
            return Err(RepositoryError::DuplicateActiveOrder);
        }
        if let Some(digest) = new.otp_digest.as_deref()
            && open.any(|o| o.otp_digest.as_deref() == Some(digest))
        {
            return Err(RepositoryError::OtpCollision);
        }

        let order = Order {
            id: new.id,
            user_id: new.user_id,
            order_tracking_id: new.order_tracking_id.as_str().to_owned(),
            expected_date: new.expected_date,
            status: OrderStatus::Expected,
            created_at: new.created_at,
            verified_at: None,
            collected_at: None,
            retrieved_at: None,
        };
        tables.orders.push(StoredOrder {
            order: order.clone(),
            otp_digest: new.otp_digest.clone(),
        });
        Ok(order)
    }

    async fn list_orders_for_owner(&self, owner: UserId) -> Result<Vec<Order>, RepositoryError> {
        let tables = self.tables.lock().await;
        let mut orders: Vec<Order> = tables
            .orders
            .iter()
            .filter(|o| o.order.user_id == owner)
            .map(|o| o.order.clone())
            .collect();
        newest_first(&mut orders, |o| o.created_at);
        Ok(orders)
    }

    async fn list_verified_orders(&self) -> Result<Vec<VerifiedOrder>, RepositoryError> {
        let tables = self.tables.lock().await;
        let mut orders: Vec<VerifiedOrder> = tables
            .orders
            .iter()
            .filter(|o| o.order.status == OrderStatus::Verified)
            .map(|o| {
                let owner = tables.profiles.get(&o.order.user_id);
                VerifiedOrder {
                    id: o.order.id,
                    order_tracking_id: o.order.order_tracking_id.clone(),
                    expected_date: o.order.expected_date,
                    verified_at: o.order.verified_at,
                    student_name: owner.map_or_else(
                        || VerifiedOrder::UNKNOWN_STUDENT.to_owned(),
                        |p| p.username.clone(),
                    ),
                    room_number: owner.map_or_else(
                        || VerifiedOrder::UNKNOWN_ROOM.to_owned(),
                        |p| p.room_number.clone(),
                    ),
                }
            })
            .collect();
        orders.reverse();
        orders.sort_by(|a, b| b.verified_at.cmp(&a.verified_at));
        Ok(orders)
    }

    async fn transition_order(
        &self,
        selector: &OrderSelector,
        transition: Transition,
        at: DateTime<Utc>,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let Some(stored) = tables.orders.iter_mut().find(|o| {
            o.order.status == transition.requires()
                && selector.matches(&o.order, o.otp_digest.as_deref())
        }) else {
            return Ok(None);
        };

        stored.order.status = transition.produces();
        match transition {
            Transition::Verify => stored.order.verified_at = Some(at),
            Transition::Collect => stored.order.collected_at = Some(at),
            Transition::Retrieve => stored.order.retrieved_at = Some(at),
        }
        stored.otp_digest = None;
        Ok(Some(stored.order.clone()))
    }

    async fn order_counts(&self) -> Result<OrderStats, RepositoryError> {
        let tables = self.tables.lock().await;
        let mut stats = OrderStats::default();
        for stored in &tables.orders {
            stats.total += 1;
            match stored.order.status {
                OrderStatus::Expected => stats.expected += 1,
                OrderStatus::Verified => stats.verified += 1,
                OrderStatus::Collected => stats.collected += 1,
                OrderStatus::Retrieved => stats.retrieved += 1,
            }
        }
        Ok(stats)
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get_profile(&self, user_id: UserId) -> Result<Option<Profile>, RepositoryError> {
        Ok(self.tables.lock().await.profiles.get(&user_id).cloned())
    }

    async fn insert_profile_if_absent(
        &self,
        new: &NewProfile,
    ) -> Result<Profile, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let profile = tables
            .profiles
            .entry(new.user_id)
            .or_insert_with(|| Profile {
                user_id: new.user_id,
                username: new.username.as_str().to_owned(),
                room_number: new.room_number.as_str().to_owned(),
                role: Role::User,
                created_at: Utc::now(),
            });
        Ok(profile.clone())
    }

    async fn save_profile_details(&self, new: &NewProfile) -> Result<Profile, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let profile = tables
            .profiles
            .entry(new.user_id)
            .and_modify(|p| {
                new.username.as_str().clone_into(&mut p.username);
                new.room_number.as_str().clone_into(&mut p.room_number);
            })
            .or_insert_with(|| Profile {
                user_id: new.user_id,
                username: new.username.as_str().to_owned(),
                room_number: new.room_number.as_str().to_owned(),
                role: Role::User,
                created_at: Utc::now(),
            });
        Ok(profile.clone())
    }

    async fn find_profiles_by_username(
        &self,
        username: &str,
        limit: i64,
    ) -> Result<Vec<Profile>, RepositoryError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let tables = self.tables.lock().await;
        Ok(tables
            .profiles
            .values()
            .filter(|p| p.username == username)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_profiles_by_role(&self, role: Role) -> Result<Vec<Profile>, RepositoryError> {
        let tables = self.tables.lock().await;
        let mut profiles: Vec<Profile> = tables
            .profiles
            .values()
            .filter(|p| p.role == role)
            .cloned()
            .collect();
        profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(profiles)
    }

    async fn change_role(
        &self,
        user_id: UserId,
        from: Role,
        to: Role,
    ) -> Result<Option<Profile>, RepositoryError> {
        let mut tables = self.tables.lock().await;
        Ok(tables
            .profiles
            .get_mut(&user_id)
            .filter(|p| p.role == from)
            .map(|p| {
                p.role = to;
                p.clone()
            }))
    }

    async fn force_role(
        &self,
        user_id: UserId,
        role: Role,
    ) -> Result<Option<Profile>, RepositoryError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.profiles.get_mut(&user_id).map(|p| {
            p.role = role;
            p.clone()
        }))
    }

    async fn role_counts(&self) -> Result<UserStats, RepositoryError> {
        let tables = self.tables.lock().await;
        let mut stats = UserStats::default();
        for profile in tables.profiles.values() {
            match profile.role {
                Role::User => stats.total_users += 1,
                Role::Security => stats.total_security += 1,
                Role::Admin => stats.total_admin += 1,
            }
        }
        Ok(stats)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
