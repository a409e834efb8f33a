//! Profile repository for `PostgreSQL`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use parcel_desk_core::api::UserStats;
use parcel_desk_core::{Profile, Role, UserId};

use super::{NewProfile, PgStore, ProfileStore, RepositoryError};

const PROFILE_COLUMNS: &str = "user_id, username, room_number, role, created_at";

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    user_id: Uuid,
    username: String,
    room_number: String,
    role: Role,
    created_at: DateTime<Utc>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Self {
            user_id: UserId::new(row.user_id),
            username: row.username,
            room_number: row.room_number,
            role: row.role,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RoleCountsRow {
    total_users: i64,
    total_security: i64,
    total_admin: i64,
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn get_profile(&self, user_id: UserId) -> Result<Option<Profile>, RepositoryError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM parcel.profile WHERE user_id = $1");
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(user_id.as_uuid())
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(Into::into))
    }

    async fn insert_profile_if_absent(
        &self,
        new: &NewProfile,
    ) -> Result<Profile, RepositoryError> {
        // The no-op DO UPDATE makes RETURNING yield the existing row too.
        let sql = format!(
            r"
            INSERT INTO parcel.profile (user_id, username, room_number, role)
            VALUES ($1, $2, $3, 'user')
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING {PROFILE_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(new.user_id.as_uuid())
            .bind(new.username.as_str())
            .bind(new.room_number.as_str())
            .fetch_one(self.pool())
            .await?;

        Ok(row.into())
    }

    async fn save_profile_details(&self, new: &NewProfile) -> Result<Profile, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO parcel.profile (user_id, username, room_number, role)
            VALUES ($1, $2, $3, 'user')
            ON CONFLICT (user_id) DO UPDATE
                SET username = EXCLUDED.username,
                    room_number = EXCLUDED.room_number
            RETURNING {PROFILE_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(new.user_id.as_uuid())
            .bind(new.username.as_str())
            .bind(new.room_number.as_str())
            .fetch_one(self.pool())
            .await?;

        Ok(row.into())
    }

    async fn find_profiles_by_username(
        &self,
        username: &str,
        limit: i64,
    ) -> Result<Vec<Profile>, RepositoryError> {
        let sql = format!(
            "SELECT {PROFILE_COLUMNS} FROM parcel.profile WHERE username = $1 LIMIT $2"
        );
        let rows = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(username)
            .bind(limit)
            .fetch_all(self.pool())
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_profiles_by_role(&self, role: Role) -> Result<Vec<Profile>, RepositoryError> {
        let sql = format!(
            "SELECT {PROFILE_COLUMNS} FROM parcel.profile WHERE role = $1 ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(role)
            .fetch_all(self.pool())
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn change_role(
        &self,
        user_id: UserId,
        from: Role,
        to: Role,
    ) -> Result<Option<Profile>, RepositoryError> {
        let sql = format!(
            r"
            UPDATE parcel.profile
            SET role = $3
            WHERE user_id = $1 AND role = $2
            RETURNING {PROFILE_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(user_id.as_uuid())
            .bind(from)
            .bind(to)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(Into::into))
    }

    async fn force_role(
        &self,
        user_id: UserId,
        role: Role,
    ) -> Result<Option<Profile>, RepositoryError> {
        let sql = format!(
            "UPDATE parcel.profile SET role = $2 WHERE user_id = $1 RETURNING {PROFILE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(user_id.as_uuid())
            .bind(role)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(Into::into))
    }

    async fn role_counts(&self) -> Result<UserStats, RepositoryError> {
        let row = sqlx::query_as::<_, RoleCountsRow>(
            r"
            SELECT COUNT(*) FILTER (WHERE role = 'user') AS total_users,
                   COUNT(*) FILTER (WHERE role = 'security') AS total_security,
                   COUNT(*) FILTER (WHERE role = 'admin') AS total_admin
            FROM parcel.profile
            ",
        )
        .fetch_one(self.pool())
        .await?;

        Ok(UserStats {
            total_users: row.total_users,
            total_security: row.total_security,
            total_admin: row.total_admin,
        })
    }
}
