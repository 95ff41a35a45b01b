//! PostgreSQL account store

use async_trait::async_trait;
use common::error::DatabaseResult;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{debug, info};
use uuid::Uuid;

use super::{AccountStore, DEFAULT_ROLE};
use crate::models::{
    NewRole, NewUser, Role, UpdateProfile, UpdateRole, UpdateUser, User, UserProfile, UserRole,
};

const USER_COLUMNS: &str =
    "id, email, password_hash, first_name, last_name, is_active, date_joined, updated_at";

const PROFILE_COLUMNS: &str =
    "id, user_id, phone, address, city, postal_code, country, created_at, updated_at";

/// Account store backed by the shared PostgreSQL database
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_role_from_row(row: &PgRow) -> Result<UserRole, sqlx::Error> {
    Ok(UserRole {
        id: row.try_get("id")?,
        assigned_at: row.try_get("assigned_at")?,
        role: Role {
            id: row.try_get("role_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
        },
    })
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_user_by_email(&self, email: &str) -> DatabaseResult<Option<User>> {
        debug!(email = %email, "finding user by email");
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list_users(&self) -> DatabaseResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY date_joined"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn register_user(&self, new_user: &NewUser) -> DatabaseResult<User> {
        info!(email = %new_user.email, "creating new user");
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO user_profiles (user_id) VALUES ($1)")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        let assigned = sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) SELECT $1, id FROM roles WHERE name = $2",
        )
        .bind(user.id)
        .bind(DEFAULT_ROLE)
        .execute(&mut *tx)
        .await?;
        if assigned.rows_affected() == 0 {
            debug!(user_id = %user.id, "default role missing, skipped assignment");
        }

        tx.commit().await?;
        Ok(user)
    }

    async fn update_user(&self, id: Uuid, changes: &UpdateUser) -> DatabaseResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET email = COALESCE($2, email),
                first_name = COALESCE($3, first_name),
                last_name = COALESCE($4, last_name),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.email)
        .bind(&changes.first_name)
        .bind(&changes.last_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_profile(&self, user_id: Uuid) -> DatabaseResult<Option<UserProfile>> {
        let profile = sqlx::query_as::<_, UserProfile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        changes: &UpdateProfile,
    ) -> DatabaseResult<Option<UserProfile>> {
        let profile = sqlx::query_as::<_, UserProfile>(&format!(
            r#"
            UPDATE user_profiles
            SET phone = COALESCE($2, phone),
                address = COALESCE($3, address),
                city = COALESCE($4, city),
                postal_code = COALESCE($5, postal_code),
                country = COALESCE($6, country),
                updated_at = NOW()
            WHERE user_id = $1
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&changes.phone)
        .bind(&changes.address)
        .bind(&changes.city)
        .bind(&changes.postal_code)
        .bind(&changes.country)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn list_roles(&self) -> DatabaseResult<Vec<Role>> {
        let roles =
            sqlx::query_as::<_, Role>("SELECT id, name, description FROM roles ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(roles)
    }

    async fn get_role(&self, id: Uuid) -> DatabaseResult<Option<Role>> {
        let role =
            sqlx::query_as::<_, Role>("SELECT id, name, description FROM roles WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(role)
    }

    async fn create_role(&self, new_role: &NewRole) -> DatabaseResult<Role> {
        let role = sqlx::query_as::<_, Role>(
            "INSERT INTO roles (name, description) VALUES ($1, $2) RETURNING id, name, description",
        )
        .bind(&new_role.name)
        .bind(&new_role.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(role)
    }

    async fn update_role(&self, id: Uuid, changes: &UpdateRole) -> DatabaseResult<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            UPDATE roles
            SET name = COALESCE($2, name),
                description = COALESCE($3, description)
            WHERE id = $1
            RETURNING id, name, description
            "#,
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.description)
        .fetch_optional(&self.pool)
        .await?;
        Ok(role)
    }

    async fn delete_role(&self, id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn roles_for_user(&self, user_id: Uuid) -> DatabaseResult<Vec<UserRole>> {
        let rows = sqlx::query(
            r#"
            SELECT ur.id, ur.assigned_at, r.id AS role_id, r.name, r.description
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = $1
            ORDER BY ur.assigned_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let roles = rows
            .iter()
            .map(user_role_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(roles)
    }

    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> DatabaseResult<UserRole> {
        let row = sqlx::query(
            r#"
            WITH inserted AS (
                INSERT INTO user_roles (user_id, role_id)
                VALUES ($1, $2)
                RETURNING id, role_id, assigned_at
            )
            SELECT i.id, i.assigned_at, r.id AS role_id, r.name, r.description
            FROM inserted i
            JOIN roles r ON r.id = i.role_id
            "#,
        )
        .bind(user_id)
        .bind(role_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(user_role_from_row(&row)?)
    }

    async fn revoke_role(&self, user_id: Uuid, role_id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(user_id)
            .bind(role_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> bool {
        common::database::health_check(&self.pool)
            .await
            .unwrap_or(false)
    }
}
