//! Account storage
//!
//! Handlers and services talk to [`AccountStore`]; production uses the
//! PostgreSQL implementation and tests use the in-memory one.

use async_trait::async_trait;
use common::error::DatabaseResult;
use uuid::Uuid;

use crate::models::{
    NewRole, NewUser, Role, UpdateProfile, UpdateRole, UpdateUser, User, UserProfile, UserRole,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryAccountStore;
pub use postgres::PgAccountStore;

/// Name of the role every new account receives when it exists
pub const DEFAULT_ROLE: &str = "user";

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> DatabaseResult<Option<User>>;

    async fn find_user_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>>;

    /// All users, oldest first
    async fn list_users(&self) -> DatabaseResult<Vec<User>>;

    /// Create the user, an empty profile and the default role assignment
    /// atomically. A missing default role is skipped.
    async fn register_user(&self, new_user: &NewUser) -> DatabaseResult<User>;

    async fn update_user(&self, id: Uuid, changes: &UpdateUser) -> DatabaseResult<Option<User>>;

    async fn get_profile(&self, user_id: Uuid) -> DatabaseResult<Option<UserProfile>>;

    async fn update_profile(
        &self,
        user_id: Uuid,
        changes: &UpdateProfile,
    ) -> DatabaseResult<Option<UserProfile>>;

    /// All roles ordered by name
    async fn list_roles(&self) -> DatabaseResult<Vec<Role>>;

    async fn get_role(&self, id: Uuid) -> DatabaseResult<Option<Role>>;

    async fn create_role(&self, new_role: &NewRole) -> DatabaseResult<Role>;

    async fn update_role(&self, id: Uuid, changes: &UpdateRole) -> DatabaseResult<Option<Role>>;

    async fn delete_role(&self, id: Uuid) -> DatabaseResult<bool>;

    async fn roles_for_user(&self, user_id: Uuid) -> DatabaseResult<Vec<UserRole>>;

    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> DatabaseResult<UserRole>;

    async fn revoke_role(&self, user_id: Uuid, role_id: Uuid) -> DatabaseResult<bool>;

    async fn health_check(&self) -> bool;
}
