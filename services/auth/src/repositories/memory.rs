//! In-memory account store used by tests and local runs without a database

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::{DatabaseError, DatabaseResult};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{AccountStore, DEFAULT_ROLE};
use crate::models::{
    NewRole, NewUser, Role, UpdateProfile, UpdateRole, UpdateUser, User, UserProfile, UserRole,
};

#[derive(Debug, Clone)]
struct Assignment {
    id: Uuid,
    user_id: Uuid,
    role_id: Uuid,
    assigned_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    users: Vec<User>,
    profiles: Vec<UserProfile>,
    roles: Vec<Role>,
    assignments: Vec<Assignment>,
}

impl Inner {
    fn role_view(&self, assignment: &Assignment) -> Option<UserRole> {
        self.roles
            .iter()
            .find(|r| r.id == assignment.role_id)
            .map(|role| UserRole {
                id: assignment.id,
                role: role.clone(),
                assigned_at: assignment.assigned_at,
            })
    }
}

/// Account store holding everything in process memory
#[derive(Clone, Default)]
pub struct MemoryAccountStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the `user` and `admin` roles
    pub fn with_default_roles() -> Self {
        let inner = Inner {
            roles: vec![
                Role {
                    id: Uuid::new_v4(),
                    name: DEFAULT_ROLE.to_string(),
                    description: "Default shopper role".to_string(),
                },
                Role {
                    id: Uuid::new_v4(),
                    name: common::token::STAFF_ROLE.to_string(),
                    description: "Staff".to_string(),
                },
            ],
            ..Inner::default()
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_user_by_email(&self, email: &str) -> DatabaseResult<Option<User>> {
        let inner = self.inner.lock().await;
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>> {
        let inner = self.inner.lock().await;
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn list_users(&self) -> DatabaseResult<Vec<User>> {
        let inner = self.inner.lock().await;
        Ok(inner.users.clone())
    }

    async fn register_user(&self, new_user: &NewUser) -> DatabaseResult<User> {
        let mut inner = self.inner.lock().await;
        if inner.users.iter().any(|u| u.email == new_user.email) {
            return Err(DatabaseError::Conflict("users_email_key".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email.clone(),
            password_hash: new_user.password_hash.clone(),
            first_name: new_user.first_name.clone(),
            last_name: new_user.last_name.clone(),
            is_active: true,
            date_joined: now,
            updated_at: now,
        };

        inner.users.push(user.clone());
        inner.profiles.push(UserProfile::empty(user.id));
        if let Some(role_id) = inner
            .roles
            .iter()
            .find(|r| r.name == DEFAULT_ROLE)
            .map(|r| r.id)
        {
            inner.assignments.push(Assignment {
                id: Uuid::new_v4(),
                user_id: user.id,
                role_id,
                assigned_at: now,
            });
        }

        Ok(user)
    }

    async fn update_user(&self, id: Uuid, changes: &UpdateUser) -> DatabaseResult<Option<User>> {
        let mut inner = self.inner.lock().await;
        if let Some(email) = &changes.email {
            if inner.users.iter().any(|u| u.id != id && &u.email == email) {
                return Err(DatabaseError::Conflict("users_email_key".to_string()));
            }
        }

        let Some(user) = inner.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(email) = &changes.email {
            user.email = email.clone();
        }
        if let Some(first_name) = &changes.first_name {
            user.first_name = first_name.clone();
        }
        if let Some(last_name) = &changes.last_name {
            user.last_name = last_name.clone();
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn get_profile(&self, user_id: Uuid) -> DatabaseResult<Option<UserProfile>> {
        let inner = self.inner.lock().await;
        Ok(inner.profiles.iter().find(|p| p.user_id == user_id).cloned())
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        changes: &UpdateProfile,
    ) -> DatabaseResult<Option<UserProfile>> {
        let mut inner = self.inner.lock().await;
        Ok(inner
            .profiles
            .iter_mut()
            .find(|p| p.user_id == user_id)
            .map(|profile| {
                profile.apply(changes);
                profile.clone()
            }))
    }

    async fn list_roles(&self) -> DatabaseResult<Vec<Role>> {
        let inner = self.inner.lock().await;
        let mut roles = inner.roles.clone();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn get_role(&self, id: Uuid) -> DatabaseResult<Option<Role>> {
        let inner = self.inner.lock().await;
        Ok(inner.roles.iter().find(|r| r.id == id).cloned())
    }

    async fn create_role(&self, new_role: &NewRole) -> DatabaseResult<Role> {
        let mut inner = self.inner.lock().await;
        if inner.roles.iter().any(|r| r.name == new_role.name) {
            return Err(DatabaseError::Conflict("roles_name_key".to_string()));
        }
        let role = Role {
            id: Uuid::new_v4(),
            name: new_role.name.clone(),
            description: new_role.description.clone(),
        };
        inner.roles.push(role.clone());
        Ok(role)
    }

    async fn update_role(&self, id: Uuid, changes: &UpdateRole) -> DatabaseResult<Option<Role>> {
        let mut inner = self.inner.lock().await;
        if let Some(name) = &changes.name {
            if inner.roles.iter().any(|r| r.id != id && &r.name == name) {
                return Err(DatabaseError::Conflict("roles_name_key".to_string()));
            }
        }
        Ok(inner.roles.iter_mut().find(|r| r.id == id).map(|role| {
            if let Some(name) = &changes.name {
                role.name = name.clone();
            }
            if let Some(description) = &changes.description {
                role.description = description.clone();
            }
            role.clone()
        }))
    }

    async fn delete_role(&self, id: Uuid) -> DatabaseResult<bool> {
        let mut inner = self.inner.lock().await;
        let before = inner.roles.len();
        inner.roles.retain(|r| r.id != id);
        inner.assignments.retain(|a| a.role_id != id);
        Ok(inner.roles.len() < before)
    }

    async fn roles_for_user(&self, user_id: Uuid) -> DatabaseResult<Vec<UserRole>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .assignments
            .iter()
            .filter(|a| a.user_id == user_id)
            .filter_map(|a| inner.role_view(a))
            .collect())
    }

    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> DatabaseResult<UserRole> {
        let mut inner = self.inner.lock().await;
        if !inner.users.iter().any(|u| u.id == user_id)
            || !inner.roles.iter().any(|r| r.id == role_id)
        {
            return Err(DatabaseError::Constraint("user_roles_fkey".to_string()));
        }
        if inner
            .assignments
            .iter()
            .any(|a| a.user_id == user_id && a.role_id == role_id)
        {
            return Err(DatabaseError::Conflict(
                "user_roles_user_role_key".to_string(),
            ));
        }

        let assignment = Assignment {
            id: Uuid::new_v4(),
            user_id,
            role_id,
            assigned_at: Utc::now(),
        };
        inner.assignments.push(assignment.clone());
        inner
            .role_view(&assignment)
            .ok_or_else(|| DatabaseError::Constraint("user_roles_role_id_fkey".to_string()))
    }

    async fn revoke_role(&self, user_id: Uuid, role_id: Uuid) -> DatabaseResult<bool> {
        let mut inner = self.inner.lock().await;
        let before = inner.assignments.len();
        inner
            .assignments
            .retain(|a| !(a.user_id == user_id && a.role_id == role_id));
        Ok(inner.assignments.len() < before)
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            first_name: String::new(),
            last_name: String::new(),
        }
    }

    #[tokio::test]
    async fn register_creates_profile_and_default_role() {
        let store = MemoryAccountStore::with_default_roles();
        let user = store.register_user(&new_user("a@example.com")).await.unwrap();

        assert!(store.get_profile(user.id).await.unwrap().is_some());
        let roles = store.roles_for_user(user.id).await.unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].role.name, DEFAULT_ROLE);
    }

    #[tokio::test]
    async fn register_without_default_role_skips_assignment() {
        let store = MemoryAccountStore::new();
        let user = store.register_user(&new_user("a@example.com")).await.unwrap();
        assert!(store.roles_for_user(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_assignment_is_a_conflict() {
        let store = MemoryAccountStore::with_default_roles();
        let user = store.register_user(&new_user("a@example.com")).await.unwrap();
        let role = store.roles_for_user(user.id).await.unwrap()[0].role.clone();

        let err = store.assign_role(user.id, role.id).await.unwrap_err();
        assert!(err.is_conflict());
    }
}
