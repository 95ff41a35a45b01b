//! Account business rules on top of [`AccountStore`]

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{AuthError, AuthResult},
    jwt::JwtService,
    middleware::AuthUser,
    models::{
        LoginRequest, NewRole, NewUser, RegisterRequest, Role, UpdateProfile, UpdateRole,
        UpdateUser, User, UserProfile, UserRole, UserView,
    },
    password::{hash_password, verify_password},
    rate_limiter::RateLimiter,
    repositories::AccountStore,
    validation::{normalize_email, validate_email, validate_password, validate_role_name},
};

/// Tokens issued on login
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    pub user: UserView,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access: String,
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn AccountStore>,
    jwt_service: JwtService,
    rate_limiter: RateLimiter,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn AccountStore>,
        jwt_service: JwtService,
        rate_limiter: RateLimiter,
    ) -> Self {
        Self {
            store,
            jwt_service,
            rate_limiter,
        }
    }

    pub async fn health_check(&self) -> bool {
        self.store.health_check().await
    }

    async fn user_view(&self, user: User) -> AuthResult<UserView> {
        let profile = self.store.get_profile(user.id).await?;
        let roles = self.store.roles_for_user(user.id).await?;
        Ok(UserView::new(user, profile, roles))
    }

    async fn role_names(&self, user_id: Uuid) -> AuthResult<Vec<String>> {
        Ok(self
            .store
            .roles_for_user(user_id)
            .await?
            .into_iter()
            .map(|ur| ur.role.name)
            .collect())
    }

    async fn ensure_email_free(&self, email: &str, except: Option<Uuid>) -> AuthResult<()> {
        match self.store.find_user_by_email(email).await? {
            Some(existing) if Some(existing.id) != except => Err(AuthError::Validation(
                "A user with this email already exists".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Register a new account with an empty profile and the default role
    pub async fn register(&self, request: RegisterRequest) -> AuthResult<UserView> {
        let email = normalize_email(&request.email);
        validate_email(&email).map_err(AuthError::Validation)?;
        validate_password(&request.password).map_err(AuthError::Validation)?;
        if request.password != request.password_confirm {
            return Err(AuthError::Validation("Passwords do not match".to_string()));
        }
        self.ensure_email_free(&email, None).await?;

        let new_user = NewUser {
            email,
            password_hash: hash_password(&request.password)?,
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
        };

        let user = self.store.register_user(&new_user).await.map_err(|e| {
            if e.is_conflict() {
                AuthError::Validation("A user with this email already exists".to_string())
            } else {
                AuthError::Database(e)
            }
        })?;

        info!(user_id = %user.id, "user registered");
        self.user_view(user).await
    }

    /// Exchange credentials for an access and a refresh token
    pub async fn login(&self, request: LoginRequest) -> AuthResult<LoginResponse> {
        let email = normalize_email(&request.email);
        if !self.rate_limiter.is_allowed(&email).await {
            warn!(email = %email, "login rejected while banned");
            return Err(AuthError::TooManyRequests);
        }

        let user = match self.store.find_user_by_email(&email).await? {
            Some(user)
                if user.is_active && verify_password(&request.password, &user.password_hash) =>
            {
                user
            }
            _ => {
                self.rate_limiter.record_failure(&email).await;
                warn!(email = %email, "failed login");
                return Err(AuthError::invalid_credentials());
            }
        };
        self.rate_limiter.reset(&email).await;

        let roles = self.role_names(user.id).await?;
        let access = self
            .jwt_service
            .generate_access_token(&user, &roles)
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        let refresh = self
            .jwt_service
            .generate_refresh_token(&user)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        info!(user_id = %user.id, "user logged in");
        Ok(LoginResponse {
            access,
            refresh,
            user: self.user_view(user).await?,
        })
    }

    /// Issue a new access token from a refresh token
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<RefreshResponse> {
        let claims = self
            .jwt_service
            .validate_refresh_token(refresh_token)
            .map_err(|e| {
                warn!(error = %e, "rejected refresh token");
                AuthError::Unauthorized("Token is invalid or expired".to_string())
            })?;

        let user = self
            .store
            .find_user_by_id(claims.sub)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| AuthError::Unauthorized("User not found".to_string()))?;

        let roles = self.role_names(user.id).await?;
        let access = self
            .jwt_service
            .generate_access_token(&user, &roles)
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        Ok(RefreshResponse { access })
    }

    pub async fn profile(&self, user_id: Uuid) -> AuthResult<UserProfile> {
        self.store
            .get_profile(user_id)
            .await?
            .ok_or_else(|| AuthError::NotFound("Profile not found".to_string()))
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        changes: &UpdateProfile,
    ) -> AuthResult<UserProfile> {
        self.store
            .update_profile(user_id, changes)
            .await?
            .ok_or_else(|| AuthError::NotFound("Profile not found".to_string()))
    }

    /// Staff see every user, everyone else only themselves
    pub async fn list_users(&self, caller: &AuthUser) -> AuthResult<Vec<UserView>> {
        let users = if caller.is_staff() {
            self.store.list_users().await?
        } else {
            self.store.find_user_by_id(caller.id).await?.into_iter().collect()
        };

        let mut views = Vec::with_capacity(users.len());
        for user in users {
            views.push(self.user_view(user).await?);
        }
        Ok(views)
    }

    async fn visible_user(&self, caller: &AuthUser, id: Uuid) -> AuthResult<User> {
        caller.require_self_or_staff(id)?;
        self.store
            .find_user_by_id(id)
            .await?
            .ok_or_else(|| AuthError::NotFound("User not found".to_string()))
    }

    pub async fn get_user(&self, caller: &AuthUser, id: Uuid) -> AuthResult<UserView> {
        let user = self.visible_user(caller, id).await?;
        self.user_view(user).await
    }

    pub async fn update_user(
        &self,
        caller: &AuthUser,
        id: Uuid,
        mut changes: UpdateUser,
    ) -> AuthResult<UserView> {
        self.visible_user(caller, id).await?;

        if let Some(email) = changes.email.as_deref() {
            let email = normalize_email(email);
            validate_email(&email).map_err(AuthError::Validation)?;
            self.ensure_email_free(&email, Some(id)).await?;
            changes.email = Some(email);
        }

        let user = self
            .store
            .update_user(id, &changes)
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    AuthError::Validation("A user with this email already exists".to_string())
                } else {
                    AuthError::Database(e)
                }
            })?
            .ok_or_else(|| AuthError::NotFound("User not found".to_string()))?;
        self.user_view(user).await
    }

    pub async fn list_roles(&self) -> AuthResult<Vec<Role>> {
        Ok(self.store.list_roles().await?)
    }

    pub async fn get_role(&self, id: Uuid) -> AuthResult<Role> {
        self.store
            .get_role(id)
            .await?
            .ok_or_else(|| AuthError::NotFound("Role not found".to_string()))
    }

    pub async fn create_role(&self, caller: &AuthUser, new_role: NewRole) -> AuthResult<Role> {
        caller.require_staff()?;
        validate_role_name(&new_role.name).map_err(AuthError::Validation)?;
        let new_role = NewRole {
            name: new_role.name.trim().to_string(),
            description: new_role.description,
        };

        let role = self.store.create_role(&new_role).await.map_err(|e| {
            if e.is_conflict() {
                AuthError::Conflict("A role with this name already exists".to_string())
            } else {
                AuthError::Database(e)
            }
        })?;
        info!(role = %role.name, "role created");
        Ok(role)
    }

    pub async fn update_role(
        &self,
        caller: &AuthUser,
        id: Uuid,
        changes: UpdateRole,
    ) -> AuthResult<Role> {
        caller.require_staff()?;
        if let Some(name) = changes.name.as_deref() {
            validate_role_name(name).map_err(AuthError::Validation)?;
        }

        self.store
            .update_role(id, &changes)
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    AuthError::Conflict("A role with this name already exists".to_string())
                } else {
                    AuthError::Database(e)
                }
            })?
            .ok_or_else(|| AuthError::NotFound("Role not found".to_string()))
    }

    pub async fn delete_role(&self, caller: &AuthUser, id: Uuid) -> AuthResult<()> {
        caller.require_staff()?;
        if self.store.delete_role(id).await? {
            info!(role_id = %id, "role deleted");
            Ok(())
        } else {
            Err(AuthError::NotFound("Role not found".to_string()))
        }
    }

    pub async fn list_user_roles(
        &self,
        caller: &AuthUser,
        user_id: Uuid,
    ) -> AuthResult<Vec<UserRole>> {
        self.visible_user(caller, user_id).await?;
        Ok(self.store.roles_for_user(user_id).await?)
    }

    pub async fn assign_role(
        &self,
        caller: &AuthUser,
        user_id: Uuid,
        role_id: Uuid,
    ) -> AuthResult<UserRole> {
        caller.require_staff()?;
        self.visible_user(caller, user_id).await?;
        if self.store.get_role(role_id).await?.is_none() {
            return Err(AuthError::Validation(format!(
                "Invalid role id \"{}\" - role does not exist",
                role_id
            )));
        }

        let assignment = self.store.assign_role(user_id, role_id).await.map_err(|e| {
            if e.is_conflict() {
                AuthError::Conflict("User already has this role".to_string())
            } else {
                AuthError::Database(e)
            }
        })?;
        info!(user_id = %user_id, role = %assignment.role.name, "role assigned");
        Ok(assignment)
    }

    pub async fn revoke_role(
        &self,
        caller: &AuthUser,
        user_id: Uuid,
        role_id: Uuid,
    ) -> AuthResult<()> {
        caller.require_staff()?;
        if self.store.revoke_role(user_id, role_id).await? {
            info!(user_id = %user_id, role_id = %role_id, "role revoked");
            Ok(())
        } else {
            Err(AuthError::NotFound("Role assignment not found".to_string()))
        }
    }
}
