use crate::{
    auth::{AuthService, TokenResponse},
    db::DbPool,
    entities::{user, User},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 64, message = "username must be 3 to 64 characters"))]
    pub username: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Registration and login. Token issuance is delegated to [`AuthService`].
#[derive(Clone)]
pub struct AccountService {
    db: Arc<DbPool>,
    auth: Arc<AuthService>,
}

impl AccountService {
    pub fn new(db: Arc<DbPool>, auth: Arc<AuthService>) -> Self {
        Self { db, auth }
    }

    /// Creates a user with a hashed password and returns the public model.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn register(&self, request: RegisterRequest) -> Result<user::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let taken = User::find()
            .filter(user::Column::Username.eq(request.username.as_str()))
            .one(&*self.db)
            .await?;
        if taken.is_some() {
            return Err(ServiceError::Conflict(format!(
                "username '{}' is already taken",
                request.username
            )));
        }

        if let Some(email) = request.email.as_deref() {
            let email_taken = User::find()
                .filter(user::Column::Email.eq(email))
                .one(&*self.db)
                .await?;
            if email_taken.is_some() {
                return Err(ServiceError::Conflict(format!(
                    "email '{}' is already registered",
                    email
                )));
            }
        }

        let password_hash = self.auth.hash_password(&request.password)?;
        let now = Utc::now();
        let created = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(request.username),
            email: Set(request.email),
            password_hash: Set(password_hash),
            role: Set(user::UserRole::User),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(user_id = %created.id, "user registered");
        Ok(created)
    }

    /// Verifies credentials and returns a bearer token. Unknown username and
    /// wrong password produce the same error so callers cannot probe accounts.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn login(&self, request: LoginRequest) -> Result<TokenResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let user = User::find()
            .filter(user::Column::Username.eq(request.username.as_str()))
            .one(&*self.db)
            .await?;

        let user = match user {
            Some(user) => user,
            None => {
                warn!("login attempt for unknown username");
                return Err(ServiceError::Unauthorized("invalid credentials".into()));
            }
        };

        if !self.auth.verify_password(&request.password, &user.password_hash)? {
            warn!(user_id = %user.id, "login attempt with wrong password");
            return Err(ServiceError::Unauthorized("invalid credentials".into()));
        }

        let token = self.auth.generate_token(&user)?;
        info!(user_id = %user.id, "user logged in");
        Ok(token)
    }
}
