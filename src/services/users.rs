use crate::{
    auth::AuthService,
    db::DbPool,
    entities::{user, User},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, Set};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub email: Option<String>,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: Option<String>,
}

/// Profile operations for the authenticated user.
#[derive(Clone)]
pub struct UserService {
    db: Arc<DbPool>,
    auth: Arc<AuthService>,
}

impl UserService {
    pub fn new(db: Arc<DbPool>, auth: Arc<AuthService>) -> Self {
        Self { db, auth }
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_profile(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        User::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {} not found", user_id)))
    }

    /// Updates email and/or password. A new email must not collide with
    /// another account.
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdateProfileRequest,
    ) -> Result<user::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let user = self.get_profile(user_id).await?;

        if let Some(email) = request.email.as_deref() {
            let collision = User::find()
                .filter(user::Column::Email.eq(email))
                .filter(user::Column::Id.ne(user_id))
                .one(&*self.db)
                .await?;
            if collision.is_some() {
                return Err(ServiceError::Conflict(format!(
                    "email '{}' is already registered",
                    email
                )));
            }
        }

        let mut update: user::ActiveModel = user.into();
        if let Some(email) = request.email {
            update.email = Set(Some(email));
        }
        if let Some(password) = request.password {
            update.password_hash = Set(self.auth.hash_password(&password)?);
        }
        update.updated_at = Set(Utc::now());

        let updated = update.update(&*self.db).await?;
        info!(user_id = %updated.id, "profile updated");
        Ok(updated)
    }

    /// Deletes the account. Dependent rows (cart, addresses, orders) go with
    /// it via the schema's cascade rules.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn delete_account(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let user = self.get_profile(user_id).await?;
        user.delete(&*self.db).await?;
        info!(user_id = %user_id, "account deleted");
        Ok(())
    }
}
