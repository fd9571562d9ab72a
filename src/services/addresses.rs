use crate::{
    db::DbPool,
    entities::{address, Address},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAddressRequest {
    #[validate(length(min = 1, max = 255, message = "street is required"))]
    pub street: String,
    pub apartment: Option<String>,
    #[validate(length(min = 1, max = 128, message = "city is required"))]
    pub city: String,
    #[validate(length(min = 1, max = 128, message = "province is required"))]
    pub province: String,
    #[validate(length(min = 1, max = 32, message = "postal code is required"))]
    pub postal_code: String,
    #[validate(length(min = 1, max = 128, message = "country is required"))]
    pub country: String,
    pub recipient_name: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAddressRequest {
    #[validate(length(min = 1, max = 255))]
    pub street: Option<String>,
    pub apartment: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub city: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub province: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub postal_code: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub country: Option<String>,
    pub recipient_name: Option<String>,
    pub is_default: Option<bool>,
}

/// Shipping address book. At most one address per user is flagged default,
/// enforced transactionally when the flag moves.
#[derive(Clone)]
pub struct AddressService {
    db: Arc<DbPool>,
}

impl AddressService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_addresses(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<address::Model>, ServiceError> {
        Ok(Address::find()
            .filter(address::Column::UserId.eq(user_id))
            .order_by_desc(address::Column::IsDefault)
            .order_by_asc(address::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self), fields(user_id = %user_id, address_id = %address_id))]
    pub async fn get_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
    ) -> Result<address::Model, ServiceError> {
        Address::find_by_id(address_id)
            .filter(address::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("address {} not found", address_id)))
    }

    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn create_address(
        &self,
        user_id: Uuid,
        request: CreateAddressRequest,
    ) -> Result<address::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let now = Utc::now();
        let txn = self.db.begin().await?;

        if request.is_default {
            Self::clear_default(&txn, user_id).await?;
        }

        let created = address::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            street: Set(request.street),
            apartment: Set(request.apartment),
            city: Set(request.city),
            province: Set(request.province),
            postal_code: Set(request.postal_code),
            country: Set(request.country),
            recipient_name: Set(request.recipient_name),
            is_default: Set(request.is_default),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        info!(address_id = %created.id, "address created");
        Ok(created)
    }

    #[instrument(skip(self, request), fields(user_id = %user_id, address_id = %address_id))]
    pub async fn update_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
        request: UpdateAddressRequest,
    ) -> Result<address::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let existing = self.get_address(user_id, address_id).await?;
        let txn = self.db.begin().await?;

        if request.is_default == Some(true) && !existing.is_default {
            Self::clear_default(&txn, user_id).await?;
        }

        let mut update: address::ActiveModel = existing.into();
        if let Some(street) = request.street {
            update.street = Set(street);
        }
        if let Some(apartment) = request.apartment {
            update.apartment = Set(Some(apartment));
        }
        if let Some(city) = request.city {
            update.city = Set(city);
        }
        if let Some(province) = request.province {
            update.province = Set(province);
        }
        if let Some(postal_code) = request.postal_code {
            update.postal_code = Set(postal_code);
        }
        if let Some(country) = request.country {
            update.country = Set(country);
        }
        if let Some(recipient_name) = request.recipient_name {
            update.recipient_name = Set(Some(recipient_name));
        }
        if let Some(is_default) = request.is_default {
            update.is_default = Set(is_default);
        }
        update.updated_at = Set(Utc::now());

        let updated = update.update(&txn).await?;
        txn.commit().await?;
        Ok(updated)
    }

    /// A default address cannot be deleted; callers must promote another
    /// address first so checkout always has a usable destination.
    #[instrument(skip(self), fields(user_id = %user_id, address_id = %address_id))]
    pub async fn delete_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
    ) -> Result<(), ServiceError> {
        let address = self.get_address(user_id, address_id).await?;
        if address.is_default {
            return Err(ServiceError::InvalidOperation(
                "cannot delete the default address".into(),
            ));
        }
        address.delete(&*self.db).await?;
        Ok(())
    }

    async fn clear_default(
        txn: &sea_orm::DatabaseTransaction,
        user_id: Uuid,
    ) -> Result<(), ServiceError> {
        Address::update_many()
            .col_expr(address::Column::IsDefault, sea_orm::sea_query::Expr::value(false))
            .filter(address::Column::UserId.eq(user_id))
            .filter(address::Column::IsDefault.eq(true))
            .exec(txn)
            .await?;
        Ok(())
    }
}
