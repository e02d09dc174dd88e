use crate::{entities::address, errors::ServiceError};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub static MOBILE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{8,15}$").unwrap());
pub static ZIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{5,6}$").unwrap());

const DEFAULT_COUNTRY: &str = "India";

fn default_country() -> String {
    DEFAULT_COUNTRY.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AddressInput {
    #[validate(length(min = 1, max = 50, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 50, message = "Last name is required"))]
    pub last_name: String,
    #[validate(regex(path = "MOBILE_RE", message = "Mobile number must be 8 to 15 digits"))]
    pub mobile: String,
    #[validate(length(min = 1, max = 200, message = "Street address is required"))]
    pub street_address: String,
    #[validate(length(min = 1, max = 100, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, max = 100, message = "State is required"))]
    pub state: String,
    #[validate(regex(path = "ZIP_RE", message = "Zip code must be 5 or 6 digits"))]
    pub zip_code: String,
    #[serde(default = "default_country")]
    #[validate(length(min = 1, max = 60))]
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateAddressRequest {
    #[validate(length(min = 1, max = 50))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub last_name: Option<String>,
    #[validate(regex(path = "MOBILE_RE", message = "Mobile number must be 8 to 15 digits"))]
    pub mobile: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub street_address: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub state: Option<String>,
    #[validate(regex(path = "ZIP_RE", message = "Zip code must be 5 or 6 digits"))]
    pub zip_code: Option<String>,
    #[validate(length(min = 1, max = 60))]
    pub country: Option<String>,
    pub is_default: Option<bool>,
}

async fn clear_defaults<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> Result<(), ServiceError> {
    address::Entity::update_many()
        .col_expr(address::Column::IsDefault, Expr::value(false))
        .filter(address::Column::UserId.eq(user_id))
        .filter(address::Column::IsDefault.eq(true))
        .exec(conn)
        .await?;
    Ok(())
}

/// Inserts an address for `user_id`, clearing other defaults when this one is default.
pub async fn insert_address<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    input: AddressInput,
) -> Result<address::Model, ServiceError> {
    if input.is_default {
        clear_defaults(conn, user_id).await?;
    }

    let now = Utc::now();
    let model = address::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        first_name: Set(input.first_name.trim().to_string()),
        last_name: Set(input.last_name.trim().to_string()),
        mobile: Set(input.mobile),
        street_address: Set(input.street_address.trim().to_string()),
        city: Set(input.city.trim().to_string()),
        state: Set(input.state.trim().to_string()),
        zip_code: Set(input.zip_code),
        country: Set(input.country.trim().to_string()),
        is_default: Set(input.is_default),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;
    Ok(model)
}

#[derive(Clone)]
pub struct AddressService {
    db: Arc<DatabaseConnection>,
}

impl AddressService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, input))]
    pub async fn create(
        &self,
        user_id: Uuid,
        input: AddressInput,
    ) -> Result<address::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let created = insert_address(&txn, user_id, input).await?;
        txn.commit().await?;
        info!(address_id = %created.id, "address created");
        Ok(created)
    }

    /// The user's addresses, default first.
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<address::Model>, ServiceError> {
        Ok(address::Entity::find()
            .filter(address::Column::UserId.eq(user_id))
            .order_by_desc(address::Column::IsDefault)
            .order_by_desc(address::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    pub async fn get(&self, user_id: Uuid, id: Uuid) -> Result<address::Model, ServiceError> {
        address::Entity::find_by_id(id)
            .filter(address::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Address not found".to_string()))
    }

    /// Administrative update of any address.
    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateAddressRequest,
    ) -> Result<address::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let existing = address::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Address not found".to_string()))?;

        if request.is_default == Some(true) {
            clear_defaults(&txn, existing.user_id).await?;
        }

        let mut active: address::ActiveModel = existing.into();
        if let Some(v) = request.first_name {
            active.first_name = Set(v.trim().to_string());
        }
        if let Some(v) = request.last_name {
            active.last_name = Set(v.trim().to_string());
        }
        if let Some(v) = request.mobile {
            active.mobile = Set(v);
        }
        if let Some(v) = request.street_address {
            active.street_address = Set(v.trim().to_string());
        }
        if let Some(v) = request.city {
            active.city = Set(v.trim().to_string());
        }
        if let Some(v) = request.state {
            active.state = Set(v.trim().to_string());
        }
        if let Some(v) = request.zip_code {
            active.zip_code = Set(v);
        }
        if let Some(v) = request.country {
            active.country = Set(v.trim().to_string());
        }
        if let Some(v) = request.is_default {
            active.is_default = Set(v);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&txn).await?;
        txn.commit().await?;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        let result = address::Entity::delete_many()
            .filter(address::Column::Id.eq(id))
            .filter(address::Column::UserId.eq(user_id))
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound("Address not found".to_string()));
        }
        Ok(())
    }
}
