use crate::{
    entities::{product, user, wishlist_item},
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WishlistRequest {
    pub product_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct WishlistView {
    pub products: Vec<product::Model>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WishedProduct {
    pub id: Uuid,
    pub name: String,
    pub discounted_price: Decimal,
}

/// One customer's wishlist in the admin overview
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct UserWishlist {
    pub user_id: Uuid,
    pub first_name: String,
    pub email: String,
    pub products: Vec<WishedProduct>,
    pub total: usize,
}

/// Groups `(user_id, product)` pairs by user, keeping the order users first appear in.
pub fn group_by_user(
    entries: Vec<(Uuid, WishedProduct)>,
    users: &HashMap<Uuid, user::Model>,
) -> Vec<UserWishlist> {
    let mut order: Vec<Uuid> = Vec::new();
    let mut grouped: HashMap<Uuid, Vec<WishedProduct>> = HashMap::new();
    for (user_id, product) in entries {
        if !users.contains_key(&user_id) {
            continue;
        }
        let bucket = grouped.entry(user_id).or_insert_with(|| {
            order.push(user_id);
            Vec::new()
        });
        bucket.push(product);
    }

    order
        .into_iter()
        .filter_map(|user_id| {
            let owner = users.get(&user_id)?;
            let products = grouped.remove(&user_id)?;
            Some(UserWishlist {
                user_id,
                first_name: owner.first_name.clone(),
                email: owner.email.clone(),
                total: products.len(),
                products,
            })
        })
        .collect()
}

#[derive(Clone)]
pub struct WishlistService {
    db: Arc<DatabaseConnection>,
}

impl WishlistService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn add(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<wishlist_item::Model, ServiceError> {
        let db = &*self.db;
        if product::Entity::find_by_id(product_id).one(db).await?.is_none() {
            return Err(ServiceError::NotFound("Product not found".to_string()));
        }

        let duplicate = || {
            ServiceError::BadRequest("This product is already in your wishlist.".to_string())
        };
        let existing = wishlist_item::Entity::find()
            .filter(wishlist_item::Column::UserId.eq(user_id))
            .filter(wishlist_item::Column::ProductId.eq(product_id))
            .one(db)
            .await?;
        if existing.is_some() {
            return Err(duplicate());
        }

        let saved = wishlist_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            product_id: Set(product_id),
            added_at: Set(Utc::now()),
        }
        .insert(db)
        .await
        .map_err(|e| match ServiceError::from_db(e, "") {
            ServiceError::Conflict(_) => duplicate(),
            other => other,
        })?;

        info!(product_id = %product_id, "added to wishlist");
        Ok(saved)
    }

    /// The user's wished products, most recent first.
    pub async fn list(&self, user_id: Uuid) -> Result<WishlistView, ServiceError> {
        let products: Vec<product::Model> = wishlist_item::Entity::find()
            .filter(wishlist_item::Column::UserId.eq(user_id))
            .order_by_desc(wishlist_item::Column::AddedAt)
            .find_also_related(product::Entity)
            .all(&*self.db)
            .await?
            .into_iter()
            .filter_map(|(_, product)| product)
            .collect();

        Ok(WishlistView {
            total: products.len(),
            products,
        })
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, user_id: Uuid, product_id: Uuid) -> Result<(), ServiceError> {
        let removed = wishlist_item::Entity::delete_many()
            .filter(wishlist_item::Column::UserId.eq(user_id))
            .filter(wishlist_item::Column::ProductId.eq(product_id))
            .exec(&*self.db)
            .await?;
        if removed.rows_affected == 0 {
            return Err(ServiceError::BadRequest(
                "Product not found in wishlist or already removed.".to_string(),
            ));
        }
        Ok(())
    }

    /// Every wishlist, grouped by customer.
    pub async fn list_all(&self) -> Result<Vec<UserWishlist>, ServiceError> {
        let db = &*self.db;
        let rows = wishlist_item::Entity::find()
            .order_by_asc(wishlist_item::Column::AddedAt)
            .find_also_related(product::Entity)
            .all(db)
            .await?;

        let entries: Vec<(Uuid, WishedProduct)> = rows
            .into_iter()
            .filter_map(|(item, product)| {
                product.map(|p| {
                    (
                        item.user_id,
                        WishedProduct {
                            id: p.id,
                            name: p.name,
                            discounted_price: p.discounted_price,
                        },
                    )
                })
            })
            .collect();

        let mut user_ids: Vec<Uuid> = entries.iter().map(|(u, _)| *u).collect();
        user_ids.sort();
        user_ids.dedup();
        let users: HashMap<Uuid, user::Model> = if user_ids.is_empty() {
            HashMap::new()
        } else {
            user::Entity::find()
                .filter(user::Column::Id.is_in(user_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|u| (u.id, u))
                .collect()
        };

        Ok(group_by_user(entries, &users))
    }
}
