use crate::{
    entities::{
        order::{self, OrderStatus},
        order_item, product, review, user,
    },
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReviewRequest {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    #[validate(length(max = 2000))]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewView {
    #[serde(flatten)]
    pub review: review::Model,
    pub reviewer_first_name: Option<String>,
}

/// Aggregate over approved reviews
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingSummary {
    pub average: Decimal,
    pub count: i32,
}

pub fn summarize_ratings(ratings: &[i32]) -> RatingSummary {
    if ratings.is_empty() {
        return RatingSummary {
            average: Decimal::ZERO,
            count: 0,
        };
    }
    let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    let count = ratings.len() as i32;
    RatingSummary {
        average: (Decimal::from(sum) / Decimal::from(count)).round_dp(2),
        count,
    }
}

fn normalize_body(body: Option<String>) -> Option<String> {
    body.map(|b| b.trim().to_string()).filter(|b| !b.is_empty())
}

/// Stores the approved-review aggregate on the product.
async fn refresh_rating<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<RatingSummary, ServiceError> {
    let ratings: Vec<i32> = review::Entity::find()
        .select_only()
        .column(review::Column::Rating)
        .filter(review::Column::ProductId.eq(product_id))
        .filter(review::Column::Approved.eq(true))
        .into_tuple()
        .all(conn)
        .await?;
    let summary = summarize_ratings(&ratings);

    if let Some(p) = product::Entity::find_by_id(product_id).one(conn).await? {
        let mut active: product::ActiveModel = p.into();
        active.average_rating = Set(summary.average);
        active.num_ratings = Set(summary.count);
        active.update(conn).await?;
    }
    Ok(summary)
}

async fn has_purchased<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    product_id: Uuid,
) -> Result<bool, ServiceError> {
    let order_ids: Vec<Uuid> = order::Entity::find()
        .select_only()
        .column(order::Column::Id)
        .filter(order::Column::UserId.eq(user_id))
        .filter(order::Column::Status.is_in([OrderStatus::Delivered, OrderStatus::Confirmed]))
        .into_tuple()
        .all(conn)
        .await?;
    if order_ids.is_empty() {
        return Ok(false);
    }

    let matching = order_item::Entity::find()
        .filter(order_item::Column::OrderId.is_in(order_ids))
        .filter(order_item::Column::ProductId.eq(product_id))
        .count(conn)
        .await?;
    Ok(matching > 0)
}

#[derive(Clone)]
pub struct ReviewService {
    db: Arc<DatabaseConnection>,
}

impl ReviewService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn ensure_product<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<(), ServiceError> {
        product::Entity::find_by_id(id)
            .one(conn)
            .await?
            .map(|_| ())
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))
    }

    #[instrument(skip(self, request))]
    pub async fn submit(
        &self,
        product_id: Uuid,
        user_id: Uuid,
        request: ReviewRequest,
    ) -> Result<review::Model, ServiceError> {
        let txn = self.db.begin().await?;
        Self::ensure_product(&txn, product_id).await?;

        let existing = review::Entity::find()
            .filter(review::Column::ProductId.eq(product_id))
            .filter(review::Column::UserId.eq(user_id))
            .one(&txn)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::BadRequest(
                "User has already reviewed this product".to_string(),
            ));
        }

        if !has_purchased(&txn, user_id, product_id).await? {
            return Err(ServiceError::Forbidden(
                "User has not purchased this product".to_string(),
            ));
        }

        let now = Utc::now();
        let created = review::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            user_id: Set(user_id),
            rating: Set(request.rating),
            body: Set(normalize_body(request.body)),
            approved: Set(false),
            approved_by: Set(None),
            approved_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| match ServiceError::from_db(e, "") {
            ServiceError::Conflict(_) => {
                ServiceError::BadRequest("User has already reviewed this product".to_string())
            }
            other => other,
        })?;

        refresh_rating(&txn, product_id).await?;
        txn.commit().await?;

        info!(review_id = %created.id, "review submitted");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn approve(
        &self,
        approver_id: Uuid,
        review_id: Uuid,
    ) -> Result<review::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let existing = review::Entity::find_by_id(review_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::BadRequest("Review does not exist in our database.".to_string())
            })?;
        if existing.approved {
            return Err(ServiceError::Conflict("Review is already approved.".to_string()));
        }

        let product_id = existing.product_id;
        let now = Utc::now();
        let mut active: review::ActiveModel = existing.into();
        active.approved = Set(true);
        active.approved_by = Set(Some(approver_id));
        active.approved_at = Set(Some(now));
        active.updated_at = Set(now);
        let approved = active.update(&txn).await?;

        refresh_rating(&txn, product_id).await?;
        txn.commit().await?;

        info!(review_id = %review_id, approver = %approver_id, "review approved");
        Ok(approved)
    }

    /// Edits a review. The text becomes immutable once it has been written.
    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        product_id: Uuid,
        user_id: Uuid,
        request: ReviewRequest,
    ) -> Result<review::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let existing = review::Entity::find()
            .filter(review::Column::ProductId.eq(product_id))
            .filter(review::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound("Review not found for this product and user".to_string())
            })?;
        if existing.body.is_some() {
            return Err(ServiceError::BadRequest(
                "Review text can no longer be updated".to_string(),
            ));
        }

        let approved = existing.approved;
        let mut active: review::ActiveModel = existing.into();
        active.rating = Set(request.rating);
        active.body = Set(normalize_body(request.body));
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        if approved {
            refresh_rating(&txn, product_id).await?;
        }
        txn.commit().await?;
        Ok(updated)
    }

    /// Approved reviews for a product, newest first, with the total count.
    pub async fn list_approved(
        &self,
        product_id: Uuid,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<ReviewView>, u64), ServiceError> {
        Self::ensure_product(&*self.db, product_id).await?;

        let paginator = review::Entity::find()
            .filter(review::Column::ProductId.eq(product_id))
            .filter(review::Column::Approved.eq(true))
            .order_by_desc(review::Column::CreatedAt)
            .find_also_related(user::Entity)
            .paginate(&*self.db, limit.clamp(1, 100));
        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page.max(1) - 1).await?;

        let reviews = rows
            .into_iter()
            .map(|(review, reviewer)| ReviewView {
                review,
                reviewer_first_name: reviewer.map(|u| u.first_name),
            })
            .collect();
        Ok((reviews, total))
    }
}
