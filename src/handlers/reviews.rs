use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    auth::{AuthRouterExt, CurrentAdmin, CurrentUser, Permission},
    entities::review,
    errors::{ErrorResponse, ServiceError},
    handlers::{
        common::{
            created_response, paginated_response, success_response, validate_input,
            PaginationParams,
        },
        AppState,
    },
    services::reviews::{ReviewRequest, ReviewView},
    ApiResponse, ApiResult,
};

/// Review a purchased product
#[utoipa::path(
    post,
    path = "/api/reviews/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = ReviewRequest,
    responses(
        (status = 201, description = "Review submitted, pending approval"),
        (status = 400, description = "Already reviewed", body = ErrorResponse),
        (status = 403, description = "Product not purchased", body = ErrorResponse),
        (status = 404, description = "Product not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "reviews"
)]
pub async fn submit_review(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<ReviewRequest>,
) -> Result<(StatusCode, Json<ApiResponse<review::Model>>), ServiceError> {
    validate_input(&payload)?;
    let review = state
        .services
        .reviews
        .submit(product_id, user.id, payload)
        .await?;
    Ok(created_response("Review submitted successfully", review))
}

/// Approved reviews of a product, newest first
#[utoipa::path(
    get,
    path = "/api/reviews/{id}",
    params(("id" = Uuid, Path, description = "Product id"), PaginationParams),
    responses((status = 200, description = "Approved reviews")),
    tag = "reviews"
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Query(page): Query<PaginationParams>,
) -> ApiResult<Vec<ReviewView>> {
    let (reviews, total) = state
        .services
        .reviews
        .list_approved(product_id, page.page(), page.limit())
        .await?;
    Ok(paginated_response("Fetched reviews", reviews, page.meta(total)))
}

pub async fn update_review(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<ReviewRequest>,
) -> ApiResult<review::Model> {
    validate_input(&payload)?;
    let review = state
        .services
        .reviews
        .update(product_id, user.id, payload)
        .await?;
    Ok(success_response("Review updated successfully", review))
}

pub async fn approve_review(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Path(review_id): Path<Uuid>,
) -> ApiResult<review::Model> {
    let review = state.services.reviews.approve(admin.id, review_id).await?;
    Ok(success_response("Review approved.", review))
}

pub fn review_routes() -> Router<AppState> {
    let public = Router::new().route("/:id", get(list_reviews));

    let customer = Router::new()
        .route("/:id", post(submit_review).put(update_review))
        .with_customer_auth();

    let admin = Router::new()
        .route("/approve/:id", patch(approve_review))
        .with_permission(Permission::ApproveReview);

    Router::new().merge(public).merge(customer).merge(admin)
}
