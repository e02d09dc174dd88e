use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post, put},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    auth::{AuthRouterExt, Permission},
    entities::product,
    errors::{ErrorResponse, ServiceError},
    handlers::{
        common::{created_response, message_response, success_response, validate_input},
        AppState,
    },
    services::products::{
        BulkCreateResult, CreateProductRequest, ProductDetail, ProductListQuery, ProductPage,
        UpdateProductRequest, UpdateQuantityRequest, UpdateStatusRequest,
    },
    ApiResponse, ApiResult,
};

#[utoipa::path(
    post,
    path = "/api/product/add",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created with its variants"),
        (status = 400, description = "Invalid product", body = ErrorResponse),
        (status = 409, description = "Duplicate slug", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProductDetail>>), ServiceError> {
    validate_input(&payload)?;
    let product = state.services.catalog.create_product(payload).await?;
    Ok(created_response("Product added", product))
}

/// Bulk insert. Entries are validated and stored independently.
pub async fn create_many(
    State(state): State<AppState>,
    Json(payload): Json<Vec<serde_json::Value>>,
) -> Result<(StatusCode, Json<ApiResponse<BulkCreateResult>>), ServiceError> {
    if payload.is_empty() {
        return Err(ServiceError::ValidationError(
            "Invalid input. Request body must be a non-empty array of products".to_string(),
        ));
    }
    let result = state.services.catalog.create_many(payload).await?;
    Ok(created_response("Product creation process completed", result))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> ApiResult<product::Model> {
    validate_input(&payload)?;
    let product = state.services.catalog.update_product(id, payload).await?;
    Ok(success_response("Product updated successfully", product))
}

pub async fn update_quantity(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> ApiResult<product::Model> {
    validate_input(&payload)?;
    let product = state
        .services
        .catalog
        .update_quantity(id, payload.quantity)
        .await?;
    Ok(success_response("Product quantity updated successfully", product))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> ApiResult<product::Model> {
    let product = state
        .services
        .catalog
        .update_status(id, payload.is_active)
        .await?;
    Ok(success_response("Product status updated successfully", product))
}

pub async fn delete_product(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<()> {
    state.services.catalog.delete_product(id).await?;
    Ok(message_response("Product deleted successfully"))
}

/// Public catalog listing with filters, sorting and pagination
#[utoipa::path(
    get,
    path = "/api/product/get-all",
    params(ProductListQuery),
    responses(
        (status = 200, description = "A page of active products"),
        (status = 400, description = "Malformed filter value", body = ErrorResponse),
    ),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> ApiResult<ProductPage> {
    let page = state.services.catalog.list_products(&query).await?;
    let message = if page.products.is_empty() {
        "No products found"
    } else {
        "Products fetched successfully"
    };
    Ok(success_response(message, page))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ProductDetail> {
    let product = state.services.catalog.get_product(id).await?;
    Ok(success_response("Product fetched successfully", product))
}

pub fn product_routes() -> Router<AppState> {
    let public = Router::new()
        .route("/get-all", get(list_products))
        .route("/:id", get(get_product));

    let add = Router::new()
        .route("/add", post(create_product))
        .route("/add/many", post(create_many))
        .with_permission(Permission::AddProduct);

    let update = Router::new()
        .route("/:id", put(update_product).delete(delete_product))
        .route("/quantity/:id", patch(update_quantity))
        .route("/status/:id", patch(update_status))
        .with_permission(Permission::UpdateProduct);

    Router::new().merge(public).merge(add).merge(update)
}
