use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::{AuthRouterExt, Permission},
    entities::category,
    errors::{ErrorResponse, ServiceError},
    handlers::{
        common::{
            created_response, paginated_response, success_response, validate_input,
            PaginationParams,
        },
        AppState,
    },
    services::categories::{
        CategoryListQuery, CategoryNode, CreateCategoryRequest, UpdateCategoryRequest,
    },
    ApiResponse, ApiResult,
};

#[utoipa::path(
    post,
    path = "/api/category/add",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created"),
        (status = 400, description = "Invalid level or parent", body = ErrorResponse),
        (status = 404, description = "Parent category not found", body = ErrorResponse),
        (status = 409, description = "Category already exists", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "categories"
)]
pub async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<category::Model>>), ServiceError> {
    validate_input(&payload)?;
    let category = state.services.categories.create(payload).await?;
    Ok(created_response("Category created successfully", category))
}

pub async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<CategoryListQuery>,
) -> ApiResult<Vec<category::Model>> {
    let (categories, total) = state.services.categories.list(&query).await?;
    let pagination = PaginationParams::resolve(query.page, query.limit).meta(total);
    Ok(paginated_response(
        "Categories fetched successfully",
        categories,
        pagination,
    ))
}

pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> ApiResult<category::Model> {
    validate_input(&payload)?;
    let category = state.services.categories.update_name(id, payload).await?;
    Ok(success_response("Category updated successfully", category))
}

/// Removes a category together with all of its descendants
#[utoipa::path(
    delete,
    path = "/api/category/delete/{id}",
    params(("id" = Uuid, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category and subcategories deleted"),
        (status = 400, description = "A product references the subtree", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "categories"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    let deleted = state.services.categories.delete_subtree(id).await?;
    Ok(success_response(
        "Category and its subcategories deleted successfully",
        json!({ "deleted_count": deleted }),
    ))
}

pub async fn category_tree(State(state): State<AppState>) -> ApiResult<Vec<CategoryNode>> {
    let tree = state.services.categories.tree().await?;
    Ok(success_response("Category tree fetched successfully", tree))
}

pub fn category_routes() -> Router<AppState> {
    let public = Router::new()
        .route("/all", get(list_categories))
        .route("/tree", get(category_tree));

    let add = Router::new()
        .route("/add", post(create_category))
        .with_permission(Permission::AddCategory);
    let update = Router::new()
        .route("/update/:id", put(update_category))
        .with_permission(Permission::UpdateCategory);
    let remove = Router::new()
        .route("/delete/:id", delete(delete_category))
        .with_permission(Permission::DeleteCategory);

    Router::new()
        .merge(public)
        .merge(add)
        .merge(update)
        .merge(remove)
}
