use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    auth::{permissions::roles, AuthRouterExt, CurrentUser, Permission},
    entities::order,
    errors::{ErrorResponse, ServiceError},
    handlers::{
        common::{
            created_response, message_response, paginated_response, success_response,
            validate_input, PaginationParams,
        },
        AppState,
    },
    services::{
        order_status::PaymentConfirmation,
        orders::{CheckoutRequest, OrderDetail, OrderHistoryQuery, OrderListQuery},
    },
    ApiResponse, ApiResult,
};

/// Converts the caller's cart into a PENDING order
#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Order created"),
        (status = 400, description = "Cart is empty, stock exceeded or address invalid", body = ErrorResponse),
        (status = 404, description = "Address not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderDetail>>), ServiceError> {
    validate_input(&payload)?;
    let order = state.services.orders.create_order(user.id, payload).await?;
    Ok(created_response("Order created", order))
}

#[utoipa::path(
    get,
    path = "/api/orders/get-all",
    params(OrderHistoryQuery),
    responses((status = 200, description = "Caller's orders, newest first")),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn order_history(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<OrderHistoryQuery>,
) -> ApiResult<Vec<OrderDetail>> {
    let orders = state
        .services
        .orders
        .order_history(user.id, query.status.as_deref())
        .await?;
    Ok(success_response("Order fetched", orders))
}

pub async fn get_own_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderDetail> {
    let order = state.services.orders.find_user_order(user.id, id).await?;
    Ok(success_response("Order fetched successfully", order))
}

pub async fn cancel_own_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<order::Model> {
    let order = state
        .services
        .order_status
        .cancel(id, Some(user.id))
        .await?;
    Ok(success_response("Order cancelled successfully", order))
}

/// Records a completed payment and moves the order to PLACED
#[utoipa::path(
    post,
    path = "/api/orders/{id}/payment",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = PaymentConfirmation,
    responses(
        (status = 200, description = "Order placed"),
        (status = 400, description = "Order is not pending", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<PaymentConfirmation>,
) -> ApiResult<order::Model> {
    validate_input(&payload)?;
    let order = state.services.order_status.place(user.id, id, payload).await?;
    Ok(success_response("Payment recorded, order placed", order))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/all",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders matching the filters"),
        (status = 400, description = "Unknown status or malformed date", body = ErrorResponse),
        (status = 403, description = "Missing view-order permission", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "admin-orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> ApiResult<Vec<OrderDetail>> {
    let (orders, total) = state.services.orders.list_orders(&query).await?;
    let pagination = PaginationParams::resolve(query.page, query.limit).meta(total);
    Ok(paginated_response("Orders fetched successfully", orders, pagination))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderDetail> {
    let order = state.services.orders.find_order(id).await?;
    Ok(success_response("Order fetched successfully", order))
}

pub async fn confirm_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<order::Model> {
    let order = state.services.order_status.confirm(id).await?;
    Ok(success_response("Order confirmed successfully", order))
}

pub async fn ship_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<order::Model> {
    let order = state.services.order_status.ship(id).await?;
    Ok(success_response("Order shipped successfully", order))
}

pub async fn deliver_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<order::Model> {
    let order = state.services.order_status.deliver(id).await?;
    Ok(success_response("Order marked as delivered", order))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<order::Model> {
    let order = state.services.order_status.cancel(id, None).await?;
    Ok(success_response("Order cancelled successfully", order))
}

pub async fn delete_order(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<()> {
    state.services.orders.delete_order(id).await?;
    Ok(message_response(
        "Order and its associated order items deleted successfully",
    ))
}

pub fn customer_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order))
        .route("/get-all", get(order_history))
        .route("/:id", get(get_own_order))
        .route("/:id/cancel", patch(cancel_own_order))
        .route("/:id/payment", post(confirm_payment))
        .with_customer_auth()
}

pub fn admin_order_routes() -> Router<AppState> {
    let read = Router::new()
        .route("/all", get(list_orders))
        .route("/:id", get(get_order))
        .with_permission(Permission::ViewOrder);

    let status = Router::new()
        .route("/:id/confirmed", patch(confirm_order))
        .route("/:id/ship", patch(ship_order))
        .route("/:id/deliver", patch(deliver_order))
        .route("/:id/cancel", patch(cancel_order))
        .with_permission(Permission::UpdateOrderStatus);

    let remove = Router::new()
        .route("/:id", delete(delete_order))
        .with_role(roles::DEVELOPER);

    Router::new().merge(read).merge(status).merge(remove)
}
