use axum::{extract::State, routing::get, Router};

use crate::{
    auth::{AuthRouterExt, Permission},
    handlers::{common::success_response, AppState},
    services::dashboard::DashboardOverview,
    ApiResult,
};

/// Order, cart and customer counters with week-over-week progress
pub async fn order_overview(State(state): State<AppState>) -> ApiResult<DashboardOverview> {
    let overview = state.services.dashboard.overview().await?;
    Ok(success_response("Dashboard data fetched successfully", overview))
}

pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/order/overview", get(order_overview))
        .with_permission(Permission::ViewDashboard)
}
