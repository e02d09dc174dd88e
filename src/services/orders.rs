use crate::{
    common::{round_money, DateRangeParams},
    entities::{
        address::{self, AddressSnapshot},
        cart, cart_item,
        order::{self, OrderStatus, PaymentStatus},
        order_item,
    },
    errors::ServiceError,
    services::{
        addresses::{insert_address, AddressInput},
        cart::{refresh_cart, LiveLine},
    },
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Checkout input: an existing address of the user or a new one.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CheckoutRequest {
    pub address_id: Option<Uuid>,
    #[validate]
    pub address: Option<AddressInput>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderHistoryQuery {
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderListQuery {
    pub status: Option<String>,
    pub user_id: Option<Uuid>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// An order with its items
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// Sums snapshot line totals and quantities.
pub fn order_totals(items: &[order_item::ActiveModel]) -> (Decimal, i32) {
    items.iter().fold((Decimal::ZERO, 0), |(price, qty), item| {
        let line = item.line_total.clone().take().unwrap_or_default();
        let quantity = item.quantity.clone().take().unwrap_or_default();
        (round_money(price + line), qty.saturating_add(quantity))
    })
}

/// Stock a cart line draws from: the selected size for variant lines,
/// otherwise the product's own quantity.
fn available_stock(line: &LiveLine) -> i32 {
    match (&line.variant, line.item.size.as_deref()) {
        (Some(variant), Some(size)) => variant.size_stock(size).unwrap_or(0),
        (Some(_), None) => 0,
        (None, _) => line.product.quantity,
    }
}

/// Lines drawing on the same stock share a pool: a variant size, or the
/// product itself when it has no variants.
fn stock_pool(line: &LiveLine) -> (Uuid, Option<Uuid>, Option<String>) {
    (
        line.product.id,
        line.variant.as_ref().map(|v| v.id),
        line.variant
            .as_ref()
            .and(line.item.size.as_deref())
            .map(|s| s.trim().to_lowercase()),
    )
}

/// Total quantity the cart asks of each stock pool.
fn requested_per_pool(lines: &[LiveLine]) -> HashMap<(Uuid, Option<Uuid>, Option<String>), i32> {
    let mut requested = HashMap::new();
    for line in lines {
        let total: &mut i32 = requested.entry(stock_pool(line)).or_default();
        *total = total.saturating_add(line.item.quantity);
    }
    requested
}

pub fn parse_status(raw: Option<&str>) -> Result<Option<OrderStatus>, ServiceError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => OrderStatus::from_str(s)
            .map(Some)
            .map_err(|_| ServiceError::BadRequest(format!("Invalid order status: {}", s))),
    }
}

/// Checkout and order queries
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Snapshots the user's live cart into a PENDING order. Runs in one
    /// transaction; any stock shortfall rolls the whole checkout back.
    #[instrument(skip(self, request))]
    pub async fn create_order(
        &self,
        user_id: Uuid,
        request: CheckoutRequest,
    ) -> Result<OrderDetail, ServiceError> {
        let txn = self.db.begin().await?;

        let shipping = match (request.address_id, request.address) {
            (Some(address_id), _) => address::Entity::find_by_id(address_id)
                .filter(address::Column::UserId.eq(user_id))
                .one(&txn)
                .await?
                .ok_or_else(|| ServiceError::NotFound("Provided address not found".to_string()))?,
            (None, Some(input)) => insert_address(&txn, user_id, input).await?,
            (None, None) => {
                return Err(ServiceError::BadRequest(
                    "A shipping address is required".to_string(),
                ))
            }
        };

        let live = refresh_cart(&txn, user_id).await?;
        if live.lines.is_empty() {
            return Err(ServiceError::BadRequest("Cart is empty".to_string()));
        }

        let order_id = Uuid::new_v4();
        let now = Utc::now();
        let requested = requested_per_pool(&live.lines);
        let mut snapshots = Vec::with_capacity(live.lines.len());
        for line in &live.lines {
            let wanted = requested
                .get(&stock_pool(line))
                .copied()
                .unwrap_or(line.item.quantity);
            if wanted > available_stock(line) {
                warn!(product_id = %line.product.id, "checkout rejected for insufficient stock");
                return Err(ServiceError::BadRequest(format!(
                    "Insufficient stock for product: {}",
                    line.product.name
                )));
            }

            snapshots.push(order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product.id),
                product_name: Set(line.product.name.clone()),
                variant_id: Set(line.variant.as_ref().map(|v| v.id)),
                variant_title: Set(line.variant.as_ref().map(|v| v.title.clone())),
                size: Set(line.item.size.clone()),
                color: Set(line.item.color.clone()),
                quantity: Set(line.item.quantity),
                unit_price: Set(round_money(line.item.unit_price)),
                line_total: Set(round_money(line.item.line_total)),
                created_at: Set(now),
            });
        }

        let (total_price, total_item) = order_totals(&snapshots);
        let shipping_json = serde_json::to_value(AddressSnapshot::from(&shipping))
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;

        let order = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user_id),
            address_id: Set(Some(shipping.id)),
            shipping_address: Set(shipping_json),
            total_price: Set(total_price),
            total_item: Set(total_item),
            status: Set(OrderStatus::Pending),
            payment_method: Set(None),
            transaction_id: Set(None),
            payment_id: Set(None),
            payment_status: Set(PaymentStatus::Pending),
            order_date: Set(now),
            delivery_date: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            items.push(snapshot.insert(&txn).await?);
        }

        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(live.cart.id))
            .exec(&txn)
            .await?;
        let mut emptied: cart::ActiveModel = live.cart.into();
        emptied.total_price = Set(Decimal::ZERO);
        emptied.total_item = Set(0);
        emptied.updated_at = Set(now);
        emptied.update(&txn).await?;

        txn.commit().await?;

        info!(order_id = %order.id, total = %order.total_price, items = order.total_item, "order created");
        Ok(OrderDetail { order, items })
    }

    async fn attach_items(&self, orders: Vec<order::Model>) -> Result<Vec<OrderDetail>, ServiceError> {
        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let mut grouped: HashMap<Uuid, Vec<order_item::Model>> = HashMap::new();
        for item in order_item::Entity::find()
            .filter(order_item::Column::OrderId.is_in(ids))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(&*self.db)
            .await?
        {
            grouped.entry(item.order_id).or_default().push(item);
        }

        Ok(orders
            .into_iter()
            .map(|order| OrderDetail {
                items: grouped.remove(&order.id).unwrap_or_default(),
                order,
            })
            .collect())
    }

    /// The user's orders, newest first, optionally filtered by status.
    #[instrument(skip(self))]
    pub async fn order_history(
        &self,
        user_id: Uuid,
        status: Option<&str>,
    ) -> Result<Vec<OrderDetail>, ServiceError> {
        let mut query = order::Entity::find().filter(order::Column::UserId.eq(user_id));
        if let Some(status) = parse_status(status)? {
            query = query.filter(order::Column::Status.eq(status));
        }
        let orders = query
            .order_by_desc(order::Column::OrderDate)
            .all(&*self.db)
            .await?;
        self.attach_items(orders).await
    }

    pub async fn find_user_order(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderDetail, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .filter(order::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;
        self.single(order).await
    }

    pub async fn find_order(&self, order_id: Uuid) -> Result<OrderDetail, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;
        self.single(order).await
    }

    async fn single(&self, order: order::Model) -> Result<OrderDetail, ServiceError> {
        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(OrderDetail { order, items })
    }

    /// Administrative listing with filters. Returns the page and the total count.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        query: &OrderListQuery,
    ) -> Result<(Vec<OrderDetail>, u64), ServiceError> {
        let mut select = order::Entity::find();
        if let Some(status) = parse_status(query.status.as_deref())? {
            select = select.filter(order::Column::Status.eq(status));
        }
        if let Some(user_id) = query.user_id {
            select = select.filter(order::Column::UserId.eq(user_id));
        }
        let (from, to) = DateRangeParams {
            from: query.from.clone(),
            to: query.to.clone(),
        }
        .to_datetime_range()?;
        if let Some(from) = from {
            select = select.filter(order::Column::OrderDate.gte(from));
        }
        if let Some(to) = to {
            select = select.filter(order::Column::OrderDate.lte(to));
        }

        let limit = query.limit.unwrap_or(10).clamp(1, 100);
        let page = query.page.unwrap_or(1).max(1);
        let paginator = select
            .order_by_desc(order::Column::OrderDate)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;

        Ok((self.attach_items(orders).await?, total))
    }

    #[instrument(skip(self))]
    pub async fn delete_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        let order = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        order_item::Entity::delete_many()
            .filter(order_item::Column::OrderId.eq(order.id))
            .exec(&txn)
            .await?;
        order::Entity::delete_by_id(order.id).exec(&txn).await?;
        txn.commit().await?;

        info!(order_id = %order_id, "order deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn snapshot(quantity: i32, line_total: Decimal) -> order_item::ActiveModel {
        order_item::ActiveModel {
            quantity: Set(quantity),
            line_total: Set(line_total),
            ..Default::default()
        }
    }

    #[test]
    fn order_totals_cover_surviving_snapshots() {
        let items = vec![snapshot(3, dec!(300)), snapshot(1, dec!(49.50))];
        assert_eq!(order_totals(&items), (dec!(349.50), 4));
        assert_eq!(order_totals(&[]), (Decimal::ZERO, 0));
    }

    #[test]
    fn status_filter_is_case_insensitive() {
        assert_eq!(parse_status(Some("delivered")).unwrap(), Some(OrderStatus::Delivered));
        assert_eq!(parse_status(Some(" Placed ")).unwrap(), Some(OrderStatus::Placed));
        assert_eq!(parse_status(Some("")).unwrap(), None);
        assert_matches!(parse_status(Some("lost")), Err(ServiceError::BadRequest(_)));
    }
}
