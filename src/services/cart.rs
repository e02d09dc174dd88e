use crate::{
    common::round_money,
    entities::{cart, cart_item, product, product_variant},
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Selection of a product, optionally narrowed to a variant, size and color.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AddCartItemRequest {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    #[validate(length(min = 1, max = 50))]
    pub size: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub color: Option<String>,
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1, max = 10000, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

/// Signed change applied to a cart item's quantity
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateCartItemRequest {
    #[validate(range(min = -10000, max = 10000))]
    pub quantity: i32,
}

/// Derived cart totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CartTotals {
    pub total_price: Decimal,
    pub total_item: i32,
}

/// Sums line totals and quantities. Every cart mutation ends with this.
pub fn compute_cart_totals(items: &[cart_item::Model]) -> CartTotals {
    let (total_price, total_item) = items
        .iter()
        .fold((Decimal::ZERO, 0i32), |(price, qty), item| {
            (price + item.line_total, qty.saturating_add(item.quantity))
        });
    CartTotals {
        total_price: round_money(total_price),
        total_item,
    }
}

/// Unit price for a line: the variant's effective price when one is selected.
pub fn line_unit_price(product: &product::Model, variant: Option<&product_variant::Model>) -> Decimal {
    match variant {
        Some(v) => v.unit_price(),
        None => product.unit_price(),
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductBrief {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub brand: Option<String>,
    pub image: Option<String>,
}

impl From<&product::Model> for ProductBrief {
    fn from(p: &product::Model) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            slug: p.slug.clone(),
            brand: p.brand.clone(),
            image: p.image.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CartLineView {
    #[serde(flatten)]
    pub item: cart_item::Model,
    pub product: ProductBrief,
    pub variant_title: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_price: Decimal,
    pub total_item: i32,
    pub items: Vec<CartLineView>,
}

/// A cart line re-resolved against the live catalog
#[derive(Debug, Clone)]
pub struct LiveLine {
    pub item: cart_item::Model,
    pub product: product::Model,
    pub variant: Option<product_variant::Model>,
}

#[derive(Debug, Clone)]
pub struct LiveCart {
    pub cart: cart::Model,
    pub lines: Vec<LiveLine>,
}

impl From<LiveCart> for CartView {
    fn from(live: LiveCart) -> Self {
        Self {
            id: live.cart.id,
            user_id: live.cart.user_id,
            total_price: live.cart.total_price,
            total_item: live.cart.total_item,
            items: live
                .lines
                .into_iter()
                .map(|line| CartLineView {
                    product: ProductBrief::from(&line.product),
                    variant_title: line.variant.map(|v| v.title),
                    item: line.item,
                })
                .collect(),
        }
    }
}

/// Returns the user's cart, creating an empty one on first use.
pub async fn get_or_create_cart<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> Result<cart::Model, ServiceError> {
    if let Some(existing) = cart::Entity::find()
        .filter(cart::Column::UserId.eq(user_id))
        .one(conn)
        .await?
    {
        return Ok(existing);
    }

    let now = Utc::now();
    let created = cart::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        total_price: Set(Decimal::ZERO),
        total_item: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;
    Ok(created)
}

/// Recomputes and stores the cart totals from its persisted items.
async fn recalculate_cart_totals<C: ConnectionTrait>(
    conn: &C,
    cart: cart::Model,
) -> Result<cart::Model, ServiceError> {
    let items = cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .all(conn)
        .await?;
    store_totals(conn, cart, compute_cart_totals(&items)).await
}

async fn store_totals<C: ConnectionTrait>(
    conn: &C,
    cart: cart::Model,
    totals: CartTotals,
) -> Result<cart::Model, ServiceError> {
    let mut active: cart::ActiveModel = cart.into();
    active.total_price = Set(totals.total_price);
    active.total_item = Set(totals.total_item);
    active.updated_at = Set(Utc::now());
    Ok(active.update(conn).await?)
}

/// Re-resolves every item against the live catalog: items whose product or
/// variant is gone are deleted, line totals are refreshed, then the totals are stored.
pub async fn refresh_cart<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> Result<LiveCart, ServiceError> {
    let cart = get_or_create_cart(conn, user_id).await?;
    let items = cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .order_by_asc(cart_item::Column::CreatedAt)
        .all(conn)
        .await?;

    let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    let variant_ids: Vec<Uuid> = items.iter().filter_map(|i| i.variant_id).collect();

    let products: HashMap<Uuid, product::Model> = product::Entity::find()
        .filter(product::Column::Id.is_in(product_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    let variants: HashMap<Uuid, product_variant::Model> = product_variant::Entity::find()
        .filter(product_variant::Column::Id.is_in(variant_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|v| (v.id, v))
        .collect();

    let mut lines = Vec::with_capacity(items.len());
    let mut survivors = Vec::with_capacity(items.len());
    for item in items {
        let Some(product) = products.get(&item.product_id).cloned() else {
            info!(item_id = %item.id, product_id = %item.product_id, "dropping cart item for deleted product");
            cart_item::Entity::delete_by_id(item.id).exec(conn).await?;
            continue;
        };
        let variant = match item.variant_id {
            Some(id) => match variants.get(&id) {
                Some(variant) => Some(variant.clone()),
                None => {
                    info!(item_id = %item.id, variant_id = %id, "dropping cart item for deleted variant");
                    cart_item::Entity::delete_by_id(item.id).exec(conn).await?;
                    continue;
                }
            },
            None => None,
        };

        let unit_price = round_money(line_unit_price(&product, variant.as_ref()));
        let line_total = round_money(unit_price * Decimal::from(item.quantity));
        let item = if round_money(item.unit_price) != unit_price
            || round_money(item.line_total) != line_total
        {
            let mut active: cart_item::ActiveModel = item.into();
            active.unit_price = Set(unit_price);
            active.line_total = Set(line_total);
            active.updated_at = Set(Utc::now());
            active.update(conn).await?
        } else {
            item
        };

        survivors.push(item.clone());
        lines.push(LiveLine {
            item,
            product,
            variant,
        });
    }

    let cart = store_totals(conn, cart, compute_cart_totals(&survivors)).await?;
    Ok(LiveCart { cart, lines })
}

/// Cart operations for the authenticated customer.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Adds a product selection to the cart after checking variant, size, color and stock.
    #[instrument(skip(self, request), fields(product_id = %request.product_id))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        request: AddCartItemRequest,
    ) -> Result<cart_item::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let product = product::Entity::find_by_id(request.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;

        let variants = product_variant::Entity::find()
            .filter(product_variant::Column::ProductId.eq(product.id))
            .all(&txn)
            .await?;

        let size = request
            .size
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let color = request
            .color
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        // Size and color are stored in the variant's spelling so the
        // duplicate check below sees "m/red" and "M/Red" as one selection.
        let (variant, size, color) = if variants.is_empty() {
            if request.quantity > product.quantity {
                return Err(ServiceError::BadRequest(
                    "Requested quantity exceeds available stock".to_string(),
                ));
            }
            (None, None, None)
        } else {
            let variant_id = request.variant_id.ok_or_else(|| {
                ServiceError::BadRequest("Please select variant of product".to_string())
            })?;
            let variant = variants
                .into_iter()
                .find(|v| v.id == variant_id)
                .ok_or_else(|| {
                    ServiceError::NotFound("Product variant does not exist".to_string())
                })?;

            let color = match color {
                Some(color) => Some(variant.find_color(color).ok_or_else(|| {
                    ServiceError::NotFound(format!(
                        "Color \"{}\" is not available in this variant",
                        color
                    ))
                })?),
                None => None,
            };

            let size_name = size.ok_or_else(|| {
                ServiceError::BadRequest(
                    "Please choose the size of the variant of the product".to_string(),
                )
            })?;
            let size = match variant.find_size(size_name) {
                Some(size) if size.quantity >= request.quantity => size.name,
                _ => {
                    return Err(ServiceError::BadRequest(format!(
                        "Size \"{}\" is not available in the selected variant or insufficient quantity",
                        size_name
                    )))
                }
            };
            (Some(variant), Some(size), color)
        };

        let cart = get_or_create_cart(&txn, user_id).await?;
        let variant_id = variant.as_ref().map(|v| v.id);

        let duplicate = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product.id))
            .filter(optional_eq(cart_item::Column::VariantId, variant_id))
            .filter(optional_eq(cart_item::Column::Size, size.clone()))
            .filter(optional_eq(cart_item::Column::Color, color.clone()))
            .one(&txn)
            .await?;
        if duplicate.is_some() {
            return Err(ServiceError::Conflict("Item already in cart".to_string()));
        }

        let unit_price = round_money(line_unit_price(&product, variant.as_ref()));
        let now = Utc::now();
        let item = cart_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            cart_id: Set(cart.id),
            user_id: Set(user_id),
            product_id: Set(product.id),
            variant_id: Set(variant_id),
            size: Set(size),
            color: Set(color),
            quantity: Set(request.quantity),
            unit_price: Set(unit_price),
            line_total: Set(round_money(unit_price * Decimal::from(request.quantity))),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        recalculate_cart_totals(&txn, cart).await?;
        txn.commit().await?;

        info!(item_id = %item.id, quantity = item.quantity, "added item to cart");
        Ok(item)
    }

    /// Applies a signed quantity change to one of the user's items.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        delta: i32,
    ) -> Result<cart_item::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let item = find_user_item(&txn, user_id, item_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart item not found".to_string()))?;

        let quantity = item.quantity.saturating_add(delta);
        if quantity < 1 {
            return Err(ServiceError::BadRequest(
                "Cart item quantity must be at least 1".to_string(),
            ));
        }

        let unit_price = item.unit_price;
        let cart_id = item.cart_id;
        let mut active: cart_item::ActiveModel = item.into();
        active.quantity = Set(quantity);
        active.line_total = Set(round_money(unit_price * Decimal::from(quantity)));
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        let cart = cart::Entity::find_by_id(cart_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart not found".to_string()))?;
        recalculate_cart_totals(&txn, cart).await?;
        txn.commit().await?;

        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn remove_item(&self, user_id: Uuid, item_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let item = find_user_item(&txn, user_id, item_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound("Cart item not found with the provided ID.".to_string())
            })?;
        let cart_id = item.cart_id;
        cart_item::Entity::delete_by_id(item.id).exec(&txn).await?;

        if let Some(cart) = cart::Entity::find_by_id(cart_id).one(&txn).await? {
            recalculate_cart_totals(&txn, cart).await?;
        }
        txn.commit().await?;

        info!(item_id = %item_id, "removed item from cart");
        Ok(())
    }

    /// Loads the cart with every line re-priced against the live catalog.
    #[instrument(skip(self))]
    pub async fn recompute_and_fetch(&self, user_id: Uuid) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;
        let live = refresh_cart(&txn, user_id).await?;
        txn.commit().await?;
        Ok(live.into())
    }
}

async fn find_user_item<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    item_id: Uuid,
) -> Result<Option<cart_item::Model>, ServiceError> {
    Ok(cart_item::Entity::find_by_id(item_id)
        .filter(cart_item::Column::UserId.eq(user_id))
        .one(conn)
        .await?)
}

/// `col = value` when present, `col IS NULL` otherwise.
fn optional_eq<V>(column: cart_item::Column, value: Option<V>) -> Condition
where
    V: Into<sea_orm::Value>,
{
    match value {
        Some(v) => Condition::all().add(column.eq(v)),
        None => Condition::all().add(column.is_null()),
    }
}
