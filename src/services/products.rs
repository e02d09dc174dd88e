use crate::{
    common::{discounted_price, round_money, slugify},
    entities::{
        category,
        product::{self, GalleryImage, Tag},
        product_variant::{self, SizeStock},
        wishlist_item,
    },
    errors::ServiceError,
    services::categories::{find_or_create_category, subtree_ids},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

fn validate_decimal_min_zero(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("decimal_min_zero"));
    }
    Ok(())
}

fn validate_percent(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO || *value > Decimal::ONE_HUNDRED {
        return Err(ValidationError::new("percent_out_of_range"));
    }
    Ok(())
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SizeInput {
    #[validate(length(min = 1, max = 20))]
    pub name: String,
    #[validate(range(min = 0, message = "Size quantity must be a positive number"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct VariantInput {
    #[validate(length(min = 1, max = 100, message = "Variation title is required"))]
    pub title: String,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    #[validate]
    pub sizes: Vec<SizeInput>,
    #[validate(custom = "validate_decimal_min_zero")]
    pub price: Decimal,
    #[validate(custom = "validate_percent")]
    pub discount_percent: Option<Decimal>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl VariantInput {
    /// Sum of size quantities
    pub fn stock(&self) -> i32 {
        self.sizes.iter().map(|s| s.quantity.max(0)).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct TagInput {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct GalleryInput {
    #[validate(length(min = 1, max = 500))]
    pub original: String,
    #[validate(length(min = 1, max = 500))]
    pub thumbnail: String,
}

/// New catalog entry. The category is either an existing id or a
/// top/second/third name triple that is found or created.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Product name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 5000, message = "Product description is required"))]
    pub description: String,
    #[validate(length(min = 1, max = 100, message = "Brand is required"))]
    pub brand: String,
    #[validate(custom = "validate_decimal_min_zero")]
    pub price: Option<Decimal>,
    #[validate(custom = "validate_percent")]
    pub discount_percent: Option<Decimal>,
    #[validate(range(min = 0))]
    pub quantity: Option<i32>,
    #[validate(length(min = 1, max = 500))]
    pub image: Option<String>,
    pub category_id: Option<Uuid>,
    pub top_level_category: Option<String>,
    pub second_level_category: Option<String>,
    pub third_level_category: Option<String>,
    #[serde(default)]
    #[validate]
    pub tags: Vec<TagInput>,
    #[serde(default)]
    #[validate]
    pub gallery: Vec<GalleryInput>,
    #[serde(default)]
    #[validate]
    pub variants: Vec<VariantInput>,
}

/// Partial product update. Category, id and discounted price are not editable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 5000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub brand: Option<String>,
    #[validate(custom = "validate_decimal_min_zero")]
    pub price: Option<Decimal>,
    #[validate(custom = "validate_percent")]
    pub discount_percent: Option<Decimal>,
    #[validate(range(min = 0))]
    pub quantity: Option<i32>,
    #[validate(length(min = 1, max = 500))]
    pub image: Option<String>,
    #[validate]
    pub tags: Option<Vec<TagInput>>,
    #[validate]
    pub gallery: Option<Vec<GalleryInput>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateQuantityRequest {
    #[validate(range(min = 0, message = "Quantity must be zero or more"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: product::Model,
    pub category: Option<category::Model>,
    pub variants: Vec<product_variant::Model>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedProduct {
    pub input: serde_json::Value,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkCreateResult {
    pub inserted_count: usize,
    pub failed_count: usize,
    pub inserted: Vec<ProductDetail>,
    pub failed: Vec<FailedProduct>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductPage {
    pub products: Vec<ProductDetail>,
    pub current_page: u64,
    pub total_pages: u64,
    pub total_products: u64,
}

impl ProductPage {
    fn empty(page: u64) -> Self {
        Self {
            products: Vec::new(),
            current_page: page,
            total_pages: 0,
            total_products: 0,
        }
    }
}

/// Catalog listing query. List values are comma separated.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductListQuery {
    pub category: Option<String>,
    pub brand: Option<String>,
    pub color: Option<String>,
    pub sizes: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub min_discount: Option<String>,
    /// `in_stock` or `out_of_stock`
    pub stock: Option<String>,
    /// `price_high` or `price_low`
    pub sort: Option<String>,
    pub page_number: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum StockFilter {
    InStock,
    OutOfStock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ProductSort {
    PriceHigh,
    PriceLow,
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(|part| part.trim().to_lowercase())
            .filter(|part| !part.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

fn parse_decimal(raw: Option<&str>, label: &str) -> Result<Option<Decimal>, ServiceError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => Decimal::from_str(value)
            .map(Some)
            .map_err(|_| ServiceError::BadRequest(format!("Invalid {}: {}", label, value))),
        None => Ok(None),
    }
}

/// In-memory product predicate built from a listing query.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub brands: Vec<String>,
    pub colors: Vec<String>,
    pub sizes: Vec<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub min_discount: Option<Decimal>,
    pub stock: Option<StockFilter>,
}

impl ProductFilter {
    pub fn from_query(query: &ProductListQuery) -> Result<Self, ServiceError> {
        let stock = match query.stock.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(StockFilter::from_str(raw).map_err(|_| {
                ServiceError::BadRequest(format!("Invalid stock filter: {}", raw))
            })?),
            None => None,
        };

        Ok(Self {
            brands: split_list(query.brand.as_deref()),
            colors: split_list(query.color.as_deref()),
            sizes: split_list(query.sizes.as_deref()),
            min_price: parse_decimal(query.min_price.as_deref(), "min_price")?,
            max_price: parse_decimal(query.max_price.as_deref(), "max_price")?,
            min_discount: parse_decimal(query.min_discount.as_deref(), "min_discount")?,
            stock,
        })
    }

    pub fn matches(&self, product: &product::Model, variants: &[product_variant::Model]) -> bool {
        if !self.brands.is_empty() {
            let brand = product.brand.as_deref().unwrap_or_default().to_lowercase();
            if !self.brands.iter().any(|b| brand.contains(b.as_str())) {
                return false;
            }
        }

        if !self.colors.is_empty()
            && !variants
                .iter()
                .any(|v| self.colors.iter().any(|c| v.offers_color(c)))
        {
            return false;
        }

        if !self.sizes.is_empty()
            && !variants
                .iter()
                .any(|v| self.sizes.iter().any(|s| v.size_stock(s).is_some()))
        {
            return false;
        }

        if self.min_price.is_some() || self.max_price.is_some() {
            let in_range = |price: Decimal| {
                let price = round_money(price);
                self.min_price.map_or(true, |min| price >= round_money(min))
                    && self.max_price.map_or(true, |max| price <= round_money(max))
            };
            let hit = if variants.is_empty() {
                in_range(product.discounted_price)
            } else {
                variants.iter().any(|v| in_range(v.discounted_price))
            };
            if !hit {
                return false;
            }
        }

        if let Some(min) = self.min_discount {
            let hit = if variants.is_empty() {
                product.discount_percent >= min
            } else {
                variants.iter().any(|v| v.discount_percent >= min)
            };
            if !hit {
                return false;
            }
        }

        match self.stock {
            Some(StockFilter::InStock) => product.quantity > 0,
            Some(StockFilter::OutOfStock) => product.quantity == 0,
            None => true,
        }
    }
}

/// Lowest discounted price across the variants, or the product's own.
pub fn effective_price(product: &product::Model, variants: &[product_variant::Model]) -> Decimal {
    variants
        .iter()
        .map(|v| round_money(v.discounted_price))
        .min()
        .unwrap_or_else(|| round_money(product.discounted_price))
}

fn tags_json(tags: &[TagInput]) -> serde_json::Value {
    let tags: Vec<Tag> = tags
        .iter()
        .enumerate()
        .map(|(i, t)| Tag {
            id: (i + 1).to_string(),
            name: t.name.trim().to_string(),
            slug: t.slug.trim().to_string(),
        })
        .collect();
    serde_json::to_value(tags).unwrap_or_default()
}

fn gallery_json(gallery: &[GalleryInput]) -> serde_json::Value {
    let images: Vec<GalleryImage> = gallery
        .iter()
        .enumerate()
        .map(|(i, g)| GalleryImage {
            id: (i + 1).to_string(),
            original: g.original.clone(),
            thumbnail: g.thumbnail.clone(),
        })
        .collect();
    serde_json::to_value(images).unwrap_or_default()
}

fn name_of(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

async fn resolve_category<C: ConnectionTrait>(
    conn: &C,
    request: &CreateProductRequest,
) -> Result<category::Model, ServiceError> {
    if let Some(id) = request.category_id {
        return category::Entity::find_by_id(id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Category not found".to_string()));
    }

    match (
        name_of(&request.top_level_category),
        name_of(&request.second_level_category),
        name_of(&request.third_level_category),
    ) {
        (Some(top), Some(second), Some(third)) => {
            let top = find_or_create_category(conn, top, 1, None).await?;
            let second = find_or_create_category(conn, second, 2, Some(top.id)).await?;
            find_or_create_category(conn, third, 3, Some(second.id)).await
        }
        _ => Err(ServiceError::ValidationError(
            "A category id or top, second and third level category names are required"
                .to_string(),
        )),
    }
}

async fn unique_slug<C: ConnectionTrait>(conn: &C, name: &str) -> Result<String, ServiceError> {
    let base = match slugify(name) {
        s if s.is_empty() => "product".to_string(),
        s => s,
    };
    let mut candidate = base.clone();
    let mut suffix = 0u32;
    loop {
        let taken = product::Entity::find()
            .filter(product::Column::Slug.eq(candidate.as_str()))
            .count(conn)
            .await?;
        if taken == 0 {
            return Ok(candidate);
        }
        suffix += 1;
        candidate = format!("{}-{}", base, suffix);
    }
}

/// Inserts a product and its variants on `conn`.
pub async fn insert_product<C: ConnectionTrait>(
    conn: &C,
    request: CreateProductRequest,
) -> Result<ProductDetail, ServiceError> {
    let price = match (request.price, request.variants.is_empty()) {
        (Some(price), _) => price,
        (None, false) => request
            .variants
            .iter()
            .map(|v| v.price)
            .min()
            .unwrap_or_default(),
        (None, true) => {
            return Err(ServiceError::ValidationError(
                "Product price must be a valid positive number.".to_string(),
            ))
        }
    };
    if request.variants.is_empty() && request.quantity.is_none() {
        return Err(ServiceError::ValidationError(
            "Quantity is required and must be a valid positive number.".to_string(),
        ));
    }

    let category = resolve_category(conn, &request).await?;
    let slug = unique_slug(conn, &request.name).await?;
    let discount = request.discount_percent.unwrap_or_default();
    let quantity = if request.variants.is_empty() {
        request.quantity.unwrap_or_default()
    } else {
        request.variants.iter().map(VariantInput::stock).sum()
    };

    let now = Utc::now();
    let product = product::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(request.name.trim().to_string()),
        slug: Set(slug),
        description: Set(Some(request.description.trim().to_string())),
        brand: Set(Some(request.brand.trim().to_string())),
        category_id: Set(Some(category.id)),
        price: Set(round_money(price)),
        discount_percent: Set(discount),
        discounted_price: Set(discounted_price(price, discount)),
        quantity: Set(quantity),
        image: Set(request.image.clone()),
        tags: Set(tags_json(&request.tags)),
        gallery: Set(gallery_json(&request.gallery)),
        is_active: Set(true),
        average_rating: Set(Decimal::ZERO),
        num_ratings: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await
    .map_err(|e| ServiceError::from_db(e, "A product with this slug already exists"))?;

    let mut variants = Vec::with_capacity(request.variants.len());
    for (position, input) in request.variants.iter().enumerate() {
        let discount = input.discount_percent.unwrap_or_default();
        let sizes: Vec<SizeStock> = input
            .sizes
            .iter()
            .map(|s| SizeStock {
                name: s.name.trim().to_string(),
                quantity: s.quantity,
            })
            .collect();
        let colors: Vec<String> = input.colors.iter().map(|c| c.trim().to_string()).collect();

        let variant = product_variant::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product.id),
            title: Set(input.title.trim().to_string()),
            colors: Set(serde_json::to_value(colors).unwrap_or_default()),
            sizes: Set(serde_json::to_value(sizes).unwrap_or_default()),
            price: Set(round_money(input.price)),
            discount_percent: Set(discount),
            discounted_price: Set(discounted_price(input.price, discount)),
            quantity: Set(input.stock()),
            is_active: Set(input.is_active),
            position: Set(position as i32),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await?;
        variants.push(variant);
    }

    Ok(ProductDetail {
        product,
        category: Some(category),
        variants,
    })
}

#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_product(
        &self,
        request: CreateProductRequest,
    ) -> Result<ProductDetail, ServiceError> {
        let txn = self.db.begin().await?;
        let detail = insert_product(&txn, request).await?;
        txn.commit().await?;
        info!(product_id = %detail.product.id, "product created");
        Ok(detail)
    }

    /// Creates each input independently; one failure does not stop the rest.
    #[instrument(skip(self, inputs), fields(count = inputs.len()))]
    pub async fn create_many(
        &self,
        inputs: Vec<serde_json::Value>,
    ) -> Result<BulkCreateResult, ServiceError> {
        let mut inserted = Vec::new();
        let mut failed = Vec::new();

        for input in inputs {
            let outcome = async {
                let request: CreateProductRequest = serde_json::from_value(input.clone())
                    .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
                request.validate()?;
                self.create_product(request).await
            }
            .await;

            match outcome {
                Ok(detail) => inserted.push(detail),
                Err(err) => {
                    warn!(error = %err, "bulk product entry rejected");
                    failed.push(FailedProduct {
                        input,
                        error: err.response_message(),
                    });
                }
            }
        }

        Ok(BulkCreateResult {
            inserted_count: inserted.len(),
            failed_count: failed.len(),
            inserted,
            failed,
        })
    }

    async fn find_model(&self, id: Uuid) -> Result<product::Model, ServiceError> {
        product::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))
    }

    #[instrument(skip(self, request))]
    pub async fn update_product(
        &self,
        id: Uuid,
        request: UpdateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        let existing = self.find_model(id).await?;

        let reprice = request.price.is_some() || request.discount_percent.is_some();
        let price = request.price.unwrap_or(existing.price);
        let discount = request.discount_percent.unwrap_or(existing.discount_percent);

        let mut active: product::ActiveModel = existing.into();
        if let Some(v) = request.name {
            active.name = Set(v.trim().to_string());
        }
        if let Some(v) = request.description {
            active.description = Set(Some(v.trim().to_string()));
        }
        if let Some(v) = request.brand {
            active.brand = Set(Some(v.trim().to_string()));
        }
        if let Some(v) = request.quantity {
            active.quantity = Set(v);
        }
        if let Some(v) = request.image {
            active.image = Set(Some(v));
        }
        if let Some(tags) = request.tags {
            active.tags = Set(tags_json(&tags));
        }
        if let Some(gallery) = request.gallery {
            active.gallery = Set(gallery_json(&gallery));
        }
        if reprice {
            active.price = Set(round_money(price));
            active.discount_percent = Set(discount);
            active.discounted_price = Set(discounted_price(price, discount));
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(&*self.db).await?)
    }

    pub async fn update_quantity(
        &self,
        id: Uuid,
        quantity: i32,
    ) -> Result<product::Model, ServiceError> {
        let mut active: product::ActiveModel = self.find_model(id).await?.into();
        active.quantity = Set(quantity.max(0));
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    pub async fn update_status(
        &self,
        id: Uuid,
        is_active: bool,
    ) -> Result<product::Model, ServiceError> {
        let mut active: product::ActiveModel = self.find_model(id).await?.into();
        active.is_active = Set(is_active);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    /// Removes a product with its variants and wishlist entries.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        product_variant::Entity::delete_many()
            .filter(product_variant::Column::ProductId.eq(id))
            .exec(&txn)
            .await?;
        wishlist_item::Entity::delete_many()
            .filter(wishlist_item::Column::ProductId.eq(id))
            .exec(&txn)
            .await?;
        let removed = product::Entity::delete_by_id(id).exec(&txn).await?;
        if removed.rows_affected == 0 {
            return Err(ServiceError::NotFound("Product not found".to_string()));
        }

        txn.commit().await?;
        info!(product_id = %id, "product deleted");
        Ok(())
    }

    pub async fn get_product(&self, id: Uuid) -> Result<ProductDetail, ServiceError> {
        let product = self.find_model(id).await?;
        let category = match product.category_id {
            Some(cid) => category::Entity::find_by_id(cid).one(&*self.db).await?,
            None => None,
        };
        let variants = product_variant::Entity::find()
            .filter(product_variant::Column::ProductId.eq(id))
            .order_by_asc(product_variant::Column::Position)
            .all(&*self.db)
            .await?;
        Ok(ProductDetail {
            product,
            category,
            variants,
        })
    }

    /// Leaf categories under every category named `name`, case-insensitively.
    async fn leaf_categories(&self, name: &str) -> Result<Vec<Uuid>, ServiceError> {
        let named = category::Entity::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(category::Column::Name)))
                    .eq(name.trim().to_lowercase()),
            )
            .all(&*self.db)
            .await?;
        if named.is_empty() {
            return Ok(Vec::new());
        }

        let all = category::Entity::find().all(&*self.db).await?;
        let levels: HashMap<Uuid, i32> = all.iter().map(|c| (c.id, c.level)).collect();
        let mut leaves: Vec<Uuid> = named
            .iter()
            .flat_map(|c| subtree_ids(c.id, &all))
            .filter(|id| levels.get(id) == Some(&3))
            .collect();
        leaves.sort();
        leaves.dedup();
        Ok(leaves)
    }

    #[instrument(skip(self))]
    pub async fn list_products(&self, query: &ProductListQuery) -> Result<ProductPage, ServiceError> {
        let filter = ProductFilter::from_query(query)?;
        let page = query.page_number.unwrap_or(1).max(1);
        let page_size = query.page_size.unwrap_or(10).clamp(1, 100);

        let mut select = product::Entity::find().filter(product::Column::IsActive.eq(true));
        if let Some(name) = query.category.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let leaves = self.leaf_categories(name).await?;
            if leaves.is_empty() {
                return Ok(ProductPage::empty(page));
            }
            select = select.filter(product::Column::CategoryId.is_in(leaves));
        }
        let products = select
            .order_by_desc(product::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
        let mut variants_by_product: HashMap<Uuid, Vec<product_variant::Model>> = HashMap::new();
        if !ids.is_empty() {
            for variant in product_variant::Entity::find()
                .filter(product_variant::Column::ProductId.is_in(ids))
                .order_by_asc(product_variant::Column::Position)
                .all(&*self.db)
                .await?
            {
                variants_by_product
                    .entry(variant.product_id)
                    .or_default()
                    .push(variant);
            }
        }

        let mut matched: Vec<(product::Model, Vec<product_variant::Model>)> = products
            .into_iter()
            .map(|p| {
                let variants = variants_by_product.remove(&p.id).unwrap_or_default();
                (p, variants)
            })
            .filter(|(p, v)| filter.matches(p, v))
            .collect();

        match query.sort.as_deref().and_then(|s| ProductSort::from_str(s.trim()).ok()) {
            Some(ProductSort::PriceHigh) => matched.sort_by(|a, b| {
                effective_price(&b.0, &b.1).cmp(&effective_price(&a.0, &a.1))
            }),
            Some(ProductSort::PriceLow) => matched.sort_by(|a, b| {
                effective_price(&a.0, &a.1).cmp(&effective_price(&b.0, &b.1))
            }),
            None => {}
        }

        let total_products = matched.len() as u64;
        let total_pages = total_products.div_ceil(page_size);
        let window: Vec<_> = matched
            .into_iter()
            .skip(((page - 1) * page_size) as usize)
            .take(page_size as usize)
            .collect();

        let category_ids: Vec<Uuid> = window.iter().filter_map(|(p, _)| p.category_id).collect();
        let categories: HashMap<Uuid, category::Model> = if category_ids.is_empty() {
            HashMap::new()
        } else {
            category::Entity::find()
                .filter(category::Column::Id.is_in(category_ids))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|c| (c.id, c))
                .collect()
        };

        let products = window
            .into_iter()
            .map(|(product, variants)| ProductDetail {
                category: product.category_id.and_then(|id| categories.get(&id).cloned()),
                product,
                variants,
            })
            .collect();

        Ok(ProductPage {
            products,
            current_page: page,
            total_pages,
            total_products,
        })
    }
}
