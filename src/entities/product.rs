use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Catalog product
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(unique)]
    pub slug: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub brand: Option<String>,
    pub category_id: Option<Uuid>,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub discount_percent: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub discounted_price: Decimal,
    pub quantity: i32,
    pub image: Option<String>,
    /// `[{id, name, slug}]`
    #[sea_orm(column_type = "Json")]
    pub tags: Json,
    /// `[{id, original, thumbnail}]`
    #[sea_orm(column_type = "Json")]
    pub gallery: Json,
    pub is_active: bool,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub average_rating: Decimal,
    pub num_ratings: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub slug: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryImage {
    pub id: String,
    pub original: String,
    pub thumbnail: String,
}

impl Model {
    /// Price a buyer pays for one unit when no variant is selected.
    pub fn unit_price(&self) -> Decimal {
        if self.discounted_price > Decimal::ZERO {
            self.discounted_price
        } else {
            self.price
        }
    }

    pub fn tag_list(&self) -> Vec<Tag> {
        serde_json::from_value(self.tags.clone()).unwrap_or_default()
    }

    pub fn gallery_images(&self) -> Vec<GalleryImage> {
        serde_json::from_value(self.gallery.clone()).unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
    #[sea_orm(has_many = "super::product_variant::Entity")]
    Variants,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::product_variant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Variants.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
