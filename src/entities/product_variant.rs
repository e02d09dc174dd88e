use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product variation carrying its own colors, sizes, stock and price
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_variants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub title: String,
    /// JSON array of color names
    #[sea_orm(column_type = "Json")]
    pub colors: Json,
    /// JSON array of `{name, quantity}`
    #[sea_orm(column_type = "Json")]
    pub sizes: Json,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub discount_percent: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub discounted_price: Decimal,
    pub quantity: i32,
    pub is_active: bool,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeStock {
    pub name: String,
    pub quantity: i32,
}

impl Model {
    pub fn color_list(&self) -> Vec<String> {
        serde_json::from_value(self.colors.clone()).unwrap_or_default()
    }

    pub fn size_list(&self) -> Vec<SizeStock> {
        serde_json::from_value(self.sizes.clone()).unwrap_or_default()
    }

    /// The variant's own spelling of a color, matched case-insensitively
    pub fn find_color(&self, color: &str) -> Option<String> {
        self.color_list()
            .into_iter()
            .find(|c| c.eq_ignore_ascii_case(color.trim()))
    }

    pub fn find_size(&self, size: &str) -> Option<SizeStock> {
        self.size_list()
            .into_iter()
            .find(|s| s.name.eq_ignore_ascii_case(size.trim()))
    }

    pub fn offers_color(&self, color: &str) -> bool {
        self.find_color(color).is_some()
    }

    /// Stock available for a named size, if the variant offers it
    pub fn size_stock(&self, size: &str) -> Option<i32> {
        self.find_size(size).map(|s| s.quantity)
    }

    pub fn unit_price(&self) -> Decimal {
        if self.discounted_price > Decimal::ZERO {
            self.discounted_price
        } else {
            self.price
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id",
        on_delete = "Cascade"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
