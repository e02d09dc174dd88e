use crate::auth::permissions::Permission;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Administrative role: a unique name plus a set of permissions
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "roles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    /// Permission identifiers serialized as a JSON array of strings
    #[sea_orm(column_type = "Json")]
    pub permissions: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Typed view of the stored permissions. Unknown identifiers are skipped.
    pub fn permission_set(&self) -> Vec<Permission> {
        self.permissions
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .filter_map(|s| Permission::from_str(s).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Serializes permissions into the stored JSON representation.
pub fn permissions_to_json(permissions: &[Permission]) -> Json {
    Json::Array(
        permissions
            .iter()
            .map(|p| Json::String(p.to_string()))
            .collect(),
    )
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::admin::Entity")]
    Admins,
}

impl Related<super::admin::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Admins.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
