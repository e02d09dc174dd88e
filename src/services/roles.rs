use crate::{
    auth::permissions::Permission,
    entities::{
        admin,
        role::{self, permissions_to_json},
    },
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

const ROLE_EXISTS: &str = "Role already exists";
const ROLE_ASSIGNED: &str = "Role is assigned to one or more admins";

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RoleRequest {
    #[validate(length(min = 1, max = 50, message = "Role name is required"))]
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateRoleRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: Option<String>,
    pub permissions: Option<Vec<Permission>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleView {
    pub id: Uuid,
    pub name: String,
    pub permissions: Vec<Permission>,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

impl From<role::Model> for RoleView {
    fn from(model: role::Model) -> Self {
        Self {
            permissions: model.permission_set(),
            id: model.id,
            name: model.name,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

fn dedup_permissions(mut permissions: Vec<Permission>) -> Vec<Permission> {
    let mut seen = Vec::with_capacity(permissions.len());
    permissions.retain(|p| {
        if seen.contains(p) {
            false
        } else {
            seen.push(*p);
            true
        }
    });
    permissions
}

#[derive(Clone)]
pub struct RoleService {
    db: Arc<DatabaseConnection>,
}

impl RoleService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn name_taken(&self, name: &str, except: Option<Uuid>) -> Result<bool, ServiceError> {
        let mut select = role::Entity::find().filter(
            Expr::expr(Func::lower(Expr::col(role::Column::Name))).eq(name.to_lowercase()),
        );
        if let Some(id) = except {
            select = select.filter(role::Column::Id.ne(id));
        }
        Ok(select.count(&*self.db).await? > 0)
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create(&self, request: RoleRequest) -> Result<RoleView, ServiceError> {
        let name = request.name.trim().to_string();
        if self.name_taken(&name, None).await? {
            return Err(ServiceError::Conflict(ROLE_EXISTS.to_string()));
        }

        let now = Utc::now();
        let created = role::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            permissions: Set(permissions_to_json(&dedup_permissions(request.permissions))),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| ServiceError::from_db(e, ROLE_EXISTS))?;

        info!(role_id = %created.id, "role created");
        Ok(created.into())
    }

    pub async fn list(&self) -> Result<Vec<RoleView>, ServiceError> {
        Ok(role::Entity::find()
            .order_by_asc(role::Column::Name)
            .all(&*self.db)
            .await?
            .into_iter()
            .map(RoleView::from)
            .collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<RoleView, ServiceError> {
        role::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .map(RoleView::from)
            .ok_or_else(|| ServiceError::NotFound(format!("No role found with id '{}'", id)))
    }

    pub async fn get_by_name(&self, name: &str) -> Result<RoleView, ServiceError> {
        role::Entity::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(role::Column::Name)))
                    .eq(name.trim().to_lowercase()),
            )
            .one(&*self.db)
            .await?
            .map(RoleView::from)
            .ok_or_else(|| ServiceError::NotFound(format!("No role found with name '{}'", name)))
    }

    #[instrument(skip(self, request))]
    pub async fn update(&self, id: Uuid, request: UpdateRoleRequest) -> Result<RoleView, ServiceError> {
        let existing = role::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Role not found".to_string()))?;

        let mut active: role::ActiveModel = existing.into();
        if let Some(name) = request.name.map(|n| n.trim().to_string()) {
            if self.name_taken(&name, Some(id)).await? {
                return Err(ServiceError::Conflict(ROLE_EXISTS.to_string()));
            }
            active.name = Set(name);
        }
        if let Some(permissions) = request.permissions {
            active.permissions = Set(permissions_to_json(&dedup_permissions(permissions)));
        }
        active.updated_at = Set(Utc::now());

        let updated = active
            .update(&*self.db)
            .await
            .map_err(|e| ServiceError::from_db(e, ROLE_EXISTS))?;
        Ok(updated.into())
    }

    /// Deletes a role that no admin is assigned to.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let assigned = admin::Entity::find()
            .filter(admin::Column::RoleId.eq(id))
            .filter(admin::Column::IsDeleted.eq(false))
            .count(&*self.db)
            .await?;
        if assigned > 0 {
            return Err(ServiceError::Conflict(ROLE_ASSIGNED.to_string()));
        }

        let removed = role::Entity::delete_by_id(id)
            .exec(&*self.db)
            .await
            .map_err(|e| ServiceError::from_db(e, ROLE_ASSIGNED))?;
        if removed.rows_affected == 0 {
            return Err(ServiceError::NotFound("Role not found".to_string()));
        }
        info!(role_id = %id, "role deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_permissions_collapse_in_order() {
        let perms = dedup_permissions(vec![
            Permission::AddProduct,
            Permission::ViewOrder,
            Permission::AddProduct,
        ]);
        assert_eq!(perms, vec![Permission::AddProduct, Permission::ViewOrder]);
    }

    #[test]
    fn unknown_permission_names_fail_to_parse() {
        let parsed: Result<RoleRequest, _> = serde_json::from_value(serde_json::json!({
            "name": "Support", "permissions": ["view-order", "launch-rockets"]
        }));
        assert!(parsed.is_err());

        let parsed: RoleRequest = serde_json::from_value(serde_json::json!({
            "name": "Support", "permissions": ["view-order"]
        }))
        .unwrap();
        assert_eq!(parsed.permissions, vec![Permission::ViewOrder]);
    }

    #[tokio::test]
    async fn deleting_a_role_detaches_soft_deleted_admins() {
        let db = crate::db::establish_connection_with_config(&crate::db::DbConfig {
            url: "sqlite::memory:".into(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        })
        .await
        .unwrap();
        crate::db::run_migrations(&db).await.unwrap();
        let db = Arc::new(db);
        let roles = RoleService::new(db.clone());

        let role = roles
            .create(RoleRequest {
                name: "Packer".into(),
                permissions: vec![Permission::ViewOrder],
            })
            .await
            .unwrap();

        let now = Utc::now();
        let retired = admin::ActiveModel {
            id: Set(Uuid::new_v4()),
            first_name: Set("Former".into()),
            last_name: Set("Packer".into()),
            email: Set("former.packer@example.com".into()),
            password_hash: Set("unused".into()),
            mobile: Set(None),
            role_id: Set(Some(role.id)),
            is_active: Set(false),
            is_deleted: Set(true),
            reset_password_token: Set(None),
            reset_password_expires: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*db)
        .await
        .unwrap();

        roles.delete(role.id).await.unwrap();

        let row = admin::Entity::find_by_id(retired.id)
            .one(&*db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.role_id, None);
        assert!(matches!(
            roles.delete(role.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
