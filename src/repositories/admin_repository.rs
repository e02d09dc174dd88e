use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Select,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::admin::{Column, Entity as Admin, Model as AdminModel};
use crate::errors::ServiceError;
use crate::repositories::Repository;

use super::BaseRepository;

/// Admin lookups. Every query goes through [`AdminRepository::active`], so
/// soft-deleted admins never leave this module.
#[derive(Debug, Clone)]
pub struct AdminRepository {
    base: BaseRepository,
}

impl AdminRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Base select that excludes soft-deleted rows
    pub fn active() -> Select<Admin> {
        Admin::find().filter(Column::IsDeleted.eq(false))
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<AdminModel>, ServiceError> {
        Self::active()
            .filter(Column::Id.eq(id))
            .one(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<AdminModel>, ServiceError> {
        Self::active()
            .filter(Column::Email.eq(email.trim().to_lowercase()))
            .one(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    pub async fn find_by_reset_token(
        &self,
        token: &str,
    ) -> Result<Option<AdminModel>, ServiceError> {
        Self::active()
            .filter(Column::ResetPasswordToken.eq(token))
            .one(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)
    }
}
