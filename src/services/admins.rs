use crate::{
    auth::{
        password::{hash_password, verify_password},
        AuthService,
    },
    entities::{admin, role},
    errors::ServiceError,
    notifications::ResetAudience,
    repositories::AdminRepository,
    services::{
        addresses::MOBILE_RE,
        password_reset::{
            generate_reset_token, invalid_token, stored_token_state, ForgetPasswordRequest,
            ResetNotifier, ResetPasswordRequest, StoredToken,
        },
    },
};
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AdminSignupRequest {
    #[validate(length(min = 1, max = 50, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 50, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, max = 128, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(regex(path = "MOBILE_RE", message = "Mobile number must be 8 to 15 digits"))]
    pub mobile: Option<String>,
    pub role_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AdminSigninRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateAdminRequest {
    #[validate(length(min = 1, max = 50))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub last_name: Option<String>,
    #[validate(regex(path = "MOBILE_RE", message = "Mobile number must be 8 to 15 digits"))]
    pub mobile: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminStatusRequest {
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdminListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Matches first name, last name or email
    pub search: Option<String>,
    pub is_active: Option<bool>,
    pub role_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RoleSummary {
    pub id: Uuid,
    pub name: String,
}

impl From<&role::Model> for RoleSummary {
    fn from(role: &role::Model) -> Self {
        Self {
            id: role.id,
            name: role.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminView {
    #[serde(flatten)]
    pub admin: admin::Model,
    pub role: Option<RoleSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminSession {
    pub id: Uuid,
    pub email: String,
    pub role: RoleSummary,
    pub token: String,
}

#[derive(Clone)]
pub struct AdminService {
    db: Arc<DatabaseConnection>,
    admins: AdminRepository,
    auth: Arc<AuthService>,
    reset: ResetNotifier,
}

impl AdminService {
    pub fn new(db: Arc<DatabaseConnection>, auth: Arc<AuthService>, reset: ResetNotifier) -> Self {
        Self {
            admins: AdminRepository::new(db.clone()),
            db,
            auth,
            reset,
        }
    }

    async fn find_role(&self, id: Option<Uuid>) -> Result<Option<role::Model>, ServiceError> {
        match id {
            Some(id) => Ok(role::Entity::find_by_id(id).one(&*self.db).await?),
            None => Ok(None),
        }
    }

    async fn with_role(&self, admin: admin::Model) -> Result<AdminView, ServiceError> {
        let role = self.find_role(admin.role_id).await?;
        Ok(AdminView {
            role: role.as_ref().map(RoleSummary::from),
            admin,
        })
    }

    async fn find_admin(&self, id: Uuid) -> Result<admin::Model, ServiceError> {
        self.admins
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Admin not found".to_string()))
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn signup(&self, request: AdminSignupRequest) -> Result<AdminView, ServiceError> {
        let email = request.email.trim().to_lowercase();
        let exists = admin::Entity::find()
            .filter(admin::Column::Email.eq(email.as_str()))
            .one(&*self.db)
            .await?;
        if exists.is_some() {
            return Err(ServiceError::Conflict("Email already exists".to_string()));
        }
        let role = self
            .find_role(Some(request.role_id))
            .await?
            .ok_or_else(|| ServiceError::NotFound("Role not found".to_string()))?;

        let now = Utc::now();
        let created = admin::ActiveModel {
            id: Set(Uuid::new_v4()),
            first_name: Set(request.first_name.trim().to_string()),
            last_name: Set(request.last_name.trim().to_string()),
            email: Set(email),
            password_hash: Set(hash_password(&request.password)?),
            mobile: Set(request.mobile),
            role_id: Set(Some(role.id)),
            is_active: Set(true),
            is_deleted: Set(false),
            reset_password_token: Set(None),
            reset_password_expires: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| ServiceError::from_db(e, "Email already exists"))?;

        info!(admin_id = %created.id, role = %role.name, "admin created");
        Ok(AdminView {
            admin: created,
            role: Some(RoleSummary::from(&role)),
        })
    }

    /// Verifies credentials of a live, active admin and issues a token.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn signin(&self, request: AdminSigninRequest) -> Result<AdminSession, ServiceError> {
        let admin = self
            .admins
            .find_by_email(&request.email)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;
        if !verify_password(&request.password, &admin.password_hash)? {
            warn!(admin_id = %admin.id, "admin signin rejected");
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }
        if !admin.is_active {
            return Err(ServiceError::Forbidden(
                "Your account is inactive. Please contact the administrator.".to_string(),
            ));
        }

        let role = self
            .find_role(admin.role_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Role not found".to_string()))?;
        let token = self.auth.issue_admin_token(admin.id, role.id)?;

        info!(admin_id = %admin.id, "admin signed in");
        Ok(AdminSession {
            id: admin.id,
            email: admin.email,
            role: RoleSummary::from(&role),
            token,
        })
    }

    pub async fn get(&self, id: Uuid) -> Result<AdminView, ServiceError> {
        let admin = self.find_admin(id).await?;
        self.with_role(admin).await
    }

    pub async fn list(&self, query: &AdminListQuery) -> Result<(Vec<AdminView>, u64), ServiceError> {
        let mut select = AdminRepository::active();
        if let Some(active) = query.is_active {
            select = select.filter(admin::Column::IsActive.eq(active));
        }
        if let Some(role_id) = query.role_id {
            select = select.filter(admin::Column::RoleId.eq(role_id));
        }
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search.to_lowercase());
            let lower = |col: admin::Column| Expr::expr(Func::lower(Expr::col(col)));
            select = select.filter(
                Condition::any()
                    .add(lower(admin::Column::FirstName).like(pattern.clone()))
                    .add(lower(admin::Column::LastName).like(pattern.clone()))
                    .add(lower(admin::Column::Email).like(pattern)),
            );
        }

        let paginator = select
            .order_by_desc(admin::Column::CreatedAt)
            .paginate(&*self.db, query.limit.unwrap_or(10).clamp(1, 100));
        let total = paginator.num_items().await?;
        let admins = paginator
            .fetch_page(query.page.unwrap_or(1).max(1) - 1)
            .await?;

        let mut role_ids: Vec<Uuid> = admins.iter().filter_map(|a| a.role_id).collect();
        role_ids.sort();
        role_ids.dedup();
        let roles: HashMap<Uuid, RoleSummary> = if role_ids.is_empty() {
            HashMap::new()
        } else {
            role::Entity::find()
                .filter(role::Column::Id.is_in(role_ids))
                .all(&*self.db)
                .await?
                .iter()
                .map(|r| (r.id, RoleSummary::from(r)))
                .collect()
        };

        let views = admins
            .into_iter()
            .map(|admin| AdminView {
                role: admin.role_id.and_then(|id| roles.get(&id).cloned()),
                admin,
            })
            .collect();
        Ok((views, total))
    }

    #[instrument(skip(self, request))]
    pub async fn update_self(
        &self,
        admin_id: Uuid,
        request: UpdateAdminRequest,
    ) -> Result<AdminView, ServiceError> {
        let mut active: admin::ActiveModel = self.find_admin(admin_id).await?.into();
        if let Some(v) = request.first_name {
            active.first_name = Set(v.trim().to_string());
        }
        if let Some(v) = request.last_name {
            active.last_name = Set(v.trim().to_string());
        }
        if let Some(v) = request.mobile {
            active.mobile = Set(Some(v));
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;
        self.with_role(updated).await
    }

    #[instrument(skip(self))]
    pub async fn update_status(&self, id: Uuid, is_active: bool) -> Result<AdminView, ServiceError> {
        let mut active: admin::ActiveModel = self.find_admin(id).await?.into();
        active.is_active = Set(is_active);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;
        info!(admin_id = %id, is_active, "admin status changed");
        self.with_role(updated).await
    }

    #[instrument(skip(self))]
    pub async fn soft_delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let admin = self.admins.find_by_id(id).await?.ok_or_else(|| {
            ServiceError::NotFound("Admin not found or already deleted".to_string())
        })?;
        let mut active: admin::ActiveModel = admin.into();
        active.is_deleted = Set(true);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;
        info!(admin_id = %id, "admin soft deleted");
        Ok(())
    }

    async fn store_token(
        &self,
        admin: admin::Model,
        token: Option<(String, DateTime<Utc>)>,
    ) -> Result<(), ServiceError> {
        let mut active: admin::ActiveModel = admin.into();
        let (token, expires) = token.unzip();
        active.reset_password_token = Set(token);
        active.reset_password_expires = Set(expires);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;
        Ok(())
    }

    #[instrument(skip(self, request))]
    pub async fn forget_password(&self, request: ForgetPasswordRequest) -> Result<(), ServiceError> {
        let email = request.target_email()?;
        let Some(admin) = self.admins.find_by_email(&email).await? else {
            return Ok(());
        };

        let now = Utc::now();
        match stored_token_state(
            admin.reset_password_token.as_deref(),
            admin.reset_password_expires,
            now,
        ) {
            StoredToken::Live => return Ok(()),
            StoredToken::Expired => self.store_token(admin.clone(), None).await?,
            StoredToken::None => {}
        }

        let token = generate_reset_token();
        let admin_id = admin.id;
        let recipient = admin.email.clone();
        self.store_token(admin, Some((token.clone(), self.reset.expiry_from(now))))
            .await?;

        if let Err(err) = self.reset.deliver(ResetAudience::Admin, &recipient, &token).await {
            let admin = self.find_admin(admin_id).await?;
            self.store_token(admin, None).await?;
            return Err(err);
        }

        info!(admin_id = %admin_id, "admin password reset link sent");
        Ok(())
    }

    #[instrument(skip(self, request))]
    pub async fn reset_password(&self, request: ResetPasswordRequest) -> Result<(), ServiceError> {
        let admin = self
            .admins
            .find_by_reset_token(request.token.trim())
            .await?
            .ok_or_else(invalid_token)?;

        if stored_token_state(
            admin.reset_password_token.as_deref(),
            admin.reset_password_expires,
            Utc::now(),
        ) != StoredToken::Live
        {
            self.store_token(admin, None).await?;
            return Err(invalid_token());
        }

        let mut active: admin::ActiveModel = admin.into();
        active.password_hash = Set(hash_password(&request.new_password)?);
        active.reset_password_token = Set(None);
        active.reset_password_expires = Set(None);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;
        Ok(())
    }
}
