/*!
 * # Permissions Module
 *
 * Closed set of administrative capabilities. Roles store these by their
 * kebab-case identifier; a handful of built-in role names carry implicit grants.
 */

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    ToSchema,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Permission {
    ViewUser,
    UpdateUser,
    AddRole,
    ViewRole,
    EditRole,
    DeleteRole,
    AddAdmin,
    ViewAdmin,
    DeleteAdmin,
    ChangeAdminStatus,
    AddProduct,
    UpdateProduct,
    UpdateAddress,
    ViewOrder,
    UpdateOrderStatus,
    DeleteOrder,
    ApproveReview,
    ViewWishlist,
    AddCategory,
    UpdateCategory,
    DeleteCategory,
    ViewDashboard,
}

impl Permission {
    pub fn all() -> Vec<Permission> {
        Permission::iter().collect()
    }
}

/// Role names with built-in meaning
pub mod roles {
    pub const DEVELOPER: &str = "Developer";
    pub const MASTER_ADMIN: &str = "Master Admin";
    pub const VENDOR: &str = "Vendor";
    pub const DRIVER: &str = "Driver";
}

/// What an authenticated admin's role grants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGrant {
    pub role_name: String,
    pub permissions: Vec<Permission>,
}

impl RoleGrant {
    pub fn new(role_name: impl Into<String>, permissions: Vec<Permission>) -> Self {
        Self {
            role_name: role_name.into(),
            permissions,
        }
    }

    pub fn is_role(&self, name: &str) -> bool {
        self.role_name.eq_ignore_ascii_case(name)
    }
}

fn implicit_grant(role_name: &str, required: Permission) -> bool {
    use Permission::*;

    if role_name.eq_ignore_ascii_case(roles::DEVELOPER)
        || role_name.eq_ignore_ascii_case(roles::MASTER_ADMIN)
    {
        return true;
    }
    if role_name.eq_ignore_ascii_case(roles::VENDOR) {
        return matches!(
            required,
            AddProduct | UpdateProduct | ViewOrder | UpdateOrderStatus
        );
    }
    if role_name.eq_ignore_ascii_case(roles::DRIVER) {
        return matches!(required, UpdateAddress);
    }
    false
}

/// Whether `grant` authorizes `required`, either through a built-in role name
/// or an explicit entry in the role's permission set.
pub fn has_permission(grant: &RoleGrant, required: Permission) -> bool {
    implicit_grant(&grant.role_name, required) || grant.permissions.contains(&required)
}
