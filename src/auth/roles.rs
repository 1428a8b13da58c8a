//! Role-based access control (RBAC) module.
//!
//! A single policy surface mapping (role, permission) to allow/deny,
//! used by every role-gated handler instead of inline role comparisons.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{ApiError, ErrorCode};

/// Permission represents a specific action on a resource.
/// Format: "resource:action" (e.g., "orders:manage", "analytics:read")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission(String);

impl Permission {
    pub fn new(resource: &str, action: &str) -> Self {
        Self(format!("{}:{}", resource, action))
    }

    pub fn wildcard(resource: &str) -> Self {
        Self(format!("{}:*", resource))
    }

    pub fn resource(&self) -> &str {
        self.0.split(':').next().unwrap_or("")
    }

    pub fn action(&self) -> &str {
        self.0.split(':').nth(1).unwrap_or("")
    }

    pub fn is_wildcard(&self) -> bool {
        self.0.ends_with(":*")
    }

    /// Check if this permission grants access to the requested permission
    pub fn grants(&self, requested: &Permission) -> bool {
        if self.0 == requested.0 {
            return true;
        }

        if self.is_wildcard() && self.resource() == requested.resource() {
            return true;
        }

        false
    }
}

impl From<&str> for Permission {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role represents a user's role with associated permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Superadmin,
    Delivery,
}

impl Role {
    /// Get all permissions for this role
    pub fn permissions(&self) -> HashSet<Permission> {
        match self {
            Role::User => Self::user_permissions(),
            Role::Admin => Self::admin_permissions(),
            Role::Superadmin => Self::superadmin_permissions(),
            Role::Delivery => Self::delivery_permissions(),
        }
    }

    /// Check if role has a specific permission
    pub fn has_permission(&self, permission: &Permission) -> bool {
        self.permissions().iter().any(|p| p.grants(permission))
    }

    fn user_permissions() -> HashSet<Permission> {
        [
            "profile:read",
            "profile:update",
            "cart:*",
            "orders:create",
            "orders:read-own",
            "orders:cancel-own",
            "payments:*",
            "uploads:sign",
        ]
        .into_iter()
        .map(Permission::from)
        .collect()
    }

    fn admin_permissions() -> HashSet<Permission> {
        [
            "profile:*",
            "orders:*",
            "products:*",
            "partners:read",
            "ml:retrain",
            "uploads:sign",
        ]
        .into_iter()
        .map(Permission::from)
        .collect()
    }

    // Superadmin is a strict superset of admin plus analytics; the source
    // console gated them separately but the policy view is a lattice.
    fn superadmin_permissions() -> HashSet<Permission> {
        let mut perms = Self::admin_permissions();
        perms.insert(Permission::from("analytics:*"));
        perms.insert(Permission::from("users:*"));
        perms
    }

    fn delivery_permissions() -> HashSet<Permission> {
        [
            "profile:read",
            "profile:update",
            "delivery:read-assigned",
            "delivery:deliver",
            "delivery:collect-cod",
            "uploads:sign",
        ]
        .into_iter()
        .map(Permission::from)
        .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
            Role::Delivery => "delivery",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "superadmin" => Ok(Role::Superadmin),
            "delivery" => Ok(Role::Delivery),
            _ => Err(RoleParseError(s.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug)]
pub struct RoleParseError(String);

impl std::fmt::Display for RoleParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid role: {}", self.0)
    }
}

impl std::error::Error for RoleParseError {}

/// The single authorization decision point for role-gated handlers.
pub fn authorize(role: Role, resource: &str, action: &str) -> crate::error::Result<()> {
    let requested = Permission::new(resource, action);
    if role.has_permission(&requested) {
        Ok(())
    } else {
        Err(ApiError::with_code(
            ErrorCode::InsufficientPermissions,
            format!("Access denied: {} required", requested),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_creation() {
        let perm = Permission::new("orders", "manage");
        assert_eq!(perm.resource(), "orders");
        assert_eq!(perm.action(), "manage");
        assert!(!perm.is_wildcard());
    }

    #[test]
    fn test_wildcard_permission() {
        let wildcard = Permission::wildcard("orders");
        let specific = Permission::new("orders", "assign");

        assert!(wildcard.is_wildcard());
        assert!(wildcard.grants(&specific));
        assert!(!specific.grants(&wildcard));
    }

    #[test]
    fn test_admin_cannot_read_analytics() {
        assert!(authorize(Role::Admin, "orders", "manage").is_ok());
        assert!(authorize(Role::Admin, "products", "sync").is_ok());
        assert!(authorize(Role::Admin, "analytics", "read").is_err());
    }

    #[test]
    fn test_superadmin_is_admin_superset() {
        for perm in Role::Admin.permissions() {
            assert!(
                Role::Superadmin.has_permission(&perm),
                "superadmin missing {}",
                perm
            );
        }
        assert!(authorize(Role::Superadmin, "analytics", "read").is_ok());
    }

    #[test]
    fn test_delivery_partner_scope() {
        assert!(authorize(Role::Delivery, "delivery", "deliver").is_ok());
        assert!(authorize(Role::Delivery, "delivery", "collect-cod").is_ok());
        assert!(authorize(Role::Delivery, "orders", "manage").is_err());
        assert!(authorize(Role::User, "delivery", "deliver").is_err());
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("DELIVERY".parse::<Role>().unwrap(), Role::Delivery);
        assert!("invalid".parse::<Role>().is_err());
    }
}
