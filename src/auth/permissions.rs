use std::collections::{HashMap, HashSet};
use std::fmt;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Sentinel permission for intentionally public routes on a gated router.
pub const ANY: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Superadmin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        };
        f.write_str(s)
    }
}

lazy_static! {
    /// Flat role -> permission-set table, composed once. Each role's set is a
    /// superset of the one below it; inheritance happens here, not at lookup.
    static ref PERMISSIONS: HashMap<Role, HashSet<&'static str>> = {
        let user: HashSet<&'static str> = [
            "create:user",
            "get:user-details",
            "patch:user-details",
            "delete:user",
        ]
        .into_iter()
        .collect();

        let mut admin = user.clone();
        admin.insert("get:user");

        let mut superadmin = admin.clone();
        superadmin.extend([
            "create:admin",
            "get:admin-user",
            "patch:admin-user",
            "delete:admin-user",
        ]);

        HashMap::from([
            (Role::User, user),
            (Role::Admin, admin),
            (Role::Superadmin, superadmin),
        ])
    };
}

/// Check a role against the permissions a route requires.
///
/// The wildcard always allows. An empty requirement means the route was wired
/// wrong and is reported as a server error, not an authorization failure.
pub fn check(role: Role, required: &[&str]) -> Result<(), ApiError> {
    if required.iter().any(|p| *p == ANY) {
        return Ok(());
    }

    if required.is_empty() {
        return Err(ApiError::Configuration("Permission not provided.".into()));
    }

    let granted = PERMISSIONS.get(&role).ok_or_else(|| {
        ApiError::Authorization("User not authorised to perform this action".into())
    })?;

    for p in required {
        if !granted.contains(*p) {
            return Err(ApiError::Authorization(
                "User not authorised to perform this action".into(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn wildcard_never_rejects() {
        for role in [Role::User, Role::Admin, Role::Superadmin] {
            assert!(check(role, &[ANY]).is_ok());
        }
    }

    #[test]
    fn empty_requirement_is_a_config_error() {
        let err = check(Role::Superadmin, &[]).unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn missing_permission_rejects() {
        let err = check(Role::User, &["create:admin"]).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn admin_inherits_user_permissions() {
        assert!(check(Role::Admin, &["patch:user-details"]).is_ok());
        assert!(check(Role::Admin, &["get:user"]).is_ok());
        assert!(check(Role::Admin, &["create:admin"]).is_err());
    }

    #[test]
    fn superadmin_inherits_admin_permissions() {
        assert!(check(Role::Superadmin, &["get:user"]).is_ok());
        assert!(check(Role::Superadmin, &["create:admin"]).is_ok());
        assert!(check(Role::Superadmin, &["patch:user-details"]).is_ok());
    }

    #[test]
    fn multiple_requirements_all_must_hold() {
        assert!(check(Role::Superadmin, &["get:user", "create:admin"]).is_ok());
        assert!(check(Role::Admin, &["get:user", "create:admin"]).is_err());
    }
}
