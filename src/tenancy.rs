use serde_json::Value;
use sqlx::PgPool;

use crate::{
    auth::{AuthUser, Role},
    error::AppError,
    repository::table_service::get_row,
};

pub const ADMIN_ROLES: &[Role] = &[Role::SuperAdmin, Role::Admin];

pub fn assert_role(user: &AuthUser, allowed_roles: &[Role]) -> Result<(), AppError> {
    if allowed_roles.contains(&user.role) {
        return Ok(());
    }
    Err(AppError::Forbidden(format!(
        "Forbidden: role '{}' is not allowed for this action.",
        user.role.as_str()
    )))
}

/// Admins see every apartment; owners only the ones they own.
pub async fn assert_apartment_access(
    pool: &PgPool,
    user: &AuthUser,
    apartment_id: i64,
) -> Result<(), AppError> {
    if user.role.is_admin() {
        return Ok(());
    }
    match user.role {
        Role::Owner => {
            let apartment = get_row(pool, "apartments", apartment_id, "id").await?;
            if owned_by(&apartment, user.id) {
                Ok(())
            } else {
                Err(AppError::Forbidden(
                    "Forbidden: apartment belongs to another owner.".to_string(),
                ))
            }
        }
        _ => Err(AppError::Forbidden(
            "Forbidden: renters cannot view apartment ledgers.".to_string(),
        )),
    }
}

fn owned_by(apartment: &Value, user_id: i64) -> bool {
    apartment
        .get("owner_id")
        .and_then(Value::as_i64)
        .is_some_and(|owner_id| owner_id == user_id)
}

#[cfg(test)]
mod tests {
    use super::{assert_role, owned_by, ADMIN_ROLES};
    use crate::auth::{AuthUser, Role};
    use serde_json::json;

    #[test]
    fn admin_roles_pass_role_check() {
        let admin = AuthUser {
            id: 1,
            role: Role::Admin,
        };
        let owner = AuthUser {
            id: 2,
            role: Role::Owner,
        };
        assert!(assert_role(&admin, ADMIN_ROLES).is_ok());
        assert!(assert_role(&owner, ADMIN_ROLES).is_err());
    }

    #[test]
    fn ownership_matches_owner_id() {
        assert!(owned_by(&json!({ "id": 5, "owner_id": 9 }), 9));
        assert!(!owned_by(&json!({ "id": 5, "owner_id": 10 }), 9));
        assert!(!owned_by(&json!({ "id": 5, "owner_id": null }), 9));
    }
}
