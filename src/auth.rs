use http::{header::AUTHORIZATION, HeaderMap};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, state::AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Owner,
    Renter,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "super_admin" => Some(Self::SuperAdmin),
            "admin" => Some(Self::Admin),
            "owner" => Some(Self::Owner),
            "renter" => Some(Self::Renter),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Owner => "owner",
            Self::Renter => "renter",
        }
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Self::SuperAdmin | Self::Admin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub role: Role,
}

/// Resolves the caller from a bearer token, or from `x-user-id`/`x-user-role`
/// when dev overrides are enabled.
pub async fn require_user(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, AppError> {
    if let Some(token) = bearer_token(headers) {
        let secret = state.config.jwt_secret.as_deref().ok_or_else(|| {
            AppError::ServiceUnavailable("JWT_SECRET is not configured.".to_string())
        })?;
        return decode_user(&token, secret);
    }

    if state.config.auth_dev_overrides_enabled() {
        if let Some(user) = dev_override_user(headers) {
            tracing::debug!(user_id = user.id, role = user.role.as_str(), "Using dev auth override");
            return Ok(user);
        }
    }

    Err(AppError::Unauthorized(
        "Unauthorized: missing bearer token.".to_string(),
    ))
}

pub fn decode_user(token: &str, secret: &str) -> Result<AuthUser, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["exp", "sub"]);

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|error| {
        tracing::debug!(error = %error, "Rejected bearer token");
        AppError::Unauthorized("Unauthorized: invalid token.".to_string())
    })?;

    let id = parse_user_id(&data.claims.sub).ok_or_else(|| {
        AppError::Unauthorized("Unauthorized: invalid token subject.".to_string())
    })?;

    Ok(AuthUser {
        id,
        role: data.claims.role,
    })
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = raw.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn dev_override_user(headers: &HeaderMap) -> Option<AuthUser> {
    let id = headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .and_then(parse_user_id)?;
    let role = headers
        .get("x-user-role")
        .and_then(|value| value.to_str().ok())
        .and_then(Role::parse)
        .unwrap_or(Role::SuperAdmin);
    Some(AuthUser { id, role })
}

fn parse_user_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|id| *id > 0)
}

#[cfg(test)]
mod tests {
    use super::{bearer_token, decode_user, dev_override_user, Claims, Role};
    use http::{HeaderMap, HeaderValue};
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret";

    fn token_for(sub: &str, role: Role, exp: usize) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            role,
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn far_future() -> usize {
        (chrono::Utc::now().timestamp() + 3600) as usize
    }

    #[test]
    fn decodes_valid_token() {
        let token = token_for("42", Role::Admin, far_future());
        let user = decode_user(&token, SECRET).unwrap();
        assert_eq!(user.id, 42);
        assert_eq!(user.role, Role::Admin);
    }

    #[test]
    fn rejects_expired_or_foreign_tokens() {
        let expired = token_for("42", Role::Admin, 1_000);
        assert!(decode_user(&expired, SECRET).is_err());

        let valid = token_for("42", Role::Admin, far_future());
        assert!(decode_user(&valid, "other-secret").is_err());

        let bad_subject = token_for("abc", Role::Owner, far_future());
        assert!(decode_user(&bad_subject, SECRET).is_err());
    }

    #[test]
    fn extracts_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def"));

        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn dev_override_defaults_to_super_admin() {
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", HeaderValue::from_static("7"));
        let user = dev_override_user(&headers).unwrap();
        assert_eq!(user.id, 7);
        assert_eq!(user.role, Role::SuperAdmin);

        headers.insert("x-user-role", HeaderValue::from_static("RENTER"));
        assert_eq!(dev_override_user(&headers).unwrap().role, Role::Renter);
    }

    #[test]
    fn parses_roles() {
        assert_eq!(Role::parse("super_admin"), Some(Role::SuperAdmin));
        assert_eq!(Role::parse("janitor"), None);
        assert!(Role::Admin.is_admin());
        assert!(!Role::Owner.is_admin());
    }
}
