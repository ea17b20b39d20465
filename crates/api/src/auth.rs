//! Caller identity extractors.
//!
//! Token verification happens upstream. The gateway forwards the verified
//! identity in the `x-user-id` and `x-user-role` headers, which these
//! extractors read:
//!
//! ```rust,ignore
//! async fn my_orders(user: AuthUser) -> Result<Json<...>, ApiError> { ... }
//! async fn all_orders(admin: AdminUser) -> Result<Json<...>, ApiError> { ... }
//! ```

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const ADMIN_ROLE: &str = "ADMIN";

/// An authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: UserId,
    pub role: Option<String>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role
            .as_deref()
            .is_some_and(|role| role.eq_ignore_ascii_case(ADMIN_ROLE))
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                metrics::counter!("http_auth_rejected_total", "reason" => "missing").increment(1);
                ApiError::Unauthorized("Authentication required".to_string())
            })?;

        let user_id = raw.trim().parse::<UserId>().map_err(|_| {
            metrics::counter!("http_auth_rejected_total", "reason" => "malformed").increment(1);
            ApiError::Unauthorized("Invalid user identity".to_string())
        })?;

        let role = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|role| role.trim().to_string());

        Ok(Self { user_id, role })
    }
}

/// An authenticated caller holding the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user_id: UserId,
}

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            metrics::counter!("http_auth_rejected_total", "reason" => "forbidden").increment(1);
            return Err(ApiError::Forbidden("Admin access required".to_string()));
        }
        Ok(Self {
            user_id: user.user_id,
        })
    }
}
