use crate::{
    error::{AppError, AppResult},
    models::User,
    permission::{Permission, Role},
    utils::{
        cookie::{extract_cookie, ACCESS_TOKEN_COOKIE},
        jwt::{decode_jwt, is_access_token},
    },
};
use axum::{
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
    Extension,
};
use sea_orm::{DatabaseConnection, EntityTrait};

/// The authenticated caller, as loaded from the database for this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i32,
    pub role: Role,
}

impl AuthUser {
    pub fn can(&self, permission: Permission) -> bool {
        self.role.has(permission)
    }

    /// Fail with 403 unless the caller's role grants `permission`.
    pub fn require(&self, permission: Permission) -> AppResult<()> {
        if self.can(permission) {
            Ok(())
        } else {
            tracing::debug!(
                user_id = self.user_id,
                role = %self.role,
                %permission,
                "Permission denied"
            );
            Err(AppError::Forbidden)
        }
    }
}

/// Caller identity on routes that also serve anonymous requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

/// JWT authentication middleware.
///
/// Rejects the request with 401 unless a valid access token for an existing
/// user is present. The role is read from the database, so role changes take
/// effect on the next request.
pub async fn auth_middleware(
    Extension(db): Extension<DatabaseConnection>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_user = authenticate(&db, &headers).await?;
    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}

/// Attaches an [`AuthUser`] when the request carries a usable token and lets
/// the request through untouched otherwise.
pub async fn optional_auth_middleware(
    Extension(db): Extension<DatabaseConnection>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&db, &headers).await {
        Ok(auth_user) => {
            request.extensions_mut().insert(auth_user);
        }
        Err(AppError::Database(e)) => {
            tracing::warn!("Optional auth lookup failed: {e}");
        }
        Err(_) => {}
    }
    next.run(request).await
}

async fn authenticate(db: &DatabaseConnection, headers: &HeaderMap) -> AppResult<AuthUser> {
    // Prefer Authorization: Bearer, fall back to the HttpOnly cookie.
    let token = extract_bearer_token(headers)
        .or_else(|| extract_cookie(headers, ACCESS_TOKEN_COOKIE))
        .ok_or(AppError::Unauthorized)?;

    let claims = decode_jwt(&token).map_err(|_| AppError::Unauthorized)?;
    if !is_access_token(&claims) {
        return Err(AppError::Unauthorized);
    }
    let user_id = claims.user_id().ok_or(AppError::Unauthorized)?;

    let user = User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(AuthUser {
        user_id: user.id,
        role: user.role,
    })
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;

    let token = auth_header.strip_prefix("Bearer ")?;
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or(AppError::Unauthorized)
    }
}

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(parts.extensions.get::<AuthUser>().copied()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderValue};

    #[test]
    fn bearer_token_is_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(extract_bearer_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn malformed_authorization_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn require_checks_role_table() {
        let moderator = AuthUser {
            user_id: 3,
            role: Role::Moderator,
        };
        assert!(moderator.require(Permission::ReviewPoems).is_ok());
        assert!(matches!(
            moderator.require(Permission::ManageRoles),
            Err(AppError::Forbidden)
        ));
    }
}
