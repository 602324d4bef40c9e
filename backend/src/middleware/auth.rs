//! Authentication middleware
//!
//! JWT authentication and role-based access control middleware

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use shared::{Action, AppRole, Resource};

use crate::error::{AppError, ErrorDetail, ErrorResponse};
use crate::services::auth::Claims;
use crate::AppState;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: uuid::Uuid,
    pub company_id: uuid::Uuid,
    pub role: AppRole,
    pub permissions: Vec<String>,
}

impl AuthUser {
    /// Check if user has a specific permission
    pub fn has_permission(&self, resource: &str, action: &str) -> bool {
        let permission = format!("{}:{}", resource, action);
        self.permissions.contains(&permission)
    }

    /// Permission guard for handlers
    pub fn require(&self, resource: Resource, action: Action) -> Result<(), AppError> {
        if self.has_permission(resource.as_str(), action.as_str()) {
            Ok(())
        } else {
            tracing::debug!(
                user_id = %self.user_id,
                "permission denied: requires {}:{}",
                resource.as_str(),
                action.as_str()
            );
            Err(AppError::InsufficientPermissions)
        }
    }
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => {
            return unauthorized_response("Missing or invalid Authorization header");
        }
    };

    let claims = match decode_jwt(token, &state.config.jwt.secret) {
        Ok(claims) => claims,
        Err(msg) => {
            return unauthorized_response(&msg);
        }
    };

    let auth_user = match auth_user_from_claims(claims) {
        Ok(user) => user,
        Err(msg) => return unauthorized_response(msg),
    };

    request.extensions_mut().insert(auth_user);

    next.run(request).await
}

fn auth_user_from_claims(claims: Claims) -> Result<AuthUser, &'static str> {
    let user_id =
        uuid::Uuid::parse_str(&claims.sub).map_err(|_| "Invalid user ID in token")?;
    let company_id =
        uuid::Uuid::parse_str(&claims.company_id).map_err(|_| "Invalid company ID in token")?;
    let role = claims
        .role
        .parse::<AppRole>()
        .map_err(|_| "Invalid role in token")?;

    Ok(AuthUser {
        user_id,
        company_id,
        role,
        permissions: claims.permissions,
    })
}

/// Decode and validate JWT token
fn decode_jwt(token: &str, secret: &str) -> Result<Claims, String> {
    use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => "Token has expired".to_string(),
        _ => format!("Invalid token: {}", e),
    })
}

/// Create unauthorized response
fn unauthorized_response(message: &str) -> Response {
    let error = ErrorResponse {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message_en: message.to_string(),
            message_pt: "Não autorizado".to_string(),
            field: None,
        },
    };

    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| {
                let error = ErrorResponse {
                    error: ErrorDetail {
                        code: "UNAUTHORIZED".to_string(),
                        message_en: "Authentication required".to_string(),
                        message_pt: "É necessário iniciar sessão".to_string(),
                        field: None,
                    },
                };
                (StatusCode::UNAUTHORIZED, Json(error))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: &str) -> Claims {
        Claims {
            sub: uuid::Uuid::new_v4().to_string(),
            company_id: uuid::Uuid::new_v4().to_string(),
            role: role.to_string(),
            permissions: AppRole::Editor.permission_strings(),
            exp: 0,
            iat: 0,
        }
    }

    #[test]
    fn claims_become_auth_user() {
        let user = auth_user_from_claims(claims("editor")).unwrap();
        assert_eq!(user.role, AppRole::Editor);
        assert!(user.require(Resource::Movement, Action::Create).is_ok());
        assert!(matches!(
            user.require(Resource::User, Action::Manage),
            Err(AppError::InsufficientPermissions)
        ));
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(auth_user_from_claims(claims("owner")).is_err());
    }
}
