use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use safetrack_services::{auth::AuthError, policy::Actor};

use crate::{error::ApiError, state::AppState};

/// The caller, resolved from a JWT (Authorization header or `access_token`
/// cookie) and then from the user store, so role and tenant are current.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub actor: Actor,
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let token = bearer_token(parts)
            .or_else(|| cookie_token(parts))
            .ok_or(AuthError::MissingToken)?;

        let claims = app_state.auth.verify_access_token(&token)?;
        let user_id = claims.user_id()?;

        let user = app_state
            .users
            .find_active(user_id)
            .await?
            .ok_or(AuthError::UnknownUser)?;

        Ok(AuthUser {
            actor: Actor {
                id: user_id,
                tenant_id: user.tenant_id,
                role: user.role,
                display_name: user.display_name,
            },
        })
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

fn cookie_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| {
            cookies.split(';').find_map(|cookie| {
                cookie
                    .trim()
                    .strip_prefix("access_token=")
                    .map(|s| s.to_string())
            })
        })
}
