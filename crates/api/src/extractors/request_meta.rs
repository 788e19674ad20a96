use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use safetrack_db::models::AuditMetadata;

/// Request context copied into audit events.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestMeta {
    pub fn audit_metadata(&self) -> AuditMetadata {
        AuditMetadata {
            ip: self.ip.clone(),
            user_agent: self.user_agent.clone(),
            reason: None,
        }
    }
}

impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_value = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        // First hop of X-Forwarded-For is the client.
        let ip = header_value("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .or_else(|| header_value("x-real-ip").map(str::to_string));
        let user_agent = header_value(header::USER_AGENT.as_str()).map(str::to_string);

        Ok(RequestMeta { ip, user_agent })
    }
}
