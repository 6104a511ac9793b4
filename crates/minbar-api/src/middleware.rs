use axum::{
    Extension,
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};

use minbar_types::models::{Role, Session};

use crate::auth::AppState;
use crate::error::ApiError;

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Resolve the bearer token to a stored session and inject it as a request
/// extension. Applied at the routing layer, so no protected handler begins
/// executing without a session in scope.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())
        .ok_or(ApiError::Unauthorized)?
        .to_string();

    let row = {
        let db = state.db.clone();
        let token = token.clone();
        tokio::task::spawn_blocking(move || db.get_session(&token))
            .await
            .map_err(ApiError::backend)?
            .map_err(ApiError::backend)?
    }
    .ok_or(ApiError::Unauthorized)?;

    let session = Session {
        token,
        user_id: row.user_id.parse().map_err(ApiError::backend)?,
        name: row.name,
        role: Role::parse(&row.role).ok_or_else(|| {
            ApiError::backend(anyhow::anyhow!("corrupt role {:?} on session", row.role))
        })?,
    };

    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

/// Role gates. Layered under `require_session`, so the extension is present.
pub async fn require_cashier(
    Extension(session): Extension<Session>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if session.role != Role::Cashier {
        return Err(ApiError::Forbidden);
    }
    Ok(next.run(req).await)
}

pub async fn require_admin(
    Extension(session): Extension<Session>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if session.role != Role::Admin {
        return Err(ApiError::Forbidden);
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer abc-123".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc-123"));

        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }
}
