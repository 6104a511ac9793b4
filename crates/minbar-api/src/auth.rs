use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::HeaderMap, http::StatusCode};
use tracing::info;
use uuid::Uuid;

use minbar_db::Database;
use minbar_media::MediaLifecycle;
use minbar_types::api::{LoginRequest, LoginResponse, SessionResponse};
use minbar_types::models::Session;

use crate::error::ApiError;
use crate::middleware::bearer_token;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub media: Arc<MediaLifecycle>,
}

/// Hash a PIN for storage. Used when provisioning the role accounts.
pub fn hash_pin(pin: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(pin.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("PIN hashing failed: {e}"))?
        .to_string();
    Ok(hash)
}

pub fn verify_pin(pin: &str, pin_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(pin_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(pin.as_bytes(), &parsed)
        .is_ok()
}

/// POST /auth/login — exchange a PIN + role for a session token.
///
/// Zero matches and a malformed PIN produce the same generic 401; only a
/// store failure surfaces differently (500), so the response never reveals
/// whether a given PIN exists.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let pin = req.pin.trim().to_string();
    let role = req.role;

    if pin.len() != 4 || !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::InvalidCredentials);
    }

    // PIN verification is argon2 work; keep it off the async runtime
    // together with the lookup.
    let db = state.db.clone();
    let user = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let users = db.active_users_by_role(role.as_str())?;
        Ok(users.into_iter().find(|u| verify_pin(&pin, &u.pin_hash)))
    })
    .await
    .map_err(ApiError::backend)?
    .map_err(ApiError::backend)?
    .ok_or(ApiError::InvalidCredentials)?;

    let token = Uuid::new_v4().to_string();
    {
        let db = state.db.clone();
        let token = token.clone();
        let user_id = user.id.clone();
        let user_role = user.role.clone();
        let user_name = user.name.clone();
        tokio::task::spawn_blocking(move || {
            db.insert_session(&token, &user_id, &user_role, &user_name)
        })
        .await
        .map_err(ApiError::backend)?
        .map_err(ApiError::backend)?;
    }

    info!("User {} logged in as {}", user.name, user.role);

    Ok(Json(LoginResponse {
        token,
        user_id: user.id.parse().map_err(ApiError::backend)?,
        name: user.name,
        role,
    }))
}

/// GET /auth/session — the identity behind the bearer token. The session
/// extension was already resolved by the middleware; nothing is re-read.
pub async fn current_session(Extension(session): Extension<Session>) -> Json<SessionResponse> {
    Json(SessionResponse {
        user_id: session.user_id,
        name: session.name,
        role: session.role,
    })
}

/// POST /auth/logout — destroy the session named by the bearer token.
/// Idempotent: a missing or already-dead token still gets a 204.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    if let Some(token) = bearer_token(&headers) {
        let token = token.to_string();
        let db = state.db.clone();
        tokio::task::spawn_blocking(move || db.delete_session(&token))
            .await
            .map_err(ApiError::backend)?
            .map_err(ApiError::backend)?;
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ctx, seed_user};
    use axum::http::header;
    use minbar_types::models::Role;

    #[test]
    fn pin_hash_round_trip() {
        let hash = hash_pin("1234").unwrap();
        assert!(verify_pin("1234", &hash));
        assert!(!verify_pin("4321", &hash));
        assert!(!verify_pin("1234", "not-a-phc-string"));
    }

    #[tokio::test]
    async fn unknown_pin_gets_generic_failure_and_no_session() {
        let ctx = ctx().await;
        seed_user(&ctx, "Admin", Role::Admin, "1234");

        let err = login(
            State(ctx.state.clone()),
            Json(LoginRequest {
                pin: "9999".into(),
                role: Role::Admin,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidCredentials));

        let sessions: i64 = ctx
            .state
            .db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(sessions, 0);
    }

    #[tokio::test]
    async fn role_mismatch_gets_the_same_generic_failure() {
        let ctx = ctx().await;
        seed_user(&ctx, "Cashier", Role::Cashier, "1234");

        let err = login(
            State(ctx.state.clone()),
            Json(LoginRequest {
                pin: "1234".into(),
                role: Role::Admin,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_trims_pin_and_persists_the_session() {
        let ctx = ctx().await;
        let user_id = seed_user(&ctx, "Admin", Role::Admin, "1234");

        let Json(resp) = login(
            State(ctx.state.clone()),
            Json(LoginRequest {
                pin: " 1234 ".into(),
                role: Role::Admin,
            }),
        )
        .await
        .unwrap();

        assert_eq!(resp.user_id, user_id);
        assert_eq!(resp.role, Role::Admin);
        assert_eq!(resp.name, "Admin");

        let row = ctx.state.db.get_session(&resp.token).unwrap().unwrap();
        assert_eq!(row.user_id, user_id.to_string());
        assert_eq!(row.role, "admin");
    }

    #[tokio::test]
    async fn inactive_user_cannot_log_in() {
        let ctx = ctx().await;
        let user_id = seed_user(&ctx, "Retired", Role::Cashier, "1234");
        ctx.state
            .db
            .with_conn_mut(|conn| {
                conn.execute(
                    "UPDATE users SET is_active = 0 WHERE id = ?1",
                    [user_id.to_string()],
                )?;
                Ok(())
            })
            .unwrap();

        let err = login(
            State(ctx.state.clone()),
            Json(LoginRequest {
                pin: "1234".into(),
                role: Role::Cashier,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidCredentials));
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let ctx = ctx().await;
        let user_id = seed_user(&ctx, "Admin", Role::Admin, "1234");
        let session = crate::test_support::open_session(&ctx, user_id, "Admin", Role::Admin);

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            format!("Bearer {}", session.token).parse().unwrap(),
        );

        let status = logout(State(ctx.state.clone()), headers.clone()).await.unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(ctx.state.db.get_session(&session.token).unwrap().is_none());

        // Second call, and a call with no header at all, both succeed.
        let status = logout(State(ctx.state.clone()), headers).await.unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        let status = logout(State(ctx.state.clone()), HeaderMap::new()).await.unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}
