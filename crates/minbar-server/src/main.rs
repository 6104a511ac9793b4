use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use minbar_api::auth::{self, AppState, AppStateInner};
use minbar_api::middleware::{require_admin, require_cashier, require_session};
use minbar_api::{committee, dashboard, transactions};
use minbar_db::Database;
use minbar_media::{BlobStore, MediaLifecycle, reconcile};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "minbar=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let host = std::env::var("MINBAR_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("MINBAR_PORT")
        .unwrap_or_else(|_| "3400".into())
        .parse()?;
    let db_path: PathBuf = std::env::var("MINBAR_DB_PATH")
        .unwrap_or_else(|_| "minbar.db".into())
        .into();
    let media_dir: PathBuf = std::env::var("MINBAR_MEDIA_DIR")
        .unwrap_or_else(|_| "./media-storage".into())
        .into();
    let public_base_url = std::env::var("MINBAR_PUBLIC_BASE_URL")
        .unwrap_or_else(|_| format!("http://{}:{}/media", host, port));
    let blob_timeout_secs: u64 = std::env::var("MINBAR_BLOB_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10);
    let reconcile_secs: u64 = std::env::var("MINBAR_RECONCILE_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(300);

    // Init database and blob storage
    let db = Arc::new(Database::open(&db_path)?);
    seed_role_accounts(&db)?;

    let store = Arc::new(BlobStore::new(media_dir.clone(), public_base_url).await?);
    let media = Arc::new(MediaLifecycle::new(
        db.clone(),
        store,
        Duration::from_secs(blob_timeout_secs),
    ));

    // Background re-key retry for members stuck on temporary blob keys
    tokio::spawn(reconcile::run_reconcile_loop(media.clone(), reconcile_secs));

    let state: AppState = Arc::new(AppStateInner { db, media });

    // Public surface: login/logout, dashboard, listings
    let public_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/dashboard", get(dashboard::dashboard_stats))
        .route("/transactions", get(transactions::list_transactions))
        .route("/committee", get(committee::list_members))
        .route("/health", get(health))
        .with_state(state.clone());

    let session_routes = Router::new()
        .route("/auth/session", get(auth::current_session))
        .layer(middleware::from_fn_with_state(state.clone(), require_session))
        .with_state(state.clone());

    // Cashier-gated: transaction writes
    let cashier_routes = Router::new()
        .route("/transactions", post(transactions::add_transaction))
        .route("/transactions/{id}", put(transactions::update_transaction))
        .route("/transactions/{id}", delete(transactions::delete_transaction))
        .layer(middleware::from_fn(require_cashier))
        .layer(middleware::from_fn_with_state(state.clone(), require_session))
        .with_state(state.clone());

    // Admin-gated: roster writes
    let admin_routes = Router::new()
        .route("/committee", post(committee::add_member))
        .route("/committee/{id}", put(committee::update_member))
        .route("/committee/{id}", delete(committee::delete_member))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), require_session))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(session_routes)
        .merge(cashier_routes)
        .merge(admin_routes)
        .nest_service("/media", ServeDir::new(&media_dir))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024)) // 5 MB image + base64 overhead
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Minbar server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

/// Provision the two role accounts on first start, from MINBAR_ADMIN_PIN and
/// MINBAR_CASHIER_PIN. Users are otherwise managed out-of-band, directly in
/// the store.
fn seed_role_accounts(db: &Database) -> anyhow::Result<()> {
    if db.count_users()? > 0 {
        return Ok(());
    }

    let seeds = [
        ("MINBAR_ADMIN_PIN", "Admin", "admin"),
        ("MINBAR_CASHIER_PIN", "Cashier", "cashier"),
    ];
    for (var, name, role) in seeds {
        let Ok(pin) = std::env::var(var) else {
            continue;
        };
        let pin = pin.trim();
        if pin.len() != 4 || !pin.chars().all(|c| c.is_ascii_digit()) {
            anyhow::bail!("{} must be a 4-digit PIN", var);
        }

        let id = uuid::Uuid::new_v4().to_string();
        db.create_user(&id, name, role, &auth::hash_pin(pin)?)?;
        info!("Seeded {} account", role);
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
