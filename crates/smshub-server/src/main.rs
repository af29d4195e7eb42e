use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use smshub_api::auth::{self, AppState, AppStateInner, PurgeNonces};
use smshub_api::middleware::require_auth;
use smshub_api::{ingest, listing, otp, tokens};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smshub=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("SMSHUB_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("SMSHUB_DB_PATH").unwrap_or_else(|_| "smshub.db".into());
    let host = std::env::var("SMSHUB_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("SMSHUB_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = smshub_db::Database::open(&PathBuf::from(&db_path))?;

    // First run: seed an operator account so the management API is reachable.
    let admin_user = std::env::var("SMSHUB_ADMIN_USER").unwrap_or_else(|_| "admin".into());
    let admin_password = std::env::var("SMSHUB_ADMIN_PASSWORD").ok();
    let generated = admin_password.is_none();
    let admin_password = admin_password.unwrap_or_else(|| tokens::generate_secret(16));
    if auth::bootstrap_operator(&db, &admin_user, &admin_password)? {
        if generated {
            info!(
                "created operator '{}' with generated password: {}",
                admin_user, admin_password
            );
        } else {
            info!("created operator '{}'", admin_user);
        }
    }

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        purge_nonces: PurgeNonces::default(),
    });

    // Routes: device endpoints carry their own bearer credentials, the
    // management surface sits behind the operator JWT middleware.
    let public_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/api/sms", post(ingest::receive_sms))
        .route("/api/code", get(otp::latest_code))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/messages", get(listing::list_messages))
        .route("/api/messages/purge-token", get(listing::purge_token))
        .route("/api/messages/purge", post(listing::purge))
        .route("/api/tokens", get(tokens::list).post(tokens::create))
        .route("/api/tokens/{id}", delete(tokens::remove))
        .route("/api/tokens/{id}/toggle", post(tokens::toggle))
        .route("/api/tokens/{id}/reset", post(tokens::reset))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("smshub listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
