use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use assessment_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    middleware::rate_limit,
    routes,
    store::postgres::PgStore,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let store = Arc::new(PgStore::new(pool));
    let app_state = AppState::new(store);

    let base_routes = Router::new().route("/health", get(routes::health::health));

    let public_api = Router::new()
        .route(
            "/api/test/:link_id/validate",
            get(routes::public::validate_link),
        )
        .route("/api/test/:link_id/start", post(routes::public::start_test))
        .route(
            "/api/test/session/:session_id/question",
            get(routes::public::get_question),
        )
        .route(
            "/api/test/session/:session_id/answer",
            post(routes::public::submit_answer),
        )
        .route(
            "/api/test/session/:session_id/distraction",
            post(routes::public::record_distraction),
        )
        .route(
            "/api/test/session/:session_id/status",
            get(routes::public::get_status),
        )
        .layer(axum::middleware::from_fn_with_state(
            rate_limit::RateLimiter::new(config.public_rps),
            rate_limit::rps_middleware,
        ));

    let admin_api = Router::new()
        .route(
            "/api/admin/links",
            get(routes::admin::list_test_links).post(routes::admin::create_test_link),
        )
        .route(
            "/api/admin/links/:link_id",
            delete(routes::admin::delete_test_link),
        )
        .route("/api/admin/results", get(routes::admin::list_results))
        .route(
            "/api/admin/results/:session_id",
            get(routes::admin::get_result_detail).delete(routes::admin::delete_result),
        )
        .route(
            "/api/admin/results/:session_id/attempts",
            get(routes::admin::get_result_attempts),
        )
        .layer(axum::middleware::from_fn_with_state(
            rate_limit::RateLimiter::new(config.admin_rps),
            rate_limit::rps_middleware,
        ));

    let app = base_routes
        .merge(public_api)
        .merge(admin_api)
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
