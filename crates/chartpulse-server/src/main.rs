use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use chartpulse_db::AppState;
use sea_orm_migration::MigratorTrait;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod api;
mod auth;
mod credentials;
mod scan_worker;
mod sync_worker;

#[derive(Serialize)]
struct ApiStatus {
    status: &'static str,
    version: &'static str,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Database connection
    let db_config = chartpulse_db::DatabaseConfig::from_env();
    tracing::info!("connecting to database...");
    let db = chartpulse_db::connect(&db_config)
        .await
        .expect("failed to connect to database");

    // Run migrations
    tracing::info!("running database migrations...");
    chartpulse_migration::Migrator::up(&db, None)
        .await
        .expect("failed to run migrations");
    tracing::info!("migrations complete");

    // Build application state
    let jwt_secret = std::env::var("JWT_SECRET")
        .unwrap_or_else(|_| "dev-secret-change-me-in-production".to_string());

    // SECURITY: warn if JWT secret is the default fallback
    if jwt_secret == "dev-secret-change-me-in-production"
        || jwt_secret == "change-me-to-a-secure-random-string"
    {
        tracing::error!(
            "JWT_SECRET is set to a known default value! \
             This is a critical security vulnerability. \
             Set JWT_SECRET to a strong random string (≥32 chars) in production."
        );
        if std::env::var("CHARTPULSE_ENV").unwrap_or_default() == "production" {
            panic!("Refusing to start: JWT_SECRET must be set to a secure value in production.");
        }
    }
    let domain =
        std::env::var("CHARTPULSE_DOMAIN").unwrap_or_else(|_| "localhost:8080".to_string());

    tracing::info!("instance domain: {}", domain);

    // Initialize the upload spool (S3 or local)
    let spool: Arc<dyn chartpulse_connect::UploadSpool> = match std::env::var("SPOOL_BACKEND")
        .unwrap_or_default()
        .as_str()
    {
        "s3" => {
            tracing::info!("initializing S3 upload spool");
            let endpoint = std::env::var("S3_ENDPOINT").ok();
            let region = std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string());
            let access_key = std::env::var("S3_ACCESS_KEY")
                .expect("S3_ACCESS_KEY is required when SPOOL_BACKEND=s3");
            let secret_key = std::env::var("S3_SECRET_KEY")
                .expect("S3_SECRET_KEY is required when SPOOL_BACKEND=s3");
            let bucket =
                std::env::var("S3_BUCKET").expect("S3_BUCKET is required when SPOOL_BACKEND=s3");
            let prefix = std::env::var("S3_PREFIX").unwrap_or_default();

            Arc::new(
                chartpulse_connect::S3Spool::from_config(
                    endpoint.as_deref(),
                    &region,
                    &access_key,
                    &secret_key,
                    &bucket,
                    &prefix,
                )
                .await
                .expect("failed to initialize S3 spool"),
            )
        }
        _ => {
            tracing::info!("using local filesystem upload spool");
            Arc::new(chartpulse_connect::LocalSpool::from_env())
        }
    };

    let state = Arc::new(AppState {
        db,
        jwt_secret,
        domain,
        spool,
    });

    // Background workers: chart sync and file scanning
    sync_worker::spawn(state.clone());
    scan_worker::spawn(state.clone());

    // Rate limiter for auth endpoints: 10 requests per 60 seconds per IP
    let auth_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(6)
            .burst_size(10)
            .finish()
            .expect("failed to build rate limiter config"),
    );

    // Auth routes (public, rate-limited)
    let auth_public = Router::new()
        .route("/login", post(auth::routes::login))
        .route("/refresh", post(auth::routes::refresh))
        .layer(GovernorLayer::new(auth_governor_conf));

    // Auth routes (protected)
    let auth_protected = Router::new()
        .route("/me", get(auth::routes::me))
        .route(
            "/password",
            axum::routing::put(auth::routes::change_password),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ));

    // Always-public routes: first-run setup and provider callbacks
    let always_public_api = Router::new()
        .route("/setup/status", get(api::setup::setup_status))
        .route("/setup/admin", post(api::setup::setup_admin))
        .route("/webhooks/acrcloud", post(api::webhooks::receive_acrcloud));

    // Protected API routes (auth required)
    let protected_api = Router::new()
        .merge(
            Router::new()
                .route(
                    "/scans",
                    get(api::scans::list_scans).post(api::scans::upload_scan),
                )
                .layer(DefaultBodyLimit::max(100 * 1024 * 1024)), // 100 MB for audio uploads
        )
        .route("/dashboard/overview", get(api::dashboard::overview))
        .route("/charts", get(api::charts::list_charts))
        .route("/charts/{id}", get(api::charts::get_chart))
        .route("/charts/{id}/rankings", get(api::charts::list_chart_rankings))
        .route(
            "/charts/{id}/rankings/{date}",
            get(api::charts::get_chart_ranking),
        )
        .route(
            "/charts/{id}/executions",
            get(api::charts::list_chart_executions),
        )
        .route("/schedules", get(api::schedules::list_schedules))
        .route("/tracks", get(api::tracks::list_tracks))
        .route("/tracks/{id}", get(api::tracks::get_track))
        .route(
            "/tracks/{id}/chart-history",
            get(api::tracks::track_chart_history),
        )
        .route("/tracks/{id}/refresh", post(api::tracks::refresh_track))
        .route("/artists", get(api::artists::list_artists))
        .route("/artists/{id}", get(api::artists::get_artist))
        .route(
            "/artists/{id}/refresh-audience",
            post(api::artists::refresh_artist_audience),
        )
        .route("/scans/{id}", get(api::scans::get_scan))
        .route("/scans/{id}/retry", post(api::scans::retry_scan))
        .route("/scans/{id}/identify", post(api::scans::identify_scan))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ));

    let api_routes = Router::new()
        .nest("/auth", auth_public.merge(auth_protected))
        .merge(always_public_api)
        .merge(protected_api)
        .nest(
            "/admin",
            Router::new()
                .route("/charts", post(api::charts::create_chart))
                .route("/charts/{id}", axum::routing::put(api::charts::update_chart))
                .route("/charts/{id}/sync", post(api::charts::sync_chart))
                .route("/schedules", post(api::schedules::create_schedule))
                .route(
                    "/schedules/{id}",
                    axum::routing::put(api::schedules::update_schedule)
                        .delete(api::schedules::delete_schedule),
                )
                .route("/executions", get(api::schedules::list_executions))
                .route("/sync/run", post(api::schedules::run_sync_pass_now))
                .route(
                    "/tracks/refresh-stale",
                    post(api::tracks::refresh_stale_tracks),
                )
                .route("/settings", get(api::admin::list_settings))
                .route(
                    "/settings/{key}",
                    axum::routing::put(api::admin::update_setting),
                )
                .route(
                    "/users",
                    get(api::admin::list_users).post(api::admin::create_user),
                )
                .route(
                    "/users/{id}",
                    axum::routing::delete(api::admin::delete_user),
                )
                .route(
                    "/users/{id}/role",
                    axum::routing::put(api::admin::update_user_role),
                )
                .route(
                    "/users/{id}/disable",
                    axum::routing::put(api::admin::set_user_disabled),
                )
                .route(
                    "/webhook-events",
                    get(api::webhooks::list_webhook_events),
                )
                .route(
                    "/webhook-events/{id}",
                    get(api::webhooks::get_webhook_event),
                )
                .route(
                    "/webhook-events/{id}/replay",
                    post(api::webhooks::replay_webhook_event),
                )
                .layer(axum_middleware::from_fn_with_state(
                    state.clone(),
                    auth::middleware::require_admin,
                )),
        );

    // CORS configuration — restrict to configured origins
    let cors = {
        let allowed_origins_str = std::env::var("CORS_ORIGINS").unwrap_or_default();
        if allowed_origins_str.is_empty() {
            // Default: allow same-origin only (no cross-origin)
            tracing::warn!("CORS_ORIGINS not set — defaulting to restrictive CORS. Set CORS_ORIGINS=http://localhost:3000 for dev.");
            let scheme = std::env::var("CHARTPULSE_SCHEME").unwrap_or_else(|_| "https".to_string());
            let origin = format!("{scheme}://{}", state.domain);
            CorsLayer::new()
                .allow_origin(AllowOrigin::exact(
                    HeaderValue::from_str(&origin)
                        .unwrap_or_else(|_| HeaderValue::from_static("https://localhost")),
                ))
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PUT,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers(tower_http::cors::Any)
                .expose_headers(tower_http::cors::Any)
        } else {
            let origins: Vec<HeaderValue> = allowed_origins_str
                .split(',')
                .filter_map(|s| HeaderValue::from_str(s.trim()).ok())
                .collect();
            tracing::info!("CORS allowed origins: {:?}", origins);
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PUT,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers(tower_http::cors::Any)
                .expose_headers(tower_http::cors::Any)
        }
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=63072000; includeSubDomains; preload"),
        ))
        // Content-Security-Policy
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::HeaderName::from_static("content-security-policy"),
            HeaderValue::from_static("default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' data: https:; connect-src 'self'; font-src 'self'; frame-ancestors 'none'"),
        ))
        // Referrer-Policy
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        // Permissions-Policy
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::HeaderName::from_static("permissions-policy"),
            HeaderValue::from_static("camera=(), microphone=(), geolocation=(), payment=()"),
        ))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 8080));
    tracing::info!(%addr, "server started");

    axum::serve(
        tokio::net::TcpListener::bind(addr).await.unwrap(),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}

async fn healthz() -> Json<ApiStatus> {
    Json(ApiStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
