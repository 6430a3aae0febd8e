use axum::http::HeaderValue;
use qaforum_api::{config::Config, db, router, AppState};
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qaforum_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let pool = db::create_pool(&config.database_url).expect("Failed to create DB pool");
    db::initialize(&pool).expect("Failed to initialize database");
    tracing::info!(database = %config.database_url, "database ready");

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .cors_origin
                .parse::<HeaderValue>()
                .expect("Invalid CORS_ORIGIN"),
        )
        .allow_methods(AllowMethods::any())
        .allow_headers(AllowHeaders::any());

    let state = AppState {
        db: pool,
        jwt: config.jwt.clone(),
    };
    let app = router(state).layer(cors);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind listener");
    tracing::info!("API server listening on {addr}");
    axum::serve(listener, app).await.expect("Server error");
}
