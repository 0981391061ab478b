//! # multi-post-type 서버 진입점
//!
//! 수행하는 작업:
//! 1. 환경변수(.env) 로딩
//! 2. 로깅(tracing) 초기화
//! 3. SQLite 연결 풀 생성과 마이그레이션
//! 4. 콘텐츠 타입/택소노미 레지스트리 로딩
//! 5. 라우터 설정 후 HTTP 서버 시작

use anyhow::Result;
use multi_post_type::{
    build_router, config::Config, db, routes::AppState, services::hooks::QueryHooks,
};
use sqlx::sqlite::SqlitePoolOptions;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "multi_post_type=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        "Starting multi-post-type server on {}:{} (override policy: {:?})",
        config.host,
        config.port,
        config.override_policy
    );

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    // 레지스트리는 시작 시 한 번만 읽습니다. 타입 등록을 바꾸면 재시작이 필요합니다.
    let registry = db::load_registry(&pool).await?;

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(pool, config, registry, QueryHooks::default());

    // 개발 환경 기준으로 모든 출처를 허용합니다.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = build_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
