//! # multi-post-type
//!
//! 여러 콘텐츠 타입(post, page, attachment, 커스텀 타입)을 하나의 페이지네이션
//! 컬렉션으로 조회하는 읽기 전용 REST 엔드포인트입니다.
//!
//! 실행 파일(`main.rs`)과 통합 테스트가 같은 라우터를 쓰도록 라이브러리로 분리했습니다.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use axum::{routing::get, Router};

use routes::{health_check, list_multiple_post_types, namespace_index, AppState};

/// API 라우터를 만듭니다.
///
/// 모든 라우트는 `API_ROOT` 아래에 놓입니다. 루트가 비어 있으면 최상위에 그대로 붙습니다.
/// CORS/로깅 레이어는 호출하는 쪽(`main`)에서 덧붙입니다.
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();

    let api_routes = Router::new()
        .route(&config.namespace_path(), get(namespace_index))
        .route(&config.collection_path(), get(list_multiple_post_types))
        .route("/health", get(health_check))
        .with_state(state);

    if config.api_root.is_empty() {
        Router::new().merge(api_routes)
    } else {
        Router::new().nest(&config.api_root, api_routes)
    }
}
