//! # 네임스페이스 인덱스
//!
//! `GET {API_ROOT}/{namespace}/v2` → 등록된 라우트와 파라미터 스키마.
//! 클라이언트가 택소노미 파라미터를 포함한 전체 파라미터 목록을 발견할 때 씁니다.

use axum::{extract::State, Json};
use serde_json::{json, Map, Value};

use crate::routes::multiple_post_type::AppState;

pub async fn namespace_index(State(state): State<AppState>) -> Json<Value> {
    let namespace = state.config.namespace_path();
    let namespace = namespace.trim_start_matches('/');
    let route = state.config.collection_path();

    let mut routes = Map::new();
    routes.insert(
        route.clone(),
        json!({
            "namespace": namespace,
            "methods": ["GET"],
            "endpoints": [{
                "methods": ["GET"],
                "args": state.schema.describe(),
            }],
            "_links": {
                "self": [{ "href": format!("{}{}{}", state.config.public_url, state.config.api_root, route) }],
            },
        }),
    );

    Json(json!({
        "namespace": namespace,
        "routes": routes,
    }))
}
