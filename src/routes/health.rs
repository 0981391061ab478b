//! # 헬스체크(Health Check) 핸들러
//!
//! ## 엔드포인트
//! - `GET {API_ROOT}/health` → `{ "status": "ok", "database": "ok" }`
//!
//! 로드밸런서나 컨테이너 오케스트레이터의 상태 확인용입니다.
//! DB에 간단한 쿼리를 보내 저장소 연결까지 확인합니다.

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::routes::multiple_post_type::AppState;

/// `GET /health` — 서버와 DB 연결 상태를 확인합니다.
///
/// DB가 응답하지 않으면 503과 함께 `"database": "unavailable"`을 반환합니다.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&state.pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "database": "ok" })),
        ),
        Err(e) => {
            tracing::warn!("health check database probe failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "database": "unavailable" })),
            )
        }
    }
}
