//! # 다중 콘텐츠 타입 컬렉션 핸들러
//!
//! ## 엔드포인트
//! - `GET {API_ROOT}/{namespace}/v2/multiple-post-type` → 여러 타입의 항목을 한 목록으로
//!
//! ## 처리 흐름
//! 1. 원본 쿼리 문자열 디코딩 (`type[]=post&type[]=page`)
//! 2. 파라미터 스키마 검증/정규화 (상태 권한 검사 포함)
//! 3. 구조화 필터 생성 (`type`이 목록이 아니면 422, 저장소는 호출하지 않음)
//! 4. 저장소 실행과 전체 건수 보정
//! 5. 항목 직렬화, 페이지네이션 헤더/링크 조립

use std::sync::Arc;

use axum::{
    extract::{RawQuery, State},
    response::Response,
};
use sqlx::SqlitePool;

use crate::{
    config::Config,
    db::SqliteContentStore,
    error::AppError,
    middleware::auth::Caller,
    services::{
        executor,
        hooks::QueryHooks,
        params::ParamSchema,
        query_builder::{build_query_args, BuildContext},
        query_string::QueryString,
        registry::Registry,
        response::{self, AssembleContext},
        store::ContentStore,
    },
};

/// 애플리케이션 공유 상태
///
/// 모든 요청 핸들러가 `State(state): State<AppState>`로 접근합니다.
/// 레지스트리와 파라미터 스키마는 시작 시 한 번 만들어지고 이후 읽기 전용입니다.
#[derive(Clone)]
pub struct AppState {
    /// SQLite 연결 풀 (호출자 조회용)
    pub pool: SqlitePool,
    /// Bearer 토큰 검증용 비밀키
    pub jwt_secret: String,
    pub store: Arc<dyn ContentStore>,
    pub registry: Arc<Registry>,
    pub hooks: Arc<QueryHooks>,
    /// 등록된 모든 타입 기준으로 만든 파라미터 스키마
    pub schema: Arc<ParamSchema>,
    pub config: Arc<Config>,
}

impl AppState {
    /// SQLite 저장소를 쓰는 기본 상태
    pub fn new(pool: SqlitePool, config: Config, registry: Registry, hooks: QueryHooks) -> Self {
        let store = SqliteContentStore::new(pool.clone(), config.default_per_page);
        Self::with_store(pool, config, registry, hooks, Arc::new(store))
    }

    pub fn with_store(
        pool: SqlitePool,
        config: Config,
        registry: Registry,
        hooks: QueryHooks,
        store: Arc<dyn ContentStore>,
    ) -> Self {
        let schema = ParamSchema::collection_params(&registry);
        Self {
            pool,
            jwt_secret: config.jwt_secret.clone(),
            store,
            registry: Arc::new(registry),
            hooks: Arc::new(hooks),
            schema: Arc::new(schema),
            config: Arc::new(config),
        }
    }
}

/// `GET /{namespace}/v2/multiple-post-type`
pub async fn list_multiple_post_types(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
    caller: Caller,
) -> Result<Response, AppError> {
    let query = QueryString::parse(raw.as_deref().unwrap_or_default());
    let params = state.schema.prepare(query, &caller, &state.registry)?;

    let build = BuildContext {
        registry: &state.registry,
        caller: &caller,
        hooks: &state.hooks,
        policy: state.config.override_policy,
    };
    let args = build_query_args(&params, &build)?;
    tracing::debug!(args = ?args, "built content query");

    let result = executor::execute(state.store.as_ref(), &args, state.config.default_per_page).await?;

    let collection = response::assemble(
        result,
        &params,
        AssembleContext {
            registry: &state.registry,
            config: &state.config,
            caller: &caller,
            store: state.store.as_ref(),
        },
    )
    .await?;

    Ok(collection.into_http(&state.config.header_prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        build_router,
        services::{
            executor::fakes::{post, MemoryStore},
            registry::fixtures::registry,
        },
    };
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use sqlx::sqlite::SqlitePoolOptions;
    use tower::ServiceExt;

    fn state_with(store: Arc<MemoryStore>) -> AppState {
        let pool = SqlitePoolOptions::new()
            .connect_lazy("sqlite::memory:")
            .unwrap();
        AppState::with_store(
            pool,
            Config::for_tests(),
            registry(),
            QueryHooks::default(),
            store,
        )
    }

    async fn get(state: AppState, uri: &str) -> Response {
        build_router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn scalar_type_is_rejected_without_querying() {
        let store = Arc::new(MemoryStore::with_posts(vec![post(1, "post")]));
        let response = get(
            state_with(store.clone()),
            "/wp-json/wp/v2/multiple-post-type?type=post",
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(store.query_count(), 0);

        let response = get(state_with(store.clone()), "/wp-json/wp/v2/multiple-post-type").await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn forbidden_status_is_rejected_before_querying() {
        let store = Arc::new(MemoryStore::default());
        let response = get(
            state_with(store.clone()),
            "/wp-json/wp/v2/multiple-post-type?type[]=post&status=draft",
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn out_of_range_page_reports_the_real_total() {
        let store = Arc::new(MemoryStore::with_posts(
            (1..=5).map(|id| post(id, "post")).collect(),
        ));
        let response = get(
            state_with(store.clone()),
            "/wp-json/wp/v2/multiple-post-type?type[]=post&per_page=10&page=3",
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-wp-total"], "5");
        assert_eq!(response.headers()["x-wp-totalpages"], "1");
        assert_eq!(store.query_count(), 2);
    }
}
