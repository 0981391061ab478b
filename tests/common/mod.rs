//! 통합 테스트 공용 도구
//!
//! 테스트마다 메모리 SQLite에 마이그레이션을 적용하고, 실제 레지스트리/저장소/라우터로
//! 요청을 보냅니다.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, HeaderMap, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tower::ServiceExt;

use multi_post_type::{
    build_router,
    config::{Config, OverridePolicy},
    db,
    middleware::auth::create_access_token,
    routes::AppState,
    services::hooks::QueryHooks,
};

pub const JWT_SECRET: &str = "integration-secret";

pub fn test_config(policy: OverridePolicy) -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        public_url: "http://example.test".to_string(),
        api_root: "/wp-json".to_string(),
        rest_namespace: "wp".to_string(),
        header_prefix: "WP".to_string(),
        default_per_page: 10,
        override_policy: policy,
    }
}

pub struct TestApp {
    pub pool: SqlitePool,
    router: Router,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn links(&self) -> Vec<String> {
        self.headers
            .get_all("link")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    pub fn ids(&self) -> Vec<i64> {
        self.body
            .as_array()
            .map(|items| items.iter().filter_map(|item| item["id"].as_i64()).collect())
            .unwrap_or_default()
    }
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_policy(OverridePolicy::Enforce).await
    }

    /// 레지스트리는 마이그레이션에 포함된 기본 타입(post, page, attachment)만 씁니다.
    pub async fn with_policy(policy: OverridePolicy) -> Self {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("connect to in-memory sqlite");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("run migrations");

        let registry = db::load_registry(&pool).await.expect("load registry");
        let state = AppState::new(pool.clone(), test_config(policy), registry, QueryHooks::default());
        Self {
            pool,
            router: build_router(state),
        }
    }

    pub async fn insert_post(&self, id: i64, post_type: &str, status: &str, published_at: &str) {
        sqlx::query(
            "INSERT INTO posts (id, post_type, status, author_id, slug, title, content, excerpt, published_at, modified_at)
             VALUES (?, ?, ?, 1, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(post_type)
        .bind(status)
        .bind(format!("item-{id}"))
        .bind(format!("Item {id}"))
        .bind(format!("<p>Body {id}</p>"))
        .bind(format!("Excerpt {id}"))
        .bind(published_at)
        .bind(published_at)
        .execute(&self.pool)
        .await
        .expect("insert post");
    }

    pub async fn insert_meta(&self, post_id: i64, key: &str, value: &str) {
        sqlx::query("INSERT INTO post_meta (post_id, meta_key, meta_value) VALUES (?, ?, ?)")
            .bind(post_id)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await
            .expect("insert meta");
    }

    pub async fn insert_term(&self, id: i64, taxonomy: &str, slug: &str) {
        sqlx::query("INSERT INTO terms (id, taxonomy, name, slug) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(taxonomy)
            .bind(slug)
            .bind(slug)
            .execute(&self.pool)
            .await
            .expect("insert term");
    }

    pub async fn assign_term(&self, post_id: i64, term_id: i64) {
        sqlx::query("INSERT INTO term_relationships (post_id, term_id) VALUES (?, ?)")
            .bind(post_id)
            .bind(term_id)
            .execute(&self.pool)
            .await
            .expect("assign term");
    }

    /// 사용자를 만들고 capability를 부여한 뒤 Bearer 토큰을 돌려줍니다.
    pub async fn user_token(&self, id: &str, capabilities: &[&str]) -> String {
        sqlx::query("INSERT INTO users (id, username) VALUES (?, ?)")
            .bind(id)
            .bind(id)
            .execute(&self.pool)
            .await
            .expect("insert user");
        for cap in capabilities {
            sqlx::query("INSERT INTO user_capabilities (user_id, capability) VALUES (?, ?)")
                .bind(id)
                .bind(*cap)
                .execute(&self.pool)
                .await
                .expect("grant capability");
        }
        create_access_token(id, JWT_SECRET).expect("create token")
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(uri, None).await
    }

    pub async fn get_as(&self, uri: &str, token: &str) -> TestResponse {
        self.request(uri, Some(token)).await
    }

    async fn request(&self, uri: &str, token: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = self
            .router
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }
}
