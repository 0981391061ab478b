//! # 애플리케이션 설정(Configuration) 모듈
//!
//! 환경변수에서 서버 설정값을 읽어오는 모듈입니다.
//! `.env` 파일이나 시스템 환경변수에서 값을 가져옵니다.
//!
//! 설정 항목:
//! - `DATABASE_URL`: 콘텐츠 저장소(SQLite) 경로
//! - `JWT_SECRET`: 호출자 토큰 검증에 사용할 비밀키
//! - `HOST` / `PORT`: 서버 바인딩 주소
//! - `PUBLIC_URL`: 페이지네이션 링크와 항목 링크에 쓰이는 외부 주소
//! - `API_ROOT`: REST 트리가 마운트되는 경로 (기본값 `/wp-json`)
//! - `REST_NAMESPACE`: `/<namespace>/v2/multiple-post-type`의 네임스페이스
//! - `HEADER_PREFIX`: `X-<Prefix>-Total` 헤더의 접두사
//! - `DEFAULT_PER_PAGE`: 필터에 페이지 크기가 없을 때 저장소가 쓰는 기본값
//! - `FILTER_OVERRIDE_POLICY`: `filter` 덮어쓰기 키의 허용 목록 적용 방식

use std::env;

/// `filter` 파라미터와 날짜 범위 절이 허용 목록(Allowed Keys Set)을
/// 통과해야 하는지 결정하는 정책입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverridePolicy {
    /// 덮어쓰기 키도 허용 목록 필터링을 거칩니다.
    #[default]
    Enforce,
    /// 덮어쓰기 키와 날짜 범위 절을 허용 목록 필터링 이후에 다시 적용합니다.
    Bypass,
}

impl OverridePolicy {
    /// 환경변수 값을 정책으로 변환합니다. 알 수 없는 값은 `None`입니다.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "enforce" => Some(Self::Enforce),
            "bypass" => Some(Self::Bypass),
            _ => None,
        }
    }
}

/// 애플리케이션 전체 설정을 담는 구조체
///
/// 서버 시작 시 환경변수에서 한 번 읽어온 후,
/// 애플리케이션 전체에서 공유됩니다.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite 데이터베이스 URL (예: "sqlite:data/content.db")
    pub database_url: String,
    /// Bearer 토큰 서명/검증에 사용하는 비밀키
    pub jwt_secret: String,
    /// 서버가 바인딩할 호스트 주소 (기본값: "0.0.0.0")
    pub host: String,
    /// 서버 포트 번호 (기본값: 3000)
    pub port: u16,
    /// 외부에서 보이는 서버 주소 (끝의 `/` 없음)
    pub public_url: String,
    /// REST 트리 루트 (예: "/wp-json")
    pub api_root: String,
    /// REST 네임스페이스 (예: "wp")
    pub rest_namespace: String,
    /// 페이지네이션 헤더 접두사 (예: "WP" → `X-WP-Total`)
    pub header_prefix: String,
    /// 필터에 `posts_per_page`가 없을 때의 페이지 크기
    pub default_per_page: u32,
    /// `filter` 덮어쓰기 키에 대한 허용 목록 정책
    pub override_policy: OverridePolicy,
}

impl Config {
    /// 환경변수에서 설정값을 읽어 Config 인스턴스를 생성합니다.
    ///
    /// # 에러
    /// `DATABASE_URL`과 `JWT_SECRET`은 필수이며, 없으면 에러가 발생합니다.
    /// 나머지 설정은 기본값이 있어 환경변수가 없어도 동작합니다.
    pub fn from_env() -> Result<Self, env::VarError> {
        let override_policy = match env::var("FILTER_OVERRIDE_POLICY") {
            Ok(value) => OverridePolicy::parse(&value).unwrap_or_else(|| {
                tracing::warn!(
                    "Unknown FILTER_OVERRIDE_POLICY {:?}, falling back to enforce",
                    value
                );
                OverridePolicy::Enforce
            }),
            Err(_) => OverridePolicy::default(),
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL")?, // 필수
            jwt_secret: env::var("JWT_SECRET")?,     // 필수
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
            public_url: env::var("PUBLIC_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            api_root: normalize_root(
                &env::var("API_ROOT").unwrap_or_else(|_| "/wp-json".to_string()),
            ),
            rest_namespace: env::var("REST_NAMESPACE").unwrap_or_else(|_| "wp".to_string()),
            header_prefix: env::var("HEADER_PREFIX").unwrap_or_else(|_| "WP".to_string()),
            default_per_page: env::var("DEFAULT_PER_PAGE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &u32| *n > 0)
                .unwrap_or(10),
            override_policy,
        })
    }

    /// 네임스페이스 경로: `/<namespace>/v2`
    pub fn namespace_path(&self) -> String {
        format!("/{}/v2", self.rest_namespace)
    }

    /// 컬렉션 라우트 경로 (API_ROOT 기준 상대 경로)
    pub fn collection_path(&self) -> String {
        format!("{}/multiple-post-type", self.namespace_path())
    }

    /// 페이지네이션 링크의 기준이 되는 절대 URL
    pub fn collection_url(&self) -> String {
        format!("{}{}{}", self.public_url, self.api_root, self.collection_path())
    }
}

/// `API_ROOT`를 `/로 시작하고 /로 끝나지 않는` 형태로 맞춥니다.
fn normalize_root(root: &str) -> String {
    let trimmed = root.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
impl Config {
    /// 테스트용 기본 설정
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "test-secret".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            public_url: "http://example.test".to_string(),
            api_root: "/wp-json".to_string(),
            rest_namespace: "wp".to_string(),
            header_prefix: "WP".to_string(),
            default_per_page: 10,
            override_policy: OverridePolicy::Enforce,
        }
    }
}
