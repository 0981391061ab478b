//! # 콘텐츠 저장소 경계 (ContentStore)
//!
//! 구조화 필터를 실행하는 쪽의 인터페이스입니다. 운영 환경에서는
//! `db::posts::SqliteContentStore`가, 단위 테스트에서는 가짜 구현이 쓰입니다.

use async_trait::async_trait;
use serde_json::Value;

use crate::{error::AppError, models::Post, services::query_args::QueryArgs};

/// 저장소 쿼리 한 번의 결과
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreResult {
    /// 현재 페이지의 항목
    pub posts: Vec<Post>,
    /// 전체 일치 건수. 요청한 페이지 범위에 항목이 하나도 없으면 0으로 보고될 수 있습니다.
    pub found: u64,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn query(&self, args: &QueryArgs) -> Result<StoreResult, AppError>;

    /// 항목에 붙은 사용자 정의 필드 값
    async fn get_field(&self, post_id: i64, key: &str) -> Result<Option<Value>, AppError>;

    /// 항목에 연결된 term ID 목록
    async fn post_terms(&self, post_id: i64, taxonomy: &str) -> Result<Vec<i64>, AppError>;
}
