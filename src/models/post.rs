use serde::{Deserialize, Serialize};

/// 콘텐츠 항목 — `posts` 테이블 한 행
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub post_type: String,
    pub status: String,
    pub author_id: i64,
    pub parent_id: i64,
    pub menu_order: i64,
    pub slug: String,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub mime_type: Option<String>,
    pub is_sticky: i64,
    /// `YYYY-MM-DDTHH:MM:SS` (UTC)
    pub published_at: String,
    pub modified_at: String,
}

/// 기본 공개 상태. 권한 없이 조회할 수 있는 유일한 상태입니다.
pub const STATUS_PUBLISHED: &str = "published";
