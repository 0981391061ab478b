//! # 사용자 / capability 조회
//!
//! 토큰의 `sub`로 사용자를 찾고, 그 사용자가 가진 capability 문자열을 모읍니다.

use std::collections::BTreeSet;

use crate::error::AppError;
use crate::models::user::User;
use sqlx::SqlitePool;

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, created_at
        FROM users
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn capabilities(pool: &SqlitePool, user_id: &str) -> Result<BTreeSet<String>, AppError> {
    let caps = sqlx::query_scalar::<_, String>(
        "SELECT capability FROM user_capabilities WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(caps.into_iter().collect())
}
