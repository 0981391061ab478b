//! # 레지스트리 로딩
//!
//! 서버 시작 시 한 번 호출되어 콘텐츠 타입과 택소노미 등록 정보를 읽습니다.

use std::collections::BTreeMap;

use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{PostTypeObject, PostTypeRow, TaxonomyObject, TaxonomyRow},
    services::registry::Registry,
};

pub async fn load_registry(pool: &SqlitePool) -> Result<Registry, AppError> {
    let post_types = sqlx::query_as::<_, PostTypeRow>(
        r#"
        SELECT name, rest_base, kind, show_in_rest, edit_cap, read_private_cap
        FROM post_types
        ORDER BY name
        "#,
    )
    .fetch_all(pool)
    .await?;

    let taxonomies = sqlx::query_as::<_, TaxonomyRow>(
        "SELECT name, rest_base, show_in_rest FROM taxonomies ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    let links = sqlx::query_as::<_, (String, String)>(
        "SELECT taxonomy, post_type FROM taxonomy_post_types ORDER BY taxonomy, post_type",
    )
    .fetch_all(pool)
    .await?;

    // SQLite는 기본적으로 외래 키를 강제하지 않으므로 연결 테이블을 직접 확인합니다.
    // 등록되지 않은 타입에 붙은 택소노미는 파라미터 스키마를 잘못 만들게 되므로 시작을 중단합니다.
    let mut object_types: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (taxonomy, post_type) in links {
        if !post_types.iter().any(|pt| pt.name == post_type) {
            return Err(AppError::Internal(format!(
                "taxonomy {taxonomy} is attached to unregistered post type {post_type}"
            )));
        }
        object_types.entry(taxonomy).or_default().push(post_type);
    }

    let taxonomies: Vec<TaxonomyObject> = taxonomies
        .into_iter()
        .map(|row| TaxonomyObject {
            object_types: object_types.remove(&row.name).unwrap_or_default(),
            show_in_rest: row.show_in_rest != 0,
            rest_base: row.rest_base,
            name: row.name,
        })
        .collect();

    tracing::info!(
        post_types = post_types.len(),
        taxonomies = taxonomies.len(),
        "loaded content registry"
    );

    Ok(Registry::new(
        post_types.into_iter().map(PostTypeObject::from).collect(),
        taxonomies,
    ))
}
