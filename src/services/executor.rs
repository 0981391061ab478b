//! # 쿼리 실행 / 페이지네이션 보정
//!
//! 구조화 필터를 저장소에 실행하고 전체 건수와 페이지 정보를 계산합니다.
//!
//! 저장소는 요청한 페이지 범위에 항목이 없으면 전체 건수를 0으로 보고합니다
//! (마지막 페이지를 넘어선 요청). 이때 `paged`를 뺀 같은 필터로 한 번 더 실행해
//! 정확한 전체 건수만 가져옵니다. 두 번째 쿼리의 항목 목록은 버립니다.

use crate::{
    error::AppError,
    models::Post,
    services::{
        query_args::{PageSize, QueryArgs},
        store::ContentStore,
    },
};

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub posts: Vec<Post>,
    pub total: u64,
    pub page_size: PageSize,
    /// 요청된 페이지 번호 (1부터)
    pub page: u64,
}

impl QueryResult {
    pub fn total_pages(&self) -> u64 {
        self.page_size.total_pages(self.total)
    }
}

pub async fn execute(
    store: &dyn ContentStore,
    args: &QueryArgs,
    default_per_page: u32,
) -> Result<QueryResult, AppError> {
    let result = store.query(args).await?;
    let mut total = result.found;

    if total < 1 && args.contains("paged") {
        let mut unpaged = args.clone();
        unpaged.remove("paged");
        tracing::debug!("empty page window, re-counting without paged");
        total = store.query(&unpaged).await?.found;
    }

    Ok(QueryResult {
        posts: result.posts,
        total,
        page_size: PageSize::from_args(args, default_per_page),
        page: args
            .int("paged")
            .and_then(|p| u64::try_from(p).ok())
            .filter(|p| *p > 0)
            .unwrap_or(1),
    })
}

#[cfg(test)]
pub(crate) mod fakes {
    //! 테스트용 메모리 저장소

    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    use async_trait::async_trait;
    use serde_json::Value;

    use crate::{
        error::AppError,
        models::Post,
        services::{
            query_args::{PageSize, QueryArgs},
            store::{ContentStore, StoreResult},
        },
    };

    pub fn post(id: i64, post_type: &str) -> Post {
        Post {
            id,
            post_type: post_type.to_string(),
            status: "published".to_string(),
            author_id: 1,
            parent_id: 0,
            menu_order: 0,
            slug: format!("item-{id}"),
            title: format!("Item {id}"),
            content: format!("<p>Body {id}</p>"),
            excerpt: format!("Excerpt {id}"),
            mime_type: None,
            is_sticky: 0,
            published_at: format!("2024-01-{:02}T00:00:00", id.clamp(1, 28)),
            modified_at: format!("2024-02-{:02}T00:00:00", id.clamp(1, 28)),
        }
    }

    /// 타입만 보고 항목을 고르며, 빈 페이지는 전체 건수 0으로 보고합니다.
    #[derive(Default)]
    pub struct MemoryStore {
        pub posts: Vec<Post>,
        pub fields: Vec<(i64, String, Value)>,
        pub terms: Vec<(i64, String, i64)>,
        pub queries: AtomicUsize,
        pub seen: Mutex<Vec<QueryArgs>>,
    }

    impl MemoryStore {
        pub fn with_posts(posts: Vec<Post>) -> Self {
            Self {
                posts,
                ..Self::default()
            }
        }

        pub fn query_count(&self) -> usize {
            self.queries.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ContentStore for MemoryStore {
        async fn query(&self, args: &QueryArgs) -> Result<StoreResult, AppError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(args.clone());
            }

            let types = args.post_types();
            let matched: Vec<Post> = self
                .posts
                .iter()
                .filter(|p| types.is_empty() || types.contains(&p.post_type))
                .cloned()
                .collect();

            let (posts, found) = match PageSize::from_args(args, 10) {
                PageSize::Unlimited => {
                    let found = matched.len() as u64;
                    (matched, found)
                }
                PageSize::Limited(n) => {
                    let page = usize::try_from(args.int("paged").unwrap_or(1).max(1))
                        .unwrap_or(usize::MAX);
                    let window: Vec<Post> = matched
                        .iter()
                        .skip((page - 1).saturating_mul(n as usize))
                        .take(n as usize)
                        .cloned()
                        .collect();
                    let found = if window.is_empty() { 0 } else { matched.len() as u64 };
                    (window, found)
                }
            };
            Ok(StoreResult { posts, found })
        }

        async fn get_field(&self, post_id: i64, key: &str) -> Result<Option<Value>, AppError> {
            Ok(self
                .fields
                .iter()
                .find(|(id, k, _)| *id == post_id && k == key)
                .map(|(_, _, v)| v.clone()))
        }

        async fn post_terms(&self, post_id: i64, taxonomy: &str) -> Result<Vec<i64>, AppError> {
            Ok(self
                .terms
                .iter()
                .filter(|(id, tax, _)| *id == post_id && tax == taxonomy)
                .map(|(_, _, term)| *term)
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::{post, MemoryStore};
    use super::*;
    use serde_json::{json, Value};

    fn args(value: Value) -> QueryArgs {
        match value {
            Value::Object(map) => QueryArgs::from(map),
            _ => QueryArgs::new(),
        }
    }

    fn five_posts() -> MemoryStore {
        MemoryStore::with_posts((1..=5).map(|id| post(id, "post")).collect())
    }

    #[tokio::test]
    async fn in_range_page_runs_a_single_query() {
        let store = five_posts();
        let result = execute(
            &store,
            &args(json!({ "post_type": ["post"], "posts_per_page": 2, "paged": 1 })),
            10,
        )
        .await
        .unwrap();
        assert_eq!(result.posts.len(), 2);
        assert_eq!(result.total, 5);
        assert_eq!(result.total_pages(), 3);
        assert_eq!(store.query_count(), 1);
    }

    #[tokio::test]
    async fn out_of_range_page_is_recounted_without_paged() {
        let store = five_posts();
        let result = execute(
            &store,
            &args(json!({ "post_type": ["post"], "posts_per_page": 10, "paged": 3 })),
            10,
        )
        .await
        .unwrap();
        assert!(result.posts.is_empty());
        assert_eq!(result.total, 5);
        assert_eq!(result.page, 3);
        assert_eq!(store.query_count(), 2);

        let seen = store.seen.lock().unwrap();
        assert!(!seen[1].contains("paged"));
        assert_eq!(seen[1].get("posts_per_page"), Some(&json!(10)));
    }

    #[tokio::test]
    async fn empty_store_reports_zero_pages() {
        let store = MemoryStore::default();
        let result = execute(&store, &args(json!({ "post_type": ["post"], "paged": 1 })), 10)
            .await
            .unwrap();
        assert_eq!(result.total, 0);
        assert_eq!(result.total_pages(), 0);
        assert_eq!(store.query_count(), 2);
    }

    #[tokio::test]
    async fn largest_page_number_is_recounted() {
        let store = five_posts();
        let result = execute(
            &store,
            &args(json!({ "post_type": ["post"], "posts_per_page": 10, "paged": i64::MAX })),
            10,
        )
        .await
        .unwrap();
        assert!(result.posts.is_empty());
        assert_eq!(result.total, 5);
        assert_eq!(result.page, i64::MAX as u64);
        assert_eq!(store.query_count(), 2);
    }

    #[tokio::test]
    async fn unlimited_page_size_is_a_single_page() {
        let store = five_posts();
        let result = execute(
            &store,
            &args(json!({ "post_type": ["post"], "posts_per_page": -1, "paged": 1 })),
            10,
        )
        .await
        .unwrap();
        assert_eq!(result.posts.len(), 5);
        assert_eq!(result.page_size, PageSize::Unlimited);
        assert_eq!(result.total_pages(), 1);
    }
}
