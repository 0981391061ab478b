//! # 응답 조립
//!
//! 실행 결과를 HTTP 응답으로 만듭니다.
//! - 본문: 읽기 권한이 있는 항목만 직렬화한 JSON 배열
//! - 헤더: `X-<Prefix>-Total`, `X-<Prefix>-TotalPages`, `Link` (prev / next)

use axum::{
    http::{header::LINK, HeaderMap, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use url::form_urlencoded;

use crate::{
    config::Config,
    error::AppError,
    middleware::auth::Caller,
    services::{
        executor::QueryResult,
        params::RequestParams,
        registry::Registry,
        serializer::{PostController, SerializeOptions},
        store::ContentStore,
    },
};

/// 직렬화 전 응답 내용
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionResponse {
    pub items: Vec<Value>,
    pub total: u64,
    pub total_pages: u64,
    pub prev: Option<String>,
    pub next: Option<String>,
}

/// 응답 조립에 필요한 협력자 묶음
#[derive(Clone, Copy)]
pub struct AssembleContext<'a> {
    pub registry: &'a Registry,
    pub config: &'a Config,
    pub caller: &'a Caller,
    pub store: &'a dyn ContentStore,
}

pub async fn assemble(
    result: QueryResult,
    params: &RequestParams,
    ctx: AssembleContext<'_>,
) -> Result<CollectionResponse, AppError> {
    let options = SerializeOptions::new(
        params.get("context").and_then(Value::as_str),
        params.get("_fields"),
    );

    let mut items = Vec::with_capacity(result.posts.len());
    for post in &result.posts {
        let Some(controller) = PostController::for_post(ctx.registry, ctx.config, post) else {
            tracing::debug!(id = post.id, post_type = %post.post_type, "skipping item of unregistered type");
            continue;
        };
        if !controller.check_read_permission(post, ctx.caller) {
            continue;
        }
        items.push(
            controller
                .prepare_collection_item(post, ctx.caller, &options, ctx.store)
                .await?,
        );
    }

    let total_pages = result.total_pages();
    let (prev, next) = page_links(ctx.config, params, result.page, total_pages);

    Ok(CollectionResponse {
        items,
        total: result.total,
        total_pages,
        prev,
        next,
    })
}

/// 원본 쿼리 파라미터를 유지한 채 `page`만 바꾼 이전/다음 페이지 URL
///
/// 이전 페이지 번호는 전체 페이지 수를 넘지 않도록 맞춥니다 (최소 1).
pub fn page_links(
    config: &Config,
    params: &RequestParams,
    page: u64,
    total_pages: u64,
) -> (Option<String>, Option<String>) {
    let has_filter = params.get("filter").is_some();
    let preserved: Vec<&(String, String)> = params
        .query()
        .pairs
        .iter()
        .filter(|(key, _)| key.as_str() != "page")
        .filter(|(key, _)| !(has_filter && is_filter_paging_key(key)))
        .collect();

    let link = |target: u64| {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &preserved {
            serializer.append_pair(key, value);
        }
        serializer.append_pair("page", &target.to_string());
        format!("{}?{}", config.collection_url(), serializer.finish())
    };

    let prev = (page > 1).then(|| link((page - 1).min(total_pages.max(1))));
    let next = (total_pages > page).then(|| link(page + 1));
    (prev, next)
}

fn is_filter_paging_key(key: &str) -> bool {
    ["filter[posts_per_page]", "filter[paged]"]
        .iter()
        .any(|prefix| key == *prefix || key.starts_with(&format!("{prefix}[")))
}

impl CollectionResponse {
    pub fn into_http(self, header_prefix: &str) -> Response {
        let mut headers = HeaderMap::new();
        insert_header(&mut headers, &format!("x-{header_prefix}-total"), &self.total.to_string());
        insert_header(
            &mut headers,
            &format!("x-{header_prefix}-totalpages"),
            &self.total_pages.to_string(),
        );
        for (rel, url) in [("prev", self.prev), ("next", self.next)] {
            if let Some(url) = url {
                if let Ok(value) = HeaderValue::from_str(&format!("<{url}>; rel=\"{rel}\"")) {
                    headers.append(LINK, value);
                }
            }
        }
        (headers, Json(Value::Array(self.items))).into_response()
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) {
    match (
        HeaderName::from_bytes(name.to_ascii_lowercase().as_bytes()),
        HeaderValue::from_str(value),
    ) {
        (Ok(name), Ok(value)) => {
            headers.insert(name, value);
        }
        _ => tracing::warn!(header = name, "skipping invalid response header"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        executor::fakes::{post, MemoryStore},
        query_args::PageSize,
        query_string::QueryString,
        registry::fixtures::registry,
    };
    use crate::services::params::ParamSchema;

    fn prepared(raw: &str) -> RequestParams {
        let registry = registry();
        ParamSchema::collection_params(&registry)
            .prepare(QueryString::parse(raw), &Caller::anonymous(), &registry)
            .unwrap()
    }

    #[test]
    fn first_page_has_only_next() {
        let config = Config::for_tests();
        let params = prepared("type[]=post&per_page=2&page=1");
        let (prev, next) = page_links(&config, &params, 1, 2);
        assert_eq!(prev, None);
        assert_eq!(
            next.as_deref(),
            Some("http://example.test/wp-json/wp/v2/multiple-post-type?type%5B%5D=post&per_page=2&page=2")
        );
    }

    #[test]
    fn prev_is_clamped_to_the_last_page() {
        let config = Config::for_tests();
        let params = prepared("type[]=post&page=7");
        let (prev, next) = page_links(&config, &params, 7, 3);
        assert!(prev.as_deref().is_some_and(|url| url.ends_with("&page=3")));
        assert_eq!(next, None);

        let (prev, _) = page_links(&config, &params, 7, 0);
        assert!(prev.as_deref().is_some_and(|url| url.ends_with("&page=1")));
    }

    #[test]
    fn filter_paging_keys_are_stripped() {
        let config = Config::for_tests();
        let params = prepared("type[]=post&filter[posts_per_page]=5&filter[paged]=2&filter[s]=x");
        let (_, next) = page_links(&config, &params, 1, 2);
        let next = next.unwrap();
        assert!(!next.contains("posts_per_page"));
        assert!(!next.contains("paged"));
        assert!(next.contains("filter%5Bs%5D=x"));
    }

    #[tokio::test]
    async fn unreadable_items_are_omitted() {
        let registry = registry();
        let config = Config::for_tests();
        let store = MemoryStore::default();
        let caller = Caller::anonymous();
        let mut draft = post(2, "post");
        draft.status = "draft".to_string();

        let result = QueryResult {
            posts: vec![post(1, "post"), draft, post(3, "unknown")],
            total: 3,
            page_size: PageSize::Limited(10),
            page: 1,
        };
        let response = assemble(
            result,
            &prepared("type[]=post"),
            AssembleContext {
                registry: &registry,
                config: &config,
                caller: &caller,
                store: &store,
            },
        )
        .await
        .unwrap();

        assert_eq!(response.items.len(), 1);
        assert_eq!(response.items[0]["id"], serde_json::json!(1));
        assert_eq!(response.total, 3);
        assert_eq!(response.total_pages, 1);
    }

    #[test]
    fn headers_use_the_configured_prefix() {
        let response = CollectionResponse {
            items: vec![],
            total: 3,
            total_pages: 2,
            prev: None,
            next: Some("http://example.test/x?page=2".to_string()),
        }
        .into_http("WP");
        let headers = response.headers();
        assert_eq!(headers["x-wp-total"], "3");
        assert_eq!(headers["x-wp-totalpages"], "2");
        assert_eq!(headers[LINK], "<http://example.test/x?page=2>; rel=\"next\"");
    }
}
