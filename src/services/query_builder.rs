//! # 쿼리 빌더 (BuildFilter)
//!
//! 검증이 끝난 요청 파라미터(`RequestParams`)를 콘텐츠 저장소에 넘길 구조화 필터
//! (`QueryArgs`)로 바꿉니다. 저장소를 전혀 건드리지 않는 순수 함수이므로
//! 같은 입력은 항상 같은 필터를 만듭니다.
//!
//! 호출자가 채울 수 있는 필터 키는 허용 목록(Allowed Keys Set)으로 제한됩니다:
//! - 공개 쿼리 변수: 누구나
//! - 권한자 전용 변수: 요청된 **모든** 타입의 편집 권한이 있을 때만
//! - 확장 변수: 누구나 (페이지/정렬/ID 목록 등 컬렉션 파라미터가 쓰는 키)

use std::collections::BTreeSet;

use serde_json::{json, Map, Value};

use crate::{
    config::OverridePolicy,
    error::AppError,
    middleware::auth::Caller,
    services::{hooks::QueryHooks, params::RequestParams, query_args::QueryArgs, registry::Registry},
};

/// 누구나 쓸 수 있는 공개 쿼리 변수
pub const PUBLIC_QUERY_VARS: &[&str] = &[
    "m", "p", "posts", "w", "cat", "withcomments", "withoutcomments", "s", "search", "exact",
    "sentence", "calendar", "page", "paged", "more", "tb", "pb", "author", "order", "orderby",
    "year", "monthnum", "day", "hour", "minute", "second", "name", "category_name", "tag", "feed",
    "author_name", "pagename", "page_id", "error", "attachment", "attachment_id", "subpost",
    "subpost_id", "preview", "robots", "favicon", "taxonomy", "term", "cpage", "post_type",
    "embed",
];

/// 요청된 모든 타입을 편집할 수 있는 호출자만 쓸 수 있는 변수
pub const PRIVATE_QUERY_VARS: &[&str] = &[
    "offset", "posts_per_page", "posts_per_archive_page", "showposts", "nopaging", "post_type",
    "post_status", "category__in", "category__not_in", "category__and", "tag__in", "tag__not_in",
    "tag__and", "tag_slug__in", "tag_slug__and", "tag_id", "post_mime_type", "perm",
    "comments_per_page", "post__in", "post__not_in", "post_parent", "post_parent__in",
    "post_parent__not_in", "title", "fields",
];

/// 컬렉션 파라미터가 사용하므로 항상 허용되는 확장 변수
pub const REST_QUERY_VARS: &[&str] = &[
    "author__in", "author__not_in", "ignore_sticky_posts", "menu_order", "offset", "post__in",
    "post__not_in", "post_parent", "post_parent__in", "post_parent__not_in", "posts_per_page",
    "date_query", "meta_query", "meta_key", "meta_value", "meta_compare", "_fields",
    "acf_format",
];

/// 요청 파라미터 → 필터 키
const PARAM_VARS: &[(&str, &str)] = &[
    ("author", "author__in"),
    ("author_exclude", "author__not_in"),
    ("menu_order", "menu_order"),
    ("offset", "offset"),
    ("order", "order"),
    ("orderby", "orderby"),
    ("page", "paged"),
    ("include", "post__in"),
    ("exclude", "post__not_in"),
    ("per_page", "posts_per_page"),
    ("slug", "name"),
    ("type", "post_type"),
    ("parent", "post_parent__in"),
    ("parent_exclude", "post_parent__not_in"),
    ("status", "post_status"),
    ("search", "s"),
    ("_fields", "_fields"),
    ("acf_format", "acf_format"),
];

/// 필터 생성에 필요한 읽기 전용 협력자 묶음
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub registry: &'a Registry,
    pub caller: &'a Caller,
    pub hooks: &'a QueryHooks,
    pub policy: OverridePolicy,
}

/// 요청된 타입 기준 허용 목록
///
/// 권한자 전용 변수는 호출자가 `post_types`의 모든 타입을 편집할 수 있을 때만 포함됩니다.
pub fn allowed_query_vars(post_types: &[String], ctx: &BuildContext<'_>) -> BTreeSet<String> {
    let mut public: BTreeSet<String> = PUBLIC_QUERY_VARS.iter().map(|v| v.to_string()).collect();
    ctx.hooks.apply_public_vars(&mut public);

    let mut allowed = public;
    if ctx.caller.can_edit_all(ctx.registry, post_types) {
        let mut private: BTreeSet<String> =
            PRIVATE_QUERY_VARS.iter().map(|v| v.to_string()).collect();
        ctx.hooks.apply_private_vars(&mut private);
        allowed.extend(private);
    }

    allowed.extend(REST_QUERY_VARS.iter().map(|v| v.to_string()));
    ctx.hooks.apply_allowed_vars(&mut allowed);
    allowed
}

/// 요청 파라미터로 구조화 필터를 만듭니다.
///
/// `type`이 없거나 목록이 아니면 `TypeNeedToBeArray`를 반환하며, 이 경우 저장소 쿼리는
/// 실행되지 않습니다.
pub fn build_query_args(
    params: &RequestParams,
    ctx: &BuildContext<'_>,
) -> Result<QueryArgs, AppError> {
    // ── 1단계: 요청 파라미터 → 쿼리 변수 (단순 이름 변경) ──
    // 빈 배열(`author=[]` 같은 기본값)은 "조건 없음"이므로 옮기지 않습니다.
    let mut args = QueryArgs::new();
    for (param, var) in PARAM_VARS {
        if let Some(value) = params.get(param) {
            if value.as_array().is_some_and(Vec::is_empty) {
                continue;
            }
            args.insert(*var, value.clone());
        }
    }

    // ── 2단계: type은 반드시 비어 있지 않은 배열 ──
    // 여기서 실패하면 저장소 쿼리는 한 번도 실행되지 않습니다.
    let requested_types = match args.get("post_type") {
        Some(Value::Array(items)) if !items.is_empty() => params.requested_types().unwrap_or_default(),
        _ => return Err(AppError::TypeNeedToBeArray),
    };

    let date_query = date_range_clause(params);
    if let Some(clause) = &date_query {
        args.insert("date_query", clause.clone());
    }

    // ── 4단계: filter[...] 덮어쓰기 ──
    // 같은 키는 filter 쪽 값이 이깁니다. Bypass 정책에서 다시 적용하려고 사본을 남겨 둡니다.
    let overrides: Map<String, Value> = match params.get("filter") {
        Some(Value::Object(filter)) => filter.clone(),
        _ => Map::new(),
    };
    for (key, value) in &overrides {
        args.insert(key.clone(), value.clone());
    }
    args.remove("filter");

    if let Some(single) = args.get("post_type").filter(|v| !v.is_array()).cloned() {
        args.insert("post_type", json!([single]));
    }

    let args = ctx.hooks.apply_query(args, params);

    // ── 7단계: 허용 목록 ──
    // 공개 변수 + (모든 요청 타입을 편집할 수 있을 때만) 권한자 변수 + 확장 변수.
    // 목록에 없는 키는 조용히 버리고 debug 로그만 남깁니다.
    let allowed = allowed_query_vars(&requested_types, ctx);
    let mut filtered = QueryArgs::new();
    let mut dropped = Vec::new();
    for (key, value) in args.into_map() {
        if allowed.contains(&key) {
            let value = ctx.hooks.apply_var(&key, value);
            filtered.insert(key, value);
        } else {
            dropped.push(key);
        }
    }
    if !dropped.is_empty() {
        tracing::debug!(?dropped, "dropped query vars outside the allowed set");
    }

    if ctx.policy == OverridePolicy::Bypass {
        if let Some(clause) = date_query {
            filtered.insert("date_query", clause);
        }
        for (key, value) in overrides {
            filtered.insert(key, value);
        }
    }

    // ── 8단계: 택소노미 절 ──
    // 허용 목록 이후에 붙이므로 권한과 무관하게 항상 적용됩니다.
    let mut args = filtered;
    append_tax_clauses(&mut args, params, ctx.registry);

    // 일반 글 타입이 포함되거나 명시되지 않았으면 고정 글 정렬을 끕니다.
    if args.post_types().iter().any(|t| t == "post") || !args.contains("ignore_sticky_posts") {
        args.insert("ignore_sticky_posts", json!(true));
    }

    if args.str("orderby").as_deref() == Some("include") {
        args.insert("orderby", json!("post__in"));
    }

    Ok(args)
}

fn date_range_clause(params: &RequestParams) -> Option<Value> {
    let mut clause = Map::new();
    if let Some(before) = params.get("before") {
        clause.insert("before".to_string(), before.clone());
    }
    if let Some(after) = params.get("after") {
        clause.insert("after".to_string(), after.clone());
    }
    (!clause.is_empty()).then(|| json!([clause]))
}

/// 최종 타입 목록에 연결된 택소노미마다, 요청에 해당 별칭 파라미터가 있으면 절을 추가합니다.
fn append_tax_clauses(args: &mut QueryArgs, params: &RequestParams, registry: &Registry) {
    let post_types = args.post_types();
    let mut clauses: Vec<Value> = match args.get("tax_query") {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Object(map)) => {
            let mut keyed: Vec<(i64, Value)> = map
                .iter()
                .filter_map(|(k, v)| Some((k.parse::<i64>().ok()?, v.clone())))
                .collect();
            keyed.sort_by_key(|(i, _)| *i);
            keyed.into_iter().map(|(_, v)| v).collect()
        }
        _ => Vec::new(),
    };
    let relation = args
        .get("tax_query")
        .and_then(|v| v.get("relation"))
        .cloned();

    let before = clauses.len();
    for taxonomy in registry.rest_taxonomies_for(&post_types) {
        let Some(Value::Array(terms)) = params.get(taxonomy.base()) else {
            continue;
        };
        if terms.is_empty() {
            continue;
        }
        clauses.push(json!({
            "taxonomy": taxonomy.name,
            "field": "term_id",
            "terms": terms,
            "include_children": false,
        }));
    }

    if clauses.len() == before {
        return;
    }
    match relation {
        Some(relation) => {
            let mut map: Map<String, Value> = clauses
                .into_iter()
                .enumerate()
                .map(|(i, clause)| (i.to_string(), clause))
                .collect();
            map.insert("relation".to_string(), relation);
            args.insert("tax_query", Value::Object(map));
        }
        None => args.insert("tax_query", Value::Array(clauses)),
    }
}
