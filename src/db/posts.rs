//! # 콘텐츠 저장소 (SQLite)
//!
//! 구조화 필터(`QueryArgs`)를 SQL로 옮겨 실행하는 `ContentStore` 구현입니다.
//! 모든 값은 `QueryBuilder::push_bind`로 바인딩하고, SQL 문자열에는
//! 미리 정해진 컬럼 이름과 연산자만 들어갑니다.
//!
//! ## 전체 건수
//! 한 페이지 범위에 항목이 없으면 전체 건수를 0으로 보고합니다.
//! 범위를 벗어난 페이지의 정확한 건수는 `services::executor`가 다시 계산합니다.
//!
//! ## 지원하는 쿼리 변수
//! - 식별: `p`, `name`, `title`, `post__in`, `post__not_in`
//! - 타입/상태: `post_type`(기본 `post`, `any`), `post_status`(기본 `published`, `any`)
//! - 작성자: `author`(음수는 제외), `author__in`, `author__not_in`
//! - 계층: `post_parent`, `post_parent__in`, `post_parent__not_in`, `menu_order`
//! - 검색: `s`(`-단어`는 제외), `exact`, `sentence`
//! - 날짜: `date_query`, `m`, `year`, `monthnum`, `day`
//! - 분류: `tax_query`, `cat`, `tag`
//! - 사용자 정의 필드: `meta_key`/`meta_value`/`meta_compare`/`meta_type`, `meta_query`
//! - 정렬/페이지: `orderby`, `order`, `ignore_sticky_posts`, `paged`, `posts_per_page`,
//!   `nopaging`, `offset`
//!
//! 그 외 변수는 무시합니다.

use std::slice;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use serde_json::{Map, Value};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::{
    error::AppError,
    models::{Post, STATUS_PUBLISHED},
    services::{
        query_args::{
            parse_date, value_as_i64, value_as_string, value_as_string_list, value_is_truthy,
            Clauses, PageSize, QueryArgs,
        },
        store::{ContentStore, StoreResult},
    },
};

type Sql<'q> = QueryBuilder<'q, Sqlite>;

const POST_COLUMNS: &str = "p.id, p.post_type, p.status, p.author_id, p.parent_id, \
    p.menu_order, p.slug, p.title, p.content, p.excerpt, p.mime_type, p.is_sticky, \
    p.published_at, p.modified_at";

#[derive(Debug, Clone)]
pub struct SqliteContentStore {
    pool: SqlitePool,
    default_per_page: u32,
}

impl SqliteContentStore {
    pub fn new(pool: SqlitePool, default_per_page: u32) -> Self {
        Self {
            pool,
            default_per_page,
        }
    }
}

#[async_trait]
impl ContentStore for SqliteContentStore {
    async fn query(&self, args: &QueryArgs) -> Result<StoreResult, AppError> {
        let page_size = PageSize::from_args(args, self.default_per_page);

        let mut select = Sql::new(format!("SELECT {POST_COLUMNS} FROM posts p WHERE 1 = 1"));
        push_conditions(&mut select, args);
        push_order(&mut select, args);
        if let PageSize::Limited(per_page) = page_size {
            let per_page = i64::from(per_page);
            // offset이 있으면 paged는 무시됩니다.
            // 아주 큰 페이지 번호는 i64 범위에서 포화시켜 "마지막 페이지 너머"(빈 창)로 만듭니다.
            // 그래야 전체 건수가 0으로 보고되고 실행기의 재집계가 동작합니다.
            let offset = match args.int("offset") {
                Some(offset) => offset.max(0),
                None => window_offset(args.int("paged"), per_page),
            };
            select
                .push(" LIMIT ")
                .push_bind(per_page)
                .push(" OFFSET ")
                .push_bind(offset);
        }

        // build_query_as: push_bind로 쌓은 값들을 `?` 자리표시자에 순서대로 바인딩합니다.
        let posts = select.build_query_as::<Post>().fetch_all(&self.pool).await?;

        // 전체 건수: 요청한 창(LIMIT/OFFSET)이 비어 있으면 COUNT 없이 0으로 보고합니다.
        // 마지막 페이지를 넘어선 요청은 실행기가 paged 없이 다시 세어 보정합니다.

        let found = match page_size {
            PageSize::Unlimited => posts.len() as u64,
            PageSize::Limited(_) if posts.is_empty() => 0,
            PageSize::Limited(_) => {
                let mut count = Sql::new("SELECT COUNT(*) FROM posts p WHERE 1 = 1");
                push_conditions(&mut count, args);
                let total = count
                    .build_query_scalar::<i64>()
                    .fetch_one(&self.pool)
                    .await?;
                u64::try_from(total).unwrap_or(0)
            }
        };

        tracing::debug!(rows = posts.len(), found, "content query");
        Ok(StoreResult { posts, found })
    }

    async fn get_field(&self, post_id: i64, key: &str) -> Result<Option<Value>, AppError> {
        let raw = sqlx::query_scalar::<_, Option<String>>(
            "SELECT meta_value FROM post_meta WHERE post_id = ? AND meta_key = ? LIMIT 1",
        )
        .bind(post_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?
        .flatten();

        // JSON으로 저장된 값은 구조를 살리고, 아니면 문자열 그대로 돌려줍니다.
        Ok(raw.map(|text| serde_json::from_str(&text).unwrap_or(Value::String(text))))
    }

    async fn post_terms(&self, post_id: i64, taxonomy: &str) -> Result<Vec<i64>, AppError> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT tr.term_id
            FROM term_relationships tr
            JOIN terms t ON t.id = tr.term_id
            WHERE tr.post_id = ? AND t.taxonomy = ?
            ORDER BY tr.term_id
            "#,
        )
        .bind(post_id)
        .bind(taxonomy)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

/// `paged` 기준 OFFSET. 1보다 작은 페이지는 1페이지로 봅니다.
fn window_offset(paged: Option<i64>, per_page: i64) -> i64 {
    paged
        .unwrap_or(1)
        .max(1)
        .saturating_sub(1)
        .saturating_mul(per_page)
}

/// 바인딩할 값
#[derive(Debug, Clone, PartialEq)]
enum Bind {
    Int(i64),
    Real(f64),
    Text(String),
}

fn push_value(qb: &mut Sql<'_>, value: Bind) {
    match value {
        Bind::Int(n) => qb.push_bind(n),
        Bind::Real(n) => qb.push_bind(n),
        Bind::Text(s) => qb.push_bind(s),
    };
}

fn push_list(qb: &mut Sql<'_>, values: Vec<Bind>) {
    qb.push("(");
    let mut list = qb.separated(", ");
    for value in values {
        match value {
            Bind::Int(n) => list.push_bind(n),
            Bind::Real(n) => list.push_bind(n),
            Bind::Text(s) => list.push_bind(s),
        };
    }
    qb.push(")");
}

fn push_id_filter(qb: &mut Sql<'_>, column: &str, ids: &[i64], negate: bool) {
    if ids.is_empty() {
        return;
    }
    let op = if negate { "NOT IN" } else { "IN" };
    qb.push(format!(" AND {column} {op} "));
    push_list(qb, ids.iter().copied().map(Bind::Int).collect());
}

fn push_text_filter(qb: &mut Sql<'_>, column: &str, values: &[String]) {
    if values.is_empty() {
        return;
    }
    qb.push(format!(" AND {column} IN "));
    push_list(qb, values.iter().cloned().map(Bind::Text).collect());
}

/// LIKE 패턴의 `%`, `_`, `\`를 이스케이프합니다. 쿼리에서는 `ESCAPE '\'`와 함께 씁니다.
fn like_escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// `WHERE 1 = 1` 뒤에 붙는 조건들
fn push_conditions(qb: &mut Sql<'_>, args: &QueryArgs) {
    if let Some(id) = args.int("p").filter(|id| *id > 0) {
        qb.push(" AND p.id = ").push_bind(id);
    }
    if let Some(name) = args.str("name").filter(|n| !n.is_empty()) {
        qb.push(" AND p.slug = ").push_bind(slug::slugify(name));
    }
    if let Some(title) = args.str("title").filter(|t| !t.is_empty()) {
        qb.push(" AND p.title = ").push_bind(title);
    }

    let post_types = args.post_types();
    if !post_types.iter().any(|t| t == "any") {
        let post_types = if post_types.is_empty() {
            vec!["post".to_string()]
        } else {
            post_types
        };
        push_text_filter(qb, "p.post_type", &post_types);
    }

    let statuses = args.string_list("post_status");
    if statuses.iter().any(|s| s == "any") {
        qb.push(" AND p.status NOT IN ('trash', 'auto-draft')");
    } else if statuses.is_empty() {
        push_text_filter(qb, "p.status", &[STATUS_PUBLISHED.to_string()]);
    } else {
        push_text_filter(qb, "p.status", &statuses);
    }

    let authors = args.id_list("author");
    let (exclude, include): (Vec<i64>, Vec<i64>) = authors.iter().partition(|id| **id < 0);
    push_id_filter(qb, "p.author_id", &include, false);
    let exclude: Vec<i64> = exclude.iter().map(|id| id.saturating_abs()).collect();
    push_id_filter(qb, "p.author_id", &exclude, true);
    push_id_filter(qb, "p.author_id", &args.id_list("author__in"), false);
    push_id_filter(qb, "p.author_id", &args.id_list("author__not_in"), true);

    push_id_filter(qb, "p.id", &args.id_list("post__in"), false);
    push_id_filter(qb, "p.id", &args.id_list("post__not_in"), true);

    if let Some(parent) = args.int("post_parent") {
        qb.push(" AND p.parent_id = ").push_bind(parent);
    }
    push_id_filter(qb, "p.parent_id", &args.id_list("post_parent__in"), false);
    push_id_filter(qb, "p.parent_id", &args.id_list("post_parent__not_in"), true);

    if let Some(order) = args.int("menu_order").filter(|n| *n != 0) {
        qb.push(" AND p.menu_order = ").push_bind(order);
    }

    push_search(qb, args);
    push_dates(qb, args);

    for node in tax_nodes(args) {
        qb.push(" AND ");
        node.push(qb);
    }
    for node in meta_nodes(args) {
        qb.push(" AND ");
        node.push(qb);
    }
}

fn push_search(qb: &mut Sql<'_>, args: &QueryArgs) {
    let Some(search) = args.str("s").filter(|s| !s.trim().is_empty()) else {
        return;
    };
    let terms: Vec<String> = if args.flag("sentence") {
        vec![search.trim().to_string()]
    } else {
        search.split_whitespace().map(str::to_string).collect()
    };
    let exact = args.flag("exact");

    for term in terms {
        let (negate, word) = match term.strip_prefix('-') {
            Some(word) if !word.is_empty() => (true, word.to_string()),
            _ => (false, term),
        };
        let pattern = if exact {
            like_escape(&word)
        } else {
            format!("%{}%", like_escape(&word))
        };
        qb.push(if negate { " AND NOT (" } else { " AND (" });
        for (i, column) in ["p.title", "p.excerpt", "p.content"].iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push(format!("{column} LIKE "))
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\'");
        }
        qb.push(")");
    }
}

/// 비교식 한 개: `lhs`(연산자 포함) + 바인딩 값
#[derive(Debug, Clone, PartialEq)]
struct Cond {
    lhs: String,
    value: Bind,
}

impl Cond {
    fn new(lhs: impl Into<String>, value: Bind) -> Self {
        Self {
            lhs: lhs.into(),
            value,
        }
    }

    fn push(&self, qb: &mut Sql<'_>) {
        qb.push(&self.lhs);
        push_value(qb, self.value.clone());
    }
}

fn date_part(column: &str, format: &str, value: i64) -> Cond {
    Cond::new(
        format!("CAST(strftime('{format}', {column}) AS INTEGER) = "),
        Bind::Int(value),
    )
}

/// 날짜 경계 값 → (기간의 시작, 기간의 끝)
///
/// 문자열은 날짜 또는 날짜-시간, 객체는 `{year, month?, day?}`.
fn date_bounds(value: &Value) -> Option<(String, String)> {
    match value {
        Value::String(text) => parse_date(text).map(|d| (d.start(), d.end())),
        Value::Object(map) => {
            let year = i32::try_from(map.get("year").and_then(value_as_i64)?).ok()?;
            let month = map
                .get("month")
                .and_then(value_as_i64)
                .and_then(|m| u32::try_from(m).ok());
            let day = map
                .get("day")
                .and_then(value_as_i64)
                .and_then(|d| u32::try_from(d).ok());

            let start = NaiveDate::from_ymd_opt(year, month.unwrap_or(1), day.unwrap_or(1))?;
            let end = match (month, day) {
                (_, Some(_)) => start,
                (Some(m), None) => {
                    let next = if m == 12 {
                        NaiveDate::from_ymd_opt(year + 1, 1, 1)
                    } else {
                        NaiveDate::from_ymd_opt(year, m + 1, 1)
                    }?;
                    next - Duration::days(1)
                }
                (None, None) => NaiveDate::from_ymd_opt(year, 12, 31)?,
            };
            Some((
                format!("{}T00:00:00", start.format("%Y-%m-%d")),
                format!("{}T23:59:59", end.format("%Y-%m-%d")),
            ))
        }
        _ => None,
    }
}

fn date_clause(map: &Map<String, Value>) -> Vec<Cond> {
    let column = match map.get("column").and_then(Value::as_str) {
        Some("post_modified" | "post_modified_gmt" | "modified") => "p.modified_at",
        _ => "p.published_at",
    };
    let inclusive = map.get("inclusive").is_some_and(value_is_truthy);
    let mut conds = Vec::new();

    if let Some((start, end)) = map.get("after").and_then(date_bounds) {
        conds.push(if inclusive {
            Cond::new(format!("{column} >= "), Bind::Text(start))
        } else {
            Cond::new(format!("{column} > "), Bind::Text(end))
        });
    }
    if let Some((start, end)) = map.get("before").and_then(date_bounds) {
        conds.push(if inclusive {
            Cond::new(format!("{column} <= "), Bind::Text(end))
        } else {
            Cond::new(format!("{column} < "), Bind::Text(start))
        });
    }
    for (key, format) in [("year", "%Y"), ("month", "%m"), ("monthnum", "%m"), ("day", "%d")] {
        if let Some(value) = map.get(key).and_then(value_as_i64) {
            conds.push(date_part(column, format, value));
        }
    }
    conds
}

fn push_dates(qb: &mut Sql<'_>, args: &QueryArgs) {
    let clauses = args.clauses("date_query");
    let groups: Vec<Vec<Cond>> = clauses
        .items
        .iter()
        .map(|clause| date_clause(clause))
        .filter(|conds| !conds.is_empty())
        .collect();
    if !groups.is_empty() {
        let joiner = if clauses.relation_or { " OR " } else { " AND " };
        qb.push(" AND (");
        for (i, conds) in groups.iter().enumerate() {
            if i > 0 {
                qb.push(joiner);
            }
            qb.push("(");
            for (j, cond) in conds.iter().enumerate() {
                if j > 0 {
                    qb.push(" AND ");
                }
                cond.push(qb);
            }
            qb.push(")");
        }
        qb.push(")");
    }

    // m=YYYYMMDD: 앞에서부터 연/월/일
    let mut parts = Vec::new();
    if let Some(m) = args.str("m") {
        let digits: String = m.chars().filter(char::is_ascii_digit).collect();
        for (range, format) in [(0..4, "%Y"), (4..6, "%m"), (6..8, "%d")] {
            if let Some(value) = digits.get(range).and_then(|d| d.parse::<i64>().ok()) {
                parts.push(date_part("p.published_at", format, value));
            }
        }
    }
    for (key, format) in [("year", "%Y"), ("monthnum", "%m"), ("day", "%d")] {
        if let Some(value) = args.int(key).filter(|v| *v > 0) {
            parts.push(date_part("p.published_at", format, value));
        }
    }
    for cond in parts {
        qb.push(" AND ");
        cond.push(qb);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TermField {
    Id,
    Slug,
    Name,
}

impl TermField {
    fn column(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Slug => "slug",
            Self::Name => "name",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaxOperator {
    In,
    NotIn,
    And,
    Exists,
    NotExists,
}

#[derive(Debug, Clone, PartialEq)]
struct TaxClause {
    taxonomy: String,
    field: TermField,
    terms: Vec<String>,
    operator: TaxOperator,
    include_children: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Node<C> {
    Clause(C),
    Group { relation_or: bool, items: Vec<Node<C>> },
}

trait PushClause {
    fn push_clause(&self, qb: &mut Sql<'_>);
}

impl<C: PushClause> Node<C> {
    fn push(&self, qb: &mut Sql<'_>) {
        match self {
            Node::Clause(clause) => clause.push_clause(qb),
            Node::Group { relation_or, items } => {
                let joiner = if *relation_or { " OR " } else { " AND " };
                qb.push("(");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        qb.push(joiner);
                    }
                    item.push(qb);
                }
                qb.push(")");
            }
        }
    }
}

/// 절 묶음을 재귀적으로 해석합니다. `is_clause`가 참인 객체는 절, 아니면 하위 묶음입니다.
fn parse_group<C>(
    clauses: Clauses<'_>,
    is_clause: fn(&Map<String, Value>) -> bool,
    parse: fn(&Map<String, Value>) -> Option<C>,
) -> Option<Node<C>> {
    let items: Vec<Node<C>> = clauses
        .items
        .into_iter()
        .filter_map(|map| {
            if is_clause(map) {
                parse(map).map(Node::Clause)
            } else {
                parse_group(Clauses::from_map(map), is_clause, parse)
            }
        })
        .collect();
    (!items.is_empty()).then_some(Node::Group {
        relation_or: clauses.relation_or,
        items,
    })
}

/// 문자열은 쉼표로만 나눕니다 (이름에 공백이 들어갈 수 있음).
fn term_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(text)) => text
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        Some(other) => value_as_string_list(other),
        None => Vec::new(),
    }
}

impl TaxClause {
    fn parse(map: &Map<String, Value>) -> Option<Self> {
        let taxonomy = map
            .get("taxonomy")
            .and_then(value_as_string)
            .filter(|t| !t.is_empty())?;
        let operator = match map
            .get("operator")
            .and_then(value_as_string)
            .map(|o| o.trim().to_ascii_uppercase())
            .as_deref()
        {
            Some("NOT IN") => TaxOperator::NotIn,
            Some("AND") => TaxOperator::And,
            Some("EXISTS") => TaxOperator::Exists,
            Some("NOT EXISTS") => TaxOperator::NotExists,
            _ => TaxOperator::In,
        };
        let field = match map.get("field").and_then(Value::as_str) {
            Some("slug") => TermField::Slug,
            Some("name") => TermField::Name,
            _ => TermField::Id,
        };
        let mut terms = term_list(map.get("terms"));
        if field == TermField::Id {
            terms.retain(|t| t.parse::<i64>().is_ok());
        }
        let needs_terms = matches!(
            operator,
            TaxOperator::In | TaxOperator::NotIn | TaxOperator::And
        );
        if needs_terms && terms.is_empty() {
            return None;
        }
        Some(Self {
            taxonomy,
            field,
            terms,
            operator,
            include_children: map.get("include_children").map_or(true, value_is_truthy),
        })
    }

    /// 조건에 맞는 term ID 집합 (하위 term 포함 여부에 따라 재귀 CTE 사용)
    fn push_term_set(&self, qb: &mut Sql<'_>, terms: &[String]) {
        let column = self.field.column();
        let values: Vec<Bind> = terms
            .iter()
            .map(|t| match self.field {
                TermField::Id => Bind::Int(t.parse().unwrap_or_default()),
                _ => Bind::Text(t.clone()),
            })
            .collect();

        // 재귀 CTE(Common Table Expression): 지정한 term에서 시작해 parent_id를 따라
        // 모든 하위 term을 모읍니다. include_children이 false면 지정한 term만 씁니다.
        if self.include_children {
            qb.push("(WITH RECURSIVE tree(id) AS (SELECT id FROM terms WHERE taxonomy = ")
                .push_bind(self.taxonomy.clone())
                .push(format!(" AND {column} IN "));
            push_list(qb, values);
            qb.push(" UNION SELECT t.id FROM terms t JOIN tree ON t.parent_id = tree.id) SELECT id FROM tree)");
        } else {
            qb.push("(SELECT id FROM terms WHERE taxonomy = ")
                .push_bind(self.taxonomy.clone())
                .push(format!(" AND {column} IN "));
            push_list(qb, values);
            qb.push(")");
        }
    }

    fn push_membership(&self, qb: &mut Sql<'_>, negate: bool, terms: &[String]) {
        qb.push(if negate { "p.id NOT IN " } else { "p.id IN " });
        qb.push("(SELECT tr.post_id FROM term_relationships tr WHERE tr.term_id IN ");
        self.push_term_set(qb, terms);
        qb.push(")");
    }
}

impl PushClause for TaxClause {
    fn push_clause(&self, qb: &mut Sql<'_>) {
        match self.operator {
            TaxOperator::In => self.push_membership(qb, false, &self.terms),
            TaxOperator::NotIn => self.push_membership(qb, true, &self.terms),
            TaxOperator::And => {
                qb.push("(");
                for (i, term) in self.terms.iter().enumerate() {
                    if i > 0 {
                        qb.push(" AND ");
                    }
                    self.push_membership(qb, false, slice::from_ref(term));
                }
                qb.push(")");
            }
            TaxOperator::Exists | TaxOperator::NotExists => {
                if self.operator == TaxOperator::NotExists {
                    qb.push("NOT ");
                }
                qb.push(
                    "EXISTS (SELECT 1 FROM term_relationships tr JOIN terms t ON t.id = tr.term_id \
                     WHERE tr.post_id = p.id AND t.taxonomy = ",
                )
                .push_bind(self.taxonomy.clone())
                .push(")");
            }
        }
    }
}

fn tax_nodes(args: &QueryArgs) -> Vec<Node<TaxClause>> {
    let mut nodes: Vec<Node<TaxClause>> = parse_group(
        args.clauses("tax_query"),
        |map| map.contains_key("taxonomy"),
        TaxClause::parse,
    )
    .into_iter()
    .collect();

    // cat: 음수 ID는 제외, 하위 분류 포함
    let cats = args.id_list("cat");
    let (exclude, include): (Vec<i64>, Vec<i64>) = cats.iter().partition(|id| **id < 0);
    for (ids, operator) in [(include, TaxOperator::In), (exclude, TaxOperator::NotIn)] {
        if !ids.is_empty() {
            nodes.push(Node::Clause(TaxClause {
                taxonomy: "category".to_string(),
                field: TermField::Id,
                terms: ids.iter().map(|id| id.unsigned_abs().to_string()).collect(),
                operator,
                include_children: true,
            }));
        }
    }

    // tag: `a,b`는 하나라도, `a+b`는 모두
    if let Some(tag) = args.str("tag").filter(|t| !t.trim().is_empty()) {
        let all = tag.contains('+');
        let terms: Vec<String> = tag
            .split([',', '+', ' '])
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        if !terms.is_empty() {
            nodes.push(Node::Clause(TaxClause {
                taxonomy: "post_tag".to_string(),
                field: TermField::Slug,
                terms,
                operator: if all { TaxOperator::And } else { TaxOperator::In },
                include_children: false,
            }));
        }
    }
    nodes
}

#[derive(Debug, Clone, PartialEq)]
struct MetaClause {
    key: Option<String>,
    value: Option<Value>,
    compare: String,
    numeric: bool,
}

const META_COMPARES: &[&str] = &[
    "=", "!=", ">", ">=", "<", "<=", "LIKE", "NOT LIKE", "IN", "NOT IN", "BETWEEN",
    "NOT BETWEEN", "EXISTS", "NOT EXISTS",
];

impl MetaClause {
    fn is_clause(map: &Map<String, Value>) -> bool {
        ["key", "value", "compare", "type"]
            .iter()
            .any(|k| map.contains_key(*k))
    }

    fn parse(map: &Map<String, Value>) -> Option<Self> {
        let key = map
            .get("key")
            .and_then(value_as_string)
            .filter(|k| !k.is_empty());
        let value = map.get("value").filter(|v| !v.is_null()).cloned();
        let default_compare = if value.as_ref().is_some_and(Value::is_array) {
            "IN"
        } else {
            "="
        };
        let compare = map
            .get("compare")
            .and_then(value_as_string)
            .map(|c| c.trim().to_ascii_uppercase())
            .filter(|c| META_COMPARES.contains(&c.as_str()))
            .unwrap_or_else(|| default_compare.to_string());
        let numeric = map
            .get("type")
            .and_then(value_as_string)
            .map(|t| t.to_ascii_uppercase())
            .is_some_and(|t| {
                matches!(t.as_str(), "NUMERIC" | "SIGNED" | "UNSIGNED" | "DECIMAL")
            });

        if key.is_none() && value.is_none() {
            return None;
        }
        Some(Self {
            key,
            value,
            compare,
            numeric,
        })
    }

    fn bind(&self, value: &Value) -> Option<Bind> {
        if self.numeric {
            let number = match value {
                Value::Number(n) => n.as_f64(),
                other => value_as_string(other).map(|s| s.trim().parse::<f64>().unwrap_or(0.0)),
            };
            number.map(Bind::Real)
        } else {
            value_as_string(value).map(Bind::Text)
        }
    }

    fn values(&self) -> Vec<Bind> {
        self.value
            .as_ref()
            .map(|v| match v {
                Value::Array(items) => items.iter().filter_map(|i| self.bind(i)).collect(),
                Value::String(text) if self.compare.contains("IN") || self.compare.contains("BETWEEN") => text
                    .split(',')
                    .map(|part| Value::String(part.trim().to_string()))
                    .filter_map(|part| self.bind(&part))
                    .collect(),
                other => self.bind(other).into_iter().collect(),
            })
            .unwrap_or_default()
    }

    fn push_value_condition(&self, qb: &mut Sql<'_>) {
        let lhs = if self.numeric {
            "CAST(m.meta_value AS REAL)"
        } else {
            "m.meta_value"
        };
        let mut values = self.values();
        match self.compare.as_str() {
            "LIKE" | "NOT LIKE" => {
                let Some(pattern) = self.value.as_ref().and_then(|v| match v {
                    Value::Array(items) => items.first().and_then(value_as_string),
                    other => value_as_string(other),
                }) else {
                    return;
                };
                qb.push(format!(" AND m.meta_value {} ", self.compare))
                    .push_bind(format!("%{}%", like_escape(&pattern)))
                    .push(" ESCAPE '\\'");
            }
            "IN" | "NOT IN" => {
                if values.is_empty() {
                    return;
                }
                qb.push(format!(" AND {lhs} {} ", self.compare));
                push_list(qb, values);
            }
            "BETWEEN" | "NOT BETWEEN" => {
                if values.len() < 2 {
                    return;
                }
                values.truncate(2);
                let high = values.pop();
                let low = values.pop();
                if let (Some(low), Some(high)) = (low, high) {
                    qb.push(format!(" AND {lhs} {} ", self.compare));
                    push_value(qb, low);
                    qb.push(" AND ");
                    push_value(qb, high);
                }
            }
            op => {
                let Some(value) = values.into_iter().next() else {
                    return;
                };
                let op = if op == "!=" { "<>" } else { op };
                qb.push(format!(" AND {lhs} {op} "));
                push_value(qb, value);
            }
        }
    }
}

impl PushClause for MetaClause {
    fn push_clause(&self, qb: &mut Sql<'_>) {
        let negate = self.compare == "NOT EXISTS";
        qb.push(if negate { "NOT EXISTS" } else { "EXISTS" });
        qb.push(" (SELECT 1 FROM post_meta m WHERE m.post_id = p.id");
        if let Some(key) = &self.key {
            qb.push(" AND m.meta_key = ").push_bind(key.clone());
        }
        if !negate && self.compare != "EXISTS" {
            self.push_value_condition(qb);
        }
        qb.push(")");
    }
}

/// `meta_key`/`meta_value` 단축 절과 `meta_query`를 AND로 묶습니다.
fn meta_nodes(args: &QueryArgs) -> Vec<Node<MetaClause>> {
    let mut nodes = Vec::new();

    let mut primary = Map::new();
    for (var, key) in [
        ("meta_key", "key"),
        ("meta_value", "value"),
        ("meta_compare", "compare"),
        ("meta_type", "type"),
    ] {
        if let Some(value) = args.get(var) {
            primary.insert(key.to_string(), value.clone());
        }
    }
    if let Some(clause) = MetaClause::parse(&primary) {
        nodes.push(Node::Clause(clause));
    }

    if let Some(group) = parse_group(
        args.clauses("meta_query"),
        MetaClause::is_clause,
        MetaClause::parse,
    ) {
        nodes.push(group);
    }
    nodes
}

fn push_order(qb: &mut Sql<'_>, args: &QueryArgs) {
    let default_desc = !args
        .str("order")
        .is_some_and(|o| o.trim().eq_ignore_ascii_case("asc"));
    // orderby 형태:
    // - 문자열/목록: "title date" → 모두 order 방향
    // - 맵: {"title": "asc", "date": "desc"} → 필드마다 방향 지정
    let fields: Vec<(String, bool)> = match args.get("orderby") {
        Some(Value::Object(map)) => map
            .iter()
            .map(|(field, dir)| {
                let desc = value_as_string(dir)
                    .map(|d| !d.trim().eq_ignore_ascii_case("asc"))
                    .unwrap_or(default_desc);
                (field.clone(), desc)
            })
            .collect(),
        Some(value) => value_as_string_list(value)
            .into_iter()
            .map(|field| (field, default_desc))
            .collect(),
        None => vec![("date".to_string(), default_desc)],
    };

    let mut started = false;
    let mut next_term = |qb: &mut Sql<'_>| {
        qb.push(if started { ", " } else { " ORDER BY " });
        started = true;
    };

    if !args.flag("ignore_sticky_posts") {
        next_term(qb);
        qb.push("p.is_sticky DESC");
    }

    let mut ordered = false;
    let mut random = false;
    let mut explicit_none = false;
    for (field, desc) in &fields {
        let dir = if *desc { "DESC" } else { "ASC" };
        let column = match field.as_str() {
            "date" | "post_date" => Some("p.published_at"),
            "id" | "ID" => Some("p.id"),
            "title" | "post_title" => Some("p.title"),
            "name" | "slug" | "post_name" => Some("p.slug"),
            "menu_order" => Some("p.menu_order"),
            "modified" | "post_modified" => Some("p.modified_at"),
            "parent" | "post_parent" => Some("p.parent_id"),
            "author" | "post_author" => Some("p.author_id"),
            "type" | "post_type" => Some("p.post_type"),
            _ => None,
        };
        if let Some(column) = column {
            next_term(qb);
            qb.push(format!("{column} {dir}"));
            ordered = true;
            continue;
        }
        match field.as_str() {
            "none" => explicit_none = true,
            "rand" => {
                next_term(qb);
                qb.push("RANDOM()");
                random = true;
            }
            "post__in" => {
                let ids = args.id_list("post__in");
                if ids.is_empty() {
                    continue;
                }
                next_term(qb);
                qb.push("CASE p.id");
                for (position, id) in ids.iter().enumerate() {
                    qb.push(" WHEN ")
                        .push_bind(*id)
                        .push(" THEN ")
                        .push_bind(position as i64);
                }
                qb.push(" ELSE ").push_bind(ids.len() as i64).push(" END");
                ordered = true;
            }
            "meta_value" | "meta_value_num" => {
                let Some(key) = args.str("meta_key").filter(|k| !k.is_empty()) else {
                    continue;
                };
                next_term(qb);
                let cast = field == "meta_value_num";
                qb.push(if cast { "CAST((" } else { "(" });
                qb.push("SELECT m.meta_value FROM post_meta m WHERE m.post_id = p.id AND m.meta_key = ")
                    .push_bind(key)
                    .push(" LIMIT 1)");
                qb.push(if cast { " AS REAL)" } else { "" });
                qb.push(format!(" {dir}"));
                ordered = true;
            }
            other => tracing::debug!(orderby = other, "ignoring unsupported orderby field"),
        }
    }

    if random {
        return;
    }
    if !ordered {
        if explicit_none {
            return;
        }
        next_term(qb);
        qb.push("p.published_at DESC");
    }
    next_term(qb);
    qb.push(if default_desc { "p.id DESC" } else { "p.id ASC" });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> QueryArgs {
        match value {
            Value::Object(map) => QueryArgs::from(map),
            _ => QueryArgs::new(),
        }
    }

    fn where_sql(value: Value) -> String {
        let mut qb = Sql::new("SELECT 1 FROM posts p WHERE 1 = 1");
        push_conditions(&mut qb, &args(value));
        qb.sql().to_string()
    }

    fn order_sql(value: Value) -> String {
        let mut qb = Sql::new("");
        push_order(&mut qb, &args(value));
        qb.sql().to_string()
    }

    #[test]
    fn page_offset_saturates_instead_of_overflowing() {
        assert_eq!(window_offset(None, 10), 0);
        assert_eq!(window_offset(Some(-3), 10), 0);
        assert_eq!(window_offset(Some(3), 10), 20);
        assert_eq!(window_offset(Some(i64::MAX), 10), i64::MAX);
    }

    #[test]
    fn most_negative_author_is_excluded_without_overflow() {
        let sql = where_sql(json!({ "author": [i64::MIN] }));
        assert!(sql.contains("p.author_id NOT IN (?)"));
    }

    #[test]
    fn defaults_to_published_posts() {
        let sql = where_sql(json!({}));
        assert!(sql.contains("p.post_type IN (?)"));
        assert!(sql.contains("p.status IN (?)"));
    }

    #[test]
    fn any_skips_type_and_status_filters() {
        let sql = where_sql(json!({ "post_type": ["any"], "post_status": "any" }));
        assert!(!sql.contains("p.post_type"));
        assert!(sql.contains("p.status NOT IN ('trash', 'auto-draft')"));
    }

    #[test]
    fn negative_authors_are_excluded() {
        let sql = where_sql(json!({ "author": "1,-2" }));
        assert!(sql.contains("p.author_id IN (?)"));
        assert!(sql.contains("p.author_id NOT IN (?)"));
    }

    #[test]
    fn search_excludes_minus_words() {
        let sql = where_sql(json!({ "s": "apple -pie" }));
        assert!(sql.contains(" AND (p.title LIKE ?"));
        assert!(sql.contains(" AND NOT (p.title LIKE ?"));
    }

    #[test]
    fn tax_clause_without_children_skips_the_cte() {
        let sql = where_sql(json!({
            "tax_query": [{ "taxonomy": "category", "field": "term_id", "terms": [7], "include_children": false }]
        }));
        assert!(sql.contains("p.id IN (SELECT tr.post_id FROM term_relationships tr WHERE tr.term_id IN (SELECT id FROM terms WHERE taxonomy = ? AND id IN (?)))"));
        assert!(!sql.contains("WITH RECURSIVE"));
    }

    #[test]
    fn nested_tax_groups_keep_their_relation() {
        let sql = where_sql(json!({
            "tax_query": {
                "relation": "OR",
                "0": { "taxonomy": "category", "terms": [1] },
                "1": { "taxonomy": "post_tag", "operator": "EXISTS" }
            }
        }));
        assert!(sql.contains("WITH RECURSIVE"));
        assert!(sql.contains(" OR EXISTS (SELECT 1 FROM term_relationships"));
    }

    #[test]
    fn empty_term_lists_are_ignored() {
        let sql = where_sql(json!({ "tax_query": [{ "taxonomy": "category", "terms": [] }] }));
        assert!(!sql.contains("term_relationships"));
    }

    #[test]
    fn meta_shorthand_and_query_are_combined() {
        let sql = where_sql(json!({
            "meta_key": "color",
            "meta_value": "red",
            "meta_query": [{ "key": "size", "value": [1, 5], "compare": "BETWEEN", "type": "NUMERIC" }]
        }));
        assert!(sql.contains("EXISTS (SELECT 1 FROM post_meta m WHERE m.post_id = p.id AND m.meta_key = ? AND m.meta_value = ?)"));
        assert!(sql.contains("CAST(m.meta_value AS REAL) BETWEEN ? AND ?"));
    }

    #[test]
    fn meta_not_exists_only_checks_the_key() {
        let sql = where_sql(json!({ "meta_query": [{ "key": "hidden", "compare": "not exists" }] }));
        assert!(sql.contains("NOT EXISTS (SELECT 1 FROM post_meta m WHERE m.post_id = p.id AND m.meta_key = ?)"));
    }

    #[test]
    fn date_bounds_expand_whole_periods() {
        assert_eq!(
            date_bounds(&json!({ "year": 2024, "month": 2 })),
            Some(("2024-02-01T00:00:00".to_string(), "2024-02-29T23:59:59".to_string()))
        );
        assert_eq!(
            date_bounds(&json!("2024-05-01")),
            Some(("2024-05-01T00:00:00".to_string(), "2024-05-01T23:59:59".to_string()))
        );
        assert_eq!(date_bounds(&json!("not a date")), None);
    }

    #[test]
    fn date_query_uses_exclusive_bounds_by_default() {
        let conds = date_clause(
            json!({ "after": "2024-05-01", "before": "2024-06-01T10:00:00" })
                .as_object()
                .unwrap(),
        );
        assert_eq!(
            conds,
            vec![
                Cond::new("p.published_at > ", Bind::Text("2024-05-01T23:59:59".to_string())),
                Cond::new("p.published_at < ", Bind::Text("2024-06-01T10:00:00".to_string())),
            ]
        );
    }

    #[test]
    fn order_defaults_to_date_desc_with_id_tiebreak() {
        assert_eq!(
            order_sql(json!({ "ignore_sticky_posts": true })),
            " ORDER BY p.published_at DESC, p.id DESC"
        );
    }

    #[test]
    fn sticky_items_come_first_unless_ignored() {
        assert!(order_sql(json!({ "orderby": "title", "order": "asc" }))
            .starts_with(" ORDER BY p.is_sticky DESC, p.title ASC"));
    }

    #[test]
    fn post_in_order_uses_case() {
        let sql = order_sql(json!({
            "ignore_sticky_posts": true,
            "orderby": "post__in",
            "post__in": [9, 2]
        }));
        assert!(sql.starts_with(" ORDER BY CASE p.id WHEN ? THEN ? WHEN ? THEN ? ELSE ? END"));
    }

    #[test]
    fn unsupported_orderby_falls_back_to_date() {
        assert_eq!(
            order_sql(json!({ "ignore_sticky_posts": true, "orderby": "relevance" })),
            " ORDER BY p.published_at DESC, p.id DESC"
        );
    }
}
