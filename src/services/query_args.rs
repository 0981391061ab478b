//! # 구조화 필터 (QueryArgs)
//!
//! 요청 파라미터에서 만들어져 콘텐츠 저장소로 전달되는 엔진 중립적인 쿼리 객체입니다.
//! `filter` 파라미터로 임의의 키가 그대로 들어올 수 있으므로 타입이 고정된 구조체가 아니라
//! "쿼리 변수 이름 → JSON 값" 맵으로 표현합니다. 키 순서는 정렬되어 있어
//! 같은 요청은 항상 같은 필터를 만듭니다.
//!
//! 값 해석 도우미(`int`, `id_list`, `clauses` 등)는 저장소와 실행기가 공유합니다.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// 날짜/시간 저장 형식 (`posts.published_at`)
pub const STORED_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct QueryArgs(Map<String, Value>);

impl QueryArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// `null`은 "설정되지 않음"과 같게 취급하므로 저장하지 않습니다.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if value.is_null() {
            self.0.remove(&key);
        } else {
            self.0.insert(key, value);
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// 정수로 해석합니다. 숫자 문자열도 허용합니다.
    pub fn int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(value_as_i64)
    }

    /// 참/거짓으로 해석합니다. `true`, 0이 아닌 수, `"1"`, `"true"`, `"yes"`는 참입니다.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(value_is_truthy)
    }

    pub fn str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(value_as_string)
    }

    /// 배열 또는 쉼표/공백으로 구분된 문자열을 문자열 목록으로 해석합니다.
    pub fn string_list(&self, key: &str) -> Vec<String> {
        self.get(key).map(value_as_string_list).unwrap_or_default()
    }

    /// 배열 또는 쉼표/공백으로 구분된 문자열을 정수 목록으로 해석합니다.
    /// 숫자가 아닌 항목은 버립니다.
    pub fn id_list(&self, key: &str) -> Vec<i64> {
        self.string_list(key)
            .iter()
            .filter_map(|s| s.parse::<i64>().ok())
            .collect()
    }

    /// 절(clause) 목록: 배열, 또는 객체의 객체 항목들.
    /// `relation` 같은 문자열 항목은 건너뜁니다.
    pub fn clauses(&self, key: &str) -> Clauses<'_> {
        self.get(key).map(Clauses::from_value).unwrap_or_default()
    }

    /// 요청된 콘텐츠 타입 목록
    pub fn post_types(&self) -> Vec<String> {
        self.string_list("post_type")
    }
}

impl From<Map<String, Value>> for QueryArgs {
    fn from(map: Map<String, Value>) -> Self {
        Self(map.into_iter().filter(|(_, v)| !v.is_null()).collect())
    }
}

/// 절 목록과 절 사이의 관계(AND/OR)
#[derive(Debug, Default)]
pub struct Clauses<'a> {
    pub relation_or: bool,
    pub items: Vec<&'a Map<String, Value>>,
}

impl<'a> Clauses<'a> {
    pub fn from_value(value: &'a Value) -> Self {
        match value {
            Value::Array(items) => Self {
                relation_or: false,
                items: items.iter().filter_map(Value::as_object).collect(),
            },
            Value::Object(map) => Self::from_map(map),
            _ => Self::default(),
        }
    }

    /// 객체 형태의 절 묶음. 숫자 키 절이 먼저(번호순), 이름 붙은 절이 그 뒤에 옵니다.
    pub fn from_map(map: &'a Map<String, Value>) -> Self {
        let relation_or = map
            .get("relation")
            .and_then(Value::as_str)
            .is_some_and(|r| r.eq_ignore_ascii_case("or"));
        let mut numbered: Vec<(i64, &Map<String, Value>)> = Vec::new();
        let mut named: Vec<&Map<String, Value>> = Vec::new();
        for (key, value) in map {
            let Some(clause) = value.as_object() else {
                continue;
            };
            match key.parse::<i64>() {
                Ok(index) => numbered.push((index, clause)),
                Err(_) => named.push(clause),
            }
        }
        numbered.sort_by_key(|(i, _)| *i);
        Self {
            relation_or,
            items: numbered.into_iter().map(|(_, m)| m).chain(named).collect(),
        }
    }
}

/// 한 페이지의 크기
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    Limited(u32),
    /// 페이지 구분 없이 일치하는 모든 항목 (한 페이지)
    Unlimited,
}

impl PageSize {
    /// 필터에서 유효 페이지 크기를 계산합니다.
    ///
    /// - `nopaging`이 참이면 무제한
    /// - `posts_per_page`가 `-1` 또는 `0`이면 무제한
    /// - `-1`보다 작은 값은 절댓값
    /// - 없거나 해석할 수 없으면 `default_per_page`
    pub fn from_args(args: &QueryArgs, default_per_page: u32) -> Self {
        if args.flag("nopaging") {
            return Self::Unlimited;
        }
        match args.int("posts_per_page") {
            None => Self::Limited(default_per_page.max(1)),
            Some(-1) | Some(0) => Self::Unlimited,
            Some(n) => Self::Limited(u32::try_from(n.unsigned_abs()).unwrap_or(u32::MAX)),
        }
    }

    /// 전체 페이지 수. 일치 항목이 없으면 0입니다.
    pub fn total_pages(self, total: u64) -> u64 {
        match self {
            Self::Limited(n) => total.div_ceil(u64::from(n)),
            Self::Unlimited => u64::from(total > 0),
        }
    }
}

pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

pub fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn value_is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Null => false,
    }
}

pub fn value_as_string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(value_as_string).collect(),
        Value::Object(map) => map.values().filter_map(value_as_string).collect(),
        Value::String(s) => s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect(),
        other => value_as_string(other).into_iter().collect(),
    }
}

/// 날짜 문자열을 저장 형식(UTC)으로 정규화한 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedDate {
    DateTime(String),
    /// 시간이 없는 날짜. 비교 방향에 따라 하루의 시작/끝으로 확장됩니다.
    Date(NaiveDate),
}

impl ParsedDate {
    pub fn start(&self) -> String {
        match self {
            Self::DateTime(s) => s.clone(),
            Self::Date(d) => format!("{}T00:00:00", d.format("%Y-%m-%d")),
        }
    }

    pub fn end(&self) -> String {
        match self {
            Self::DateTime(s) => s.clone(),
            Self::Date(d) => format!("{}T23:59:59", d.format("%Y-%m-%d")),
        }
    }
}

/// ISO-8601 날짜-시간만 허용합니다 (시간대 생략 시 UTC로 간주).
pub fn parse_date_time(input: &str) -> Option<String> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc).format(STORED_DATE_FORMAT).to_string());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .map(|dt| dt.format(STORED_DATE_FORMAT).to_string())
}

/// 날짜-시간 또는 날짜만 있는 문자열을 해석합니다.
pub fn parse_date(input: &str) -> Option<ParsedDate> {
    if let Some(dt) = parse_date_time(input) {
        return Some(ParsedDate::DateTime(dt));
    }
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .ok()
        .map(ParsedDate::Date)
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

    #[test]
    fn null_values_are_not_stored() {
        let mut a = QueryArgs::new();
        a.insert("s", json!("hello"));
        a.insert("s", Value::Null);
        assert!(a.is_empty());
    }

    #[test]
    fn lists_accept_arrays_and_delimited_strings() {
        let a = args(json!({
            "post__in": ["3", 4, "x"],
            "author": "1, 2 -3",
            "post_type": "page"
        }));
        assert_eq!(a.id_list("post__in"), vec![3, 4]);
        assert_eq!(a.id_list("author"), vec![1, 2, -3]);
        assert_eq!(a.post_types(), vec!["page".to_string()]);
    }

    #[test]
    fn clauses_accept_numbered_objects_with_relation() {
        let a = args(json!({
            "meta_query": {
                "relation": "OR",
                "1": { "key": "b" },
                "0": { "key": "a" }
            }
        }));
        let clauses = a.clauses("meta_query");
        assert!(clauses.relation_or);
        let keys: Vec<&str> = clauses
            .items
            .iter()
            .filter_map(|c| c.get("key").and_then(Value::as_str))
            .collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn page_size_policy() {
        assert_eq!(PageSize::from_args(&args(json!({})), 10), PageSize::Limited(10));
        assert_eq!(
            PageSize::from_args(&args(json!({ "posts_per_page": "-1" })), 10),
            PageSize::Unlimited
        );
        assert_eq!(
            PageSize::from_args(&args(json!({ "posts_per_page": 0 })), 10),
            PageSize::Unlimited
        );
        assert_eq!(
            PageSize::from_args(&args(json!({ "posts_per_page": -5 })), 10),
            PageSize::Limited(5)
        );
        assert_eq!(
            PageSize::from_args(&args(json!({ "posts_per_page": 5, "nopaging": "1" })), 10),
            PageSize::Unlimited
        );
    }

    #[test]
    fn total_pages_rounds_up_and_is_zero_when_empty() {
        assert_eq!(PageSize::Limited(2).total_pages(3), 2);
        assert_eq!(PageSize::Limited(10).total_pages(10), 1);
        assert_eq!(PageSize::Limited(10).total_pages(0), 0);
        assert_eq!(PageSize::Unlimited.total_pages(42), 1);
        assert_eq!(PageSize::Unlimited.total_pages(0), 0);
    }

    #[test]
    fn dates_normalize_to_utc() {
        assert_eq!(
            parse_date_time("2024-05-01T10:00:00+02:00").as_deref(),
            Some("2024-05-01T08:00:00")
        );
        assert_eq!(
            parse_date_time("2024-05-01T10:00:00").as_deref(),
            Some("2024-05-01T10:00:00")
        );
        assert_eq!(parse_date_time("2024-05-01"), None);
        assert_eq!(parse_date_time("yesterday"), None);

        let day = parse_date("2024-05-01").unwrap();
        assert_eq!(day.start(), "2024-05-01T00:00:00");
        assert_eq!(day.end(), "2024-05-01T23:59:59");
    }
}
