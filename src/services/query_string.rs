//! # 쿼리 문자열 디코딩
//!
//! `type[]=post&type[]=page&filter[meta_key]=color` 형태의 쿼리 문자열을
//! 중첩된 JSON 값으로 바꿉니다. axum의 `Query` 추출기(serde_urlencoded)는
//! 반복 키와 대괄호 문법을 다루지 못하므로 원본 쿼리를 직접 해석합니다.
//!
//! 규칙:
//! - `k=v` → 문자열 (같은 키가 반복되면 마지막 값)
//! - `k[]=v` → 배열에 추가
//! - `k[sub]=v` → 객체의 `sub` 키
//! - `k[0]=a&k[1]=b`처럼 키가 0부터 연속된 숫자인 객체는 배열로 정규화

use serde_json::{Map, Value};

/// 디코딩된 쿼리 문자열
///
/// 원본 (키, 값) 쌍 목록은 페이지네이션 링크를 만들 때 그대로 재사용합니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryString {
    pub pairs: Vec<(String, String)>,
    pub params: Map<String, Value>,
}

impl QueryString {
    pub fn parse(raw: &str) -> Self {
        let mut pairs = Vec::new();
        let mut root = Value::Object(Map::new());
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            if key.is_empty() {
                continue;
            }
            // 중첩이 너무 깊은 키는 버립니다. 디코딩/정규화가 깊이만큼 재귀하기 때문입니다.
            let Some(path) = split_key(&key) else {
                tracing::debug!(depth_limit = MAX_KEY_DEPTH, "dropping over-nested query key");
                continue;
            };
            insert_path(&mut root, &path, Value::String(value.to_string()));
            pairs.push((key.into_owned(), value.into_owned()));
        }
        // 최상위는 항상 파라미터 이름 → 값 객체로 유지합니다.
        let params = match root {
            Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| (k, normalize_lists(v)))
                .collect(),
            _ => Map::new(),
        };
        Self { pairs, params }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }
}

/// 키 이름 뒤에 올 수 있는 대괄호 단계 수의 상한
pub const MAX_KEY_DEPTH: usize = 64;

/// `a[b][]` → `["a", "b", ""]`. 닫히지 않은 대괄호는 키 이름의 일부로 취급합니다.
/// 대괄호 단계가 `MAX_KEY_DEPTH`를 넘으면 `None`.
fn split_key(key: &str) -> Option<Vec<String>> {
    let Some(open) = key.find('[') else {
        return Some(vec![key.to_string()]);
    };
    if open == 0 {
        return Some(vec![key.to_string()]);
    }

    let mut segments = vec![key[..open].to_string()];
    let mut rest = &key[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(close) = stripped.find(']') else {
            break;
        };
        if segments.len() > MAX_KEY_DEPTH {
            return None;
        }
        segments.push(stripped[..close].to_string());
        rest = &stripped[close + 1..];
    }
    Some(segments)
}

fn insert_path(node: &mut Value, path: &[String], value: Value) {
    let Some((head, tail)) = path.split_first() else {
        *node = value;
        return;
    };

    if head.is_empty() {
        // `[]`: 배열에 추가. 기존 값이 객체면 다음 숫자 키로 추가합니다.
        match node {
            Value::Array(items) => {
                let mut child = Value::Null;
                insert_path(&mut child, tail, value);
                items.push(child);
            }
            Value::Object(map) => {
                let mut child = Value::Null;
                insert_path(&mut child, tail, value);
                let next = map.len().to_string();
                map.insert(next, child);
            }
            _ => {
                let mut child = Value::Null;
                insert_path(&mut child, tail, value);
                *node = Value::Array(vec![child]);
            }
        }
        return;
    }

    if let Value::Array(items) = node {
        let converted: Map<String, Value> = std::mem::take(items)
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect();
        *node = Value::Object(converted);
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map.entry(head.clone()).or_insert(Value::Null);
        insert_path(child, tail, value);
    }
}

/// 키가 정확히 `0..n`인 객체를 배열로 바꿉니다 (재귀).
fn normalize_lists(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sequential = !map.is_empty()
                && (0..map.len()).all(|i| map.contains_key(&i.to_string()));
            if sequential {
                let mut map = map;
                let items = (0..map.len())
                    .filter_map(|i| map.remove(&i.to_string()))
                    .map(normalize_lists)
                    .collect();
                Value::Array(items)
            } else {
                Value::Object(
                    map.into_iter()
                        .map(|(k, v)| (k, normalize_lists(v)))
                        .collect(),
                )
            }
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_lists).collect()),
        other => other,
    }
}
