//! # 파라미터 스키마 (Parameter Schema)
//!
//! 컬렉션 엔드포인트가 받는 쿼리 파라미터를 선언적으로 정의합니다.
//! 같은 표가 두 곳에 쓰입니다:
//! - 요청 검증/정규화: `ParamSchema::prepare()`
//! - 클라이언트용 스키마 노출: `ParamSchema::describe()` (네임스페이스 인덱스)
//!
//! 택소노미 파라미터는 라우트 등록 시 한 번, 등록된 **모든** 콘텐츠 타입 기준으로 만들어집니다.
//! 요청 처리 시 실제로 필터에 들어가는 택소노미는 요청된 타입 기준으로 다시 계산합니다
//! (`services::query_builder` 참고).
//!
//! 처리 순서:
//! 1. 값이 있는 파라미터마다 타입/enum/형식/범위 검증 (실패는 모아서 한 번에 400)
//! 2. 정규화(sanitize) 후 값이 없는 파라미터에는 기본값 적용
//! 3. 커스텀 검증기 실행 (`status` → 비공개 상태 조회 권한)

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Map, Value};

use crate::{
    error::AppError,
    middleware::auth::Caller,
    models::STATUS_PUBLISHED,
    services::{
        query_args::{parse_date_time, value_as_string, value_as_string_list},
        query_string::QueryString,
        registry::Registry,
    },
};

/// 파라미터 값의 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    /// 정수 ID 목록
    IdList,
    /// 형태가 정해지지 않은 값 (`filter`)
    Any,
}

/// 정규화 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sanitizer {
    None,
    /// 구분자로 나뉜 입력 → 중복 없는 음이 아닌 정수 목록
    IdList,
    /// 음이 아닌 정수
    AbsInt,
    /// 소문자 영숫자, `_`, `-`만 남김
    Key,
}

/// 검증 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validator {
    None,
    /// 선언된 타입/enum/형식/범위 검사
    Schema,
    /// 기본 상태가 아니면 요청된 모든 타입의 편집 권한 필요
    PrivateStatus,
}

/// 파라미터 하나의 선언
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub description: String,
    pub kind: ParamType,
    pub default: Option<Value>,
    pub enum_values: Option<Vec<&'static str>>,
    pub date_time: bool,
    pub minimum: Option<i64>,
    pub maximum: Option<i64>,
    pub sanitize: Sanitizer,
    pub validate: Validator,
}

impl ParamSpec {
    fn new(name: &str, kind: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind,
            default: None,
            enum_values: None,
            date_time: false,
            minimum: None,
            maximum: None,
            sanitize: Sanitizer::None,
            validate: Validator::None,
        }
    }

    fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    fn one_of(mut self, values: &[&'static str]) -> Self {
        self.enum_values = Some(values.to_vec());
        self
    }

    fn date_time(mut self) -> Self {
        self.date_time = true;
        self
    }

    fn range(mut self, minimum: Option<i64>, maximum: Option<i64>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }

    fn sanitize(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitize = sanitizer;
        self
    }

    fn validate(mut self, validator: Validator) -> Self {
        self.validate = validator;
        self
    }

    /// JSON 스키마 형태의 설명
    pub fn describe(&self) -> Value {
        let mut out = Map::new();
        out.insert("description".to_string(), json!(self.description));
        match self.kind {
            ParamType::String => {
                out.insert("type".to_string(), json!("string"));
            }
            ParamType::Integer => {
                out.insert("type".to_string(), json!("integer"));
            }
            ParamType::IdList => {
                out.insert("type".to_string(), json!("array"));
                out.insert("items".to_string(), json!({ "type": "integer" }));
            }
            ParamType::Any => {}
        }
        if let Some(default) = &self.default {
            out.insert("default".to_string(), default.clone());
        }
        if let Some(values) = &self.enum_values {
            out.insert("enum".to_string(), json!(values));
        }
        if self.date_time {
            out.insert("format".to_string(), json!("date-time"));
        }
        if let Some(min) = self.minimum {
            out.insert("minimum".to_string(), json!(min));
        }
        if let Some(max) = self.maximum {
            out.insert("maximum".to_string(), json!(max));
        }
        out.insert("required".to_string(), json!(false));
        Value::Object(out)
    }

    /// 타입 수준 검증. 실패하면 사유를 반환합니다.
    fn check(&self, value: &Value) -> Result<(), String> {
        match self.kind {
            ParamType::Any => Ok(()),
            ParamType::String => {
                let Some(text) = scalar_text(value) else {
                    return Err(format!("{} is not of type string.", self.name));
                };
                if let Some(values) = &self.enum_values {
                    if !values.contains(&text.as_str()) {
                        return Err(format!(
                            "{} is not one of {}.",
                            self.name,
                            values.join(", ")
                        ));
                    }
                }
                if self.date_time && parse_date_time(&text).is_none() {
                    return Err("Invalid date.".to_string());
                }
                Ok(())
            }
            ParamType::Integer => {
                let number = scalar_text(value)
                    .and_then(|text| text.trim().parse::<i64>().ok())
                    .ok_or_else(|| format!("{} is not of type integer.", self.name))?;
                if let Some(min) = self.minimum {
                    if number < min {
                        return Err(format!("{} must be greater than or equal to {min}", self.name));
                    }
                }
                if let Some(max) = self.maximum {
                    if number > max {
                        return Err(format!("{} must be less than or equal to {max}", self.name));
                    }
                }
                Ok(())
            }
            ParamType::IdList => {
                if value.is_object() {
                    return Err(format!("{} is not of type array.", self.name));
                }
                let all_integers = value_as_string_list(value)
                    .iter()
                    .all(|item| item.trim().parse::<i64>().is_ok());
                if all_integers {
                    Ok(())
                } else {
                    Err(format!("{}[] is not of type integer.", self.name))
                }
            }
        }
    }

    fn apply_sanitizer(&self, value: &Value) -> Value {
        match self.sanitize {
            Sanitizer::None => match self.kind {
                ParamType::Integer => scalar_text(value)
                    .and_then(|t| t.trim().parse::<i64>().ok())
                    .map_or_else(|| value.clone(), |n| json!(n)),
                _ => value.clone(),
            },
            Sanitizer::IdList => json!(parse_id_list(value)),
            Sanitizer::AbsInt => json!(scalar_text(value)
                .and_then(|t| t.trim().parse::<i64>().ok())
                .map(i64::unsigned_abs)
                .unwrap_or(0)),
            Sanitizer::Key => json!(sanitize_key(&scalar_text(value).unwrap_or_default())),
        }
    }
}

/// 구분자로 나뉜 입력 또는 배열 → 입력 순서를 유지한 중복 없는 음이 아닌 정수 목록.
/// 숫자가 아닌 항목은 버립니다.
pub fn parse_id_list(value: &Value) -> Vec<u64> {
    let mut seen = BTreeSet::new();
    value_as_string_list(value)
        .iter()
        .filter_map(|item| item.trim().parse::<i64>().ok())
        .map(i64::unsigned_abs)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// 소문자로 바꾸고 `[a-z0-9_-]` 외의 문자를 제거합니다.
pub fn sanitize_key(raw: &str) -> String {
    raw.to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Array(_) | Value::Object(_) | Value::Null => None,
        other => value_as_string(other),
    }
}

/// 검증/정규화가 끝난 요청 파라미터
///
/// 스키마에 선언된 파라미터는 정규화된 값(또는 기본값)을, 선언되지 않은 파라미터
/// (`type`, `_fields`, `acf_format` 등)는 디코딩된 원본 값을 그대로 가집니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParams {
    values: Map<String, Value>,
    query: QueryString,
}

impl RequestParams {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).filter(|v| !v.is_null())
    }

    /// 원본 쿼리 문자열 (페이지네이션 링크용)
    pub fn query(&self) -> &QueryString {
        &self.query
    }

    /// `type` 파라미터가 문자열 목록이면 그 목록
    pub fn requested_types(&self) -> Option<Vec<String>> {
        match self.get("type") {
            Some(Value::Array(items)) => Some(items.iter().filter_map(value_as_string).collect()),
            _ => None,
        }
    }

    /// 이미 정규화된 값으로 직접 만듭니다 (테스트와 내부 호출용).
    pub fn from_values(values: Map<String, Value>) -> Self {
        Self {
            values,
            query: QueryString::default(),
        }
    }
}

/// 컬렉션 엔드포인트의 파라미터 표
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSchema {
    params: Vec<ParamSpec>,
}

impl ParamSchema {
    /// 고정 파라미터 + 등록된 모든 타입 기준 택소노미 파라미터
    pub fn collection_params(registry: &Registry) -> Self {
        let mut params = vec![
            ParamSpec::new("context", ParamType::String, "Scope under which the request is made; determines fields present in response.")
                .default(json!("view"))
                .one_of(&["view", "embed", "edit"])
                .sanitize(Sanitizer::Key)
                .validate(Validator::Schema),
            ParamSpec::new("page", ParamType::Integer, "Current page of the collection.")
                .default(json!(1))
                .range(Some(1), None)
                .sanitize(Sanitizer::AbsInt)
                .validate(Validator::Schema),
            ParamSpec::new("per_page", ParamType::Integer, "Maximum number of items to be returned in result set.")
                .default(json!(10))
                .range(Some(1), Some(100))
                .sanitize(Sanitizer::AbsInt)
                .validate(Validator::Schema),
            ParamSpec::new("search", ParamType::String, "Limit results to those matching a string.")
                .validate(Validator::Schema),
            ParamSpec::new("after", ParamType::String, "Limit response to resources published after a given ISO8601 compliant date.")
                .date_time()
                .validate(Validator::Schema),
            ParamSpec::new("author", ParamType::IdList, "Limit result set to posts assigned to specific authors.")
                .default(json!([]))
                .sanitize(Sanitizer::IdList)
                .validate(Validator::Schema),
            ParamSpec::new("author_exclude", ParamType::IdList, "Ensure result set excludes posts assigned to specific authors.")
                .default(json!([]))
                .sanitize(Sanitizer::IdList)
                .validate(Validator::Schema),
            ParamSpec::new("before", ParamType::String, "Limit response to resources published before a given ISO8601 compliant date.")
                .date_time()
                .validate(Validator::Schema),
            ParamSpec::new("exclude", ParamType::IdList, "Ensure result set excludes specific ids.")
                .default(json!([]))
                .sanitize(Sanitizer::IdList),
            ParamSpec::new("include", ParamType::IdList, "Limit result set to specific ids.")
                .default(json!([]))
                .sanitize(Sanitizer::IdList),
            ParamSpec::new("menu_order", ParamType::Integer, "Limit result set to resources with a specific menu_order value.")
                .sanitize(Sanitizer::AbsInt)
                .validate(Validator::Schema),
            ParamSpec::new("offset", ParamType::Integer, "Offset the result set by a specific number of items.")
                .sanitize(Sanitizer::AbsInt)
                .validate(Validator::Schema),
            ParamSpec::new("order", ParamType::String, "Order sort attribute ascending or descending.")
                .default(json!("desc"))
                .one_of(&["asc", "desc"])
                .validate(Validator::Schema),
            ParamSpec::new("orderby", ParamType::String, "Sort collection by object attribute.")
                .default(json!("date"))
                .one_of(&["date", "id", "include", "title", "slug", "menu_order"])
                .validate(Validator::Schema),
            ParamSpec::new("parent", ParamType::IdList, "Limit result set to those of particular parent ids.")
                .default(json!([]))
                .sanitize(Sanitizer::IdList),
            ParamSpec::new("parent_exclude", ParamType::IdList, "Limit result set to all items except those of a particular parent id.")
                .default(json!([]))
                .sanitize(Sanitizer::IdList),
            ParamSpec::new("slug", ParamType::String, "Limit result set to posts with a specific slug.")
                .validate(Validator::Schema),
            ParamSpec::new("status", ParamType::String, "Limit result set to posts assigned a specific status.")
                .default(json!(STATUS_PUBLISHED))
                .sanitize(Sanitizer::Key)
                .validate(Validator::PrivateStatus),
            ParamSpec::new("filter", ParamType::Any, "Use query arguments to modify the response; private query vars require appropriate authorization."),
        ];

        for taxonomy in registry.all_rest_taxonomies() {
            let base = taxonomy.base();
            let spec = ParamSpec::new(
                base,
                ParamType::IdList,
                &format!(
                    "Limit result set to all items that have the specified term assigned in the {base} taxonomy."
                ),
            )
            .default(json!([]))
            .sanitize(Sanitizer::IdList);

            match params.iter().position(|p| p.name == base) {
                Some(index) => {
                    tracing::warn!(taxonomy = %taxonomy.name, "taxonomy rest base shadows a collection parameter");
                    params[index] = spec;
                }
                None => params.push(spec),
            }
        }

        Self { params }
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// 파라미터 이름 → JSON 스키마
    pub fn describe(&self) -> Value {
        Value::Object(
            self.params
                .iter()
                .map(|p| (p.name.clone(), p.describe()))
                .collect(),
        )
    }

    /// 요청 파라미터를 검증하고 정규화합니다.
    pub fn prepare(
        &self,
        query: QueryString,
        caller: &Caller,
        registry: &Registry,
    ) -> Result<RequestParams, AppError> {
        let mut values = query.params.clone();
        let mut invalid = BTreeMap::new();

        for spec in &self.params {
            match query.get(&spec.name) {
                Some(raw) => {
                    if spec.validate == Validator::Schema {
                        if let Err(reason) = spec.check(raw) {
                            invalid.insert(spec.name.clone(), reason);
                            continue;
                        }
                    }
                    values.insert(spec.name.clone(), spec.apply_sanitizer(raw));
                }
                None => {
                    if let Some(default) = &spec.default {
                        values.insert(spec.name.clone(), default.clone());
                    }
                }
            }
        }

        if !invalid.is_empty() {
            tracing::debug!(params = ?invalid.keys().collect::<Vec<_>>(), "rejected request parameters");
            return Err(AppError::InvalidParams(invalid));
        }

        let params = RequestParams { values, query };

        // 상태 검사는 정규화 전의 원본 값으로 합니다.
        // `Published`처럼 정규화하면 기본 상태가 되는 값도 권한 검사를 거칩니다.
        for spec in &self.params {
            if spec.validate == Validator::PrivateStatus {
                let value = params
                    .query()
                    .get(&spec.name)
                    .and_then(value_as_string)
                    .or_else(|| params.get(&spec.name).and_then(value_as_string));
                if let Some(value) = value {
                    validate_status(&value, &params, caller, registry)?;
                }
            }
        }

        Ok(params)
    }
}

/// 기본 공개 상태는 항상 허용합니다. 그 외 상태는 요청된 모든 타입의 편집 권한이 필요하며,
/// 권한이 없는 첫 번째 타입을 에러에 담습니다.
///
/// `type`이 목록이 아니면 여기서는 통과시키고 필터 생성 단계의 422 에러에 맡깁니다.
pub fn validate_status(
    status: &str,
    params: &RequestParams,
    caller: &Caller,
    registry: &Registry,
) -> Result<(), AppError> {
    if status == STATUS_PUBLISHED {
        return Ok(());
    }
    let Some(types) = params.requested_types() else {
        return Ok(());
    };
    match caller.first_type_without_edit(registry, &types) {
        Some(post_type) => Err(AppError::ForbiddenStatus {
            post_type: post_type.to_string(),
            authenticated: caller.is_authenticated(),
        }),
        None => Ok(()),
    }
}
