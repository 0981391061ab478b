//! # 확장 지점 (hooks)
//!
//! 외부 협력자가 필터 생성 과정에 끼어들 수 있는 등록식 확장 지점입니다.
//! 기본값(`QueryHooks::default()`)은 아무것도 하지 않습니다.
//!
//! - 쿼리 필터: 허용 목록 적용 직전의 구조화 필터 전체를 변환 (등록 순서대로 실행)
//! - 변수 변환: 허용 목록을 통과한 특정 키의 값을 변환
//! - 허용 변수 집합 변경: 공개 / 권한자 전용 / 최종 허용 집합을 각각 수정

use std::{collections::BTreeSet, fmt, sync::Arc};

use serde_json::Value;

use crate::services::{params::RequestParams, query_args::QueryArgs};

pub type QueryFilter = Arc<dyn Fn(QueryArgs, &RequestParams) -> QueryArgs + Send + Sync>;
pub type VarTransform = Arc<dyn Fn(Value) -> Value + Send + Sync>;
pub type VarSetHook = Arc<dyn Fn(&mut BTreeSet<String>) + Send + Sync>;

#[derive(Clone, Default)]
pub struct QueryHooks {
    query_filters: Vec<QueryFilter>,
    var_transforms: Vec<(String, VarTransform)>,
    public_vars: Vec<VarSetHook>,
    private_vars: Vec<VarSetHook>,
    allowed_vars: Vec<VarSetHook>,
}

impl QueryHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_query<F>(mut self, f: F) -> Self
    where
        F: Fn(QueryArgs, &RequestParams) -> QueryArgs + Send + Sync + 'static,
    {
        self.query_filters.push(Arc::new(f));
        self
    }

    pub fn on_var<F>(mut self, key: &str, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.var_transforms.push((key.to_string(), Arc::new(f)));
        self
    }

    pub fn on_public_vars<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut BTreeSet<String>) + Send + Sync + 'static,
    {
        self.public_vars.push(Arc::new(f));
        self
    }

    pub fn on_private_vars<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut BTreeSet<String>) + Send + Sync + 'static,
    {
        self.private_vars.push(Arc::new(f));
        self
    }

    pub fn on_allowed_vars<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut BTreeSet<String>) + Send + Sync + 'static,
    {
        self.allowed_vars.push(Arc::new(f));
        self
    }

    pub fn apply_query(&self, args: QueryArgs, params: &RequestParams) -> QueryArgs {
        self.query_filters
            .iter()
            .fold(args, |acc, filter| filter(acc, params))
    }

    pub fn apply_var(&self, key: &str, value: Value) -> Value {
        self.var_transforms
            .iter()
            .filter(|(k, _)| k == key)
            .fold(value, |acc, (_, transform)| transform(acc))
    }

    pub fn apply_public_vars(&self, vars: &mut BTreeSet<String>) {
        self.public_vars.iter().for_each(|hook| hook(vars));
    }

    pub fn apply_private_vars(&self, vars: &mut BTreeSet<String>) {
        self.private_vars.iter().for_each(|hook| hook(vars));
    }

    pub fn apply_allowed_vars(&self, vars: &mut BTreeSet<String>) {
        self.allowed_vars.iter().for_each(|hook| hook(vars));
    }
}

impl fmt::Debug for QueryHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryHooks")
            .field("query_filters", &self.query_filters.len())
            .field(
                "var_transforms",
                &self.var_transforms.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            )
            .field("public_vars", &self.public_vars.len())
            .field("private_vars", &self.private_vars.len())
            .field("allowed_vars", &self.allowed_vars.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_filters_run_in_registration_order() {
        let hooks = QueryHooks::new()
            .on_query(|mut args, _| {
                args.insert("s", json!("first"));
                args
            })
            .on_query(|mut args, _| {
                let previous = args.str("s").unwrap_or_default();
                args.insert("s", json!(format!("{previous}+second")));
                args
            });
        let args = hooks.apply_query(QueryArgs::new(), &RequestParams::default());
        assert_eq!(args.str("s").as_deref(), Some("first+second"));
    }

    #[test]
    fn var_transforms_only_touch_their_key() {
        let hooks = QueryHooks::new().on_var("posts_per_page", |v| {
            json!(v.as_i64().unwrap_or(0).min(50))
        });
        assert_eq!(hooks.apply_var("posts_per_page", json!(500)), json!(50));
        assert_eq!(hooks.apply_var("offset", json!(500)), json!(500));
    }
}
