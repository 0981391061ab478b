//! # 콘텐츠 타입 / 택소노미 레지스트리
//!
//! 프로세스 전역 조회 테이블입니다. 서버 시작 시 `db::load_registry()`로 채워지고
//! 이후에는 `Arc<Registry>`로 공유되며 절대 수정되지 않습니다.
//! 요청마다 필요한 부분집합(요청된 타입에 연결된 택소노미)은 매번 새로 계산합니다.

use std::collections::BTreeMap;

use crate::models::{PostTypeObject, TaxonomyObject};

#[derive(Debug, Clone, Default)]
pub struct Registry {
    post_types: BTreeMap<String, PostTypeObject>,
    taxonomies: Vec<TaxonomyObject>,
}

impl Registry {
    pub fn new(post_types: Vec<PostTypeObject>, taxonomies: Vec<TaxonomyObject>) -> Self {
        Self {
            post_types: post_types
                .into_iter()
                .map(|pt| (pt.name.clone(), pt))
                .collect(),
            taxonomies,
        }
    }

    pub fn post_type(&self, name: &str) -> Option<&PostTypeObject> {
        self.post_types.get(name)
    }

    /// 등록된 모든 콘텐츠 타입 이름 (정렬됨)
    pub fn post_type_names(&self) -> Vec<String> {
        self.post_types.keys().cloned().collect()
    }

    /// 주어진 타입들에 연결되어 있고 외부 조회가 허용된(`show_in_rest`) 택소노미
    ///
    /// 타입 하나라도 연결되어 있으면 포함되며, 결과에 중복은 없습니다.
    pub fn rest_taxonomies_for<S: AsRef<str>>(&self, post_types: &[S]) -> Vec<&TaxonomyObject> {
        self.taxonomies
            .iter()
            .filter(|tax| tax.show_in_rest && tax.applies_to(post_types))
            .collect()
    }

    /// 등록된 모든 콘텐츠 타입 기준의 외부 조회 가능 택소노미 (스키마 문서화용)
    pub fn all_rest_taxonomies(&self) -> Vec<&TaxonomyObject> {
        let names = self.post_type_names();
        self.rest_taxonomies_for(&names)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::registry;

    #[test]
    fn shared_taxonomy_is_listed_once() {
        let registry = registry();
        let names: Vec<&str> = registry
            .rest_taxonomies_for(&["post", "event"])
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, vec!["category", "post_tag"]);
    }

    #[test]
    fn hidden_taxonomies_are_excluded() {
        let registry = registry();
        assert!(registry
            .rest_taxonomies_for(&["event"])
            .iter()
            .all(|t| t.name != "genre"));
    }

    #[test]
    fn unrelated_types_have_no_taxonomies() {
        let registry = registry();
        assert!(registry.rest_taxonomies_for(&["page"]).is_empty());
        assert_eq!(registry.all_rest_taxonomies().len(), 2);
    }
}
