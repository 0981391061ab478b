//! # 레지스트리 모델
//!
//! 콘텐츠 타입(post type)과 택소노미(taxonomy)의 등록 정보입니다.
//! 서버 시작 시 DB에서 한 번 읽어 `services::registry::Registry`에 담고,
//! 요청 처리 중에는 읽기 전용 조회 테이블로만 사용합니다.

use serde::{Deserialize, Serialize};

/// 콘텐츠 타입별 직렬화 방식을 고르는 태그
///
/// 같은 항목이라도 타입 종류에 따라 응답 필드가 달라집니다
/// (예: page는 parent/menu_order, attachment는 mime_type/media_type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostTypeKind {
    Post,
    Page,
    Attachment,
    Custom,
}

impl PostTypeKind {
    /// DB에 저장된 문자열을 변환합니다. 알 수 없는 값은 `Custom`으로 취급합니다.
    pub fn from_db(value: &str) -> Self {
        match value {
            "post" => Self::Post,
            "page" => Self::Page,
            "attachment" => Self::Attachment,
            _ => Self::Custom,
        }
    }
}

/// `post_types` 테이블 한 행
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PostTypeRow {
    pub name: String,
    pub rest_base: Option<String>,
    pub kind: String,
    pub show_in_rest: i64,
    pub edit_cap: String,
    pub read_private_cap: String,
}

/// 등록된 콘텐츠 타입
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostTypeObject {
    pub name: String,
    /// 외부에 노출되는 REST 이름 (없으면 `name`)
    pub rest_base: String,
    pub kind: PostTypeKind,
    pub show_in_rest: bool,
    /// 이 타입의 항목을 편집하는 데 필요한 capability
    pub edit_cap: String,
    /// 비공개 항목을 읽는 데 필요한 capability
    pub read_private_cap: String,
}

impl From<PostTypeRow> for PostTypeObject {
    fn from(row: PostTypeRow) -> Self {
        Self {
            rest_base: row
                .rest_base
                .filter(|base| !base.is_empty())
                .unwrap_or_else(|| row.name.clone()),
            kind: PostTypeKind::from_db(&row.kind),
            show_in_rest: row.show_in_rest != 0,
            name: row.name,
            edit_cap: row.edit_cap,
            read_private_cap: row.read_private_cap,
        }
    }
}

/// `taxonomies` 테이블 한 행
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaxonomyRow {
    pub name: String,
    pub rest_base: Option<String>,
    pub show_in_rest: i64,
}

/// 등록된 택소노미와 연결된 콘텐츠 타입 목록
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxonomyObject {
    pub name: String,
    pub rest_base: Option<String>,
    pub show_in_rest: bool,
    pub object_types: Vec<String>,
}

impl TaxonomyObject {
    /// 요청 파라미터 이름으로 쓰이는 외부 이름: 명시적 REST 별칭, 없으면 식별자
    pub fn base(&self) -> &str {
        match self.rest_base.as_deref() {
            Some(base) if !base.is_empty() => base,
            _ => &self.name,
        }
    }

    /// 주어진 콘텐츠 타입 중 하나라도 이 택소노미에 연결되어 있는지
    pub fn applies_to<S: AsRef<str>>(&self, post_types: &[S]) -> bool {
        post_types
            .iter()
            .any(|t| self.object_types.iter().any(|o| o == t.as_ref()))
    }
}
