//! # 항목 직렬화 (PostController)
//!
//! 콘텐츠 항목 하나를 외부 표현(JSON)으로 바꿉니다. 타입 종류(`PostTypeKind`)에 따라
//! 필드 구성이 달라지며, 같은 컨트롤러가 항목별 읽기 권한 검사도 맡습니다.
//!
//! 컬렉션 응답의 항목 표현 = 단일 항목 표현 + `_links` + `primary_image`.

use serde_json::{json, Map, Value};

use crate::{
    config::Config,
    error::AppError,
    middleware::auth::Caller,
    models::{Post, PostTypeKind, PostTypeObject, STATUS_PUBLISHED},
    services::{query_args::value_as_string_list, registry::Registry, store::ContentStore},
};

/// 응답 필드 구성을 정하는 요청 범위
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Context {
    #[default]
    View,
    Embed,
    Edit,
}

impl Context {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("embed") => Self::Embed,
            Some("edit") => Self::Edit,
            _ => Self::View,
        }
    }
}

/// `embed` 범위에서 남기는 필드
const EMBED_FIELDS: &[&str] = &["id", "date", "slug", "type", "link", "title", "author", "excerpt"];

/// 항목별 외부 필드 이름
pub const PRIMARY_IMAGE_FIELD: &str = "primary_image";

/// 직렬화 옵션 (요청마다 한 번 만들어 모든 항목에 재사용)
#[derive(Debug, Clone, Default)]
pub struct SerializeOptions {
    pub context: Context,
    /// `_fields`: 비어 있으면 전체 필드
    pub fields: Vec<String>,
}

impl SerializeOptions {
    pub fn new(context: Option<&str>, fields: Option<&Value>) -> Self {
        Self {
            context: Context::parse(context),
            fields: fields
                .map(value_as_string_list)
                .unwrap_or_default()
                .into_iter()
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect(),
        }
    }
}

/// 타입별 컨트롤러
#[derive(Debug, Clone, Copy)]
pub struct PostController<'a> {
    post_type: &'a PostTypeObject,
    registry: &'a Registry,
    config: &'a Config,
}

impl<'a> PostController<'a> {
    /// 항목의 타입이 등록되어 있지 않으면 `None`
    pub fn for_post(registry: &'a Registry, config: &'a Config, post: &Post) -> Option<Self> {
        registry.post_type(&post.post_type).map(|post_type| Self {
            post_type,
            registry,
            config,
        })
    }

    /// 항목을 읽을 수 있는지
    ///
    /// - 외부 조회가 허용되지 않은 타입은 항상 거부
    /// - 공개 상태와 `inherit`는 누구나
    /// - `private`는 비공개 읽기 권한
    /// - 그 외 상태(draft 등)는 편집 권한
    pub fn check_read_permission(&self, post: &Post, caller: &Caller) -> bool {
        if !self.post_type.show_in_rest {
            return false;
        }
        match post.status.as_str() {
            STATUS_PUBLISHED | "inherit" => true,
            "private" => caller.can(&self.post_type.read_private_cap),
            _ => caller.can(&self.post_type.edit_cap),
        }
    }

    /// 단일 항목 표현
    pub async fn prepare_item(
        &self,
        post: &Post,
        caller: &Caller,
        options: &SerializeOptions,
        store: &dyn ContentStore,
    ) -> Result<Value, AppError> {
        let edit = options.context == Context::Edit && caller.can(&self.post_type.edit_cap);
        let mut data = Map::new();

        data.insert("id".to_string(), json!(post.id));
        data.insert("date".to_string(), json!(post.published_at));
        data.insert("modified".to_string(), json!(post.modified_at));
        data.insert("slug".to_string(), json!(post.slug));
        data.insert("status".to_string(), json!(post.status));
        data.insert("type".to_string(), json!(post.post_type));
        data.insert(
            "link".to_string(),
            json!(format!("{}/?p={}", self.config.public_url, post.id)),
        );
        data.insert("title".to_string(), rendered(&post.title, edit));
        data.insert("author".to_string(), json!(post.author_id));

        match self.post_type.kind {
            PostTypeKind::Post | PostTypeKind::Custom | PostTypeKind::Page => {
                data.insert("content".to_string(), protected(&post.content, edit));
                data.insert("excerpt".to_string(), protected(&post.excerpt, edit));
            }
            PostTypeKind::Attachment => {
                data.insert("caption".to_string(), rendered(&post.excerpt, edit));
                data.insert("description".to_string(), rendered(&post.content, edit));
                let mime = post.mime_type.clone().unwrap_or_default();
                let media_type = if mime.starts_with("image/") { "image" } else { "file" };
                data.insert("media_type".to_string(), json!(media_type));
                data.insert("mime_type".to_string(), json!(mime));
                data.insert(
                    "post".to_string(),
                    if post.parent_id > 0 {
                        json!(post.parent_id)
                    } else {
                        Value::Null
                    },
                );
            }
        }
        match self.post_type.kind {
            PostTypeKind::Post => {
                data.insert("sticky".to_string(), json!(post.is_sticky != 0));
            }
            PostTypeKind::Page => {
                data.insert("parent".to_string(), json!(post.parent_id));
                data.insert("menu_order".to_string(), json!(post.menu_order));
            }
            PostTypeKind::Attachment | PostTypeKind::Custom => {}
        }

        for taxonomy in self.registry.rest_taxonomies_for(&[post.post_type.as_str()]) {
            let terms = store.post_terms(post.id, &taxonomy.name).await?;
            data.insert(taxonomy.base().to_string(), json!(terms));
        }

        if options.context == Context::Embed {
            data.retain(|key, _| EMBED_FIELDS.contains(&key.as_str()));
        }

        Ok(Value::Object(data))
    }

    /// 항목의 `_links`
    pub fn links(&self, post: &Post) -> Value {
        let root = format!(
            "{}{}{}",
            self.config.public_url,
            self.config.api_root,
            self.config.namespace_path()
        );
        let base = &self.post_type.rest_base;
        json!({
            "self": [{ "href": format!("{root}/{base}/{}", post.id) }],
            "collection": [{ "href": format!("{root}/{base}") }],
            "about": [{ "href": format!("{root}/types/{}", self.post_type.name) }],
            "author": [{ "embeddable": true, "href": format!("{root}/users/{}", post.author_id) }],
        })
    }

    /// 컬렉션 응답에 들어가는 항목 표현
    pub async fn prepare_collection_item(
        &self,
        post: &Post,
        caller: &Caller,
        options: &SerializeOptions,
        store: &dyn ContentStore,
    ) -> Result<Value, AppError> {
        let item = self.prepare_item(post, caller, options, store).await?;
        let mut item = match filter_fields(item, &options.fields) {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let primary_image = store
            .get_field(post.id, PRIMARY_IMAGE_FIELD)
            .await?
            .unwrap_or(Value::Null);
        item.insert(PRIMARY_IMAGE_FIELD.to_string(), primary_image);

        if options.fields.is_empty() || options.fields.iter().any(|f| f == "_links") {
            item.insert("_links".to_string(), self.links(post));
        }
        Ok(Value::Object(item))
    }
}

fn rendered(text: &str, raw: bool) -> Value {
    if raw {
        json!({ "raw": text, "rendered": text })
    } else {
        json!({ "rendered": text })
    }
}

fn protected(text: &str, raw: bool) -> Value {
    let mut value = rendered(text, raw);
    if let Value::Object(map) = &mut value {
        map.insert("protected".to_string(), json!(false));
    }
    value
}

/// `_fields` 목록만 남깁니다. `title.rendered`처럼 점으로 중첩 필드를 고를 수 있습니다.
pub fn filter_fields(item: Value, fields: &[String]) -> Value {
    if fields.is_empty() {
        return item;
    }
    let Value::Object(source) = item else {
        return item;
    };

    let mut out = Map::new();
    for field in fields {
        let path: Vec<&str> = field.split('.').collect();
        copy_path(&source, &mut out, &path);
    }
    Value::Object(out)
}

fn copy_path(source: &Map<String, Value>, target: &mut Map<String, Value>, path: &[&str]) {
    let Some((head, rest)) = path.split_first() else {
        return;
    };
    let Some(value) = source.get(*head) else {
        return;
    };
    if rest.is_empty() {
        target.insert(head.to_string(), value.clone());
        return;
    }
    let Value::Object(child_source) = value else {
        return;
    };
    let entry = target
        .entry(head.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(child_target) = entry {
        copy_path(child_source, child_target, rest);
    }
}
