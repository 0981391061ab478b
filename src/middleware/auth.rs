//! # 호출자(Caller) 식별
//!
//! `Authorization: Bearer <token>` 헤더로 호출자를 식별하고 capability 목록을 불러옵니다.
//! 헤더가 없으면 익명 호출자입니다. 토큰 발급(로그인)은 이 서비스의 범위가 아니며,
//! 같은 비밀키를 공유하는 다른 서비스가 발급한 토큰을 검증만 합니다.

use std::collections::BTreeSet;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{
    db::users as db_users, error::AppError, routes::multiple_post_type::AppState,
    services::registry::Registry,
};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // user id
    pub exp: i64,
    pub iat: i64,
}

/// 현재 요청의 호출자
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Option<String>,
    pub capabilities: BTreeSet<String>,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_capabilities<I, S>(user_id: &str, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user_id: Some(user_id.to_string()),
            capabilities: capabilities.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn can(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    /// 등록되지 않은 타입은 편집 권한이 없는 것으로 봅니다.
    pub fn can_edit(&self, registry: &Registry, post_type: &str) -> bool {
        registry
            .post_type(post_type)
            .is_some_and(|pt| self.can(&pt.edit_cap))
    }

    /// 편집 권한이 없는 첫 번째 타입. 모든 타입을 편집할 수 있으면 `None`.
    pub fn first_type_without_edit<'a>(
        &self,
        registry: &Registry,
        post_types: &'a [String],
    ) -> Option<&'a str> {
        post_types
            .iter()
            .find(|pt| !self.can_edit(registry, pt))
            .map(String::as_str)
    }

    /// 요청된 모든 타입에 대해 편집 권한이 있는지
    pub fn can_edit_all(&self, registry: &Registry, post_types: &[String]) -> bool {
        self.first_type_without_edit(registry, post_types).is_none()
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(header) = parts.headers.get(AUTHORIZATION) else {
            return Ok(Caller::anonymous());
        };

        let token = header
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized("Invalid authorization header".to_string()))?;

        let claims = verify_access_token(token, &state.jwt_secret)?;

        let user = db_users::find_by_id(&state.pool, &claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Unknown user".to_string()))?;
        let capabilities = db_users::capabilities(&state.pool, &user.id).await?;

        tracing::debug!(user = %user.username, caps = capabilities.len(), "resolved caller");

        Ok(Caller {
            user_id: Some(user.id),
            capabilities,
        })
    }
}

pub fn create_access_token(
    user_id: &str,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::minutes(15)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify_access_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::Unauthorized("Authorization token has expired".to_string())
        }
        _ => AppError::Unauthorized("Invalid authorization token".to_string()),
    })?;

    Ok(token_data.claims)
}
