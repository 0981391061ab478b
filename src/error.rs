//! # 에러 처리 모듈
//!
//! 애플리케이션에서 발생할 수 있는 모든 에러 타입을 정의합니다.
//!
//! 이 모듈의 핵심:
//! - `AppError` 열거형(enum): 모든 에러 종류를 하나의 타입으로 통합
//! - `IntoResponse` 구현: 에러를 HTTP 응답으로 자동 변환
//!
//! 응답 본문 형태:
//! `{ "error": { "code": "...", "message": "...", "data": { ... } } }`
//! (`data`는 추가 정보가 있는 에러에만 포함됩니다)

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

/// 애플리케이션에서 발생할 수 있는 모든 에러 종류
///
/// 핸들러에서 `Result<T, AppError>`를 반환하면,
/// Axum이 자동으로 `IntoResponse`를 호출하여 HTTP 응답으로 변환합니다.
#[derive(Debug, Error)]
pub enum AppError {
    /// `type` 파라미터가 없거나 배열이 아님 (HTTP 422)
    #[error(
        "The type parameter is required and must be an array, e.g. &type[]=post&type[]=page"
    )]
    TypeNeedToBeArray,

    /// 파라미터 스키마 검증 실패 (HTTP 400)
    /// 키는 파라미터 이름, 값은 실패 사유입니다.
    #[error("Invalid parameter(s): {}", .0.keys().cloned().collect::<Vec<_>>().join(", "))]
    InvalidParams(BTreeMap<String, String>),

    /// 권한 없이 기본값이 아닌 상태(status)를 요청함
    /// 익명 호출자는 401, 로그인한 호출자는 403입니다.
    #[error("Status is forbidden")]
    ForbiddenStatus {
        post_type: String,
        authenticated: bool,
    },

    /// 인증 토큰이 유효하지 않음 (HTTP 401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 서버 내부 오류 (HTTP 500)
    #[error("Internal error: {0}")]
    Internal(String),

    /// 데이터베이스 오류 (HTTP 500)
    /// #[from]: sqlx 함수에서 `?`를 쓰면 자동으로 AppError::Database로 변환됩니다.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    /// 클라이언트에 노출되는 기계 판독용 에러 코드
    pub fn code(&self) -> &'static str {
        match self {
            AppError::TypeNeedToBeArray => "type_need_to_be_array",
            AppError::InvalidParams(_) => "rest_invalid_param",
            AppError::ForbiddenStatus { .. } => "rest_forbidden_status",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Internal(_) => "internal_error",
            AppError::Database(_) => "database_error",
        }
    }

    /// 에러에 대응하는 HTTP 상태 코드
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::TypeNeedToBeArray => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidParams(_) => StatusCode::BAD_REQUEST,
            AppError::ForbiddenStatus { authenticated, .. } => {
                if *authenticated {
                    StatusCode::FORBIDDEN
                } else {
                    StatusCode::UNAUTHORIZED
                }
            }
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    /// AppError를 HTTP 응답으로 변환합니다.
    ///
    /// 내부 에러(Database, Internal)는 실제 에러 내용을 로그에만 기록하고,
    /// 클라이언트에는 일반적인 메시지만 반환합니다.
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let (message, data) = match self {
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                ("An internal error occurred".to_string(), None)
            }
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                ("A database error occurred".to_string(), None)
            }
            AppError::InvalidParams(ref params) => (
                self.to_string(),
                Some(json!({ "status": status.as_u16(), "params": params })),
            ),
            AppError::ForbiddenStatus { ref post_type, .. } => (
                self.to_string(),
                Some(json!({ "status": status.as_u16(), "post_type": post_type })),
            ),
            _ => (self.to_string(), None),
        };

        let mut error = json!({
            "code": code,
            "message": message,
        });
        if let (Some(data), Value::Object(map)) = (data, &mut error) {
            map.insert("data".to_string(), data);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_status_depends_on_authentication() {
        let anonymous = AppError::ForbiddenStatus {
            post_type: "page".to_string(),
            authenticated: false,
        };
        let logged_in = AppError::ForbiddenStatus {
            post_type: "page".to_string(),
            authenticated: true,
        };
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(logged_in.status(), StatusCode::FORBIDDEN);
        assert_eq!(logged_in.code(), "rest_forbidden_status");
    }

    #[test]
    fn invalid_params_message_lists_names() {
        let mut params = BTreeMap::new();
        params.insert("per_page".to_string(), "must be at least 1".to_string());
        params.insert("after".to_string(), "invalid date".to_string());
        let err = AppError::InvalidParams(params);
        assert_eq!(err.to_string(), "Invalid parameter(s): after, per_page");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn type_error_is_unprocessable() {
        assert_eq!(
            AppError::TypeNeedToBeArray.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(AppError::TypeNeedToBeArray.code(), "type_need_to_be_array");
    }
}
