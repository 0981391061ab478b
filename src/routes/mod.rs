//! # 라우트 핸들러 모듈
//!
//! 각 하위 모듈:
//! - `multiple_post_type`: 다중 타입 컬렉션 조회와 공유 상태(`AppState`)
//! - `namespace`: 네임스페이스 인덱스 (라우트와 파라미터 스키마)
//! - `health`: 서버 상태 확인 (헬스체크)

pub mod health;
pub mod multiple_post_type;
pub mod namespace;

pub use health::*;
pub use multiple_post_type::*;
pub use namespace::*;
