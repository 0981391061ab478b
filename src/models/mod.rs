//! # 데이터 모델 모듈
//!
//! 애플리케이션에서 사용하는 데이터 구조체(struct)들을 정의합니다.
//! - `post`: 콘텐츠 저장소의 항목(Post) 한 행
//! - `registry`: 콘텐츠 타입과 택소노미 등록 정보
//! - `user`: 사용자와 capability 행
//!
//! `pub use X::*;`로 재공개하여 `crate::models::Post`처럼 짧게 접근합니다.

pub mod post;
pub mod registry;
pub mod user;

pub use post::*;
pub use registry::*;
pub use user::*;
