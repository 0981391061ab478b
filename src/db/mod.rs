//! # 데이터베이스 접근 계층 (Data Access Layer)
//!
//! SQLite와 직접 상호작용하는 코드를 모아둔 모듈입니다.
//!
//! 각 하위 모듈:
//! - `posts`: 구조화 필터를 실행하는 콘텐츠 저장소 (`SqliteContentStore`)
//! - `registry`: 콘텐츠 타입/택소노미 레지스트리 로딩
//! - `users`: 호출자 조회와 capability 목록

pub mod posts;
pub mod registry;
pub mod users;

pub use posts::SqliteContentStore;
pub use registry::load_registry;
