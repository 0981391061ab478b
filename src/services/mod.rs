//! # 서비스 계층
//!
//! 요청 하나의 처리 흐름: 쿼리 문자열 디코딩 → 파라미터 검증 → 필터 생성 →
//! 저장소 실행(필요하면 건수 보정) → 응답 조립.
//!
//! - `query_string`: 대괄호 문법 쿼리 문자열 디코딩
//! - `params`: 파라미터 스키마와 검증/정규화, 상태 검증
//! - `query_args`: 구조화 필터와 값 해석 도우미
//! - `query_builder`: 요청 파라미터 → 구조화 필터 (허용 목록 적용)
//! - `hooks`: 필터 생성 확장 지점
//! - `store`: 콘텐츠 저장소 인터페이스
//! - `executor`: 실행과 페이지네이션 보정
//! - `serializer`: 타입별 항목 직렬화와 읽기 권한
//! - `response`: 헤더/링크/본문 조립
//! - `registry`: 콘텐츠 타입/택소노미 조회 테이블

pub mod executor;
pub mod hooks;
pub mod params;
pub mod query_args;
pub mod query_builder;
pub mod query_string;
pub mod registry;
pub mod response;
pub mod serializer;
pub mod store;
