//! API Routes Module
//!
//! 모든 HTTP 엔드포인트 정의
//!
//! # Routes
//! - `/health` - 헬스 체크
//! - `/api/zk/*` - commitment 생성, 답변 검증, proof 조회

pub mod health;
pub mod zk;
