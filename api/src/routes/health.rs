//! Health Check Endpoint
//!
//! # Interview Q&A
//!
//! Q: Health check 엔드포인트는 왜 필요한가?
//! A: 3가지 용도
//!    1. 로드밸런서 헬스체크 (ALB, nginx)
//!    2. Kubernetes liveness/readiness probe
//!    3. 모니터링 시스템 연동
//!
//! Q: 무엇을 체크하는가?
//! A: "깊은 헬스체크"(deep health check) 패턴
//!    - DB: 쿼리 가능 여부 + latency
//!    - Ledger: 최신 block, oracle 잔고 (잔고 0이면 anchor 불가)
//!    - Prover: 사용 중인 backend 이름

use axum::{extract::State, Json};
use serde::Serialize;

use crate::services::LedgerHealth;
use crate::AppState;

/// Health check 응답
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: DatabaseStatus,
    pub ledger: LedgerStatus,
    pub prover: String,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct DatabaseStatus {
    pub connected: bool,
    pub latency_ms: Option<u64>,
}

#[derive(Serialize)]
pub struct LedgerStatus {
    pub connected: bool,
    #[serde(flatten)]
    pub details: Option<LedgerHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /health
///
/// 서버 및 의존성 상태 확인
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    // DB 연결 테스트
    let db_start = std::time::Instant::now();
    let db_status = match state.db.health_check().await {
        Ok(_) => DatabaseStatus {
            connected: true,
            latency_ms: Some(db_start.elapsed().as_millis() as u64),
        },
        Err(_) => DatabaseStatus {
            connected: false,
            latency_ms: None,
        },
    };

    let ledger_status = match state.ledger.health().await {
        Ok(health) => LedgerStatus {
            connected: true,
            details: Some(health),
            error: None,
        },
        Err(e) => {
            tracing::warn!("Ledger health probe failed: {}", e);
            LedgerStatus {
                connected: false,
                details: None,
                error: Some(e.to_string()),
            }
        }
    };

    let healthy = db_status.connected && ledger_status.connected;

    Json(HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: db_status,
        ledger: ledger_status,
        prover: state.oracle.prover().backend_name().to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
