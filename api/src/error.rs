//! Error Handling Module
//!
//! Provides type-safe error handling with proper HTTP status code mapping.
//! `OracleError` is the workflow taxonomy; `ApiError` is its HTTP projection.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::services::{ArchiveError, LedgerError, ProverError};

/// Workflow 에러
///
/// # Design Decision
///
/// - InvalidInput / NotFound / InProgress: 부수 효과 없이 실패
/// - ProofGeneration / LocalVerification: persistence 이전에 중단
/// - Ledger: 가장 구체적인 메시지 (revert reason) 유지
/// - Persistence: anchor는 확정되었을 수 있음, workflow 재실행으로 복구
/// - Archive 업로드 실패는 에러가 아님 (조회 실패만 여기로)
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} is already being processed")]
    InProgress(String),

    #[error("proof generation failed: {0}")]
    ProofGeneration(#[from] ProverError),

    #[error("local verification rejected the {0} proof")]
    LocalVerification(&'static str),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("ledger anchoring failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("persistence failed: {0}")]
    Persistence(String),
}

impl From<anyhow::Error> for OracleError {
    fn from(err: anyhow::Error) -> Self {
        OracleError::Persistence(format!("{:#}", err))
    }
}

/// API 에러 타입
///
/// # Design Decision
///
/// 각 에러 variant는 적절한 HTTP 상태 코드에 매핑됨
/// - 클라이언트 에러: 4xx (잘못된 요청, 존재하지 않는 리소스)
/// - 서버 에러: 5xx (proof, 외부 서비스, DB)
///
/// DB 등 내부 정보는 클라이언트에 노출하지 않음
#[derive(Debug, Error)]
pub enum ApiError {
    // ============ 400 Bad Request ============
    #[error("Invalid request: {0}")]
    BadRequest(String),

    // ============ 404 Not Found ============
    #[error("Resource not found: {0}")]
    NotFound(String),

    // ============ 409 Conflict ============
    #[error("Conflict: {0}")]
    Conflict(String),

    // ============ 500 Internal Server Error ============
    #[error("Proof generation failed: {0}")]
    ProofGenerationFailed(String),

    #[error("Proof self-verification failed: {0}")]
    ProofVerificationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    // ============ 502 Bad Gateway ============
    #[error("Ledger error: {0}")]
    LedgerError(String),

    #[error("Archive error: {0}")]
    ArchiveError(String),
}

/// API 에러 응답 구조
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            // 4xx 클라이언트 에러
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                msg.clone(),
                None,
            ),
            ApiError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{} not found", resource),
                None,
            ),
            ApiError::Conflict(msg) => (
                StatusCode::CONFLICT,
                "IN_PROGRESS",
                msg.clone(),
                None,
            ),

            // 5xx 서버 에러
            ApiError::ProofGenerationFailed(msg) => {
                tracing::error!("Proof generation failed: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PROOF_GENERATION_FAILED",
                    "Failed to generate ZK proof".to_string(),
                    Some(msg.clone()),
                )
            }
            ApiError::ProofVerificationFailed(msg) => {
                tracing::error!("Internal ZK verification failed: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PROOF_VERIFICATION_FAILED",
                    "Internal ZK verification failed".to_string(),
                    Some(msg.clone()),
                )
            }
            ApiError::DatabaseError(_) => {
                // 내부 에러는 클라이언트에 상세 정보 노출 안 함
                tracing::error!("Database error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database error occurred".to_string(),
                    None,
                )
            }
            ApiError::LedgerError(msg) => {
                tracing::error!("Ledger error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "LEDGER_ERROR",
                    "Failed to anchor proof on-chain".to_string(),
                    Some(msg.clone()),
                )
            }
            ApiError::ArchiveError(msg) => {
                tracing::error!("Archive error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "ARCHIVE_ERROR",
                    "Failed to fetch proof package".to_string(),
                    Some(msg.clone()),
                )
            }
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<OracleError> for ApiError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::InvalidInput(msg) => ApiError::BadRequest(msg),
            OracleError::NotFound(resource) => ApiError::NotFound(resource.to_string()),
            OracleError::InProgress(key) => {
                ApiError::Conflict(format!("{} is already being processed, retry later", key))
            }
            OracleError::ProofGeneration(e) => ApiError::ProofGenerationFailed(e.to_string()),
            OracleError::LocalVerification(circuit) => {
                ApiError::ProofVerificationFailed(format!("{} proof", circuit))
            }
            OracleError::Archive(ArchiveError::InvalidCid(cid)) => {
                ApiError::BadRequest(format!("Invalid CID: {}", cid))
            }
            OracleError::Archive(ArchiveError::NotFound(cid)) => {
                ApiError::NotFound(format!("Proof {}", cid))
            }
            OracleError::Archive(e) => ApiError::ArchiveError(e.to_string()),
            OracleError::Ledger(e) => ApiError::LedgerError(e.to_string()),
            OracleError::Persistence(msg) => ApiError::DatabaseError(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::CircuitKind;

    fn status_of(err: OracleError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_oracle_error_status_mapping() {
        assert_eq!(
            status_of(OracleError::InvalidInput("contestId required".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(OracleError::NotFound("Attempt")), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(OracleError::InProgress("attempt:1".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(OracleError::ProofGeneration(ProverError::Execution {
                circuit: CircuitKind::AnswerExistence,
                reason: "assertion failed".into(),
            })),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(OracleError::LocalVerification("comparison")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(OracleError::Ledger(LedgerError::Reverted("0xabc".into()))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(OracleError::Persistence("timeout".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_archive_retrieval_mapping() {
        assert_eq!(
            status_of(OracleError::Archive(ArchiveError::InvalidCid("..".into()))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(OracleError::Archive(ArchiveError::NotFound("bafy".into()))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(OracleError::Archive(ArchiveError::Fetch("status 500".into()))),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_ledger_message_is_surfaced() {
        let api: ApiError =
            OracleError::Ledger(LedgerError::Estimation("execution reverted: AnchorExists".into()))
                .into();

        match api {
            ApiError::LedgerError(msg) => assert!(msg.contains("AnchorExists")),
            other => panic!("unexpected mapping: {:?}", other),
        }
    }

    #[test]
    fn test_persistence_from_anyhow_keeps_context() {
        let err: OracleError = anyhow::anyhow!("pool timed out")
            .context("upsert commitment")
            .into();

        assert!(matches!(err, OracleError::Persistence(ref msg) if msg.contains("pool timed out")));
    }
}
