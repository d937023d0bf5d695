//! ZK Workflow Endpoints
//!
//! HTTP 레이어는 얇게 유지: 요청 파싱 → `VerificationOracle` 호출 → 응답 변환.
//! 검증/에러 분류는 모두 orchestrator에서 수행.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::services::{
    CommitmentOutcome, CreateCommitmentRequest, VerificationOutcome, VerifyResponseRequest,
};
use crate::types::ProofPackage;
use crate::{error::ApiError, AppState};

// ============ Response Types ============

#[derive(Debug, Serialize)]
pub struct CreateCommitmentResponse {
    pub success: bool,
    #[serde(flatten)]
    pub commitment: CommitmentOutcome,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponseResponse {
    pub success: bool,
    #[serde(flatten)]
    pub verification: VerificationOutcome,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofResponse {
    pub success: bool,
    pub proof: ProofPackage,
    pub gateway_url: String,
}

// ============ Handlers ============

/// POST /api/zk/create-commitment
///
/// # Flow
///
/// 1. 정답 + 새 salt로 existence proof 생성
/// 2. 로컬 검증
/// 3. Proof package IPFS 업로드 (실패해도 계속)
/// 4. Commitment upsert + on-chain anchor
///
/// # Security Warning
///
/// 응답에 전체 salt가 포함됨 → 호출자(게임 운영 백엔드)만 접근 가능해야 함
pub async fn create_commitment(
    State(state): State<AppState>,
    Json(req): Json<CreateCommitmentRequest>,
) -> Result<Json<CreateCommitmentResponse>, ApiError> {
    let commitment = state.oracle.create_commitment(req).await?;

    Ok(Json(CreateCommitmentResponse {
        success: true,
        commitment,
    }))
}

/// POST /api/zk/verify-response
///
/// 이미 검증된 attempt는 proof 재생성 없이 저장된 결과 반환 (`cached: true`)
pub async fn verify_response(
    State(state): State<AppState>,
    Json(req): Json<VerifyResponseRequest>,
) -> Result<Json<VerifyResponseResponse>, ApiError> {
    let verification = state.oracle.verify_response(req).await?;

    Ok(Json(VerifyResponseResponse {
        success: true,
        verification,
    }))
}

/// GET /api/zk/proof/:cid
pub async fn get_proof(
    State(state): State<AppState>,
    Path(cid): Path<String>,
) -> Result<Json<ProofResponse>, ApiError> {
    let (proof, gateway_url) = state.oracle.retrieve_proof(&cid).await?;

    Ok(Json(ProofResponse {
        success: true,
        proof,
        gateway_url,
    }))
}
