//! Proof Package
//!
//! Content Archive에 업로드되는 버전 관리 JSON 봉투.
//! 한 번 업로드되면 변경되지 않으며, 새 검증은 항상 새 package를 만든다.
//!
//! ```text
//! {
//!   "version": "1.0",
//!   "type": "answer_verification",
//!   "attemptId": "...", "contestId": "...", "playerWallet": "0x...",
//!   "proof": "0x...",
//!   "publicInputs": { "commitmentHash": "0x...", "userAnswerHash": "0x...", "matches": true },
//!   "result": "correct",
//!   "metadata": { "circuit": "answer_comparison", "backend": "UltraHonk", ... }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Bytes32;

pub const PACKAGE_VERSION: &str = "1.0";
pub const PROVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageKind {
    #[serde(rename = "answer_existence")]
    Existence,
    #[serde(rename = "answer_verification")]
    Verification,
}

/// 비교 결과 (평문으로 공개됨, 값 자체는 숨김)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerResult {
    Correct,
    Incorrect,
}

impl AnswerResult {
    pub fn from_matches(matches: bool) -> Self {
        if matches {
            AnswerResult::Correct
        } else {
            AnswerResult::Incorrect
        }
    }

    pub fn is_correct(&self) -> bool {
        matches!(self, AnswerResult::Correct)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackagePublicInputs {
    pub commitment_hash: Bytes32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_answer_hash: Option<Bytes32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageMetadata {
    pub circuit: String,
    pub backend: String,
    pub prover_version: String,
    pub timestamp: DateTime<Utc>,
    /// 증명 생성 시간 (ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proving_time: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofPackage {
    pub version: String,
    #[serde(rename = "type")]
    pub kind: PackageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contest_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_wallet: Option<String>,
    /// hex 인코딩된 proof
    pub proof: String,
    pub public_inputs: PackagePublicInputs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AnswerResult>,
    pub metadata: PackageMetadata,
}
