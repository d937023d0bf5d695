//! Database Models
//!
//! Commitment rows are owned by the oracle. Attempts, participants and game
//! configs are written by the upstream game system and only read here, except
//! for the verification columns of `attempts`.

use std::fmt;

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// 정답 commitment (contest, game config 당 1개)
#[derive(Clone, FromRow)]
pub struct CommitmentRecord {
    pub id: Uuid,
    pub contest_id: Uuid,
    pub game_config_id: Uuid,
    pub game_id: Option<i64>,
    pub difficulty: Option<String>,

    /// 공개 가능한 commitment digest
    pub commitment_hash: String,

    /// 정답 평문 (oracle 외부로 절대 노출 금지)
    pub answer_plaintext: String,

    /// 전체 salt (비공개)
    pub salt_full: String,

    /// salt의 SHA-256 (공개 힌트)
    pub salt_hint: String,

    /// Existence proof blob의 Keccak256
    pub proof_hash: Option<String>,

    pub ipfs_cid: Option<String>,
    pub ipfs_url: Option<String>,

    /// Commitment anchor 트랜잭션 (anchor 전이면 None)
    pub anchor_tx_hash: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for CommitmentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommitmentRecord")
            .field("contest_id", &self.contest_id)
            .field("game_config_id", &self.game_config_id)
            .field("game_id", &self.game_id)
            .field("commitment_hash", &self.commitment_hash)
            .field("answer_plaintext", &"<redacted>")
            .field("salt_full", &"<redacted>")
            .field("salt_hint", &self.salt_hint)
            .field("proof_hash", &self.proof_hash)
            .field("ipfs_cid", &self.ipfs_cid)
            .field("anchor_tx_hash", &self.anchor_tx_hash)
            .finish()
    }
}

/// Commitment upsert 입력
#[derive(Clone)]
pub struct NewCommitment {
    pub contest_id: Uuid,
    pub game_config_id: Uuid,
    pub game_id: Option<i64>,
    pub difficulty: Option<String>,
    pub commitment_hash: String,
    pub answer_plaintext: String,
    pub salt_full: String,
    pub salt_hint: String,
    pub proof_hash: String,
    pub ipfs_cid: Option<String>,
    pub ipfs_url: Option<String>,
}

/// 사용자 시도 (upstream 게임 시스템이 생성)
#[derive(Debug, Clone, FromRow)]
pub struct Attempt {
    pub id: Uuid,
    pub contest_id: Uuid,
    pub participant_id: Uuid,
    pub game_config_id: Uuid,
    pub submitted_answer: Option<String>,

    /// 참가자별 단조 증가 index (on-chain anchor id)
    pub attempt_index: i64,

    pub verified: bool,
    pub zk_matches: Option<bool>,
    pub zk_commitment_hash: Option<String>,
    pub zk_user_answer_hash: Option<String>,
    pub zk_proof_hash: Option<String>,
    pub zk_ipfs_cid: Option<String>,
    pub anchor_id: Option<i64>,
    pub anchor_tx_hash: Option<String>,

    /// 전체 proof package (JSONB)
    pub verification_metadata: Option<serde_json::Value>,
    pub verified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Participant {
    pub id: Uuid,
    pub contest_id: Uuid,
    pub wallet_address: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct GameConfig {
    pub id: Uuid,
    pub contest_id: Uuid,
    /// on-chain 게임 식별자
    pub game_id: i64,
    pub difficulty: Option<String>,
}

/// 검증 완료 시 attempts 갱신 값
#[derive(Debug, Clone)]
pub struct AttemptVerification {
    pub attempt_id: Uuid,
    pub matches: bool,
    pub commitment_hash: String,
    pub user_answer_hash: String,
    pub proof_hash: String,
    pub ipfs_cid: Option<String>,
    pub anchor_id: i64,
    pub anchor_tx_hash: String,
    pub metadata: serde_json::Value,
}

/// 검증 감사 로그 (성공/실패 모두)
#[derive(Debug, Clone)]
pub struct VerificationLogEntry {
    pub workflow: &'static str,
    pub contest_id: Option<Uuid>,
    pub attempt_id: Option<Uuid>,
    pub success: bool,
    pub matches: Option<bool>,
    pub proof_hash: Option<String>,
    pub anchor_tx_hash: Option<String>,
    pub error: Option<String>,
    pub proving_time_ms: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commitment_debug_redacts_secrets() {
        let record = CommitmentRecord {
            id: Uuid::new_v4(),
            contest_id: Uuid::new_v4(),
            game_config_id: Uuid::new_v4(),
            game_id: Some(3),
            difficulty: None,
            commitment_hash: "0x01".to_string(),
            answer_plaintext: "OMEGA-742".to_string(),
            salt_full: "0xfeedface".to_string(),
            salt_hint: "abcd".to_string(),
            proof_hash: None,
            ipfs_cid: None,
            ipfs_url: None,
            anchor_tx_hash: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let debug = format!("{:?}", record);
        assert!(!debug.contains("OMEGA-742"));
        assert!(!debug.contains("feedface"));
        assert!(debug.contains("<redacted>"));
    }
}
