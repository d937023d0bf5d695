//! Repository Pattern Implementation
//!
//! # Interview Q&A
//!
//! Q: 왜 orchestrator는 `Database`가 아닌 trait에 의존하는가?
//! A: 워크플로우 테스트에서 PostgreSQL 없이 in-memory 구현으로 교체
//!
//!    ```rust
//!    // 프로덕션
//!    let store: Arc<Database> = Arc::new(Database::connect(url).await?);
//!    // 테스트
//!    let store = Arc::new(InMemoryStore::new());
//!    VerificationOracle::new(prover, archive, ledger, store.clone(), store.clone(), store);
//!    ```
//!
//! Q: 중복 검증은 어디서 막는가?
//! A: 세 겹
//!    - orchestrator의 프로세스 내 key lock
//!    - `ClaimRepository` lease claim: 인스턴스 간, proof/anchor 이전에 획득 후 재조회
//!    - `mark_attempt_verified`는 `verified = FALSE`인 row만 갱신 (false 반환 시 이미 검증됨)

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use super::models::{
    Attempt, AttemptVerification, CommitmentRecord, GameConfig, NewCommitment, Participant,
    VerificationLogEntry,
};

/// Commitment 저장소
#[async_trait]
pub trait CommitmentRepository: Send + Sync {
    async fn find_commitment(
        &self,
        contest_id: Uuid,
        game_config_id: Uuid,
    ) -> Result<Option<CommitmentRecord>>;

    /// (contest_id, game_config_id) 기준 insert or overwrite
    async fn upsert_commitment(&self, commitment: &NewCommitment) -> Result<CommitmentRecord>;

    async fn set_commitment_anchor(
        &self,
        contest_id: Uuid,
        game_config_id: Uuid,
        anchor_tx_hash: &str,
    ) -> Result<()>;
}

/// Attempt 및 참조 데이터 저장소
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    async fn find_attempt(&self, attempt_id: Uuid) -> Result<Option<Attempt>>;

    async fn find_participant(&self, participant_id: Uuid) -> Result<Option<Participant>>;

    async fn find_game_config(&self, game_config_id: Uuid) -> Result<Option<GameConfig>>;

    /// 미검증 attempt만 갱신, 갱신되었으면 true
    async fn mark_attempt_verified(&self, verification: &AttemptVerification) -> Result<bool>;

    /// 감사 로그 추가 (append-only)
    async fn log_verification(&self, entry: &VerificationLogEntry) -> Result<()>;
}

/// 인스턴스 간 workflow claim (lease 기반)
///
/// # Design Decision
///
/// 프로세스가 claim을 쥔 채 죽어도 lease 만료 후 다른 인스턴스가 이어받음
#[async_trait]
pub trait ClaimRepository: Send + Sync {
    /// key가 비어 있거나 lease가 만료되었으면 `token`으로 claim, 성공 시 true
    async fn try_claim(&self, key: &str, token: Uuid, lease: Duration) -> Result<bool>;

    /// `token`이 보유한 claim만 해제
    async fn release_claim(&self, key: &str, token: Uuid) -> Result<()>;
}
