//! Database Module
//!
//! # Interview Q&A
//!
//! Q: 어떤 데이터를 저장하는가?
//! A: 두 종류
//!
//!    1. Oracle 소유: `game_commitments`, `verification_logs`
//!       - 정답 평문과 salt는 이 DB를 벗어나지 않음 (공개되는 것은 digest뿐)
//!    2. Upstream 게임 시스템 소유: `attempts`, `contest_participants`, `game_configs`
//!       - 읽기 전용, 단 `attempts`의 검증 컬럼만 갱신
//!
//! Q: 동시 요청에서 중복 row는 어떻게 막는가?
//! A: `UNIQUE (contest_id, game_config_id)` + `ON CONFLICT DO UPDATE`
//!    - 같은 key의 재생성은 항상 덮어쓰기
//!    - attempt 갱신은 `WHERE verified = FALSE` 조건부
//!    - 다중 인스턴스: `workflow_claims` lease row를 proof/anchor 이전에 획득
//!
//! Q: 커넥션 풀은 어떻게 관리하는가?
//! A: SQLx의 PgPool 사용
//!    - 최소/최대 커넥션 수 설정
//!    - acquire 타임아웃

mod models;
pub mod repository;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

pub use models::*;
pub use repository::{AttemptRepository, ClaimRepository, CommitmentRepository};

/// 데이터베이스 연결 및 쿼리 담당
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 데이터베이스 연결
    ///
    /// # Connection Pool Settings
    ///
    /// - max_connections: 10
    /// - min_connections: 1
    /// - acquire_timeout: 3초
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(3))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// 마이그레이션 실행
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl CommitmentRepository for Database {
    async fn find_commitment(
        &self,
        contest_id: Uuid,
        game_config_id: Uuid,
    ) -> Result<Option<CommitmentRecord>> {
        let commitment = sqlx::query_as::<_, CommitmentRecord>(
            r#"
            SELECT
                id, contest_id, game_config_id, game_id, difficulty,
                commitment_hash, answer_plaintext, salt_full, salt_hint,
                proof_hash, ipfs_cid, ipfs_url, anchor_tx_hash,
                created_at, updated_at
            FROM game_commitments
            WHERE contest_id = $1 AND game_config_id = $2
            "#,
        )
        .bind(contest_id)
        .bind(game_config_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(commitment)
    }

    async fn upsert_commitment(&self, commitment: &NewCommitment) -> Result<CommitmentRecord> {
        let record = sqlx::query_as::<_, CommitmentRecord>(
            r#"
            INSERT INTO game_commitments (
                contest_id, game_config_id, game_id, difficulty,
                commitment_hash, answer_plaintext, salt_full, salt_hint,
                proof_hash, ipfs_cid, ipfs_url, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW(), NOW())
            ON CONFLICT (contest_id, game_config_id)
            DO UPDATE SET
                game_id = EXCLUDED.game_id,
                difficulty = EXCLUDED.difficulty,
                commitment_hash = EXCLUDED.commitment_hash,
                answer_plaintext = EXCLUDED.answer_plaintext,
                salt_full = EXCLUDED.salt_full,
                salt_hint = EXCLUDED.salt_hint,
                proof_hash = EXCLUDED.proof_hash,
                ipfs_cid = EXCLUDED.ipfs_cid,
                ipfs_url = EXCLUDED.ipfs_url,
                anchor_tx_hash = NULL,
                updated_at = NOW()
            RETURNING
                id, contest_id, game_config_id, game_id, difficulty,
                commitment_hash, answer_plaintext, salt_full, salt_hint,
                proof_hash, ipfs_cid, ipfs_url, anchor_tx_hash,
                created_at, updated_at
            "#,
        )
        .bind(commitment.contest_id)
        .bind(commitment.game_config_id)
        .bind(commitment.game_id)
        .bind(&commitment.difficulty)
        .bind(&commitment.commitment_hash)
        .bind(&commitment.answer_plaintext)
        .bind(&commitment.salt_full)
        .bind(&commitment.salt_hint)
        .bind(&commitment.proof_hash)
        .bind(&commitment.ipfs_cid)
        .bind(&commitment.ipfs_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn set_commitment_anchor(
        &self,
        contest_id: Uuid,
        game_config_id: Uuid,
        anchor_tx_hash: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE game_commitments
            SET anchor_tx_hash = $3, updated_at = NOW()
            WHERE contest_id = $1 AND game_config_id = $2
            "#,
        )
        .bind(contest_id)
        .bind(game_config_id)
        .bind(anchor_tx_hash)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl AttemptRepository for Database {
    async fn find_attempt(&self, attempt_id: Uuid) -> Result<Option<Attempt>> {
        let attempt = sqlx::query_as::<_, Attempt>(
            r#"
            SELECT
                id, contest_id, participant_id, game_config_id, submitted_answer,
                attempt_index, verified, zk_matches, zk_commitment_hash,
                zk_user_answer_hash, zk_proof_hash, zk_ipfs_cid, anchor_id,
                anchor_tx_hash, verification_metadata, verified_at
            FROM attempts
            WHERE id = $1
            "#,
        )
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(attempt)
    }

    async fn find_participant(&self, participant_id: Uuid) -> Result<Option<Participant>> {
        let participant = sqlx::query_as::<_, Participant>(
            "SELECT id, contest_id, wallet_address FROM contest_participants WHERE id = $1",
        )
        .bind(participant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(participant)
    }

    async fn find_game_config(&self, game_config_id: Uuid) -> Result<Option<GameConfig>> {
        let config = sqlx::query_as::<_, GameConfig>(
            "SELECT id, contest_id, game_id, difficulty FROM game_configs WHERE id = $1",
        )
        .bind(game_config_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(config)
    }

    async fn mark_attempt_verified(&self, verification: &AttemptVerification) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE attempts
            SET
                verified              = TRUE,
                zk_matches            = $1,
                zk_commitment_hash    = $2,
                zk_user_answer_hash   = $3,
                zk_proof_hash         = $4,
                zk_ipfs_cid           = $5,
                anchor_id             = $6,
                anchor_tx_hash        = $7,
                verification_metadata = $8,
                verified_at           = NOW()
            WHERE id = $9 AND verified = FALSE
            "#,
        )
        .bind(verification.matches)
        .bind(&verification.commitment_hash)
        .bind(&verification.user_answer_hash)
        .bind(&verification.proof_hash)
        .bind(&verification.ipfs_cid)
        .bind(verification.anchor_id)
        .bind(&verification.anchor_tx_hash)
        .bind(&verification.metadata)
        .bind(verification.attempt_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn log_verification(&self, entry: &VerificationLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO verification_logs (
                workflow, contest_id, attempt_id, success, matches,
                proof_hash, anchor_tx_hash, error, proving_time_ms, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            "#,
        )
        .bind(entry.workflow)
        .bind(entry.contest_id)
        .bind(entry.attempt_id)
        .bind(entry.success)
        .bind(entry.matches)
        .bind(&entry.proof_hash)
        .bind(&entry.anchor_tx_hash)
        .bind(&entry.error)
        .bind(entry.proving_time_ms)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ClaimRepository for Database {
    async fn try_claim(&self, key: &str, token: Uuid, lease: Duration) -> Result<bool> {
        // 만료된 claim만 덮어씀, 살아 있는 claim이면 RETURNING 없음
        let claimed: Option<(String,)> = sqlx::query_as(
            r#"
            INSERT INTO workflow_claims (claim_key, claim_token, claimed_at, expires_at)
            VALUES ($1, $2, NOW(), NOW() + make_interval(secs => $3))
            ON CONFLICT (claim_key)
            DO UPDATE SET
                claim_token = EXCLUDED.claim_token,
                claimed_at  = EXCLUDED.claimed_at,
                expires_at  = EXCLUDED.expires_at
            WHERE workflow_claims.expires_at < NOW()
            RETURNING claim_key
            "#,
        )
        .bind(key)
        .bind(token)
        .bind(lease.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(claimed.is_some())
    }

    async fn release_claim(&self, key: &str, token: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM workflow_claims WHERE claim_key = $1 AND claim_token = $2")
            .bind(key)
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
