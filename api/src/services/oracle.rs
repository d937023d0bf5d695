//! Verification Oracle
//!
//! 두 workflow를 순서대로 실행하는 orchestrator.
//!
//! ```text
//! CreateCommitment:
//!   Start → ProofGenerated → LocallyVerified → (Archived | ArchiveSkipped) → Anchored → Persisted
//!
//! VerifyResponse:
//!   Start → Loaded → ProofGenerated → LocallyVerified → (Archived | ArchiveSkipped)
//!         → Anchored → Persisted → Responded
//!   (이미 verified면 저장된 결과를 그대로 반환)
//! ```
//!
//! # Interview Q&A
//!
//! Q: 같은 attempt에 대한 동시 요청은?
//! A: 두 단계로 직렬화
//!    - 프로세스 내: key별 async lock
//!    - 인스턴스 간: 저장소의 lease claim (`ClaimRepository`), proof/anchor 이전에 획득
//!    - claim 획득 후 attempt를 다시 읽어 이미 검증되었으면 cache 반환
//!    - DB 갱신도 `verified = FALSE` 조건부 (lease 만료 후 경합 대비)
//!
//! Q: Ledger 대기가 실패하면 DB 상태는?
//! A: Attempt는 `verified = false`로 남고, commitment는 anchor 없이 남음
//!    - 모든 쓰기가 upsert/조건부 update이므로 재실행이 안전

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::db::{
    Attempt, AttemptRepository, AttemptVerification, ClaimRepository, CommitmentRepository,
    NewCommitment, VerificationLogEntry,
};
use crate::error::OracleError;
use crate::services::archive::{ArchiveReceipt, ProofArchive};
use crate::services::blockchain::{AnchorRequest, LedgerAnchor};
use crate::services::zk_prover::{public_inputs_view, CircuitKind, ZKProver};
use crate::types::{
    uuid_to_bytes32, AnswerResult, EthAddress, PackageKind, PackageMetadata, PackagePublicInputs,
    ProofPackage, PACKAGE_VERSION, PROVER_VERSION,
};

const TRANSPARENCY_NOTE: &str = "Full ZK proof stored on IPFS (content-addressed, immutable)";

// ============ Requests ============

#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommitmentRequest {
    pub answer: Option<String>,
    pub contest_id: Option<String>,
    pub game_config_id: Option<String>,
    pub game_id: Option<i64>,
    pub difficulty: Option<String>,
}

impl fmt::Debug for CreateCommitmentRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateCommitmentRequest")
            .field("answer", &self.answer.as_ref().map(|_| "<redacted>"))
            .field("contest_id", &self.contest_id)
            .field("game_config_id", &self.game_config_id)
            .field("game_id", &self.game_id)
            .field("difficulty", &self.difficulty)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponseRequest {
    pub attempt_id: Option<String>,
    pub user_answer: Option<String>,
}

// ============ Responses ============

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorView {
    pub tx_hash: String,
    pub explorer_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitmentOutcome {
    pub contest_id: Uuid,
    pub game_config_id: Uuid,
    pub commitment_hash: String,
    pub salt: String,
    pub salt_hint: String,
    pub archive: Option<ArchiveReceipt>,
    pub proof_hash: String,
    pub anchor: AnchorView,
    pub proving_time_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofView {
    pub archive: Option<ArchiveReceipt>,
    pub proof_hash: String,
    pub anchor: AnchorView,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transparency {
    pub commitment_hash: String,
    pub user_answer_hash: String,
    pub note: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationOutcome {
    pub verified: bool,
    /// 저장된 결과를 반환했으면 true
    pub cached: bool,
    pub attempt_id: Uuid,
    pub contest_id: Uuid,
    pub participant_id: Uuid,
    pub game_config_id: Uuid,
    pub game_id: i64,
    pub result: AnswerResult,
    pub proof: ProofView,
    /// `[commitmentHash, userAnswerHash, matches]`
    pub public_inputs: Vec<String>,
    pub message: &'static str,
    pub transparency: Transparency,
    pub proving_time_ms: Option<u64>,
}

fn result_message(result: AnswerResult) -> &'static str {
    match result {
        AnswerResult::Correct => "✅ Your answer is CORRECT! (Cryptographically proven)",
        AnswerResult::Incorrect => "❌ Your answer is INCORRECT (Cryptographically proven)",
    }
}

// ============ Keyed locks ============

/// key별 async mutex (사용하지 않는 entry는 다음 lock 시 정리)
#[derive(Default)]
struct KeyedLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    async fn lock(&self, key: String) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.retain(|_, m| Arc::strong_count(m) > 1);
            map.entry(key).or_default().clone()
        };
        mutex.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

// ============ Cross-instance claims ============

/// 저장소 claim 대기 정책
#[derive(Debug, Clone, Copy)]
pub struct ClaimPolicy {
    /// claim 유효 기간 (proof + ledger 대기 최대치보다 길어야 함)
    pub lease: Duration,
    /// 다른 인스턴스가 보유 중일 때 재시도 간격
    pub poll: Duration,
    /// 이 시간 안에 못 얻으면 `InProgress`
    pub wait: Duration,
}

impl Default for ClaimPolicy {
    fn default() -> Self {
        Self {
            lease: Duration::from_secs(15 * 60),
            poll: Duration::from_millis(250),
            wait: Duration::from_secs(60),
        }
    }
}

// ============ Input validation ============

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, OracleError> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| OracleError::InvalidInput(format!("{} is required", field)))
}

fn parse_uuid(value: &str, field: &str) -> Result<Uuid, OracleError> {
    Uuid::parse_str(value.trim())
        .map_err(|_| OracleError::InvalidInput(format!("{} must be a UUID", field)))
}

/// 32 byte 난수 salt (`0x` + 64 hex)
pub fn generate_salt() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    format!("0x{}", hex::encode(bytes))
}

/// 공개 salt 힌트 = SHA-256(salt 문자열)
pub fn salt_hint(salt: &str) -> String {
    hex::encode(Sha256::digest(salt.as_bytes()))
}

fn stored_index(value: i64, what: &str) -> Result<u64, OracleError> {
    u64::try_from(value)
        .map_err(|_| OracleError::Persistence(format!("negative {} stored: {}", what, value)))
}

/// Verification Oracle
///
/// # Architecture
///
/// ```text
/// ┌──────────────────────────────────────────────────────────────┐
/// │                     VerificationOracle                       │
/// │                                                              │
/// │  ZKProver ──▶ verify ──▶ ProofArchive ──▶ LedgerAnchor ──▶ DB │
/// │                          (best-effort)    (fatal)             │
/// │                                                              │
/// │  KeyedLocks + store claim:                                    │
/// │    commitment:{contest}:{gamecfg} / attempt:{id}              │
/// └──────────────────────────────────────────────────────────────┘
/// ```
pub struct VerificationOracle {
    prover: Arc<ZKProver>,
    archive: Arc<dyn ProofArchive>,
    ledger: Arc<dyn LedgerAnchor>,
    commitments: Arc<dyn CommitmentRepository>,
    attempts: Arc<dyn AttemptRepository>,
    claims: Arc<dyn ClaimRepository>,
    claim_policy: ClaimPolicy,
    locks: KeyedLocks,
}

impl VerificationOracle {
    pub fn new(
        prover: Arc<ZKProver>,
        archive: Arc<dyn ProofArchive>,
        ledger: Arc<dyn LedgerAnchor>,
        commitments: Arc<dyn CommitmentRepository>,
        attempts: Arc<dyn AttemptRepository>,
        claims: Arc<dyn ClaimRepository>,
    ) -> Self {
        Self {
            prover,
            archive,
            ledger,
            commitments,
            attempts,
            claims,
            claim_policy: ClaimPolicy::default(),
            locks: KeyedLocks::default(),
        }
    }

    pub fn with_claim_policy(mut self, policy: ClaimPolicy) -> Self {
        self.claim_policy = policy;
        self
    }

    pub fn prover(&self) -> &ZKProver {
        &self.prover
    }

    // ------------------------------------------------------------------
    // CreateCommitment
    // ------------------------------------------------------------------

    /// 정답 commitment 생성 + existence proof anchor
    pub async fn create_commitment(
        &self,
        request: CreateCommitmentRequest,
    ) -> Result<CommitmentOutcome, OracleError> {
        let answer = required(&request.answer, "answer")?;
        let contest_id = parse_uuid(required(&request.contest_id, "contestId")?, "contestId")?;
        let game_config_id =
            parse_uuid(required(&request.game_config_id, "gameConfigId")?, "gameConfigId")?;
        let game_id = match request.game_id {
            Some(id) if id < 0 => {
                return Err(OracleError::InvalidInput("gameId must be non-negative".to_string()))
            }
            other => other,
        };

        let key = format!("commitment:{}:{}", contest_id, game_config_id);
        let _guard = self.locks.lock(key.clone()).await;
        let token = self.acquire_claim(&key).await?;

        tracing::info!(
            %contest_id,
            %game_config_id,
            game_id = ?game_id,
            difficulty = ?request.difficulty,
            "🎮 Creating ZK commitment"
        );

        let result = self
            .run_create_commitment(
                answer,
                contest_id,
                game_config_id,
                game_id,
                request.difficulty.clone(),
            )
            .await;
        self.release_claim(&key, token).await;

        let mut entry = log_entry("create_commitment", Some(contest_id), None);
        match &result {
            Ok(outcome) => {
                entry.success = true;
                entry.proof_hash = Some(outcome.proof_hash.clone());
                entry.anchor_tx_hash = Some(outcome.anchor.tx_hash.clone());
                entry.proving_time_ms = Some(outcome.proving_time_ms as i64);
            }
            Err(e) => {
                tracing::error!(%contest_id, "❌ Commitment creation failed: {}", e);
                entry.error = Some(e.to_string());
            }
        }
        self.audit(entry).await;

        result
    }

    async fn run_create_commitment(
        &self,
        answer: &str,
        contest_id: Uuid,
        game_config_id: Uuid,
        game_id: Option<i64>,
        difficulty: Option<String>,
    ) -> Result<CommitmentOutcome, OracleError> {
        let salt = generate_salt();

        let proof = self.prover.prove_answer_exists(answer, &salt).await?;
        if !self.prover.verify_proof(&proof.artifact).await {
            return Err(OracleError::LocalVerification("existence"));
        }
        tracing::info!(proving_time_ms = proof.proving_time_ms, "✅ Existence proof verified");

        let package = ProofPackage {
            version: PACKAGE_VERSION.to_string(),
            kind: PackageKind::Existence,
            contest_id: Some(contest_id),
            attempt_id: None,
            player_wallet: None,
            proof: proof.artifact.proof_hex(),
            public_inputs: PackagePublicInputs {
                commitment_hash: proof.commitment_hash,
                user_answer_hash: None,
                matches: None,
            },
            result: None,
            metadata: self.package_metadata(CircuitKind::AnswerExistence, proof.proving_time_ms),
        };
        let filename = format!("commitment-{}-gamecfg-{}.json", contest_id, game_config_id);
        let archive = self.archive_best_effort(&package, &filename).await;

        let proof_hash = proof.artifact.proof_hash();
        let salt_hint = salt_hint(&salt);

        self.commitments
            .upsert_commitment(&NewCommitment {
                contest_id,
                game_config_id,
                game_id,
                difficulty,
                commitment_hash: proof.commitment_hash.to_hex(),
                answer_plaintext: answer.to_string(),
                salt_full: salt.clone(),
                salt_hint: salt_hint.clone(),
                proof_hash: proof_hash.to_hex(),
                ipfs_cid: archive.as_ref().map(|a| a.cid.clone()),
                ipfs_url: archive.as_ref().map(|a| a.url.clone()),
            })
            .await?;

        tracing::info!("⛓️ Anchoring commitment");
        let receipt = self
            .ledger
            .anchor_proof(AnchorRequest::commitment_only(
                uuid_to_bytes32(contest_id),
                game_id.map(|id| id as u64).unwrap_or(0),
                proof_hash,
                proof.commitment_hash,
                archive.as_ref().map(|a| a.cid.clone()).unwrap_or_default(),
            ))
            .await?;

        self.commitments
            .set_commitment_anchor(contest_id, game_config_id, &receipt.tx_hash)
            .await?;

        tracing::info!(tx = %receipt.tx_hash, "✅ Commitment anchored");

        Ok(CommitmentOutcome {
            contest_id,
            game_config_id,
            commitment_hash: proof.commitment_hash.to_hex(),
            salt,
            salt_hint,
            archive,
            proof_hash: proof_hash.to_hex(),
            anchor: AnchorView {
                explorer_url: self.ledger.explorer_url(&receipt.tx_hash),
                tx_hash: receipt.tx_hash,
                anchor_id: None,
            },
            proving_time_ms: proof.proving_time_ms,
        })
    }

    // ------------------------------------------------------------------
    // VerifyResponse
    // ------------------------------------------------------------------

    /// 사용자 답변 검증 (비교 proof 생성 + anchor)
    pub async fn verify_response(
        &self,
        request: VerifyResponseRequest,
    ) -> Result<VerificationOutcome, OracleError> {
        let attempt_id = parse_uuid(required(&request.attempt_id, "attemptId")?, "attemptId")?;

        let attempt = self.load_attempt(attempt_id).await?;
        if attempt.verified {
            return self.cached_outcome(attempt).await;
        }

        let key = format!("attempt:{}", attempt_id);
        let _guard = self.locks.lock(key.clone()).await;
        let token = self.acquire_claim(&key).await?;
        let result = self.verify_claimed(attempt_id, request.user_answer).await;
        self.release_claim(&key, token).await;

        // 조회 실패와 cache 응답은 부수 효과 없음
        match &result {
            Err(OracleError::NotFound(_)) => return result,
            Ok(outcome) if outcome.cached => return result,
            _ => {}
        }

        let mut entry = log_entry("verify_response", None, Some(attempt_id));
        match &result {
            Ok(outcome) => {
                entry.contest_id = Some(outcome.contest_id);
                entry.success = true;
                entry.matches = Some(outcome.result.is_correct());
                entry.proof_hash = Some(outcome.proof.proof_hash.clone());
                entry.anchor_tx_hash = Some(outcome.proof.anchor.tx_hash.clone());
                entry.proving_time_ms = outcome.proving_time_ms.map(|ms| ms as i64);
            }
            Err(e) => {
                tracing::error!(%attempt_id, "❌ Verification failed: {}", e);
                entry.error = Some(e.to_string());
            }
        }
        self.audit(entry).await;

        result
    }

    /// claim 보유 상태에서 실행
    async fn verify_claimed(
        &self,
        attempt_id: Uuid,
        user_answer: Option<String>,
    ) -> Result<VerificationOutcome, OracleError> {
        // 대기 중 다른 요청/인스턴스가 검증했을 수 있음
        let attempt = self.load_attempt(attempt_id).await?;
        if attempt.verified {
            return self.cached_outcome(attempt).await;
        }

        tracing::info!(
            %attempt_id,
            contest_id = %attempt.contest_id,
            attempt_index = attempt.attempt_index,
            "🔍 Verifying response"
        );

        self.run_verification(attempt, user_answer).await
    }

    async fn run_verification(
        &self,
        attempt: Attempt,
        user_answer: Option<String>,
    ) -> Result<VerificationOutcome, OracleError> {
        let participant = self
            .attempts
            .find_participant(attempt.participant_id)
            .await?
            .ok_or(OracleError::NotFound("Contest participant"))?;
        let game_config = self
            .attempts
            .find_game_config(attempt.game_config_id)
            .await?
            .ok_or(OracleError::NotFound("Game config"))?;
        let commitment = self
            .commitments
            .find_commitment(attempt.contest_id, attempt.game_config_id)
            .await?
            .ok_or(OracleError::NotFound("Commitment"))?;

        let player = EthAddress::new(&participant.wallet_address).map_err(|e| {
            OracleError::Persistence(format!("participant {}: {}", participant.id, e))
        })?;
        let anchor_index = stored_index(attempt.attempt_index, "attempt index")?;
        let game_id = stored_index(game_config.game_id, "game id")?;

        let candidate = user_answer
            .or_else(|| attempt.submitted_answer.clone())
            .unwrap_or_default();

        let proof = self
            .prover
            .prove_answer_comparison(&candidate, &commitment.answer_plaintext, &commitment.salt_full)
            .await?;
        if !self.prover.verify_proof(&proof.artifact).await {
            return Err(OracleError::LocalVerification("comparison"));
        }
        tracing::info!(
            result = ?proof.result(),
            proving_time_ms = proof.proving_time_ms,
            "✅ Comparison proof verified"
        );

        let package = ProofPackage {
            version: PACKAGE_VERSION.to_string(),
            kind: PackageKind::Verification,
            contest_id: Some(attempt.contest_id),
            attempt_id: Some(attempt.id),
            player_wallet: Some(player.to_string()),
            proof: proof.artifact.proof_hex(),
            public_inputs: PackagePublicInputs {
                commitment_hash: proof.commitment_hash,
                user_answer_hash: Some(proof.user_answer_hash),
                matches: Some(proof.matches),
            },
            result: Some(proof.result()),
            metadata: self.package_metadata(CircuitKind::AnswerComparison, proof.proving_time_ms),
        };
        let archive = self
            .archive_best_effort(&package, &format!("verification-{}.json", attempt.id))
            .await;

        let proof_hash = proof.artifact.proof_hash();

        tracing::info!(anchor_id = anchor_index, "⛓️ Anchoring verification");
        let receipt = self
            .ledger
            .anchor_proof(AnchorRequest {
                contest_id: uuid_to_bytes32(attempt.contest_id),
                game_id,
                player,
                attempt_index: anchor_index,
                proof_hash,
                commitment_hash: proof.commitment_hash,
                user_answer_hash: proof.user_answer_hash,
                matches: proof.matches,
                cid: archive.as_ref().map(|a| a.cid.clone()).unwrap_or_default(),
            })
            .await?;

        let metadata = serde_json::to_value(&package)
            .map_err(|e| OracleError::Persistence(format!("serialize proof package: {}", e)))?;
        let updated = self
            .attempts
            .mark_attempt_verified(&AttemptVerification {
                attempt_id: attempt.id,
                matches: proof.matches,
                commitment_hash: proof.commitment_hash.to_hex(),
                user_answer_hash: proof.user_answer_hash.to_hex(),
                proof_hash: proof_hash.to_hex(),
                ipfs_cid: archive.as_ref().map(|a| a.cid.clone()),
                anchor_id: attempt.attempt_index,
                anchor_tx_hash: receipt.tx_hash.clone(),
                metadata,
            })
            .await?;

        if !updated {
            // 다른 인스턴스가 먼저 기록함, 저장된 결과가 기준
            tracing::warn!(attempt_id = %attempt.id, tx = %receipt.tx_hash, "Attempt already verified elsewhere");
            let stored = self.load_attempt(attempt.id).await?;
            return self.cached_outcome(stored).await;
        }

        tracing::info!(attempt_id = %attempt.id, tx = %receipt.tx_hash, "✅ Attempt verified");

        let result = proof.result();
        Ok(VerificationOutcome {
            verified: true,
            cached: false,
            attempt_id: attempt.id,
            contest_id: attempt.contest_id,
            participant_id: attempt.participant_id,
            game_config_id: attempt.game_config_id,
            game_id: game_config.game_id,
            result,
            proof: ProofView {
                archive,
                proof_hash: proof_hash.to_hex(),
                anchor: AnchorView {
                    explorer_url: self.ledger.explorer_url(&receipt.tx_hash),
                    tx_hash: receipt.tx_hash,
                    anchor_id: Some(receipt.anchor_id),
                },
            },
            public_inputs: proof.public_inputs(),
            message: result_message(result),
            transparency: Transparency {
                commitment_hash: proof.commitment_hash.to_hex(),
                user_answer_hash: proof.user_answer_hash.to_hex(),
                note: TRANSPARENCY_NOTE,
            },
            proving_time_ms: Some(proof.proving_time_ms),
        })
    }

    /// 이미 검증된 attempt의 저장된 결과 (proof/upload/anchor 없음)
    async fn cached_outcome(&self, attempt: Attempt) -> Result<VerificationOutcome, OracleError> {
        let game_config = self
            .attempts
            .find_game_config(attempt.game_config_id)
            .await?
            .ok_or(OracleError::NotFound("Game config"))?;

        let matches = attempt.zk_matches.unwrap_or(false);
        let result = AnswerResult::from_matches(matches);
        let commitment_hash = attempt.zk_commitment_hash.clone().unwrap_or_default();
        let user_answer_hash = attempt.zk_user_answer_hash.clone().unwrap_or_default();
        let tx_hash = attempt.anchor_tx_hash.clone().unwrap_or_default();

        let package = attempt
            .verification_metadata
            .clone()
            .and_then(|value| serde_json::from_value::<ProofPackage>(value).ok());
        let proving_time_ms = package.as_ref().and_then(|p| p.metadata.proving_time);

        let archive = attempt.zk_ipfs_cid.clone().map(|cid| ArchiveReceipt {
            url: self.archive.gateway_url(&cid),
            size: None,
            cid,
        });

        tracing::info!(attempt_id = %attempt.id, "Attempt already verified, returning stored result");

        Ok(VerificationOutcome {
            verified: true,
            cached: true,
            attempt_id: attempt.id,
            contest_id: attempt.contest_id,
            participant_id: attempt.participant_id,
            game_config_id: attempt.game_config_id,
            game_id: game_config.game_id,
            result,
            proof: ProofView {
                archive,
                proof_hash: attempt.zk_proof_hash.clone().unwrap_or_default(),
                anchor: AnchorView {
                    explorer_url: self.ledger.explorer_url(&tx_hash),
                    tx_hash,
                    anchor_id: attempt.anchor_id.and_then(|id| u64::try_from(id).ok()),
                },
            },
            public_inputs: public_inputs_view(&commitment_hash, &user_answer_hash, matches),
            message: result_message(result),
            transparency: Transparency {
                commitment_hash,
                user_answer_hash,
                note: TRANSPARENCY_NOTE,
            },
            proving_time_ms,
        })
    }

    // ------------------------------------------------------------------
    // RetrieveProof
    // ------------------------------------------------------------------

    /// CID로 저장된 proof package 조회
    pub async fn retrieve_proof(&self, cid: &str) -> Result<(ProofPackage, String), OracleError> {
        let package = self.archive.retrieve_json(cid).await?;
        Ok((package, self.archive.gateway_url(cid.trim())))
    }

    // ------------------------------------------------------------------
    // helpers
    // ------------------------------------------------------------------

    async fn load_attempt(&self, attempt_id: Uuid) -> Result<Attempt, OracleError> {
        self.attempts
            .find_attempt(attempt_id)
            .await?
            .ok_or(OracleError::NotFound("Attempt"))
    }

    fn package_metadata(&self, circuit: CircuitKind, proving_time_ms: u64) -> PackageMetadata {
        PackageMetadata {
            circuit: circuit.name().to_string(),
            backend: self.prover.backend_name().to_string(),
            prover_version: PROVER_VERSION.to_string(),
            timestamp: Utc::now(),
            proving_time: Some(proving_time_ms),
        }
    }

    /// 업로드 실패 시 None (workflow는 계속)
    async fn archive_best_effort(
        &self,
        package: &ProofPackage,
        filename: &str,
    ) -> Option<ArchiveReceipt> {
        match self.archive.upload_json(package, filename).await {
            Ok(receipt) => {
                tracing::info!(cid = %receipt.cid, "📦 Proof package uploaded");
                Some(receipt)
            }
            Err(e) => {
                tracing::warn!(filename, "⚠️ Archive upload skipped: {}", e);
                None
            }
        }
    }

    /// 저장소 claim 획득 (다른 인스턴스 보유 중이면 `poll` 간격으로 재시도)
    async fn acquire_claim(&self, key: &str) -> Result<Uuid, OracleError> {
        let token = Uuid::new_v4();
        let started = Instant::now();
        loop {
            if self
                .claims
                .try_claim(key, token, self.claim_policy.lease)
                .await?
            {
                return Ok(token);
            }
            if started.elapsed() >= self.claim_policy.wait {
                tracing::warn!(key, "⏳ Workflow still claimed by another instance");
                return Err(OracleError::InProgress(key.to_string()));
            }
            tracing::debug!(key, "Workflow claimed elsewhere, waiting");
            tokio::time::sleep(self.claim_policy.poll).await;
        }
    }

    /// 실패해도 lease 만료 후 자동 해제
    async fn release_claim(&self, key: &str, token: Uuid) {
        if let Err(e) = self.claims.release_claim(key, token).await {
            tracing::warn!(key, "Failed to release workflow claim: {:#}", e);
        }
    }

    async fn audit(&self, entry: VerificationLogEntry) {
        if let Err(e) = self.attempts.log_verification(&entry).await {
            tracing::warn!("Failed to write verification log: {:#}", e);
        }
    }
}

fn log_entry(
    workflow: &'static str,
    contest_id: Option<Uuid>,
    attempt_id: Option<Uuid>,
) -> VerificationLogEntry {
    VerificationLogEntry {
        workflow,
        contest_id,
        attempt_id,
        success: false,
        matches: None,
        proof_hash: None,
        anchor_tx_hash: None,
        error: None,
        proving_time_ms: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_salt_format() {
        let a = generate_salt();
        let b = generate_salt();

        assert_eq!(a.len(), 66);
        assert!(a.starts_with("0x"));
        assert!(a[2..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_salt_hint_is_sha256_of_salt_string() {
        // sha256("abc")
        assert_eq!(
            salt_hint("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_required_field_validation() {
        assert!(matches!(required(&None, "answer"), Err(OracleError::InvalidInput(_))));
        assert!(matches!(
            required(&Some("  ".to_string()), "answer"),
            Err(OracleError::InvalidInput(_))
        ));
        assert_eq!(required(&Some("x".to_string()), "answer").unwrap(), "x");
        assert!(parse_uuid("not-a-uuid", "contestId").is_err());
    }

    #[test]
    fn test_request_debug_hides_answer() {
        let request = CreateCommitmentRequest {
            answer: Some("OMEGA-742".to_string()),
            ..Default::default()
        };
        assert!(!format!("{:?}", request).contains("OMEGA"));
    }

    #[tokio::test]
    async fn test_keyed_locks_serialize_same_key_and_prune() {
        let locks = KeyedLocks::default();

        let first = locks.lock("attempt:1".to_string()).await;
        let blocked = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            locks.lock("attempt:1".to_string()),
        )
        .await;
        assert!(blocked.is_err());

        let other = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            locks.lock("attempt:2".to_string()),
        )
        .await;
        assert!(other.is_ok());

        drop(first);
        drop(other);
        let _third = locks.lock("attempt:3".to_string()).await;
        assert_eq!(locks.len(), 1);
    }
}
