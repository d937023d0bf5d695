//! ZK Prover Service - Noir / UltraHonk Integration
//!
//! # Interview Q&A
//!
//! Q: 이 서비스는 회로를 직접 구현하는가?
//! A: 아니오. 회로는 미리 컴파일된 Noir 프로젝트로 취급
//!
//!    1. Witness 생성 (`nargo execute`)
//!       - private input (answer, salt)과 public input (matches) 준비
//!       - 회로가 내부 assertion을 검사하고 public output 계산
//!
//!    2. Proof 생성 (`bb prove`)
//!       - witness → UltraHonk proof + public inputs
//!       - CPU 집약적 작업 → 별도 프로세스에서 실행되어 요청 스레드를 막지 않음
//!
//!    3. Proof 검증 (`bb verify`)
//!       - 회로별 verification key로 검증
//!       - 잘못된 proof는 에러가 아니라 `false`
//!
//! Q: Comparison 회로의 `matches` 플래그는 왜 신뢰할 수 있는가?
//! A: 회로가 두 답변 벡터의 동등성을 직접 계산하고 claimed `matches`와 같다고 assert
//!    - 틀린 플래그로는 유효한 proof를 만들 수 없음
//!    - 서버의 off-circuit 비교는 어떤 값을 주장할지 정하는 용도일 뿐

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::{RwLock, Semaphore};
use uuid::Uuid;

use crate::services::field_encoder::{
    encode_scalar, encode_text, vectors_equal, EncodeError, FieldElement, ANSWER_SLOTS,
};
use crate::types::{AnswerResult, Bytes32};

/// 사용 가능한 회로
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitKind {
    /// answer + salt를 안다는 증명, output = commitment
    AnswerExistence,
    /// user answer와 secret answer 비교, output = (commitment, user answer hash)
    AnswerComparison,
}

impl CircuitKind {
    pub fn name(&self) -> &'static str {
        match self {
            CircuitKind::AnswerExistence => "answer_existence",
            CircuitKind::AnswerComparison => "answer_comparison",
        }
    }

    /// 회로 반환값 개수
    pub fn output_count(&self) -> usize {
        match self {
            CircuitKind::AnswerExistence => 1,
            CircuitKind::AnswerComparison => 2,
        }
    }
}

impl fmt::Display for CircuitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum ProverError {
    #[error("input encoding failed: {0}")]
    Encoding(#[from] EncodeError),

    #[error("{circuit} execution failed: {reason}")]
    Execution { circuit: CircuitKind, reason: String },

    #[error("{circuit} proving failed: {reason}")]
    Proving { circuit: CircuitKind, reason: String },

    #[error("{circuit} public outputs inconsistent: {reason}")]
    OutputMismatch { circuit: CircuitKind, reason: String },

    #[error("prover unavailable: {0}")]
    Unavailable(String),

    #[error("prover I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// 회로 입력 값
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    Field(FieldElement),
    Array(Vec<FieldElement>),
    Bool(bool),
}

/// 이름이 붙은 회로 입력 (순서 유지)
#[derive(Debug, Clone, Default)]
pub struct CircuitInputs {
    entries: Vec<(String, InputValue)>,
}

impl CircuitInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, value: FieldElement) -> Self {
        self.entries.push((name.to_string(), InputValue::Field(value)));
        self
    }

    pub fn array(mut self, name: &str, values: Vec<FieldElement>) -> Self {
        self.entries.push((name.to_string(), InputValue::Array(values)));
        self
    }

    pub fn boolean(mut self, name: &str, value: bool) -> Self {
        self.entries.push((name.to_string(), InputValue::Bool(value)));
        self
    }

    pub fn get(&self, name: &str) -> Option<&InputValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_field(&self, name: &str) -> Option<FieldElement> {
        match self.get(name) {
            Some(InputValue::Field(f)) => Some(*f),
            _ => None,
        }
    }

    pub fn get_array(&self, name: &str) -> Option<&[FieldElement]> {
        match self.get(name) {
            Some(InputValue::Array(v)) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name) {
            Some(InputValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Noir `Prover.toml` 형식으로 렌더링
    pub fn to_prover_toml(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.entries {
            let rendered = match value {
                InputValue::Field(f) => format!("\"{}\"", f),
                InputValue::Bool(b) => b.to_string(),
                InputValue::Array(values) => {
                    let items: Vec<String> = values.iter().map(|f| format!("\"{}\"", f)).collect();
                    format!("[{}]", items.join(", "))
                }
            };
            out.push_str(&format!("{} = {}\n", name, rendered));
        }
        out
    }
}

/// 회로 실행 결과
pub struct Witness {
    pub circuit: CircuitKind,
    /// backend 고유 witness 인코딩 (Noir: gzip witness stack)
    pub bytes: Vec<u8>,
    /// 회로 반환값
    pub public_outputs: Vec<FieldElement>,
}

/// 생성된 proof와 public inputs
#[derive(Debug, Clone)]
pub struct ProofArtifact {
    pub circuit: CircuitKind,
    pub proof: Vec<u8>,
    pub public_inputs: Vec<FieldElement>,
}

impl ProofArtifact {
    pub fn proof_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.proof))
    }

    /// proof blob의 Keccak256 (회로 digest와 독립적인 감사용 digest)
    pub fn proof_hash(&self) -> Bytes32 {
        Bytes32::keccak256(&self.proof)
    }

    /// bb `public_inputs` 파일 형식 (32-byte big-endian 연속)
    pub fn public_inputs_bytes(&self) -> Vec<u8> {
        self.public_inputs
            .iter()
            .flat_map(|f| f.to_bytes32().0)
            .collect()
    }
}

/// Proof 생성 capability
///
/// Noir CLI 구현과 테스트용 mock이 같은 인터페이스를 공유
#[async_trait]
pub trait ProvingBackend: Send + Sync {
    /// backend 식별자 (proof package metadata)
    fn name(&self) -> &'static str;

    async fn execute(
        &self,
        circuit: CircuitKind,
        private_inputs: &CircuitInputs,
        public_inputs: &CircuitInputs,
    ) -> Result<Witness, ProverError>;

    async fn prove(&self, witness: &Witness) -> Result<ProofArtifact, ProverError>;

    /// 잘못된 proof는 에러 대신 `false`
    async fn verify(&self, artifact: &ProofArtifact) -> bool;
}

/// Existence 증명 결과
#[derive(Debug, Clone)]
pub struct ExistenceProof {
    pub artifact: ProofArtifact,
    pub commitment_hash: Bytes32,
    pub proving_time_ms: u64,
}

/// Comparison 증명 결과
#[derive(Debug, Clone)]
pub struct ComparisonProof {
    pub artifact: ProofArtifact,
    pub commitment_hash: Bytes32,
    pub user_answer_hash: Bytes32,
    pub matches: bool,
    pub proving_time_ms: u64,
}

impl ComparisonProof {
    pub fn result(&self) -> AnswerResult {
        AnswerResult::from_matches(self.matches)
    }

    /// 외부 공개용 public inputs `[commitment, userAnswerHash, matches]`
    pub fn public_inputs(&self) -> Vec<String> {
        public_inputs_view(
            &self.commitment_hash.to_hex(),
            &self.user_answer_hash.to_hex(),
            self.matches,
        )
    }
}

pub fn public_inputs_view(commitment: &str, user_answer: &str, matches: bool) -> Vec<String> {
    vec![
        commitment.to_string(),
        user_answer.to_string(),
        if matches { "1" } else { "0" }.to_string(),
    ]
}

/// ZK Prover 서비스
///
/// # Architecture
///
/// ```text
/// ┌──────────────────────────────────────────────────────┐
/// │                      ZKProver                        │
/// │  field encoding → execute → prove → output check     │
/// │          │                                           │
/// │          v                                           │
/// │  ┌──────────────────────────────────────────────┐    │
/// │  │ ProvingBackend (NoirBackend | MockBackend)   │    │
/// │  └──────────────────────────────────────────────┘    │
/// │  Semaphore: 동시 proof 생성 수 제한                     │
/// └──────────────────────────────────────────────────────┘
/// ```
pub struct ZKProver {
    backend: Arc<dyn ProvingBackend>,
    permits: Semaphore,
}

impl ZKProver {
    pub fn new(backend: Arc<dyn ProvingBackend>, max_concurrent_proofs: usize) -> Self {
        Self {
            backend,
            permits: Semaphore::new(max_concurrent_proofs.max(1)),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// 답변 존재 증명 생성
    ///
    /// # Circuit Logic
    ///
    /// ```text
    /// Private inputs: answer[8], salt
    /// Public output:  commitment = H(answer, salt)
    /// ```
    pub async fn prove_answer_exists(
        &self,
        answer: &str,
        salt: &str,
    ) -> Result<ExistenceProof, ProverError> {
        let circuit = CircuitKind::AnswerExistence;
        let private_inputs = CircuitInputs::new()
            .array("answer", encode_text(answer, ANSWER_SLOTS))
            .field("salt", encode_scalar(salt)?);

        let (witness, artifact, proving_time_ms) = self
            .run_circuit(circuit, &private_inputs, &CircuitInputs::new())
            .await?;

        tracing::info!(
            circuit = circuit.name(),
            proving_time_ms,
            "Existence proof generated"
        );

        Ok(ExistenceProof {
            commitment_hash: witness.public_outputs[0].to_bytes32(),
            artifact,
            proving_time_ms,
        })
    }

    /// 답변 비교 증명 생성
    ///
    /// `matches`는 회로 밖에서 먼저 계산되고, 회로가 그 값을 다시 assert 한다.
    pub async fn prove_answer_comparison(
        &self,
        user_answer: &str,
        secret_answer: &str,
        salt: &str,
    ) -> Result<ComparisonProof, ProverError> {
        let matches = vectors_equal(
            &encode_text(user_answer, ANSWER_SLOTS),
            &encode_text(secret_answer, ANSWER_SLOTS),
        );
        self.prove_comparison_claim(user_answer, secret_answer, salt, matches)
            .await
    }

    /// 주어진 claimed `matches`로 비교 증명 생성
    pub(crate) async fn prove_comparison_claim(
        &self,
        user_answer: &str,
        secret_answer: &str,
        salt: &str,
        claimed_matches: bool,
    ) -> Result<ComparisonProof, ProverError> {
        let circuit = CircuitKind::AnswerComparison;
        let public_inputs = CircuitInputs::new().boolean("matches", claimed_matches);
        let private_inputs = CircuitInputs::new()
            .array("secret_answer", encode_text(secret_answer, ANSWER_SLOTS))
            .field("salt", encode_scalar(salt)?)
            .array("user_answer", encode_text(user_answer, ANSWER_SLOTS));

        let (witness, artifact, proving_time_ms) = self
            .run_circuit(circuit, &private_inputs, &public_inputs)
            .await?;

        tracing::info!(
            circuit = circuit.name(),
            proving_time_ms,
            matches = claimed_matches,
            "Comparison proof generated"
        );

        Ok(ComparisonProof {
            commitment_hash: witness.public_outputs[0].to_bytes32(),
            user_answer_hash: witness.public_outputs[1].to_bytes32(),
            matches: claimed_matches,
            artifact,
            proving_time_ms,
        })
    }

    /// Proof 검증
    pub async fn verify_proof(&self, artifact: &ProofArtifact) -> bool {
        let valid = self.backend.verify(artifact).await;
        if valid {
            tracing::debug!(circuit = artifact.circuit.name(), "Proof valid");
        } else {
            tracing::warn!(circuit = artifact.circuit.name(), "Proof invalid");
        }
        valid
    }

    async fn run_circuit(
        &self,
        circuit: CircuitKind,
        private_inputs: &CircuitInputs,
        public_inputs: &CircuitInputs,
    ) -> Result<(Witness, ProofArtifact, u64), ProverError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ProverError::Unavailable("prover is shutting down".to_string()))?;

        let start = Instant::now();
        let witness = self
            .backend
            .execute(circuit, private_inputs, public_inputs)
            .await?;

        if witness.public_outputs.len() != circuit.output_count() {
            return Err(ProverError::OutputMismatch {
                circuit,
                reason: format!(
                    "expected {} outputs, got {}",
                    circuit.output_count(),
                    witness.public_outputs.len()
                ),
            });
        }

        let artifact = self.backend.prove(&witness).await?;
        let proving_time_ms = start.elapsed().as_millis() as u64;

        // proof의 public inputs 끝부분 = 회로 반환값
        if !artifact.public_inputs.ends_with(&witness.public_outputs) {
            return Err(ProverError::OutputMismatch {
                circuit,
                reason: "proof public inputs do not end with circuit outputs".to_string(),
            });
        }

        Ok((witness, artifact, proving_time_ms))
    }
}

// ============================================================================
// Noir CLI backend
// ============================================================================

/// Noir/bb 실행 설정
#[derive(Debug, Clone)]
pub struct ProverConfig {
    /// `nargo` 실행 파일
    pub nargo_bin: String,
    /// `bb` (Barretenberg) 실행 파일
    pub bb_bin: String,
    /// 컴파일된 회로 프로젝트 디렉토리 (`<dir>/answer_existence`, `<dir>/answer_comparison`)
    pub circuits_dir: PathBuf,
    /// 임시 작업 디렉토리
    pub scratch_dir: PathBuf,
    /// 동시 proof 생성 수
    pub max_concurrent_proofs: usize,
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            nargo_bin: "nargo".to_string(),
            bb_bin: "bb".to_string(),
            circuits_dir: PathBuf::from("circuits"),
            scratch_dir: std::env::temp_dir(),
            max_concurrent_proofs: 2,
        }
    }
}

/// 요청별 임시 디렉토리 (drop 시 삭제)
struct ScratchDir(PathBuf);

impl ScratchDir {
    async fn create(base: &Path) -> std::io::Result<Self> {
        let path = base.join(format!("zk-oracle-{}", Uuid::new_v4().simple()));
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self(path))
    }

    fn join(&self, name: &str) -> PathBuf {
        self.0.join(name)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

/// Noir CLI 기반 UltraHonk backend
///
/// # Design Decision
///
/// Verification key는 회로별로 한 번만 생성 (lazy + 캐싱)
/// - `bb write_vk`는 비용이 큼
/// - 첫 번째 verify 요청 시에만 생성
pub struct NoirBackend {
    config: ProverConfig,
    verification_keys: RwLock<HashMap<CircuitKind, Vec<u8>>>,
}

impl NoirBackend {
    pub fn new(config: ProverConfig) -> Self {
        for circuit in [CircuitKind::AnswerExistence, CircuitKind::AnswerComparison] {
            let artifact = artifact_path(&config.circuits_dir, circuit);
            if artifact.exists() {
                tracing::info!(circuit = circuit.name(), "Circuit artifact found");
            } else {
                tracing::warn!(
                    circuit = circuit.name(),
                    path = %artifact.display(),
                    "Circuit artifact missing (run `nargo compile` in the circuit directory)"
                );
            }
        }

        Self {
            config,
            verification_keys: RwLock::new(HashMap::new()),
        }
    }

    fn program_dir(&self, circuit: CircuitKind) -> PathBuf {
        self.config.circuits_dir.join(circuit.name())
    }

    async fn run(&self, command: &mut Command) -> Result<Output, ProverError> {
        command
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ProverError::Unavailable(format!("failed to spawn prover tool: {}", e)))
    }

    async fn ensure_verification_key(&self, circuit: CircuitKind) -> Result<Vec<u8>, ProverError> {
        {
            let read_guard = self.verification_keys.read().await;
            if let Some(vk) = read_guard.get(&circuit) {
                return Ok(vk.clone());
            }
        }

        let mut write_guard = self.verification_keys.write().await;

        // write lock 획득 후 재확인
        if let Some(vk) = write_guard.get(&circuit) {
            return Ok(vk.clone());
        }

        tracing::info!(circuit = circuit.name(), "Generating verification key...");

        let scratch = ScratchDir::create(&self.config.scratch_dir).await?;
        let artifact = artifact_path(&self.config.circuits_dir, circuit);
        let output = self
            .run(
                Command::new(&self.config.bb_bin)
                    .arg("write_vk")
                    .arg("-b")
                    .arg(&artifact)
                    .arg("-o")
                    .arg(&scratch.0),
            )
            .await?;
        if !output.status.success() {
            return Err(ProverError::Proving {
                circuit,
                reason: format!("write_vk failed: {}", stderr_of(&output)),
            });
        }

        let vk = tokio::fs::read(scratch.join("vk")).await?;
        write_guard.insert(circuit, vk.clone());

        tracing::info!(circuit = circuit.name(), "Verification key cached");
        Ok(vk)
    }

    async fn verify_inner(&self, artifact: &ProofArtifact) -> Result<bool, ProverError> {
        let vk = self.ensure_verification_key(artifact.circuit).await?;

        let scratch = ScratchDir::create(&self.config.scratch_dir).await?;
        let (vk_path, proof_path, inputs_path) = (
            scratch.join("vk"),
            scratch.join("proof"),
            scratch.join("public_inputs"),
        );
        tokio::fs::write(&vk_path, &vk).await?;
        tokio::fs::write(&proof_path, &artifact.proof).await?;
        tokio::fs::write(&inputs_path, artifact.public_inputs_bytes()).await?;

        let output = self
            .run(
                Command::new(&self.config.bb_bin)
                    .arg("verify")
                    .arg("-k")
                    .arg(&vk_path)
                    .arg("-p")
                    .arg(&proof_path)
                    .arg("-i")
                    .arg(&inputs_path),
            )
            .await?;

        Ok(output.status.success())
    }
}

#[async_trait]
impl ProvingBackend for NoirBackend {
    fn name(&self) -> &'static str {
        "UltraHonk"
    }

    async fn execute(
        &self,
        circuit: CircuitKind,
        private_inputs: &CircuitInputs,
        public_inputs: &CircuitInputs,
    ) -> Result<Witness, ProverError> {
        let program_dir = self.program_dir(circuit);
        let run_id = Uuid::new_v4().simple().to_string();
        let prover_name = format!("Prover-{}", run_id);
        let witness_name = format!("witness-{}", run_id);

        // 입력 파일은 프로젝트 디렉토리 기준 상대 경로로만 지정 가능
        let toml_path = program_dir.join(format!("{}.toml", prover_name));
        let mut inputs = public_inputs.to_prover_toml();
        inputs.push_str(&private_inputs.to_prover_toml());
        tokio::fs::write(&toml_path, inputs).await?;

        let result = self
            .run(
                Command::new(&self.config.nargo_bin)
                    .arg("execute")
                    .arg("--program-dir")
                    .arg(&program_dir)
                    .arg("--prover-name")
                    .arg(&prover_name)
                    .arg(&witness_name),
            )
            .await;
        let _ = tokio::fs::remove_file(&toml_path).await;
        let output = result?;

        if !output.status.success() {
            return Err(ProverError::Execution {
                circuit,
                reason: stderr_of(&output),
            });
        }

        let witness_path = program_dir
            .join("target")
            .join(format!("{}.gz", witness_name));
        let bytes = tokio::fs::read(&witness_path).await?;
        let _ = tokio::fs::remove_file(&witness_path).await;

        let public_outputs = parse_circuit_output(&String::from_utf8_lossy(&output.stdout))
            .map_err(|reason| ProverError::OutputMismatch { circuit, reason })?;

        Ok(Witness {
            circuit,
            bytes,
            public_outputs,
        })
    }

    async fn prove(&self, witness: &Witness) -> Result<ProofArtifact, ProverError> {
        let circuit = witness.circuit;
        let scratch = ScratchDir::create(&self.config.scratch_dir).await?;
        let witness_path = scratch.join("witness.gz");
        tokio::fs::write(&witness_path, &witness.bytes).await?;

        let artifact = artifact_path(&self.config.circuits_dir, circuit);
        let output = self
            .run(
                Command::new(&self.config.bb_bin)
                    .arg("prove")
                    .arg("-b")
                    .arg(&artifact)
                    .arg("-w")
                    .arg(&witness_path)
                    .arg("-o")
                    .arg(&scratch.0),
            )
            .await?;
        if !output.status.success() {
            return Err(ProverError::Proving {
                circuit,
                reason: stderr_of(&output),
            });
        }

        let proof = tokio::fs::read(scratch.join("proof")).await?;
        let raw_inputs = tokio::fs::read(scratch.join("public_inputs")).await?;
        let public_inputs = parse_public_inputs(&raw_inputs)
            .map_err(|reason| ProverError::Proving { circuit, reason })?;

        Ok(ProofArtifact {
            circuit,
            proof,
            public_inputs,
        })
    }

    async fn verify(&self, artifact: &ProofArtifact) -> bool {
        match self.verify_inner(artifact).await {
            Ok(valid) => valid,
            Err(e) => {
                tracing::error!(circuit = artifact.circuit.name(), "Verification failed: {}", e);
                false
            }
        }
    }
}

fn artifact_path(circuits_dir: &Path, circuit: CircuitKind) -> PathBuf {
    circuits_dir
        .join(circuit.name())
        .join("target")
        .join(format!("{}.json", circuit.name()))
}

fn stderr_of(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        format!("exit status {}", output.status)
    } else {
        stderr
    }
}

/// `nargo execute` 출력에서 `Circuit output:` 값 추출
///
/// ```text
/// [answer_comparison] Circuit output: (0x1f.., 0x2e..)
/// ```
fn parse_circuit_output(stdout: &str) -> Result<Vec<FieldElement>, String> {
    let line = stdout
        .lines()
        .find_map(|l| l.split_once("Circuit output:").map(|(_, rest)| rest))
        .ok_or_else(|| "no circuit output in nargo stdout".to_string())?;

    line.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| token.starts_with("0x"))
        .map(|token| encode_scalar(token).map_err(|e| e.to_string()))
        .collect()
}

/// bb `public_inputs` 파일 파싱 (32-byte big-endian 원소 연속)
fn parse_public_inputs(raw: &[u8]) -> Result<Vec<FieldElement>, String> {
    if raw.len() % 32 != 0 {
        return Err(format!("public inputs length {} is not a multiple of 32", raw.len()));
    }
    Ok(raw.chunks(32).map(FieldElement::from_be_bytes_mod_order).collect())
}

/// Mock proving backend for testing (no Noir toolchain)
///
/// 회로 assertion이 성립할 때만 검증되는 proof를 만든다.
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const MOCK_VK: &[u8] = b"mock-ultra-honk-verification-key";

    #[derive(Default)]
    pub struct MockBackend {
        pub executions: AtomicUsize,
        pub proofs: AtomicUsize,
        pub fail_execution: AtomicBool,
        pub reject_all: AtomicBool,
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn proof_count(&self) -> usize {
            self.proofs.load(Ordering::SeqCst)
        }
    }

    pub fn hash_fields(domain: &[u8], fields: &[FieldElement]) -> FieldElement {
        let mut data = domain.to_vec();
        for f in fields {
            data.extend_from_slice(&f.to_bytes32().0);
        }
        FieldElement::from(Bytes32::keccak256(&data))
    }

    fn missing(circuit: CircuitKind, name: &str) -> ProverError {
        ProverError::Execution {
            circuit,
            reason: format!("missing input `{}`", name),
        }
    }

    fn seal(circuit: CircuitKind, public_inputs: &[FieldElement], satisfied: bool) -> Vec<u8> {
        let mut data = MOCK_VK.to_vec();
        data.extend_from_slice(circuit.name().as_bytes());
        for f in public_inputs {
            data.extend_from_slice(&f.to_bytes32().0);
        }
        data.push(satisfied as u8);
        Bytes32::keccak256(&data).0.to_vec()
    }

    #[async_trait]
    impl ProvingBackend for MockBackend {
        fn name(&self) -> &'static str {
            "MockHonk"
        }

        async fn execute(
            &self,
            circuit: CircuitKind,
            private_inputs: &CircuitInputs,
            public_inputs: &CircuitInputs,
        ) -> Result<Witness, ProverError> {
            self.executions.fetch_add(1, Ordering::SeqCst);
            if self.fail_execution.load(Ordering::SeqCst) {
                return Err(ProverError::Execution {
                    circuit,
                    reason: "mock execution failure".to_string(),
                });
            }

            // witness bytes: [satisfied, matches(없으면 2)]
            let (public_outputs, satisfied, claimed) = match circuit {
                CircuitKind::AnswerExistence => {
                    let answer = private_inputs
                        .get_array("answer")
                        .ok_or_else(|| missing(circuit, "answer"))?;
                    let salt = private_inputs
                        .get_field("salt")
                        .ok_or_else(|| missing(circuit, "salt"))?;

                    let mut preimage = answer.to_vec();
                    preimage.push(salt);
                    (vec![hash_fields(b"commit", &preimage)], true, 2u8)
                }
                CircuitKind::AnswerComparison => {
                    let matches = public_inputs
                        .get_bool("matches")
                        .ok_or_else(|| missing(circuit, "matches"))?;
                    let secret = private_inputs
                        .get_array("secret_answer")
                        .ok_or_else(|| missing(circuit, "secret_answer"))?;
                    let user = private_inputs
                        .get_array("user_answer")
                        .ok_or_else(|| missing(circuit, "user_answer"))?;
                    let salt = private_inputs
                        .get_field("salt")
                        .ok_or_else(|| missing(circuit, "salt"))?;

                    let mut commit_preimage = secret.to_vec();
                    commit_preimage.push(salt);
                    let mut user_preimage = user.to_vec();
                    user_preimage.push(salt);

                    (
                        vec![
                            hash_fields(b"commit", &commit_preimage),
                            hash_fields(b"user", &user_preimage),
                        ],
                        vectors_equal(secret, user) == matches,
                        matches as u8,
                    )
                }
            };

            Ok(Witness {
                circuit,
                bytes: vec![satisfied as u8, claimed],
                public_outputs,
            })
        }

        async fn prove(&self, witness: &Witness) -> Result<ProofArtifact, ProverError> {
            self.proofs.fetch_add(1, Ordering::SeqCst);

            let satisfied = witness.bytes.first().copied() == Some(1);
            let mut public_inputs = Vec::new();
            if let Some(claimed) = witness.bytes.get(1).copied().filter(|c| *c < 2) {
                public_inputs.push(FieldElement::from_u64(u64::from(claimed)));
            }
            public_inputs.extend_from_slice(&witness.public_outputs);

            Ok(ProofArtifact {
                circuit: witness.circuit,
                proof: seal(witness.circuit, &public_inputs, satisfied),
                public_inputs,
            })
        }

        async fn verify(&self, artifact: &ProofArtifact) -> bool {
            if self.reject_all.load(Ordering::SeqCst) {
                return false;
            }
            artifact.proof == seal(artifact.circuit, &artifact.public_inputs, true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockBackend;
    use super::*;

    const SECRET: &str = "OMEGA-742";
    const SALT: &str = "12345";

    fn prover() -> ZKProver {
        ZKProver::new(Arc::new(MockBackend::new()), 2)
    }

    #[tokio::test]
    async fn test_existence_proof_verifies() {
        let prover = prover();

        let proof = prover.prove_answer_exists(SECRET, SALT).await.unwrap();

        assert!(prover.verify_proof(&proof.artifact).await);
        assert_eq!(proof.artifact.public_inputs.len(), 1);
        assert_eq!(proof.artifact.public_inputs[0].to_bytes32(), proof.commitment_hash);
    }

    #[tokio::test]
    async fn test_existence_commitment_binds_answer_and_salt() {
        let prover = prover();

        let base = prover.prove_answer_exists(SECRET, SALT).await.unwrap();
        let other_salt = prover.prove_answer_exists(SECRET, "67890").await.unwrap();
        let other_answer = prover.prove_answer_exists("OMEGA-743", SALT).await.unwrap();
        let again = prover.prove_answer_exists(SECRET, SALT).await.unwrap();

        assert_ne!(base.commitment_hash, other_salt.commitment_hash);
        assert_ne!(base.commitment_hash, other_answer.commitment_hash);
        assert_eq!(base.commitment_hash, again.commitment_hash);
    }

    #[tokio::test]
    async fn test_comparison_wrong_answer_is_incorrect_and_verifies() {
        let prover = prover();

        let proof = prover
            .prove_answer_comparison("ALPHA-111", SECRET, SALT)
            .await
            .unwrap();

        assert_eq!(proof.result(), AnswerResult::Incorrect);
        assert!(!proof.matches);
        assert!(prover.verify_proof(&proof.artifact).await);
        assert_eq!(proof.public_inputs()[2], "0");
    }

    #[tokio::test]
    async fn test_comparison_correct_answer_verifies() {
        let prover = prover();

        let proof = prover
            .prove_answer_comparison(SECRET, SECRET, SALT)
            .await
            .unwrap();

        assert_eq!(proof.result(), AnswerResult::Correct);
        assert!(prover.verify_proof(&proof.artifact).await);
        assert_eq!(proof.public_inputs()[2], "1");
    }

    #[tokio::test]
    async fn test_comparison_commitment_matches_existence_commitment() {
        let prover = prover();

        let existence = prover.prove_answer_exists(SECRET, SALT).await.unwrap();
        let comparison = prover
            .prove_answer_comparison("ALPHA-111", SECRET, SALT)
            .await
            .unwrap();

        assert_eq!(existence.commitment_hash, comparison.commitment_hash);
    }

    #[tokio::test]
    async fn test_wrong_claimed_flag_fails_verification() {
        let prover = prover();

        for (user, claimed) in [("ALPHA-111", true), (SECRET, false)] {
            match prover
                .prove_comparison_claim(user, SECRET, SALT, claimed)
                .await
            {
                Ok(proof) => assert!(!prover.verify_proof(&proof.artifact).await),
                Err(ProverError::Execution { .. }) => {}
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
    }

    #[tokio::test]
    async fn test_truncated_answers_compare_equal() {
        // 8 slot을 넘는 byte는 무시됨
        let prover = prover();

        let proof = prover
            .prove_answer_comparison("OMEGA-749", SECRET, SALT)
            .await
            .unwrap();

        assert!(proof.matches);
    }

    #[tokio::test]
    async fn test_tampered_public_input_fails_verification() {
        let prover = prover();

        let proof = prover
            .prove_answer_comparison("ALPHA-111", SECRET, SALT)
            .await
            .unwrap();

        let mut flipped = proof.artifact.clone();
        flipped.public_inputs[0] = FieldElement::from_u64(1);
        assert!(!prover.verify_proof(&flipped).await);

        let mut garbage = proof.artifact.clone();
        garbage.proof = vec![0u8; 7];
        assert!(!prover.verify_proof(&garbage).await);
    }

    #[tokio::test]
    async fn test_malformed_salt_is_encoding_error() {
        let prover = prover();

        let err = prover.prove_answer_exists(SECRET, "0xnothex").await.unwrap_err();
        assert!(matches!(err, ProverError::Encoding(_)));
    }

    #[test]
    fn test_prover_toml_rendering() {
        let inputs = CircuitInputs::new()
            .boolean("matches", true)
            .field("salt", FieldElement::from_u64(7))
            .array("answer", encode_text("AB", 3));

        assert_eq!(
            inputs.to_prover_toml(),
            "matches = true\nsalt = \"7\"\nanswer = [\"65\", \"66\", \"0\"]\n"
        );
    }

    #[test]
    fn test_parse_circuit_output_tuple() {
        let stdout = "[answer_comparison] Circuit witness successfully solved\n\
                      [answer_comparison] Circuit output: (0x2a, 0x0f)\n";

        let outputs = parse_circuit_output(stdout).unwrap();
        assert_eq!(outputs, vec![FieldElement::from_u64(42), FieldElement::from_u64(15)]);
    }

    #[test]
    fn test_parse_circuit_output_missing() {
        assert!(parse_circuit_output("Circuit witness successfully solved").is_err());
    }

    #[test]
    fn test_parse_public_inputs() {
        let mut raw = vec![0u8; 64];
        raw[31] = 1;
        raw[63] = 9;

        let inputs = parse_public_inputs(&raw).unwrap();
        assert_eq!(inputs, vec![FieldElement::from_u64(1), FieldElement::from_u64(9)]);
        assert!(parse_public_inputs(&[0u8; 33]).is_err());
    }

    #[test]
    fn test_artifact_path_layout() {
        let path = artifact_path(Path::new("circuits"), CircuitKind::AnswerComparison);
        assert_eq!(
            path,
            PathBuf::from("circuits/answer_comparison/target/answer_comparison.json")
        );
    }
}
