//! Blockchain Service
//!
//! Proof digest를 on-chain registry에 anchor 한다.
//!
//! # Features
//! - `anchorProof` 트랜잭션 (gas 추정 + 20% buffer)
//! - Confirmation 대기: 대기별 timeout + bounded exponential backoff
//! - Revert reason 우선 에러 메시지
//! - Health probe (block, balance, chain id)

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::utils::format_ether;
use serde::Serialize;
use thiserror::Error;

use crate::types::{Bytes32, EthAddress};

abigen!(
    ProofRegistry,
    r#"[
        function anchorProof(bytes32 contestId, uint256 gameId, address player, uint256 attemptIndex, bytes32 proofHash, bytes32 commitmentHash, bytes32 userAnswerHash, bool matches, string cid) external
    ]"#
);

type OracleClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Backoff 상한
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// 블록체인 네트워크 설정
#[derive(Clone)]
pub struct LedgerConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    /// Registry 컨트랙트 주소
    pub contract_address: String,
    /// Oracle 서명 키 (hex)
    pub private_key: String,
    /// 트랜잭션 explorer prefix (`{base}{txHash}`)
    pub explorer_base_url: String,
    /// 필요한 confirmation 수
    pub confirmations: usize,
    /// confirmation 대기 1회당 timeout
    pub confirmation_timeout: Duration,
    /// timeout 이후 재시도 횟수
    pub confirmation_retries: u32,
    pub retry_backoff: Duration,
    /// receipt polling 간격
    pub poll_interval: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            chain_id: 11155111, // Sepolia
            contract_address: String::new(),
            private_key: String::new(),
            explorer_base_url: "https://sepolia.etherscan.io/tx/".to_string(),
            confirmations: 1,
            confirmation_timeout: Duration::from_secs(120),
            confirmation_retries: 3,
            retry_backoff: Duration::from_millis(2_000),
            poll_interval: Duration::from_secs(2),
        }
    }
}

impl fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("rpc_url", &self.rpc_url)
            .field("chain_id", &self.chain_id)
            .field("contract_address", &self.contract_address)
            .field("private_key", &"<redacted>")
            .field("confirmations", &self.confirmations)
            .field("confirmation_timeout", &self.confirmation_timeout)
            .field("confirmation_retries", &self.confirmation_retries)
            .finish()
    }
}

/// `anchorProof` 인자 (순서 고정)
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorRequest {
    pub contest_id: Bytes32,
    pub game_id: u64,
    pub player: EthAddress,
    /// anchor 식별자 (commitment-only anchor는 0)
    pub attempt_index: u64,
    pub proof_hash: Bytes32,
    pub commitment_hash: Bytes32,
    pub user_answer_hash: Bytes32,
    pub matches: bool,
    pub cid: String,
}

impl AnchorRequest {
    /// Commitment 생성 시 anchor (zero address, index 0, zero user hash)
    pub fn commitment_only(
        contest_id: Bytes32,
        game_id: u64,
        proof_hash: Bytes32,
        commitment_hash: Bytes32,
        cid: String,
    ) -> Self {
        Self {
            contest_id,
            game_id,
            player: EthAddress::zero(),
            attempt_index: 0,
            proof_hash,
            commitment_hash,
            user_answer_hash: Bytes32::ZERO,
            matches: false,
            cid,
        }
    }
}

/// Confirmation 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorReceipt {
    pub tx_hash: String,
    pub block_number: Option<u64>,
    pub anchor_id: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerHealth {
    pub block_number: u64,
    pub oracle_address: String,
    pub balance_eth: String,
    pub chain_id: u64,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger misconfigured: {0}")]
    Config(String),

    #[error("gas estimation failed: {0}")]
    Estimation(String),

    #[error("transaction submission failed: {0}")]
    Submission(String),

    #[error("transaction {tx_hash} not confirmed after {attempts} attempts")]
    ConfirmationTimeout { tx_hash: String, attempts: u32 },

    #[error("transaction {0} dropped before confirmation")]
    Dropped(String),

    #[error("transaction {0} reverted")]
    Reverted(String),

    #[error("ledger RPC error: {0}")]
    Rpc(String),
}

/// Append-only registry capability
#[async_trait]
pub trait LedgerAnchor: Send + Sync {
    /// 트랜잭션 제출 후 confirmation까지 대기
    async fn anchor_proof(&self, request: AnchorRequest) -> Result<AnchorReceipt, LedgerError>;

    fn explorer_url(&self, tx_hash: &str) -> String;
}

/// n번째 재시도 전 대기 시간 (`base * 2^n`, 상한 30초)
pub fn retry_backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.min(16)))
        .min(MAX_BACKOFF)
}

pub fn explorer_link(base: &str, tx_hash: &str) -> String {
    if base.ends_with('/') || base.ends_with('=') {
        format!("{}{}", base, tx_hash)
    } else {
        format!("{}/{}", base, tx_hash)
    }
}

/// Revert reason이 있으면 우선 사용
fn describe_contract_error<M: Middleware>(err: &ContractError<M>) -> String {
    match err.decode_revert::<String>() {
        Some(reason) => format!("execution reverted: {}", reason),
        None => err.to_string(),
    }
}

/// Blockchain Service
///
/// # Example
/// ```ignore
/// let service = BlockchainService::connect(config).await?;
/// let receipt = service.anchor_proof(request).await?;
/// println!("Anchored in {}", receipt.tx_hash);
/// ```
pub struct BlockchainService {
    config: LedgerConfig,
    client: Arc<OracleClient>,
    registry: ProofRegistry<OracleClient>,
}

impl BlockchainService {
    /// RPC 연결 + 서명 지갑 + registry 바인딩
    pub async fn connect(config: LedgerConfig) -> Result<Self, LedgerError> {
        if config.contract_address.is_empty() {
            return Err(LedgerError::Config("CONTRACT_ADDRESS is not set".to_string()));
        }
        if config.private_key.is_empty() {
            return Err(LedgerError::Config("ORACLE_PRIVATE_KEY is not set".to_string()));
        }

        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| LedgerError::Config(format!("invalid RPC_URL: {}", e)))?
            .interval(config.poll_interval);
        let wallet = config
            .private_key
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .map_err(|e| LedgerError::Config(format!("invalid ORACLE_PRIVATE_KEY: {}", e)))?
            .with_chain_id(config.chain_id);
        let address = EthAddress::new(&config.contract_address)
            .map_err(LedgerError::Config)?
            .as_address();

        let client = Arc::new(SignerMiddleware::new(provider, wallet));
        let registry = ProofRegistry::new(address, client.clone());

        tracing::info!(
            rpc_url = %config.rpc_url,
            chain_id = config.chain_id,
            oracle = ?client.address(),
            "Ledger client ready"
        );

        // 주소에 bytecode가 없으면 모든 anchor가 실패
        match client.get_code(address, None).await {
            Ok(code) if code.is_empty() => {
                tracing::error!(contract = %config.contract_address, "No contract code at registry address")
            }
            Ok(code) => tracing::info!(code_len = code.len(), "Registry contract detected"),
            Err(e) => tracing::warn!("Failed to fetch registry code: {}", e),
        }

        Ok(Self {
            config,
            client,
            registry,
        })
    }

    pub async fn health(&self) -> Result<LedgerHealth, LedgerError> {
        let rpc = |e: ProviderError| LedgerError::Rpc(e.to_string());

        let block_number = self
            .client
            .provider()
            .get_block_number()
            .await
            .map_err(rpc)?;
        let balance = self
            .client
            .provider()
            .get_balance(self.client.address(), None)
            .await
            .map_err(rpc)?;
        let chain_id = self.client.provider().get_chainid().await.map_err(rpc)?;

        Ok(LedgerHealth {
            block_number: block_number.as_u64(),
            oracle_address: format!("{:?}", self.client.address()),
            balance_eth: format_ether(balance),
            chain_id: chain_id.as_u64(),
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Receipt 대기 (timeout + backoff 재시도)
    ///
    /// 모든 시도가 실패하면 DB는 갱신되지 않은 상태로 남고, 같은 workflow 재실행이 안전하다.
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TransactionReceipt, LedgerError> {
        let tx_label = format!("{:?}", tx_hash);
        let attempts = self.config.confirmation_retries + 1;

        for attempt in 0..attempts {
            let pending = PendingTransaction::new(tx_hash, self.client.provider())
                .confirmations(self.config.confirmations)
                .interval(self.config.poll_interval);

            match tokio::time::timeout(self.config.confirmation_timeout, pending).await {
                Ok(Ok(Some(receipt))) => return Ok(receipt),
                Ok(Ok(None)) => return Err(LedgerError::Dropped(tx_label)),
                Ok(Err(e)) => tracing::warn!(tx = %tx_label, attempt, "Receipt poll failed: {}", e),
                Err(_) => tracing::warn!(tx = %tx_label, attempt, "Confirmation wait timed out"),
            }

            if attempt + 1 < attempts {
                tokio::time::sleep(retry_backoff(self.config.retry_backoff, attempt)).await;
            }
        }

        Err(LedgerError::ConfirmationTimeout {
            tx_hash: tx_label,
            attempts,
        })
    }
}

#[async_trait]
impl LedgerAnchor for BlockchainService {
    async fn anchor_proof(&self, request: AnchorRequest) -> Result<AnchorReceipt, LedgerError> {
        let call = self.registry.anchor_proof(
            request.contest_id.0,
            U256::from(request.game_id),
            request.player.as_address(),
            U256::from(request.attempt_index),
            request.proof_hash.0,
            request.commitment_hash.0,
            request.user_answer_hash.0,
            request.matches,
            request.cid.clone(),
        );

        let gas = call
            .estimate_gas()
            .await
            .map_err(|e| LedgerError::Estimation(describe_contract_error(&e)))?;
        // 20% buffer
        let call = call.gas(gas * U256::from(120) / U256::from(100));

        let tx_hash = call
            .send()
            .await
            .map_err(|e| LedgerError::Submission(describe_contract_error(&e)))?
            .tx_hash();

        tracing::info!(
            tx = ?tx_hash,
            anchor_id = request.attempt_index,
            matches = request.matches,
            "anchorProof submitted"
        );

        let receipt = self.wait_for_receipt(tx_hash).await?;
        let tx_label = format!("{:?}", tx_hash);
        if receipt.status != Some(U64::from(1)) {
            tracing::error!(tx = %tx_label, "anchorProof reverted");
            return Err(LedgerError::Reverted(tx_label));
        }

        let block_number = receipt.block_number.map(|b| b.as_u64());
        tracing::info!(tx = %tx_label, block = ?block_number, "anchorProof confirmed");

        Ok(AnchorReceipt {
            tx_hash: tx_label,
            block_number,
            anchor_id: request.attempt_index,
        })
    }

    fn explorer_url(&self, tx_hash: &str) -> String {
        explorer_link(&self.config.explorer_base_url, tx_hash)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_targets_sepolia() {
        let config = LedgerConfig::default();

        assert_eq!(config.chain_id, 11155111);
        assert_eq!(config.confirmations, 1);
        assert!(config.confirmation_retries > 0);
    }

    #[test]
    fn test_config_debug_redacts_key() {
        let config = LedgerConfig {
            private_key: "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
                .to_string(),
            ..Default::default()
        };

        let debug = format!("{:?}", config);
        assert!(!debug.contains("ac0974"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_retry_backoff_is_bounded() {
        let base = Duration::from_millis(2_000);

        assert_eq!(retry_backoff(base, 0), Duration::from_millis(2_000));
        assert_eq!(retry_backoff(base, 1), Duration::from_millis(4_000));
        assert_eq!(retry_backoff(base, 2), Duration::from_millis(8_000));
        assert_eq!(retry_backoff(base, 10), MAX_BACKOFF);
        assert_eq!(retry_backoff(base, u32::MAX), MAX_BACKOFF);
    }

    #[test]
    fn test_explorer_link() {
        assert_eq!(
            explorer_link("https://sepolia.etherscan.io/tx/", "0xabc"),
            "https://sepolia.etherscan.io/tx/0xabc"
        );
        assert_eq!(
            explorer_link("https://sepolia.etherscan.io/tx", "0xabc"),
            "https://sepolia.etherscan.io/tx/0xabc"
        );
    }

    #[test]
    fn test_commitment_only_anchor_arguments() {
        let request = AnchorRequest::commitment_only(
            Bytes32::keccak256(b"contest"),
            7,
            Bytes32::keccak256(b"proof"),
            Bytes32::keccak256(b"commitment"),
            String::new(),
        );

        assert_eq!(request.player, EthAddress::zero());
        assert_eq!(request.attempt_index, 0);
        assert_eq!(request.user_answer_hash, Bytes32::ZERO);
        assert!(!request.matches);
    }

    #[tokio::test]
    async fn test_connect_requires_contract_and_key() {
        let missing_contract = BlockchainService::connect(LedgerConfig::default()).await;
        assert!(matches!(missing_contract, Err(LedgerError::Config(_))));

        let missing_key = BlockchainService::connect(LedgerConfig {
            contract_address: "0x1234567890123456789012345678901234567890".to_string(),
            ..Default::default()
        })
        .await;
        assert!(matches!(missing_key, Err(LedgerError::Config(_))));
    }

    #[tokio::test]
    async fn test_mock_ledger_records_anchor_order() {
        let ledger = mock::MockLedger::new();

        let first = ledger
            .anchor_proof(AnchorRequest::commitment_only(
                Bytes32::ZERO,
                1,
                Bytes32::keccak256(b"p1"),
                Bytes32::keccak256(b"c1"),
                "bafy1".to_string(),
            ))
            .await
            .unwrap();

        assert_eq!(first.anchor_id, 0);
        assert_eq!(ledger.anchor_count(), 1);
        assert_eq!(ledger.last_anchor().unwrap().cid, "bafy1");
        assert!(ledger.explorer_url(&first.tx_hash).ends_with(&first.tx_hash));
    }
}
