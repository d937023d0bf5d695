//! ZK Answer Verification Oracle Library
//!
//! # Overview
//!
//! 게임 정답을 공개하지 않고 commitment로 고정한 뒤, 사용자 답변이 정답과 일치하는지를
//! ZK proof로 증명하고 IPFS + on-chain registry에 기록하는 백엔드.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                             API                               │
//! │                                                               │
//! │  ┌─────────┐   ┌──────────────────────────────┐   ┌────────┐  │
//! │  │ Routes  │──▶│      VerificationOracle      │──▶│   DB   │  │
//! │  └─────────┘   │  ZKProver  Archive  Ledger   │   └────────┘  │
//! │                └──────┬─────────┬───────┬─────┘               │
//! └───────────────────────┼─────────┼───────┼─────────────────────┘
//!                         ▼         ▼       ▼
//!                    nargo / bb    IPFS   ProofRegistry
//! ```
//!
//! ## Modules
//!
//! - `config`: 환경 설정 관리
//! - `error`: workflow 에러 및 HTTP 매핑
//! - `routes`: HTTP 엔드포인트 핸들러
//! - `services`: field encoder, prover, archive, ledger, orchestrator
//! - `db`: commitment / attempt 저장소
//! - `types`: 공통 타입 (Bytes32, EthAddress, ProofPackage)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use zk_answer_oracle::{config::Config, db::Database, services::*};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let db = Arc::new(Database::connect(&config.database_url).await?);
//!     let prover = ZKProver::new(Arc::new(NoirBackend::new(config.prover.clone())), 2);
//!     let archive = IpfsArchive::new(config.archive.clone())?;
//!     let ledger = BlockchainService::connect(config.ledger.clone()).await?;
//!
//!     let oracle = VerificationOracle::new(
//!         Arc::new(prover), Arc::new(archive), Arc::new(ledger), db.clone(), db.clone(), db,
//!     );
//!     // ... 서버 시작
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod services;
pub mod types;


// Re-exports for convenience
pub use config::Config;
pub use db::Database;
pub use error::{ApiError, OracleError};
pub use services::{BlockchainService, VerificationOracle};

/// 애플리케이션 전역 상태
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub oracle: Arc<VerificationOracle>,
    /// health probe 용 (anchor는 oracle을 통해서만)
    pub ledger: Arc<BlockchainService>,
    pub config: Arc<Config>,
}
