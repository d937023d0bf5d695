//! Services Module
//!
//! 비즈니스 로직을 담당하는 서비스 레이어
//!
//! # Services
//! - `field_encoder`: 텍스트/salt → BN254 field 원소
//! - `ZKProver`: Noir 회로 proof 생성/검증
//! - `IpfsArchive`: proof package 저장소 (best-effort)
//! - `BlockchainService`: on-chain anchor
//! - `VerificationOracle`: 위 서비스를 묶는 workflow orchestrator

pub mod archive;
pub mod blockchain;
pub mod field_encoder;
pub mod oracle;
pub mod zk_prover;

pub use archive::{ArchiveConfig, ArchiveError, ArchiveReceipt, IpfsArchive, ProofArchive};
pub use blockchain::{
    AnchorReceipt, AnchorRequest, BlockchainService, LedgerAnchor, LedgerConfig, LedgerError,
    LedgerHealth,
};
pub use oracle::{
    ClaimPolicy, CommitmentOutcome, CreateCommitmentRequest, VerificationOracle,
    VerificationOutcome, VerifyResponseRequest,
};
pub use zk_prover::{
    CircuitKind, NoirBackend, ProofArtifact, ProverConfig, ProverError, ProvingBackend, ZKProver,
};
