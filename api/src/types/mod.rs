//! Common Types Module
//!
//! 애플리케이션 전반에서 사용되는 공통 타입 정의
//! - `Bytes32`: digest / bytes32 컨트랙트 인자
//! - `EthAddress`: 정규화된 Ethereum 주소
//! - `ProofPackage`: Content Archive에 저장되는 proof 봉투

mod package;

pub use package::{
    AnswerResult, PackageKind, PackageMetadata, PackagePublicInputs, ProofPackage,
    PACKAGE_VERSION, PROVER_VERSION,
};

use std::fmt;
use std::str::FromStr;

use ethers::types::Address;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use uuid::Uuid;

/// 32-byte 값 (commitment hash, proof hash, contest id 등)
///
/// 직렬화 형식은 항상 `0x` + 64 hex (lowercase)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Bytes32(pub [u8; 32]);

impl Bytes32 {
    pub const ZERO: Self = Self([0u8; 32]);

    /// Keccak256 digest (ethers `keccak256`과 동일)
    pub fn keccak256(data: &[u8]) -> Self {
        let mut hasher = Keccak256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// hex 문자열 파싱 (짧은 값은 왼쪽 zero-padding)
    pub fn from_hex(s: &str) -> Result<Self, String> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if digits.len() > 64 {
            return Err(format!("hex value longer than 32 bytes: {} digits", digits.len()));
        }
        let padded = format!("{:0>64}", digits);
        let bytes = hex::decode(padded).map_err(|e| format!("Invalid hex: {}", e))?;

        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl fmt::Display for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Bytes32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Bytes32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Bytes32::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// UUID를 bytes32로 변환 (하위 16 bytes에 배치, 상위는 0)
///
/// 컨트랙트의 `contestId` 인자 형식
pub fn uuid_to_bytes32(id: Uuid) -> Bytes32 {
    let mut out = [0u8; 32];
    out[16..].copy_from_slice(id.as_bytes());
    Bytes32(out)
}

/// Ethereum 주소 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthAddress(Address);

impl EthAddress {
    /// `0x` + 40 hex 형식만 허용 (대소문자 무관, checksum 미검증)
    pub fn new(addr: &str) -> Result<Self, String> {
        let addr = addr.trim();
        let valid = addr.len() == 42
            && (addr.starts_with("0x") || addr.starts_with("0X"))
            && addr[2..].chars().all(|c| c.is_ascii_hexdigit());
        if !valid {
            return Err("Invalid Ethereum address format".to_string());
        }

        Address::from_str(&addr[2..])
            .map(Self)
            .map_err(|e| format!("Invalid Ethereum address: {}", e))
    }

    /// commitment-only anchor에 사용하는 zero address
    pub fn zero() -> Self {
        Self(Address::zero())
    }

    pub fn as_address(&self) -> Address {
        self.0
    }
}

impl fmt::Display for EthAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl Serialize for EthAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eth_address_valid() {
        let addr = EthAddress::new("0x1234567890ABCDEF123456789012345678901234").unwrap();
        assert_eq!(addr.to_string(), "0x1234567890abcdef123456789012345678901234");
    }

    #[test]
    fn test_eth_address_invalid() {
        assert!(EthAddress::new("invalid").is_err());
        assert!(EthAddress::new("0x12345").is_err());
        assert!(EthAddress::new("0xZZ34567890123456789012345678901234567890").is_err());
    }

    #[test]
    fn test_zero_address() {
        assert_eq!(
            EthAddress::zero().to_string(),
            "0x0000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn test_uuid_to_bytes32_pads_high_bytes() {
        let id = Uuid::parse_str("0f1e2d3c-4b5a-6978-8796-a5b4c3d2e1f0").unwrap();
        let b = uuid_to_bytes32(id);

        assert_eq!(
            b.to_hex(),
            "0x000000000000000000000000000000000f1e2d3c4b5a69788796a5b4c3d2e1f0"
        );
    }

    #[test]
    fn test_bytes32_hex_parsing() {
        let b = Bytes32::from_hex("0x01").unwrap();
        assert_eq!(b.0[31], 1);
        assert!(b.0[..31].iter().all(|x| *x == 0));

        assert!(Bytes32::from_hex(&format!("0x{}", "f".repeat(65))).is_err());
        assert!(Bytes32::from_hex("0xzz").is_err());
    }

    #[test]
    fn test_bytes32_serde_as_hex_string() {
        let b = Bytes32::keccak256(b"proof");
        let json = serde_json::to_string(&b).unwrap();
        assert_eq!(json, format!("\"{}\"", b.to_hex()));

        let back: Bytes32 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, b);
    }

    #[test]
    fn test_keccak_known_vector() {
        // keccak256("")
        assert_eq!(
            Bytes32::keccak256(b"").to_hex(),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }
}
