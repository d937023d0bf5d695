//! Field Encoder
//!
//! UTF-8 텍스트와 salt 값을 BN254 scalar field 원소로 변환한다.
//! Noir 회로 입력 형식과 동일해야 하며, 회로 밖에서 수행하는 동등성 비교도
//! 반드시 이 모듈의 결과를 사용해야 한다 (다르면 proof 검증 불가).
//!
//! # Encoding Rules
//!
//! ```text
//! encode_text("OMEGA-742", 8)
//!   bytes: 4F 4D 45 47 41 2D 37 34 32
//!   slots: [79, 77, 69, 71, 65, 45, 55, 52]   <- 9번째 byte(0x32)는 버려짐
//!
//! encode_scalar("0x...")  -> big-endian 정수 mod r
//! encode_scalar("12345")  -> 10진수를 그대로 field 원소로
//! ```

use std::fmt;

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField, Zero};
use thiserror::Error;

use crate::types::Bytes32;

/// 답변 벡터의 slot 수 (회로의 `[Field; 8]`)
pub const ANSWER_SLOTS: usize = 8;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("empty scalar value")]
    Empty,

    #[error("invalid hex scalar: {0}")]
    InvalidHex(String),

    #[error("invalid decimal scalar: {0}")]
    InvalidDecimal(String),
}

/// BN254 scalar field 원소
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FieldElement(Fr);

impl FieldElement {
    pub fn zero() -> Self {
        Self(Fr::zero())
    }

    pub fn from_u64(value: u64) -> Self {
        Self(Fr::from(value))
    }

    /// 임의 길이 big-endian bytes를 mod r로 축약
    pub fn from_be_bytes_mod_order(bytes: &[u8]) -> Self {
        Self(Fr::from_be_bytes_mod_order(bytes))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// 32-byte big-endian 표현 (digest 형식)
    pub fn to_bytes32(&self) -> Bytes32 {
        let bytes = self.0.into_bigint().to_bytes_be();
        let mut out = [0u8; 32];
        let start = 32usize.saturating_sub(bytes.len());
        out[start..].copy_from_slice(&bytes[bytes.len().saturating_sub(32)..]);
        Bytes32(out)
    }

    /// 10진수 표현 (회로 입력 형식)
    pub fn to_decimal(&self) -> String {
        self.0.into_bigint().to_string()
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_decimal())
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement({})", self.to_decimal())
    }
}

impl From<Bytes32> for FieldElement {
    fn from(value: Bytes32) -> Self {
        Self::from_be_bytes_mod_order(&value.0)
    }
}

/// 문자열을 `width`개의 field 원소로 인코딩
///
/// - slot i = UTF-8 byte i
/// - 남는 slot은 0으로 채움
/// - `width`를 넘는 byte는 조용히 잘림 (wrap/reject 하지 않음)
pub fn encode_text(value: &str, width: usize) -> Vec<FieldElement> {
    let mut slots = vec![FieldElement::zero(); width];
    for (slot, byte) in slots.iter_mut().zip(value.as_bytes()) {
        *slot = FieldElement::from_u64(u64::from(*byte));
    }
    slots
}

/// 단일 scalar 인코딩
///
/// `0x`/`0X` 접두사면 hex 정수를 mod r로 축약, 아니면 10진수 문자열을 field 원소로 해석
///
/// 공백은 정규화하지 않음 (`" 0x1"`은 잘못된 10진수)
pub fn encode_scalar(value: &str) -> Result<FieldElement, EncodeError> {
    if value.is_empty() {
        return Err(EncodeError::Empty);
    }

    if let Some(digits) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        if digits.is_empty() {
            return Err(EncodeError::InvalidHex(value.to_string()));
        }
        let normalized = if digits.len() % 2 == 1 {
            format!("0{}", digits)
        } else {
            digits.to_string()
        };
        let bytes = hex::decode(normalized)
            .map_err(|_| EncodeError::InvalidHex(value.to_string()))?;
        return Ok(FieldElement::from_be_bytes_mod_order(&bytes));
    }

    let ten = Fr::from(10u64);
    let mut acc = Fr::zero();
    for c in value.chars() {
        let digit = c
            .to_digit(10)
            .ok_or_else(|| EncodeError::InvalidDecimal(value.to_string()))?;
        acc = acc * ten + Fr::from(u64::from(digit));
    }
    Ok(FieldElement(acc))
}

/// 두 인코딩 벡터의 원소별 동등성 (회로 밖 advisory 비교)
pub fn vectors_equal(a: &[FieldElement], b: &[FieldElement]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODULUS_DEC: &str =
        "21888242871839275222246405745257275088548364400416034343698204186575808495617";
    const MODULUS_HEX: &str =
        "0x30644e72e131a029b85045b68181585d2833e84879b9709143e1f593f0000001";

    fn decimals(v: &[FieldElement]) -> Vec<String> {
        v.iter().map(|f| f.to_decimal()).collect()
    }

    #[test]
    fn test_encode_text_deterministic() {
        assert_eq!(encode_text("OMEGA-742", 8), encode_text("OMEGA-742", 8));
        assert_eq!(encode_scalar("0xabc"), encode_scalar("0xabc"));
    }

    #[test]
    fn test_encode_text_truncates_beyond_width() {
        // "OMEGA-742"는 9 bytes → 마지막 '2'(50)는 버려짐
        let slots = encode_text("OMEGA-742", 8);

        assert_eq!(slots.len(), 8);
        assert_eq!(
            decimals(&slots),
            vec!["79", "77", "69", "71", "65", "45", "55", "52"]
        );
        assert_eq!(encode_text("OMEGA-742", 8), encode_text("OMEGA-74", 8));
        assert!(!slots.iter().any(|f| f.to_decimal() == "50"));
    }

    #[test]
    fn test_encode_text_zero_pads() {
        let slots = encode_text("AB", 8);
        assert_eq!(decimals(&slots), vec!["65", "66", "0", "0", "0", "0", "0", "0"]);

        let empty = encode_text("", 8);
        assert!(empty.iter().all(|f| f.is_zero()));
    }

    #[test]
    fn test_encode_text_uses_utf8_bytes() {
        // 'é' = C3 A9
        let slots = encode_text("é", 4);
        assert_eq!(decimals(&slots), vec!["195", "169", "0", "0"]);
    }

    #[test]
    fn test_encode_scalar_decimal_passthrough() {
        assert_eq!(encode_scalar("12345").unwrap().to_decimal(), "12345");
        assert_eq!(encode_scalar("0").unwrap().to_decimal(), "0");
    }

    #[test]
    fn test_encode_scalar_hex_reduced_mod_r() {
        assert!(encode_scalar(MODULUS_HEX).unwrap().is_zero());

        let plus_one = "0x30644e72e131a029b85045b68181585d2833e84879b9709143e1f593f0000002";
        assert_eq!(encode_scalar(plus_one).unwrap().to_decimal(), "1");

        assert_eq!(encode_scalar("0xff").unwrap().to_decimal(), "255");
        assert_eq!(encode_scalar("0XF").unwrap().to_decimal(), "15");
    }

    #[test]
    fn test_encode_scalar_decimal_modulus_wraps() {
        assert!(encode_scalar(MODULUS_DEC).unwrap().is_zero());
    }

    #[test]
    fn test_encode_scalar_random_salt_width() {
        let salt = format!("0x{}", "ff".repeat(32));
        let encoded = encode_scalar(&salt).unwrap();
        assert!(!encoded.is_zero());
        assert_eq!(encoded.to_bytes32().to_hex().len(), 66);
    }

    #[test]
    fn test_encode_scalar_rejects_malformed() {
        assert_eq!(encode_scalar(""), Err(EncodeError::Empty));
        assert!(matches!(encode_scalar("0x"), Err(EncodeError::InvalidHex(_))));
        assert!(matches!(encode_scalar("0xzz"), Err(EncodeError::InvalidHex(_))));
        assert!(matches!(encode_scalar("12a"), Err(EncodeError::InvalidDecimal(_))));
    }

    #[test]
    fn test_encode_scalar_does_not_trim() {
        assert!(matches!(encode_scalar(" 0x1"), Err(EncodeError::InvalidDecimal(_))));
        assert!(matches!(encode_scalar("0x1 "), Err(EncodeError::InvalidHex(_))));
        assert!(matches!(encode_scalar("12 "), Err(EncodeError::InvalidDecimal(_))));
    }

    #[test]
    fn test_bytes32_round_trip() {
        let f = encode_scalar("0x2a").unwrap();
        let b = f.to_bytes32();
        assert_eq!(b.0[31], 0x2a);
        assert_eq!(FieldElement::from(b), f);
    }

    #[test]
    fn test_vectors_equal() {
        assert!(vectors_equal(&encode_text("OMEGA-742", 8), &encode_text("OMEGA-742", 8)));
        assert!(!vectors_equal(&encode_text("ALPHA-111", 8), &encode_text("OMEGA-742", 8)));
        assert!(!vectors_equal(&encode_text("A", 8), &encode_text("A", 4)));
    }
}
