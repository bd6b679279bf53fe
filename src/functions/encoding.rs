//! ABI encoding of script results and decoding of simulator responses.

use alloy::hex;
use alloy::primitives::{Bytes, I256, U256};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use std::fmt;

use crate::types::{FunctionsError, ReturnType};

/// Width of a uint256/int256 word.
const WORD_LEN: usize = 32;

/// Encode as a 32-byte big-endian word, like `Functions.encodeUint256`.
pub fn encode_uint256(value: U256) -> Bytes {
    Bytes::from(value.to_be_bytes::<WORD_LEN>().to_vec())
}

/// Convert a dollar amount to integer cents: `round(value * 100)`, with
/// halves rounded away from zero. Negative results are rejected.
pub fn to_cents(value: Decimal) -> Result<U256, FunctionsError> {
    let cents = value
        .checked_mul(dec!(100))
        .ok_or(FunctionsError::BalanceOutOfRange(value))?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    if cents < Decimal::ZERO {
        return Err(FunctionsError::NegativeBalance(value));
    }
    let cents = cents
        .to_u128()
        .ok_or(FunctionsError::BalanceOutOfRange(value))?;
    Ok(U256::from(cents))
}

/// A response decoded per the request's expected return type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedValue {
    Uint256(U256),
    Int256(I256),
    String(String),
    Bytes(Bytes),
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedValue::Uint256(v) => write!(f, "{v}"),
            DecodedValue::Int256(v) => write!(f, "{v}"),
            DecodedValue::String(s) => write!(f, "{s}"),
            DecodedValue::Bytes(b) => write!(f, "{}", hex::encode_prefixed(b)),
        }
    }
}

/// Decode a `0x`-prefixed response hex string.
pub fn decode_result(bytes_hex: &str, return_type: ReturnType) -> Result<DecodedValue, FunctionsError> {
    let decode_err = |message: String| FunctionsError::Decode { return_type, message };

    let bytes = hex::decode(bytes_hex).map_err(|e| decode_err(format!("invalid hex: {e}")))?;

    match return_type {
        ReturnType::Uint256 | ReturnType::Int256 => {
            if bytes.len() != WORD_LEN {
                return Err(decode_err(format!(
                    "expected {WORD_LEN} bytes, got {}",
                    bytes.len()
                )));
            }
            let word = U256::from_be_slice(&bytes);
            if return_type == ReturnType::Uint256 {
                Ok(DecodedValue::Uint256(word))
            } else {
                Ok(DecodedValue::Int256(I256::from_raw(word)))
            }
        }
        ReturnType::String => String::from_utf8(bytes)
            .map(DecodedValue::String)
            .map_err(|e| decode_err(format!("invalid UTF-8: {e}"))),
        ReturnType::Bytes => Ok(DecodedValue::Bytes(Bytes::from(bytes))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
