// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Schema-driven structural checks over decoded parameter mappings. Every
//! contract variant validates its parameters through here during
//! construction, so no invalid contract can reach execution. Checks are
//! fail-fast: the first violated field aborts with its name.


use kes_parameters::chain::supply_cap;
use kes_types::{Address, H256, U256};
use regex::Regex;
use std::str::FromStr;
use thiserror::Error;
use tlv_abi::{ParameterMap, ParameterValue};

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("parameter '{0}' is missing")]
    MissingField(String),

    #[error("parameter '{field}' has the wrong type, expected {expected}")]
    WrongType { field: String, expected: &'static str },

    #[error("parameter '{field}' is malformed, must be {kind}")]
    BadFormat { field: String, kind: &'static str },
}

/// Schema kinds. The three hex-string length classes are distinct kinds
/// because downstream big-integer and key parsing must reject malformed
/// input before any arithmetic happens.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamKind {
    /// Any signed 64-bit integer.
    Int,
    /// Integer in `0..=255`.
    Byte,
    /// Unsigned big integer bounded by the native supply cap.
    Amount { allow_zero: bool },
    /// Numeric string of up to 20 digits with an optional `n` suffix, or
    /// empty. Mirrors the column format amounts are persisted in.
    BigIntStr,
    Str,
    /// String shorter than 41 chars (token display names).
    Str40,
    /// 64 hex chars: a 32-byte hash.
    Hash32,
    /// 66 hex chars: a compressed public key.
    Hash33,
    /// Up to 64 hex chars, optional `0x`: a foreign token identifier.
    HexStr1_64,
    /// Up to 66 hex chars, optional `0x`: a foreign account identifier.
    HexStr1_66,
    /// Up to 150 hex chars, optional `0x`: a foreign signature blob.
    HexStr1_150,
    Object,
    Array,
}

pub type Schema = &'static [(&'static str, ParamKind)];

lazy_static! {
    static ref BIGINT_STR: Regex = Regex::new(r"^([0-9]{1,20}n?|\s*)$").unwrap();
    static ref HASH32: Regex = Regex::new(r"^[0-9a-fA-F]{64}$").unwrap();
    static ref HASH33: Regex = Regex::new(r"^[0-9a-fA-F]{66}$").unwrap();
    static ref HEX_1_64: Regex =
        Regex::new(r"^((0x[0-9a-fA-F]{1,62})|[0-9a-fA-F]{1,64})$").unwrap();
    static ref HEX_1_66: Regex =
        Regex::new(r"^((0x[0-9a-fA-F]{1,64})|[0-9a-fA-F]{1,66})$").unwrap();
    static ref HEX_1_150: Regex =
        Regex::new(r"^((0x[0-9a-fA-F]{1,148})|[0-9a-fA-F]{1,150})$").unwrap();
}

pub fn validate(
    params: &ParameterMap, schema: &[(&'static str, ParamKind)],
) -> Result<(), ValidationError> {
    for &(name, kind) in schema {
        let value = params
            .get(name)
            .ok_or_else(|| ValidationError::MissingField(name.to_string()))?;
        check_kind(name, value, kind)?;
    }
    Ok(())
}

fn check_kind(name: &str, value: &ParameterValue, kind: ParamKind) -> Result<(), ValidationError> {
    match kind {
        ParamKind::Int => {
            as_int(value).ok_or_else(|| wrong_type(name, "int"))?;
        }
        ParamKind::Byte => {
            let v = as_int(value).ok_or_else(|| wrong_type(name, "int"))?;
            if !(0..=255).contains(&v) {
                return Err(bad_format(name, "byte"));
            }
        }
        ParamKind::Amount { allow_zero } => {
            let v = as_big(value).ok_or_else(|| wrong_type(name, "bigint"))?;
            if v > supply_cap() || (!allow_zero && v.is_zero()) {
                return Err(bad_format(name, "amount"));
            }
        }
        ParamKind::BigIntStr => {
            let s = as_str(value).ok_or_else(|| wrong_type(name, "string"))?;
            if !BIGINT_STR.is_match(s) {
                return Err(bad_format(name, "bigint string"));
            }
        }
        ParamKind::Str => {
            as_str(value).ok_or_else(|| wrong_type(name, "string"))?;
        }
        ParamKind::Str40 => {
            let s = as_str(value).ok_or_else(|| wrong_type(name, "string"))?;
            if s.len() > 40 {
                return Err(bad_format(name, "string of at most 40 chars"));
            }
        }
        ParamKind::Hash32 => check_hex(name, value, &HASH32, "32-byte hash")?,
        ParamKind::Hash33 => check_hex(name, value, &HASH33, "33-byte key")?,
        ParamKind::HexStr1_64 => check_hex(name, value, &HEX_1_64, "hex string (<=64)")?,
        ParamKind::HexStr1_66 => check_hex(name, value, &HEX_1_66, "hex string (<=66)")?,
        ParamKind::HexStr1_150 => check_hex(name, value, &HEX_1_150, "hex string (<=150)")?,
        ParamKind::Object => {
            if !matches!(value, ParameterValue::Object(_)) {
                return Err(wrong_type(name, "object"));
            }
        }
        ParamKind::Array => {
            if !matches!(value, ParameterValue::Array(_)) {
                return Err(wrong_type(name, "array"));
            }
        }
    }
    Ok(())
}

/// Hex classes accept either a string field or a binary hash leaf; the leaf
/// is rendered to lowercase hex before the format check.
fn check_hex(
    name: &str, value: &ParameterValue, re: &Regex, kind: &'static str,
) -> Result<(), ValidationError> {
    let rendered = match value {
        ParameterValue::Str(s) => s.clone(),
        ParameterValue::Hash(_) => value.render().unwrap_or_default(),
        _ => return Err(wrong_type(name, "string")),
    };
    if !re.is_match(&rendered) {
        return Err(bad_format(name, kind));
    }
    Ok(())
}

fn as_int(value: &ParameterValue) -> Option<i64> {
    match value {
        ParameterValue::Int(v) => Some(*v),
        _ => None,
    }
}

fn as_big(value: &ParameterValue) -> Option<U256> {
    match value {
        ParameterValue::BigInt(v) => Some(*v),
        ParameterValue::Int(v) if *v >= 0 => Some(U256::from(*v as u64)),
        _ => None,
    }
}

fn as_str(value: &ParameterValue) -> Option<&str> {
    match value {
        ParameterValue::Str(s) => Some(s),
        _ => None,
    }
}

fn wrong_type(field: &str, expected: &'static str) -> ValidationError {
    ValidationError::WrongType { field: field.to_string(), expected }
}

fn bad_format(field: &str, kind: &'static str) -> ValidationError {
    ValidationError::BadFormat { field: field.to_string(), kind }
}

// Typed extraction. All of these run after `validate`, but still fail soft:
// a schema bug must not panic the node.

pub fn expect_int(params: &ParameterMap, field: &str) -> Result<i64, ValidationError> {
    params.get(field).and_then(as_int).ok_or_else(|| wrong_type(field, "int"))
}

pub fn expect_u64(params: &ParameterMap, field: &str) -> Result<u64, ValidationError> {
    let v = expect_int(params, field)?;
    u64::try_from(v).map_err(|_| bad_format(field, "non-negative int"))
}

/// Network ids travel as plain ints but are stored as `u32`; anything wider
/// must be rejected rather than truncated, or two distinct wire values
/// would alias the same network.
pub fn expect_u32(params: &ParameterMap, field: &str) -> Result<u32, ValidationError> {
    let v = expect_int(params, field)?;
    u32::try_from(v).map_err(|_| bad_format(field, "32-bit int"))
}

pub fn expect_byte(params: &ParameterMap, field: &str) -> Result<u8, ValidationError> {
    let v = expect_int(params, field)?;
    u8::try_from(v).map_err(|_| bad_format(field, "byte"))
}

pub fn expect_amount(params: &ParameterMap, field: &str) -> Result<U256, ValidationError> {
    params.get(field).and_then(as_big).ok_or_else(|| wrong_type(field, "bigint"))
}

/// Parses a `BigIntStr` field into an exact amount. The empty form the
/// schema tolerates is not a usable amount.
pub fn expect_amount_str(params: &ParameterMap, field: &str) -> Result<U256, ValidationError> {
    let s = expect_str(params, field)?;
    let digits = s.trim().trim_end_matches('n');
    if digits.is_empty() {
        return Err(bad_format(field, "non-empty numeric string"));
    }
    U256::from_dec_str(digits).map_err(|_| bad_format(field, "numeric string"))
}

pub fn expect_str<'a>(params: &'a ParameterMap, field: &str) -> Result<&'a str, ValidationError> {
    params.get(field).and_then(as_str).ok_or_else(|| wrong_type(field, "string"))
}

/// A validated hex class rendered to its canonical lowercase form,
/// whichever of string or hash leaf carried it.
pub fn expect_hex(params: &ParameterMap, field: &str) -> Result<String, ValidationError> {
    let value = params
        .get(field)
        .ok_or_else(|| ValidationError::MissingField(field.to_string()))?;
    match value {
        ParameterValue::Str(s) => Ok(s.to_lowercase()),
        ParameterValue::Hash(_) => Ok(value.render().unwrap_or_default()),
        _ => Err(wrong_type(field, "string")),
    }
}

pub fn expect_hash32(params: &ParameterMap, field: &str) -> Result<H256, ValidationError> {
    let hex = expect_hex(params, field)?;
    H256::from_str(&hex).map_err(|_| bad_format(field, "32-byte hash"))
}

pub fn expect_address(params: &ParameterMap, field: &str) -> Result<Address, ValidationError> {
    let hex = expect_hex(params, field)?;
    Address::from_str(&hex).map_err(|_| bad_format(field, "33-byte key"))
}
