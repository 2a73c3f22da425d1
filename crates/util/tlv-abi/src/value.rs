// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::TlvTag;
use kes_types::U256;
use rustc_hex::ToHex;

/// A decoded contract parameter. The variant is the semantic kind carried on
/// the wire; there is no guessing from the payload shape.
#[derive(Clone, Debug, PartialEq)]
pub enum ParameterValue {
    Int(i64),
    BigInt(U256),
    /// Wire-compatible only. Amount arithmetic never touches this variant.
    Float(f64),
    Str(String),
    /// 32, 33 or 65 raw bytes; rendered as lowercase hex when compared
    /// against hex-string schema kinds.
    Hash(Vec<u8>),
    Object(ParameterMap),
    /// Only produced by the compressed JSON payload path; plain TLV has no
    /// array node.
    Array(Vec<ParameterValue>),
}

impl ParameterValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ParameterValue::Int(_) => "int",
            ParameterValue::BigInt(_) => "bigint",
            ParameterValue::Float(_) => "float",
            ParameterValue::Str(_) => "string",
            ParameterValue::Hash(_) => "hash",
            ParameterValue::Object(_) => "object",
            ParameterValue::Array(_) => "array",
        }
    }

    /// Hash leaves render as hex; everything textual or numeric renders as
    /// itself. Used by schema checks and by bridge ticket hashing.
    pub fn render(&self) -> Option<String> {
        match self {
            ParameterValue::Int(v) => Some(v.to_string()),
            ParameterValue::BigInt(v) => Some(v.to_string()),
            ParameterValue::Float(v) => Some(v.to_string()),
            ParameterValue::Str(s) => Some(s.clone()),
            ParameterValue::Hash(bytes) => Some(bytes.to_hex::<String>()),
            ParameterValue::Object(_) | ParameterValue::Array(_) => None,
        }
    }
}

/// An order-preserving field mapping. Field order matters on the wire, so a
/// plain map would lose the round-trip law.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterMap(Vec<(String, ParameterValue)>);

impl ParameterMap {
    pub fn new() -> Self {
        ParameterMap(Vec::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ParameterValue) {
        self.0.push((key.into(), value));
    }

    pub fn get(&self, key: &str) -> Option<&ParameterValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, ParameterValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, ParameterValue)> for ParameterMap {
    fn from_iter<I: IntoIterator<Item = (String, ParameterValue)>>(iter: I) -> Self {
        ParameterMap(iter.into_iter().collect())
    }
}

/// A decoded contract call: the operation tag plus its parameter mapping.
/// Envelopes are transient; they are rebuilt from raw bytes per transaction.
#[derive(Clone, Debug, PartialEq)]
pub struct ContractEnvelope {
    pub operation: TlvTag,
    pub parameters: ParameterMap,
}
