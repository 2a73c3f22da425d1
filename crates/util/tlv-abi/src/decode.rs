// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    ContractEnvelope, DecodeError, ParameterMap, ParameterValue, TlvTag, NODE_HEADER_SIZE,
};
use kes_types::U256;

/// Reads only the first node header and decides whether the buffer can be a
/// contract payload: the declared size must cover the buffer exactly and the
/// tag must name an operation. Anything else is ordinary transaction memo
/// data, which is not an error.
pub fn sniff_operation(raw: &[u8]) -> Option<TlvTag> {
    if raw.len() < NODE_HEADER_SIZE {
        return None;
    }
    let declared = u16::from_be_bytes([raw[0], raw[1]]) as usize;
    if declared != raw.len() {
        return None;
    }
    let tag = TlvTag::from_u16(u16::from_be_bytes([raw[2], raw[3]]))?;
    tag.is_operation().then_some(tag)
}

/// Full decode of a contract payload. Callers sniff first; this insists on a
/// well-formed envelope and fails loudly otherwise.
pub fn decode_envelope(raw: &[u8]) -> Result<ContractEnvelope, DecodeError> {
    let (tag, payload, rest) = read_node(raw)?;
    if !rest.is_empty() {
        return Err(DecodeError::EnvelopeSizeMismatch {
            declared: raw.len() - rest.len(),
            actual: raw.len(),
        });
    }
    if !tag.is_operation() {
        return Err(DecodeError::NotAnOperation);
    }

    let (inner_tag, inner_payload, inner_rest) = read_node(payload)?;
    if inner_tag != TlvTag::Parameters {
        return Err(DecodeError::UnexpectedTag { expected: "parameters", found: inner_tag });
    }
    if !inner_rest.is_empty() {
        return Err(DecodeError::BadLength {
            declared: payload.len() - inner_rest.len(),
            actual: payload.len(),
        });
    }

    Ok(ContractEnvelope { operation: tag, parameters: decode_map(inner_payload)? })
}

fn decode_map(mut bin: &[u8]) -> Result<ParameterMap, DecodeError> {
    let mut map = ParameterMap::new();
    while !bin.is_empty() {
        let (key_tag, key_payload, rest) = read_node(bin)?;
        if key_tag != TlvTag::Key {
            return Err(DecodeError::UnexpectedTag { expected: "key", found: key_tag });
        }
        let key = utf8(key_payload)?;

        let (value_tag, value_payload, rest) = read_node(rest)?;
        map.insert(key, decode_value(value_tag, value_payload)?);
        bin = rest;
    }
    Ok(map)
}

fn decode_value(tag: TlvTag, payload: &[u8]) -> Result<ParameterValue, DecodeError> {
    Ok(match tag {
        TlvTag::Int => ParameterValue::Int(
            ascii_decimal(payload)?.parse().map_err(|_| DecodeError::BadNumber)?,
        ),
        TlvTag::BigInt => ParameterValue::BigInt(
            U256::from_dec_str(&ascii_decimal(payload)?).map_err(|_| DecodeError::BadNumber)?,
        ),
        TlvTag::Float => ParameterValue::Float(
            ascii_decimal(payload)?.parse().map_err(|_| DecodeError::BadNumber)?,
        ),
        TlvTag::String => ParameterValue::Str(utf8(payload)?),
        TlvTag::Hash => match payload.len() {
            32 | 33 | 65 => ParameterValue::Hash(payload.to_vec()),
            other => return Err(DecodeError::BadHashLength(other)),
        },
        TlvTag::Object => ParameterValue::Object(decode_map(payload)?),
        found => return Err(DecodeError::UnexpectedTag { expected: "value", found }),
    })
}

/// Splits one node off the front: `(tag, payload, remainder)`.
fn read_node(bin: &[u8]) -> Result<(TlvTag, &[u8], &[u8]), DecodeError> {
    if bin.len() < NODE_HEADER_SIZE {
        return Err(DecodeError::Truncated);
    }
    let declared = u16::from_be_bytes([bin[0], bin[1]]) as usize;
    if declared < NODE_HEADER_SIZE || declared > bin.len() {
        return Err(DecodeError::BadLength { declared, actual: bin.len() });
    }
    let raw_tag = u16::from_be_bytes([bin[2], bin[3]]);
    let tag = TlvTag::from_u16(raw_tag).ok_or(DecodeError::UnknownTag(raw_tag))?;
    Ok((tag, &bin[NODE_HEADER_SIZE..declared], &bin[declared..]))
}

fn utf8(payload: &[u8]) -> Result<String, DecodeError> {
    String::from_utf8(payload.to_vec()).map_err(|_| DecodeError::BadUtf8)
}

fn ascii_decimal(payload: &[u8]) -> Result<String, DecodeError> {
    let text = utf8(payload).map_err(|_| DecodeError::BadNumber)?;
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit() || b == b'-' || b == b'.') {
        return Err(DecodeError::BadNumber);
    }
    Ok(text)
}
