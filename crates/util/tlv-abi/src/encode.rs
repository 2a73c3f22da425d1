// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    ContractEnvelope, EncodeError, ParameterMap, ParameterValue, TlvTag, MAX_NODE_SIZE,
    NODE_HEADER_SIZE,
};

/// Serializes an envelope to its canonical wire form:
/// `[operation node [parameters node [key node, value node]*]]`.
pub fn encode_envelope(envelope: &ContractEnvelope) -> Result<Vec<u8>, EncodeError> {
    let body = encode_map(&envelope.parameters)?;
    let parameters = node(TlvTag::Parameters, body)?;
    node(envelope.operation, parameters)
}

fn encode_map(map: &ParameterMap) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    for (key, value) in map.iter() {
        out.extend(node(TlvTag::Key, key.as_bytes().to_vec())?);
        out.extend(encode_value(value)?);
    }
    Ok(out)
}

fn encode_value(value: &ParameterValue) -> Result<Vec<u8>, EncodeError> {
    match value {
        ParameterValue::Int(v) => node(TlvTag::Int, v.to_string().into_bytes()),
        ParameterValue::BigInt(v) => node(TlvTag::BigInt, v.to_string().into_bytes()),
        ParameterValue::Float(v) => node(TlvTag::Float, v.to_string().into_bytes()),
        ParameterValue::Str(s) => node(TlvTag::String, s.as_bytes().to_vec()),
        ParameterValue::Hash(bytes) => node(TlvTag::Hash, bytes.clone()),
        ParameterValue::Object(map) => node(TlvTag::Object, encode_map(map)?),
        // Arrays only exist on the compressed JSON path; the TLV tag space
        // has no node for them.
        ParameterValue::Array(_) => Err(EncodeError::Unrepresentable("array")),
    }
}

fn node(tag: TlvTag, payload: Vec<u8>) -> Result<Vec<u8>, EncodeError> {
    let size = payload.len() + NODE_HEADER_SIZE;
    if size > MAX_NODE_SIZE {
        return Err(EncodeError::Oversize(size));
    }
    let mut out = Vec::with_capacity(size);
    out.extend_from_slice(&(size as u16).to_be_bytes());
    out.extend_from_slice(&tag.as_u16().to_be_bytes());
    out.extend(payload);
    Ok(out)
}
