// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Compressed parameter payloads. The bridge family ships its parameter
//! set as one `compressed_data` field holding base64-wrapped zlib-deflated
//! JSON; this sidesteps deep TLV nesting for objects assembled off-chain.

use crate::{
    error::{ContractError, ContractResult},
    validate,
};
use flate2::read::ZlibDecoder;
use std::io::Read;
use tlv_abi::{ParameterMap, ParameterValue};

/// Maximum inflated payload size. Keeps a tiny envelope from expanding
/// into an unbounded allocation.
const MAX_INFLATED_SIZE: u64 = 1 << 20;

pub fn decompress_params(params: &ParameterMap) -> ContractResult<ParameterMap> {
    let encoded = validate::expect_str(params, "compressed_data")?;
    let deflated = base64::decode(encoded)
        .map_err(|e| ContractError::Payload(format!("bad base64: {e}")))?;
    let mut inflated = Vec::new();
    ZlibDecoder::new(&deflated[..])
        .take(MAX_INFLATED_SIZE)
        .read_to_end(&mut inflated)
        .map_err(|e| ContractError::Payload(format!("bad deflate stream: {e}")))?;
    let json: serde_json::Value = serde_json::from_slice(&inflated)
        .map_err(|e| ContractError::Payload(format!("bad json: {e}")))?;
    let map = json
        .as_object()
        .ok_or_else(|| ContractError::Payload("payload is not an object".to_string()))?;
    map.iter()
        .map(|(key, value)| Ok((key.clone(), from_json(value)?)))
        .collect::<ContractResult<ParameterMap>>()
}

fn from_json(value: &serde_json::Value) -> ContractResult<ParameterValue> {
    use serde_json::Value;
    Ok(match value {
        Value::Bool(b) => ParameterValue::Int(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(v) => ParameterValue::Int(v),
            None => ParameterValue::Float(
                n.as_f64()
                    .ok_or_else(|| ContractError::Payload(format!("bad number {n}")))?,
            ),
        },
        Value::String(s) => ParameterValue::Str(s.clone()),
        Value::Array(items) => ParameterValue::Array(
            items.iter().map(from_json).collect::<ContractResult<Vec<_>>>()?,
        ),
        Value::Object(map) => ParameterValue::Object(
            map.iter()
                .map(|(key, value)| Ok((key.clone(), from_json(value)?)))
                .collect::<ContractResult<ParameterMap>>()?,
        ),
        Value::Null => {
            return Err(ContractError::Payload("null field".to_string()));
        }
    })
}

#[cfg(test)]
pub(crate) fn compress_params(json: &serde_json::Value) -> String {
    use flate2::{write::ZlibEncoder, Compression};
    use std::io::Write;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(json.to_string().as_bytes()).unwrap();
    base64::encode(encoder.finish().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_round_trip() {
        let payload = json!({
            "dst_address": "0xAB",
            "dst_network": 3,
            "amount": "1500n",
            "nested": { "x": 1 },
        });
        let mut envelope = ParameterMap::new();
        envelope.insert(
            "compressed_data".to_string(),
            ParameterValue::Str(compress_params(&payload)),
        );
        let params = decompress_params(&envelope).unwrap();
        assert_eq!(
            params.get("dst_address"),
            Some(&ParameterValue::Str("0xAB".to_string()))
        );
        assert_eq!(params.get("dst_network"), Some(&ParameterValue::Int(3)));
        assert_eq!(
            params.get("amount"),
            Some(&ParameterValue::Str("1500n".to_string()))
        );
        assert!(matches!(params.get("nested"), Some(ParameterValue::Object(_))));
    }

    #[test]
    fn garbage_payloads_are_rejected_with_reasons() {
        let mut envelope = ParameterMap::new();
        envelope.insert(
            "compressed_data".to_string(),
            ParameterValue::Str("!!not-base64!!".to_string()),
        );
        assert!(matches!(
            decompress_params(&envelope),
            Err(ContractError::Payload(_))
        ));

        let mut envelope = ParameterMap::new();
        envelope.insert(
            "compressed_data".to_string(),
            ParameterValue::Str(base64::encode(b"plainly not zlib")),
        );
        assert!(matches!(
            decompress_params(&envelope),
            Err(ContractError::Payload(_))
        ));
    }
}
