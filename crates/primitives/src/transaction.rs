// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use kes_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

/// A transaction as handed to the execution core by the block pipeline.
/// Signature checking happened upstream; the executor only decides whether
/// `data` is a contract payload and, if so, runs it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: H256,
    pub from: Address,
    pub to: Address,
    pub amount: U256,
    pub ticker: String,
    #[serde(with = "serde_bytes_hex")]
    pub data: Vec<u8>,
}

/// The slice of key-block context contract execution is allowed to see.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: u64,
    pub hash: H256,
}

mod serde_bytes_hex {
    use rustc_hex::{FromHex, ToHex};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&data.to_hex::<String>())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.from_hex().map_err(|_| de::Error::custom("expected hex payload"))
    }
}
