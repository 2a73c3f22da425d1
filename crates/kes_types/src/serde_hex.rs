// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Serde support for [`H264`]: plain lowercase hex, no `0x` prefix, matching
//! the rendering used on the wire and in the explorer database.

use crate::H264;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

impl Serialize for H264 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:x}", self))
    }
}

impl<'de> Deserialize<'de> for H264 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        H264::from_str(&s).map_err(|_| de::Error::custom("expected 66 hex chars"))
    }
}
