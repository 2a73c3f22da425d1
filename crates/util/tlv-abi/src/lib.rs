// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The contract payload codec. A payload is a tree of TLV nodes, each
//! `[u16 BE length][u16 BE tag][payload]` where the length counts the whole
//! node, header included. Operation tags and field-kind tags share one tag
//! space; numeric leaves are ASCII decimal text, hash leaves are raw bytes,
//! objects nest.
//!
//! Every value reaching the encoder carries its semantic kind explicitly;
//! nothing is inferred from representation.

mod decode;
mod encode;
mod tag;
mod value;

pub use decode::{decode_envelope, sniff_operation};
pub use encode::encode_envelope;
pub use tag::TlvTag;
pub use value::{ContractEnvelope, ParameterMap, ParameterValue};

use thiserror::Error;

/// Node size markers are u16, so no node may exceed this many bytes.
pub const MAX_NODE_SIZE: usize = u16::MAX as usize;

/// Header bytes of every node: 2-byte size marker, 2-byte tag.
pub const NODE_HEADER_SIZE: usize = 4;

#[derive(Debug, Error, PartialEq)]
pub enum EncodeError {
    #[error("node of {0} bytes exceeds the {MAX_NODE_SIZE}-byte chunk limit")]
    Oversize(usize),

    #[error("{0} values have no TLV form")]
    Unrepresentable(&'static str),
}

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("input ends inside a node header")]
    Truncated,

    #[error("declared node size {declared} does not fit the remaining {actual} bytes")]
    BadLength { declared: usize, actual: usize },

    #[error("outer chunk declares {declared} bytes but the buffer holds {actual}")]
    EnvelopeSizeMismatch { declared: usize, actual: usize },

    #[error("unknown tag {0:#06x}")]
    UnknownTag(u16),

    #[error("expected a {expected} node, found {found:?}")]
    UnexpectedTag { expected: &'static str, found: TlvTag },

    #[error("payload does not begin with an operation node")]
    NotAnOperation,

    #[error("text payload is not valid UTF-8")]
    BadUtf8,

    #[error("numeric payload is not valid ASCII decimal")]
    BadNumber,

    #[error("hash payload of {0} bytes; expected 32, 33 or 65")]
    BadHashLength(usize),
}
