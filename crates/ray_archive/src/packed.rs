//! Packed (binary) archive
//!
//! Externally tagged encoding through bincode. Unlike the text archive,
//! every node kind survives a round trip exactly, so this is the canonical
//! archive for caches and save games.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::node::{ArchiveNode, Payload};

// Variant order is the wire format: append only.
#[derive(Serialize)]
enum PackedRef<'a> {
    Null,
    Boolean(bool),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    String(&'a str),
    Array(Vec<PackedRef<'a>>),
    Object(Vec<(&'a str, PackedRef<'a>)>),
}

#[derive(Deserialize)]
enum PackedNode {
    Null,
    Boolean(bool),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    String(String),
    Array(Vec<PackedNode>),
    Object(Vec<(String, PackedNode)>),
}

impl<'a> From<&'a ArchiveNode> for PackedRef<'a> {
    fn from(node: &'a ArchiveNode) -> Self {
        match &node.payload {
            Payload::Null => Self::Null,
            Payload::Boolean(b) => Self::Boolean(*b),
            Payload::Integer(i) => Self::Integer(*i),
            Payload::Unsigned(u) => Self::Unsigned(*u),
            Payload::Float(f) => Self::Float(*f),
            Payload::String(s) => Self::String(s),
            Payload::Array(items) => Self::Array(items.iter().map(PackedRef::from).collect()),
            Payload::Object(entries) => Self::Object(
                entries
                    .iter()
                    .map(|(key, child)| (key.as_str(), PackedRef::from(child)))
                    .collect(),
            ),
        }
    }
}

impl From<PackedNode> for ArchiveNode {
    fn from(packed: PackedNode) -> Self {
        let payload = match packed {
            PackedNode::Null => Payload::Null,
            PackedNode::Boolean(b) => Payload::Boolean(b),
            PackedNode::Integer(i) => Payload::Integer(i),
            PackedNode::Unsigned(u) => Payload::Unsigned(u),
            PackedNode::Float(f) => Payload::Float(f),
            PackedNode::String(s) => Payload::String(s),
            PackedNode::Array(items) => {
                Payload::Array(items.into_iter().map(ArchiveNode::from).collect())
            }
            PackedNode::Object(entries) => Payload::Object(
                entries
                    .into_iter()
                    .map(|(key, child)| (key, ArchiveNode::from(child)))
                    .collect(),
            ),
        };
        ArchiveNode::from_payload(payload)
    }
}

impl ArchiveNode {
    /// Encode into a packed archive
    pub fn to_packed_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&PackedRef::from(self))?)
    }

    /// Decode a packed archive
    pub fn from_packed_bytes(bytes: &[u8]) -> Result<Self> {
        let packed: PackedNode = bincode::deserialize(bytes)?;
        Ok(ArchiveNode::from(packed))
    }
}
