//! Text (JSON) archive
//!
//! Hand-written serde impls so object entry order and duplicate keys
//! survive a round trip; a map type would lose both.
//!
//! JSON carries a single integer type. Non-negative integers that fit in
//! `i64` read back as `integer`; only larger values read back as
//! `unsigned`. Use the packed archive when kinds must be exact.
//!
//! JSON has no NaN or infinity, so writing a non-finite float fails
//! rather than producing `null`.

use core::fmt;
use std::io::Read;
use std::str::FromStr;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{self, Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::error::Result;
use crate::node::{ArchiveNode, Payload};

impl Serialize for ArchiveNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        match &self.payload {
            Payload::Null => serializer.serialize_unit(),
            Payload::Boolean(b) => serializer.serialize_bool(*b),
            Payload::Integer(i) => serializer.serialize_i64(*i),
            Payload::Unsigned(u) => serializer.serialize_u64(*u),
            Payload::Float(f) if !f.is_finite() => Err(<S::Error as ser::Error>::custom(format!(
                "non-finite float {} has no text form",
                f
            ))),
            Payload::Float(f) => serializer.serialize_f64(*f),
            Payload::String(s) => serializer.serialize_str(s),
            Payload::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Payload::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, child) in entries {
                    map.serialize_entry(key, child)?;
                }
                map.end()
            }
        }
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = ArchiveNode;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an archive value")
    }

    fn visit_unit<E: de::Error>(self) -> core::result::Result<ArchiveNode, E> {
        Ok(ArchiveNode::new())
    }

    fn visit_none<E: de::Error>(self) -> core::result::Result<ArchiveNode, E> {
        Ok(ArchiveNode::new())
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> core::result::Result<ArchiveNode, D::Error> {
        ArchiveNode::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> core::result::Result<ArchiveNode, E> {
        Ok(ArchiveNode::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> core::result::Result<ArchiveNode, E> {
        Ok(ArchiveNode::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> core::result::Result<ArchiveNode, E> {
        Ok(match i64::try_from(v) {
            Ok(signed) => ArchiveNode::from(signed),
            Err(_) => ArchiveNode::from(v),
        })
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> core::result::Result<ArchiveNode, E> {
        Ok(ArchiveNode::from(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> core::result::Result<ArchiveNode, E> {
        Ok(ArchiveNode::from(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> core::result::Result<ArchiveNode, E> {
        Ok(ArchiveNode::from(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> core::result::Result<ArchiveNode, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<ArchiveNode>()? {
            items.push(item);
        }
        Ok(ArchiveNode::from_payload(Payload::Array(items)))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> core::result::Result<ArchiveNode, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, child)) = map.next_entry::<String, ArchiveNode>()? {
            entries.push((key, child));
        }
        Ok(ArchiveNode::from_payload(Payload::Object(entries)))
    }
}

impl<'de> Deserialize<'de> for ArchiveNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        deserializer.deserialize_any(NodeVisitor)
    }
}

impl ArchiveNode {
    /// Parse a text archive
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parse a text archive from a reader
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Compact text archive
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Indented text archive
    pub fn to_json_string_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl FromStr for ArchiveNode {
    type Err = crate::error::ArchiveError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_json_str(s)
    }
}

impl fmt::Display for ArchiveNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(text) => f.write_str(&text),
            // Non-finite floats have no JSON form
            Err(_) => write!(f, "{:?}", self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_duplicate_keys_in_order() {
        let node = ArchiveNode::from_json_str(r#"{"pass": "a", "blend": 1, "pass": "b"}"#).unwrap();

        let entries: Vec<(&str, String)> = node
            .iter()
            .map(|(k, v)| (k.as_str(), v.to_string()))
            .collect();
        assert_eq!(
            entries,
            vec![("pass", "\"a\"".to_string()), ("blend", "1".to_string()), ("pass", "\"b\"".to_string())]
        );
        assert_eq!(node["pass"].as_str().unwrap(), "a");
    }

    #[test]
    fn test_integer_kinds_from_text() {
        let node = ArchiveNode::from_json_str("[1, -1, 18446744073709551615, 1.5]").unwrap();
        assert!(node[0].is_integer());
        assert!(node[1].is_integer());
        assert!(node[2].is_unsigned());
        assert!(node[3].is_float());
    }

    #[test]
    fn test_text_round_trip() {
        let mut node = ArchiveNode::new();
        node["name"] = "skybox".into();
        node["enabled"] = true.into();
        node["intensity"] = 0.75.into();
        node["layers"].push(1).unwrap();
        node["layers"].push(2).unwrap();
        node["material"]["path"] = "sys:fx/skybox.fxml".into();
        node["empty"] = ArchiveNode::new();

        let text = node.to_json_string_pretty().unwrap();
        let parsed: ArchiveNode = text.parse().unwrap();
        assert_eq!(parsed, node);
    }

    #[test]
    fn test_display_is_compact_json() {
        let node: ArchiveNode = [("a", 1)].into_iter().collect();
        assert_eq!(node.to_string(), r#"{"a":1}"#);
    }

    #[test]
    fn test_non_finite_float_is_not_written_as_null() {
        let mut node = ArchiveNode::new();
        node["v"] = f64::NAN.into();
        assert!(node.to_json_string().is_err());

        let mut node = ArchiveNode::new();
        node["inf"] = f64::INFINITY.into();
        let err = node.to_json_string_pretty().unwrap_err();
        assert!(err.to_string().contains("non-finite"));

        // Display still produces something readable
        assert!(node.to_string().contains("inf"));

        // The packed archive keeps them exactly
        let bytes = node.to_packed_bytes().unwrap();
        let restored = ArchiveNode::from_packed_bytes(&bytes).unwrap();
        assert!(restored["inf"].is_float());
        assert_eq!(restored["inf"].get::<f64>().unwrap(), f64::INFINITY);
    }

    #[test]
    fn test_malformed_text_is_an_error() {
        assert!(ArchiveNode::from_json_str("{\"a\": ").is_err());
    }
}
