//! Archive Node Tree
//!
//! A closed sum type over null, boolean, signed, unsigned, float, string,
//! array and ordered object values. Container payloads are owned by the
//! node; nodes are move-only.
//!
//! # Object semantics
//!
//! Objects are an ordered list of `(key, node)` entries. Keys are not
//! required to be unique:
//!
//! - [`ArchiveNode::push_back`] always appends, duplicates included
//! - [`ArchiveNode::at_mut`] / `node["key"]` find the first entry with the
//!   key, appending a null entry only when none exists
//! - [`ArchiveNode::at`] never inserts and yields [`NIL`] for a missing key
//!
//! Lookup is a linear scan, which keeps insertion order for serialization
//! and is cheap for the small attribute lists scene nodes carry.
//!
//! # Lazy materialization
//!
//! Mutable keyed access on a null node turns it into an object first;
//! mutable indexed access or [`ArchiveNode::push`] turns it into an array.
//! Any other mismatch is a [`ArchiveError::TypeMismatch`].

use core::fmt;
use core::ops::{Index, IndexMut};

use crate::convert::{ClampFromNode, FromNode};
use crate::error::{ArchiveError, Result};

/// Object entry: key and child node
pub type Entry = (String, ArchiveNode);

/// Sentinel returned by const lookups that find nothing. Immutable by
/// construction since only shared references to a static can exist.
pub static NIL: ArchiveNode = ArchiveNode::new();

/// Variant kind of an archive node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Null,
    Boolean,
    Integer,
    Unsigned,
    Float,
    String,
    Array,
    Object,
}

impl NodeKind {
    /// Human readable kind name, used in error messages
    pub const fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Unsigned => "unsigned",
            Self::Float => "float",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Boolean, integer, unsigned and float coerce into each other
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Boolean | Self::Integer | Self::Unsigned | Self::Float)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, PartialEq, Default)]
pub(crate) enum Payload {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    String(String),
    Array(Vec<ArchiveNode>),
    Object(Vec<Entry>),
}

/// One node of an archive document.
///
/// Deliberately not `Clone`: copying a tree is always explicit through
/// [`ArchiveNode::deep_clone`].
///
/// ```compile_fail
/// let node = ray_archive::ArchiveNode::from(1);
/// let copy = node.clone();
/// ```
#[derive(Debug, PartialEq, Default)]
pub struct ArchiveNode {
    pub(crate) payload: Payload,
}

impl ArchiveNode {
    /// Create a null node
    pub const fn new() -> Self {
        Self {
            payload: Payload::Null,
        }
    }

    /// Create a node holding the default value of `kind`
    pub fn with_kind(kind: NodeKind) -> Self {
        let mut node = Self::new();
        node.emplace(kind);
        node
    }

    pub(crate) fn from_payload(payload: Payload) -> Self {
        Self { payload }
    }

    /// Currently active kind
    pub fn kind(&self) -> NodeKind {
        match self.payload {
            Payload::Null => NodeKind::Null,
            Payload::Boolean(_) => NodeKind::Boolean,
            Payload::Integer(_) => NodeKind::Integer,
            Payload::Unsigned(_) => NodeKind::Unsigned,
            Payload::Float(_) => NodeKind::Float,
            Payload::String(_) => NodeKind::String,
            Payload::Array(_) => NodeKind::Array,
            Payload::Object(_) => NodeKind::Object,
        }
    }

    /// Name of the currently active kind
    pub fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    pub fn is_null(&self) -> bool {
        matches!(self.payload, Payload::Null)
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self.payload, Payload::Boolean(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.payload, Payload::Integer(_))
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(self.payload, Payload::Unsigned(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self.payload, Payload::Float(_))
    }

    pub fn is_numeric(&self) -> bool {
        self.kind().is_numeric()
    }

    pub fn is_string(&self) -> bool {
        matches!(self.payload, Payload::String(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.payload, Payload::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self.payload, Payload::Object(_))
    }

    /// Reset to a freshly default-initialized value of `kind`, discarding
    /// the previous payload
    pub fn emplace(&mut self, kind: NodeKind) {
        self.payload = match kind {
            NodeKind::Null => Payload::Null,
            NodeKind::Boolean => Payload::Boolean(false),
            NodeKind::Integer => Payload::Integer(0),
            NodeKind::Unsigned => Payload::Unsigned(0),
            NodeKind::Float => Payload::Float(0.0),
            NodeKind::String => Payload::String(String::new()),
            NodeKind::Array => Payload::Array(Vec::new()),
            NodeKind::Object => Payload::Object(Vec::new()),
        };
    }

    /// Reset the payload to its kind's default, keeping the kind
    pub fn clear(&mut self) {
        self.emplace(self.kind());
    }

    /// Move the subtree out, leaving this node null
    pub fn take(&mut self) -> ArchiveNode {
        core::mem::take(self)
    }

    /// Explicit recursive copy
    pub fn deep_clone(&self) -> ArchiveNode {
        let payload = match &self.payload {
            Payload::Null => Payload::Null,
            Payload::Boolean(b) => Payload::Boolean(*b),
            Payload::Integer(i) => Payload::Integer(*i),
            Payload::Unsigned(u) => Payload::Unsigned(*u),
            Payload::Float(f) => Payload::Float(*f),
            Payload::String(s) => Payload::String(s.clone()),
            Payload::Array(items) => Payload::Array(items.iter().map(Self::deep_clone).collect()),
            Payload::Object(entries) => Payload::Object(
                entries
                    .iter()
                    .map(|(key, child)| (key.clone(), child.deep_clone()))
                    .collect(),
            ),
        };
        Self { payload }
    }

    /// Number of array elements or object entries, zero otherwise
    pub fn len(&self) -> usize {
        match &self.payload {
            Payload::Array(items) => items.len(),
            Payload::Object(entries) => entries.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if an object holds at least one entry with `key`
    pub fn contains_key(&self, key: &str) -> bool {
        match &self.payload {
            Payload::Object(entries) => entries.iter().any(|(k, _)| k == key),
            _ => false,
        }
    }

    /// First child with `key`, or [`NIL`] when absent. Never inserts.
    pub fn at(&self, key: &str) -> Result<&ArchiveNode> {
        match &self.payload {
            Payload::Object(entries) => Ok(entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, child)| child)
                .unwrap_or(&NIL)),
            _ => Err(ArchiveError::type_mismatch(NodeKind::Object, self.kind())),
        }
    }

    /// First child with `key`, appending a null entry when absent.
    /// A null node becomes an object first.
    pub fn at_mut(&mut self, key: &str) -> Result<&mut ArchiveNode> {
        if self.is_null() {
            self.emplace(NodeKind::Object);
        }

        let found = self.kind();
        match &mut self.payload {
            Payload::Object(entries) => {
                let position = match entries.iter().position(|(k, _)| k == key) {
                    Some(position) => position,
                    None => {
                        entries.push((key.to_owned(), ArchiveNode::new()));
                        entries.len() - 1
                    }
                };
                Ok(&mut entries[position].1)
            }
            _ => Err(ArchiveError::type_mismatch(NodeKind::Object, found)),
        }
    }

    /// Array element at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn at_index(&self, index: usize) -> Result<&ArchiveNode> {
        match &self.payload {
            Payload::Array(items) => {
                assert!(
                    index < items.len(),
                    "archive index {} out of range (len {})",
                    index,
                    items.len()
                );
                Ok(&items[index])
            }
            _ => Err(ArchiveError::type_mismatch(NodeKind::Array, self.kind())),
        }
    }

    /// Mutable array element at `index`. A null node becomes an array
    /// first; `index == len()` appends a null element.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()`.
    pub fn at_index_mut(&mut self, index: usize) -> Result<&mut ArchiveNode> {
        if self.is_null() {
            self.emplace(NodeKind::Array);
        }

        let found = self.kind();
        match &mut self.payload {
            Payload::Array(items) => {
                assert!(
                    index <= items.len(),
                    "archive index {} out of range (len {})",
                    index,
                    items.len()
                );
                if index == items.len() {
                    items.push(ArchiveNode::new());
                }
                Ok(&mut items[index])
            }
            _ => Err(ArchiveError::type_mismatch(NodeKind::Array, found)),
        }
    }

    /// Append a `(key, value)` entry without checking for duplicates.
    /// A null node becomes an object first.
    pub fn push_back(&mut self, key: impl Into<String>, value: impl Into<ArchiveNode>) -> Result<()> {
        if self.is_null() {
            self.emplace(NodeKind::Object);
        }

        let found = self.kind();
        match &mut self.payload {
            Payload::Object(entries) => {
                entries.push((key.into(), value.into()));
                Ok(())
            }
            _ => Err(ArchiveError::type_mismatch(NodeKind::Object, found)),
        }
    }

    /// Append an array element. A null node becomes an array first.
    pub fn push(&mut self, value: impl Into<ArchiveNode>) -> Result<()> {
        if self.is_null() {
            self.emplace(NodeKind::Array);
        }

        let found = self.kind();
        match &mut self.payload {
            Payload::Array(items) => {
                items.push(value.into());
                Ok(())
            }
            _ => Err(ArchiveError::type_mismatch(NodeKind::Array, found)),
        }
    }

    /// Remove and return the first object entry with `key`
    pub fn remove(&mut self, key: &str) -> Option<ArchiveNode> {
        match &mut self.payload {
            Payload::Object(entries) => {
                let position = entries.iter().position(|(k, _)| k == key)?;
                Some(entries.remove(position).1)
            }
            _ => None,
        }
    }

    /// Typed extraction
    pub fn get<'a, T: FromNode<'a>>(&'a self) -> Result<T> {
        T::from_node(self)
    }

    /// Typed extraction clamped into `[min, max]`.
    ///
    /// The stored value is clamped before it is narrowed to `T`, so a
    /// value outside `T`'s own range lands on the nearer bound.
    pub fn get_clamped<'a, T: ClampFromNode<'a>>(&'a self, min: T, max: T) -> Result<T> {
        T::from_node_clamped(self, min, max)
    }

    /// Borrow the string payload
    pub fn as_str(&self) -> Result<&str> {
        match &self.payload {
            Payload::String(s) => Ok(s),
            _ => Err(ArchiveError::type_mismatch(NodeKind::String, self.kind())),
        }
    }

    /// Borrow the array payload
    pub fn as_array(&self) -> Result<&[ArchiveNode]> {
        match &self.payload {
            Payload::Array(items) => Ok(items),
            _ => Err(ArchiveError::type_mismatch(NodeKind::Array, self.kind())),
        }
    }

    pub fn as_array_mut(&mut self) -> Result<&mut Vec<ArchiveNode>> {
        let found = self.kind();
        match &mut self.payload {
            Payload::Array(items) => Ok(items),
            _ => Err(ArchiveError::type_mismatch(NodeKind::Array, found)),
        }
    }

    /// Borrow the object entries in insertion order
    pub fn as_object(&self) -> Result<&[Entry]> {
        match &self.payload {
            Payload::Object(entries) => Ok(entries),
            _ => Err(ArchiveError::type_mismatch(NodeKind::Object, self.kind())),
        }
    }

    pub fn as_object_mut(&mut self) -> Result<&mut Vec<Entry>> {
        let found = self.kind();
        match &mut self.payload {
            Payload::Object(entries) => Ok(entries),
            _ => Err(ArchiveError::type_mismatch(NodeKind::Object, found)),
        }
    }

    /// Object entries in insertion order; empty for any other kind.
    /// Reverse with `.rev()`.
    pub fn iter(&self) -> core::slice::Iter<'_, Entry> {
        match &self.payload {
            Payload::Object(entries) => entries.iter(),
            _ => [].iter(),
        }
    }

    pub fn iter_mut(&mut self) -> core::slice::IterMut<'_, Entry> {
        match &mut self.payload {
            Payload::Object(entries) => entries.iter_mut(),
            _ => [].iter_mut(),
        }
    }

    /// Array elements in order; empty for any other kind
    pub fn elements(&self) -> core::slice::Iter<'_, ArchiveNode> {
        match &self.payload {
            Payload::Array(items) => items.iter(),
            _ => [].iter(),
        }
    }

    pub(crate) fn as_bool_lossy(&self) -> Result<bool> {
        match self.payload {
            Payload::Boolean(b) => Ok(b),
            Payload::Integer(i) => Ok(i != 0),
            Payload::Unsigned(u) => Ok(u != 0),
            Payload::Float(f) => Ok(f != 0.0),
            _ => Err(ArchiveError::type_mismatch(NodeKind::Boolean, self.kind())),
        }
    }

    /// Integer view wide enough for every integer kind; floats truncate
    /// toward zero and saturate, NaN is out of range
    pub(crate) fn as_wide_integer(&self) -> Result<i128> {
        match self.payload {
            Payload::Boolean(b) => Ok(i128::from(b)),
            Payload::Integer(i) => Ok(i128::from(i)),
            Payload::Unsigned(u) => Ok(i128::from(u)),
            Payload::Float(f) if f.is_nan() => Err(ArchiveError::OutOfRange {
                value: f,
                min: i128::MIN as f64,
                max: i128::MAX as f64,
            }),
            Payload::Float(f) => Ok(f as i128),
            _ => Err(ArchiveError::type_mismatch(NodeKind::Integer, self.kind())),
        }
    }

    pub(crate) fn as_f64_lossy(&self) -> Result<f64> {
        match self.payload {
            Payload::Boolean(b) => Ok(if b { 1.0 } else { 0.0 }),
            Payload::Integer(i) => Ok(i as f64),
            Payload::Unsigned(u) => Ok(u as f64),
            Payload::Float(f) => Ok(f),
            _ => Err(ArchiveError::type_mismatch(NodeKind::Float, self.kind())),
        }
    }
}

impl<'a> IntoIterator for &'a ArchiveNode {
    type Item = &'a Entry;
    type IntoIter = core::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Index<&str> for ArchiveNode {
    type Output = ArchiveNode;

    fn index(&self, key: &str) -> &ArchiveNode {
        match self.at(key) {
            Ok(node) => node,
            Err(e) => panic!("archive lookup '{}': {}", key, e),
        }
    }
}

impl IndexMut<&str> for ArchiveNode {
    fn index_mut(&mut self, key: &str) -> &mut ArchiveNode {
        match self.at_mut(key) {
            Ok(node) => node,
            Err(e) => panic!("archive lookup '{}': {}", key, e),
        }
    }
}

impl Index<usize> for ArchiveNode {
    type Output = ArchiveNode;

    fn index(&self, index: usize) -> &ArchiveNode {
        match self.at_index(index) {
            Ok(node) => node,
            Err(e) => panic!("archive index {}: {}", index, e),
        }
    }
}

impl IndexMut<usize> for ArchiveNode {
    fn index_mut(&mut self, index: usize) -> &mut ArchiveNode {
        match self.at_index_mut(index) {
            Ok(node) => node,
            Err(e) => panic!("archive index {}: {}", index, e),
        }
    }
}
