//! Save/load support for game components
//!
//! Components describe themselves into an object node and read themselves
//! back. Missing fields keep their current value, so older scene files
//! load into newer components.
//!
//! # Example
//!
//! ```
//! use ray_archive::{read_field, write_field, Archivable, ArchiveNode, Result};
//!
//! #[derive(Default)]
//! struct Skybox {
//!     texture: String,
//!     intensity: f32,
//! }
//!
//! impl Archivable for Skybox {
//!     fn save(&self, node: &mut ArchiveNode) -> Result<()> {
//!         write_field(node, "texture", self.texture.as_str())?;
//!         write_field(node, "intensity", self.intensity)
//!     }
//!
//!     fn load(&mut self, node: &ArchiveNode) -> Result<()> {
//!         read_field(node, "texture", &mut self.texture)?;
//!         read_field(node, "intensity", &mut self.intensity)?;
//!         Ok(())
//!     }
//! }
//!
//! let mut node = ArchiveNode::new();
//! Skybox { texture: "sky.hdr".into(), intensity: 2.0 }.save(&mut node)?;
//!
//! let mut loaded = Skybox::default();
//! loaded.load(&node)?;
//! assert_eq!(loaded.texture, "sky.hdr");
//! # Ok::<(), ray_archive::ArchiveError>(())
//! ```

use crate::convert::FromNode;
use crate::error::{ArchiveError, Result};
use crate::node::ArchiveNode;

/// A value that can be written to and read from an archive node
pub trait Archivable {
    /// Write this value's fields into `node`
    fn save(&self, node: &mut ArchiveNode) -> Result<()>;

    /// Read this value's fields from `node`
    fn load(&mut self, node: &ArchiveNode) -> Result<()>;
}

/// Write `value` under `key`, replacing the first entry with that key
pub fn write_field<T: Into<ArchiveNode>>(node: &mut ArchiveNode, key: &str, value: T) -> Result<()> {
    *node.at_mut(key)? = value.into();
    Ok(())
}

/// Read the field `key` into `out`. Returns `false` and leaves `out`
/// untouched when the field is absent or null.
pub fn read_field<T>(node: &ArchiveNode, key: &str, out: &mut T) -> Result<bool>
where
    T: for<'a> FromNode<'a>,
{
    let child = node.at(key)?;
    if child.is_null() {
        log::trace!("archive field '{}' absent, keeping current value", key);
        return Ok(false);
    }
    *out = child.get::<T>()?;
    Ok(true)
}

/// Read a field that must be present
pub fn require_field<'a, T: FromNode<'a>>(node: &'a ArchiveNode, key: &str) -> Result<T> {
    let child = node.at(key)?;
    if child.is_null() {
        return Err(ArchiveError::MissingField(key.to_owned()));
    }
    child.get::<T>()
}

/// Save an [`Archivable`] into a fresh object node
pub fn save_to_node<A: Archivable + ?Sized>(value: &A) -> Result<ArchiveNode> {
    let mut node = ArchiveNode::new();
    value.save(&mut node)?;
    Ok(node)
}
