//! # ray_archive - Scene Archive Document Model
//!
//! Typed, order-preserving document tree used to store and load scene,
//! material and component configuration.
//!
//! ## Overview
//!
//! - [`ArchiveNode`]: tagged union over null, boolean, integer, unsigned,
//!   float, string, array and ordered object values
//! - Move-only: trees are never copied implicitly
//! - Lazy materialization: keyed or indexed writes turn a null node into an
//!   object or array
//! - Text (JSON) and packed (bincode) archive encodings
//! - [`Archivable`] save/load for components
//!
//! ## Example
//!
//! ```
//! use ray_archive::ArchiveNode;
//!
//! let mut scene = ArchiveNode::new();
//! scene["camera"]["fov"] = 60.0.into();
//! scene["lights"].push("sun")?;
//! scene.push_back("tag", "outdoor")?;
//! scene.push_back("tag", "night")?;
//!
//! assert_eq!(scene["camera"]["fov"].get::<f32>()?, 60.0);
//! assert_eq!(scene["tag"].as_str()?, "outdoor");
//!
//! let text = scene.to_json_string()?;
//! assert_eq!(ArchiveNode::from_json_str(&text)?, scene);
//! # Ok::<(), ray_archive::ArchiveError>(())
//! ```

pub mod archivable;
pub mod convert;
pub mod error;
pub mod node;
pub mod packed;
pub mod text;

pub use archivable::{read_field, require_field, save_to_node, write_field, Archivable};
pub use convert::{ClampFromNode, FromNode};
pub use error::{ArchiveError, Result};
pub use node::{ArchiveNode, Entry, NodeKind, NIL};
