//! Shadow Mapping System
//!
//! Per-light shadow maps for sun, spot and point lights.
//!
//! # Architecture
//!
//! - **Config**: shadow filtering mode and resolution tier
//! - **Pipeline**: renders shadow casters per light and linearizes (and in
//!   soft mode blurs) the result into the light's linear-depth maps
//!
//! # Usage
//!
//! ```ignore
//! use ray_render::shadow::*;
//!
//! let mut shadows = ShadowRenderPipeline::new(ShadowMode::Soft, ShadowQuality::High);
//! shadows.setup(&mut device)?;
//!
//! if let Some(layouts) = shadows.shadow_map_layouts() {
//!     sun.setup_shadow_maps(&mut device, layouts)?;
//! }
//!
//! // Per frame, before the opaque pass
//! shadows.render_shadow_maps(&mut device, &lights);
//! ```

pub mod config;
pub mod pipeline;

pub use config::{ShadowMode, ShadowQuality};
pub use pipeline::{ShadowRenderPipeline, BLUR_OFFSETS, BLUR_WEIGHTS};
