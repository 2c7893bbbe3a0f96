//! Deferred shading
//!
//! - **Pipeline**: per-camera pass orchestration and light accumulation
//! - **Targets**: camera-owned G-buffer and exponential shadow map targets
//! - **Post**: hook for screen-space effects between opaque and
//!   transparent passes

pub mod pipeline;
pub mod post;
pub mod targets;

pub use pipeline::{DeferredLightingPipeline, ESM_FACTOR};
pub use post::PostProcess;
pub use targets::{DeferredLayouts, DeferredTargets, ShadowCameraTargets};
