//! # ray_render - Deferred Lighting and Shadow Pipelines
//!
//! Backend-agnostic render pipelines driven through a single device trait:
//! - Deferred lighting with stencil-masked per-layer light accumulation
//! - Per-light shadow maps with separable Gaussian filtering
//! - Exponential shadow maps for shadow cameras
//! - A semantic registry publishing engine values to shader parameters
//!
//! ## Architecture
//!
//! 1. **Device**: [`RenderPipelineDevice`] is the only way pipelines reach
//!    the GPU. [`HeadlessDevice`] implements it in software.
//! 2. **Semantics**: [`MaterialSemanticRegistry`] holds the camera, light
//!    and G-buffer values shaders bind by name
//! 3. **Pipelines**: [`DeferredLightingPipeline`] renders cameras and owns
//!    a [`ShadowRenderPipeline`] for light shadow maps
//!
//! ## Example
//!
//! ```ignore
//! use ray_render::prelude::*;
//!
//! let mut device = HeadlessDevice::new();
//! let mut pipeline = DeferredLightingPipeline::for_device(RenderSettings::default(), &device);
//! pipeline.setup(&mut device)?;
//!
//! let mut camera = Camera::new("main", 1280, 720);
//! let targets = pipeline.create_deferred_targets(&mut device, 1280, 720)?;
//! camera.set_deferred_targets(Some(targets));
//!
//! let mut sun = Light::new("sun", LightType::Sun);
//! pipeline.setup_light_shadows(&mut device, &mut sun)?;
//!
//! pipeline.render(&mut device, &camera, &[sun])?;
//! ```

pub mod camera;
pub mod deferred;
pub mod device;
pub mod error;
pub mod headless;
pub mod light;
pub mod material;
pub mod mesh;
pub mod resource;
pub mod semantic;
pub mod settings;
pub mod shadow;

pub use camera::{Camera, CameraOrder, CameraState, Projection};
pub use deferred::{
    DeferredLayouts, DeferredLightingPipeline, DeferredTargets, PostProcess, ShadowCameraTargets,
    ESM_FACTOR,
};
pub use device::{ParamValue, RenderPipelineDevice, RenderQueue};
pub use error::{RenderError, Result};
pub use headless::{DeviceCommand, HeadlessDevice, MaterialDefinition, MaterialLibrary, SceneObject};
pub use light::{Light, LightType, ShadowCamera, ShadowMapLayouts, MAX_LIGHT_LAYER};
pub use material::Material;
pub use resource::{
    ClearFlags, FramebufferDesc, FramebufferHandle, FramebufferLayoutDesc, FramebufferLayoutHandle,
    MaterialHandle, MeshDesc, MeshHandle, ParameterHandle, RenderTarget, ResourceSet,
    TechniqueHandle, TextureDesc, TextureDimension, TextureFormat, TextureHandle, Viewport,
};
pub use semantic::{
    Float3Semantic, Float4Semantic, FloatSemantic, MaterialSemanticRegistry, MatrixSemantic,
    Semantic, SemanticValue, SharedSemantics, TextureSemantic,
};
pub use settings::RenderSettings;
pub use shadow::{ShadowMode, ShadowQuality, ShadowRenderPipeline};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::camera::{Camera, CameraOrder, CameraState, Projection};
    pub use crate::deferred::{DeferredLightingPipeline, PostProcess};
    pub use crate::device::{ParamValue, RenderPipelineDevice, RenderQueue};
    pub use crate::error::{RenderError, Result};
    pub use crate::headless::{HeadlessDevice, SceneObject};
    pub use crate::light::{Light, LightType};
    pub use crate::resource::{ClearFlags, TextureFormat, Viewport};
    pub use crate::semantic::{MaterialSemanticRegistry, SharedSemantics};
    pub use crate::settings::RenderSettings;
    pub use crate::shadow::{ShadowMode, ShadowQuality, ShadowRenderPipeline};
}
