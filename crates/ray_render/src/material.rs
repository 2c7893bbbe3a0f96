//! Engine material lookup
//!
//! Pipelines load their materials by resource path and resolve every
//! technique and parameter they use by name at setup. A missing name is a
//! setup failure, never a silent null binding.

use crate::device::RenderPipelineDevice;
use crate::error::{RenderError, Result};
use crate::resource::{MaterialHandle, ParameterHandle, ResourceSet, TechniqueHandle};

/// Resource paths of the engine's built-in materials
pub mod paths {
    /// Deferred lighting: depth prepass, light accumulation and shading
    pub const DEFERRED_LIGHTING: &str = "sys:fx/deferred_lighting.glsl";
    /// Exponential shadow map generation and blur
    pub const DEFERRED_SHADOW: &str = "sys:fx/shadowmap.fxml";
    /// Per-light shadow map linearization and blur
    pub const SHADOW_RENDER: &str = "sys:fx/shadowmap_render.fxml";
}

/// A loaded material and the path it came from
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Material {
    handle: MaterialHandle,
    path: String,
}

impl Material {
    /// Load `path`, recording ownership in `resources`
    pub fn load(
        device: &mut dyn RenderPipelineDevice,
        resources: &mut ResourceSet,
        path: &str,
    ) -> Result<Self> {
        let handle = resources.load_material(device, path)?;
        log::debug!("Loaded material {}", path);
        Ok(Self {
            handle,
            path: path.to_owned(),
        })
    }

    pub fn handle(&self) -> MaterialHandle {
        self.handle
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Resolve a technique that must exist
    pub fn technique(&self, device: &dyn RenderPipelineDevice, name: &str) -> Result<TechniqueHandle> {
        device
            .technique(self.handle, name)
            .ok_or_else(|| RenderError::MissingTechnique {
                material: self.path.clone(),
                name: name.to_owned(),
            })
    }

    /// Resolve a parameter that must exist
    pub fn parameter(&self, device: &dyn RenderPipelineDevice, name: &str) -> Result<ParameterHandle> {
        device
            .parameter(self.handle, name)
            .ok_or_else(|| RenderError::MissingParameter {
                material: self.path.clone(),
                name: name.to_owned(),
            })
    }
}
