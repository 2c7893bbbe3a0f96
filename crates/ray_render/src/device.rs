//! Graphics device facade
//!
//! The pipelines never talk to a graphics API directly. Everything they
//! need (resource creation, material lookup, state binding and draws)
//! goes through [`RenderPipelineDevice`], so a backend only has to
//! implement this one trait. [`crate::headless::HeadlessDevice`] is the
//! software implementation used by tests and tools.
//!
//! Creation calls return `None` on failure; pipelines turn that into a
//! [`crate::RenderError`] and release what they already created.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::camera::CameraState;
use crate::resource::{
    ClearFlags, FramebufferDesc, FramebufferHandle, FramebufferLayoutDesc,
    FramebufferLayoutHandle, MaterialHandle, MeshDesc, MeshHandle, ParameterHandle, TechniqueHandle,
    TextureDesc, TextureFormat, TextureHandle, Viewport,
};
use crate::semantic::SharedSemantics;

/// Which class of scene objects a draw submits
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderQueue {
    /// Opaque geometry
    Opaque,
    /// Alpha-blended geometry
    Transparent,
    /// Shadow casters, depth only
    Shadow,
    /// Shadow casters writing flux and normal for global illumination
    ReflectiveShadow,
    /// Light volumes
    Lighting,
}

/// A value bound to a material parameter
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamValue {
    Int(i32),
    Float(f32),
    Float2(Vec2),
    Float3(Vec3),
    Float4(Vec4),
    Mat4(Mat4),
    Texture(Option<TextureHandle>),
}

impl ParamValue {
    /// Get the float value, if this is a float
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the texture binding, if this is a texture slot
    pub fn as_texture(&self) -> Option<Option<TextureHandle>> {
        match self {
            Self::Texture(t) => Some(*t),
            _ => None,
        }
    }
}

/// The graphics device as seen by the render pipelines
pub trait RenderPipelineDevice {
    /// Semantic registry this device binds shader parameters from
    fn semantics(&self) -> SharedSemantics;

    /// Check if textures of `format` can be created and rendered to
    fn is_texture_supported(&self, format: TextureFormat) -> bool;

    /// Create a texture
    fn create_texture(&mut self, desc: &TextureDesc) -> Option<TextureHandle>;

    /// Destroy a texture
    fn destroy_texture(&mut self, texture: TextureHandle);

    /// Create a framebuffer layout
    fn create_framebuffer_layout(
        &mut self,
        desc: &FramebufferLayoutDesc,
    ) -> Option<FramebufferLayoutHandle>;

    /// Destroy a framebuffer layout
    fn destroy_framebuffer_layout(&mut self, layout: FramebufferLayoutHandle);

    /// Create a framebuffer
    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Option<FramebufferHandle>;

    /// Destroy a framebuffer
    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle);

    /// Load a material by resource path
    fn create_material(&mut self, path: &str) -> Option<MaterialHandle>;

    /// Release a material
    fn destroy_material(&mut self, material: MaterialHandle);

    /// Look up a technique by name
    fn technique(&self, material: MaterialHandle, name: &str) -> Option<TechniqueHandle>;

    /// Look up a parameter by name
    fn parameter(&self, material: MaterialHandle, name: &str) -> Option<ParameterHandle>;

    /// Upload a mesh
    fn create_mesh(&mut self, desc: &MeshDesc) -> Option<MeshHandle>;

    /// Destroy a mesh
    fn destroy_mesh(&mut self, mesh: MeshHandle);

    /// Set a material parameter
    fn set_parameter(&mut self, parameter: ParameterHandle, value: ParamValue);

    /// Set the stencil reference a technique tests against
    fn set_stencil_reference(&mut self, technique: TechniqueHandle, reference: u32);

    /// Bind camera matrices for subsequent draws
    fn set_camera(&mut self, camera: &CameraState);

    /// Bind a framebuffer (`None` is the backbuffer)
    fn set_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>);

    /// Clear one attachment of the bound framebuffer
    fn clear_framebuffer(
        &mut self,
        attachment: u32,
        flags: ClearFlags,
        color: Vec4,
        depth: f32,
        stencil: u32,
    );

    /// Mark an attachment's contents as not needed
    fn discard_framebuffer(&mut self, attachment: u32);

    /// Draw every object in `queue`, optionally overriding its technique
    fn draw_render_queue(&mut self, queue: RenderQueue, technique: Option<TechniqueHandle>);

    /// Draw a full-screen quad with `technique`
    fn draw_screen_quad(&mut self, technique: TechniqueHandle);

    /// Draw `mesh` with `technique`
    fn draw_mesh(&mut self, mesh: MeshHandle, technique: TechniqueHandle);

    /// Copy a region between framebuffers (`None` destination is the backbuffer)
    fn blit_framebuffer(
        &mut self,
        src: FramebufferHandle,
        src_viewport: Viewport,
        dst: Option<FramebufferHandle>,
        dst_viewport: Viewport,
    );

    /// Label the commands that follow, for captures and frame debuggers
    fn debug_marker(&mut self, _label: &str) {}
}
