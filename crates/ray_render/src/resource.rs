//! Render Resources - device resource handles and descriptors
//!
//! Opaque handles and descriptors shared between the pipelines and any
//! [`RenderPipelineDevice`] backend, plus [`ResourceSet`], the ownership
//! ledger pipelines use to release everything they created.

use serde::{Deserialize, Serialize};

use crate::device::RenderPipelineDevice;
use crate::error::{RenderError, Result};

macro_rules! define_handle {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
            pub struct $name(pub u64);

            impl $name {
                /// Get the raw ID
                #[inline]
                pub const fn id(self) -> u64 {
                    self.0
                }
            }
        )*
    };
}

define_handle!(
    /// Handle to a device texture
    TextureHandle,
    /// Handle to a framebuffer (a set of attachments)
    FramebufferHandle,
    /// Handle to a framebuffer layout (attachment formats)
    FramebufferLayoutHandle,
    /// Handle to a loaded material
    MaterialHandle,
    /// Handle to a named technique inside a material
    TechniqueHandle,
    /// Handle to a named parameter inside a material
    ParameterHandle,
    /// Handle to a device mesh
    MeshHandle,
);

/// Texture format
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TextureFormat {
    // Color formats
    R8Unorm,
    R16Float,
    R32Float,
    Rg16Float,
    Rg32Float,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Rgba16Float,
    Rgba32Float,

    // Depth/stencil formats
    Depth16Unorm,
    Depth24Plus,
    Depth24PlusStencil8,
    Depth32Float,
    Depth32FloatStencil8,
}

impl TextureFormat {
    /// Check if this is a depth format
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            Self::Depth16Unorm
                | Self::Depth24Plus
                | Self::Depth24PlusStencil8
                | Self::Depth32Float
                | Self::Depth32FloatStencil8
        )
    }

    /// Check if this format carries a stencil channel
    pub fn has_stencil(&self) -> bool {
        matches!(self, Self::Depth24PlusStencil8 | Self::Depth32FloatStencil8)
    }

    /// Bytes per pixel
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::R8Unorm => 1,
            Self::R16Float | Self::Depth16Unorm => 2,
            Self::R32Float
            | Self::Rg16Float
            | Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Depth24Plus
            | Self::Depth24PlusStencil8
            | Self::Depth32Float => 4,
            Self::Rg32Float | Self::Rgba16Float | Self::Depth32FloatStencil8 => 8,
            Self::Rgba32Float => 16,
        }
    }
}

/// Pick the first format in `candidates` the device supports
pub fn first_supported(
    device: &dyn RenderPipelineDevice,
    candidates: &[TextureFormat],
) -> Option<TextureFormat> {
    let found = candidates.iter().copied().find(|f| device.is_texture_supported(*f));
    if let (Some(found), Some(preferred)) = (found, candidates.first()) {
        if found != *preferred {
            log::warn!("{:?} unsupported, falling back to {:?}", preferred, found);
        }
    }
    found
}

/// Texture dimension
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    D2,
    D2Array,
    Cube,
}

/// Texture descriptor
#[derive(Clone, Debug, PartialEq)]
pub struct TextureDesc {
    /// Debug label
    pub label: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Format
    pub format: TextureFormat,
    /// Dimension
    pub dimension: TextureDimension,
}

impl TextureDesc {
    /// Describe a plain 2D texture
    pub fn new_2d(label: impl Into<String>, width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            format,
            dimension: TextureDimension::D2,
        }
    }
}

/// Framebuffer layout descriptor
#[derive(Clone, Debug, PartialEq)]
pub struct FramebufferLayoutDesc {
    /// Debug label
    pub label: String,
    /// Color attachment formats, in attachment order
    pub color_formats: Vec<TextureFormat>,
    /// Depth/stencil attachment format
    pub depth_stencil_format: Option<TextureFormat>,
}

/// Framebuffer descriptor
#[derive(Clone, Debug, PartialEq)]
pub struct FramebufferDesc {
    /// Debug label
    pub label: String,
    /// Layout the attachments must match
    pub layout: FramebufferLayoutHandle,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Color attachments
    pub color_attachments: Vec<TextureHandle>,
    /// Depth/stencil attachment
    pub depth_stencil: Option<TextureHandle>,
}

/// Mesh descriptor (positions only; proxy volumes need nothing else)
#[derive(Clone, Debug, PartialEq)]
pub struct MeshDesc {
    /// Debug label
    pub label: String,
    /// Vertex positions
    pub positions: Vec<[f32; 3]>,
    /// Triangle list indices
    pub indices: Vec<u32>,
}

/// Which parts of a framebuffer attachment to clear
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ClearFlags(u32);

impl ClearFlags {
    /// Clear nothing
    pub const NONE: Self = Self(0);
    /// Clear color
    pub const COLOR: Self = Self(1 << 0);
    /// Clear depth
    pub const DEPTH: Self = Self(1 << 1);
    /// Clear stencil
    pub const STENCIL: Self = Self(1 << 2);
    /// Clear depth and stencil
    pub const DEPTH_STENCIL: Self = Self(Self::DEPTH.0 | Self::STENCIL.0);
    /// Clear everything
    pub const ALL: Self = Self(Self::COLOR.0 | Self::DEPTH.0 | Self::STENCIL.0);

    /// Get raw bits
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Check if empty
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Check if all specified flags are set
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Check if any of the specified flags are set
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }
}

impl core::ops::BitOr for ClearFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Viewport rectangle in pixels
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    /// Viewport covering a whole `width` x `height` target
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
        }
    }
}

/// A texture together with the single-attachment framebuffer that renders into it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderTarget {
    /// Texture sampled by later passes
    pub texture: TextureHandle,
    /// Framebuffer bound when rendering into `texture`
    pub framebuffer: FramebufferHandle,
}

/// Ledger of device resources owned by one component.
///
/// Every creation goes through the set, so a failed setup can hand the
/// whole set back to the device with [`ResourceSet::release`].
#[derive(Debug, Default)]
pub struct ResourceSet {
    textures: Vec<TextureHandle>,
    framebuffers: Vec<FramebufferHandle>,
    layouts: Vec<FramebufferLayoutHandle>,
    materials: Vec<MaterialHandle>,
    meshes: Vec<MeshHandle>,
}

impl ResourceSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of owned resources
    pub fn len(&self) -> usize {
        self.textures.len()
            + self.framebuffers.len()
            + self.layouts.len()
            + self.materials.len()
            + self.meshes.len()
    }

    /// Check if the set owns nothing
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create a texture owned by this set
    pub fn create_texture(
        &mut self,
        device: &mut dyn RenderPipelineDevice,
        desc: &TextureDesc,
    ) -> Result<TextureHandle> {
        let texture = device
            .create_texture(desc)
            .ok_or_else(|| RenderError::TextureCreation(desc.label.clone()))?;
        self.textures.push(texture);
        Ok(texture)
    }

    /// Create a framebuffer layout owned by this set
    pub fn create_layout(
        &mut self,
        device: &mut dyn RenderPipelineDevice,
        desc: &FramebufferLayoutDesc,
    ) -> Result<FramebufferLayoutHandle> {
        let layout = device
            .create_framebuffer_layout(desc)
            .ok_or_else(|| RenderError::LayoutCreation(desc.label.clone()))?;
        self.layouts.push(layout);
        Ok(layout)
    }

    /// Create a framebuffer owned by this set
    pub fn create_framebuffer(
        &mut self,
        device: &mut dyn RenderPipelineDevice,
        desc: &FramebufferDesc,
    ) -> Result<FramebufferHandle> {
        let framebuffer = device
            .create_framebuffer(desc)
            .ok_or_else(|| RenderError::FramebufferCreation(desc.label.clone()))?;
        self.framebuffers.push(framebuffer);
        Ok(framebuffer)
    }

    /// Load a material owned by this set
    pub fn load_material(
        &mut self,
        device: &mut dyn RenderPipelineDevice,
        path: &str,
    ) -> Result<MaterialHandle> {
        let material = device
            .create_material(path)
            .ok_or_else(|| RenderError::MissingMaterial(path.to_owned()))?;
        self.materials.push(material);
        Ok(material)
    }

    /// Upload a mesh owned by this set
    pub fn create_mesh(
        &mut self,
        device: &mut dyn RenderPipelineDevice,
        desc: &MeshDesc,
    ) -> Result<MeshHandle> {
        let mesh = device
            .create_mesh(desc)
            .ok_or_else(|| RenderError::MeshCreation(desc.label.clone()))?;
        self.meshes.push(mesh);
        Ok(mesh)
    }

    /// Create a texture and a framebuffer with it as the only attachment.
    ///
    /// Depth formats become the depth/stencil attachment, everything else
    /// color attachment 0.
    pub fn create_render_target(
        &mut self,
        device: &mut dyn RenderPipelineDevice,
        desc: &TextureDesc,
        layout: FramebufferLayoutHandle,
    ) -> Result<RenderTarget> {
        let texture = self.create_texture(device, desc)?;
        let (color_attachments, depth_stencil) = if desc.format.is_depth() {
            (Vec::new(), Some(texture))
        } else {
            (vec![texture], None)
        };
        let framebuffer = self.create_framebuffer(
            device,
            &FramebufferDesc {
                label: desc.label.clone(),
                layout,
                width: desc.width,
                height: desc.height,
                color_attachments,
                depth_stencil,
            },
        )?;
        Ok(RenderTarget {
            texture,
            framebuffer,
        })
    }

    /// Take ownership of everything in `other`
    pub fn absorb(&mut self, mut other: ResourceSet) {
        self.textures.append(&mut other.textures);
        self.framebuffers.append(&mut other.framebuffers);
        self.layouts.append(&mut other.layouts);
        self.materials.append(&mut other.materials);
        self.meshes.append(&mut other.meshes);
    }

    /// Destroy every owned resource, framebuffers before what they reference
    pub fn release(&mut self, device: &mut dyn RenderPipelineDevice) {
        for framebuffer in self.framebuffers.drain(..).rev() {
            device.destroy_framebuffer(framebuffer);
        }
        for layout in self.layouts.drain(..).rev() {
            device.destroy_framebuffer_layout(layout);
        }
        for texture in self.textures.drain(..).rev() {
            device.destroy_texture(texture);
        }
        for mesh in self.meshes.drain(..).rev() {
            device.destroy_mesh(mesh);
        }
        for material in self.materials.drain(..).rev() {
            device.destroy_material(material);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_queries() {
        assert!(TextureFormat::Depth24PlusStencil8.is_depth());
        assert!(TextureFormat::Depth24PlusStencil8.has_stencil());
        assert!(TextureFormat::Depth32Float.is_depth());
        assert!(!TextureFormat::Depth32Float.has_stencil());
        assert!(!TextureFormat::R32Float.is_depth());
        assert_eq!(TextureFormat::Rgba16Float.bytes_per_pixel(), 8);
    }

    #[test]
    fn test_clear_flags() {
        let flags = ClearFlags::COLOR | ClearFlags::STENCIL;
        assert!(flags.contains(ClearFlags::COLOR));
        assert!(!flags.contains(ClearFlags::DEPTH_STENCIL));
        assert!(flags.intersects(ClearFlags::DEPTH_STENCIL));
        assert!(ClearFlags::ALL.contains(flags));
        assert!(ClearFlags::NONE.is_empty());
    }

    #[test]
    fn test_viewport_full() {
        let vp = Viewport::full(640, 480);
        assert_eq!(vp.width, 640.0);
        assert_eq!(vp.height, 480.0);
        assert_eq!(vp.x, 0.0);
    }
}
