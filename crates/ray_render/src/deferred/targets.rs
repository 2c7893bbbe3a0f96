//! Camera-owned render targets
//!
//! The G-buffer family lives on the camera, not the pipeline, so several
//! cameras can share one pipeline at different resolutions.

use crate::device::RenderPipelineDevice;
use crate::error::{RenderError, Result};
use crate::resource::{
    first_supported, FramebufferDesc, FramebufferHandle, FramebufferLayoutDesc,
    FramebufferLayoutHandle, RenderTarget, ResourceSet, TextureDesc, TextureFormat, TextureHandle,
};

const DEPTH_STENCIL_FORMATS: [TextureFormat; 2] =
    [TextureFormat::Depth24PlusStencil8, TextureFormat::Depth32FloatStencil8];
const HDR_FORMATS: [TextureFormat; 2] = [TextureFormat::Rgba16Float, TextureFormat::Rgba8Unorm];
const EXPONENT_FORMATS: [TextureFormat; 2] = [TextureFormat::R32Float, TextureFormat::R16Float];

/// Layouts and formats shared by every camera's targets
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeferredLayouts {
    pub depth_format: TextureFormat,
    pub graphic_format: TextureFormat,
    pub normal_format: TextureFormat,
    pub hdr_format: TextureFormat,
    pub exponent_format: TextureFormat,
    /// Depth/stencil only
    pub depth_only: FramebufferLayoutHandle,
    /// Graphic + normal + depth/stencil
    pub gbuffer: FramebufferLayoutHandle,
    /// One HDR color + depth/stencil, for light accumulation and shading
    pub hdr: FramebufferLayoutHandle,
    /// Exponential depth color + depth
    pub shadow: FramebufferLayoutHandle,
    /// Exponential depth color only, for the blur swap
    pub shadow_swap: FramebufferLayoutHandle,
}

impl DeferredLayouts {
    /// Pick formats and create layouts, recording them in `resources`
    pub fn create(device: &mut dyn RenderPipelineDevice, resources: &mut ResourceSet) -> Result<Self> {
        let depth_format = first_supported(device, &DEPTH_STENCIL_FORMATS)
            .ok_or_else(|| RenderError::UnsupportedFormat("deferred depth/stencil".into()))?;
        let hdr_format = first_supported(device, &HDR_FORMATS)
            .ok_or_else(|| RenderError::UnsupportedFormat("deferred light buffer".into()))?;
        let exponent_format = first_supported(device, &EXPONENT_FORMATS)
            .ok_or_else(|| RenderError::UnsupportedFormat("exponential shadow map".into()))?;
        let graphic_format = TextureFormat::Rgba8Unorm;
        let normal_format = hdr_format;

        Ok(Self {
            depth_only: create_layout(device, resources, "deferred.depth", Vec::new(), Some(depth_format))?,
            gbuffer: create_layout(
                device,
                resources,
                "deferred.gbuffer",
                vec![graphic_format, normal_format],
                Some(depth_format),
            )?,
            hdr: create_layout(device, resources, "deferred.hdr", vec![hdr_format], Some(depth_format))?,
            shadow: create_layout(
                device,
                resources,
                "deferred.shadow",
                vec![exponent_format],
                Some(depth_format),
            )?,
            shadow_swap: create_layout(device, resources, "deferred.shadow_swap", vec![exponent_format], None)?,
            depth_format,
            graphic_format,
            normal_format,
            hdr_format,
            exponent_format,
        })
    }
}

fn create_layout(
    device: &mut dyn RenderPipelineDevice,
    resources: &mut ResourceSet,
    label: &str,
    color_formats: Vec<TextureFormat>,
    depth_stencil_format: Option<TextureFormat>,
) -> Result<FramebufferLayoutHandle> {
    resources.create_layout(
        device,
        &FramebufferLayoutDesc {
            label: label.into(),
            color_formats,
            depth_stencil_format,
        },
    )
}

/// G-buffer family owned by a main camera
#[derive(Debug)]
pub struct DeferredTargets {
    pub width: u32,
    pub height: u32,
    /// Depth/stencil; stencil holds the per-pixel light layer bits
    pub depth: TextureHandle,
    /// Albedo
    pub graphic: TextureHandle,
    /// World normal
    pub normal: TextureHandle,
    /// Accumulated light
    pub light: TextureHandle,
    /// Shaded result
    pub shading: TextureHandle,
    pub depth_view: FramebufferHandle,
    pub graphic_view: FramebufferHandle,
    pub light_view: FramebufferHandle,
    pub shading_view: FramebufferHandle,
    resources: ResourceSet,
}

impl DeferredTargets {
    /// Create the family at `width` x `height`. On failure nothing stays
    /// allocated.
    pub fn create(
        device: &mut dyn RenderPipelineDevice,
        layouts: &DeferredLayouts,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let mut resources = ResourceSet::new();
        match Self::create_into(device, layouts, width, height, &mut resources) {
            Ok(mut targets) => {
                targets.resources = resources;
                Ok(targets)
            }
            Err(e) => {
                log::error!("Deferred target creation failed: {}", e);
                resources.release(device);
                Err(e)
            }
        }
    }

    fn create_into(
        device: &mut dyn RenderPipelineDevice,
        layouts: &DeferredLayouts,
        width: u32,
        height: u32,
        resources: &mut ResourceSet,
    ) -> Result<Self> {
        let size = (width, height);
        let depth = create_texture(device, resources, "deferred.depth", size, layouts.depth_format)?;
        let graphic = create_texture(device, resources, "deferred.graphic", size, layouts.graphic_format)?;
        let normal = create_texture(device, resources, "deferred.normal", size, layouts.normal_format)?;
        let light = create_texture(device, resources, "deferred.light", size, layouts.hdr_format)?;
        let shading = create_texture(device, resources, "deferred.shading", size, layouts.hdr_format)?;

        let mut view = |label: &str, layout: FramebufferLayoutHandle, colors: Vec<TextureHandle>| {
            create_framebuffer(device, resources, label, layout, size, colors, Some(depth))
        };
        let depth_view = view("deferred.depth_view", layouts.depth_only, Vec::new())?;
        let graphic_view = view("deferred.gbuffer_view", layouts.gbuffer, vec![graphic, normal])?;
        let light_view = view("deferred.light_view", layouts.hdr, vec![light])?;
        let shading_view = view("deferred.shading_view", layouts.hdr, vec![shading])?;

        Ok(Self {
            width,
            height,
            depth,
            graphic,
            normal,
            light,
            shading,
            depth_view,
            graphic_view,
            light_view,
            shading_view,
            resources: ResourceSet::new(),
        })
    }

    /// Destroy every texture and framebuffer of the family
    pub fn release(mut self, device: &mut dyn RenderPipelineDevice) {
        self.resources.release(device);
    }
}

/// Exponential shadow map targets owned by a shadow camera
#[derive(Debug)]
pub struct ShadowCameraTargets {
    pub size: u32,
    /// Exponential depth, with a depth attachment for the caster pass
    pub render: RenderTarget,
    /// Depth attachment of `render`
    pub depth: TextureHandle,
    /// Intermediate of the separable blur
    pub swap: RenderTarget,
    resources: ResourceSet,
}

impl ShadowCameraTargets {
    /// Create square targets of edge `size`. On failure nothing stays
    /// allocated.
    pub fn create(
        device: &mut dyn RenderPipelineDevice,
        layouts: &DeferredLayouts,
        size: u32,
    ) -> Result<Self> {
        let mut resources = ResourceSet::new();
        match Self::create_into(device, layouts, size, &mut resources) {
            Ok(mut targets) => {
                targets.resources = resources;
                Ok(targets)
            }
            Err(e) => {
                log::error!("Shadow camera target creation failed: {}", e);
                resources.release(device);
                Err(e)
            }
        }
    }

    fn create_into(
        device: &mut dyn RenderPipelineDevice,
        layouts: &DeferredLayouts,
        size: u32,
        resources: &mut ResourceSet,
    ) -> Result<Self> {
        let extent = (size, size);
        let color = create_texture(device, resources, "esm.render", extent, layouts.exponent_format)?;
        let depth = create_texture(device, resources, "esm.depth", extent, layouts.depth_format)?;
        let framebuffer = create_framebuffer(
            device,
            resources,
            "esm.render",
            layouts.shadow,
            extent,
            vec![color],
            Some(depth),
        )?;
        let swap = resources.create_render_target(
            device,
            &TextureDesc::new_2d("esm.swap", size, size, layouts.exponent_format),
            layouts.shadow_swap,
        )?;

        Ok(Self {
            size,
            render: RenderTarget {
                texture: color,
                framebuffer,
            },
            depth,
            swap,
            resources: ResourceSet::new(),
        })
    }

    /// Destroy the render and swap targets
    pub fn release(mut self, device: &mut dyn RenderPipelineDevice) {
        self.resources.release(device);
    }
}

fn create_texture(
    device: &mut dyn RenderPipelineDevice,
    resources: &mut ResourceSet,
    label: &str,
    (width, height): (u32, u32),
    format: TextureFormat,
) -> Result<TextureHandle> {
    resources.create_texture(device, &TextureDesc::new_2d(label, width, height, format))
}

fn create_framebuffer(
    device: &mut dyn RenderPipelineDevice,
    resources: &mut ResourceSet,
    label: &str,
    layout: FramebufferLayoutHandle,
    (width, height): (u32, u32),
    color_attachments: Vec<TextureHandle>,
    depth_stencil: Option<TextureHandle>,
) -> Result<FramebufferHandle> {
    resources.create_framebuffer(
        device,
        &FramebufferDesc {
            label: label.into(),
            layout,
            width,
            height,
            color_attachments,
            depth_stencil,
        },
    )
}
