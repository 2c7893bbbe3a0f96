//! Per-light shadow map rendering
//!
//! For every shadow-casting light and each of its shadow cameras:
//!
//! 1. Render the shadow (or reflective shadow) queue into a depth target,
//!    the light's own one or the shared temporary.
//! 2. Linearize the depth into the light's linear-depth map. In soft mode
//!    this is the horizontal pass of a separable Gaussian, followed by a
//!    vertical pass through the shared temporary linear target.
//!
//! Hard mode still runs the horizontal technique, since it carries the
//! depth linearization math, but skips the vertical pass.

use glam::{Vec2, Vec3, Vec4};

use crate::camera::CameraState;
use crate::device::{ParamValue, RenderPipelineDevice, RenderQueue};
use crate::error::{RenderError, Result};
use crate::light::{Light, ShadowMapLayouts};
use crate::material::{paths, Material};
use crate::resource::{
    first_supported, ClearFlags, FramebufferHandle, FramebufferLayoutDesc, ParameterHandle,
    RenderTarget, ResourceSet, TechniqueHandle, TextureDesc, TextureFormat, TextureHandle,
};
use crate::shadow::config::{ShadowMode, ShadowQuality};

/// Technique names in the shadow render material
pub mod techniques {
    pub const CONV_ORTHO_LINEAR_DEPTH: &str = "ConvOrthoLinearDepth";
    pub const CONV_PERSPECTIVE_FOV_LINEAR_DEPTH: &str = "ConvPerspectiveFovLinearDepth";
    pub const SHADOW_BLUR_ORTHO_X: &str = "ShadowBlurOrthoX";
    pub const SHADOW_BLUR_PERSPECTIVE_FOV_X: &str = "ShadowBlurPerspectiveFovX";
    pub const SHADOW_BLUR_Y: &str = "ShadowBlurY";
}

/// Parameter names in the shadow render material
pub mod parameters {
    pub const TEX_SOURCE: &str = "texSource";
    pub const TEX_SOURCE_SIZE_INV: &str = "texSourceSizeInv";
    pub const CLIP_CONSTANT: &str = "clipConstant";
    pub const OFFSET: &str = "offset";
    pub const WEIGHT: &str = "weight";
    pub const SHADOW_FACTOR: &str = "shadowFactor";
    pub const SHADOW_CHANNEL: &str = "shadowChannel";
}

/// Texel offsets of the 9-tap linear-sampled Gaussian
pub const BLUR_OFFSETS: [f32; 4] = [1.384_615_4, 3.230_769_2, -1.384_615_4, -3.230_769_2];

/// Centre and per-side weights of the 9-tap Gaussian
pub const BLUR_WEIGHTS: [f32; 3] = [0.227_027_03, 0.316_216_22, 0.070_270_27];

const DEPTH_FORMATS: [TextureFormat; 2] = [TextureFormat::Depth32Float, TextureFormat::Depth24PlusStencil8];
const LINEAR_FORMATS: [TextureFormat; 2] = [TextureFormat::R32Float, TextureFormat::R16Float];

#[derive(Debug)]
struct ShadowTechniques {
    conv_ortho: TechniqueHandle,
    conv_perspective: TechniqueHandle,
    blur_ortho_x: TechniqueHandle,
    blur_perspective_x: TechniqueHandle,
    blur_y: TechniqueHandle,
}

#[derive(Debug)]
struct ShadowParameters {
    source: ParameterHandle,
    source_size_inv: ParameterHandle,
    clip_constant: ParameterHandle,
    offset: ParameterHandle,
    weight: ParameterHandle,
    factor: ParameterHandle,
    channel: ParameterHandle,
}

#[derive(Debug)]
struct ShadowState {
    material: Material,
    techniques: ShadowTechniques,
    params: ShadowParameters,
    layouts: ShadowMapLayouts,
    /// Shared depth target for lights without their own
    depth: RenderTarget,
    /// Horizontal blur output (soft mode only)
    linear: Option<RenderTarget>,
}

/// Renders and filters per-light shadow maps
#[derive(Debug)]
pub struct ShadowRenderPipeline {
    mode: ShadowMode,
    quality: ShadowQuality,
    state: Option<ShadowState>,
    resources: ResourceSet,
}

impl ShadowRenderPipeline {
    /// Create an unconfigured pipeline
    pub fn new(mode: ShadowMode, quality: ShadowQuality) -> Self {
        Self {
            mode,
            quality,
            state: None,
            resources: ResourceSet::new(),
        }
    }

    pub fn mode(&self) -> ShadowMode {
        self.mode
    }

    pub fn quality(&self) -> ShadowQuality {
        self.quality
    }

    /// Shadow map edge length for the configured quality
    pub fn resolution(&self) -> u32 {
        self.quality.resolution()
    }

    /// Whether setup allocated shadow resources
    pub fn is_enabled(&self) -> bool {
        self.state.is_some()
    }

    /// Formats and layouts lights create their shadow maps with
    pub fn shadow_map_layouts(&self) -> Option<&ShadowMapLayouts> {
        self.state.as_ref().map(|s| &s.layouts)
    }

    /// Path of the loaded material
    pub fn material_path(&self) -> Option<&str> {
        self.state.as_ref().map(|s| s.material.path())
    }

    /// Load the material and create the shared targets.
    ///
    /// Quality `None` (or mode `None`) succeeds without allocating
    /// anything. On failure every resource created so far is released.
    pub fn setup(&mut self, device: &mut dyn RenderPipelineDevice) -> Result<()> {
        if self.state.is_some() {
            log::warn!("Shadow pipeline set up twice, releasing previous resources");
            self.close(device);
        }
        if self.quality == ShadowQuality::None || self.mode == ShadowMode::None {
            log::info!("Shadows disabled ({:?}/{:?})", self.mode, self.quality);
            return Ok(());
        }

        let mut resources = ResourceSet::new();
        match self.create_state(device, &mut resources) {
            Ok(state) => {
                log::info!(
                    "Shadow pipeline ready: {:?} {}px, depth {:?}, linear {:?}",
                    self.mode,
                    state.layouts.resolution,
                    state.layouts.depth_format,
                    state.layouts.linear_format
                );
                self.state = Some(state);
                self.resources = resources;
                Ok(())
            }
            Err(e) => {
                log::error!("Shadow pipeline setup failed: {}", e);
                resources.release(device);
                Err(e)
            }
        }
    }

    fn create_state(
        &self,
        device: &mut dyn RenderPipelineDevice,
        resources: &mut ResourceSet,
    ) -> Result<ShadowState> {
        let material = Material::load(device, resources, paths::SHADOW_RENDER)?;

        let techniques = ShadowTechniques {
            conv_ortho: material.technique(device, techniques::CONV_ORTHO_LINEAR_DEPTH)?,
            conv_perspective: material.technique(device, techniques::CONV_PERSPECTIVE_FOV_LINEAR_DEPTH)?,
            blur_ortho_x: material.technique(device, techniques::SHADOW_BLUR_ORTHO_X)?,
            blur_perspective_x: material.technique(device, techniques::SHADOW_BLUR_PERSPECTIVE_FOV_X)?,
            blur_y: material.technique(device, techniques::SHADOW_BLUR_Y)?,
        };

        let params = ShadowParameters {
            source: material.parameter(device, parameters::TEX_SOURCE)?,
            source_size_inv: material.parameter(device, parameters::TEX_SOURCE_SIZE_INV)?,
            clip_constant: material.parameter(device, parameters::CLIP_CONSTANT)?,
            offset: material.parameter(device, parameters::OFFSET)?,
            weight: material.parameter(device, parameters::WEIGHT)?,
            factor: material.parameter(device, parameters::SHADOW_FACTOR)?,
            channel: material.parameter(device, parameters::SHADOW_CHANNEL)?,
        };

        device.set_parameter(params.offset, ParamValue::Float4(Vec4::from_array(BLUR_OFFSETS)));
        device.set_parameter(params.weight, ParamValue::Float3(Vec3::from_array(BLUR_WEIGHTS)));

        let depth_format = first_supported(device, &DEPTH_FORMATS)
            .ok_or_else(|| RenderError::UnsupportedFormat("shadow depth map".into()))?;
        let linear_format = first_supported(device, &LINEAR_FORMATS)
            .ok_or_else(|| RenderError::UnsupportedFormat("shadow linear depth map".into()))?;

        let depth_layout = resources.create_layout(
            device,
            &FramebufferLayoutDesc {
                label: "shadow.depth".into(),
                color_formats: Vec::new(),
                depth_stencil_format: Some(depth_format),
            },
        )?;
        let linear_layout = resources.create_layout(
            device,
            &FramebufferLayoutDesc {
                label: "shadow.linear".into(),
                color_formats: vec![linear_format],
                depth_stencil_format: None,
            },
        )?;
        let reflective_layout = resources.create_layout(
            device,
            &FramebufferLayoutDesc {
                label: "shadow.reflective".into(),
                color_formats: vec![TextureFormat::Rgba8Unorm, TextureFormat::Rgba8Unorm],
                depth_stencil_format: Some(depth_format),
            },
        )?;

        let size = self.resolution();
        let depth = resources.create_render_target(
            device,
            &TextureDesc::new_2d("shadow.depth", size, size, depth_format),
            depth_layout,
        )?;
        let linear = if self.mode == ShadowMode::Soft {
            Some(resources.create_render_target(
                device,
                &TextureDesc::new_2d("shadow.linear", size, size, linear_format),
                linear_layout,
            )?)
        } else {
            None
        };

        Ok(ShadowState {
            material,
            techniques,
            params,
            layouts: ShadowMapLayouts {
                resolution: size,
                depth_format,
                linear_format,
                depth_layout,
                linear_layout,
                reflective_layout,
            },
            depth,
            linear,
        })
    }

    /// Release every resource created by [`Self::setup`]
    pub fn close(&mut self, device: &mut dyn RenderPipelineDevice) {
        if self.state.take().is_some() {
            log::info!("Shadow pipeline closed");
        }
        self.resources.release(device);
    }

    /// Render the shadow maps of every shadow-casting light
    pub fn render_shadow_maps(&self, device: &mut dyn RenderPipelineDevice, lights: &[Light]) {
        if self.state.is_none() {
            return;
        }
        for light in lights {
            if !light.casts_shadow() {
                continue;
            }
            let queue = if light.has_reflective_maps() {
                RenderQueue::ReflectiveShadow
            } else {
                RenderQueue::Shadow
            };
            self.render_shadow_map(device, light, queue);
        }
    }

    /// Render and filter one light's shadow maps from `queue`
    pub fn render_shadow_map(
        &self,
        device: &mut dyn RenderPipelineDevice,
        light: &Light,
        queue: RenderQueue,
    ) {
        let Some(state) = self.state.as_ref() else {
            return;
        };
        log::trace!("shadow: rendering '{}' from {:?}", light.label, queue);

        let blur_x = if light.light_type.has_orthographic_shadow() {
            state.techniques.blur_ortho_x
        } else {
            state.techniques.blur_perspective_x
        };
        let size_inv = Vec2::splat(1.0 / state.layouts.resolution.max(1) as f32);

        for (channel, shadow_camera) in light.shadow_cameras().iter().enumerate() {
            // Reflective output needs the view's own flux/normal/depth target
            let (depth_framebuffer, depth_texture, queue) = match shadow_camera.depth {
                Some(own) => (own.framebuffer, own.depth, queue),
                None if queue == RenderQueue::ReflectiveShadow => {
                    log::warn!("shadow: '{}' has no reflective target, rendering depth only", light.label);
                    (state.depth.framebuffer, state.depth.texture, RenderQueue::Shadow)
                }
                None => (state.depth.framebuffer, state.depth.texture, queue),
            };

            device.set_camera(&shadow_camera.camera);
            device.set_framebuffer(Some(depth_framebuffer));
            if shadow_camera.depth.is_some() {
                device.clear_framebuffer(0, ClearFlags::COLOR, Vec4::ZERO, 1.0, 0);
                device.clear_framebuffer(1, ClearFlags::COLOR, Vec4::ZERO, 1.0, 0);
                device.clear_framebuffer(2, ClearFlags::DEPTH_STENCIL, Vec4::ZERO, 1.0, 0);
            } else {
                device.clear_framebuffer(0, ClearFlags::DEPTH_STENCIL, Vec4::ZERO, 1.0, 0);
            }
            device.draw_render_queue(queue, None);

            device.set_parameter(state.params.factor, ParamValue::Float(light.shadow_factor));
            device.set_parameter(state.params.channel, ParamValue::Int(channel as i32));
            device.set_parameter(state.params.source, ParamValue::Texture(Some(depth_texture)));
            device.set_parameter(state.params.source_size_inv, ParamValue::Float2(size_inv));
            device.set_parameter(
                state.params.clip_constant,
                ParamValue::Float4(shadow_camera.camera.clip_constant()),
            );

            match (self.mode, state.linear) {
                (ShadowMode::Soft, Some(temp)) => {
                    device.set_framebuffer(Some(temp.framebuffer));
                    device.discard_framebuffer(0);
                    device.draw_screen_quad(blur_x);

                    device.set_parameter(state.params.source, ParamValue::Texture(Some(temp.texture)));
                    device.set_framebuffer(Some(shadow_camera.linear_depth.framebuffer));
                    device.discard_framebuffer(0);
                    device.draw_screen_quad(state.techniques.blur_y);
                }
                _ => {
                    device.set_framebuffer(Some(shadow_camera.linear_depth.framebuffer));
                    device.discard_framebuffer(0);
                    device.draw_screen_quad(blur_x);
                }
            }
        }
    }

    /// Convert a depth texture rendered from `camera` into linear depth
    /// without filtering
    pub fn linearize_depth(
        &self,
        device: &mut dyn RenderPipelineDevice,
        source: TextureHandle,
        target: FramebufferHandle,
        camera: &CameraState,
    ) -> Result<()> {
        let state = self.state.as_ref().ok_or(RenderError::NotConfigured)?;
        let technique = if camera.orthographic {
            state.techniques.conv_ortho
        } else {
            state.techniques.conv_perspective
        };

        device.set_parameter(state.params.source, ParamValue::Texture(Some(source)));
        device.set_parameter(state.params.clip_constant, ParamValue::Float4(camera.clip_constant()));
        device.set_framebuffer(Some(target));
        device.discard_framebuffer(0);
        device.draw_screen_quad(technique);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blur_weights_normalized() {
        let total = BLUR_WEIGHTS[0] + 2.0 * (BLUR_WEIGHTS[1] + BLUR_WEIGHTS[2]);
        assert!((total - 1.0).abs() < 1e-4);
        assert_eq!(BLUR_OFFSETS[0], -BLUR_OFFSETS[2]);
        assert_eq!(BLUR_OFFSETS[1], -BLUR_OFFSETS[3]);
    }

    #[test]
    fn test_new_is_unconfigured() {
        let pipeline = ShadowRenderPipeline::new(ShadowMode::Soft, ShadowQuality::High);
        assert!(!pipeline.is_enabled());
        assert_eq!(pipeline.resolution(), 2048);
        assert!(pipeline.shadow_map_layouts().is_none());
    }
}
