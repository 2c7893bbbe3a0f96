//! Deferred lighting pipeline
//!
//! # Frame
//!
//! For a main camera, every [`DeferredLightingPipeline::render`] call:
//!
//! 1. Renders the shadow maps of shadow-casting lights
//! 2. Rebinds the camera's G-buffer targets and publishes them as semantics
//! 3. Opaque: depth-only, G-buffer, light accumulation, shading
//! 4. Runs post processes (ambient occlusion)
//! 5. Transparent: the same four passes, keeping opaque depth and
//!    compositing onto the opaque result
//! 6. Copies the shaded image to the camera's viewport
//!
//! Light accumulation is masked per pixel by stencil: geometry writes
//! its layer bit during the G-buffer pass and each light tests against
//! `1 << layer`.
//!
//! Shadow cameras instead render an exponential shadow map and blur it
//! in two separable passes.

use glam::{Vec3, Vec4};

use crate::camera::{Camera, CameraOrder, CameraState};
use crate::deferred::post::PostProcess;
use crate::deferred::targets::{DeferredLayouts, DeferredTargets, ShadowCameraTargets};
use crate::device::{ParamValue, RenderPipelineDevice, RenderQueue};
use crate::error::{RenderError, Result};
use crate::light::{Light, LightType};
use crate::material::{paths, Material};
use crate::mesh;
use crate::resource::{ClearFlags, MeshHandle, ParameterHandle, ResourceSet, TechniqueHandle, Viewport};
use crate::semantic::{
    Float3Semantic, Float4Semantic, FloatSemantic, MatrixSemantic, SharedSemantics, TextureSemantic,
};
use crate::settings::RenderSettings;
use crate::shadow::{ShadowMode, ShadowRenderPipeline};

/// Exponential shadow map factor, shared by the shadow and lit side
pub const ESM_FACTOR: f32 = 0.7;

/// Segment count of the point and spot light proxy volumes
const PROXY_SEGMENTS: u32 = 16;

/// Technique names in the deferred lighting material
pub mod techniques {
    pub const DEPTH_ONLY: &str = "DeferredDepthOnly";
    pub const SUN_LIGHT: &str = "DeferredSunLight";
    pub const POINT_LIGHT: &str = "DeferredPointLight";
    pub const SPOT_LIGHT: &str = "DeferredSpotLight";
    pub const SHADING: &str = "DeferredShading";

    /// Techniques in the exponential shadow map material
    pub const SHADOW: &str = "DeferredShadow";
    pub const SHADOW_BLUR_X: &str = "DeferredShadowBlurX";
    pub const SHADOW_BLUR_Y: &str = "DeferredShadowBlurY";
}

/// Parameter names in the deferred lighting material
pub mod parameters {
    pub const TEX_DEPTH: &str = "texDepth";
    pub const TEX_DIFFUSE: &str = "texDiffuse";
    pub const TEX_NORMAL: &str = "texNormal";
    pub const TEX_LIGHT: &str = "texLight";
    pub const SHADOW_CHANNEL: &str = "shadowChannel";
    pub const SHADOW_MAP: &str = "shadowMap";
    pub const SHADOW_MATRIX: &str = "shadowMatrix";
    pub const SHADOW_FACTOR: &str = "shadowFactor";

    /// Parameters in the exponential shadow map material
    pub const TEX_SOURCE: &str = "texSource";
}

#[derive(Debug)]
struct LightingTechniques {
    depth_only: TechniqueHandle,
    sun: TechniqueHandle,
    point: TechniqueHandle,
    spot: TechniqueHandle,
    shading: TechniqueHandle,
}

#[derive(Debug)]
struct LightingParameters {
    tex_depth: ParameterHandle,
    tex_diffuse: ParameterHandle,
    tex_normal: ParameterHandle,
    tex_light: ParameterHandle,
    shadow_channel: ParameterHandle,
    shadow_map: ParameterHandle,
    shadow_matrix: ParameterHandle,
    shadow_lit_factor: ParameterHandle,
}

#[derive(Debug)]
struct EsmBlur {
    generate: TechniqueHandle,
    blur_x: TechniqueHandle,
    blur_y: TechniqueHandle,
    source: ParameterHandle,
    factor: ParameterHandle,
}

#[derive(Debug)]
struct LightingState {
    lighting: Material,
    shadow: Material,
    techniques: LightingTechniques,
    params: LightingParameters,
    esm: EsmBlur,
    layouts: DeferredLayouts,
    sphere: MeshHandle,
    cone: MeshHandle,
}

/// Deferred shading orchestrator
pub struct DeferredLightingPipeline {
    settings: RenderSettings,
    semantics: SharedSemantics,
    state: Option<LightingState>,
    resources: ResourceSet,
    shadow_pipeline: ShadowRenderPipeline,
    post_processes: Vec<Box<dyn PostProcess>>,
}

impl DeferredLightingPipeline {
    /// Create an unconfigured pipeline publishing into `semantics`
    pub fn new(settings: RenderSettings, semantics: SharedSemantics) -> Self {
        let shadow_pipeline = ShadowRenderPipeline::new(settings.shadow_mode, settings.shadow_quality);
        Self {
            settings,
            semantics,
            state: None,
            resources: ResourceSet::new(),
            shadow_pipeline,
            post_processes: Vec::new(),
        }
    }

    /// Create a pipeline publishing into the registry `device` binds from
    pub fn for_device(settings: RenderSettings, device: &dyn RenderPipelineDevice) -> Self {
        Self::new(settings, device.semantics())
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn semantics(&self) -> &SharedSemantics {
        &self.semantics
    }

    /// Whether setup completed
    pub fn is_configured(&self) -> bool {
        self.state.is_some()
    }

    /// The per-light shadow pipeline this pipeline drives
    pub fn shadow_pipeline(&self) -> &ShadowRenderPipeline {
        &self.shadow_pipeline
    }

    /// Layouts camera targets are created with
    pub fn layouts(&self) -> Option<&DeferredLayouts> {
        self.state.as_ref().map(|s| &s.layouts)
    }

    /// Load both materials, resolve every named technique and parameter,
    /// upload proxy meshes and set up the shadow pipeline.
    ///
    /// Any failure releases everything created so far, including the
    /// shadow pipeline's resources.
    pub fn setup(&mut self, device: &mut dyn RenderPipelineDevice) -> Result<()> {
        if self.state.is_some() {
            log::warn!("Deferred pipeline set up twice, releasing previous resources");
            self.close(device);
        }

        let mut resources = ResourceSet::new();
        let state = match Self::create_state(device, &mut resources) {
            Ok(state) => state,
            Err(e) => {
                log::error!("Deferred pipeline setup failed: {}", e);
                resources.release(device);
                return Err(e);
            }
        };

        if let Err(e) = self.shadow_pipeline.setup(device) {
            log::error!("Deferred pipeline setup failed in shadow pipeline: {}", e);
            resources.release(device);
            return Err(e);
        }

        device.set_parameter(state.params.shadow_lit_factor, ParamValue::Float(ESM_FACTOR));
        device.set_parameter(state.esm.factor, ParamValue::Float(ESM_FACTOR));
        {
            let mut semantics = self.semantics.write();
            semantics.set_float(FloatSemantic::LightShadowFactor, ESM_FACTOR);
        }

        log::info!(
            "Deferred pipeline ready: {}x{}, shadows {:?}/{:?}",
            self.settings.width,
            self.settings.height,
            self.settings.shadow_mode,
            self.settings.shadow_quality
        );
        self.state = Some(state);
        self.resources = resources;
        Ok(())
    }

    fn create_state(
        device: &mut dyn RenderPipelineDevice,
        resources: &mut ResourceSet,
    ) -> Result<LightingState> {
        let lighting = Material::load(device, resources, paths::DEFERRED_LIGHTING)?;
        let techniques = LightingTechniques {
            depth_only: lighting.technique(device, techniques::DEPTH_ONLY)?,
            sun: lighting.technique(device, techniques::SUN_LIGHT)?,
            point: lighting.technique(device, techniques::POINT_LIGHT)?,
            spot: lighting.technique(device, techniques::SPOT_LIGHT)?,
            shading: lighting.technique(device, techniques::SHADING)?,
        };
        let params = LightingParameters {
            tex_depth: lighting.parameter(device, parameters::TEX_DEPTH)?,
            tex_diffuse: lighting.parameter(device, parameters::TEX_DIFFUSE)?,
            tex_normal: lighting.parameter(device, parameters::TEX_NORMAL)?,
            tex_light: lighting.parameter(device, parameters::TEX_LIGHT)?,
            shadow_channel: lighting.parameter(device, parameters::SHADOW_CHANNEL)?,
            shadow_map: lighting.parameter(device, parameters::SHADOW_MAP)?,
            shadow_matrix: lighting.parameter(device, parameters::SHADOW_MATRIX)?,
            shadow_lit_factor: lighting.parameter(device, parameters::SHADOW_FACTOR)?,
        };

        let shadow = Material::load(device, resources, paths::DEFERRED_SHADOW)?;
        let esm = EsmBlur {
            generate: shadow.technique(device, techniques::SHADOW)?,
            blur_x: shadow.technique(device, techniques::SHADOW_BLUR_X)?,
            blur_y: shadow.technique(device, techniques::SHADOW_BLUR_Y)?,
            source: shadow.parameter(device, parameters::TEX_SOURCE)?,
            factor: shadow.parameter(device, parameters::SHADOW_FACTOR)?,
        };

        let layouts = DeferredLayouts::create(device, resources)?;
        let sphere = resources.create_mesh(device, &mesh::sphere(PROXY_SEGMENTS).to_desc("proxy.sphere"))?;
        let cone = resources.create_mesh(device, &mesh::cone(PROXY_SEGMENTS).to_desc("proxy.cone"))?;

        Ok(LightingState {
            lighting,
            shadow,
            techniques,
            params,
            esm,
            layouts,
            sphere,
            cone,
        })
    }

    /// Release every pipeline resource. Camera targets are left alone.
    pub fn close(&mut self, device: &mut dyn RenderPipelineDevice) {
        for post in &mut self.post_processes {
            post.close(device);
        }
        self.shadow_pipeline.close(device);
        self.resources.release(device);
        if let Some(state) = self.state.take() {
            log::info!(
                "Deferred pipeline closed ({}, {})",
                state.lighting.path(),
                state.shadow.path()
            );
        }
    }

    /// Register a post process run after opaque shading
    pub fn add_post_process(&mut self, post: Box<dyn PostProcess>) {
        log::debug!("Post process '{}' added", post.name());
        self.post_processes.push(post);
    }

    /// Record a new output size. Camera targets are recreated by their owner.
    pub fn on_resolution_change(&mut self, width: u32, height: u32) {
        log::info!(
            "Deferred pipeline resolution {}x{} -> {}x{}",
            self.settings.width,
            self.settings.height,
            width,
            height
        );
        self.settings.width = width;
        self.settings.height = height;
        self.settings.validate();
    }

    /// Create the G-buffer family for a main camera
    pub fn create_deferred_targets(
        &self,
        device: &mut dyn RenderPipelineDevice,
        width: u32,
        height: u32,
    ) -> Result<DeferredTargets> {
        let state = self.state.as_ref().ok_or(RenderError::NotConfigured)?;
        DeferredTargets::create(device, &state.layouts, width, height)
    }

    /// Release a camera's G-buffer family
    pub fn release_deferred_targets(&self, device: &mut dyn RenderPipelineDevice, targets: DeferredTargets) {
        targets.release(device);
    }

    /// Create exponential shadow map targets for a shadow camera
    pub fn create_shadow_camera_targets(
        &self,
        device: &mut dyn RenderPipelineDevice,
        size: u32,
    ) -> Result<ShadowCameraTargets> {
        let state = self.state.as_ref().ok_or(RenderError::NotConfigured)?;
        ShadowCameraTargets::create(device, &state.layouts, size)
    }

    /// Allocate shadow maps for `light` if it casts shadows and shadows
    /// are enabled
    pub fn setup_light_shadows(&self, device: &mut dyn RenderPipelineDevice, light: &mut Light) -> Result<()> {
        match self.shadow_pipeline.shadow_map_layouts() {
            Some(layouts) if light.shadow_mode != ShadowMode::None => {
                light.setup_shadow_maps(device, layouts)
            }
            _ => Ok(()),
        }
    }

    /// Render one camera
    pub fn render(
        &mut self,
        device: &mut dyn RenderPipelineDevice,
        camera: &Camera,
        lights: &[Light],
    ) -> Result<()> {
        match camera.order {
            CameraOrder::Shadow => self.render_shadow(device, camera),
            CameraOrder::Main | CameraOrder::Custom => self.render_deferred(device, camera, lights),
        }
    }

    fn render_shadow(&self, device: &mut dyn RenderPipelineDevice, camera: &Camera) -> Result<()> {
        let state = self.state.as_ref().ok_or(RenderError::NotConfigured)?;
        let targets = camera
            .shadow_targets()
            .ok_or_else(|| RenderError::MissingTargets(camera.label.clone()))?;
        let esm = &state.esm;
        log::trace!("deferred: exponential shadow map for '{}'", camera.label);

        device.set_camera(&camera.state());
        device.set_framebuffer(Some(targets.render.framebuffer));
        device.clear_framebuffer(0, ClearFlags::COLOR, Vec4::ONE, 1.0, 0);
        device.clear_framebuffer(1, ClearFlags::DEPTH_STENCIL, Vec4::ONE, 1.0, 0);
        device.draw_render_queue(RenderQueue::Shadow, Some(esm.generate));

        device.set_parameter(esm.source, ParamValue::Texture(Some(targets.render.texture)));
        device.set_framebuffer(Some(targets.swap.framebuffer));
        device.discard_framebuffer(0);
        device.draw_screen_quad(esm.blur_x);

        device.set_parameter(esm.source, ParamValue::Texture(Some(targets.swap.texture)));
        device.set_framebuffer(Some(targets.render.framebuffer));
        device.discard_framebuffer(0);
        device.draw_screen_quad(esm.blur_y);
        Ok(())
    }

    fn render_deferred(
        &mut self,
        device: &mut dyn RenderPipelineDevice,
        camera: &Camera,
        lights: &[Light],
    ) -> Result<()> {
        let state = self.state.as_ref().ok_or(RenderError::NotConfigured)?;
        let targets = camera
            .deferred_targets()
            .ok_or_else(|| RenderError::MissingTargets(camera.label.clone()))?;

        self.shadow_pipeline.render_shadow_maps(device, lights);

        let camera_state = camera.state();
        device.set_camera(&camera_state);
        self.bind_targets(device, state, &camera_state, targets);

        log::trace!("deferred: opaque pass for '{}'", camera.label);
        self.render_depth_only(device, state, targets, RenderQueue::Opaque, ClearFlags::DEPTH_STENCIL);
        self.render_gbuffer(device, targets, RenderQueue::Opaque);
        self.render_lights(device, state, targets, lights);
        self.render_shading(device, state, targets, camera.clear_color, ClearFlags::COLOR);

        if self.settings.ssao_enabled {
            for post in self.post_processes.iter_mut() {
                device.debug_marker(post.name());
                post.render(device, &camera_state, targets);
            }
        }

        log::trace!("deferred: transparent pass for '{}'", camera.label);
        self.render_depth_only(device, state, targets, RenderQueue::Transparent, ClearFlags::STENCIL);
        self.render_gbuffer(device, targets, RenderQueue::Transparent);
        self.render_lights(device, state, targets, lights);
        self.render_shading(device, state, targets, camera.clear_color, ClearFlags::NONE);

        self.copy_to_viewport(device, camera, targets);
        Ok(())
    }

    /// Rebind the camera's targets as parameters and semantics
    fn bind_targets(
        &self,
        device: &mut dyn RenderPipelineDevice,
        state: &LightingState,
        camera: &CameraState,
        targets: &DeferredTargets,
    ) {
        {
            let mut semantics = self.semantics.write();
            semantics.set_camera(camera);
            semantics.set_float4(
                Float4Semantic::ScreenDimension,
                Vec4::new(
                    targets.width as f32,
                    targets.height as f32,
                    1.0 / targets.width.max(1) as f32,
                    1.0 / targets.height.max(1) as f32,
                ),
            );
            semantics.set_texture(TextureSemantic::DeferredDepthMap, Some(targets.depth));
            semantics.set_texture(TextureSemantic::DeferredGraphicMap, Some(targets.graphic));
            semantics.set_texture(TextureSemantic::DeferredNormalMap, Some(targets.normal));
            semantics.set_texture(TextureSemantic::DeferredLightMap, Some(targets.light));
            semantics.set_texture(TextureSemantic::DeferredShadingMap, Some(targets.shading));
            semantics.set_texture(TextureSemantic::DepthMap, Some(targets.depth));
            semantics.set_texture(TextureSemantic::ColorMap, Some(targets.graphic));
            semantics.set_texture(TextureSemantic::NormalMap, Some(targets.normal));
        }

        let params = &state.params;
        device.set_parameter(params.tex_depth, ParamValue::Texture(Some(targets.depth)));
        device.set_parameter(params.tex_diffuse, ParamValue::Texture(Some(targets.graphic)));
        device.set_parameter(params.tex_normal, ParamValue::Texture(Some(targets.normal)));
        device.set_parameter(params.tex_light, ParamValue::Texture(Some(targets.light)));
    }

    fn render_depth_only(
        &self,
        device: &mut dyn RenderPipelineDevice,
        state: &LightingState,
        targets: &DeferredTargets,
        queue: RenderQueue,
        clear: ClearFlags,
    ) {
        device.debug_marker("depth-only");
        device.set_framebuffer(Some(targets.depth_view));
        device.clear_framebuffer(0, clear, Vec4::ZERO, 1.0, 0);
        device.draw_render_queue(queue, Some(state.techniques.depth_only));
    }

    fn render_gbuffer(&self, device: &mut dyn RenderPipelineDevice, targets: &DeferredTargets, queue: RenderQueue) {
        device.debug_marker("gbuffer");
        device.set_framebuffer(Some(targets.graphic_view));
        device.clear_framebuffer(0, ClearFlags::COLOR, Vec4::ZERO, 1.0, 0);
        device.clear_framebuffer(1, ClearFlags::COLOR, Vec4::ZERO, 1.0, 0);
        device.draw_render_queue(queue, None);
    }

    fn render_lights(
        &self,
        device: &mut dyn RenderPipelineDevice,
        state: &LightingState,
        targets: &DeferredTargets,
        lights: &[Light],
    ) {
        device.debug_marker("lights");
        device.set_framebuffer(Some(targets.light_view));
        device.clear_framebuffer(0, ClearFlags::COLOR, Vec4::ZERO, 1.0, 0);

        let mut shadow_channel = 0;
        for light in lights {
            match light.light_type {
                LightType::Sun => self.render_sun_light(device, state, light, &mut shadow_channel),
                LightType::Point => self.render_point_light(device, state, light, &mut shadow_channel),
                LightType::Spot => self.render_spot_light(device, state, light, &mut shadow_channel),
                LightType::Hemisphere | LightType::Area => {
                    log::trace!("deferred: {:?} light '{}' not accumulated", light.light_type, light.label);
                }
            }
        }
    }

    fn publish_light(&self, light: &Light) {
        let mut semantics = self.semantics.write();
        semantics.set_float3(Float3Semantic::LightDiffuse, light.diffuse());
        semantics.set_float3(Float3Semantic::LightSpecular, light.diffuse());
        semantics.set_float3(Float3Semantic::LightPosition, light.position);
        semantics.set_float3(Float3Semantic::LightDirection, light.direction.normalize_or_zero());
        semantics.set_float(FloatSemantic::LightIntensity, light.intensity);
        semantics.set_float(FloatSemantic::LightRange, light.range);
        let range = light.range.max(f32::EPSILON);
        semantics.set_float3(
            Float3Semantic::LightAttenuation,
            Vec3::new(1.0, 0.0, 1.0 / (range * range)),
        );
    }

    /// Bind the light's first shadow map, or unbind when it casts none.
    ///
    /// The lighting technique samples a single map, so a point light's
    /// cube faces past the first are rendered but not sampled here.
    fn bind_light_shadow(
        &self,
        device: &mut dyn RenderPipelineDevice,
        state: &LightingState,
        light: &Light,
        channel: &mut i32,
    ) {
        let params = &state.params;
        let shadow = light
            .shadow_cameras()
            .first()
            .filter(|_| light.casts_shadow() && self.shadow_pipeline.is_enabled());

        match shadow {
            Some(shadow_camera) => {
                {
                    let mut semantics = self.semantics.write();
                    semantics.set_float(FloatSemantic::LightShadowChannel, *channel as f32);
                    semantics.set_matrix(MatrixSemantic::LightViewProject, shadow_camera.camera.view_projection);
                    semantics.set_texture(TextureSemantic::LightShadowMap, Some(shadow_camera.linear_depth.texture));
                }
                device.set_parameter(params.shadow_channel, ParamValue::Int(*channel));
                device.set_parameter(params.shadow_matrix, ParamValue::Mat4(shadow_camera.camera.view_projection));
                device.set_parameter(
                    params.shadow_map,
                    ParamValue::Texture(Some(shadow_camera.linear_depth.texture)),
                );
                *channel += 1;
            }
            None => {
                self.semantics.write().set_texture(TextureSemantic::LightShadowMap, None);
                device.set_parameter(params.shadow_channel, ParamValue::Int(-1));
                device.set_parameter(params.shadow_map, ParamValue::Texture(None));
            }
        }
    }

    fn render_sun_light(
        &self,
        device: &mut dyn RenderPipelineDevice,
        state: &LightingState,
        light: &Light,
        channel: &mut i32,
    ) {
        let technique = state.techniques.sun;
        self.publish_light(light);
        self.bind_light_shadow(device, state, light, channel);
        device.set_stencil_reference(technique, light.stencil_reference());
        device.draw_screen_quad(technique);
    }

    fn render_point_light(
        &self,
        device: &mut dyn RenderPipelineDevice,
        state: &LightingState,
        light: &Light,
        channel: &mut i32,
    ) {
        let technique = state.techniques.point;
        self.publish_light(light);
        self.semantics.write().set_model(light.volume_transform());
        self.bind_light_shadow(device, state, light, channel);
        device.set_stencil_reference(technique, light.stencil_reference());
        device.draw_mesh(state.sphere, technique);
    }

    fn render_spot_light(
        &self,
        device: &mut dyn RenderPipelineDevice,
        state: &LightingState,
        light: &Light,
        channel: &mut i32,
    ) {
        let technique = state.techniques.spot;
        self.publish_light(light);
        {
            let mut semantics = self.semantics.write();
            semantics.set_float(FloatSemantic::LightSpotInnerCone, light.spot_inner_cone.cos());
            semantics.set_float(FloatSemantic::LightSpotOuterCone, light.spot_outer_cone.cos());
            semantics.set_model(light.volume_transform());
        }
        self.bind_light_shadow(device, state, light, channel);
        device.set_stencil_reference(technique, light.stencil_reference());
        device.draw_mesh(state.cone, technique);
    }

    fn render_shading(
        &self,
        device: &mut dyn RenderPipelineDevice,
        state: &LightingState,
        targets: &DeferredTargets,
        clear_color: Vec4,
        clear: ClearFlags,
    ) {
        device.debug_marker("shading");
        device.set_framebuffer(Some(targets.shading_view));
        if !clear.is_empty() {
            device.clear_framebuffer(0, clear, clear_color, 1.0, 0);
        }
        device.draw_screen_quad(state.techniques.shading);
    }

    fn copy_to_viewport(&self, device: &mut dyn RenderPipelineDevice, camera: &Camera, targets: &DeferredTargets) {
        device.debug_marker("copy");
        device.blit_framebuffer(
            targets.shading_view,
            Viewport::full(targets.width, targets.height),
            camera.framebuffer,
            camera.viewport,
        );
    }
}

impl core::fmt::Debug for DeferredLightingPipeline {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeferredLightingPipeline")
            .field("settings", &self.settings)
            .field("configured", &self.state.is_some())
            .field("shadow_pipeline", &self.shadow_pipeline)
            .field("post_processes", &self.post_processes.len())
            .finish()
    }
}
