//! Scene lights and their shadow cameras
//!
//! A light owns the shadow maps it is rendered into: one shadow camera for
//! sun and spot lights, six (cube faces) for point lights. Each shadow
//! camera keeps a linear-depth target that the lighting pass samples, and
//! optionally its own depth framebuffer. Lights without one render through
//! the shadow pipeline's shared temporary depth target.

use core::f32::consts::FRAC_PI_2;

use glam::{Mat4, Quat, Vec3};
use ray_archive::{read_field, write_field, Archivable, ArchiveNode};
use serde::{Deserialize, Serialize};

use crate::camera::{CameraState, Projection};
use crate::device::RenderPipelineDevice;
use crate::error::Result;
use crate::resource::{
    FramebufferDesc, FramebufferHandle, FramebufferLayoutHandle, RenderTarget, ResourceSet,
    TextureDesc, TextureFormat, TextureHandle,
};
use crate::shadow::ShadowMode;

/// Highest stencil layer a light can select
pub const MAX_LIGHT_LAYER: u8 = 7;

/// Light type
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightType {
    /// Directional light at infinity
    #[default]
    Sun,
    Point,
    Spot,
    Hemisphere,
    Area,
}

impl LightType {
    /// Whether the deferred pipeline accumulates this light type
    pub fn is_supported(self) -> bool {
        matches!(self, Self::Sun | Self::Point | Self::Spot)
    }

    /// Number of shadow cameras this light type renders
    pub fn shadow_camera_count(self) -> usize {
        match self {
            Self::Sun | Self::Spot => 1,
            Self::Point => 6,
            Self::Hemisphere | Self::Area => 0,
        }
    }

    /// Whether shadow maps use an orthographic projection
    pub fn has_orthographic_shadow(self) -> bool {
        matches!(self, Self::Sun)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Sun => "sun",
            Self::Point => "point",
            Self::Spot => "spot",
            Self::Hemisphere => "hemisphere",
            Self::Area => "area",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sun" => Some(Self::Sun),
            "point" => Some(Self::Point),
            "spot" => Some(Self::Spot),
            "hemisphere" => Some(Self::Hemisphere),
            "area" => Some(Self::Area),
            _ => None,
        }
    }
}

/// Formats and layouts shadow maps are created with
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShadowMapLayouts {
    /// Shadow map edge length
    pub resolution: u32,
    pub depth_format: TextureFormat,
    pub linear_format: TextureFormat,
    /// Depth-only layout
    pub depth_layout: FramebufferLayoutHandle,
    /// Single linear-depth color attachment
    pub linear_layout: FramebufferLayoutHandle,
    /// Flux + normal color attachments and depth
    pub reflective_layout: FramebufferLayoutHandle,
}

/// A shadow camera's own depth framebuffer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthTarget {
    pub framebuffer: FramebufferHandle,
    pub depth: TextureHandle,
    /// Reflected flux, for global illumination
    pub flux: Option<TextureHandle>,
    /// World normal, for global illumination
    pub normal: Option<TextureHandle>,
}

/// One view a light renders its shadow casters from
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowCamera {
    pub camera: CameraState,
    pub depth: Option<DepthTarget>,
    pub linear_depth: RenderTarget,
}

/// Scene light
#[derive(Debug)]
pub struct Light {
    /// Debug label
    pub label: String,
    pub light_type: LightType,
    /// Linear RGB color
    pub color: Vec3,
    pub intensity: f32,
    /// Influence radius (point/spot)
    pub range: f32,
    /// World position (sun: centre of the shadowed region)
    pub position: Vec3,
    /// World direction the light travels
    pub direction: Vec3,
    /// Spot inner cone half angle, radians
    pub spot_inner_cone: f32,
    /// Spot outer cone half angle, radians
    pub spot_outer_cone: f32,
    /// Stencil layer selecting the geometry this light affects
    pub layer: u8,
    pub shadow_mode: ShadowMode,
    /// Exponential shadow map sharpness
    pub shadow_factor: f32,
    /// Half size of the sun's orthographic shadow volume
    pub shadow_extent: f32,
    /// Render reflective shadow maps for global illumination
    pub global_illumination: bool,
    shadow_cameras: Vec<ShadowCamera>,
    shadow_resources: ResourceSet,
    /// Type and global illumination flag the shadow maps were built for
    shadow_source: Option<(LightType, bool)>,
}

impl Light {
    /// Create a white light of `light_type` on layer 0
    pub fn new(label: impl Into<String>, light_type: LightType) -> Self {
        Self {
            label: label.into(),
            light_type,
            color: Vec3::ONE,
            intensity: 1.0,
            range: 10.0,
            position: Vec3::ZERO,
            direction: Vec3::NEG_Y,
            spot_inner_cone: 20.0_f32.to_radians(),
            spot_outer_cone: 30.0_f32.to_radians(),
            layer: 0,
            shadow_mode: ShadowMode::None,
            shadow_factor: 600.0,
            shadow_extent: 50.0,
            global_illumination: false,
            shadow_cameras: Vec::new(),
            shadow_resources: ResourceSet::new(),
            shadow_source: None,
        }
    }

    /// Builder: set color and intensity
    pub fn with_color(mut self, color: Vec3, intensity: f32) -> Self {
        self.color = color;
        self.intensity = intensity;
        self
    }

    /// Builder: set the stencil layer
    pub fn with_layer(mut self, layer: u8) -> Self {
        self.set_layer(layer);
        self
    }

    /// Builder: set the shadow mode
    pub fn with_shadow(mut self, mode: ShadowMode) -> Self {
        self.shadow_mode = mode;
        self
    }

    /// Set the stencil layer, clamped to the stencil bit count
    pub fn set_layer(&mut self, layer: u8) {
        if layer > MAX_LIGHT_LAYER {
            log::warn!("light '{}' layer {} clamped to {}", self.label, layer, MAX_LIGHT_LAYER);
        }
        self.layer = layer.min(MAX_LIGHT_LAYER);
    }

    /// Stencil bit of this light's layer
    pub fn stencil_reference(&self) -> u32 {
        1u32 << self.layer.min(MAX_LIGHT_LAYER)
    }

    /// Color scaled by intensity
    pub fn diffuse(&self) -> Vec3 {
        self.color * self.intensity
    }

    /// Whether the light currently has shadow maps to sample
    pub fn casts_shadow(&self) -> bool {
        self.shadow_mode != ShadowMode::None && !self.shadow_cameras.is_empty() && self.shadow_maps_current()
    }

    /// Whether the allocated shadow maps still match the light's type and
    /// global illumination flag. Stale maps are not rendered until
    /// [`Self::setup_shadow_maps`] runs again.
    pub fn shadow_maps_current(&self) -> bool {
        self.shadow_source == Some((self.light_type, self.global_illumination))
    }

    /// Whether the allocated shadow views carry flux/normal targets
    pub fn has_reflective_maps(&self) -> bool {
        !self.shadow_cameras.is_empty()
            && self
                .shadow_cameras
                .iter()
                .all(|c| c.depth.and_then(|d| d.flux).is_some())
    }

    pub fn shadow_cameras(&self) -> &[ShadowCamera] {
        &self.shadow_cameras
    }

    /// Normalized travel direction, falling back to straight down
    fn travel_direction(&self) -> Vec3 {
        let dir = self.direction.normalize_or_zero();
        if dir == Vec3::ZERO {
            Vec3::NEG_Y
        } else {
            dir
        }
    }

    /// Transform of the unit proxy volume (sphere for point, cone for spot)
    pub fn volume_transform(&self) -> Mat4 {
        match self.light_type {
            LightType::Spot => {
                let radius = self.range * self.spot_outer_cone.min(1.5).tan();
                Mat4::from_scale_rotation_translation(
                    Vec3::new(radius, radius, self.range),
                    Quat::from_rotation_arc(Vec3::NEG_Z, self.travel_direction()),
                    self.position,
                )
            }
            _ => Mat4::from_scale_rotation_translation(
                Vec3::splat(self.range),
                Quat::IDENTITY,
                self.position,
            ),
        }
    }

    /// Camera matrices for every shadow view of this light
    pub fn shadow_camera_states(&self) -> Vec<CameraState> {
        let near = 0.1;
        match self.light_type {
            LightType::Sun => {
                let dir = self.travel_direction();
                let extent = self.shadow_extent.max(near);
                let eye = self.position - dir * extent;
                let view = Mat4::look_at_rh(eye, self.position, up_for(dir));
                let projection = Projection::orthographic(extent * 2.0, extent * 2.0, near, extent * 2.0);
                vec![CameraState::new(view, &projection)]
            }
            LightType::Spot => {
                let dir = self.travel_direction();
                let view = Mat4::look_at_rh(self.position, self.position + dir, up_for(dir));
                let projection = Projection::Perspective {
                    fov: (self.spot_outer_cone * 2.0).clamp(0.01, 3.0),
                    aspect: 1.0,
                    near,
                    far: self.range.max(near * 2.0),
                };
                vec![CameraState::new(view, &projection)]
            }
            LightType::Point => {
                let projection = Projection::Perspective {
                    fov: FRAC_PI_2,
                    aspect: 1.0,
                    near,
                    far: self.range.max(near * 2.0),
                };
                CUBE_FACES
                    .iter()
                    .map(|(dir, up)| {
                        let view = Mat4::look_at_rh(self.position, self.position + *dir, *up);
                        CameraState::new(view, &projection)
                    })
                    .collect()
            }
            LightType::Hemisphere | LightType::Area => Vec::new(),
        }
    }

    /// Recompute shadow camera matrices after the light moved
    pub fn update_shadow_cameras(&mut self) {
        if !self.shadow_cameras.is_empty() && !self.shadow_maps_current() {
            log::warn!(
                "light '{}' changed type or global illumination, shadow maps need setup again",
                self.label
            );
            return;
        }
        let states = self.shadow_camera_states();
        for (shadow_camera, state) in self.shadow_cameras.iter_mut().zip(states) {
            shadow_camera.camera = state;
        }
    }

    /// Allocate shadow maps for every shadow view.
    ///
    /// Lights with global illumination get their own flux/normal/depth
    /// framebuffer. Previous maps are released first; on failure nothing
    /// stays allocated.
    pub fn setup_shadow_maps(
        &mut self,
        device: &mut dyn RenderPipelineDevice,
        layouts: &ShadowMapLayouts,
    ) -> Result<()> {
        self.release_shadow_maps(device);

        let mut resources = ResourceSet::new();
        match self.create_shadow_cameras(device, layouts, &mut resources) {
            Ok(cameras) => {
                log::debug!(
                    "Light '{}': {} shadow map(s) at {}px",
                    self.label,
                    cameras.len(),
                    layouts.resolution
                );
                self.shadow_cameras = cameras;
                self.shadow_resources = resources;
                self.shadow_source = Some((self.light_type, self.global_illumination));
                Ok(())
            }
            Err(e) => {
                log::error!("Light '{}' shadow map setup failed: {}", self.label, e);
                resources.release(device);
                Err(e)
            }
        }
    }

    fn create_shadow_cameras(
        &self,
        device: &mut dyn RenderPipelineDevice,
        layouts: &ShadowMapLayouts,
        resources: &mut ResourceSet,
    ) -> Result<Vec<ShadowCamera>> {
        let size = layouts.resolution;
        let mut cameras = Vec::new();

        for (face, state) in self.shadow_camera_states().into_iter().enumerate() {
            let label = format!("{}.shadow{}", self.label, face);
            let linear_depth = resources.create_render_target(
                device,
                &TextureDesc::new_2d(format!("{}.linear", label), size, size, layouts.linear_format),
                layouts.linear_layout,
            )?;

            let depth = if self.global_illumination {
                let depth = resources.create_texture(
                    device,
                    &TextureDesc::new_2d(format!("{}.depth", label), size, size, layouts.depth_format),
                )?;
                let flux = resources.create_texture(
                    device,
                    &TextureDesc::new_2d(format!("{}.flux", label), size, size, TextureFormat::Rgba8Unorm),
                )?;
                let normal = resources.create_texture(
                    device,
                    &TextureDesc::new_2d(format!("{}.normal", label), size, size, TextureFormat::Rgba8Unorm),
                )?;
                let framebuffer = resources.create_framebuffer(
                    device,
                    &FramebufferDesc {
                        label: format!("{}.reflective", label),
                        layout: layouts.reflective_layout,
                        width: size,
                        height: size,
                        color_attachments: vec![flux, normal],
                        depth_stencil: Some(depth),
                    },
                )?;
                Some(DepthTarget {
                    framebuffer,
                    depth,
                    flux: Some(flux),
                    normal: Some(normal),
                })
            } else {
                None
            };

            cameras.push(ShadowCamera {
                camera: state,
                depth,
                linear_depth,
            });
        }
        Ok(cameras)
    }

    /// Release every shadow map this light owns
    pub fn release_shadow_maps(&mut self, device: &mut dyn RenderPipelineDevice) {
        self.shadow_cameras.clear();
        self.shadow_source = None;
        self.shadow_resources.release(device);
    }
}

const CUBE_FACES: [(Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::NEG_Y),
    (Vec3::NEG_X, Vec3::NEG_Y),
    (Vec3::Y, Vec3::Z),
    (Vec3::NEG_Y, Vec3::NEG_Z),
    (Vec3::Z, Vec3::NEG_Y),
    (Vec3::NEG_Z, Vec3::NEG_Y),
];

fn up_for(dir: Vec3) -> Vec3 {
    if dir.abs_diff_eq(Vec3::Y, 1e-3) || dir.abs_diff_eq(Vec3::NEG_Y, 1e-3) {
        Vec3::Z
    } else {
        Vec3::Y
    }
}

impl Archivable for Light {
    fn save(&self, node: &mut ArchiveNode) -> ray_archive::Result<()> {
        write_field(node, "label", self.label.as_str())?;
        write_field(node, "type", self.light_type.name())?;
        write_field(node, "color", self.color.to_array())?;
        write_field(node, "intensity", self.intensity)?;
        write_field(node, "range", self.range)?;
        write_field(node, "position", self.position.to_array())?;
        write_field(node, "direction", self.direction.to_array())?;
        write_field(node, "spot_inner_cone", self.spot_inner_cone)?;
        write_field(node, "spot_outer_cone", self.spot_outer_cone)?;
        write_field(node, "layer", self.layer)?;
        write_field(node, "shadow", self.shadow_mode.name())?;
        write_field(node, "shadow_factor", self.shadow_factor)?;
        write_field(node, "shadow_extent", self.shadow_extent)?;
        write_field(node, "global_illumination", self.global_illumination)
    }

    fn load(&mut self, node: &ArchiveNode) -> ray_archive::Result<()> {
        read_field(node, "label", &mut self.label)?;

        let mut light_type = String::from(self.light_type.name());
        read_field(node, "type", &mut light_type)?;
        match LightType::from_name(&light_type) {
            Some(t) => self.light_type = t,
            None => log::warn!("unknown light type '{}', keeping {:?}", light_type, self.light_type),
        }

        let mut color = self.color.to_array();
        read_field(node, "color", &mut color)?;
        self.color = Vec3::from_array(color);

        read_field(node, "intensity", &mut self.intensity)?;
        read_field(node, "range", &mut self.range)?;

        let mut position = self.position.to_array();
        read_field(node, "position", &mut position)?;
        self.position = Vec3::from_array(position);

        let mut direction = self.direction.to_array();
        read_field(node, "direction", &mut direction)?;
        self.direction = Vec3::from_array(direction);

        read_field(node, "spot_inner_cone", &mut self.spot_inner_cone)?;
        read_field(node, "spot_outer_cone", &mut self.spot_outer_cone)?;

        let mut layer = self.layer;
        read_field(node, "layer", &mut layer)?;
        self.set_layer(layer);

        let mut shadow = String::from(self.shadow_mode.name());
        read_field(node, "shadow", &mut shadow)?;
        match ShadowMode::from_name(&shadow) {
            Some(mode) => self.shadow_mode = mode,
            None => log::warn!("unknown shadow mode '{}', keeping {:?}", shadow, self.shadow_mode),
        }

        read_field(node, "shadow_factor", &mut self.shadow_factor)?;
        read_field(node, "shadow_extent", &mut self.shadow_extent)?;
        read_field(node, "global_illumination", &mut self.global_illumination)?;
        self.update_shadow_cameras();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ray_archive::save_to_node;

    #[test]
    fn test_supported_types() {
        assert!(LightType::Sun.is_supported());
        assert!(LightType::Spot.is_supported());
        assert!(LightType::Point.is_supported());
        assert!(!LightType::Hemisphere.is_supported());
        assert!(!LightType::Area.is_supported());
    }

    #[test]
    fn test_stencil_reference() {
        let light = Light::new("l", LightType::Point).with_layer(3);
        assert_eq!(light.stencil_reference(), 0b1000);

        let clamped = Light::new("l", LightType::Point).with_layer(200);
        assert_eq!(clamped.layer, MAX_LIGHT_LAYER);
        assert_eq!(clamped.stencil_reference(), 1 << 7);
    }

    #[test]
    fn test_shadow_camera_counts() {
        assert_eq!(Light::new("s", LightType::Sun).shadow_camera_states().len(), 1);
        assert_eq!(Light::new("s", LightType::Spot).shadow_camera_states().len(), 1);
        assert_eq!(Light::new("p", LightType::Point).shadow_camera_states().len(), 6);
        assert!(Light::new("a", LightType::Area).shadow_camera_states().is_empty());
    }

    #[test]
    fn test_sun_shadow_is_orthographic() {
        let sun = Light::new("sun", LightType::Sun);
        let states = sun.shadow_camera_states();
        assert!(states[0].orthographic);

        let spot = Light::new("spot", LightType::Spot);
        assert!(!spot.shadow_camera_states()[0].orthographic);
    }

    #[test]
    fn test_spot_volume_points_along_direction() {
        let mut spot = Light::new("spot", LightType::Spot);
        spot.direction = Vec3::X;
        spot.range = 4.0;
        let tip = spot.volume_transform().transform_point3(Vec3::new(0.0, 0.0, -1.0));
        assert!((tip - Vec3::new(4.0, 0.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_light_archive_round_trip() {
        let mut light = Light::new("lamp", LightType::Spot)
            .with_color(Vec3::new(1.0, 0.5, 0.25), 3.0)
            .with_layer(2)
            .with_shadow(ShadowMode::Soft);
        light.global_illumination = true;
        light.position = Vec3::new(0.0, 5.0, 0.0);

        let node = save_to_node(&light).unwrap();
        assert_eq!(node["type"].as_str().unwrap(), "spot");

        let mut loaded = Light::new("", LightType::Sun);
        loaded.load(&node).unwrap();
        assert_eq!(loaded.light_type, LightType::Spot);
        assert_eq!(loaded.color, light.color);
        assert_eq!(loaded.layer, 2);
        assert_eq!(loaded.shadow_mode, ShadowMode::Soft);
        assert!(loaded.global_illumination);
    }

    #[test]
    fn test_light_load_rejects_malformed_color() {
        let node = ArchiveNode::from_json_str(r#"{"color": [1.0, 2.0]}"#).unwrap();
        let mut light = Light::new("l", LightType::Sun);
        assert!(light.load(&node).is_err());
    }

    #[test]
    fn test_light_load_rejects_layer_past_u8() {
        let node = ArchiveNode::from_json_str(r#"{"layer": 300}"#).unwrap();
        let mut light = Light::new("l", LightType::Sun).with_layer(3);

        let err = light.load(&node).unwrap_err();
        assert!(matches!(err, ray_archive::ArchiveError::OutOfRange { .. }));
        assert_eq!(light.layer, 3);
    }
}
