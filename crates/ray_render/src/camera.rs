//! Cameras
//!
//! [`Camera`] is the scene-side camera: transform, projection, ordering and
//! the render targets the deferred pipeline attaches to it.
//! [`CameraState`] is the plain matrix data handed to the device.

use glam::{Mat4, Quat, Vec3, Vec4};
use ray_archive::{read_field, write_field, Archivable, ArchiveNode};
use serde::{Deserialize, Serialize};

use crate::deferred::{DeferredTargets, ShadowCameraTargets};
use crate::resource::{FramebufferHandle, Viewport};

/// Where a camera sits in the frame
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraOrder {
    /// Renders exponential shadow maps before the main pass
    Shadow,
    /// Main scene view
    #[default]
    Main,
    /// Application-driven
    Custom,
}

impl CameraOrder {
    pub fn name(self) -> &'static str {
        match self {
            Self::Shadow => "shadow",
            Self::Main => "main",
            Self::Custom => "custom",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "shadow" => Some(Self::Shadow),
            "main" => Some(Self::Main),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// Projection type
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    Perspective {
        fov: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    },
}

impl Default for Projection {
    fn default() -> Self {
        Self::Perspective {
            fov: 60.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Projection {
    /// Symmetric orthographic projection `width` x `height` units wide
    pub fn orthographic(width: f32, height: f32, near: f32, far: f32) -> Self {
        let half_w = width * 0.5;
        let half_h = height * 0.5;
        Self::Orthographic {
            left: -half_w,
            right: half_w,
            bottom: -half_h,
            top: half_h,
            near,
            far,
        }
    }

    /// Get the projection matrix
    pub fn matrix(&self) -> Mat4 {
        match *self {
            Self::Perspective {
                fov,
                aspect,
                near,
                far,
            } => Mat4::perspective_rh(fov, aspect, near, far),
            Self::Orthographic {
                left,
                right,
                bottom,
                top,
                near,
                far,
            } => Mat4::orthographic_rh(left, right, bottom, top, near, far),
        }
    }

    pub fn near(&self) -> f32 {
        match *self {
            Self::Perspective { near, .. } | Self::Orthographic { near, .. } => near,
        }
    }

    pub fn far(&self) -> f32 {
        match *self {
            Self::Perspective { far, .. } | Self::Orthographic { far, .. } => far,
        }
    }

    pub fn is_orthographic(&self) -> bool {
        matches!(self, Self::Orthographic { .. })
    }
}

/// Camera matrices as consumed by the device
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraState {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub position: Vec3,
    pub near: f32,
    pub far: f32,
    /// Orthographic projections linearize depth differently
    pub orthographic: bool,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            view_projection: Mat4::IDENTITY,
            position: Vec3::ZERO,
            near: 0.1,
            far: 1000.0,
            orthographic: false,
        }
    }
}

impl CameraState {
    /// Build from a view matrix and a projection
    pub fn new(view: Mat4, projection: &Projection) -> Self {
        let matrix = projection.matrix();
        Self {
            view,
            projection: matrix,
            view_projection: matrix * view,
            position: view.inverse().w_axis.truncate(),
            near: projection.near(),
            far: projection.far(),
            orthographic: projection.is_orthographic(),
        }
    }

    /// Constants for turning stored depth into linear view depth.
    ///
    /// Perspective: `z = x / (y * d + z)`. Orthographic: `z = x + y * d`.
    pub fn clip_constant(&self) -> Vec4 {
        if self.orthographic {
            Vec4::new(self.near, self.far - self.near, 0.0, 1.0)
        } else {
            Vec4::new(self.near * self.far, self.near - self.far, self.far, 0.0)
        }
    }
}

/// Scene camera
#[derive(Debug)]
pub struct Camera {
    /// Debug label
    pub label: String,
    /// Frame ordering
    pub order: CameraOrder,
    /// World position
    pub position: Vec3,
    /// Orientation
    pub rotation: Quat,
    /// Projection
    pub projection: Projection,
    /// Destination rectangle on the output
    pub viewport: Viewport,
    /// Clear color
    pub clear_color: Vec4,
    /// Output framebuffer (`None` is the backbuffer)
    pub framebuffer: Option<FramebufferHandle>,
    shadow_targets: Option<ShadowCameraTargets>,
    deferred_targets: Option<DeferredTargets>,
}

impl Camera {
    /// Create a main camera with the default projection
    pub fn new(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            label: label.into(),
            order: CameraOrder::Main,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            projection: Projection::Perspective {
                fov: 60.0_f32.to_radians(),
                aspect: width as f32 / height.max(1) as f32,
                near: 0.1,
                far: 1000.0,
            },
            viewport: Viewport::full(width, height),
            clear_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            framebuffer: None,
            shadow_targets: None,
            deferred_targets: None,
        }
    }

    /// Builder: set the frame ordering
    pub fn with_order(mut self, order: CameraOrder) -> Self {
        self.order = order;
        self
    }

    /// Builder: set the projection
    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    /// Face `target` from the current position
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        let view = Mat4::look_at_rh(self.position, target, up);
        let (_, rotation, _) = view.inverse().to_scale_rotation_translation();
        self.rotation = rotation;
    }

    /// Get the view matrix
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_quat(self.rotation.conjugate()) * Mat4::from_translation(-self.position)
    }

    /// Get the forward direction
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Matrices for the device
    pub fn state(&self) -> CameraState {
        CameraState::new(self.view_matrix(), &self.projection)
    }

    pub fn deferred_targets(&self) -> Option<&DeferredTargets> {
        self.deferred_targets.as_ref()
    }

    /// Attach G-buffer targets, returning the previous ones for release
    pub fn set_deferred_targets(&mut self, targets: Option<DeferredTargets>) -> Option<DeferredTargets> {
        core::mem::replace(&mut self.deferred_targets, targets)
    }

    pub fn shadow_targets(&self) -> Option<&ShadowCameraTargets> {
        self.shadow_targets.as_ref()
    }

    /// Attach shadow render/swap targets, returning the previous ones for release
    pub fn set_shadow_targets(
        &mut self,
        targets: Option<ShadowCameraTargets>,
    ) -> Option<ShadowCameraTargets> {
        core::mem::replace(&mut self.shadow_targets, targets)
    }
}

impl Archivable for Camera {
    fn save(&self, node: &mut ArchiveNode) -> ray_archive::Result<()> {
        write_field(node, "label", self.label.as_str())?;
        write_field(node, "order", self.order.name())?;
        write_field(node, "position", self.position.to_array())?;
        write_field(node, "rotation", self.rotation.to_array())?;
        write_field(node, "clear_color", self.clear_color.to_array())?;
        match self.projection {
            Projection::Perspective {
                fov,
                aspect,
                near,
                far,
            } => {
                write_field(node, "projection", "perspective")?;
                write_field(node, "fov", fov)?;
                write_field(node, "aspect", aspect)?;
                write_field(node, "near", near)?;
                write_field(node, "far", far)
            }
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
                near,
                far,
            } => {
                write_field(node, "projection", "orthographic")?;
                write_field(node, "bounds", [left, right, bottom, top])?;
                write_field(node, "near", near)?;
                write_field(node, "far", far)
            }
        }
    }

    fn load(&mut self, node: &ArchiveNode) -> ray_archive::Result<()> {
        read_field(node, "label", &mut self.label)?;

        let mut order = String::from(self.order.name());
        read_field(node, "order", &mut order)?;
        match CameraOrder::from_name(&order) {
            Some(o) => self.order = o,
            None => log::warn!("unknown camera order '{}', keeping {:?}", order, self.order),
        }

        let mut position = self.position.to_array();
        read_field(node, "position", &mut position)?;
        self.position = Vec3::from_array(position);

        let mut rotation = self.rotation.to_array();
        read_field(node, "rotation", &mut rotation)?;
        self.rotation = Quat::from_array(rotation).normalize();

        let mut clear_color = self.clear_color.to_array();
        read_field(node, "clear_color", &mut clear_color)?;
        self.clear_color = Vec4::from_array(clear_color);

        let mut near = self.projection.near();
        let mut far = self.projection.far();
        read_field(node, "near", &mut near)?;
        read_field(node, "far", &mut far)?;

        let mut kind = String::from(if self.projection.is_orthographic() {
            "orthographic"
        } else {
            "perspective"
        });
        read_field(node, "projection", &mut kind)?;

        self.projection = if kind == "orthographic" {
            let mut bounds = match self.projection {
                Projection::Orthographic {
                    left,
                    right,
                    bottom,
                    top,
                    ..
                } => [left, right, bottom, top],
                Projection::Perspective { .. } => [-1.0, 1.0, -1.0, 1.0],
            };
            read_field(node, "bounds", &mut bounds)?;
            Projection::Orthographic {
                left: bounds[0],
                right: bounds[1],
                bottom: bounds[2],
                top: bounds[3],
                near,
                far,
            }
        } else {
            let (mut fov, mut aspect) = match self.projection {
                Projection::Perspective { fov, aspect, .. } => (fov, aspect),
                Projection::Orthographic { .. } => (60.0_f32.to_radians(), 16.0 / 9.0),
            };
            read_field(node, "fov", &mut fov)?;
            read_field(node, "aspect", &mut aspect)?;
            Projection::Perspective {
                fov,
                aspect,
                near,
                far,
            }
        };
        Ok(())
    }
}
