//! Post processes run between the opaque and transparent passes
//!
//! Screen-space ambient occlusion plugs in here: it reads the opaque
//! G-buffer and darkens the shaded result before transparents composite
//! on top.

use crate::camera::CameraState;
use crate::deferred::targets::DeferredTargets;
use crate::device::RenderPipelineDevice;

/// A screen-space effect applied to the shaded opaque image
pub trait PostProcess: Send {
    /// Get the unique name of this effect
    fn name(&self) -> &str;

    /// Called each frame after opaque shading
    fn render(
        &mut self,
        device: &mut dyn RenderPipelineDevice,
        camera: &CameraState,
        targets: &DeferredTargets,
    );

    /// Called when the owning pipeline closes
    fn close(&mut self, _device: &mut dyn RenderPipelineDevice) {}
}
