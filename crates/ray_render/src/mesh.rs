//! Proxy light volumes
//!
//! Point lights are accumulated through a unit sphere and spot lights
//! through a unit cone, scaled into place by the light's model matrix.

use core::f32::consts::{PI, TAU};

use crate::resource::MeshDesc;

/// CPU-side mesh data
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    /// Vertex positions
    pub positions: Vec<[f32; 3]>,
    /// Triangle list indices
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Descriptor for uploading to a device
    pub fn to_desc(&self, label: impl Into<String>) -> MeshDesc {
        MeshDesc {
            label: label.into(),
            positions: self.positions.clone(),
            indices: self.indices.clone(),
        }
    }
}

/// Unit UV sphere centred on the origin
pub fn sphere(segments: u32) -> MeshData {
    let slices = segments.max(3);
    let stacks = (segments / 2).max(2);
    let mut mesh = MeshData::default();

    for stack in 0..=stacks {
        let phi = PI * stack as f32 / stacks as f32;
        let (sin_phi, cos_phi) = phi.sin_cos();
        for slice in 0..=slices {
            let theta = TAU * slice as f32 / slices as f32;
            let (sin_theta, cos_theta) = theta.sin_cos();
            mesh.positions
                .push([sin_phi * cos_theta, cos_phi, sin_phi * sin_theta]);
        }
    }

    let row = slices + 1;
    for stack in 0..stacks {
        for slice in 0..slices {
            let a = stack * row + slice;
            let b = a + row;
            mesh.indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }
    mesh
}

/// Unit cone with its apex at the origin, opening along -Z to a base of
/// radius 1 at `z = -1`
pub fn cone(segments: u32) -> MeshData {
    let slices = segments.max(3);
    let mut mesh = MeshData::default();

    mesh.positions.push([0.0, 0.0, 0.0]);
    mesh.positions.push([0.0, 0.0, -1.0]);
    for slice in 0..slices {
        let theta = TAU * slice as f32 / slices as f32;
        let (sin_theta, cos_theta) = theta.sin_cos();
        mesh.positions.push([cos_theta, sin_theta, -1.0]);
    }

    for slice in 0..slices {
        let current = 2 + slice;
        let next = 2 + (slice + 1) % slices;
        // Side, then base cap.
        mesh.indices.extend_from_slice(&[0, next, current]);
        mesh.indices.extend_from_slice(&[1, current, next]);
    }
    mesh
}
