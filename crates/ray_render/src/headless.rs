//! Headless software device
//!
//! [`HeadlessDevice`] implements [`RenderPipelineDevice`] on the CPU. It
//! keeps every resource in memory, records each call as a
//! [`DeviceCommand`], and rasterizes a scene of screen-space rectangles
//! well enough to observe stencil masking:
//!
//! - Queue draws write each object's layer bit into the stencil of the
//!   bound depth attachment, and its albedo into color attachment 0 when
//!   no technique override is given.
//! - Screen-quad and mesh draws whose technique has a stencil reference
//!   add the registry's `LightDiffuse` to color attachment 0 on every
//!   pixel whose stencil shares a bit with the reference.
//!
//! Materials come from a [`MaterialLibrary`] of definitions, so tests can
//! remove a technique or parameter and watch setup fail.
//!
//! # Example
//!
//! ```ignore
//! let mut device = HeadlessDevice::new();
//! device.add_object(SceneObject::new(RenderQueue::Opaque, 1, [0, 0, 4, 4]));
//! device.capture_on_marker("shading");
//!
//! let mut pipeline = DeferredLightingPipeline::for_device(settings, &device);
//! pipeline.setup(&mut device)?;
//! ```

use std::collections::{HashMap, HashSet};

use glam::Vec4;

use crate::camera::CameraState;
use crate::deferred::pipeline::{parameters as deferred_params, techniques as deferred_techniques};
use crate::device::{ParamValue, RenderPipelineDevice, RenderQueue};
use crate::material::paths;
use crate::resource::{
    ClearFlags, FramebufferDesc, FramebufferHandle, FramebufferLayoutDesc, FramebufferLayoutHandle,
    MaterialHandle, MeshDesc, MeshHandle, ParameterHandle, TechniqueHandle, TextureDesc,
    TextureFormat, TextureHandle, Viewport,
};
use crate::semantic::{self, Float3Semantic, SharedSemantics};
use crate::shadow::pipeline::{parameters as shadow_params, techniques as shadow_techniques};

/// Techniques and parameters a material path provides
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaterialDefinition {
    pub path: String,
    pub techniques: Vec<String>,
    pub parameters: Vec<String>,
}

impl MaterialDefinition {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            techniques: Vec::new(),
            parameters: Vec::new(),
        }
    }

    /// Builder: add techniques
    pub fn with_techniques(mut self, names: &[&str]) -> Self {
        self.techniques.extend(names.iter().map(|n| n.to_string()));
        self
    }

    /// Builder: add parameters
    pub fn with_parameters(mut self, names: &[&str]) -> Self {
        self.parameters.extend(names.iter().map(|n| n.to_string()));
        self
    }
}

/// Material definitions by path
#[derive(Clone, Debug, Default)]
pub struct MaterialLibrary {
    definitions: Vec<MaterialDefinition>,
}

impl MaterialLibrary {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Library with the engine's built-in materials
    pub fn engine() -> Self {
        let mut library = Self::new();
        library.register(
            MaterialDefinition::new(paths::DEFERRED_LIGHTING)
                .with_techniques(&[
                    deferred_techniques::DEPTH_ONLY,
                    deferred_techniques::SUN_LIGHT,
                    deferred_techniques::POINT_LIGHT,
                    deferred_techniques::SPOT_LIGHT,
                    deferred_techniques::SHADING,
                ])
                .with_parameters(&[
                    deferred_params::TEX_DEPTH,
                    deferred_params::TEX_DIFFUSE,
                    deferred_params::TEX_NORMAL,
                    deferred_params::TEX_LIGHT,
                    deferred_params::SHADOW_CHANNEL,
                    deferred_params::SHADOW_MAP,
                    deferred_params::SHADOW_MATRIX,
                    deferred_params::SHADOW_FACTOR,
                ]),
        );
        library.register(
            MaterialDefinition::new(paths::DEFERRED_SHADOW)
                .with_techniques(&[
                    deferred_techniques::SHADOW,
                    deferred_techniques::SHADOW_BLUR_X,
                    deferred_techniques::SHADOW_BLUR_Y,
                ])
                .with_parameters(&[deferred_params::TEX_SOURCE, deferred_params::SHADOW_FACTOR]),
        );
        library.register(
            MaterialDefinition::new(paths::SHADOW_RENDER)
                .with_techniques(&[
                    shadow_techniques::CONV_ORTHO_LINEAR_DEPTH,
                    shadow_techniques::CONV_PERSPECTIVE_FOV_LINEAR_DEPTH,
                    shadow_techniques::SHADOW_BLUR_ORTHO_X,
                    shadow_techniques::SHADOW_BLUR_PERSPECTIVE_FOV_X,
                    shadow_techniques::SHADOW_BLUR_Y,
                ])
                .with_parameters(&[
                    shadow_params::TEX_SOURCE,
                    shadow_params::TEX_SOURCE_SIZE_INV,
                    shadow_params::CLIP_CONSTANT,
                    shadow_params::OFFSET,
                    shadow_params::WEIGHT,
                    shadow_params::SHADOW_FACTOR,
                    shadow_params::SHADOW_CHANNEL,
                ]),
        );
        library
    }

    /// Add or replace a definition
    pub fn register(&mut self, definition: MaterialDefinition) {
        self.definitions.retain(|d| d.path != definition.path);
        self.definitions.push(definition);
    }

    /// Remove a whole material
    pub fn remove(&mut self, path: &str) -> bool {
        let before = self.definitions.len();
        self.definitions.retain(|d| d.path != path);
        before != self.definitions.len()
    }

    /// Remove one technique from a material
    pub fn remove_technique(&mut self, path: &str, name: &str) -> bool {
        self.definitions
            .iter_mut()
            .find(|d| d.path == path)
            .map(|d| {
                let before = d.techniques.len();
                d.techniques.retain(|t| t != name);
                before != d.techniques.len()
            })
            .unwrap_or(false)
    }

    /// Remove one parameter from a material
    pub fn remove_parameter(&mut self, path: &str, name: &str) -> bool {
        self.definitions
            .iter_mut()
            .find(|d| d.path == path)
            .map(|d| {
                let before = d.parameters.len();
                d.parameters.retain(|p| p != name);
                before != d.parameters.len()
            })
            .unwrap_or(false)
    }

    pub fn get(&self, path: &str) -> Option<&MaterialDefinition> {
        self.definitions.iter().find(|d| d.path == path)
    }
}

/// A screen-space rectangle drawn by queue draws
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneObject {
    pub queue: RenderQueue,
    /// Stencil layer, 0..=7
    pub layer: u8,
    /// `[x, y, width, height]` in pixels
    pub rect: [u32; 4],
    pub albedo: Vec4,
}

impl SceneObject {
    /// White object
    pub fn new(queue: RenderQueue, layer: u8, rect: [u32; 4]) -> Self {
        Self {
            queue,
            layer,
            rect,
            albedo: Vec4::ONE,
        }
    }

    fn contains(&self, x: u32, y: u32) -> bool {
        let [rx, ry, w, h] = self.rect;
        x >= rx && y >= ry && x < rx.saturating_add(w) && y < ry.saturating_add(h)
    }

    fn stencil_bit(&self) -> u8 {
        1u8 << self.layer.min(7)
    }
}

/// One recorded device call
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCommand {
    CreateTexture { texture: TextureHandle, label: String },
    DestroyTexture(TextureHandle),
    CreateLayout(FramebufferLayoutHandle),
    DestroyLayout(FramebufferLayoutHandle),
    CreateFramebuffer { framebuffer: FramebufferHandle, label: String },
    DestroyFramebuffer(FramebufferHandle),
    CreateMaterial { material: MaterialHandle, path: String },
    DestroyMaterial(MaterialHandle),
    CreateMesh(MeshHandle),
    DestroyMesh(MeshHandle),
    SetParameter { parameter: ParameterHandle, value: ParamValue },
    SetStencilReference { technique: TechniqueHandle, reference: u32 },
    SetCamera(CameraState),
    SetFramebuffer(Option<FramebufferHandle>),
    Clear { attachment: u32, flags: ClearFlags },
    Discard(u32),
    DrawQueue { queue: RenderQueue, technique: Option<TechniqueHandle> },
    DrawScreenQuad(TechniqueHandle),
    DrawMesh { mesh: MeshHandle, technique: TechniqueHandle },
    Blit { src: FramebufferHandle, dst: Option<FramebufferHandle> },
    Marker(String),
}

/// Texture contents copied when a watched marker is hit
#[derive(Clone, Debug)]
pub struct FrameCapture {
    pub marker: String,
    textures: HashMap<TextureHandle, (u32, Vec<Vec4>)>,
}

impl FrameCapture {
    /// Color of a captured texel
    pub fn pixel(&self, texture: TextureHandle, x: u32, y: u32) -> Option<Vec4> {
        let (width, texels) = self.textures.get(&texture)?;
        texels.get((y * width + x) as usize).copied()
    }
}

#[derive(Debug)]
struct TextureRecord {
    desc: TextureDesc,
    color: Vec<Vec4>,
    stencil: Vec<u8>,
}

impl TextureRecord {
    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.desc.width && y < self.desc.height).then(|| (y * self.desc.width + x) as usize)
    }
}

#[derive(Debug)]
struct MaterialRecord {
    path: String,
    techniques: Vec<(String, TechniqueHandle)>,
    parameters: Vec<(String, ParameterHandle)>,
}

#[derive(Debug)]
struct TechniqueRecord {
    name: String,
    stencil_reference: Option<u32>,
}

#[derive(Debug)]
struct ParameterRecord {
    material: String,
    name: String,
    value: Option<ParamValue>,
}

/// Software [`RenderPipelineDevice`] for tests and tools
#[derive(Debug)]
pub struct HeadlessDevice {
    semantics: SharedSemantics,
    library: MaterialLibrary,
    unsupported: HashSet<TextureFormat>,
    texture_budget: Option<usize>,
    next_id: u64,
    textures: HashMap<TextureHandle, TextureRecord>,
    layouts: HashMap<FramebufferLayoutHandle, FramebufferLayoutDesc>,
    framebuffers: HashMap<FramebufferHandle, FramebufferDesc>,
    materials: HashMap<MaterialHandle, MaterialRecord>,
    techniques: HashMap<TechniqueHandle, TechniqueRecord>,
    parameters: HashMap<ParameterHandle, ParameterRecord>,
    meshes: HashMap<MeshHandle, MeshDesc>,
    scene: Vec<SceneObject>,
    bound: Option<FramebufferHandle>,
    camera: Option<CameraState>,
    commands: Vec<DeviceCommand>,
    capture_markers: HashSet<String>,
    captures: Vec<FrameCapture>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    /// Device with the engine materials and its own semantic registry
    pub fn new() -> Self {
        Self::with_semantics(semantic::shared())
    }

    /// Device binding from `semantics`
    pub fn with_semantics(semantics: SharedSemantics) -> Self {
        Self {
            semantics,
            library: MaterialLibrary::engine(),
            unsupported: HashSet::new(),
            texture_budget: None,
            next_id: 1,
            textures: HashMap::new(),
            layouts: HashMap::new(),
            framebuffers: HashMap::new(),
            materials: HashMap::new(),
            techniques: HashMap::new(),
            parameters: HashMap::new(),
            meshes: HashMap::new(),
            scene: Vec::new(),
            bound: None,
            camera: None,
            commands: Vec::new(),
            capture_markers: HashSet::new(),
            captures: Vec::new(),
        }
    }

    /// Builder: replace the material library
    pub fn with_library(mut self, library: MaterialLibrary) -> Self {
        self.library = library;
        self
    }

    pub fn library_mut(&mut self) -> &mut MaterialLibrary {
        &mut self.library
    }

    /// Mark a texture format as (un)supported
    pub fn set_format_supported(&mut self, format: TextureFormat, supported: bool) {
        if supported {
            self.unsupported.remove(&format);
        } else {
            self.unsupported.insert(format);
        }
    }

    /// Fail texture creation once `budget` textures are alive
    pub fn set_texture_budget(&mut self, budget: Option<usize>) {
        self.texture_budget = budget;
    }

    /// Add an object to the rasterized scene
    pub fn add_object(&mut self, object: SceneObject) {
        self.scene.push(object);
    }

    /// Snapshot every texture each time `marker` is emitted
    pub fn capture_on_marker(&mut self, marker: impl Into<String>) {
        self.capture_markers.insert(marker.into());
    }

    pub fn captures(&self) -> &[FrameCapture] {
        &self.captures
    }

    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Textures, layouts, framebuffers, materials and meshes still alive
    pub fn live_resource_count(&self) -> usize {
        self.textures.len()
            + self.layouts.len()
            + self.framebuffers.len()
            + self.materials.len()
            + self.meshes.len()
    }

    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Camera bound by the last `set_camera`
    pub fn camera(&self) -> Option<&CameraState> {
        self.camera.as_ref()
    }

    /// Color of a texel
    pub fn read_pixel(&self, texture: TextureHandle, x: u32, y: u32) -> Option<Vec4> {
        let record = self.textures.get(&texture)?;
        record.color.get(record.index(x, y)?).copied()
    }

    /// Stencil of a texel in a depth/stencil texture
    pub fn read_stencil(&self, texture: TextureHandle, x: u32, y: u32) -> Option<u8> {
        let record = self.textures.get(&texture)?;
        record.stencil.get(record.index(x, y)?).copied()
    }

    /// Last value set on a parameter
    pub fn parameter_value(&self, parameter: ParameterHandle) -> Option<ParamValue> {
        self.parameters.get(&parameter)?.value
    }

    /// Last value set on a parameter of a loaded material
    pub fn parameter_value_by_name(&self, material_path: &str, name: &str) -> Option<ParamValue> {
        self.parameters
            .values()
            .find(|p| p.material == material_path && p.name == name)?
            .value
    }

    pub fn technique_name(&self, technique: TechniqueHandle) -> Option<&str> {
        self.techniques.get(&technique).map(|t| t.name.as_str())
    }

    /// Handle of a parameter of a loaded material
    pub fn find_parameter(&self, material_path: &str, name: &str) -> Option<ParameterHandle> {
        self.parameters
            .iter()
            .find(|(_, p)| p.material == material_path && p.name == name)
            .map(|(handle, _)| *handle)
    }

    pub fn parameter_name(&self, parameter: ParameterHandle) -> Option<&str> {
        self.parameters.get(&parameter).map(|p| p.name.as_str())
    }

    pub fn stencil_reference(&self, technique: TechniqueHandle) -> Option<u32> {
        self.techniques.get(&technique)?.stencil_reference
    }

    /// Label of a live framebuffer
    pub fn framebuffer_label(&self, framebuffer: FramebufferHandle) -> Option<&str> {
        self.framebuffers.get(&framebuffer).map(|f| f.label.as_str())
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn bound_framebuffer(&self) -> Option<FramebufferDesc> {
        self.bound.and_then(|f| self.framebuffers.get(&f)).cloned()
    }

    fn fill_color(&mut self, texture: TextureHandle, color: Vec4) {
        if let Some(record) = self.textures.get_mut(&texture) {
            record.color.iter_mut().for_each(|c| *c = color);
        }
    }

    fn fill_stencil(&mut self, texture: TextureHandle, stencil: u8) {
        if let Some(record) = self.textures.get_mut(&texture) {
            record.stencil.iter_mut().for_each(|s| *s = stencil);
        }
    }

    /// Add `LightDiffuse` to color 0 wherever the stencil matches `technique`
    fn accumulate_light(&mut self, technique: TechniqueHandle) {
        let Some(reference) = self.stencil_reference(technique) else {
            return;
        };
        let Some(framebuffer) = self.bound_framebuffer() else {
            return;
        };
        let (Some(target), Some(depth)) = (framebuffer.color_attachments.first(), framebuffer.depth_stencil)
        else {
            return;
        };
        let Some(stencil) = self.textures.get(&depth).map(|d| d.stencil.clone()) else {
            return;
        };

        let diffuse = self.semantics.read().get_float3(Float3Semantic::LightDiffuse).extend(0.0);
        if let Some(record) = self.textures.get_mut(target) {
            for (texel, mask) in record.color.iter_mut().zip(stencil) {
                if u32::from(mask) & reference != 0 {
                    *texel += diffuse;
                }
            }
        }
    }

    fn capture(&mut self, marker: &str) {
        let textures = self
            .textures
            .iter()
            .map(|(handle, record)| (*handle, (record.desc.width, record.color.clone())))
            .collect();
        self.captures.push(FrameCapture {
            marker: marker.to_owned(),
            textures,
        });
    }
}

impl RenderPipelineDevice for HeadlessDevice {
    fn semantics(&self) -> SharedSemantics {
        SharedSemantics::clone(&self.semantics)
    }

    fn is_texture_supported(&self, format: TextureFormat) -> bool {
        !self.unsupported.contains(&format)
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Option<TextureHandle> {
        if !self.is_texture_supported(desc.format) {
            log::warn!("headless: unsupported format {:?} for {}", desc.format, desc.label);
            return None;
        }
        if self.texture_budget.is_some_and(|budget| self.textures.len() >= budget) {
            log::warn!("headless: texture budget exhausted creating {}", desc.label);
            return None;
        }

        let texels = (desc.width as usize) * (desc.height as usize);
        let stencil = if desc.format.has_stencil() {
            vec![0; texels]
        } else {
            Vec::new()
        };
        let handle = TextureHandle(self.allocate_id());
        self.textures.insert(
            handle,
            TextureRecord {
                desc: desc.clone(),
                color: vec![Vec4::ZERO; texels],
                stencil,
            },
        );
        self.commands.push(DeviceCommand::CreateTexture {
            texture: handle,
            label: desc.label.clone(),
        });
        Some(handle)
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture).is_some() {
            self.commands.push(DeviceCommand::DestroyTexture(texture));
        }
    }

    fn create_framebuffer_layout(&mut self, desc: &FramebufferLayoutDesc) -> Option<FramebufferLayoutHandle> {
        let formats = desc.color_formats.iter().chain(desc.depth_stencil_format.iter());
        if let Some(format) = formats.copied().find(|f| !self.is_texture_supported(*f)) {
            log::warn!("headless: layout {} uses unsupported {:?}", desc.label, format);
            return None;
        }
        let handle = FramebufferLayoutHandle(self.allocate_id());
        self.layouts.insert(handle, desc.clone());
        self.commands.push(DeviceCommand::CreateLayout(handle));
        Some(handle)
    }

    fn destroy_framebuffer_layout(&mut self, layout: FramebufferLayoutHandle) {
        if self.layouts.remove(&layout).is_some() {
            self.commands.push(DeviceCommand::DestroyLayout(layout));
        }
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Option<FramebufferHandle> {
        let layout = self.layouts.get(&desc.layout)?;
        if layout.color_formats.len() != desc.color_attachments.len()
            || layout.depth_stencil_format.is_some() != desc.depth_stencil.is_some()
        {
            log::warn!("headless: framebuffer {} does not match its layout", desc.label);
            return None;
        }
        let attachments = desc.color_attachments.iter().chain(desc.depth_stencil.iter());
        if attachments.clone().any(|t| !self.textures.contains_key(t)) {
            log::warn!("headless: framebuffer {} references a missing texture", desc.label);
            return None;
        }

        let handle = FramebufferHandle(self.allocate_id());
        self.framebuffers.insert(handle, desc.clone());
        self.commands.push(DeviceCommand::CreateFramebuffer {
            framebuffer: handle,
            label: desc.label.clone(),
        });
        Some(handle)
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        if self.framebuffers.remove(&framebuffer).is_some() {
            if self.bound == Some(framebuffer) {
                self.bound = None;
            }
            self.commands.push(DeviceCommand::DestroyFramebuffer(framebuffer));
        }
    }

    fn create_material(&mut self, path: &str) -> Option<MaterialHandle> {
        let definition = self.library.get(path)?.clone();
        let material = MaterialHandle(self.allocate_id());

        let mut techniques = Vec::new();
        for name in &definition.techniques {
            let handle = TechniqueHandle(self.allocate_id());
            self.techniques.insert(
                handle,
                TechniqueRecord {
                    name: name.clone(),
                    stencil_reference: None,
                },
            );
            techniques.push((name.clone(), handle));
        }

        let mut parameters = Vec::new();
        for name in &definition.parameters {
            let handle = ParameterHandle(self.allocate_id());
            self.parameters.insert(
                handle,
                ParameterRecord {
                    material: definition.path.clone(),
                    name: name.clone(),
                    value: None,
                },
            );
            parameters.push((name.clone(), handle));
        }

        self.materials.insert(
            material,
            MaterialRecord {
                path: definition.path.clone(),
                techniques,
                parameters,
            },
        );
        self.commands.push(DeviceCommand::CreateMaterial {
            material,
            path: definition.path,
        });
        Some(material)
    }

    fn destroy_material(&mut self, material: MaterialHandle) {
        if let Some(record) = self.materials.remove(&material) {
            for (_, technique) in &record.techniques {
                self.techniques.remove(technique);
            }
            for (_, parameter) in &record.parameters {
                self.parameters.remove(parameter);
            }
            self.commands.push(DeviceCommand::DestroyMaterial(material));
        }
    }

    fn technique(&self, material: MaterialHandle, name: &str) -> Option<TechniqueHandle> {
        let record = self.materials.get(&material)?;
        record.techniques.iter().find(|(n, _)| n == name).map(|(_, h)| *h)
    }

    fn parameter(&self, material: MaterialHandle, name: &str) -> Option<ParameterHandle> {
        let record = self.materials.get(&material)?;
        record.parameters.iter().find(|(n, _)| n == name).map(|(_, h)| *h)
    }

    fn create_mesh(&mut self, desc: &MeshDesc) -> Option<MeshHandle> {
        let vertex_count = desc.positions.len() as u32;
        if desc.indices.len() % 3 != 0 || desc.indices.iter().any(|i| *i >= vertex_count) {
            log::warn!("headless: mesh {} has invalid indices", desc.label);
            return None;
        }
        let handle = MeshHandle(self.allocate_id());
        self.meshes.insert(handle, desc.clone());
        self.commands.push(DeviceCommand::CreateMesh(handle));
        Some(handle)
    }

    fn destroy_mesh(&mut self, mesh: MeshHandle) {
        if self.meshes.remove(&mesh).is_some() {
            self.commands.push(DeviceCommand::DestroyMesh(mesh));
        }
    }

    fn set_parameter(&mut self, parameter: ParameterHandle, value: ParamValue) {
        if let Some(record) = self.parameters.get_mut(&parameter) {
            record.value = Some(value);
        }
        self.commands.push(DeviceCommand::SetParameter { parameter, value });
    }

    fn set_stencil_reference(&mut self, technique: TechniqueHandle, reference: u32) {
        if let Some(record) = self.techniques.get_mut(&technique) {
            record.stencil_reference = Some(reference);
        }
        self.commands.push(DeviceCommand::SetStencilReference { technique, reference });
    }

    fn set_camera(&mut self, camera: &CameraState) {
        self.camera = Some(*camera);
        self.commands.push(DeviceCommand::SetCamera(*camera));
    }

    fn set_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.bound = framebuffer;
        self.commands.push(DeviceCommand::SetFramebuffer(framebuffer));
    }

    fn clear_framebuffer(&mut self, attachment: u32, flags: ClearFlags, color: Vec4, _depth: f32, stencil: u32) {
        self.commands.push(DeviceCommand::Clear { attachment, flags });
        let Some(framebuffer) = self.bound_framebuffer() else {
            return;
        };
        if flags.contains(ClearFlags::COLOR) {
            if let Some(texture) = framebuffer.color_attachments.get(attachment as usize) {
                self.fill_color(*texture, color);
            }
        }
        if flags.contains(ClearFlags::STENCIL) {
            if let Some(depth) = framebuffer.depth_stencil {
                self.fill_stencil(depth, stencil as u8);
            }
        }
    }

    fn discard_framebuffer(&mut self, attachment: u32) {
        self.commands.push(DeviceCommand::Discard(attachment));
    }

    fn draw_render_queue(&mut self, queue: RenderQueue, technique: Option<TechniqueHandle>) {
        self.commands.push(DeviceCommand::DrawQueue { queue, technique });
        let Some(framebuffer) = self.bound_framebuffer() else {
            return;
        };

        let objects: Vec<SceneObject> = self.scene.iter().filter(|o| o.queue == queue).copied().collect();
        for object in objects {
            if let Some(depth) = framebuffer.depth_stencil.and_then(|d| self.textures.get_mut(&d)) {
                if !depth.stencil.is_empty() {
                    let (w, h) = (depth.desc.width, depth.desc.height);
                    for y in 0..h {
                        for x in 0..w {
                            if object.contains(x, y) {
                                depth.stencil[(y * w + x) as usize] = object.stencil_bit();
                            }
                        }
                    }
                }
            }

            if technique.is_some() {
                continue;
            }
            if let Some(color) = framebuffer.color_attachments.first().and_then(|c| self.textures.get_mut(c)) {
                let (w, h) = (color.desc.width, color.desc.height);
                for y in 0..h {
                    for x in 0..w {
                        if object.contains(x, y) {
                            color.color[(y * w + x) as usize] = object.albedo;
                        }
                    }
                }
            }
        }
    }

    fn draw_screen_quad(&mut self, technique: TechniqueHandle) {
        self.commands.push(DeviceCommand::DrawScreenQuad(technique));
        self.accumulate_light(technique);
    }

    fn draw_mesh(&mut self, mesh: MeshHandle, technique: TechniqueHandle) {
        self.commands.push(DeviceCommand::DrawMesh { mesh, technique });
        if self.meshes.contains_key(&mesh) {
            self.accumulate_light(technique);
        }
    }

    fn blit_framebuffer(
        &mut self,
        src: FramebufferHandle,
        _src_viewport: Viewport,
        dst: Option<FramebufferHandle>,
        _dst_viewport: Viewport,
    ) {
        self.commands.push(DeviceCommand::Blit { src, dst });
    }

    fn debug_marker(&mut self, label: &str) {
        self.commands.push(DeviceCommand::Marker(label.to_owned()));
        if self.capture_markers.contains(label) {
            self.capture(label);
        }
    }
}
