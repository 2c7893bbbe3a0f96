//! Material Semantic Registry
//!
//! Shared table of well-known shader inputs ("semantics") such as the view
//! matrix, the camera position or the current light color. Pipelines write
//! the values, the device reads them when it binds shader parameters.
//!
//! Each value kind has its own key enum, so a matrix semantic can never be
//! read as a texture.
//!
//! # Example
//!
//! ```ignore
//! let semantics = semantic::shared();
//! semantics.write().set_float3(Float3Semantic::LightDiffuse, Vec3::ONE);
//!
//! let value = semantics.read().value_by_name("LightDiffuse");
//! ```

use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};
use parking_lot::RwLock;

use crate::camera::CameraState;
use crate::resource::TextureHandle;

macro_rules! semantic_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $($variant),*
        }

        impl $name {
            /// Every semantic of this kind, in slot order
            pub const ALL: &'static [$name] = &[$($name::$variant),*];

            /// Number of semantics of this kind
            pub const COUNT: usize = Self::ALL.len();

            /// Shader-side name
            pub const fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $text),*
                }
            }

            /// Resolve a shader-side name
            pub fn from_name(name: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|s| s.name() == name)
            }

            #[inline]
            const fn slot(self) -> usize {
                self as usize
            }
        }
    };
}

semantic_enum!(
    /// 4x4 matrix semantics
    MatrixSemantic {
        Model => "matModel",
        ModelInverse => "matModelInverse",
        View => "matView",
        ViewInverse => "matViewInverse",
        Project => "matProject",
        ProjectInverse => "matProjectInverse",
        ViewProject => "matViewProject",
        ViewProjectInverse => "matViewProjectInverse",
        ModelView => "matModelView",
        ModelViewProject => "matModelViewProject",
        LightViewProject => "matLightViewProject",
    }
);

semantic_enum!(
    /// Scalar semantics
    FloatSemantic {
        CameraNear => "CameraNear",
        CameraFar => "CameraFar",
        CameraAperture => "CameraAperture",
        LightRange => "LightRange",
        LightIntensity => "LightIntensity",
        LightSpotInnerCone => "LightSpotInnerCone",
        LightSpotOuterCone => "LightSpotOuterCone",
        LightShadowChannel => "LightShadowChannel",
        LightShadowFactor => "LightShadowFactor",
        Time => "Time",
        TimeDelta => "TimeDelta",
    }
);

semantic_enum!(
    /// Three component vector semantics
    Float3Semantic {
        CameraPosition => "CameraPosition",
        CameraDirection => "CameraDirection",
        LightDiffuse => "LightDiffuse",
        LightSpecular => "LightSpecular",
        LightPosition => "LightPosition",
        LightDirection => "LightDirection",
        LightAttenuation => "LightAttenuation",
    }
);

semantic_enum!(
    /// Four component vector semantics
    Float4Semantic {
        ScreenDimension => "ScreenDimension",
        ClipConstant => "ClipConstant",
    }
);

semantic_enum!(
    /// Texture semantics
    TextureSemantic {
        DepthMap => "DepthMap",
        ColorMap => "ColorMap",
        NormalMap => "NormalMap",
        DeferredDepthMap => "DeferredDepthMap",
        DeferredGraphicMap => "DeferredGraphicMap",
        DeferredNormalMap => "DeferredNormalMap",
        DeferredLightMap => "DeferredLightMap",
        DeferredShadingMap => "DeferredShadingMap",
        LightShadowMap => "LightShadowMap",
    }
);

/// Any semantic, tagged with its value kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Semantic {
    Matrix(MatrixSemantic),
    Float(FloatSemantic),
    Float3(Float3Semantic),
    Float4(Float4Semantic),
    Texture(TextureSemantic),
}

impl Semantic {
    /// Resolve a shader-side name of any kind
    pub fn from_name(name: &str) -> Option<Self> {
        MatrixSemantic::from_name(name)
            .map(Self::Matrix)
            .or_else(|| FloatSemantic::from_name(name).map(Self::Float))
            .or_else(|| Float3Semantic::from_name(name).map(Self::Float3))
            .or_else(|| Float4Semantic::from_name(name).map(Self::Float4))
            .or_else(|| TextureSemantic::from_name(name).map(Self::Texture))
    }

    /// Shader-side name
    pub fn name(self) -> &'static str {
        match self {
            Self::Matrix(s) => s.name(),
            Self::Float(s) => s.name(),
            Self::Float3(s) => s.name(),
            Self::Float4(s) => s.name(),
            Self::Texture(s) => s.name(),
        }
    }
}

/// Current value of a semantic
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SemanticValue {
    Matrix(Mat4),
    Float(f32),
    Float3(Vec3),
    Float4(Vec4),
    Texture(Option<TextureHandle>),
}

impl SemanticValue {
    /// Raw bytes for uniform upload. Texture bindings have no uniform data.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Matrix(m) => bytemuck::bytes_of(m),
            Self::Float(f) => bytemuck::bytes_of(f),
            Self::Float3(v) => bytemuck::bytes_of(v),
            Self::Float4(v) => bytemuck::bytes_of(v),
            Self::Texture(_) => &[],
        }
    }
}

/// Table of current semantic values
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialSemanticRegistry {
    matrices: [Mat4; MatrixSemantic::COUNT],
    floats: [f32; FloatSemantic::COUNT],
    float3s: [Vec3; Float3Semantic::COUNT],
    float4s: [Vec4; Float4Semantic::COUNT],
    textures: [Option<TextureHandle>; TextureSemantic::COUNT],
}

impl Default for MaterialSemanticRegistry {
    fn default() -> Self {
        Self {
            matrices: [Mat4::IDENTITY; MatrixSemantic::COUNT],
            floats: [0.0; FloatSemantic::COUNT],
            float3s: [Vec3::ZERO; Float3Semantic::COUNT],
            float4s: [Vec4::ZERO; Float4Semantic::COUNT],
            textures: [None; TextureSemantic::COUNT],
        }
    }
}

impl MaterialSemanticRegistry {
    /// Create a registry with identity matrices and zeroed values
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset every value to its default
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn set_matrix(&mut self, semantic: MatrixSemantic, value: Mat4) {
        self.matrices[semantic.slot()] = value;
    }

    pub fn get_matrix(&self, semantic: MatrixSemantic) -> Mat4 {
        self.matrices[semantic.slot()]
    }

    pub fn set_float(&mut self, semantic: FloatSemantic, value: f32) {
        self.floats[semantic.slot()] = value;
    }

    pub fn get_float(&self, semantic: FloatSemantic) -> f32 {
        self.floats[semantic.slot()]
    }

    pub fn set_float3(&mut self, semantic: Float3Semantic, value: Vec3) {
        self.float3s[semantic.slot()] = value;
    }

    pub fn get_float3(&self, semantic: Float3Semantic) -> Vec3 {
        self.float3s[semantic.slot()]
    }

    pub fn set_float4(&mut self, semantic: Float4Semantic, value: Vec4) {
        self.float4s[semantic.slot()] = value;
    }

    pub fn get_float4(&self, semantic: Float4Semantic) -> Vec4 {
        self.float4s[semantic.slot()]
    }

    pub fn set_texture(&mut self, semantic: TextureSemantic, value: Option<TextureHandle>) {
        self.textures[semantic.slot()] = value;
    }

    pub fn get_texture(&self, semantic: TextureSemantic) -> Option<TextureHandle> {
        self.textures[semantic.slot()]
    }

    /// Current value of any semantic
    pub fn value(&self, semantic: Semantic) -> SemanticValue {
        match semantic {
            Semantic::Matrix(s) => SemanticValue::Matrix(self.get_matrix(s)),
            Semantic::Float(s) => SemanticValue::Float(self.get_float(s)),
            Semantic::Float3(s) => SemanticValue::Float3(self.get_float3(s)),
            Semantic::Float4(s) => SemanticValue::Float4(self.get_float4(s)),
            Semantic::Texture(s) => SemanticValue::Texture(self.get_texture(s)),
        }
    }

    /// Current value of the semantic a shader parameter is named after.
    ///
    /// Returns `None` for names that are not semantics; the device then
    /// treats the parameter as a plain material parameter.
    pub fn value_by_name(&self, name: &str) -> Option<SemanticValue> {
        Semantic::from_name(name).map(|s| self.value(s))
    }

    /// Publish the matrices and scalars derived from a camera
    pub fn set_camera(&mut self, camera: &CameraState) {
        let view_inverse = camera.view.inverse();
        self.set_matrix(MatrixSemantic::View, camera.view);
        self.set_matrix(MatrixSemantic::ViewInverse, view_inverse);
        self.set_matrix(MatrixSemantic::Project, camera.projection);
        self.set_matrix(MatrixSemantic::ProjectInverse, camera.projection.inverse());
        self.set_matrix(MatrixSemantic::ViewProject, camera.view_projection);
        self.set_matrix(MatrixSemantic::ViewProjectInverse, camera.view_projection.inverse());
        self.set_float(FloatSemantic::CameraNear, camera.near);
        self.set_float(FloatSemantic::CameraFar, camera.far);
        self.set_float3(Float3Semantic::CameraPosition, camera.position);
        self.set_float3(
            Float3Semantic::CameraDirection,
            view_inverse.transform_vector3(Vec3::NEG_Z).normalize_or_zero(),
        );
        self.set_float4(Float4Semantic::ClipConstant, camera.clip_constant());
    }

    /// Publish a model matrix and the products that depend on it
    pub fn set_model(&mut self, model: Mat4) {
        let view = self.get_matrix(MatrixSemantic::View);
        let view_project = self.get_matrix(MatrixSemantic::ViewProject);
        self.set_matrix(MatrixSemantic::Model, model);
        self.set_matrix(MatrixSemantic::ModelInverse, model.inverse());
        self.set_matrix(MatrixSemantic::ModelView, view * model);
        self.set_matrix(MatrixSemantic::ModelViewProject, view_project * model);
    }
}

/// Registry shared between a pipeline and the device binding from it
pub type SharedSemantics = Arc<RwLock<MaterialSemanticRegistry>>;

static GLOBAL: RwLock<Option<SharedSemantics>> = parking_lot::const_rwlock(None);

/// Create an independent registry
pub fn shared() -> SharedSemantics {
    Arc::new(RwLock::new(MaterialSemanticRegistry::new()))
}

/// Create the process-wide registry, or return the existing one
pub fn setup() -> SharedSemantics {
    let mut global = GLOBAL.write();
    if let Some(existing) = global.as_ref() {
        return Arc::clone(existing);
    }
    log::info!("Material semantic registry created");
    let registry = shared();
    *global = Some(Arc::clone(&registry));
    registry
}

/// The process-wide registry, if [`setup`] has been called
pub fn global() -> Option<SharedSemantics> {
    GLOBAL.read().clone()
}

/// Drop the process-wide registry. Outstanding handles stay valid.
pub fn close() {
    if GLOBAL.write().take().is_some() {
        log::info!("Material semantic registry closed");
    }
}

/// Copy the current values, for recording commands off the main thread
pub fn snapshot(semantics: &SharedSemantics) -> MaterialSemanticRegistry {
    semantics.read().clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_round_trip() {
        for s in MatrixSemantic::ALL {
            assert_eq!(MatrixSemantic::from_name(s.name()), Some(*s));
        }
        for s in TextureSemantic::ALL {
            assert_eq!(
                Semantic::from_name(s.name()),
                Some(Semantic::Texture(*s))
            );
        }
        assert_eq!(Semantic::from_name("matView"), Some(Semantic::Matrix(MatrixSemantic::View)));
        assert_eq!(Semantic::from_name("texDiffuse"), None);
    }

    #[test]
    fn test_kinds_do_not_share_slots() {
        let mut registry = MaterialSemanticRegistry::new();
        registry.set_float(FloatSemantic::CameraNear, 0.5);
        registry.set_float3(Float3Semantic::CameraPosition, Vec3::new(1.0, 2.0, 3.0));

        // Slot 0 of every kind is independent.
        assert_eq!(registry.get_matrix(MatrixSemantic::Model), Mat4::IDENTITY);
        assert_eq!(registry.get_float4(Float4Semantic::ScreenDimension), Vec4::ZERO);
        assert_eq!(registry.get_texture(TextureSemantic::DepthMap), None);
        assert_eq!(registry.get_float(FloatSemantic::CameraNear), 0.5);
    }

    #[test]
    fn test_value_by_name() {
        let mut registry = MaterialSemanticRegistry::new();
        registry.set_texture(TextureSemantic::DeferredLightMap, Some(TextureHandle(9)));

        assert_eq!(
            registry.value_by_name("DeferredLightMap"),
            Some(SemanticValue::Texture(Some(TextureHandle(9))))
        );
        assert_eq!(registry.value_by_name("unknown"), None);
    }

    #[test]
    fn test_value_bytes() {
        assert_eq!(SemanticValue::Matrix(Mat4::IDENTITY).as_bytes().len(), 64);
        assert_eq!(SemanticValue::Float3(Vec3::ONE).as_bytes().len(), 12);
        assert_eq!(SemanticValue::Float(1.0).as_bytes(), &1.0f32.to_ne_bytes());
        assert!(SemanticValue::Texture(None).as_bytes().is_empty());
    }

    #[test]
    fn test_reset() {
        let mut registry = MaterialSemanticRegistry::new();
        registry.set_float(FloatSemantic::Time, 3.0);
        registry.reset();
        assert_eq!(registry, MaterialSemanticRegistry::new());
    }

    #[test]
    fn test_set_model_products() {
        let mut registry = MaterialSemanticRegistry::new();
        let model = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
        registry.set_model(model);
        assert_eq!(registry.get_matrix(MatrixSemantic::ModelViewProject), model);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let semantics = shared();
        semantics.write().set_float(FloatSemantic::Time, 1.0);
        let copy = snapshot(&semantics);
        semantics.write().set_float(FloatSemantic::Time, 2.0);
        assert_eq!(copy.get_float(FloatSemantic::Time), 1.0);
    }
}
