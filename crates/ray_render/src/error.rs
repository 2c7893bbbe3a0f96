//! Render pipeline errors

use ray_archive::ArchiveError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = core::result::Result<T, RenderError>;

/// Errors raised while configuring or driving a render pipeline.
///
/// Everything except [`RenderError::MissingTargets`] and
/// [`RenderError::NotConfigured`] happens at setup time and leaves the
/// pipeline unusable.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Material not found: {0}")]
    MissingMaterial(String),

    #[error("Technique '{name}' missing from material {material}")]
    MissingTechnique { material: String, name: String },

    #[error("Parameter '{name}' missing from material {material}")]
    MissingParameter { material: String, name: String },

    #[error("Failed to create texture: {0}")]
    TextureCreation(String),

    #[error("Failed to create framebuffer: {0}")]
    FramebufferCreation(String),

    #[error("Failed to create framebuffer layout: {0}")]
    LayoutCreation(String),

    #[error("Failed to create mesh: {0}")]
    MeshCreation(String),

    #[error("No supported texture format for {0}")]
    UnsupportedFormat(String),

    #[error("Pipeline is not configured")]
    NotConfigured,

    #[error("Camera '{0}' has no render targets for this pipeline")]
    MissingTargets(String),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),
}

impl RenderError {
    /// Check if this error came from resolving a named material entry
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Self::MissingMaterial(_) | Self::MissingTechnique { .. } | Self::MissingParameter { .. }
        )
    }
}
