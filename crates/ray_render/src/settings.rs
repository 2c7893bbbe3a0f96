//! Render settings
//!
//! Serde-backed configuration for the deferred pipeline, loadable from JSON
//! (hot-reload) or from a scene archive.

use ray_archive::{read_field, write_field, Archivable, ArchiveNode};
use serde::{Deserialize, Serialize};

use crate::shadow::{ShadowMode, ShadowQuality};

/// Pipeline configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Shadow filtering
    pub shadow_mode: ShadowMode,
    /// Shadow map resolution tier
    pub shadow_quality: ShadowQuality,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Run screen-space ambient occlusion between the opaque and
    /// transparent passes
    pub ssao_enabled: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            shadow_mode: ShadowMode::Hard,
            shadow_quality: ShadowQuality::Medium,
            width: 1280,
            height: 720,
            ssao_enabled: false,
        }
    }
}

impl RenderSettings {
    /// Settings with shadows turned off
    pub fn without_shadows() -> Self {
        Self {
            shadow_mode: ShadowMode::None,
            shadow_quality: ShadowQuality::None,
            ..Default::default()
        }
    }

    /// Clamp values to valid ranges
    pub fn validate(&mut self) {
        self.width = self.width.max(1);
        self.height = self.height.max(1);
    }

    /// Parse from JSON
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        let mut settings: Self = serde_json::from_str(text)?;
        settings.validate();
        Ok(settings)
    }

    /// Serialize to JSON
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Archivable for RenderSettings {
    fn save(&self, node: &mut ArchiveNode) -> ray_archive::Result<()> {
        write_field(node, "shadow_mode", self.shadow_mode.name())?;
        write_field(node, "shadow_quality", self.shadow_quality.name())?;
        write_field(node, "width", self.width)?;
        write_field(node, "height", self.height)?;
        write_field(node, "ssao", self.ssao_enabled)
    }

    fn load(&mut self, node: &ArchiveNode) -> ray_archive::Result<()> {
        let mut mode = String::from(self.shadow_mode.name());
        read_field(node, "shadow_mode", &mut mode)?;
        match ShadowMode::from_name(&mode) {
            Some(m) => self.shadow_mode = m,
            None => log::warn!("unknown shadow mode '{}'", mode),
        }

        let mut quality = String::from(self.shadow_quality.name());
        read_field(node, "shadow_quality", &mut quality)?;
        match ShadowQuality::from_name(&quality) {
            Some(q) => self.shadow_quality = q,
            None => log::warn!("unknown shadow quality '{}'", quality),
        }

        read_field(node, "width", &mut self.width)?;
        read_field(node, "height", &mut self.height)?;
        read_field(node, "ssao", &mut self.ssao_enabled)?;
        self.validate();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_defaults_fill_missing() {
        let settings = RenderSettings::from_json_str(r#"{"shadow_quality": "high", "width": 0}"#).unwrap();
        assert_eq!(settings.shadow_quality, ShadowQuality::High);
        assert_eq!(settings.shadow_mode, ShadowMode::Hard);
        assert_eq!(settings.width, 1);
        assert_eq!(settings.height, 720);
    }

    #[test]
    fn test_json_round_trip() {
        let settings = RenderSettings {
            shadow_mode: ShadowMode::Soft,
            ssao_enabled: true,
            ..Default::default()
        };
        let text = settings.to_json_string().unwrap();
        assert_eq!(RenderSettings::from_json_str(&text).unwrap(), settings);
    }

    #[test]
    fn test_archive_load() {
        let node = ArchiveNode::from_json_str(
            r#"{"shadow_mode": "soft", "shadow_quality": "veryhigh", "width": 1920, "height": 1080}"#,
        )
        .unwrap();
        let mut settings = RenderSettings::default();
        settings.load(&node).unwrap();

        assert_eq!(settings.shadow_mode, ShadowMode::Soft);
        assert_eq!(settings.shadow_quality.resolution(), 4096);
        assert_eq!(settings.width, 1920);
        assert!(!settings.ssao_enabled);
    }

    #[test]
    fn test_archive_load_rejects_negative_size() {
        let node = ArchiveNode::from_json_str(r#"{"width": -1}"#).unwrap();
        let mut settings = RenderSettings::default();

        let err = settings.load(&node).unwrap_err();
        assert!(matches!(err, ray_archive::ArchiveError::OutOfRange { .. }));
        assert_eq!(settings.width, RenderSettings::default().width);
    }
}
