//! Shadow Configuration
//!
//! Shadow filtering mode and map quality, with serde support for hot-reload
//! and the name tables scene archives use.

use serde::{Deserialize, Serialize};

/// How shadow maps are filtered
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadowMode {
    /// No shadows
    None,
    /// Linearized depth, no blur
    #[default]
    Hard,
    /// Linearized depth with a separable Gaussian blur
    Soft,
}

impl ShadowMode {
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Hard => "hard",
            Self::Soft => "soft",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(Self::None),
            "hard" => Some(Self::Hard),
            "soft" => Some(Self::Soft),
            _ => None,
        }
    }
}

/// Shadow map resolution tier
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadowQuality {
    /// Shadows disabled, nothing is allocated
    None,
    Low,
    #[default]
    Medium,
    High,
    VeryHigh,
}

impl ShadowQuality {
    /// Shadow map edge length in pixels
    pub const fn resolution(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Low => 512,
            Self::Medium => 1024,
            Self::High => 2048,
            Self::VeryHigh => 4096,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "veryhigh",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(Self::None),
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "veryhigh" => Some(Self::VeryHigh),
            _ => None,
        }
    }
}
