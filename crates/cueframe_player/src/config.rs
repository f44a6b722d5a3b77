// SPDX-License-Identifier: MIT OR Apache-2.0
//! Player configuration stored as RON.
//!
//! Covers the defaults used when frames are created from the editing
//! operations and the object kinds with special visibility rules.

use crate::error::ConfigError;
use cueframe_sequencer::{Easing, VisibilityRules};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current config format version
pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// Config file name
pub const CONFIG_FILE_NAME: &str = "cueframe.ron";

/// Offset applied to copies made by the add-frame operations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CopyOffset {
    /// Horizontal offset
    pub x: f64,
    /// Vertical offset
    pub y: f64,
}

impl Default for CopyOffset {
    fn default() -> Self {
        Self { x: 100.0, y: 100.0 }
    }
}

/// Player settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Format version
    pub version: u32,
    /// Easing written into new frames
    pub default_easing: Easing,
    /// Duration of frames added after an existing frame, in milliseconds
    pub new_frame_duration_ms: u64,
    /// Camera duration for slides joining an existing camera track
    pub slide_camera_duration_ms: u64,
    /// Offset of copies created for new frames
    pub copy_offset: CopyOffset,
    /// Decorative slide marker kind
    pub slide_kind: String,
    /// Container kind
    pub group_kind: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_FORMAT_VERSION,
            default_easing: Easing::default(),
            new_frame_duration_ms: 1000,
            slide_camera_duration_ms: 1000,
            copy_offset: CopyOffset::default(),
            slide_kind: "slide".to_string(),
            group_kind: "group".to_string(),
        }
    }
}

impl PlayerConfig {
    /// Parse settings from RON text
    pub fn from_ron_str(content: &str) -> Result<Self, ConfigError> {
        let config: PlayerConfig = ron::from_str(content)?;
        if config.version > CONFIG_FORMAT_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: config.version,
                supported: CONFIG_FORMAT_VERSION,
            });
        }
        Ok(config)
    }

    /// Serialize settings as pretty RON
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        let pretty = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, pretty)?)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_ron_str(&content)?;
        tracing::info!(path = %path.display(), "loaded player config");
        Ok(config)
    }

    /// Load settings from a file, falling back to defaults when it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_ron_string()?)?;
        Ok(())
    }

    /// Visibility rules for the configured kinds
    pub fn visibility_rules(&self) -> VisibilityRules {
        VisibilityRules {
            slide_kind: self.slide_kind.clone(),
            group_kind: self.group_kind.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlayerConfig::default();
        assert_eq!(config.version, CONFIG_FORMAT_VERSION);
        assert_eq!(config.new_frame_duration_ms, 1000);
        assert_eq!(config.copy_offset, CopyOffset { x: 100.0, y: 100.0 });
        assert_eq!(config.default_easing, Easing::EaseInCubic);
    }

    #[test]
    fn test_serialization() {
        let config = PlayerConfig {
            slide_kind: "frame".to_string(),
            ..PlayerConfig::default()
        };
        let ron_str = config.to_ron_string().unwrap();
        let loaded = PlayerConfig::from_ron_str(&ron_str).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let loaded = PlayerConfig::from_ron_str("(new_frame_duration_ms: 250)").unwrap();
        assert_eq!(loaded.new_frame_duration_ms, 250);
        assert_eq!(loaded.group_kind, "group");
    }

    #[test]
    fn test_newer_version_rejected() {
        let result = PlayerConfig::from_ron_str("(version: 99)");
        assert!(matches!(
            result,
            Err(ConfigError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("cueframe-{}.ron", uuid::Uuid::new_v4()));
        let config = PlayerConfig {
            slide_camera_duration_ms: 400,
            ..PlayerConfig::default()
        };
        config.save(&path).unwrap();
        let loaded = PlayerConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, config);

        let missing = PlayerConfig::load_or_default(&path).unwrap();
        assert_eq!(missing, PlayerConfig::default());
    }
}
