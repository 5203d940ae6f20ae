use serde::{Deserialize, Serialize};

use crate::shaper::ShapeStrategy;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    /// How pass-through is enforced: `native` installs a window region,
    /// `synthetic` answers per-point hit-test queries.
    #[serde(default)]
    pub shape_strategy: ShapeStrategy,
    /// Extra pixels around each hit region in synthetic mode, so thin
    /// window borders stay grabbable.
    #[serde(default)]
    pub hit_test_margin: i32,
    /// When true every input passes through regardless of hit regions.
    #[serde(default)]
    pub force_pass_through: bool,
    /// Sleep between frames in milliseconds.
    #[serde(default = "default_frame_sleep_ms")]
    pub frame_sleep_ms: u64,
    /// Target-window poll interval for the tracking thread, in milliseconds.
    #[serde(default = "default_tracker_poll_ms")]
    pub tracker_poll_ms: u64,
    /// When enabled the application initialises the logger at debug level.
    /// Defaults to `false` when the field is missing in the settings file.
    #[serde(default)]
    pub debug_logging: bool,
    /// File to mirror log output into. If `None`, logs go to stderr only.
    #[serde(default)]
    pub log_file: Option<String>,
}

fn default_frame_sleep_ms() -> u64 {
    16
}

fn default_tracker_poll_ms() -> u64 {
    16
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            shape_strategy: ShapeStrategy::default(),
            hit_test_margin: 0,
            force_pass_through: false,
            frame_sleep_ms: default_frame_sleep_ms(),
            tracker_poll_ms: default_tracker_poll_ms(),
            debug_logging: false,
            log_file: None,
        }
    }
}

impl Settings {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings::load(path.to_str().unwrap()).unwrap();
        assert_eq!(settings.shape_strategy, ShapeStrategy::Native);
        assert_eq!(settings.frame_sleep_ms, 16);
        assert!(!settings.force_pass_through);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"shape_strategy":"synthetic","hit_test_margin":4}"#).unwrap();
        let settings = Settings::load(path.to_str().unwrap()).unwrap();
        assert_eq!(settings.shape_strategy, ShapeStrategy::Synthetic);
        assert_eq!(settings.hit_test_margin, 4);
        assert_eq!(settings.frame_sleep_ms, 16);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            shape_strategy: ShapeStrategy::Synthetic,
            hit_test_margin: 2,
            force_pass_through: true,
            frame_sleep_ms: 8,
            tracker_poll_ms: 8,
            debug_logging: true,
            log_file: Some("overlay.log".into()),
        };
        settings.save(path.to_str().unwrap()).unwrap();
        let loaded = Settings::load(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.hit_test_margin, 2);
        assert_eq!(loaded.frame_sleep_ms, 8);
        assert_eq!(loaded.log_file.as_deref(), Some("overlay.log"));
    }
}
