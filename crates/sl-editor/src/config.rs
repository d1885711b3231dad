//! Editor configuration.

use crate::error::{EditorError, EditorResult};
use crate::paging::DEFAULT_VISIBLE_AREA_SIZE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Window length used until a persisted size is restored.
    pub default_visible_area_size: u64,
    /// How often `PRAGMA data_version` is polled.
    pub poll_interval_ms: u64,
    /// How long a request must be outstanding before the indicator shows.
    pub querying_indicator_delay_ms: u64,
    /// Reload automatically when another process changes the file.
    pub auto_reload: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            default_visible_area_size: DEFAULT_VISIBLE_AREA_SIZE,
            poll_interval_ms: 1000,
            querying_indicator_delay_ms: 1000,
            auto_reload: true,
        }
    }
}

impl EditorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn querying_indicator_delay(&self) -> Duration {
        Duration::from_millis(self.querying_indicator_delay_ms)
    }

    pub fn from_json(text: &str) -> EditorResult<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| EditorError::Config(e.to_string()))?;
        if config.default_visible_area_size == 0 {
            return Err(EditorError::Config(
                "default_visible_area_size must be at least 1".into(),
            ));
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> EditorResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EditorError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }
}
