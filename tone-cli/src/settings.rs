use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tone_core::{EngineSettings, PlaybackKind, SessionConfig};

/// Everything the `tone` binary can be configured with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineSettings,
    pub session: SessionConfig,
    pub playback: PlaybackKind,
}

/// Loads the app configuration from a JSON file.
///
/// A missing path or a missing file yields the defaults; a file that exists
/// but does not parse is an error.
pub fn load_app_config(path: Option<&Path>) -> Result<AppConfig> {
    let Some(path) = path else {
        return Ok(AppConfig::default());
    };
    if !path.exists() {
        log::warn!("Config file {:?} not found, using defaults", path);
        return Ok(AppConfig::default());
    }
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let config = serde_json::from_reader(file).with_context(|| format!("Failed to parse {:?}", path))?;
    Ok(config)
}
