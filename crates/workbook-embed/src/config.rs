//! Embed configuration.
//!
//! Stored as JSON in the user's config directory:
//! - macOS: ~/Library/Application Support/workbook-embed/config.json
//! - Linux: ~/.config/workbook-embed/config.json
//! - Windows: C:\Users\<User>\AppData\Roaming\workbook-embed\config.json

use std::path::{Path, PathBuf};

use log::warn;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Options for one embedded workbook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EmbedConfig {
    /// Origin postings must come from, e.g. `https://app.example.com`.
    /// Derived from the source URL when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_origin: Option<String>,

    /// Write every inbound and outbound envelope to this JSON-lines file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dump_path: Option<PathBuf>,

    #[serde(default)]
    pub shell: ShellOptions,
}

/// What the presentation shell shows around the frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ShellOptions {
    /// Header title
    pub title: String,
    /// Refresh and fullscreen buttons
    pub show_controls: bool,
    /// Variable editor toggle
    pub show_variables: bool,
    /// Bookmark chips
    pub show_bookmarks: bool,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            title: "Workbook".to_string(),
            show_controls: true,
            show_variables: true,
            show_bookmarks: true,
        }
    }
}

/// Path of the config file in the user's config directory.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("workbook-embed")
        .join("config.json")
}

/// Load config from `path`, returning defaults if it is missing or invalid.
pub fn load_config(path: &Path) -> EmbedConfig {
    if !path.exists() {
        return EmbedConfig::default();
    }
    let parsed = std::fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|s| serde_json::from_str(&s).map_err(anyhow::Error::from));
    match parsed {
        Ok(config) => config,
        Err(e) => {
            warn!("Ignoring invalid config {}: {}", path.display(), e);
            EmbedConfig::default()
        }
    }
}

/// JSON schema of [`EmbedConfig`], pretty-printed.
pub fn config_schema() -> serde_json::Result<String> {
    serde_json::to_string_pretty(&schemars::schema_for!(EmbedConfig))
}
