use anyhow::{bail, Context};
use puck_common::{read_json, FileSystem};
use puck_editor::Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::hooks::{self, slugify};

pub const DEFAULT_CONFIG_NAME: &str = "puck.config.json";

/// Puck project configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Directory holding one JSON file per page
    #[serde(default = "default_pages_dir")]
    pub pages_dir: String,

    /// Component config file
    #[serde(default = "default_components")]
    pub components: String,

    /// Languages that get their own header and footer
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    #[serde(default = "default_history_window_ms")]
    pub history_window_ms: u64,
}

fn default_pages_dir() -> String {
    "pages".to_string()
}

fn default_components() -> String {
    "components.json".to_string()
}

fn default_languages() -> Vec<String> {
    vec!["en".to_string()]
}

fn default_history_window_ms() -> u64 {
    250
}

impl ProjectConfig {
    /// Load config from a directory
    pub fn load(fs: &dyn FileSystem, cwd: &Path) -> anyhow::Result<Self> {
        let config_path = cwd.join(DEFAULT_CONFIG_NAME);

        if fs.exists(&config_path) {
            let config = read_json(fs, &config_path)
                .with_context(|| format!("Cannot read {}", config_path.display()))?;
            Ok(config)
        } else {
            // Return default config if none exists
            Ok(ProjectConfig::default())
        }
    }

    pub fn pages_dir(&self, cwd: &Path) -> PathBuf {
        cwd.join(&self.pages_dir)
    }

    pub fn page_path(&self, cwd: &Path, slug: &str) -> PathBuf {
        self.pages_dir(cwd).join(format!("{slug}.json"))
    }

    /// Path of a page named by user input. Only slugs are accepted, so the
    /// path cannot leave the pages directory.
    pub fn checked_page_path(&self, cwd: &Path, slug: &str) -> anyhow::Result<PathBuf> {
        if slug.is_empty() || slugify(slug) != slug {
            bail!("Invalid page slug: {slug}. Use lowercase letters, digits and dashes");
        }
        Ok(self.page_path(cwd, slug))
    }

    pub fn history_window(&self) -> Duration {
        Duration::from_millis(self.history_window_ms)
    }

    /// Component config with the demo hooks attached
    pub fn load_components(&self, fs: &dyn FileSystem, cwd: &Path) -> anyhow::Result<Config> {
        let path = cwd.join(&self.components);
        let source = fs
            .read_to_string(&path)
            .with_context(|| format!("Cannot read {}", path.display()))?;
        let mut config = Config::from_json(&source)
            .with_context(|| format!("Invalid component config in {}", path.display()))?;
        hooks::install(&mut config);
        Ok(config)
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            pages_dir: default_pages_dir(),
            components: default_components(),
            languages: default_languages(),
            history_window_ms: default_history_window_ms(),
        }
    }
}
