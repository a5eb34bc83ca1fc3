//! Harness configuration loaded from `.expect-def.toml`.
//!
//! The file is looked up in the current directory and its ancestors; the
//! first readable, valid file wins. Missing or invalid files fall back to
//! defaults with a warning, they never stop a run.

use crate::error::{Error, Result};
use crate::rewrite::DEFAULT_CORRECTED_SUFFIX;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = ".expect-def.toml";

/// Environment variable overriding the diff command (`none` disables it).
pub const DIFF_ENV_VAR: &str = "EXPECT_DEF_DIFF";

const MAX_TRAVERSAL_DEPTH: usize = 10;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Appended to an artifact path to name its corrected sibling
    pub corrected_suffix: String,

    /// Exit with a failure status when any artifact fails
    pub fail_exit_code: bool,

    /// External tool used to show the difference between an artifact and its correction
    pub diff: DiffConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            corrected_suffix: DEFAULT_CORRECTED_SUFFIX.to_string(),
            fail_exit_code: true,
            diff: DiffConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    pub enabled: bool,
    pub command: String,
    /// Arguments placed before the two file paths
    pub args: Vec<String>,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "patdiff".to_string(),
            args: vec![
                "-keep-whitespace".to_string(),
                "-context".to_string(),
                "3".to_string(),
            ],
        }
    }
}

impl HarnessConfig {
    /// Apply environment overrides on top of file configuration.
    pub fn with_env_overrides(self) -> Self {
        self.with_diff_override(std::env::var(DIFF_ENV_VAR).ok())
    }

    fn with_diff_override(mut self, command: Option<String>) -> Self {
        match command.as_deref().map(str::trim) {
            None | Some("") => {}
            Some(value) if value.eq_ignore_ascii_case("none") => self.diff.enabled = false,
            Some(value) => {
                self.diff.enabled = true;
                self.diff.command = value.to_string();
            }
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if self.corrected_suffix.is_empty() {
            return Err(Error::Config("corrected_suffix must not be empty".into()));
        }
        if self.corrected_suffix.contains(['/', '\\']) {
            return Err(Error::Config(format!(
                "corrected_suffix must not contain a path separator: {:?}",
                self.corrected_suffix
            )));
        }
        if self.diff.enabled && self.diff.command.trim().is_empty() {
            return Err(Error::Config("diff.command must not be empty".into()));
        }
        Ok(())
    }
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(contents: &str) -> Result<HarnessConfig> {
    let config = toml::from_str::<HarnessConfig>(contents)
        .map_err(|e| Error::Config(format!("failed to parse {CONFIG_FILE_NAME}: {e}")))?;
    config.validate()?;
    Ok(config)
}

fn try_load_config_from_path(config_path: &Path) -> Option<HarnessConfig> {
    let contents = match fs::read_to_string(config_path) {
        Ok(contents) => contents,
        Err(e) => {
            // Only log actual errors, not "file not found"
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %config_path.display(), error = %e, "failed to read config file");
            }
            return None;
        }
    };

    match parse_config(&contents) {
        Ok(config) => {
            tracing::debug!(path = %config_path.display(), "loaded config");
            Some(config)
        }
        Err(e) => {
            tracing::warn!(path = %config_path.display(), "{e}. Using defaults.");
            None
        }
    }
}

fn directory_ancestors(start: PathBuf, max_depth: usize) -> impl Iterator<Item = PathBuf> {
    std::iter::successors(Some(start), |dir| {
        let mut parent = dir.clone();
        parent.pop().then_some(parent)
    })
    .take(max_depth)
}

/// Search `start` and its ancestors for a configuration file.
pub fn load_config_from(start: PathBuf) -> HarnessConfig {
    directory_ancestors(start, MAX_TRAVERSAL_DEPTH)
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find_map(|path| try_load_config_from_path(&path))
        .unwrap_or_default()
}

/// Load configuration for the current directory.
pub fn load_config() -> HarnessConfig {
    match std::env::current_dir() {
        Ok(dir) => load_config_from(dir),
        Err(e) => {
            tracing::warn!(error = %e, "failed to get current directory. Using default config.");
            HarnessConfig::default()
        }
    }
}
