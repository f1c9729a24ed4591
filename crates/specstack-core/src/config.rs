use crate::error::Result;
use crate::import::UpstreamPattern;
use crate::io;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ImportConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Glob templates tried against a branch's upstream ref, e.g.
    /// `origin/{branch}`.
    #[serde(default)]
    pub upstream_patterns: Vec<String>,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_trunk")]
    pub trunk: String,
    #[serde(default = "default_max_write_attempts")]
    pub max_write_attempts: u32,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default = "default_specs_dir")]
    pub specs_dir: String,
}

fn default_version() -> u32 {
    1
}

fn default_trunk() -> String {
    "main".to_string()
}

fn default_max_write_attempts() -> u32 {
    3
}

fn default_specs_dir() -> String {
    "specs".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            trunk: default_trunk(),
            max_write_attempts: default_max_write_attempts(),
            import: ImportConfig::default(),
            specs_dir: default_specs_dir(),
        }
    }
}

impl Config {
    /// Load the config at `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match io::read_optional(path)? {
            Some(data) => Ok(serde_yaml::from_str(&data)?),
            None => Ok(Self::default()),
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        let trunk = self.trunk.trim();
        if trunk.is_empty() || trunk.contains(char::is_whitespace) || trunk.starts_with(':') {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!("trunk '{}' is not a usable branch name", self.trunk),
            });
        }

        if self.max_write_attempts == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "max_write_attempts is 0; no write could ever be attempted".to_string(),
            });
        } else if self.max_write_attempts > 10 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "max_write_attempts={} (>10 is unusual; contention windows are short)",
                    self.max_write_attempts
                ),
            });
        }

        for pattern in &self.import.upstream_patterns {
            if let Err(e) = UpstreamPattern::parse(pattern) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: e.to_string(),
                });
            }
        }

        warnings
    }

    pub fn has_errors(warnings: &[ConfigWarning]) -> bool {
        warnings.iter().any(|w| w.level == WarnLevel::Error)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
