//! Project configuration file support for storyloop.
//!
//! Loads configuration from `storyloop.toml` in the working directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Project-level configuration loaded from `storyloop.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Global default model (applies to every step)
    pub model: Option<String>,
    /// Weighted score a story must reach to pass
    pub pass_mark: Option<f64>,
    /// Revision cap per session
    pub max_rounds: Option<usize>,
    /// Per-call deadline for the text-generation backend
    pub timeout_secs: Option<u64>,
    /// Total attempts per call, including the first
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub classify: RoleConfig,
    #[serde(default)]
    pub generate: RoleConfig,
    #[serde(default)]
    pub judge: RoleConfig,
    #[serde(default)]
    pub revise: RoleConfig,
}

/// Configuration for a single step
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RoleConfig {
    /// Model to use for this step
    pub model: Option<String>,
}

/// The config file name
pub const CONFIG_FILE_NAME: &str = "storyloop.toml";

impl ProjectConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }

    /// Priority: [classify].model > global model > None
    pub fn classify_model(&self) -> Option<&str> {
        self.classify.model.as_deref().or(self.model.as_deref())
    }

    /// Priority: [generate].model > global model > None
    pub fn generate_model(&self) -> Option<&str> {
        self.generate.model.as_deref().or(self.model.as_deref())
    }

    /// Priority: [judge].model > global model > None
    pub fn judge_model(&self) -> Option<&str> {
        self.judge.model.as_deref().or(self.model.as_deref())
    }

    /// Priority: [revise].model > global model > None
    pub fn revise_model(&self) -> Option<&str> {
        self.revise.model.as_deref().or(self.model.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) {
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), content).unwrap();
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(ProjectConfig::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_role_table_overrides_global_model() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            r#"
model = "gpt-4o-mini"
pass_mark = 4.2
max_rounds = 3

[judge]
model = "gpt-4o"
"#,
        );

        let config = ProjectConfig::load(dir.path()).unwrap().unwrap();
        assert_eq!(config.judge_model(), Some("gpt-4o"));
        assert_eq!(config.classify_model(), Some("gpt-4o-mini"));
        assert_eq!(config.revise_model(), Some("gpt-4o-mini"));
        assert_eq!(config.pass_mark, Some(4.2));
        assert_eq!(config.max_rounds, Some(3));
        assert_eq!(config.timeout_secs, None);
    }

    #[test]
    fn test_empty_file_has_no_overrides() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "");

        let config = ProjectConfig::load(dir.path()).unwrap().unwrap();
        assert_eq!(config.generate_model(), None);
        assert_eq!(config.max_attempts, None);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "temperature = 0.9\n");

        let err = ProjectConfig::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_unknown_role_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "[judge]\nagent = \"claude\"\n");

        assert!(ProjectConfig::load(dir.path()).is_err());
    }
}
