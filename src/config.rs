use crate::errors::{AppError, AppResult};
use crate::models::Actor;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "tracker.toml";
pub const CONFIG_PATH_ENV: &str = "TRACKER_CONFIG";
pub const DEFAULT_API_KEY_ENV: &str = "TRACKER_LLM_API_KEY";
pub const DEFAULT_LLM_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o";

/// How the API key is presented to the chat-completions endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AuthStyle {
    #[default]
    Bearer,
    /// `api-key: <key>` header, as Azure OpenAI deployments expect.
    ApiKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
    pub auth: AuthStyle,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_LLM_ENDPOINT.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            auth: AuthStyle::Bearer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub bind_address: String,
    pub log_dir: PathBuf,
    pub default_actor: Actor,
    pub generator: GeneratorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/tracker.sqlite"),
            bind_address: "0.0.0.0:8000".to_string(),
            log_dir: PathBuf::from("logs"),
            default_actor: Actor::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

impl AppConfig {
    /// Defaults, then the TOML file, then `TRACKER_*` environment overrides.
    ///
    /// Without an explicit path the file named by `TRACKER_CONFIG` is used,
    /// falling back to `tracker.toml` in the working directory when present.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| read_env_non_empty(CONFIG_PATH_ENV).map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => {
                let fallback = PathBuf::from(CONFIG_FILE_NAME);
                if fallback.exists() {
                    Self::from_file(&fallback)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_overrides(read_env_non_empty);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> AppResult<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("cannot read {}: {}", path.display(), err)))?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> AppResult<Self> {
        let parsed: Self = toml::from_str(raw)?;
        Ok(parsed)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("TRACKER_DATABASE_PATH") {
            self.database_path = PathBuf::from(value);
        }
        if let Some(value) = lookup("TRACKER_BIND_ADDRESS") {
            self.bind_address = value;
        }
        if let Some(value) = lookup("TRACKER_LOG_DIR") {
            self.log_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("TRACKER_DEFAULT_USER_NAME") {
            self.default_actor.name = value;
        }
        if let Some(value) = lookup("TRACKER_DEFAULT_USER_EMAIL") {
            self.default_actor.email = value;
        }
        if let Some(value) = lookup("TRACKER_LLM_ENDPOINT") {
            self.generator.endpoint = value;
        }
        if let Some(value) = lookup("TRACKER_LLM_MODEL") {
            self.generator.model = value;
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.bind_address.trim().is_empty() {
            return Err(AppError::Config("bind_address cannot be empty".to_string()));
        }
        if self.database_path.as_os_str().is_empty() {
            return Err(AppError::Config("database_path cannot be empty".to_string()));
        }
        if self.generator.api_key_env.trim().is_empty() {
            return Err(AppError::Config("generator.api_key_env cannot be empty".to_string()));
        }
        Ok(())
    }
}

pub fn read_env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.database_path, PathBuf::from("data/tracker.sqlite"));
        assert_eq!(config.bind_address, "0.0.0.0:8000");
        assert_eq!(config.default_actor.name, "Tester");
        assert_eq!(config.default_actor.email, "test@tester.com");
        assert_eq!(config.generator.model, "gpt-4o");
        assert_eq!(config.generator.auth, AuthStyle::Bearer);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
                bind_address = "127.0.0.1:9000"

                [default_actor]
                name = "Ops"

                [generator]
                auth = "api-key"
                endpoint = "https://example.openai.azure.com/openai/deployments/gpt/chat/completions"
            "#,
        )
        .expect("parse config");

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.default_actor.name, "Ops");
        assert_eq!(config.default_actor.email, "test@tester.com");
        assert_eq!(config.generator.auth, AuthStyle::ApiKey);
        assert_eq!(config.generator.model, DEFAULT_LLM_MODEL);
        assert_eq!(config.log_dir, PathBuf::from("logs"));
    }

    #[test]
    fn env_overrides_win_over_file() {
        let mut config = AppConfig::from_toml("bind_address = \"127.0.0.1:9000\"").expect("parse");
        let env = HashMap::from([
            ("TRACKER_BIND_ADDRESS", "0.0.0.0:7000"),
            ("TRACKER_DATABASE_PATH", "/tmp/tracker.db"),
            ("TRACKER_LLM_MODEL", "gpt-4o-mini"),
        ]);
        config.apply_overrides(|name| env.get(name).map(|value| value.to_string()));

        assert_eq!(config.bind_address, "0.0.0.0:7000");
        assert_eq!(config.database_path, PathBuf::from("/tmp/tracker.db"));
        assert_eq!(config.generator.model, "gpt-4o-mini");
    }

    #[test]
    fn rejects_malformed_toml_and_missing_file() {
        let error = AppConfig::from_toml("bind_address = [").expect_err("should fail");
        assert!(matches!(error, AppError::Config(_)));

        let dir = tempfile::tempdir().expect("tempdir");
        let error = AppConfig::from_file(&dir.path().join("missing.toml")).expect_err("should fail");
        assert!(matches!(error, AppError::Config(_)));
    }

    #[test]
    fn loads_explicit_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tracker.toml");
        fs::write(&path, "database_path = \"custom.sqlite\"\n").expect("write config");

        let config = AppConfig::from_file(&path).expect("load");
        assert_eq!(config.database_path, PathBuf::from("custom.sqlite"));
    }
}
