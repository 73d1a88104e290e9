//! Application settings: where the backend lives, how to sign auth requests,
//! logging and the data directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const ENV_API_HOST: &str = "MDASSIST_API_HOST";
const ENV_BASIC_TOKEN_KEY: &str = "MDASSIST_BASIC_TOKEN_KEY";
const ENV_DATA_DIR: &str = "MDASSIST_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub api_host: String,
    pub api_context: String,
    pub basic_token_key: String,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
    pub data_dir: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_host: "http://localhost:9900".to_string(),
            api_context: "/api".to_string(),
            basic_token_key: "md".to_string(),
            log_filter: "info".to_string(),
            data_dir: None,
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com.local", "mdassist", "mdassist")
}

pub fn config_path() -> Option<PathBuf> {
    project_dirs().map(|proj| proj.config_dir().join("settings.json"))
}

impl AppSettings {
    /// Settings file (if any) overlaid with environment overrides.
    pub fn load() -> Result<Self> {
        let mut settings = match config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Invalid settings file {}", path.display()))
    }

    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(host) = var(ENV_API_HOST).filter(|v| !v.trim().is_empty()) {
            self.api_host = host;
        }
        if let Some(key) = var(ENV_BASIC_TOKEN_KEY).filter(|v| !v.is_empty()) {
            self.basic_token_key = key;
        }
        if let Some(dir) = var(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
    }

    /// Host plus context path, e.g. `http://localhost:9900/api`.
    pub fn backend_base(&self) -> String {
        let host = self.api_host.trim_end_matches('/');
        let context = self.api_context.trim_matches('/');
        if context.is_empty() {
            host.to_string()
        } else {
            format!("{}/{}", host, context)
        }
    }

    pub fn resolve_data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        project_dirs()
            .map(|proj| proj.data_dir().to_path_buf())
            .context("Could not determine a data directory; set MDASSIST_DATA_DIR")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_API_HOST, "https://md.example.com/"),
            (ENV_DATA_DIR, "/tmp/mdassist"),
            (ENV_BASIC_TOKEN_KEY, ""),
        ]
        .into_iter()
        .collect();

        let mut settings = AppSettings::default();
        settings.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(settings.backend_base(), "https://md.example.com/api");
        assert_eq!(settings.basic_token_key, "md");
        assert_eq!(settings.resolve_data_dir().unwrap(), PathBuf::from("/tmp/mdassist"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"api_host": "http://10.0.0.2:9900", "api_context": ""}"#).unwrap();

        let settings = AppSettings::load_from(&path).unwrap();
        assert_eq!(settings.backend_base(), "http://10.0.0.2:9900");
        assert_eq!(settings.log_filter, "info");
        assert_eq!(settings.data_dir, None);
    }
}
