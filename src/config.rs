// src/config.rs
use crate::errors::EcoVisionError;
use std::path::PathBuf;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_STATIC_DIR: &str = "./static";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub bind_addr: String,
    pub static_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, EcoVisionError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, EcoVisionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get("OPENAI_API_KEY").ok_or_else(|| {
            EcoVisionError::Config(
                "OPENAI_API_KEY not found in environment variables".to_string(),
            )
        })?;

        Ok(Self {
            api_key,
            base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: get("ECOVISION_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            bind_addr: get("ECOVISION_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            static_dir: get("ECOVISION_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR)),
        })
    }
}
