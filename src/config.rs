use std::env;
use std::path::PathBuf;

use crate::rate_limit::RateLimitConfig;

pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetBackend {
    Fs,
    S3,
}

/// Process configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub frontend_url: String,
    pub asset_backend: AssetBackend,
    pub asset_dir: PathBuf,
    /// Prefix for public asset URLs; `/assets` when served by this process.
    pub asset_public_base: String,
    pub bootstrap_moderators: Vec<String>,
    pub rate_limit_enabled: bool,
    pub rate_limits: RateLimitConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("JWT_SECRET must be at least 32 characters long")]
    WeakSecret,
    #[error("unknown ASSET_BACKEND '{0}' (expected fs or s3)")]
    AssetBackend(String),
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
        if secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::WeakSecret);
        }
        let asset_backend = match env::var("ASSET_BACKEND").unwrap_or_else(|_| "fs".into()).to_lowercase().as_str() {
            "fs" => AssetBackend::Fs,
            "s3" => AssetBackend::S3,
            other => return Err(ConfigError::AssetBackend(other.to_string())),
        };
        Ok(Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            frontend_url: env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".into()),
            asset_backend,
            asset_dir: env::var("ASSET_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("data/assets")),
            asset_public_base: env::var("ASSET_PUBLIC_BASE").unwrap_or_else(|_| "/assets".into()),
            bootstrap_moderators: split_list(&env::var("BOOTSTRAP_MODERATOR_IDS").unwrap_or_default()),
            rate_limit_enabled: env::var("RATE_LIMIT_ENABLED")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(true),
            rate_limits: RateLimitConfig::from_env(),
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
}
