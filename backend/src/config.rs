use std::env;
use std::path::PathBuf;

/// Runtime configuration, read once at startup. The public domain is
/// threaded explicitly into the URL registry; nothing below the HTTP
/// layer reads the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub port: u16,
    pub db_path: String,
    pub media_dir: PathBuf,
    pub public_domain: String,
    pub scheduler_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parsed("PORT", 4000),
            db_path: env::var("DB_PATH").unwrap_or_else(|_| "newsdesk.db".to_string()),
            media_dir: env::var("MEDIA_DIR")
                .unwrap_or_else(|_| "media".to_string())
                .into(),
            public_domain: env::var("PUBLIC_DOMAIN")
                .unwrap_or_else(|_| "http://localhost:4000/".to_string()),
            scheduler_interval_secs: env_parsed("SCHEDULER_INTERVAL_SECS", 300),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
