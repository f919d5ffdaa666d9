use std::{env, fmt::Display, fs::read_to_string, str::FromStr, time::Duration};

use tracing::{info, warn};

use crate::utils::normalize_phone;

pub struct Config {
    pub port: u16,
    pub service_phone: Option<String>,
    pub bridge_url: String,
    pub bridge_token: Option<String>,
    pub auth_state_path: String,
    pub public_dir: String,
    pub code_ttl: Duration,
    pub session_ttl: Duration,
    pub max_verify_attempts: u32,
    pub image_size: u32,
    pub jpeg_quality: u8,
    pub update_timeout: Duration,
    pub purge_interval: Duration,
    pub max_body_bytes: usize,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("PORT", "3000"),
            service_phone: var("SERVICE_PHONE")
                .ok()
                .and_then(|phone| normalize_phone(&phone)),
            bridge_url: try_load("BRIDGE_URL", "http://127.0.0.1:8080"),
            bridge_token: read_secret("BRIDGE_TOKEN"),
            auth_state_path: try_load("AUTH_STATE_PATH", "./auth_info.json"),
            public_dir: try_load("PUBLIC_DIR", "public"),
            code_ttl: Duration::from_secs(try_load("CODE_TTL_SECS", "900")),
            session_ttl: Duration::from_secs(try_load("SESSION_TTL_SECS", "900")),
            max_verify_attempts: try_load("MAX_VERIFY_ATTEMPTS", "5"),
            image_size: try_load("IMAGE_SIZE", "640"),
            jpeg_quality: try_load("JPEG_QUALITY", "90"),
            update_timeout: Duration::from_secs(try_load("UPDATE_TIMEOUT_SECS", "30")),
            purge_interval: Duration::from_secs(try_load("PURGE_INTERVAL_SECS", "60")),
            max_body_bytes: try_load("MAX_BODY_BYTES", "10485760"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            service_phone: None,
            bridge_url: "http://127.0.0.1:8080".to_string(),
            bridge_token: None,
            auth_state_path: "./auth_info.json".to_string(),
            public_dir: "public".to_string(),
            code_ttl: Duration::from_secs(15 * 60),
            session_ttl: Duration::from_secs(15 * 60),
            max_verify_attempts: 5,
            image_size: 640,
            jpeg_quality: 90,
            update_timeout: Duration::from_secs(30),
            purge_interval: Duration::from_secs(60),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}

/// Docker secret first, then the plain environment variable.
fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            info!("No {secret_name} secret file ({e}), checking environment");
        })
        .or_else(|_| var(secret_name))
        .ok()
        .filter(|s| !s.is_empty())
}
