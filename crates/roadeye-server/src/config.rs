use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, bail};

use roadeye_api::HazardSettings;
use roadeye_api::session::SessionConfig;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "your-secret-key",
    "secret",
];

pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub session: SessionConfig,
    pub hazards: HazardSettings,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = get("ROADEYE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("ROADEYE_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let host = get("ROADEYE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse_or(&get, "ROADEYE_PORT", 8080)?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let db_path: PathBuf = get("ROADEYE_DB_PATH")
            .unwrap_or_else(|| "roadeye.db".into())
            .into();

        let access_ttl: i64 = parse_or(&get, "ROADEYE_ACCESS_TTL_SECS", 86_400)?;
        let refresh_ttl: i64 = parse_or(&get, "ROADEYE_REFRESH_TTL_SECS", 604_800)?;
        if access_ttl <= 0 || refresh_ttl <= 0 {
            bail!("token lifetimes must be positive");
        }

        let confirm_threshold: u32 = parse_or(&get, "ROADEYE_CONFIRM_THRESHOLD", 3)?;
        if confirm_threshold == 0 {
            bail!("ROADEYE_CONFIRM_THRESHOLD must be at least 1");
        }

        let max_radius_km: f64 = parse_or(&get, "ROADEYE_MAX_RADIUS_KM", 50.0)?;
        if !max_radius_km.is_finite() || max_radius_km <= 0.0 {
            bail!("ROADEYE_MAX_RADIUS_KM must be a positive number");
        }

        let timeout_secs: u64 = parse_or(&get, "ROADEYE_REQUEST_TIMEOUT_SECS", 60)?;
        if timeout_secs == 0 {
            bail!("ROADEYE_REQUEST_TIMEOUT_SECS must be at least 1");
        }

        let defaults = HazardSettings::default();
        Ok(Self {
            addr,
            db_path,
            session: SessionConfig {
                secret: jwt_secret,
                access_ttl: chrono::Duration::seconds(access_ttl),
                refresh_ttl: chrono::Duration::seconds(refresh_ttl),
            },
            hazards: HazardSettings {
                confirm_threshold,
                max_radius_km,
                default_radius_km: defaults.default_radius_km.min(max_radius_km),
                ..defaults
            },
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        _ => Ok(default),
    }
}
