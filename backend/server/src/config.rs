use std::{env, fmt::Display, fs::read_to_string, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Result, anyhow, bail};
use tracing::{info, warn};

use crate::{geo::country_code, resolver::ResolutionOrder};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TallyBackend {
    Redis,
    Memory,
}

impl FromStr for TallyBackend {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(TallyBackend::Redis),
            "memory" => Ok(TallyBackend::Memory),
            other => Err(format!("expected redis or memory, got {other:?}")),
        }
    }
}

pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub backend: TallyBackend,
    pub default_country: Option<String>,
    pub geoip_table: Option<PathBuf>,
    pub resolution_order: ResolutionOrder,
    pub store_timeout: Duration,
    pub stats_max_age: u64,
    pub live_capacity: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let redis_url = var("REDIS_URL")
            .or_else(|| read_secret("REDIS_URL"))
            .unwrap_or_else(|| {
                info!("REDIS_URL not set, using default");
                "redis://127.0.0.1:6379".to_string()
            });

        let default_country = match var("DEFAULT_COUNTRY") {
            Some(raw) => Some(
                country_code(&raw).ok_or_else(|| anyhow!("Invalid DEFAULT_COUNTRY value: {raw}"))?,
            ),
            None => {
                warn!("DEFAULT_COUNTRY not set, unresolved votes count as UN");
                None
            }
        };

        Ok(Self {
            port: try_load(&var, "RUST_PORT", "1111")?,
            redis_url,
            backend: try_load(&var, "TALLY_BACKEND", "redis")?,
            default_country,
            geoip_table: var("GEOIP_TABLE").map(PathBuf::from),
            resolution_order: try_load(&var, "COUNTRY_RESOLUTION_ORDER", "platform,cdn,ip,default")?,
            store_timeout: Duration::from_millis(try_load(&var, "STORE_TIMEOUT_MS", "3000")?),
            stats_max_age: try_load(&var, "STATS_MAX_AGE_SECS", "10")?,
            live_capacity: try_load(&var, "LIVE_CHANNEL_CAPACITY", "64")?,
        })
    }
}

fn try_load<T: FromStr>(var: impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    match raw.trim().parse() {
        Ok(value) => Ok(value),
        Err(e) => bail!("Invalid {key} value: {e}"),
    }
}

fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .ok()
        .filter(|s| !s.is_empty())
}
