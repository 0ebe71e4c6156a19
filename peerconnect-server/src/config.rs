use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use anyhow::{Context, Result};
use tracing::{info, warn};

/// What happens to a freshly sent request.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum AcceptPolicy {
    /// The request stays pending until the receiver accepts or declines it.
    #[default]
    Manual,
    /// The request is turned into a connection right after it is stored.
    AutoAccept,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Limits {
    pub max_connections: usize,
    pub max_pending_requests: usize,
    pub message_max_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_connections: 500,
            max_pending_requests: 50,
            message_max_len: 200,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct StoreConfig {
    pub policy: AcceptPolicy,
    pub limits: Limits,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub db_path: PathBuf,
    pub catalog_path: Option<PathBuf>,
    pub store: StoreConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        let defaults = Limits::default();
        let mut port = try_load("PEERCONNECT_PORT", 8000)?;
        if let Some(arg) = env::args().nth(1) {
            port = arg.parse().with_context(|| format!("invalid port argument {arg:?}"))?;
        }
        let auto_accept: bool = try_load("PEERCONNECT_AUTO_ACCEPT", false)?;
        Ok(Self {
            port,
            db_path: try_load("PEERCONNECT_DB_PATH", PathBuf::from("peerconnect-db"))?,
            catalog_path: var("PEERCONNECT_CATALOG").map(PathBuf::from),
            store: StoreConfig {
                policy: if auto_accept {
                    AcceptPolicy::AutoAccept
                } else {
                    AcceptPolicy::Manual
                },
                limits: Limits {
                    max_connections: try_load("PEERCONNECT_MAX_CONNECTIONS", defaults.max_connections)?,
                    max_pending_requests: try_load("PEERCONNECT_MAX_PENDING", defaults.max_pending_requests)?,
                    message_max_len: try_load("PEERCONNECT_MESSAGE_MAX_LEN", defaults.message_max_len)?,
                },
            },
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn try_load<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr + std::fmt::Debug,
    T::Err: Display,
{
    match var(key) {
        None => {
            info!("{key} not set, using default: {default:?}");
            Ok(default)
        }
        Some(value) => value.trim().parse().map_err(|e| {
            warn!("Invalid {key} value: {e}");
            anyhow::anyhow!("environment misconfigured: {key}={value:?}: {e}")
        }),
    }
}
