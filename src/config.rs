use std::{env, path::PathBuf, time::Duration};

use anyhow::Context;

use crate::retry::RetryPolicy;

const ENV_DOWNLOAD_DIR: &str = "MEDIAGRAB_DOWNLOAD_DIR";
const ENV_RETRIES: &str = "MEDIAGRAB_RETRIES";
const ENV_RETRY_DELAY: &str = "MEDIAGRAB_RETRY_DELAY_SECS";

/// Explicit configuration for one invocation, resolved once at startup and
/// passed into every operation.
#[derive(Debug)]
pub struct Config {
    pub download_dir: PathBuf,
    pub retry: RetryPolicy,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let download_dir = get(ENV_DOWNLOAD_DIR)
            .map(PathBuf::from)
            .or_else(default_download_dir)
            .context("could not determine a download directory")?;

        let defaults = RetryPolicy::default();

        let attempts = match get(ENV_RETRIES) {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .with_context(|| format!("{ENV_RETRIES} must be a positive integer, got {raw:?}"))?
                .max(1),
            None => defaults.attempts,
        };

        let delay = match get(ENV_RETRY_DELAY) {
            Some(raw) => Duration::from_secs(raw.trim().parse::<u64>().with_context(|| {
                format!("{ENV_RETRY_DELAY} must be a number of seconds, got {raw:?}")
            })?),
            None => defaults.delay,
        };

        Ok(Self {
            download_dir,
            retry: RetryPolicy { attempts, delay },
        })
    }
}

fn default_download_dir() -> Option<PathBuf> {
    dirs::download_dir().or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
}
