use crate::state::roster::DEFAULT_ROSTER_TTL;
use log::warn;
use std::time::Duration;

/// Where points are kept. Without a configured URL the session runs against
/// an in-memory store and nothing survives a restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSettings {
    pub remote: Option<RemoteSettings>,
    /// env_logger filter directives, e.g. `debug` or `courtside=trace`.
    pub log_filter: Option<String>,
    pub roster_ttl: Duration,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            remote: None,
            log_filter: None,
            roster_ttl: DEFAULT_ROSTER_TTL,
        }
    }
}

impl AppSettings {
    pub fn load() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let remote = non_empty("COURTSIDE_SUPABASE_URL").map(|url| RemoteSettings {
            url,
            api_key: non_empty("COURTSIDE_SUPABASE_KEY").unwrap_or_default(),
        });

        let roster_ttl = match non_empty("COURTSIDE_ROSTER_TTL_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) => Duration::from_secs(secs),
                Err(_) => {
                    warn!("ignoring COURTSIDE_ROSTER_TTL_SECS={raw}: not a number of seconds");
                    DEFAULT_ROSTER_TTL
                }
            },
            None => DEFAULT_ROSTER_TTL,
        };

        Self {
            remote,
            log_filter: non_empty("COURTSIDE_LOG"),
            roster_ttl,
        }
    }
}
