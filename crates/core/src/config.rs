use std::path::Path;
use std::str::FromStr;

use searchdex_ingest::QueueConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchdexError};

pub const ENV_CONCURRENCY: &str = "SEARCHDEX_CONCURRENCY";
pub const ENV_MAX_PENDING: &str = "SEARCHDEX_MAX_PENDING";
pub const ENV_DUPLICATE_KEYS: &str = "SEARCHDEX_DUPLICATE_KEYS";
pub const ENV_MAX_STALE: &str = "SEARCHDEX_MAX_STALE";
pub const ENV_EVENT_CAPACITY: &str = "SEARCHDEX_EVENT_CAPACITY";

/// What to do when two items of one snapshot map to the same key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKeyPolicy {
    /// The last item's placeholder wins; only the first item is extracted.
    #[default]
    LastWins,
    /// Fail the whole update before anything is committed.
    Reject,
}

impl FromStr for DuplicateKeyPolicy {
    type Err = SearchdexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last_wins" | "last-wins" => Ok(Self::LastWins),
            "reject" => Ok(Self::Reject),
            other => Err(SearchdexError::Config(format!(
                "unknown duplicate key policy: {other}"
            ))),
        }
    }
}

/// Handling of entries whose key is missing from the latest snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Stale entries stay in the store forever.
    #[default]
    RetainAll,
    /// Keep at most `max_stale` stale entries, evicting the least recently seen first.
    Bounded { max_stale: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub concurrency: usize,
    pub max_pending: Option<usize>,
    pub duplicate_keys: DuplicateKeyPolicy,
    pub retention: RetentionPolicy,
    pub event_capacity: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            max_pending: None,
            duplicate_keys: DuplicateKeyPolicy::default(),
            retention: RetentionPolicy::default(),
            event_capacity: 256,
        }
    }
}

impl IndexerConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    /// Applies `SEARCHDEX_*` variables from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)));
        self.apply_overrides(vars)
    }

    pub fn apply_overrides<I, K, V>(mut self, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in vars {
            let value = value.as_ref().trim();
            match name.as_ref() {
                ENV_CONCURRENCY => self.concurrency = parse_usize(ENV_CONCURRENCY, value)?,
                ENV_MAX_PENDING => {
                    self.max_pending = match value {
                        "" | "none" => None,
                        n => Some(parse_usize(ENV_MAX_PENDING, n)?),
                    }
                }
                ENV_DUPLICATE_KEYS => self.duplicate_keys = value.parse()?,
                ENV_MAX_STALE => {
                    self.retention = match value {
                        "" | "none" => RetentionPolicy::RetainAll,
                        n => RetentionPolicy::Bounded {
                            max_stale: parse_usize(ENV_MAX_STALE, n)?,
                        },
                    }
                }
                ENV_EVENT_CAPACITY => {
                    self.event_capacity = parse_usize(ENV_EVENT_CAPACITY, value)?
                }
                _ => {}
            }
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(SearchdexError::Config(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(SearchdexError::Config(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        if self.max_pending == Some(0) {
            return Err(SearchdexError::Config(
                "max_pending must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<&IndexerConfig> for QueueConfig {
    fn from(value: &IndexerConfig) -> Self {
        Self {
            concurrency: value.concurrency,
            max_pending: value.max_pending,
        }
    }
}

fn parse_usize(name: &str, value: &str) -> Result<usize> {
    value
        .parse()
        .map_err(|e| SearchdexError::Config(format!("{name}={value:?}: {e}")))
}
