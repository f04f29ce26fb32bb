use crate::core::{Result, SyncError};
use crate::remote::TableId;
use std::fmt;

/// Environment variable holding the remote endpoint URL
pub const ENV_REMOTE_URL: &str = "SYNCDECK_REMOTE_URL";

/// Environment variable holding the remote access key
pub const ENV_REMOTE_KEY: &str = "SYNCDECK_REMOTE_KEY";

const PLACEHOLDER_MARKERS: [&str; 5] = ["your-", "your_", "placeholder", "changeme", "<"];

/// Synchronization configuration
///
/// Presence of both connection parameters selects Remote mode; anything else
/// runs the process in Local mode.
#[derive(Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Remote endpoint URL
    pub endpoint_url: Option<String>,

    /// Remote access key
    pub access_key: Option<String>,

    /// Table whose emptiness decides whether baseline seeding runs
    pub seed_marker: TableId,
}

impl SyncConfig {
    /// Configuration with no remote parameters (Local mode)
    pub fn local() -> Self {
        Self {
            endpoint_url: None,
            access_key: None,
            seed_marker: TableId::Users,
        }
    }

    pub fn new(endpoint_url: &str, access_key: &str) -> Self {
        Self::local().endpoint_url(endpoint_url).access_key(access_key)
    }

    /// Read connection parameters from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read connection parameters through an arbitrary lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            endpoint_url: lookup(ENV_REMOTE_URL),
            access_key: lookup(ENV_REMOTE_KEY),
            seed_marker: TableId::Users,
        }
    }

    /// Set the endpoint URL
    pub fn endpoint_url(mut self, url: &str) -> Self {
        self.endpoint_url = Some(url.to_string());
        self
    }

    /// Set the access key
    pub fn access_key(mut self, key: &str) -> Self {
        self.access_key = Some(key.to_string());
        self
    }

    /// Set the seeding marker table
    pub fn seed_marker(mut self, table: TableId) -> Self {
        self.seed_marker = table;
        self
    }

    /// True when remote mode can be attempted
    pub fn is_remote_configured(&self) -> bool {
        self.validate().is_ok()
    }

    /// Validate the remote parameters
    pub fn validate(&self) -> Result<()> {
        let url = Self::usable("endpoint URL", self.endpoint_url.as_deref())?;
        Self::usable("access key", self.access_key.as_deref())?;

        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(SyncError::Config(format!(
                "endpoint URL must start with http:// or https://, got '{}'",
                url
            )));
        }

        if self.seed_marker.is_document() {
            return Err(SyncError::Config(format!(
                "seed marker '{}' must be a collection table",
                self.seed_marker
            )));
        }

        Ok(())
    }

    /// Access key with everything past the first four characters masked
    pub fn redacted_key(&self) -> String {
        match self.access_key.as_deref() {
            Some(key) if !key.is_empty() => {
                let prefix: String = key.chars().take(4).collect();
                format!("{}***", prefix)
            }
            _ => "<unset>".to_string(),
        }
    }

    fn usable<'a>(label: &str, value: Option<&'a str>) -> Result<&'a str> {
        let value = value.map(str::trim).unwrap_or_default();
        if value.is_empty() {
            return Err(SyncError::Config(format!("{} is not set", label)));
        }

        let lowered = value.to_ascii_lowercase();
        if PLACEHOLDER_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
        {
            return Err(SyncError::Config(format!("{} is a placeholder", label)));
        }

        Ok(value)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::local()
    }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key", &self.redacted_key())
            .field("seed_marker", &self.seed_marker)
            .finish()
    }
}

impl fmt::Display for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "endpoint={} key={}",
            self.endpoint_url.as_deref().unwrap_or("<unset>"),
            self.redacted_key()
        )
    }
}
