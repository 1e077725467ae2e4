use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cli::Args;

/// Runtime configuration derived from CLI args
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Replay a built-in route instead of probing
    pub simulate: bool,
    /// Overall trace deadline
    #[serde(with = "duration_serde")]
    pub timeout: Duration,
    /// Enable geolocation enrichment
    pub geo_enabled: bool,
    /// Emit events as JSON lines
    pub json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            simulate: false,
            timeout: Duration::from_secs(20),
            geo_enabled: true,
            json: false,
        }
    }
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Self {
            simulate: args.simulate,
            timeout: args.timeout_duration(),
            geo_enabled: !args.no_geo,
            json: args.json,
        }
    }
}

/// Serde helper for Duration
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }
}
