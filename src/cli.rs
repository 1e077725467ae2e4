use clap::Parser;
use std::time::Duration;

/// Trace the network path to a host, enriching each hop with geolocation
/// and hosting-provider data as it is discovered
#[derive(Parser, Debug, Clone)]
#[command(name = "hopcast")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Target host to trace (IP address or hostname)
    #[arg(required = true)]
    pub target: String,

    /// Replay a built-in route instead of running the system trace utility
    #[arg(long = "simulate")]
    pub simulate: bool,

    /// Overall trace deadline in seconds
    #[arg(long = "timeout", default_value = "20")]
    pub timeout: f64,

    /// Skip geolocation enrichment
    #[arg(long = "no-geo")]
    pub no_geo: bool,

    /// Emit events as JSON lines instead of readable output
    #[arg(long = "json")]
    pub json: bool,
}

impl Args {
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs_f64(self.timeout)
    }

    /// Validate argument combinations
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout <= 0.0 {
            return Err("timeout must be positive".to_string());
        }
        if self.target.trim().is_empty() {
            return Err("target must not be empty".to_string());
        }
        Ok(())
    }
}
