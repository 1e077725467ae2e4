//! IP geolocation via the ip-api.com JSON endpoint
//!
//! Results, including misses, are cached for the lifetime of the lookup.
//! Private and reserved addresses are answered locally without a request.

use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv6Addr};
use std::time::Duration;

use crate::state::GeoLocation;

/// Per-request timeout for the geolocation API
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Response payload from ip-api.com
#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    country: String,
    #[serde(default, rename = "countryCode")]
    country_code: String,
    #[serde(default)]
    region: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    lon: f64,
    #[serde(default)]
    isp: String,
    #[serde(default)]
    org: String,
}

/// Geolocation lookup with a shared in-memory cache.
///
/// Safe to call from any thread; each request carries its own timeout.
pub struct GeoLookup {
    agent: ureq::Agent,
    cache: RwLock<HashMap<String, Option<GeoLocation>>>,
}

impl GeoLookup {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(LOOKUP_TIMEOUT).build(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Location for an IP, or None for private addresses, timeouts and
    /// API errors
    pub fn locate(&self, ip: &str) -> Option<GeoLocation> {
        {
            let cache = self.cache.read();
            if let Some(cached) = cache.get(ip) {
                return cached.clone();
            }
        }

        // Misses are cached too, so an unreachable API is asked at most
        // once per address
        let location = if is_private_ip(ip) { None } else { self.fetch(ip) };
        self.cache.write().insert(ip.to_string(), location.clone());

        location
    }

    fn fetch(&self, ip: &str) -> Option<GeoLocation> {
        let url = format!("http://ip-api.com/json/{ip}");
        let response: ApiResponse = self.agent.get(&url).call().ok()?.into_json().ok()?;

        if response.status != "success" {
            return None;
        }

        Some(GeoLocation {
            latitude: response.lat,
            longitude: response.lon,
            city: non_empty(response.city),
            region: non_empty(response.region),
            country: non_empty(response.country),
            country_code: non_empty(response.country_code),
            org: non_empty(response.org),
            isp: non_empty(response.isp),
        })
    }
}

impl Default for GeoLookup {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

/// Addresses that must never reach the API: empty, the timeout sentinel,
/// unparsable strings, and private or reserved ranges
pub(crate) fn is_private_ip(ip: &str) -> bool {
    if ip.is_empty() || ip == "*" {
        return true;
    }
    let Ok(addr) = ip.parse::<IpAddr>() else {
        return true;
    };
    match addr {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback() || v6.is_unspecified() || is_unique_local(&v6) || is_link_local(&v6)
        }
    }
}

fn is_unique_local(v6: &Ipv6Addr) -> bool {
    (v6.segments()[0] & 0xfe00) == 0xfc00
}

fn is_link_local(v6: &Ipv6Addr) -> bool {
    (v6.segments()[0] & 0xffc0) == 0xfe80
}
