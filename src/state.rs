use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Geographic coordinates with optional place and network-owner details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isp: Option<String>,
}

impl GeoLocation {
    /// Location from coordinates and place names, with no owner info
    pub fn place(latitude: f64, longitude: f64, city: &str, country: &str, country_code: &str) -> Self {
        Self {
            latitude,
            longitude,
            city: Some(city.to_string()),
            region: None,
            country: Some(country.to_string()),
            country_code: Some(country_code.to_string()),
            org: None,
            isp: None,
        }
    }
}

/// A hosting provider detected from a hop's owner or hostname data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostingProvider {
    /// Display name (e.g. "AWS", "Google Cloud")
    pub provider: String,
    /// Brand color for visualization
    pub color: String,
}

/// A single hop along the traced path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hop {
    /// 1-based position within the session, strictly increasing
    pub hop_number: u32,
    /// Responder address, or "*" when the hop timed out
    pub ip_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Round-trip samples in milliseconds, empty on timeout
    pub rtt: Vec<f64>,
    /// Arithmetic mean of the samples, 0 when there are none
    pub avg_rtt: f64,
    pub location: Option<GeoLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<HostingProvider>,
    pub is_timeout: bool,
    pub is_destination: bool,
    /// Capture time in epoch milliseconds
    pub timestamp: i64,
}

impl Hop {
    /// A timed-out hop: sentinel address, no samples, no location
    pub fn timeout(hop_number: u32) -> Self {
        Self {
            hop_number,
            ip_address: "*".to_string(),
            hostname: None,
            rtt: Vec::new(),
            avg_rtt: 0.0,
            location: None,
            provider: None,
            is_timeout: true,
            is_destination: false,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// Arithmetic mean of a sample set (0 when empty)
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
