use chrono::Utc;

use crate::lookup::provider;
use crate::state::{mean, GeoLocation, Hop};

/// Injected geolocation lookup: IP string to location, or None
pub type GeoLookupFn<'a> = &'a dyn Fn(&str) -> Option<GeoLocation>;

/// Output grammar of a platform's path-tracing utility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `traceroute` on Linux and macOS
    Unix,
    /// `tracert` on Windows
    Windows,
}

impl Dialect {
    /// Dialect of the trace utility on the build platform
    pub fn native() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Unix
        }
    }

    /// Trace command for this dialect
    pub fn command(self) -> &'static str {
        match self {
            Self::Unix => "traceroute",
            Self::Windows => "tracert",
        }
    }

    /// Fixed arguments placed before the target
    pub fn args(self) -> &'static [&'static str] {
        match self {
            // -n: numeric output, -q 1: one probe per hop,
            // -w 1: 1s probe timeout, -m 30: max 30 hops
            Self::Unix => &["-n", "-q", "1", "-w", "1", "-m", "30"],
            // -d: do not resolve hostnames
            Self::Windows => &["-d"],
        }
    }

    /// Prefix of the header line carrying the destination address
    pub fn header_prefix(self) -> &'static str {
        match self {
            Self::Unix => "traceroute to",
            Self::Windows => "Tracing route to",
        }
    }

    /// Whether a line is banner output that never describes a hop
    pub fn is_noise(self, line: &str) -> bool {
        match self {
            Self::Unix => false,
            Self::Windows => {
                line.starts_with("over a maximum")
                    || line.starts_with("Trace complete")
                    || line.trim().is_empty()
            }
        }
    }

    /// Extract the destination IP from the header line, or "" when absent
    pub fn parse_destination(self, line: &str) -> String {
        match self {
            Self::Unix => extract_bracketed_ipv4(line, '(', ')'),
            Self::Windows => extract_bracketed_ipv4(line, '[', ']'),
        }
    }

    /// Parse one line of utility output into a hop, or None when the line
    /// does not describe a hop
    pub fn parse_hop_line(
        self,
        line: &str,
        destination_ip: &str,
        geo_lookup: Option<GeoLookupFn>,
    ) -> Option<Hop> {
        match self {
            Self::Unix => parse_unix_hop_line(line, destination_ip, geo_lookup),
            Self::Windows => parse_windows_hop_line(line, destination_ip, geo_lookup),
        }
    }
}

/// Parse a traceroute hop line.
///
/// Examples:
///   ` 1  192.168.1.1  0.456 ms`
///   ` 3  * * *`
///   ` 5  10.0.0.1  5.1 ms  5.2 ms  5.3 ms`
fn parse_unix_hop_line(
    line: &str,
    destination_ip: &str,
    geo_lookup: Option<GeoLookupFn>,
) -> Option<Hop> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 2 {
        return None;
    }

    let hop_number: u32 = fields[0].parse().ok()?;

    // A timed-out hop prints nothing but asterisks after the ordinal
    if fields[1..].iter().all(|f| *f == "*") {
        return Some(Hop::timeout(hop_number));
    }

    let ip_address = fields[1];

    // RTT values are the numeric tokens immediately followed by "ms"
    let mut rtt = Vec::new();
    for i in 3..fields.len() {
        if fields[i] == "ms" {
            if let Ok(value) = fields[i - 1].parse::<f64>() {
                rtt.push(value);
            }
        }
    }

    Some(build_hop(hop_number, ip_address, rtt, destination_ip, geo_lookup))
}

/// Parse a tracert hop line.
///
/// Examples:
///   `  1    <1 ms    <1 ms    <1 ms  192.168.1.1`
///   `  2     5 ms     4 ms     5 ms  10.0.0.1`
///   `  3     *        *        *     Request timed out.`
fn parse_windows_hop_line(
    line: &str,
    destination_ip: &str,
    geo_lookup: Option<GeoLookupFn>,
) -> Option<Hop> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let fields: Vec<&str> = line.split_whitespace().collect();

    if line.contains("Request timed out") {
        let hop_number: u32 = fields.first()?.parse().ok()?;
        return Some(Hop::timeout(hop_number));
    }

    if fields.len() < 5 {
        return None;
    }

    let hop_number: u32 = fields[0].parse().ok()?;

    // The responder is the last token shaped like a dotted quad
    let ip_address = *fields.iter().rev().find(|f| is_ipv4(f))?;

    // RTT columns sit between the ordinal and the responder address
    let mut rtt = Vec::new();
    for field in &fields[1..] {
        if *field == ip_address {
            break;
        }
        match *field {
            "ms" | "*" => {}
            // tracert prints sub-millisecond probes as "<1"
            "<1" => rtt.push(0.5),
            other => {
                if let Ok(value) = other.parse::<f64>() {
                    rtt.push(value);
                }
            }
        }
    }

    Some(build_hop(hop_number, ip_address, rtt, destination_ip, geo_lookup))
}

/// Assemble a non-timeout hop, enriching it when a lookup was supplied
fn build_hop(
    hop_number: u32,
    ip_address: &str,
    rtt: Vec<f64>,
    destination_ip: &str,
    geo_lookup: Option<GeoLookupFn>,
) -> Hop {
    let avg_rtt = mean(&rtt);

    let location = geo_lookup.and_then(|lookup| lookup(ip_address));

    // Attribution comes from the owner fields; the numeric-output path
    // carries no hostname to fall back on
    let hosting = location.as_ref().and_then(|loc| {
        provider::detect(
            loc.org.as_deref().unwrap_or(""),
            loc.isp.as_deref().unwrap_or(""),
            "",
        )
    });

    Hop {
        hop_number,
        ip_address: ip_address.to_string(),
        hostname: None,
        avg_rtt,
        rtt,
        location,
        provider: hosting,
        is_timeout: false,
        is_destination: ip_address == destination_ip,
        timestamp: Utc::now().timestamp_millis(),
    }
}

/// First dotted-quad IPv4 enclosed in the given bracket pair, or ""
fn extract_bracketed_ipv4(line: &str, open: char, close: char) -> String {
    let mut rest = line;
    while let Some(start) = rest.find(open) {
        let tail = &rest[start + open.len_utf8()..];
        let Some(end) = tail.find(close) else { break };
        let candidate = &tail[..end];
        if is_ipv4(candidate) {
            return candidate.to_string();
        }
        rest = &tail[end + close.len_utf8()..];
    }
    String::new()
}

/// Strict dotted-quad check: four octets, each a decimal u8
fn is_ipv4(token: &str) -> bool {
    let parts: Vec<&str> = token.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|part| {
            !part.is_empty()
                && part.len() <= 3
                && part.chars().all(|c| c.is_ascii_digit())
                && part.parse::<u8>().is_ok()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_unix_header_extraction() {
        let dest = Dialect::Unix
            .parse_destination("traceroute to google.com (142.250.80.46), 30 hops max, 60 byte packets");
        assert_eq!(dest, "142.250.80.46");

        let dest = Dialect::Unix
            .parse_destination("traceroute to 8.8.8.8 (8.8.8.8), 30 hops max, 60 byte packets");
        assert_eq!(dest, "8.8.8.8");
    }

    #[test]
    fn test_unix_header_without_address_is_empty() {
        assert_eq!(Dialect::Unix.parse_destination("some other line"), "");
        assert_eq!(Dialect::Unix.parse_destination("traceroute to host (not-an-ip)"), "");
    }

    #[test]
    fn test_windows_header_extraction() {
        let dest = Dialect::Windows.parse_destination("Tracing route to google.com [142.250.80.46]");
        assert_eq!(dest, "142.250.80.46");

        let dest = Dialect::Windows.parse_destination("Tracing route to 8.8.8.8 [8.8.8.8]");
        assert_eq!(dest, "8.8.8.8");

        assert_eq!(Dialect::Windows.parse_destination("some other line"), "");
    }

    #[test]
    fn test_unix_hop_with_single_rtt() {
        let hop = Dialect::Unix
            .parse_hop_line(" 1  192.168.1.1  0.456 ms", "8.8.8.8", None)
            .unwrap();

        assert_eq!(hop.hop_number, 1);
        assert_eq!(hop.ip_address, "192.168.1.1");
        assert_eq!(hop.rtt, vec![0.456]);
        assert!((hop.avg_rtt - 0.456).abs() < 1e-9);
        assert!(!hop.is_timeout);
        assert!(!hop.is_destination);
    }

    #[test]
    fn test_unix_hop_with_multiple_rtts() {
        let hop = Dialect::Unix
            .parse_hop_line(" 5  10.0.0.1  5.1 ms  5.2 ms  5.3 ms", "8.8.8.8", None)
            .unwrap();

        assert_eq!(hop.rtt, vec![5.1, 5.2, 5.3]);
        assert!((hop.avg_rtt - 5.2).abs() < 1e-3);
    }

    #[test]
    fn test_unix_timeout_hop() {
        let hop = Dialect::Unix.parse_hop_line(" 3  * * *", "8.8.8.8", None).unwrap();

        assert_eq!(hop.hop_number, 3);
        assert_eq!(hop.ip_address, "*");
        assert!(hop.rtt.is_empty());
        assert_eq!(hop.avg_rtt, 0.0);
        assert!(hop.is_timeout);
        assert!(!hop.is_destination);
    }

    #[test]
    fn test_unix_destination_hop() {
        let hop = Dialect::Unix
            .parse_hop_line(" 4  72.14.215.85  15.678 ms", "72.14.215.85", None)
            .unwrap();

        assert!(hop.is_destination);
    }

    #[test]
    fn test_unix_rejects_invalid_lines() {
        assert!(Dialect::Unix.parse_hop_line("", "8.8.8.8", None).is_none());
        assert!(Dialect::Unix.parse_hop_line("some random text", "8.8.8.8", None).is_none());
        assert!(Dialect::Unix.parse_hop_line("ping", "8.8.8.8", None).is_none());
        // ordinal must be a number
        assert!(Dialect::Unix.parse_hop_line(" x  10.0.0.1  5 ms", "8.8.8.8", None).is_none());
    }

    #[test]
    fn test_unix_rtt_count_matches_pairs() {
        let line = " 7  1.2.3.4  1.0 ms 2.0 ms 3.0 ms 4.0 ms 5.0 ms";
        let hop = Dialect::Unix.parse_hop_line(line, "", None).unwrap();

        assert_eq!(hop.rtt.len(), 5);
        assert!((hop.avg_rtt - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_unix_enrichment_only_for_responding_hops() {
        let calls = Cell::new(0u32);
        let lookup = |ip: &str| {
            calls.set(calls.get() + 1);
            assert_eq!(ip, "52.95.110.1");
            Some(GeoLocation {
                org: Some("Amazon.com, Inc.".to_string()),
                isp: Some("Amazon Technologies".to_string()),
                ..GeoLocation::place(39.0, -77.5, "Ashburn", "United States", "US")
            })
        };

        let hop = Dialect::Unix
            .parse_hop_line(" 9  52.95.110.1  12.0 ms", "8.8.8.8", Some(&lookup))
            .unwrap();
        assert_eq!(calls.get(), 1);
        assert!(hop.location.is_some());
        assert_eq!(hop.provider.unwrap().provider, "AWS");

        // the lookup must never see the timeout sentinel
        let timeout = Dialect::Unix.parse_hop_line(" 3  * * *", "8.8.8.8", Some(&lookup)).unwrap();
        assert_eq!(calls.get(), 1);
        assert!(timeout.location.is_none());
    }

    #[test]
    fn test_windows_hop_with_rtts() {
        let hop = Dialect::Windows
            .parse_hop_line("  1     5 ms     4 ms     5 ms  192.168.1.1", "8.8.8.8", None)
            .unwrap();

        assert_eq!(hop.hop_number, 1);
        assert_eq!(hop.ip_address, "192.168.1.1");
        assert_eq!(hop.rtt, vec![5.0, 4.0, 5.0]);
        assert!((hop.avg_rtt - 4.666_666_666_666_667).abs() < 1e-3);
        assert!(!hop.is_timeout);
    }

    #[test]
    fn test_windows_sub_millisecond_rtts() {
        let hop = Dialect::Windows
            .parse_hop_line("  1    <1 ms    <1 ms    <1 ms  192.168.1.1", "8.8.8.8", None)
            .unwrap();

        assert_eq!(hop.rtt, vec![0.5, 0.5, 0.5]);
        assert!((hop.avg_rtt - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_windows_timeout_hop() {
        let hop = Dialect::Windows
            .parse_hop_line("  3     *        *        *     Request timed out.", "8.8.8.8", None)
            .unwrap();

        assert_eq!(hop.hop_number, 3);
        assert_eq!(hop.ip_address, "*");
        assert!(hop.rtt.is_empty());
        assert!(hop.is_timeout);
        assert!(!hop.is_destination);
    }

    #[test]
    fn test_windows_partial_probe_loss_is_not_a_timeout() {
        let hop = Dialect::Windows
            .parse_hop_line("  5     *       10 ms     *     10.0.0.5", "8.8.8.8", None)
            .unwrap();

        assert!(!hop.is_timeout);
        assert_eq!(hop.rtt, vec![10.0]);
    }

    #[test]
    fn test_windows_destination_hop() {
        let hop = Dialect::Windows
            .parse_hop_line("  4    15 ms    14 ms    16 ms  72.14.215.85", "72.14.215.85", None)
            .unwrap();

        assert_eq!(hop.rtt, vec![15.0, 14.0, 16.0]);
        assert!((hop.avg_rtt - 15.0).abs() < 1e-9);
        assert!(hop.is_destination);
    }

    #[test]
    fn test_windows_rejects_invalid_lines() {
        assert!(Dialect::Windows.parse_hop_line("", "8.8.8.8", None).is_none());
        assert!(Dialect::Windows.parse_hop_line("Trace complete.", "8.8.8.8", None).is_none());
        // fewer than five tokens
        assert!(Dialect::Windows.parse_hop_line("  2  5 ms  10.0.0.1", "8.8.8.8", None).is_none());
        // no dotted-quad responder token
        assert!(Dialect::Windows
            .parse_hop_line("  2     5 ms     4 ms     5 ms  gateway", "8.8.8.8", None)
            .is_none());
    }

    #[test]
    fn test_windows_noise_lines() {
        assert!(Dialect::Windows.is_noise("over a maximum of 30 hops:"));
        assert!(Dialect::Windows.is_noise("Trace complete."));
        assert!(Dialect::Windows.is_noise("   "));
        assert!(!Dialect::Windows.is_noise("  1     5 ms     4 ms     5 ms  192.168.1.1"));
        assert!(!Dialect::Unix.is_noise(""));
    }

    #[test]
    fn test_invocation_contract() {
        assert_eq!(Dialect::Unix.command(), "traceroute");
        assert_eq!(Dialect::Unix.args(), &["-n", "-q", "1", "-w", "1", "-m", "30"]);
        assert_eq!(Dialect::Windows.command(), "tracert");
        assert_eq!(Dialect::Windows.args(), &["-d"]);
    }

    #[test]
    fn test_strict_ipv4_token() {
        assert!(is_ipv4("192.168.1.1"));
        assert!(is_ipv4("0.0.0.0"));
        assert!(!is_ipv4("999.1.1.1"));
        assert!(!is_ipv4("1.2.3"));
        assert!(!is_ipv4("1.2.3.4.5"));
        assert!(!is_ipv4("a.b.c.d"));
        assert!(!is_ipv4(""));
    }
}
