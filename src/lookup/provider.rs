//! Hosting-provider attribution
//!
//! Case-insensitive substring matching of network-owner strings against a
//! static provider table, with hostname suffixes as a fallback when the
//! owner fields say nothing.

use crate::state::HostingProvider;

/// A known provider with its detection patterns
struct Provider {
    name: &'static str,
    /// Brand color used by downstream visualization
    color: &'static str,
    /// Lower-case patterns matched against org/isp text
    patterns: &'static [&'static str],
}

const PROVIDERS: &[Provider] = &[
    Provider {
        name: "AWS",
        color: "#FF9900",
        patterns: &["amazon", "aws", "ec2", "cloudfront"],
    },
    Provider {
        name: "Google Cloud",
        color: "#4285F4",
        patterns: &["google"],
    },
    Provider {
        name: "Azure",
        color: "#0078D4",
        patterns: &["microsoft"],
    },
    Provider {
        name: "Cloudflare",
        color: "#F38020",
        patterns: &["cloudflare"],
    },
    Provider {
        name: "Akamai",
        color: "#0096D6",
        patterns: &["akamai"],
    },
    Provider {
        name: "Fastly",
        color: "#FF282D",
        patterns: &["fastly"],
    },
    Provider {
        name: "DigitalOcean",
        color: "#0080FF",
        patterns: &["digitalocean"],
    },
    Provider {
        name: "Linode",
        color: "#00A95C",
        patterns: &["linode", "akamai connected cloud"],
    },
    Provider {
        name: "Vultr",
        color: "#007BFC",
        patterns: &["vultr", "choopa"],
    },
    Provider {
        name: "OVH",
        color: "#000E9C",
        patterns: &["ovh"],
    },
    Provider {
        name: "Hetzner",
        color: "#D50C2D",
        patterns: &["hetzner"],
    },
];

/// Hostname fragments checked only when org/isp matching fails
const HOSTNAME_PATTERNS: &[(&str, &str, &str)] = &[
    ("amazonaws.com", "AWS", "#FF9900"),
    ("cloudfront.net", "AWS", "#FF9900"),
    ("compute.amazonaws", "AWS", "#FF9900"),
    ("googleusercontent.com", "Google Cloud", "#4285F4"),
    ("1e100.net", "Google Cloud", "#4285F4"),
    ("google.com", "Google Cloud", "#4285F4"),
    ("azure.com", "Azure", "#0078D4"),
    ("cloudapp.azure", "Azure", "#0078D4"),
    ("cloudflare.com", "Cloudflare", "#F38020"),
    ("akamai.net", "Akamai", "#0096D6"),
    ("akamaitechnologies.com", "Akamai", "#0096D6"),
    ("fastly.net", "Fastly", "#FF282D"),
    ("digitalocean.com", "DigitalOcean", "#0080FF"),
    ("linode.com", "Linode", "#00A95C"),
];

/// Identify a hosting provider from owner strings, falling back to the
/// hostname. Returns None when nothing matches.
pub fn detect(org: &str, isp: &str, hostname: &str) -> Option<HostingProvider> {
    let combined = format!("{org} {isp}").to_lowercase();

    for provider in PROVIDERS {
        if provider.patterns.iter().any(|p| combined.contains(p)) {
            return Some(HostingProvider {
                provider: provider.name.to_string(),
                color: provider.color.to_string(),
            });
        }
    }

    if !hostname.is_empty() {
        let hostname = hostname.to_lowercase();
        for (pattern, name, color) in HOSTNAME_PATTERNS {
            if hostname.contains(pattern) {
                return Some(HostingProvider {
                    provider: (*name).to_string(),
                    color: (*color).to_string(),
                });
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_from_org() {
        let dc = detect("Amazon.com, Inc.", "", "").unwrap();
        assert_eq!(dc.provider, "AWS");
        assert_eq!(dc.color, "#FF9900");
    }

    #[test]
    fn test_detects_from_isp() {
        let dc = detect("", "Google LLC", "").unwrap();
        assert_eq!(dc.provider, "Google Cloud");
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert_eq!(detect("CLOUDFLARE, INC.", "", "").unwrap().provider, "Cloudflare");
        assert_eq!(detect("", "HeTzNeR Online GmbH", "").unwrap().provider, "Hetzner");
    }

    #[test]
    fn test_vultr_legacy_name() {
        assert_eq!(detect("Choopa, LLC", "", "").unwrap().provider, "Vultr");
    }

    #[test]
    fn test_akamai_wins_over_linode_for_combined_brand() {
        // "akamai connected cloud" hits the Akamai patterns first
        assert_eq!(
            detect("Akamai Connected Cloud", "", "").unwrap().provider,
            "Akamai"
        );
        assert_eq!(detect("Linode, LLC", "", "").unwrap().provider, "Linode");
    }

    #[test]
    fn test_hostname_fallback() {
        let dc = detect("", "", "ec2-52-95-110-1.compute.amazonaws.com").unwrap();
        assert_eq!(dc.provider, "AWS");

        let dc = detect("", "", "cache.1e100.net").unwrap();
        assert_eq!(dc.provider, "Google Cloud");
    }

    #[test]
    fn test_owner_fields_take_priority_over_hostname() {
        let dc = detect("Microsoft Corporation", "", "something.1e100.net").unwrap();
        assert_eq!(dc.provider, "Azure");
    }

    #[test]
    fn test_unknown_owner_is_none() {
        assert!(detect("Deutsche Telekom AG", "DTAG", "").is_none());
        assert!(detect("", "", "").is_none());
        assert!(detect("", "", "router.isp.example").is_none());
    }
}
