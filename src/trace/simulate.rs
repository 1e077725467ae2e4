//! Offline route simulation
//!
//! Fabricates a plausible hop stream from a predefined route when the
//! platform trace utility is unavailable or real probing is undesired.

use anyhow::{bail, Result};
use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::Range;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::state::{mean, GeoLocation, Hop};
use crate::trace::session::{CompleteFn, HopFn};

/// Inter-hop pacing range in milliseconds
const PACING_MS: Range<u64> = 150..400;

/// Fraction of the baseline RTT used as jitter amplitude
const RTT_JITTER: f64 = 0.15;

/// Jitter floor so near-zero baselines still vary
const MIN_JITTER_MS: f64 = 0.5;

/// Samples generated per hop
const SAMPLES_PER_HOP: usize = 3;

/// A fixed synthetic path between two places
#[derive(Debug, Clone)]
pub struct RouteTemplate {
    pub name: &'static str,
    pub source: GeoLocation,
    pub destination: GeoLocation,
    pub hops: Vec<HopTemplate>,
}

/// One synthetic hop: fixed identity plus a baseline RTT in milliseconds
#[derive(Debug, Clone)]
pub struct HopTemplate {
    pub ip_address: &'static str,
    pub hostname: &'static str,
    pub location: GeoLocation,
    pub base_rtt: f64,
}

/// Hop source that replays a predefined route with jittered timing
pub struct RouteSimulator {
    route: RouteTemplate,
    rng: Mutex<StdRng>,
}

impl RouteSimulator {
    /// Simulator for the route matching the target
    pub fn for_target(target: &str) -> Self {
        Self {
            route: select_route(target),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Simulator with a deterministic generator, for tests
    pub fn seeded(target: &str, seed: u64) -> Self {
        Self {
            route: select_route(target),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Source location of the simulated route
    pub fn source(&self) -> &GeoLocation {
        &self.route.source
    }

    /// Emit the route's hops in order until exhausted or cancelled.
    ///
    /// The final hop is always marked as the destination. Cancellation
    /// interrupts the pacing delay and suppresses the completion callback.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        on_hop: &HopFn,
        on_complete: CompleteFn,
    ) -> Result<()> {
        let total = self.route.hops.len();

        for (i, template) in self.route.hops.iter().enumerate() {
            if cancel.is_cancelled() {
                bail!("trace cancelled");
            }

            let rtt = self.jittered_rtt(template.base_rtt);
            let avg_rtt = mean(&rtt);

            on_hop(Hop {
                hop_number: (i + 1) as u32,
                ip_address: template.ip_address.to_string(),
                hostname: Some(template.hostname.to_string()),
                rtt,
                avg_rtt,
                location: Some(template.location.clone()),
                provider: None,
                is_timeout: false,
                is_destination: i == total - 1,
                timestamp: Utc::now().timestamp_millis(),
            });

            // Pace delivery like a live trace; nothing follows the last hop
            if i < total - 1 {
                let delay = Duration::from_millis(self.rng.lock().gen_range(PACING_MS));
                tokio::select! {
                    _ = cancel.cancelled() => bail!("trace cancelled"),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        on_complete(total);
        Ok(())
    }

    /// Samples around the baseline with bounded jitter
    fn jittered_rtt(&self, base: f64) -> Vec<f64> {
        let jitter = (base * RTT_JITTER).max(MIN_JITTER_MS);
        let mut rng = self.rng.lock();
        (0..SAMPLES_PER_HOP)
            .map(|_| base + rng.gen_range(-jitter..=jitter))
            .collect()
    }
}

/// Route chosen from a substring match on the lower-cased target
pub(crate) fn select_route(target: &str) -> RouteTemplate {
    let target = target.to_lowercase();
    if target.contains("london") || target.contains(".uk") {
        nyc_to_london()
    } else {
        sf_to_tokyo()
    }
}

fn sf_to_tokyo() -> RouteTemplate {
    let sf = GeoLocation::place(37.7749, -122.4194, "San Francisco", "United States", "US");
    let san_jose = GeoLocation::place(37.3382, -121.8863, "San Jose", "United States", "US");
    let los_angeles = GeoLocation::place(34.0522, -118.2437, "Los Angeles", "United States", "US");
    let honolulu = GeoLocation::place(21.3069, -157.8583, "Honolulu", "United States", "US");
    let tokyo = GeoLocation::place(35.6762, 139.6503, "Tokyo", "Japan", "JP");

    RouteTemplate {
        name: "SF to Tokyo",
        source: GeoLocation {
            region: Some("California".to_string()),
            ..sf.clone()
        },
        destination: tokyo.clone(),
        hops: vec![
            HopTemplate {
                ip_address: "192.168.1.1",
                hostname: "router.local",
                location: sf.clone(),
                base_rtt: 1.0,
            },
            HopTemplate {
                ip_address: "67.59.231.1",
                hostname: "gw.sfca.comcast.net",
                location: sf,
                base_rtt: 5.0,
            },
            HopTemplate {
                ip_address: "4.68.127.73",
                hostname: "ae-2.r21.snjsca04.us.bb.gin.ntt.net",
                location: san_jose.clone(),
                base_rtt: 8.0,
            },
            HopTemplate {
                ip_address: "129.250.2.138",
                hostname: "ae-5.r24.snjsca04.us.bb.gin.ntt.net",
                location: san_jose,
                base_rtt: 10.0,
            },
            HopTemplate {
                ip_address: "129.250.3.172",
                hostname: "ae-1.r25.lsanca07.us.bb.gin.ntt.net",
                location: los_angeles.clone(),
                base_rtt: 20.0,
            },
            HopTemplate {
                ip_address: "129.250.6.98",
                hostname: "ae-3.r02.lsanca07.us.bb.gin.ntt.net",
                location: los_angeles,
                base_rtt: 25.0,
            },
            HopTemplate {
                ip_address: "129.250.2.129",
                hostname: "ae-0.r30.osakjp02.jp.bb.gin.ntt.net",
                location: honolulu,
                base_rtt: 65.0,
            },
            HopTemplate {
                ip_address: "129.250.4.14",
                hostname: "ae-1.r02.tokyjp05.jp.bb.gin.ntt.net",
                location: tokyo.clone(),
                base_rtt: 110.0,
            },
            HopTemplate {
                ip_address: "61.213.162.85",
                hostname: "ae-1.a02.tokyjp05.jp.ra.gin.ntt.net",
                location: tokyo.clone(),
                base_rtt: 115.0,
            },
            HopTemplate {
                ip_address: "210.152.135.178",
                hostname: "tokyo.jp",
                location: tokyo,
                base_rtt: 120.0,
            },
        ],
    }
}

fn nyc_to_london() -> RouteTemplate {
    let nyc = GeoLocation::place(40.7128, -74.0060, "New York", "United States", "US");
    let stamford = GeoLocation::place(41.0534, -73.5387, "Stamford", "United States", "US");
    let london = GeoLocation::place(51.5074, -0.1278, "London", "United Kingdom", "GB");

    RouteTemplate {
        name: "NYC to London",
        source: GeoLocation {
            region: Some("New York".to_string()),
            ..nyc.clone()
        },
        destination: london.clone(),
        hops: vec![
            HopTemplate {
                ip_address: "192.168.1.1",
                hostname: "router.local",
                location: nyc.clone(),
                base_rtt: 1.0,
            },
            HopTemplate {
                ip_address: "68.85.103.109",
                hostname: "gw.nyc.verizon.net",
                location: nyc.clone(),
                base_rtt: 5.0,
            },
            HopTemplate {
                ip_address: "154.54.30.185",
                hostname: "ae-6.r21.nycmny01.us.bb.gin.ntt.net",
                location: nyc,
                base_rtt: 8.0,
            },
            HopTemplate {
                ip_address: "154.54.42.97",
                hostname: "ae-2.r24.stfrct01.us.bb.gin.ntt.net",
                location: stamford,
                base_rtt: 12.0,
            },
            HopTemplate {
                ip_address: "154.54.58.185",
                hostname: "ae-3.r20.londen12.uk.bb.gin.ntt.net",
                location: london.clone(),
                base_rtt: 70.0,
            },
            HopTemplate {
                ip_address: "130.117.1.78",
                hostname: "ae-1.r02.londen12.uk.bb.gin.ntt.net",
                location: london.clone(),
                base_rtt: 72.0,
            },
            HopTemplate {
                ip_address: "185.50.220.4",
                hostname: "london.uk",
                location: london,
                base_rtt: 75.0,
            },
        ],
    }
}
