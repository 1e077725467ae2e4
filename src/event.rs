//! Trace event payloads
//!
//! The wire names (`trace:started`, `trace:hop`, ...) and camelCase field
//! names are stable; consumers key off them.

use chrono::Utc;
use serde::Serialize;

use crate::state::{GeoLocation, Hop};
use crate::trace::TraceSession;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum TraceEvent {
    /// A trace began
    #[serde(rename = "trace:started")]
    Started {
        session_id: String,
        target: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<GeoLocation>,
        timestamp: i64,
    },

    /// A hop was discovered
    #[serde(rename = "trace:hop")]
    Hop { session_id: String, hop: Hop },

    /// The trace ran to completion
    #[serde(rename = "trace:completed")]
    Completed {
        session_id: String,
        total_hops: usize,
        timestamp: i64,
    },

    /// The trace was cancelled before completion
    #[serde(rename = "trace:cancelled")]
    Cancelled { session_id: String, timestamp: i64 },

    /// The trace failed
    #[serde(rename = "trace:error")]
    Error {
        session_id: String,
        error: String,
        timestamp: i64,
    },
}

impl TraceEvent {
    pub fn started(session: &TraceSession) -> Self {
        Self::Started {
            session_id: session.id().to_string(),
            target: session.target().to_string(),
            source: session.source(),
            timestamp: now_millis(),
        }
    }

    pub fn hop(session_id: &str, hop: Hop) -> Self {
        Self::Hop {
            session_id: session_id.to_string(),
            hop,
        }
    }

    pub fn completed(session_id: &str, total_hops: usize) -> Self {
        Self::Completed {
            session_id: session_id.to_string(),
            total_hops,
            timestamp: now_millis(),
        }
    }

    pub fn cancelled(session_id: &str) -> Self {
        Self::Cancelled {
            session_id: session_id.to_string(),
            timestamp: now_millis(),
        }
    }

    pub fn error(session_id: &str, error: String) -> Self {
        Self::Error {
            session_id: session_id.to_string(),
            error,
            timestamp: now_millis(),
        }
    }
}

/// Epoch milliseconds
fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hop_event_wire_shape() {
        let event = TraceEvent::hop("abc", Hop::timeout(2));
        let json = serde_json::to_string(&event).unwrap();

        assert!(json.contains("\"event\":\"trace:hop\""));
        assert!(json.contains("\"sessionId\":\"abc\""));
        assert!(json.contains("\"hopNumber\":2"));
    }

    #[test]
    fn test_completed_event_wire_shape() {
        let event = TraceEvent::completed("abc", 7);
        let json = serde_json::to_string(&event).unwrap();

        assert!(json.contains("\"event\":\"trace:completed\""));
        assert!(json.contains("\"totalHops\":7"));
        assert!(json.contains("\"timestamp\":"));
    }

    #[test]
    fn test_error_and_cancelled_wire_shape() {
        let json = serde_json::to_string(&TraceEvent::error("abc", "boom".to_string())).unwrap();
        assert!(json.contains("\"event\":\"trace:error\""));
        assert!(json.contains("\"error\":\"boom\""));

        let json = serde_json::to_string(&TraceEvent::cancelled("abc")).unwrap();
        assert!(json.contains("\"event\":\"trace:cancelled\""));
    }

    #[test]
    fn test_started_event_omits_absent_source() {
        let session = TraceSession::new("google.com", None);
        let json = serde_json::to_string(&TraceEvent::started(&session)).unwrap();

        assert!(json.contains("\"event\":\"trace:started\""));
        assert!(json.contains("\"target\":\"google.com\""));
        assert!(!json.contains("\"source\""));
    }
}
