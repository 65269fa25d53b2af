//! Stations and routing manifests.
//!
//! A [`Station`] is a preparation or display endpoint (kitchen screen, bar
//! printer, expo pass) identified by its tag set. The [`RoutingManifest`] is
//! the per-send mapping of items to stations; it is regenerated on every
//! send and never persisted as its own entity.

use serde::{Deserialize, Serialize};

/// Read-only station configuration consulted at routing time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Station {
    pub station_id: String,
    pub name: String,
    /// Tags this station serves; any overlap with an item's resolved tags
    /// routes the item here
    pub tags: Vec<String>,
    /// Expo stations receive every item regardless of tag match
    #[serde(default)]
    pub is_expo: bool,
    /// Whether this station also lists items routed elsewhere, read-only,
    /// so staff see the whole ticket context
    #[serde(default)]
    pub show_reference_items: bool,
    /// Station to redirect to when this one is unreachable past the timeout.
    /// Consulted by the dispatcher at delivery time, never by the router.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_station_id: Option<String>,
    #[serde(default = "default_failover_timeout_ms")]
    pub failover_timeout_ms: u64,
}

fn default_failover_timeout_ms() -> u64 {
    30_000
}

impl Station {
    pub fn new(station_id: impl Into<String>, name: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            station_id: station_id.into(),
            name: name.into(),
            tags,
            is_expo: false,
            show_reference_items: false,
            backup_station_id: None,
            failover_timeout_ms: default_failover_timeout_ms(),
        }
    }

    pub fn serves_any(&self, tags: &[String]) -> bool {
        self.tags.iter().any(|t| tags.contains(t))
    }
}

/// The items one station receives for one send.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StationTicket {
    pub station_id: String,
    pub station_name: String,
    /// Items routed to this station for preparation
    pub item_ids: Vec<String>,
    /// Read-only context entries, present only on show_reference_items stations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_item_ids: Vec<String>,
}

/// Per-send mapping of items to stations, plus the items no station matched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RoutingManifest {
    pub order_id: String,
    pub tickets: Vec<StationTicket>,
    /// Items matching zero stations; surfaced as a configuration warning
    /// by the caller rather than silently dropped
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unrouted: Vec<String>,
}

impl RoutingManifest {
    /// True when the send flushed nothing (no tickets and nothing unrouted).
    pub fn is_empty(&self) -> bool {
        self.tickets.iter().all(|t| t.item_ids.is_empty()) && self.unrouted.is_empty()
    }

    pub fn ticket_for(&self, station_id: &str) -> Option<&StationTicket> {
        self.tickets.iter().find(|t| t.station_id == station_id)
    }
}
