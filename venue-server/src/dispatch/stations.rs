//! Station configuration and liveness registry.
//!
//! Configuration (tags, expo flags, backups) is read-mostly and consulted
//! by the routing engine through the order service; liveness is written on
//! every station connect/disconnect and consulted only by the dispatcher's
//! failover check.

use std::collections::HashMap;

use dashmap::DashMap;
use parking_lot::RwLock;
use shared::Station;

#[derive(Debug, Clone, Copy)]
struct Presence {
    connected: u32,
    /// When the last subscriber for this station went away, epoch millis
    last_disconnect_ms: i64,
}

pub struct StationRegistry {
    stations: RwLock<HashMap<String, Station>>,
    presence: DashMap<String, Presence>,
    /// Stations that never connected count as dead since startup
    started_at_ms: i64,
}

impl StationRegistry {
    pub fn new(stations: Vec<Station>) -> Self {
        Self {
            stations: RwLock::new(
                stations
                    .into_iter()
                    .map(|s| (s.station_id.clone(), s))
                    .collect(),
            ),
            presence: DashMap::new(),
            started_at_ms: shared::now_millis(),
        }
    }

    pub fn all(&self) -> Vec<Station> {
        self.stations.read().values().cloned().collect()
    }

    pub fn get(&self, station_id: &str) -> Option<Station> {
        self.stations.read().get(station_id).cloned()
    }

    /// Add or replace a station's configuration.
    pub fn upsert(&self, station: Station) {
        self.stations
            .write()
            .insert(station.station_id.clone(), station);
    }

    pub fn mark_connected(&self, station_id: &str) {
        self.presence
            .entry(station_id.to_string())
            .and_modify(|p| p.connected += 1)
            .or_insert(Presence {
                connected: 1,
                last_disconnect_ms: 0,
            });
    }

    pub fn mark_disconnected(&self, station_id: &str) {
        let now = shared::now_millis();
        self.presence
            .entry(station_id.to_string())
            .and_modify(|p| {
                p.connected = p.connected.saturating_sub(1);
                if p.connected == 0 {
                    p.last_disconnect_ms = now;
                }
            });
    }

    pub fn is_live(&self, station_id: &str) -> bool {
        self.presence
            .get(station_id)
            .map(|p| p.connected > 0)
            .unwrap_or(false)
    }

    /// Whether this station has had no subscriber for longer than
    /// `timeout_ms` as of `now`.
    pub fn dead_longer_than(&self, station_id: &str, timeout_ms: u64, now: i64) -> bool {
        match self.presence.get(station_id) {
            Some(p) => p.connected == 0 && now - p.last_disconnect_ms >= timeout_ms as i64,
            // Never connected at all
            None => now - self.started_at_ms >= timeout_ms as i64,
        }
    }
}
