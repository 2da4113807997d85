//! Simulated peer table and link statistics

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tactical_core::GeoPoint;
use tracing::debug;

/// Last reported position of a peer on the link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerPosition {
    pub callsign: String,
    pub position: GeoPoint,
    pub last_seen: DateTime<Utc>,
}

/// Fixed (callsign, distance m, bearing deg) offsets of the simulated peers
pub const SIMULATED_PEERS: [(&str, f64, f64); 3] = [
    ("ALPHA-2", 300.0, 45.0),
    ("ALPHA-3", 450.0, 135.0),
    ("BRAVO-1", 800.0, 270.0),
];

/// Place the simulated peers around a local position
pub fn simulate_peers(center: GeoPoint) -> Vec<PeerPosition> {
    let now = Utc::now();
    SIMULATED_PEERS
        .iter()
        .map(|(callsign, distance, bearing)| PeerPosition {
            callsign: callsign.to_string(),
            position: center.destination(*distance, *bearing),
            last_seen: now,
        })
        .collect()
}

/// Link statistics
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LinkStats {
    pub messages_sent: u64,
    pub bytes_sent: u64,
    pub pli_sent: u64,
    pub beacons_sent: u64,
    pub transmit_failures: u64,
    pub peer_updates: u64,
}

/// Known peers keyed by callsign, plus traffic counters
#[derive(Clone, Default)]
pub struct PeerTable {
    peers: Arc<RwLock<HashMap<String, PeerPosition>>>,
    stats: Arc<RwLock<LinkStats>>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a peer
    pub fn upsert(&self, peer: PeerPosition) {
        debug!("Peer {} at {}", peer.callsign, peer.position);
        self.peers.write().insert(peer.callsign.clone(), peer);
        self.stats.write().peer_updates += 1;
    }

    pub fn get(&self, callsign: &str) -> Option<PeerPosition> {
        self.peers.read().get(callsign).cloned()
    }

    /// All peers sorted by callsign
    pub fn all(&self) -> Vec<PeerPosition> {
        let mut peers: Vec<PeerPosition> = self.peers.read().values().cloned().collect();
        peers.sort_by(|a, b| a.callsign.cmp(&b.callsign));
        peers
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }

    pub fn clear(&self) {
        self.peers.write().clear();
    }

    /// Record a delivered message of the given kind
    pub fn record_sent(&self, kind: &str, bytes: usize) {
        let mut stats = self.stats.write();
        stats.messages_sent += 1;
        stats.bytes_sent += bytes as u64;
        match kind {
            "pli" => stats.pli_sent += 1,
            "emergency" => stats.beacons_sent += 1,
            _ => {}
        }
    }

    pub fn record_failure(&self) {
        self.stats.write().transmit_failures += 1;
    }

    pub fn stats(&self) -> LinkStats {
        self.stats.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_peer_offsets() {
        let center = GeoPoint::new(34.0522, -118.2437);
        let peers = simulate_peers(center);

        assert_eq!(peers.len(), 3);
        for (peer, (callsign, distance, _)) in peers.iter().zip(SIMULATED_PEERS) {
            assert_eq!(peer.callsign, callsign);
            assert!((center.distance_to(&peer.position) - distance).abs() < 0.5);
        }
    }

    #[test]
    fn test_peer_management() {
        let table = PeerTable::new();
        for peer in simulate_peers(GeoPoint::new(0.0, 0.0)) {
            table.upsert(peer);
        }
        for peer in simulate_peers(GeoPoint::new(0.001, 0.0)) {
            table.upsert(peer);
        }

        assert_eq!(table.len(), 3);
        assert_eq!(table.all()[0].callsign, "ALPHA-2");
        assert!(table.get("BRAVO-1").is_some());

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.stats().peer_updates, 6);
    }

    #[test]
    fn test_statistics() {
        let table = PeerTable::new();

        table.record_sent("pli", 100);
        table.record_sent("emergency", 200);
        table.record_failure();

        let stats = table.stats();
        assert_eq!(stats.messages_sent, 2);
        assert_eq!(stats.bytes_sent, 300);
        assert_eq!(stats.pli_sent, 1);
        assert_eq!(stats.beacons_sent, 1);
        assert_eq!(stats.transmit_failures, 1);
    }
}
