//! Bounded, time-pruned location history

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use tactical_core::LocationRecord;

/// Accepted fixes, oldest first
///
/// Entries older than `retention` relative to the newest fix are dropped on
/// every append; `capacity` bounds the length regardless of age.
#[derive(Debug, Clone)]
pub struct LocationHistory {
    records: VecDeque<LocationRecord>,
    retention: Duration,
    capacity: usize,
    newest: Option<DateTime<Utc>>,
}

impl LocationHistory {
    pub fn new(retention: Duration, capacity: usize) -> Self {
        Self {
            records: VecDeque::new(),
            retention,
            capacity: capacity.max(1),
            newest: None,
        }
    }

    pub fn push(&mut self, record: LocationRecord) {
        let newest = match self.newest {
            Some(ts) if ts > record.timestamp => ts,
            _ => record.timestamp,
        };
        self.newest = Some(newest);
        self.records.push_back(record);

        let cutoff = newest - self.retention;
        self.records.retain(|r| r.timestamp >= cutoff);

        while self.records.len() > self.capacity {
            self.records.pop_front();
        }
    }

    pub fn latest(&self) -> Option<&LocationRecord> {
        self.records.back()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_vec(&self) -> Vec<LocationRecord> {
        self.records.iter().cloned().collect()
    }
}

impl Default for LocationHistory {
    fn default() -> Self {
        Self::new(Duration::hours(24), 10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tactical_core::GeoPoint;

    fn fix_at(ts: DateTime<Utc>) -> LocationRecord {
        LocationRecord::new(GeoPoint::new(34.0, -118.0), 5.0, "gps").at(ts)
    }

    #[test]
    fn test_prunes_relative_to_newest_fix() {
        let mut history = LocationHistory::default();
        let now = Utc::now();

        history.push(fix_at(now - Duration::hours(30)));
        history.push(fix_at(now - Duration::hours(23)));
        assert_eq!(history.len(), 2);

        history.push(fix_at(now));
        assert_eq!(history.len(), 2);
        assert_eq!(history.latest().unwrap().timestamp, now);
    }

    #[test]
    fn test_late_fix_does_not_rewind_cutoff() {
        let mut history = LocationHistory::default();
        let now = Utc::now();

        history.push(fix_at(now));
        history.push(fix_at(now - Duration::hours(25)));

        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_capacity_bound() {
        let mut history = LocationHistory::new(Duration::hours(24), 3);
        let now = Utc::now();
        for i in 0..5 {
            history.push(fix_at(now + Duration::seconds(i)));
        }

        assert_eq!(history.len(), 3);
        assert_eq!(history.to_vec()[0].timestamp, now + Duration::seconds(2));
    }
}
