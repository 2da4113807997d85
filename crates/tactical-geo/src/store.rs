//! In-memory spatial index for tactical entities

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tactical_core::{
    AreaOfOperations, BearingDistance, ControlMeasure, CoreError, CoreResult, Event, EventBus,
    FeatureType, FriendlyUnit, GeoPoint, MissionRoute, RouteType, TacticalFeature, Waypoint,
};
use tracing::{debug, info};

/// Stored value tagged with its first-insertion sequence number
#[derive(Debug, Clone)]
struct Indexed<T> {
    seq: u64,
    value: T,
}

/// Authoritative store for features, routes, friendly units and control measures
///
/// Reads are concurrent; writes are serialized per key by the map shards.
/// Replacing an entry keeps its original insertion order.
pub struct GeospatialStore {
    features: DashMap<String, Indexed<TacticalFeature>>,
    routes: DashMap<String, Indexed<MissionRoute>>,
    units: DashMap<String, Indexed<FriendlyUnit>>,
    control_measures: DashMap<String, Indexed<ControlMeasure>>,
    area: RwLock<Option<AreaOfOperations>>,
    sequence: AtomicU64,
    events: Option<EventBus>,
}

impl GeospatialStore {
    pub fn new() -> Self {
        Self {
            features: DashMap::new(),
            routes: DashMap::new(),
            units: DashMap::new(),
            control_measures: DashMap::new(),
            area: RwLock::new(None),
            sequence: AtomicU64::new(0),
            events: None,
        }
    }

    /// Publish AO and refresh events on the given bus
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    fn next_seq(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    fn upsert<T>(&self, map: &DashMap<String, Indexed<T>>, key: String, value: T) {
        match map.entry(key) {
            Entry::Occupied(mut entry) => {
                let seq = entry.get().seq;
                entry.insert(Indexed { seq, value });
            }
            Entry::Vacant(entry) => {
                entry.insert(Indexed {
                    seq: self.next_seq(),
                    value,
                });
            }
        }
    }

    fn ordered<T: Clone>(map: &DashMap<String, Indexed<T>>) -> Vec<T> {
        let mut entries: Vec<(u64, T)> = map
            .iter()
            .map(|r| (r.value().seq, r.value().value.clone()))
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, value)| value).collect()
    }

    // ========================================================================
    // AREA OF OPERATIONS
    // ========================================================================

    /// Replace the active AO. Radius is clamped; existing features are kept.
    pub fn set_area_of_operations(
        &self,
        center: GeoPoint,
        radius: f64,
    ) -> CoreResult<AreaOfOperations> {
        center.validate()?;
        let area = AreaOfOperations::new(center, radius);
        *self.area.write() = Some(area);

        info!(
            "Area of operations set: center={} radius={:.0}m",
            area.center, area.radius
        );
        self.refresh_area(area);

        Ok(area)
    }

    /// Refresh hook run after each AO change. Never drops stored data.
    fn refresh_area(&self, area: AreaOfOperations) {
        let inside = self
            .features
            .iter()
            .filter(|r| area.contains(&r.value().value.position))
            .count();
        debug!("{} of {} features inside AO", inside, self.features.len());

        if let Some(events) = &self.events {
            events.publish(Event::area_changed(area));
        }
    }

    pub fn area_of_operations(&self) -> Option<AreaOfOperations> {
        *self.area.read()
    }

    // ========================================================================
    // FEATURES
    // ========================================================================

    /// Insert or replace a feature by id
    pub fn add_feature(&self, feature: TacticalFeature) -> CoreResult<()> {
        feature.position.validate()?;
        debug!("Feature stored: {} ({})", feature.id, feature.feature_type);
        self.upsert(&self.features, feature.id.clone(), feature);
        Ok(())
    }

    pub fn feature(&self, id: &str) -> Option<TacticalFeature> {
        self.features.get(id).map(|r| r.value().value.clone())
    }

    /// All features in insertion order
    pub fn features(&self) -> Vec<TacticalFeature> {
        Self::ordered(&self.features)
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// Look up a feature by exact id, then by case-insensitive id or name
    pub fn find_feature_by_name(&self, query: &str) -> Option<TacticalFeature> {
        if let Some(feature) = self.feature(query) {
            return Some(feature);
        }

        let needle = query.trim().to_lowercase();
        self.features()
            .into_iter()
            .find(|f| f.id.to_lowercase() == needle || f.name.to_lowercase() == needle)
    }

    /// Features within `range` meters of `center`, optionally filtered by type
    ///
    /// An empty `types` slice matches every type. Results are sorted by
    /// distance, ties by insertion order.
    pub fn query_features(
        &self,
        center: GeoPoint,
        range: f64,
        types: &[FeatureType],
    ) -> CoreResult<Vec<TacticalFeature>> {
        center.validate()?;

        let mut matches: Vec<(f64, u64, TacticalFeature)> = self
            .features
            .iter()
            .filter_map(|r| {
                let indexed = r.value();
                let feature = &indexed.value;
                if !types.is_empty() && !types.contains(&feature.feature_type) {
                    return None;
                }
                let d = center.distance_to(&feature.position);
                (d <= range).then(|| (d, indexed.seq, feature.clone()))
            })
            .collect();

        matches.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        Ok(matches.into_iter().map(|(_, _, f)| f).collect())
    }

    /// Closest feature of the given type; ties go to the first inserted
    pub fn find_nearest(
        &self,
        position: GeoPoint,
        feature_type: FeatureType,
    ) -> CoreResult<Option<TacticalFeature>> {
        position.validate()?;

        let nearest = self
            .features
            .iter()
            .filter(|r| r.value().value.feature_type == feature_type)
            .map(|r| {
                let indexed = r.value();
                (
                    position.distance_to(&indexed.value.position),
                    indexed.seq,
                    indexed.value.clone(),
                )
            })
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        Ok(nearest.map(|(_, _, f)| f))
    }

    // ========================================================================
    // ROUTES
    // ========================================================================

    /// Create an immutable route; fails if the id is already taken
    pub fn create_route(
        &self,
        id: impl Into<String>,
        waypoints: Vec<Waypoint>,
        route_type: RouteType,
        description: Option<String>,
    ) -> CoreResult<MissionRoute> {
        let id = id.into();
        for waypoint in &waypoints {
            waypoint.position.validate()?;
        }

        match self.routes.entry(id.clone()) {
            Entry::Occupied(_) => Err(CoreError::duplicate_route(id)),
            Entry::Vacant(entry) => {
                let route = MissionRoute::new(id, waypoints, route_type, description);
                info!(
                    "Route created: {} ({}, {} waypoints, {:.0}m)",
                    route.id,
                    route.route_type,
                    route.waypoints.len(),
                    route.total_distance
                );
                entry.insert(Indexed {
                    seq: self.next_seq(),
                    value: route.clone(),
                });
                Ok(route)
            }
        }
    }

    pub fn route(&self, id: &str) -> Option<MissionRoute> {
        self.routes.get(id).map(|r| r.value().value.clone())
    }

    pub fn routes(&self) -> Vec<MissionRoute> {
        Self::ordered(&self.routes)
    }

    // ========================================================================
    // FRIENDLY UNITS & CONTROL MEASURES
    // ========================================================================

    /// Insert or replace a friendly unit by callsign
    pub fn upsert_friendly_unit(&self, unit: FriendlyUnit) -> CoreResult<()> {
        unit.position.validate()?;
        self.upsert(&self.units, unit.callsign.clone(), unit);
        Ok(())
    }

    pub fn friendly_unit(&self, callsign: &str) -> Option<FriendlyUnit> {
        self.units.get(callsign).map(|r| r.value().value.clone())
    }

    pub fn friendly_units(&self) -> Vec<FriendlyUnit> {
        Self::ordered(&self.units)
    }

    /// Insert or replace a control measure by id
    pub fn upsert_control_measure(&self, measure: ControlMeasure) -> CoreResult<()> {
        for point in &measure.coordinates {
            point.validate()?;
        }
        self.upsert(&self.control_measures, measure.id.clone(), measure);
        Ok(())
    }

    pub fn control_measures(&self) -> Vec<ControlMeasure> {
        Self::ordered(&self.control_measures)
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn bearing_distance(&self, from: GeoPoint, to: GeoPoint) -> CoreResult<BearingDistance> {
        BearingDistance::between(&from, &to)
    }
}

impl Default for GeospatialStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
