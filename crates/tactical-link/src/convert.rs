//! Grid coordinate conversion strategies

use tactical_core::GeoPoint;

use crate::error::{LinkError, LinkResult};

/// Converts between lat/lon and a military grid system
pub trait CoordinateConverter: Send + Sync {
    /// Grid system name, e.g. "MGRS"
    fn system(&self) -> &'static str;

    fn to_grid(&self, point: GeoPoint) -> LinkResult<String>;

    fn from_grid(&self, grid: &str) -> LinkResult<GeoPoint>;
}

/// Stand-in until a real MGRS library is wired in; always unavailable
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderConverter;

impl CoordinateConverter for PlaceholderConverter {
    fn system(&self) -> &'static str {
        "MGRS"
    }

    fn to_grid(&self, _point: GeoPoint) -> LinkResult<String> {
        Err(LinkError::conversion_unavailable(self.system()))
    }

    fn from_grid(&self, _grid: &str) -> LinkResult<GeoPoint> {
        Err(LinkError::conversion_unavailable(self.system()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_explicitly_unavailable() {
        let converter = PlaceholderConverter;
        let err = converter.to_grid(GeoPoint::new(34.0, -118.0)).unwrap_err();

        assert!(matches!(err, LinkError::ConversionUnavailable { .. }));
        assert_eq!(err.to_string(), "MGRS conversion unavailable");
        assert!(converter.from_grid("11SLT8540").is_err());
    }
}
