//! Link message protocol definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tactical_core::GeoPoint;
use uuid::Uuid;

use crate::error::{LinkError, LinkResult};

/// Message payloads carried over the link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LinkPayload {
    /// Position location information broadcast
    PositionReport(PositionReportData),
    /// Emergency beacon raised or cleared
    EmergencyBeacon(EmergencyBeaconData),
}

impl LinkPayload {
    /// Short label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            LinkPayload::PositionReport(_) => "pli",
            LinkPayload::EmergencyBeacon(_) => "emergency",
        }
    }
}

/// Position report data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionReportData {
    pub position: GeoPoint,
    /// Horizontal accuracy in meters
    pub accuracy: f32,
    pub fix_time: DateTime<Utc>,
}

/// Emergency beacon data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyBeaconData {
    pub active: bool,
    pub position: Option<GeoPoint>,
    pub message: String,
}

/// Complete link message envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkMessage {
    /// Unique message ID
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Sender callsign
    pub sender: String,
    pub payload: LinkPayload,
}

impl LinkMessage {
    pub fn new(sender: impl Into<String>, payload: LinkPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            sender: sender.into(),
            payload,
        }
    }

    pub fn position_report(
        sender: impl Into<String>,
        position: GeoPoint,
        accuracy: f32,
        fix_time: DateTime<Utc>,
    ) -> Self {
        Self::new(
            sender,
            LinkPayload::PositionReport(PositionReportData {
                position,
                accuracy,
                fix_time,
            }),
        )
    }

    pub fn emergency_beacon(
        sender: impl Into<String>,
        active: bool,
        position: Option<GeoPoint>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(
            sender,
            LinkPayload::EmergencyBeacon(EmergencyBeaconData {
                active,
                position,
                message: message.into(),
            }),
        )
    }

    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }

    /// Serialize to a compact binary frame
    pub fn to_bytes(&self) -> LinkResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| LinkError::serialization(e))
    }

    pub fn from_bytes(bytes: &[u8]) -> LinkResult<Self> {
        bincode::deserialize(bytes).map_err(|e| LinkError::serialization(e))
    }

    pub fn to_json(&self) -> LinkResult<String> {
        serde_json::to_string(self).map_err(|e| LinkError::serialization(e))
    }

    pub fn from_json(json: &str) -> LinkResult<Self> {
        serde_json::from_str(json).map_err(|e| LinkError::serialization(e))
    }
}
