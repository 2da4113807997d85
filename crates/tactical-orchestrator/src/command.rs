//! Text command surface
//!
//! Parses short spoken-style commands ("nearest checkpoint", "route to
//! supply depot") and renders deterministic text responses. Responses never
//! carry wall-clock timestamps or generated ids so the same state always
//! yields the same text.

use serde::{Deserialize, Serialize};
use std::fmt;
use tactical_core::{BearingDistance, FeatureType, GeoPoint, TacticalFeature, compass_point};

use crate::{OrchestratorState, ServiceHandles, ServiceOrchestrator};

const UNKNOWN_COMMAND: &str = "Unknown command. Say 'help' for available commands.";
const NO_POSITION: &str = "Position not yet available";

const HELP_TEXT: &str = "Commands: location, emergency on|off, nearest <type>, \
waypoint <name>, route to <target>, threat, link connect|status|export, help";

/// A parsed command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Location,
    Emergency(bool),
    Nearest(FeatureType),
    Waypoint(String),
    RouteTo(String),
    Threat,
    LinkConnect,
    LinkStatus,
    LinkExport,
    Help,
    Unknown(String),
}

impl Command {
    /// Parse free text; anything unrecognized becomes [`Command::Unknown`]
    pub fn parse(input: &str) -> Command {
        let trimmed = input.trim();
        let lower = trimmed.to_lowercase();
        let words: Vec<&str> = lower.split_whitespace().collect();

        match words.as_slice() {
            ["location"] | ["position"] | ["where", "am", "i"] => Command::Location,
            ["emergency"] | ["emergency", "on"] => Command::Emergency(true),
            ["emergency", "off"] => Command::Emergency(false),
            ["nearest", rest @ ..] if !rest.is_empty() => match rest.join(" ").parse() {
                Ok(feature_type) => Command::Nearest(feature_type),
                Err(_) => Command::Unknown(trimmed.to_string()),
            },
            ["waypoint", rest @ ..] | ["mark", "waypoint", rest @ ..] if !rest.is_empty() => {
                Command::Waypoint(original_tail(trimmed, words.len() - rest.len()))
            }
            ["route", "to", rest @ ..] if !rest.is_empty() => {
                Command::RouteTo(original_tail(trimmed, 2))
            }
            ["threat"] | ["threat", "assessment"] => Command::Threat,
            ["link", "connect"] => Command::LinkConnect,
            ["link", "status"] | ["link"] => Command::LinkStatus,
            ["link", "export"] | ["export"] => Command::LinkExport,
            ["help"] => Command::Help,
            _ => Command::Unknown(trimmed.to_string()),
        }
    }

    /// Short name used in responses and metrics
    pub fn name(&self) -> &'static str {
        match self {
            Command::Location => "location",
            Command::Emergency(_) => "emergency",
            Command::Nearest(_) => "nearest",
            Command::Waypoint(_) => "waypoint",
            Command::RouteTo(_) => "route",
            Command::Threat => "threat",
            Command::LinkConnect => "link_connect",
            Command::LinkStatus => "link_status",
            Command::LinkExport => "link_export",
            Command::Help => "help",
            Command::Unknown(_) => "unknown",
        }
    }
}

/// Words after the first `skip`, with the caller's original casing
fn original_tail(input: &str, skip: usize) -> String {
    input
        .split_whitespace()
        .skip(skip)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Result of executing a command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub command: String,
    pub success: bool,
    pub message: String,
}

impl CommandResponse {
    fn ok(command: &Command, message: impl Into<String>) -> Self {
        Self {
            command: command.name().to_string(),
            success: true,
            message: message.into(),
        }
    }

    fn fail(command: &Command, message: impl Into<String>) -> Self {
        Self {
            command: command.name().to_string(),
            success: false,
            message: message.into(),
        }
    }
}

impl fmt::Display for CommandResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

// ============================================================================
// FORMATTING
// ============================================================================

/// "850 m" below one kilometer, "1.25 km" above
pub fn format_distance(meters: f64) -> String {
    if meters < 1_000.0 {
        format!("{:.0} m", meters)
    } else {
        format!("{:.2} km", meters / 1_000.0)
    }
}

pub fn format_position(point: &GeoPoint) -> String {
    format!("{:.5}, {:.5}", point.latitude, point.longitude)
}

/// "1.11 km bearing 000° (N)"
pub fn format_bearing_distance(bd: &BearingDistance) -> String {
    // 359.6 rounds to 000, not 360
    let degrees = bd.bearing.round() % 360.0;
    format!(
        "{} bearing {:03.0}° ({})",
        format_distance(bd.distance),
        degrees,
        compass_point(bd.bearing)
    )
}

fn waypoint_id(name: &str) -> String {
    let slug: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("wp-{}", slug)
}

// ============================================================================
// ROUTER
// ============================================================================

/// Executes commands against the orchestrated services
#[derive(Clone)]
pub struct CommandRouter {
    orchestrator: ServiceOrchestrator,
}

impl CommandRouter {
    pub fn new(orchestrator: ServiceOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// Parse and execute free text
    pub async fn handle(&self, input: &str) -> CommandResponse {
        let command = Command::parse(input);
        tracing::debug!("Command {:?} from input {:?}", command, input);
        self.execute(command).await
    }

    pub async fn execute(&self, command: Command) -> CommandResponse {
        match &command {
            Command::Help => return CommandResponse::ok(&command, HELP_TEXT),
            Command::Unknown(_) => return CommandResponse::fail(&command, UNKNOWN_COMMAND),
            _ => {}
        }

        let services = match self.orchestrator.operational_services() {
            Ok(services) => services,
            Err(_) => {
                return CommandResponse::fail(
                    &command,
                    not_operational(self.orchestrator.state()),
                );
            }
        };

        match &command {
            Command::Location => self.location(&command, &services),
            Command::Emergency(active) => self.emergency(&command, *active).await,
            Command::Nearest(feature_type) => self.nearest(&command, &services, *feature_type),
            Command::Waypoint(name) => self.waypoint(&command, &services, name),
            Command::RouteTo(target) => self.route_to(&command, &services, target),
            Command::Threat => self.threat(&command, &services),
            Command::LinkConnect => self.link_connect(&command, &services).await,
            Command::LinkStatus => self.link_status(&command, &services),
            Command::LinkExport => self.link_export(&command, &services),
            Command::Help | Command::Unknown(_) => CommandResponse::fail(&command, UNKNOWN_COMMAND),
        }
    }

    fn position(services: &ServiceHandles) -> Option<GeoPoint> {
        services.tracker.current_position().map(|r| r.position)
    }

    fn location(&self, command: &Command, services: &ServiceHandles) -> CommandResponse {
        let Some(fix) = services.tracker.current_position() else {
            return CommandResponse::fail(command, NO_POSITION);
        };

        let mut message = format!(
            "Current position: {} (±{:.0} m)",
            format_position(&fix.position),
            fix.accuracy
        );
        if let Ok(grid) = services.link.grid_reference(fix.position) {
            message.push_str(&format!(", grid {}", grid));
        }
        CommandResponse::ok(command, message)
    }

    async fn emergency(&self, command: &Command, active: bool) -> CommandResponse {
        match self.orchestrator.set_emergency(active).await {
            Ok(()) if active => CommandResponse::ok(command, "Emergency mode activated"),
            Ok(()) => CommandResponse::ok(command, "Emergency mode deactivated"),
            Err(e) => CommandResponse::fail(command, format!("Emergency mode change failed: {}", e)),
        }
    }

    fn nearest(
        &self,
        command: &Command,
        services: &ServiceHandles,
        feature_type: FeatureType,
    ) -> CommandResponse {
        let Some(position) = Self::position(services) else {
            return CommandResponse::fail(command, NO_POSITION);
        };

        match services.geo.store().find_nearest(position, feature_type) {
            Ok(Some(feature)) => {
                let bd = BearingDistance::between(&position, &feature.position);
                match bd {
                    Ok(bd) => CommandResponse::ok(
                        command,
                        format!(
                            "Nearest {}: {}, {}",
                            feature_type.label(),
                            feature.name,
                            format_bearing_distance(&bd)
                        ),
                    ),
                    Err(e) => CommandResponse::fail(command, e.to_string()),
                }
            }
            Ok(None) => CommandResponse::fail(command, format!("No {} found", feature_type.label())),
            Err(e) => CommandResponse::fail(command, e.to_string()),
        }
    }

    fn waypoint(&self, command: &Command, services: &ServiceHandles, name: &str) -> CommandResponse {
        let Some(position) = Self::position(services) else {
            return CommandResponse::fail(command, NO_POSITION);
        };

        let feature = TacticalFeature::new(
            waypoint_id(name),
            FeatureType::Waypoint,
            name,
            position,
            "Marked by operator",
        );
        match services.geo.store().add_feature(feature) {
            Ok(()) => CommandResponse::ok(
                command,
                format!("Waypoint {} marked at {}", name, format_position(&position)),
            ),
            Err(e) => CommandResponse::fail(command, e.to_string()),
        }
    }

    fn route_to(&self, command: &Command, services: &ServiceHandles, target: &str) -> CommandResponse {
        let Some(position) = Self::position(services) else {
            return CommandResponse::fail(command, NO_POSITION);
        };
        let Some(feature) = services.geo.store().find_feature_by_name(target) else {
            return CommandResponse::fail(command, format!("Unknown destination: {}", target));
        };

        match services.geo.store().bearing_distance(position, feature.position) {
            Ok(bd) => CommandResponse::ok(
                command,
                format!("Route to {}: {}", feature.name, format_bearing_distance(&bd)),
            ),
            Err(e) => CommandResponse::fail(command, e.to_string()),
        }
    }

    fn threat(&self, command: &Command, services: &ServiceHandles) -> CommandResponse {
        let Some(position) = Self::position(services) else {
            return CommandResponse::fail(command, NO_POSITION);
        };

        match services.geo.assess(position) {
            Ok(assessment) => CommandResponse::ok(
                command,
                format!(
                    "Threat level {}: {} threats within {}, {} friendly support. {}",
                    assessment.level,
                    assessment.nearby_threats.len(),
                    format_distance(tactical_geo::THREAT_RADIUS_M),
                    assessment.friendly_support.len(),
                    assessment.recommendations.join("; ")
                ),
            ),
            Err(e) => CommandResponse::fail(command, e.to_string()),
        }
    }

    async fn link_connect(&self, command: &Command, services: &ServiceHandles) -> CommandResponse {
        match services.link.connect().await {
            Ok(()) => CommandResponse::ok(
                command,
                format!("Tactical link connected as {}", services.link.callsign()),
            ),
            Err(e) => CommandResponse::fail(command, format!("Link connect failed: {}", e)),
        }
    }

    fn link_status(&self, command: &Command, services: &ServiceHandles) -> CommandResponse {
        let status = services.link.status();
        CommandResponse::ok(
            command,
            format!(
                "Link {}, {} peers, {} messages sent",
                status.state, status.peer_count, status.stats.messages_sent
            ),
        )
    }

    fn link_export(&self, command: &Command, services: &ServiceHandles) -> CommandResponse {
        let snapshot = services.geo.export();
        CommandResponse::ok(
            command,
            format!(
                "Exported {} features, {} routes, {} control measures",
                snapshot.features.len(),
                snapshot.routes.len(),
                snapshot.control_measures.len()
            ),
        )
    }
}

fn not_operational(state: OrchestratorState) -> String {
    format!("Tactical services not operational ({})", state)
}

// ============================================================================
// TESTS
// ============================================================================
