//! Maneuver vocabulary.
//!
//! The directions service tags each step with a maneuver string. Tags are
//! mapped once through an explicit table; anything outside the documented
//! vocabulary becomes [`Maneuver::Straight`] so the lookup is total.

use serde::{Deserialize, Serialize};

/// Coarse maneuver category attached to a route step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(rename_all = "kebab-case")]
pub enum Maneuver {
    #[default]
    Straight,
    SlightLeft,
    Left,
    SharpLeft,
    SlightRight,
    Right,
    SharpRight,
    UTurn,
    Depart,
    Arrive,
}

impl Maneuver {
    /// Map a service maneuver tag to a category.
    ///
    /// Matching is case-insensitive and treats `-` as `_`, so both
    /// `TURN_RIGHT` and `turn-right` are recognized.
    pub fn from_tag(tag: &str) -> Self {
        let normalized = tag.trim().to_ascii_uppercase().replace('-', "_");

        match normalized.as_str() {
            "DEPART" => Maneuver::Depart,
            "ARRIVE" => Maneuver::Arrive,
            "STRAIGHT" | "CONTINUE" | "NAME_CHANGE" | "MERGE" => Maneuver::Straight,
            "TURN_SLIGHT_LEFT" | "RAMP_LEFT" | "FORK_LEFT" => Maneuver::SlightLeft,
            "TURN_LEFT" => Maneuver::Left,
            "TURN_SHARP_LEFT" => Maneuver::SharpLeft,
            "TURN_SLIGHT_RIGHT" | "RAMP_RIGHT" | "FORK_RIGHT" => Maneuver::SlightRight,
            "TURN_RIGHT" => Maneuver::Right,
            "TURN_SHARP_RIGHT" => Maneuver::SharpRight,
            "UTURN_LEFT" | "UTURN_RIGHT" | "UTURN" | "U_TURN" => Maneuver::UTurn,
            _ => Maneuver::Straight,
        }
    }

    /// Rotation of the direction arrow, in degrees clockwise.
    pub fn rotation_degrees(&self) -> f64 {
        match self {
            Maneuver::Straight | Maneuver::Depart | Maneuver::Arrive => 0.0,
            Maneuver::SlightRight => 30.0,
            Maneuver::Right => 90.0,
            Maneuver::SharpRight => 120.0,
            Maneuver::SlightLeft => -30.0,
            Maneuver::Left => -90.0,
            Maneuver::SharpLeft => -120.0,
            Maneuver::UTurn => 180.0,
        }
    }

    /// Short banner label for the maneuver.
    pub fn description(&self) -> &'static str {
        match self {
            Maneuver::Straight => "Continue",
            Maneuver::SlightLeft => "Keep slightly left",
            Maneuver::Left => "Turn left",
            Maneuver::SharpLeft => "Turn sharp left",
            Maneuver::SlightRight => "Keep slightly right",
            Maneuver::Right => "Turn right",
            Maneuver::SharpRight => "Turn sharp right",
            Maneuver::UTurn => "Make a U-turn",
            Maneuver::Depart => "Depart",
            Maneuver::Arrive => "Arrive at destination",
        }
    }
}

/// Arrow rotation for a raw service tag. Unrecognized tags rotate 0°.
pub fn maneuver_rotation(tag: &str) -> f64 {
    Maneuver::from_tag(tag).rotation_degrees()
}

/// Format a distance for the turn banner ("450 m", "1.2 km").
pub fn format_distance(meters: f64) -> String {
    if meters >= 1000.0 {
        format!("{:.1} km", meters / 1000.0)
    } else {
        format!("{} m", (meters.max(0.0) / 10.0).round() as i64 * 10)
    }
}
