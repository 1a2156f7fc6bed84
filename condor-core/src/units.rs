//! Unit conversion table
//!
//! Condor reports every physical quantity in its native metric unit. This
//! module enumerates the target units a user may pick for each conversion
//! category and converts a native value into them.
//!
//! Serialized unit names match the spelling used in configuration files.

use crate::model::FieldCategory;
use serde::{Deserialize, Serialize};

/// Meters to feet (altitude, acceleration)
pub const METERS_TO_FEET: f64 = 3.28084;

/// Meters per second to kilometers per hour
pub const MPS_TO_KMH: f64 = 3.6;

/// Meters per second to knots
pub const MPS_TO_KNOTS: f64 = 1.94384;

/// Meters per second to feet per minute
pub const MPS_TO_FPM: f64 = 196.85;

/// Altitude units. Native: meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AltitudeUnit {
    #[default]
    Meters,
    Feet,
}

/// Speed units. Native: meters per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SpeedUnit {
    #[default]
    #[serde(rename = "mps")]
    MetersPerSecond,
    #[serde(rename = "kmh")]
    KilometersPerHour,
    #[serde(rename = "knots")]
    Knots,
}

/// Vertical speed units. Native: meters per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VarioUnit {
    #[default]
    #[serde(rename = "mps")]
    MetersPerSecond,
    #[serde(rename = "fpm")]
    FeetPerMinute,
}

/// Acceleration units. Native: meters per second squared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AccelerationUnit {
    #[default]
    #[serde(rename = "mps2")]
    MetersPerSecondSquared,
    #[serde(rename = "fps2")]
    FeetPerSecondSquared,
}

/// A concrete unit together with the category it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitSpec {
    Altitude(AltitudeUnit),
    Speed(SpeedUnit),
    Vario(VarioUnit),
    Acceleration(AccelerationUnit),
}

impl UnitSpec {
    /// Category this unit measures
    pub fn category(&self) -> FieldCategory {
        match self {
            UnitSpec::Altitude(_) => FieldCategory::Altitude,
            UnitSpec::Speed(_) => FieldCategory::Speed,
            UnitSpec::Vario(_) => FieldCategory::Vario,
            UnitSpec::Acceleration(_) => FieldCategory::Acceleration,
        }
    }

    /// Whether this is the simulator's native unit for its category
    pub fn is_source(&self) -> bool {
        self.factor().is_none()
    }

    /// Multiplier from the native unit, or `None` for the native unit itself
    pub fn factor(&self) -> Option<f64> {
        match self {
            UnitSpec::Altitude(AltitudeUnit::Meters) => None,
            UnitSpec::Altitude(AltitudeUnit::Feet) => Some(METERS_TO_FEET),
            UnitSpec::Speed(SpeedUnit::MetersPerSecond) => None,
            UnitSpec::Speed(SpeedUnit::KilometersPerHour) => Some(MPS_TO_KMH),
            UnitSpec::Speed(SpeedUnit::Knots) => Some(MPS_TO_KNOTS),
            UnitSpec::Vario(VarioUnit::MetersPerSecond) => None,
            UnitSpec::Vario(VarioUnit::FeetPerMinute) => Some(MPS_TO_FPM),
            UnitSpec::Acceleration(AccelerationUnit::MetersPerSecondSquared) => None,
            UnitSpec::Acceleration(AccelerationUnit::FeetPerSecondSquared) => {
                Some(METERS_TO_FEET)
            }
        }
    }

    /// Short display symbol, used in log output
    pub fn symbol(&self) -> &'static str {
        match self {
            UnitSpec::Altitude(AltitudeUnit::Meters) => "m",
            UnitSpec::Altitude(AltitudeUnit::Feet) => "ft",
            UnitSpec::Speed(SpeedUnit::MetersPerSecond) => "m/s",
            UnitSpec::Speed(SpeedUnit::KilometersPerHour) => "km/h",
            UnitSpec::Speed(SpeedUnit::Knots) => "kt",
            UnitSpec::Vario(VarioUnit::MetersPerSecond) => "m/s",
            UnitSpec::Vario(VarioUnit::FeetPerMinute) => "ft/min",
            UnitSpec::Acceleration(AccelerationUnit::MetersPerSecondSquared) => "m/s²",
            UnitSpec::Acceleration(AccelerationUnit::FeetPerSecondSquared) => "ft/s²",
        }
    }
}

/// Convert a value in the native unit of `target`'s category into `target`.
///
/// The native unit returns `value` untouched rather than multiplying by one.
pub fn convert(target: UnitSpec, value: f64) -> f64 {
    match target.factor() {
        Some(factor) => value * factor,
        None => value,
    }
}
