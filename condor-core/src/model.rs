//! Telemetry data model
//!
//! Defines the field representation shared by the codec and the conversion
//! engine, the static field classifier, and the settings types the relay is
//! driven by.

use crate::units::*;
use serde::{Deserialize, Serialize};

/// One `name=value` token of a telemetry datagram.
///
/// Names and values are kept as the raw bytes that arrived so that any
/// payload, valid UTF-8 or not, can be written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryField {
    /// Field name (case-sensitive)
    pub name: Vec<u8>,

    /// Value exactly as it appeared on the wire
    pub raw_value: Vec<u8>,

    /// Token had no `=`; `name` holds the whole token and it is written back verbatim
    pub bare: bool,
}

impl TelemetryField {
    pub fn new(name: impl Into<Vec<u8>>, raw_value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            raw_value: raw_value.into(),
            bare: false,
        }
    }

    /// A token without `=`, retained as-is
    pub fn bare(token: impl Into<Vec<u8>>) -> Self {
        Self {
            name: token.into(),
            raw_value: Vec::new(),
            bare: true,
        }
    }

    /// Name as text, `None` if it is not UTF-8
    pub fn name_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.name).ok()
    }

    /// Value as text, `None` if it is not UTF-8
    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.raw_value).ok()
    }

    /// Conversion category of this field
    pub fn category(&self) -> FieldCategory {
        match self.name_str() {
            Some(name) if !self.bare => classify(name),
            _ => FieldCategory::Unconverted,
        }
    }

    /// Same field carrying a different value
    pub fn with_value(&self, raw_value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: self.name.clone(),
            raw_value: raw_value.into(),
            bare: self.bare,
        }
    }
}

// === Field Classification ===

/// Conversion family a telemetry field belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldCategory {
    Altitude,
    Speed,
    Vario,
    Acceleration,
    /// Not a known quantity; never altered
    Unconverted,
}

impl FieldCategory {
    /// The four categories that carry a unit
    pub const CONVERTIBLE: [FieldCategory; 4] = [
        FieldCategory::Altitude,
        FieldCategory::Speed,
        FieldCategory::Vario,
        FieldCategory::Acceleration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldCategory::Altitude => "altitude",
            FieldCategory::Speed => "speed",
            FieldCategory::Vario => "vario",
            FieldCategory::Acceleration => "acceleration",
            FieldCategory::Unconverted => "unconverted",
        }
    }
}

impl std::fmt::Display for FieldCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every field name the relay knows how to convert
pub const CONVERTIBLE_FIELDS: [(&str, FieldCategory); 13] = [
    ("altitude", FieldCategory::Altitude),
    ("height", FieldCategory::Altitude),
    ("wheelheight", FieldCategory::Altitude),
    ("airspeed", FieldCategory::Speed),
    ("vx", FieldCategory::Speed),
    ("vy", FieldCategory::Speed),
    ("vz", FieldCategory::Speed),
    ("vario", FieldCategory::Vario),
    ("evario", FieldCategory::Vario),
    ("nettovario", FieldCategory::Vario),
    ("ax", FieldCategory::Acceleration),
    ("ay", FieldCategory::Acceleration),
    ("az", FieldCategory::Acceleration),
];

/// Map a Condor field name to its conversion category
pub fn classify(name: &str) -> FieldCategory {
    match name {
        "altitude" | "height" | "wheelheight" => FieldCategory::Altitude,
        "airspeed" | "vx" | "vy" | "vz" => FieldCategory::Speed,
        "vario" | "evario" | "nettovario" => FieldCategory::Vario,
        "ax" | "ay" | "az" => FieldCategory::Acceleration,
        _ => FieldCategory::Unconverted,
    }
}

// === Settings ===

/// User-selected target units, one per category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionSettings {
    /// Master switch; when off every datagram passes through untouched
    pub enabled: bool,
    pub altitude: AltitudeUnit,
    pub speed: SpeedUnit,
    pub vario: VarioUnit,
    pub acceleration: AccelerationUnit,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            altitude: AltitudeUnit::default(),
            speed: SpeedUnit::default(),
            vario: VarioUnit::default(),
            acceleration: AccelerationUnit::default(),
        }
    }
}

impl ConversionSettings {
    /// Settings that leave every field untouched
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Selected unit for `category`, or `None` for unconverted fields
    pub fn target_for(&self, category: FieldCategory) -> Option<UnitSpec> {
        match category {
            FieldCategory::Altitude => Some(UnitSpec::Altitude(self.altitude)),
            FieldCategory::Speed => Some(UnitSpec::Speed(self.speed)),
            FieldCategory::Vario => Some(UnitSpec::Vario(self.vario)),
            FieldCategory::Acceleration => Some(UnitSpec::Acceleration(self.acceleration)),
            FieldCategory::Unconverted => None,
        }
    }

    /// Unit a field of `category` must be converted to, if any
    ///
    /// `None` when conversions are off, the category is unconverted, or the
    /// selection is the simulator's native unit.
    pub fn active_target(&self, category: FieldCategory) -> Option<UnitSpec> {
        if !self.enabled {
            return None;
        }
        self.target_for(category).filter(|unit| !unit.is_source())
    }
}

/// Largest UDP payload the relay accepts
pub const MAX_DATAGRAM_SIZE: usize = 65535;

/// Socket configuration for one run of the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the inbound socket binds to (`0.0.0.0` for all interfaces)
    pub bind_host: String,

    /// UDP port Condor sends to
    pub input_port: u16,

    /// Destination host for converted datagrams
    pub output_host: String,

    /// Destination port for converted datagrams
    pub output_port: u16,

    /// Largest datagram accepted, in bytes (`1..=65535`); larger ones are dropped
    pub buffer_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            input_port: 55278,
            output_host: "127.0.0.1".to_string(),
            output_port: 55300,
            buffer_size: MAX_DATAGRAM_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_fields() {
        assert_eq!(classify("altitude"), FieldCategory::Altitude);
        assert_eq!(classify("wheelheight"), FieldCategory::Altitude);
        assert_eq!(classify("vz"), FieldCategory::Speed);
        assert_eq!(classify("nettovario"), FieldCategory::Vario);
        assert_eq!(classify("az"), FieldCategory::Acceleration);
    }

    #[test]
    fn test_classify_is_case_sensitive() {
        assert_eq!(classify("Altitude"), FieldCategory::Unconverted);
        assert_eq!(classify("AIRSPEED"), FieldCategory::Unconverted);
    }

    #[test]
    fn test_classify_unknown_fields() {
        assert_eq!(classify("time"), FieldCategory::Unconverted);
        assert_eq!(classify(""), FieldCategory::Unconverted);
        assert_eq!(classify("altitude "), FieldCategory::Unconverted);
    }

    #[test]
    fn test_convertible_table_matches_classifier() {
        for (name, category) in CONVERTIBLE_FIELDS {
            assert_eq!(classify(name), category, "{name}");
        }
    }

    #[test]
    fn test_bare_field_is_never_convertible() {
        let field = TelemetryField::bare("altitude");
        assert_eq!(field.category(), FieldCategory::Unconverted);
    }

    #[test]
    fn test_non_utf8_field_is_unconverted() {
        let field = TelemetryField::new(&b"alti\xfftude"[..], "1");
        assert_eq!(field.name_str(), None);
        assert_eq!(field.category(), FieldCategory::Unconverted);

        let field = TelemetryField::new("altitude", &b"1\xb0"[..]);
        assert_eq!(field.category(), FieldCategory::Altitude);
        assert_eq!(field.value_str(), None);
    }

    #[test]
    fn test_default_settings_are_identity() {
        let settings = ConversionSettings::default();
        assert!(settings.enabled);
        for category in FieldCategory::CONVERTIBLE {
            assert!(settings.active_target(category).is_none());
        }
    }

    #[test]
    fn test_disabled_settings_ignore_selection() {
        let settings = ConversionSettings {
            enabled: false,
            altitude: AltitudeUnit::Feet,
            ..ConversionSettings::default()
        };
        assert_eq!(
            settings.target_for(FieldCategory::Altitude),
            Some(UnitSpec::Altitude(AltitudeUnit::Feet))
        );
        assert!(settings.active_target(FieldCategory::Altitude).is_none());
    }

    #[test]
    fn test_settings_partial_json_uses_defaults() {
        let settings: ConversionSettings =
            serde_json::from_str(r#"{"speed": "knots"}"#).unwrap();
        assert!(settings.enabled);
        assert_eq!(settings.speed, SpeedUnit::Knots);
        assert_eq!(settings.altitude, AltitudeUnit::Meters);
    }

    #[test]
    fn test_network_config_defaults() {
        let config = NetworkConfig::default();
        assert_eq!(config.input_port, 55278);
        assert_eq!(config.output_host, "127.0.0.1");
        assert_eq!(config.output_port, 55300);
    }
}
