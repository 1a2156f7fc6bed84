//! Conversion engine
//!
//! Applies the field classifier and unit table to a decoded datagram under
//! one settings snapshot.

use crate::codec::{format_numeric, parse_numeric, Datagram};
use crate::model::{ConversionSettings, FieldCategory};
use crate::units::convert;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;
use tracing::trace;

/// Conversions applied per category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub altitude: u64,
    pub speed: u64,
    pub vario: u64,
    pub acceleration: u64,
}

impl CategoryCounts {
    pub fn get(&self, category: FieldCategory) -> u64 {
        match category {
            FieldCategory::Altitude => self.altitude,
            FieldCategory::Speed => self.speed,
            FieldCategory::Vario => self.vario,
            FieldCategory::Acceleration => self.acceleration,
            FieldCategory::Unconverted => 0,
        }
    }

    fn bump(&mut self, category: FieldCategory) {
        match category {
            FieldCategory::Altitude => self.altitude += 1,
            FieldCategory::Speed => self.speed += 1,
            FieldCategory::Vario => self.vario += 1,
            FieldCategory::Acceleration => self.acceleration += 1,
            FieldCategory::Unconverted => {}
        }
    }

    pub fn total(&self) -> u64 {
        self.altitude + self.speed + self.vario + self.acceleration
    }
}

impl AddAssign for CategoryCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.altitude += rhs.altitude;
        self.speed += rhs.speed;
        self.vario += rhs.vario;
        self.acceleration += rhs.acceleration;
    }
}

/// What happened to one datagram's fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionReport {
    /// Fields looked at
    pub examined: u64,

    /// Fields whose value was rewritten
    pub converted: u64,

    /// Convertible fields left alone because the value was not a number
    pub skipped: u64,

    /// `converted`, split by category
    pub per_category: CategoryCounts,
}

/// Convert every applicable field of `datagram` under `settings`.
///
/// Fields that are unconverted, disabled, or already in the selected unit are
/// copied verbatim. A convertible field with a non-numeric value is copied
/// verbatim and counted as skipped; the rest of the datagram is still
/// processed. Field order and framing are preserved.
pub fn transform(
    datagram: &Datagram,
    settings: &ConversionSettings,
) -> (Datagram, ConversionReport) {
    let mut report = ConversionReport::default();

    let fields: Vec<_> = datagram
        .fields()
        .iter()
        .map(|field| {
            report.examined += 1;

            let category = field.category();
            let Some(target) = settings.active_target(category) else {
                return field.clone();
            };

            match field.value_str().and_then(parse_numeric) {
                Some(value) => {
                    let rendered = format_numeric(convert(target, value));
                    trace!(
                        field = %String::from_utf8_lossy(&field.name),
                        from = %String::from_utf8_lossy(&field.raw_value),
                        to = %rendered,
                        unit = target.symbol(),
                        "Converted field"
                    );
                    report.converted += 1;
                    report.per_category.bump(category);
                    field.with_value(rendered)
                }
                None => {
                    trace!(
                        field = %String::from_utf8_lossy(&field.name),
                        value = %String::from_utf8_lossy(&field.raw_value),
                        "Skipping non-numeric value"
                    );
                    report.skipped += 1;
                    field.clone()
                }
            }
        })
        .collect();

    (datagram.with_fields(fields), report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, encode};
    use crate::units::*;

    fn all_imperial() -> ConversionSettings {
        ConversionSettings {
            enabled: true,
            altitude: AltitudeUnit::Feet,
            speed: SpeedUnit::Knots,
            vario: VarioUnit::FeetPerMinute,
            acceleration: AccelerationUnit::FeetPerSecondSquared,
        }
    }

    fn run(payload: &[u8], settings: &ConversionSettings) -> (Vec<u8>, ConversionReport) {
        let dg = decode(payload).unwrap();
        let (out, report) = transform(&dg, settings);
        (encode(&out), report)
    }

    #[test]
    fn test_converts_each_category() {
        let (out, report) = run(
            b"altitude=1000.0\r\nairspeed=30.5\r\nvario=-2.1\r\naz=9.81\r\n",
            &all_imperial(),
        );
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "altitude=3280.84\r\nairspeed=59.28712\r\nvario=-413.385\r\naz=32.1850404\r\n"
        );
        assert_eq!(report.examined, 4);
        assert_eq!(report.converted, 4);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.per_category.total(), 4);
        assert_eq!(report.per_category.get(FieldCategory::Vario), 1);
    }

    #[test]
    fn test_disabled_is_byte_identical() {
        let payload = b"time=17.0000042330833\r\naltitude=117.328384399414\r\nvx=1\r\n";
        let settings = ConversionSettings {
            enabled: false,
            ..all_imperial()
        };
        let (out, report) = run(payload, &settings);
        assert_eq!(out, payload);
        assert_eq!(report.converted, 0);
        assert_eq!(report.examined, 3);
    }

    #[test]
    fn test_source_unit_selection_leaves_value_text() {
        // "1000.0" would render as "1000" if it went through the number formatter.
        let settings = ConversionSettings {
            altitude: AltitudeUnit::Meters,
            ..all_imperial()
        };
        let (out, report) = run(b"altitude=1000.0 vx=2\n", &settings);
        assert_eq!(out, b"altitude=1000.0 vx=3.88768\n");
        assert_eq!(report.converted, 1);
        assert_eq!(report.per_category.altitude, 0);
    }

    #[test]
    fn test_unconverted_fields_untouched() {
        let (out, _) = run(b"time=17.0000042330833 slipball=-0.00 altitude=1\n", &all_imperial());
        assert_eq!(out, b"time=17.0000042330833 slipball=-0.00 altitude=3.28084\n");
    }

    #[test]
    fn test_non_numeric_values_are_skipped() {
        let (out, report) = run(b"altitude=\r\nairspeed=fast\r\nvario=1\r\n", &all_imperial());
        assert_eq!(out, b"altitude=\r\nairspeed=fast\r\nvario=196.85\r\n");
        assert_eq!(report.skipped, 2);
        assert_eq!(report.converted, 1);
    }

    #[test]
    fn test_non_utf8_values_are_skipped() {
        let payload = b"altitude=1\xb0 vx=1 note=\xff\n";
        let (out, report) = run(payload, &all_imperial());
        assert_eq!(out, b"altitude=1\xb0 vx=1.94384 note=\xff\n");
        assert_eq!(report.skipped, 1);
        assert_eq!(report.converted, 1);
    }

    #[test]
    fn test_non_finite_values_are_skipped() {
        let (out, report) = run(b"altitude=nan vx=inf\n", &all_imperial());
        assert_eq!(out, b"altitude=nan vx=inf\n");
        assert_eq!(report.skipped, 2);
    }

    #[test]
    fn test_bare_token_named_like_a_field_is_untouched() {
        let (out, report) = run(b"altitude\r\nvx=1\r\n", &all_imperial());
        assert_eq!(out, b"altitude\r\nvx=1.94384\r\n");
        assert_eq!(report.skipped, 0);
        assert_eq!(report.converted, 1);
    }

    #[test]
    fn test_duplicate_fields_converted_independently() {
        let (out, report) = run(b"vx=1 vx=2\n", &all_imperial());
        assert_eq!(out, b"vx=1.94384 vx=3.88768\n");
        assert_eq!(report.per_category.speed, 2);
    }

    #[test]
    fn test_kmh_speed() {
        let settings = ConversionSettings {
            speed: SpeedUnit::KilometersPerHour,
            ..ConversionSettings::default()
        };
        let (out, _) = run(b"airspeed=30.5\n", &settings);
        assert_eq!(out, b"airspeed=109.8\n");
    }

    #[test]
    fn test_category_counts_add_assign() {
        let mut a = CategoryCounts {
            altitude: 1,
            speed: 2,
            vario: 0,
            acceleration: 0,
        };
        a += CategoryCounts {
            altitude: 1,
            speed: 0,
            vario: 3,
            acceleration: 4,
        };
        assert_eq!(a.total(), 11);
        assert_eq!(a.altitude, 2);
    }
}
