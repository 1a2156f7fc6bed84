//! Datagram codec
//!
//! Condor emits each telemetry snapshot as one UDP datagram of `key=value`
//! tokens joined by a separator and usually closed by a line ending. The
//! codec splits such a payload into an ordered field list, remembering the
//! exact separator and terminator bytes, so that writing the list back out
//! reproduces the input byte-for-byte unless a value was changed.
//!
//! Splitting works on bytes. A payload need not be UTF-8; only a convertible
//! field's value is ever interpreted as text.

use crate::error::ParseError;
use crate::model::{FieldCategory, TelemetryField};
use memchr::memmem;

/// Candidate field separators, in tie-break order for matches at the same offset
const SEPARATORS: [&str; 7] = ["\r\n", "\n", "\r", "\t", " ", ";", ","];

/// Line endings recognised as a datagram terminator
const TERMINATORS: [&str; 3] = ["\r\n", "\n", "\r"];

/// Condor's own line separator, used when a payload gives no hint
pub const DEFAULT_SEPARATOR: &str = "\r\n";

/// Significant digits used when rendering converted values
const SIGNIFICANT_DIGITS: usize = 15;

/// A decoded datagram: ordered fields plus the framing they arrived with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    fields: Vec<TelemetryField>,
    separator: &'static str,
    terminator: &'static str,
}

impl Datagram {
    /// Build a datagram in Condor's native framing (`\r\n` between and after fields)
    pub fn from_fields(fields: Vec<TelemetryField>) -> Self {
        Self {
            fields,
            separator: DEFAULT_SEPARATOR,
            terminator: DEFAULT_SEPARATOR,
        }
    }

    /// A datagram with the same framing as `self` but different fields
    pub fn with_fields(&self, fields: Vec<TelemetryField>) -> Self {
        Self {
            fields,
            separator: self.separator,
            terminator: self.terminator,
        }
    }

    pub fn fields(&self) -> &[TelemetryField] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<TelemetryField> {
        self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn separator(&self) -> &'static str {
        self.separator
    }

    pub fn terminator(&self) -> &'static str {
        self.terminator
    }

    /// First field called `name`
    pub fn get(&self, name: &str) -> Option<&TelemetryField> {
        self.fields
            .iter()
            .find(|f| !f.bare && f.name == name.as_bytes())
    }

    /// Raw field names in wire order
    pub fn names(&self) -> impl Iterator<Item = &[u8]> {
        self.fields.iter().map(|f| f.name.as_slice())
    }

    /// Names of fields the conversion engine knows about, in wire order
    pub fn convertible_names(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.category() != FieldCategory::Unconverted)
            .filter_map(|f| f.name_str())
            .collect()
    }
}

/// Split a raw payload into fields.
///
/// Only an empty payload is rejected. Tokens without `=` are kept as bare
/// fields, and empty tokens between adjacent separators are kept as well,
/// so nothing in the payload is lost.
pub fn decode(payload: &[u8]) -> Result<Datagram, ParseError> {
    if payload.is_empty() {
        return Err(ParseError::Empty);
    }

    let terminator = TERMINATORS
        .into_iter()
        .find(|end| payload.ends_with(end.as_bytes()))
        .unwrap_or("");
    let body = &payload[..payload.len() - terminator.len()];
    let separator = detect_separator(body);

    let fields = if body.is_empty() {
        Vec::new()
    } else {
        split_tokens(body, separator.as_bytes())
            .into_iter()
            .map(parse_token)
            .collect()
    };

    Ok(Datagram {
        fields,
        separator,
        terminator,
    })
}

/// Write fields back out with the datagram's separator and terminator
pub fn encode(datagram: &Datagram) -> Vec<u8> {
    let capacity = datagram
        .fields
        .iter()
        .map(|f| f.name.len() + f.raw_value.len() + 1 + datagram.separator.len())
        .sum::<usize>()
        + datagram.terminator.len();

    let mut out = Vec::with_capacity(capacity);
    for (i, field) in datagram.fields.iter().enumerate() {
        if i > 0 {
            out.extend_from_slice(datagram.separator.as_bytes());
        }
        out.extend_from_slice(&field.name);
        if !field.bare {
            out.push(b'=');
            out.extend_from_slice(&field.raw_value);
        }
    }
    out.extend_from_slice(datagram.terminator.as_bytes());
    out
}

fn detect_separator(body: &[u8]) -> &'static str {
    SEPARATORS
        .into_iter()
        .filter_map(|sep| memmem::find(body, sep.as_bytes()).map(|pos| (pos, sep)))
        .min_by_key(|&(pos, _)| pos)
        .map(|(_, sep)| sep)
        .unwrap_or(DEFAULT_SEPARATOR)
}

fn split_tokens<'a>(body: &'a [u8], separator: &[u8]) -> Vec<&'a [u8]> {
    let mut tokens = Vec::new();
    let mut start = 0;
    for pos in memmem::find_iter(body, separator) {
        tokens.push(&body[start..pos]);
        start = pos + separator.len();
    }
    tokens.push(&body[start..]);
    tokens
}

fn parse_token(token: &[u8]) -> TelemetryField {
    match memchr::memchr(b'=', token) {
        Some(eq) => TelemetryField::new(&token[..eq], &token[eq + 1..]),
        None => TelemetryField::bare(token),
    }
}

// === Numeric values ===

/// Parse a raw value as a finite number.
///
/// Empty, non-numeric and non-finite (`nan`, `inf`) text yields `None`: the
/// field is then not convertible and must be passed through as-is.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Render a converted value with up to 15 significant digits.
///
/// Matches C's `%.15g`: fixed notation for decimal exponents in `[-4, 15)`,
/// scientific otherwise, trailing zeros dropped. Fifteen digits hide the
/// binary noise of the multiplication (`1000 * 3.28084` prints as `3280.84`)
/// while keeping every digit Condor itself sends.
pub fn format_numeric(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let scientific = format!("{:.*e}", SIGNIFICANT_DIGITS - 1, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return scientific;
    };

    if exponent < -4 || exponent >= SIGNIFICANT_DIGITS as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            sign,
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (SIGNIFICANT_DIGITS as i32 - 1 - exponent) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_condor_line_format() {
        let dg = decode(b"time=17.0000042330833\r\nairspeed=30.5\r\naltitude=117.3\r\n").unwrap();
        assert_eq!(dg.separator(), "\r\n");
        assert_eq!(dg.terminator(), "\r\n");
        assert_eq!(dg.len(), 3);
        assert_eq!(dg.fields()[1], TelemetryField::new("airspeed", "30.5"));
    }

    #[test]
    fn test_decode_space_separated() {
        let dg = decode(b"altitude=1000.0 airspeed=30.5 vario=-2.1\r\n").unwrap();
        assert_eq!(dg.separator(), " ");
        assert_eq!(dg.terminator(), "\r\n");
        let names: Vec<&[u8]> = dg.names().collect();
        assert_eq!(names, [&b"altitude"[..], &b"airspeed"[..], &b"vario"[..]]);
    }

    #[test]
    fn test_decode_without_terminator() {
        let dg = decode(b"a=1\nb=2").unwrap();
        assert_eq!(dg.separator(), "\n");
        assert_eq!(dg.terminator(), "");
        assert_eq!(encode(&dg), b"a=1\nb=2");
    }

    #[test]
    fn test_decode_splits_on_first_equals_only() {
        let dg = decode(b"expr=a=b\r\n").unwrap();
        assert_eq!(dg.fields()[0], TelemetryField::new("expr", "a=b"));
        assert_eq!(encode(&dg), b"expr=a=b\r\n");
    }

    #[test]
    fn test_decode_keeps_token_without_equals() {
        let dg = decode(b"a=1\r\nGARBAGE\r\nb=2\r\n").unwrap();
        assert_eq!(dg.len(), 3);
        let bare = &dg.fields()[1];
        assert!(bare.bare);
        assert_eq!(bare.name, b"GARBAGE");
        assert!(bare.raw_value.is_empty());
        assert_eq!(encode(&dg), b"a=1\r\nGARBAGE\r\nb=2\r\n");
    }

    #[test]
    fn test_decode_keeps_empty_value_and_empty_tokens() {
        let payload = b"a=\n\nb=2\n";
        let dg = decode(payload).unwrap();
        assert_eq!(dg.len(), 3);
        assert_eq!(dg.fields()[0], TelemetryField::new("a", ""));
        assert_eq!(encode(&dg), payload);
    }

    #[test]
    fn test_decode_single_token() {
        let dg = decode(b"altitude=5").unwrap();
        assert_eq!(dg.len(), 1);
        assert_eq!(dg.separator(), DEFAULT_SEPARATOR);
        assert_eq!(encode(&dg), b"altitude=5");
    }

    #[test]
    fn test_decode_line_ending_only() {
        let dg = decode(b"\r\n").unwrap();
        assert!(dg.is_empty());
        assert_eq!(encode(&dg), b"\r\n");
    }

    #[test]
    fn test_decode_empty_payload_fails() {
        assert_eq!(decode(b""), Err(ParseError::Empty));
    }

    #[test]
    fn test_decode_keeps_non_utf8_bytes() {
        let payload = b"altitude=1000.0\r\nwaypoint=ABC\xb0\r\n\xff\xfe\r\n";
        let dg = decode(payload).unwrap();
        assert_eq!(dg.len(), 3);
        assert_eq!(dg.fields()[1], TelemetryField::new("waypoint", &b"ABC\xb0"[..]));
        assert!(dg.fields()[2].bare);
        assert_eq!(dg.get("altitude").and_then(|f| f.value_str()), Some("1000.0"));
        assert_eq!(encode(&dg), payload);
    }

    #[test]
    fn test_duplicate_names_keep_position() {
        let dg = decode(b"vx=1 time=2 vx=3\n").unwrap();
        assert_eq!(dg.get("vx").and_then(|f| f.value_str()), Some("1"));
        assert_eq!(encode(&dg), b"vx=1 time=2 vx=3\n");
    }

    #[test]
    fn test_convertible_names() {
        let dg = decode(b"time=1\r\naltitude=2\r\nvx=3\r\nfoo=4\r\n").unwrap();
        assert_eq!(dg.convertible_names(), ["altitude", "vx"]);
    }

    #[test]
    fn test_from_fields_uses_condor_framing() {
        let dg = Datagram::from_fields(vec![
            TelemetryField::new("a", "1"),
            TelemetryField::new("b", "2"),
        ]);
        assert_eq!(encode(&dg), b"a=1\r\nb=2\r\n");
    }

    #[test]
    fn test_parse_numeric() {
        assert_eq!(parse_numeric("-2.1"), Some(-2.1));
        assert_eq!(parse_numeric("1e-3"), Some(0.001));
        assert_eq!(parse_numeric("+5"), Some(5.0));
        assert_eq!(parse_numeric(".5"), Some(0.5));
        assert_eq!(parse_numeric(""), None);
        assert_eq!(parse_numeric("abc"), None);
        assert_eq!(parse_numeric(" 1.0"), None);
        assert_eq!(parse_numeric("nan"), None);
        assert_eq!(parse_numeric("inf"), None);
    }

    #[test]
    fn test_format_numeric_fixed() {
        assert_eq!(format_numeric(1000.0 * 3.28084), "3280.84");
        assert_eq!(format_numeric(30.5 * 1.94384), "59.28712");
        assert_eq!(format_numeric(-2.1 * 196.85), "-413.385");
        assert_eq!(format_numeric(117.328384399414 * 3.28084), "384.935656672973");
        assert_eq!(format_numeric(100.0), "100");
        assert_eq!(format_numeric(0.0001), "0.0001");
    }

    #[test]
    fn test_format_numeric_scientific() {
        assert_eq!(format_numeric(3.6e20), "3.6e+20");
        assert_eq!(format_numeric(5.4e-7), "5.4e-07");
        assert_eq!(format_numeric(-1.25e-5), "-1.25e-05");
    }

    #[test]
    fn test_format_numeric_zero() {
        assert_eq!(format_numeric(0.0), "0");
        assert_eq!(format_numeric(-0.0), "-0");
    }
}
