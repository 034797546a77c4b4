//! Textual durations for configuration files and command-line flags.
//!
//! Accepts unit-suffixed strings such as `3s`, `500ms`, `1m30s`, `1.5s`
//! (units: `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`) or a bare integer number
//! of seconds. Formatting always produces a string that parses back to
//! the same value.

use std::time::Duration;

const NANOS_PER_UNIT: &[(&str, u128)] = &[
    ("ns", 1),
    ("us", 1_000),
    ("µs", 1_000),
    ("ms", 1_000_000),
    ("s", 1_000_000_000),
    ("m", 60 * 1_000_000_000),
    ("h", 3600 * 1_000_000_000),
];

/// Error produced when a duration string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationError {
    input: String,
    reason: &'static str,
}

impl DurationError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

impl std::fmt::Display for DurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid duration '{}': {}", self.input, self.reason)
    }
}

impl std::error::Error for DurationError {}

/// Parse a duration string.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(DurationError::new(input, "empty string"));
    }

    // Bare integers are seconds
    if s.bytes().all(|b| b.is_ascii_digit()) {
        let secs: u64 = s
            .parse()
            .map_err(|_| DurationError::new(input, "value out of range"))?;
        return Ok(Duration::from_secs(secs));
    }

    let mut total: u128 = 0;
    let mut rest = s;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| DurationError::new(input, "missing unit"))?;
        if number_len == 0 {
            return Err(DurationError::new(input, "expected a number"));
        }
        let (number, tail) = rest.split_at(number_len);

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);

        let scale = NANOS_PER_UNIT
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, scale)| *scale)
            .ok_or_else(|| DurationError::new(input, "unknown unit"))?;

        total = total
            .checked_add(scaled_nanos(number, scale).ok_or_else(|| {
                DurationError::new(input, "malformed number")
            })?)
            .ok_or_else(|| DurationError::new(input, "value out of range"))?;
        rest = tail;
    }

    let secs = u64::try_from(total / 1_000_000_000)
        .map_err(|_| DurationError::new(input, "value out of range"))?;
    Ok(Duration::new(secs, (total % 1_000_000_000) as u32))
}

/// Convert `"<int>[.<frac>]"` in the given unit to nanoseconds.
fn scaled_nanos(number: &str, scale: u128) -> Option<u128> {
    let (whole, frac) = match number.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (number, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }

    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut nanos = whole.checked_mul(scale)?;

    if !frac.is_empty() {
        if frac.contains('.') || frac.len() > 18 {
            return None;
        }
        let digits: u128 = frac.parse().ok()?;
        let divisor = 10u128.pow(frac.len() as u32);
        nanos = nanos.checked_add(digits.checked_mul(scale)? / divisor)?;
    }

    Some(nanos)
}

/// Format a duration so that [`parse_duration`] returns the same value.
pub fn format_duration(duration: Duration) -> String {
    let subsec = duration.subsec_nanos();

    if subsec == 0 {
        let secs = duration.as_secs();
        if secs == 0 {
            return "0s".to_string();
        }
        let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
        let mut out = String::new();
        if h > 0 {
            out.push_str(&format!("{h}h"));
        }
        if m > 0 {
            out.push_str(&format!("{m}m"));
        }
        if s > 0 {
            out.push_str(&format!("{s}s"));
        }
        return out;
    }

    if subsec % 1_000_000 == 0 {
        format!("{}ms", duration.as_millis())
    } else if subsec % 1_000 == 0 {
        format!("{}us", duration.as_micros())
    } else {
        format!("{}ns", duration.as_nanos())
    }
}

/// Serde adapter for `Duration` fields stored as strings.
///
/// Integers are accepted on input and read as seconds.
pub mod duration_str {
    use super::{format_duration, parse_duration};
    use serde::de::{self, Deserializer, Visitor};
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(DurationVisitor)
    }

    struct DurationVisitor;

    impl<'de> Visitor<'de> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("a duration string like \"3s\" or an integer number of seconds")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Duration, E> {
            parse_duration(value).map_err(E::custom)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Duration, E> {
            Ok(Duration::from_secs(value))
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Duration, E> {
            u64::try_from(value)
                .map(Duration::from_secs)
                .map_err(|_| E::custom("duration must not be negative"))
        }
    }
}

/// Serde adapter for `Option<Duration>` fields stored as strings.
pub mod option_duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => super::duration_str::serialize(d, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Wrapper(#[serde(with = "super::duration_str")] Duration);

        Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|Wrapper(d)| d))
    }
}
