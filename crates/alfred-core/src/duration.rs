//! Go-style duration strings ("300ms", "-1.5h", "2h45m").
//!
//! Mock files carry action timeouts and date `.add(…)` offsets in this
//! format, so the parser accepts a signed sequence of `<number><unit>`
//! pairs with units `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`.

use crate::{Error, Result};

const NANOS_PER_US: f64 = 1_000.0;
const NANOS_PER_MS: f64 = 1_000_000.0;
const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Parse a duration string into a signed [`chrono::Duration`].
pub fn parse_duration(input: &str) -> Result<chrono::Duration> {
    let s = input.trim();
    if s.is_empty() {
        return Err(Error::bad_add_duration(format!(
            "empty duration string '{input}'"
        )));
    }

    let (negative, mut rest) = match s.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    if rest == "0" {
        return Ok(chrono::Duration::zero());
    }

    let mut total_nanos = 0.0_f64;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        if number_end == 0 || number_end == rest.len() {
            return Err(Error::bad_add_duration(format!(
                "'{input}' needs something like .add('10ms') or .add('-1h')"
            )));
        }
        let value: f64 = rest[..number_end].parse().map_err(|_| {
            Error::bad_add_duration(format!("bad number in duration '{input}'"))
        })?;
        rest = &rest[number_end..];

        // "ms" and "µs"/"us"/"ns" have to be tried before the bare units.
        let (unit_nanos, unit_len) = if rest.starts_with("ns") {
            (1.0, 2)
        } else if rest.starts_with("us") {
            (NANOS_PER_US, 2)
        } else if rest.starts_with("µs") {
            (NANOS_PER_US, "µ".len() + 1)
        } else if rest.starts_with("ms") {
            (NANOS_PER_MS, 2)
        } else if rest.starts_with('s') {
            (NANOS_PER_SEC, 1)
        } else if rest.starts_with('m') {
            (60.0 * NANOS_PER_SEC, 1)
        } else if rest.starts_with('h') {
            (3600.0 * NANOS_PER_SEC, 1)
        } else {
            return Err(Error::bad_add_duration(format!(
                "unknown unit in duration '{input}'"
            )));
        };
        total_nanos += value * unit_nanos;
        rest = &rest[unit_len..];
    }

    let mut nanos = total_nanos as i64;
    if negative {
        nanos = -nanos;
    }
    Ok(chrono::Duration::nanoseconds(nanos))
}

/// Parse a duration string into a non-negative [`std::time::Duration`],
/// suitable for timeouts and sleeps.
pub fn parse_std_duration(input: &str) -> Result<std::time::Duration> {
    let duration = parse_duration(input)?;
    duration.to_std().map_err(|_| {
        Error::bad_add_duration(format!("duration '{input}' must not be negative"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_units() {
        assert_eq!(parse_duration("10ms").unwrap(), chrono::Duration::milliseconds(10));
        assert_eq!(parse_duration("60s").unwrap(), chrono::Duration::seconds(60));
        assert_eq!(parse_duration("2h").unwrap(), chrono::Duration::hours(2));
        assert_eq!(parse_duration("500ns").unwrap(), chrono::Duration::nanoseconds(500));
        assert_eq!(parse_duration("3us").unwrap(), chrono::Duration::microseconds(3));
    }

    #[test]
    fn parses_compound_and_fractional() {
        assert_eq!(parse_duration("2h45m").unwrap(), chrono::Duration::minutes(165));
        assert_eq!(parse_duration("1.5h").unwrap(), chrono::Duration::minutes(90));
    }

    #[test]
    fn parses_signed() {
        assert_eq!(parse_duration("-1h").unwrap(), chrono::Duration::hours(-1));
        assert_eq!(parse_duration("+30s").unwrap(), chrono::Duration::seconds(30));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("ms").is_err());
        assert!(parse_duration("10w").is_err());
    }

    #[test]
    fn std_duration_rejects_negative() {
        assert!(parse_std_duration("-10ms").is_err());
        assert_eq!(
            parse_std_duration("250ms").unwrap(),
            std::time::Duration::from_millis(250)
        );
    }
}
