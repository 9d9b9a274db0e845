//! Date helpers: `alfred.time.<ref>[.utc][.format('…')][.add('…')]`.
//!
//! The reference is either `now` or a `date(Y,M,D,h,m,s,ns)` literal in
//! local time. Format strings are chrono `strftime` layouts, with `unix`
//! producing integer seconds. A literal reference never changes per
//! request, so its value is pre-computed at sanitise time.

use chrono::{DateTime, FixedOffset, Local, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write;

use super::Helper;
use crate::duration::parse_duration;
use crate::{Error, Result};

pub const DATE_REF_NOW: &str = "now";
pub const DATE_REF_DATE: &str = "date";

pub(crate) const PARAM_DATE_REF: &str = "dateRef";
pub(crate) const PARAM_IS_UTC: &str = "isUTC";
pub(crate) const PARAM_FORMAT: &str = "format";
pub(crate) const PARAM_ADD_VALUE: &str = "addValue";

static REF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([^ .(]*)").expect("ref regex"));
static LITERAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"date\(([^)]*)\)").expect("date literal regex"));
static FORMAT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"format\('([^)]*)'\)").expect("format regex"));
static ADD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"add\('([^)]*)'\)").expect("add regex"));

pub(crate) fn sanitize_date_helper(mut helper: Helper) -> Result<Helper> {
    let date_ref = check_date_ref(&helper)?;
    helper.add_private_param(PARAM_DATE_REF, date_ref.clone());

    if helper.target.contains(".utc") {
        helper.add_private_param(PARAM_IS_UTC, "true");
    }

    helper.add_private_param(PARAM_FORMAT, time_format_from_target(&helper.target)?);
    helper.add_private_param(PARAM_ADD_VALUE, time_add_from_target(&helper.target)?);

    // A literal date is the same for every request.
    if date_ref == DATE_REF_DATE {
        helper.value = target_date_value(&helper)?;
    }

    Ok(helper)
}

fn check_date_ref(helper: &Helper) -> Result<String> {
    let reference = REF_RE
        .captures(&helper.target)
        .and_then(|caps| caps.get(1))
        .map_or("", |m| m.as_str());

    if reference == DATE_REF_NOW || reference == DATE_REF_DATE {
        return Ok(reference.to_string());
    }
    Err(Error::bad_date_format(format!(
        "alfred time helper reference '{}' unknown",
        helper.target
    )))
}

fn time_format_from_target(target: &str) -> Result<String> {
    if !target.contains("format") {
        return Ok(String::new());
    }
    FORMAT_RE
        .captures(target)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            Error::bad_date_format(format!(
                "bad format '{target}', need something like .format('unix') or .format('%Y-%m-%dT%H:%M:%S')"
            ))
        })
}

fn time_add_from_target(target: &str) -> Result<String> {
    if !target.contains("add") {
        return Ok(String::new());
    }
    let add = ADD_RE
        .captures(target)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .ok_or_else(|| {
            Error::bad_add_duration(format!(
                "bad add '{target}', need something like .add('10ms') or .add('-1h')"
            ))
        })?;

    parse_duration(&add)?;
    Ok(add)
}

fn build_date_from_target(target: &str) -> Result<DateTime<Local>> {
    let inner = LITERAL_RE
        .captures(target)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| {
            Error::bad_date_format(format!(
                "bad date format '{target}', need something like date(2009,01,03,4,2,0,0)"
            ))
        })?;

    let parts: Vec<i64> = inner
        .split(',')
        .map(|part| part.trim().parse::<i64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| Error::bad_date_format(format!("bad date argument in '{target}': {e}")))?;
    if parts.len() < 7 {
        return Err(Error::bad_date_format(format!(
            "bad date argument count in '{target}', need something like date(2009,01,03,4,2,0,0)"
        )));
    }

    let date = Local
        .with_ymd_and_hms(
            parts[0] as i32,
            parts[1] as u32,
            parts[2] as u32,
            parts[3] as u32,
            parts[4] as u32,
            parts[5] as u32,
        )
        .single()
        .ok_or_else(|| Error::bad_date_format(format!("'{target}' is not a valid date")))?;
    Ok(date + chrono::Duration::nanoseconds(parts[6]))
}

/// Compute the string value of a date helper. Called on each request for
/// `now` references; the target itself was validated at load time.
pub fn target_date_value(helper: &Helper) -> Result<String> {
    let mut date: DateTime<FixedOffset> =
        if helper.private_param(PARAM_DATE_REF) == DATE_REF_NOW {
            Local::now().fixed_offset()
        } else {
            build_date_from_target(&helper.target)?.fixed_offset()
        };

    if !helper.private_param(PARAM_IS_UTC).is_empty() {
        date = date.with_timezone(&Utc).fixed_offset();
    }

    let add = helper.private_param(PARAM_ADD_VALUE);
    if !add.is_empty() {
        date = date + parse_duration(add)?;
    }

    let format = helper.private_param(PARAM_FORMAT);
    if !format.is_empty() {
        if format == "unix" {
            return Ok(date.timestamp().to_string());
        }
        let mut rendered = String::new();
        write!(rendered, "{}", date.format(format))
            .map_err(|_| Error::bad_date_format(format!("bad time layout '{format}'")))?;
        return Ok(rendered);
    }

    Ok(date.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::build_helpers;

    #[test]
    fn sanitize_stores_private_params() {
        let helpers =
            build_helpers(b"{{ alfred.time.now.utc.format('unix').add('10ms') }}").unwrap();
        let h = &helpers[0];
        assert_eq!(h.private_param(PARAM_DATE_REF), "now");
        assert_eq!(h.private_param(PARAM_IS_UTC), "true");
        assert_eq!(h.private_param(PARAM_FORMAT), "unix");
        assert_eq!(h.private_param(PARAM_ADD_VALUE), "10ms");
        assert!(!h.has_value());
    }

    #[test]
    fn literal_date_is_precomputed_at_sanitise_time() {
        let helpers =
            build_helpers(b"{{ alfred.time.date(2009,1,3,4,2,0,0).format('%Y-%m-%d') }}")
                .unwrap();
        assert_eq!(helpers[0].value, "2009-01-03");
    }

    #[test]
    fn unknown_reference_is_rejected() {
        let err = build_helpers(b"{{ alfred.time.tomorrow }}").unwrap_err();
        assert!(matches!(err, Error::BadDateFormat { .. }));
    }

    #[test]
    fn bad_add_duration_is_rejected() {
        let err = build_helpers(b"{{ alfred.time.now.add('10 parsecs') }}").unwrap_err();
        assert!(matches!(err, Error::BadAddDuration { .. }));
    }

    #[test]
    fn bad_literal_argument_count_is_rejected() {
        let err = build_helpers(b"{{ alfred.time.date(2009,1,3) }}").unwrap_err();
        assert!(matches!(err, Error::BadDateFormat { .. }));
    }

    #[test]
    fn unix_format_returns_integer_seconds() {
        let helpers = build_helpers(b"{{ alfred.time.now.format('unix') }}").unwrap();
        let value = target_date_value(&helpers[0]).unwrap();
        let seconds: i64 = value.parse().unwrap();
        assert!(seconds > 1_600_000_000);
    }

    #[test]
    fn add_shifts_the_computed_value() {
        let helpers = build_helpers(
            b"{{ alfred.time.date(2020,6,1,12,0,0,0).utc.format('unix') }} {{ alfred.time.date(2020,6,1,12,0,0,0).utc.format('unix').add('1h') }}",
        )
        .unwrap();
        let base: i64 = helpers[0].value.parse().unwrap();
        let shifted: i64 = helpers[1].value.parse().unwrap();
        assert_eq!(shifted - base, 3600);
    }
}
