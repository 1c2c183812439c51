//! Time formatting for presence and message rows.
//!
//! Relative phrases ("5 minutes ago") step through seconds, minutes, hours,
//! days, weeks, months and years. Under ten seconds reads as "just now";
//! one unit is singular ("1 hour ago").
//!
//! Clock times are rendered in the viewer's offset. The server has no
//! viewer offset and renders UTC; the browser swaps in the local offset
//! after hydration.

#[cfg(test)]
#[path = "time_ago_test.rs"]
mod time_ago_test;

use time::macros::format_description;
use time::{Duration, OffsetDateTime, UtcOffset};

/// Phrase for the distance from `then_ms` to `now_ms`.
pub fn time_ago(then_ms: i64, now_ms: i64) -> String {
    let elapsed = Duration::milliseconds(now_ms - then_ms);
    let future = elapsed.is_negative();
    let elapsed = elapsed.abs();

    if elapsed < Duration::seconds(10) {
        return if future { "right now".to_owned() } else { "just now".to_owned() };
    }

    let days = elapsed.whole_days();
    let (count, name) = if elapsed < Duration::MINUTE {
        (elapsed.whole_seconds(), "second")
    } else if elapsed < Duration::HOUR {
        (elapsed.whole_minutes(), "minute")
    } else if elapsed < Duration::DAY {
        (elapsed.whole_hours(), "hour")
    } else if elapsed < Duration::WEEK {
        (days, "day")
    } else if days * 12 < 365 {
        (elapsed.whole_weeks(), "week")
    } else if days < 365 {
        (days * 12 / 365, "month")
    } else {
        (days / 365, "year")
    };

    let plural = if count == 1 { "" } else { "s" };
    if future { format!("in {count} {name}{plural}") } else { format!("{count} {name}{plural} ago") }
}

/// Wall-clock "HH:MM" of an epoch-millisecond timestamp at `offset`.
pub fn clock_time(ts_ms: i64, offset: UtcOffset) -> String {
    let Ok(at) = OffsetDateTime::from_unix_timestamp_nanos(i128::from(ts_ms) * 1_000_000) else {
        return String::new();
    };
    at.to_offset(offset)
        .format(format_description!("[hour]:[minute]"))
        .unwrap_or_default()
}

/// The viewer's UTC offset at `ts_ms`. UTC outside the browser.
pub fn local_offset(ts_ms: i64) -> UtcOffset {
    #[cfg(feature = "hydrate")]
    {
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        let minutes_west = js_sys::Date::new(&wasm_bindgen::JsValue::from_f64(ts_ms as f64)).get_timezone_offset() as i32;
        UtcOffset::from_whole_seconds(-minutes_west * 60).unwrap_or(UtcOffset::UTC)
    }
    #[cfg(not(feature = "hydrate"))]
    {
        let _ = ts_ms;
        UtcOffset::UTC
    }
}

/// Current time in epoch milliseconds.
#[allow(clippy::cast_possible_truncation)]
pub fn now_ms() -> i64 {
    #[cfg(feature = "hydrate")]
    {
        js_sys::Date::now() as i64
    }
    #[cfg(not(feature = "hydrate"))]
    {
        i64::try_from(OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000).unwrap_or(0)
    }
}
