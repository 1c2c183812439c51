use super::*;

const NOW: i64 = 1_700_000_000_000;
const SECOND: i64 = 1000;
const MINUTE: i64 = 60 * SECOND;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

#[test]
fn under_ten_seconds_is_just_now() {
    assert_eq!(time_ago(NOW, NOW), "just now");
    assert_eq!(time_ago(NOW - 9 * SECOND, NOW), "just now");
}

#[test]
fn seconds_bucket() {
    assert_eq!(time_ago(NOW - 42 * SECOND, NOW), "42 seconds ago");
}

#[test]
fn five_minutes_ago() {
    assert_eq!(time_ago(NOW - 5 * MINUTE, NOW), "5 minutes ago");
}

#[test]
fn singular_units() {
    assert_eq!(time_ago(NOW - MINUTE, NOW), "1 minute ago");
    assert_eq!(time_ago(NOW - HOUR - 5 * MINUTE, NOW), "1 hour ago");
    assert_eq!(time_ago(NOW - DAY, NOW), "1 day ago");
}

#[test]
fn larger_buckets() {
    assert_eq!(time_ago(NOW - 3 * HOUR, NOW), "3 hours ago");
    assert_eq!(time_ago(NOW - 15 * DAY, NOW), "2 weeks ago");
    assert_eq!(time_ago(NOW - 400 * DAY, NOW), "1 year ago");
}

#[test]
fn future_times_read_forward() {
    assert_eq!(time_ago(NOW + 2 * HOUR, NOW), "in 2 hours");
    assert_eq!(time_ago(NOW + 3 * SECOND, NOW), "right now");
}

#[test]
fn clock_time_in_utc() {
    // 2023-11-14T22:13:20Z
    assert_eq!(clock_time(NOW, UtcOffset::UTC), "22:13");
    assert_eq!(clock_time(0, UtcOffset::UTC), "00:00");
}

#[test]
fn clock_time_follows_viewer_offset() {
    let new_york = UtcOffset::from_hms(-5, 0, 0).unwrap();
    let kolkata = UtcOffset::from_hms(5, 30, 0).unwrap();
    assert_eq!(clock_time(NOW, new_york), "17:13");
    assert_eq!(clock_time(NOW, kolkata), "03:43");
}

#[test]
fn months_between_weeks_and_years() {
    assert_eq!(time_ago(NOW - 29 * DAY, NOW), "4 weeks ago");
    assert_eq!(time_ago(NOW - 45 * DAY, NOW), "1 month ago");
    assert_eq!(time_ago(NOW - 200 * DAY, NOW), "6 months ago");
}

#[test]
fn local_offset_is_utc_off_browser() {
    assert_eq!(local_offset(NOW), UtcOffset::UTC);
}

#[test]
fn now_ms_is_after_2020() {
    assert!(now_ms() > 1_577_836_800_000);
}
