//! Checks shared by the section validators. Each pushes a readable message
//! naming the offending key instead of failing fast.

use std::fmt::Display;

/// `value` must lie in `[min, max]`.
pub(crate) fn check_range<T>(errors: &mut Vec<String>, key: &str, value: T, min: T, max: T)
where
    T: PartialOrd + Display + Copy,
{
    if value < min || value > max {
        errors.push(format!("{key} = {value} is out of range [{min}, {max}]"));
    }
}

pub(crate) fn check_nonzero(errors: &mut Vec<String>, key: &str, value: u16) {
    if value == 0 {
        errors.push(format!("{key} must not be 0"));
    }
}

/// `url` must be a WebSocket URL with something after the scheme.
pub(crate) fn check_ws_url(errors: &mut Vec<String>, key: &str, url: &str) {
    let rest = url
        .strip_prefix("ws://")
        .or_else(|| url.strip_prefix("wss://"));
    match rest {
        Some(host) if !host.is_empty() => {}
        _ => errors.push(format!("{key} = {url:?} must be a ws:// or wss:// URL")),
    }
}
