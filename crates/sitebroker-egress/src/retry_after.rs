//! Retry-After header parsing

use tracing::debug;

/// Parse the `retry-after` HTTP header value.
///
/// Only the delta-seconds form is honoured. HTTP-date values, negative
/// numbers and garbage return `None`, and the caller falls back to its own
/// backoff schedule.
///
/// # Examples
/// ```
/// use sitebroker_egress::parse_retry_after;
///
/// assert_eq!(parse_retry_after("2"), Some(2));
/// assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
/// ```
pub fn parse_retry_after(header_value: &str) -> Option<u64> {
    match header_value.trim().parse::<u64>() {
        Ok(seconds) => {
            debug!(retry_after_seconds = seconds, "Parsed retry-after header");
            Some(seconds)
        }
        Err(_) => {
            debug!(header_value = header_value, "Ignoring non-numeric retry-after header");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeric_format() {
        assert_eq!(parse_retry_after("60"), Some(60));
        assert_eq!(parse_retry_after("0"), Some(0));
        assert_eq!(parse_retry_after("  2  "), Some(2));
    }

    #[test]
    fn test_parse_invalid_input() {
        assert_eq!(parse_retry_after(""), None);
        assert_eq!(parse_retry_after("soon"), None);
        assert_eq!(parse_retry_after("-60"), None);
        assert_eq!(parse_retry_after("1.5"), None);
    }

    #[test]
    fn test_http_date_is_not_honoured() {
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }
}
