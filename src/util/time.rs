use time::{macros::format_description, OffsetDateTime, PrimitiveDateTime};

/// Formats unix seconds as an HTTP date (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn http_date(secs: i64) -> Option<String> {
    let format = format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    );
    OffsetDateTime::from_unix_timestamp(secs)
        .ok()?
        .format(format)
        .ok()
}

/// Parses an HTTP date back into unix seconds.
pub fn parse_http_date(value: &str) -> Option<i64> {
    let format = format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    );
    PrimitiveDateTime::parse(value.trim(), format)
        .ok()
        .map(|dt| dt.assume_utc().unix_timestamp())
}

pub fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_date() {
        let cases = vec![
            (784111777, "Sun, 06 Nov 1994 08:49:37 GMT"),
            (0, "Thu, 01 Jan 1970 00:00:00 GMT"),
        ];

        for (secs, expected) in cases {
            assert_eq!(http_date(secs).unwrap(), expected, "failed for case: {}", secs);
            assert_eq!(parse_http_date(expected), Some(secs), "failed for case: {}", expected);
        }
    }

    #[test]
    fn test_parse_http_date_invalid() {
        let cases = vec!["", "yesterday", "2024-01-01T00:00:00Z"];

        for input in cases {
            assert_eq!(parse_http_date(input), None, "failed for case: {}", input);
        }
    }
}
