//! Header names and quota header rendering.

use crate::ratelimit::Quota;

/// Request header carrying the rate limit key.
pub const HOST_HEADER: &str = "Host";

/// Total admissions per window.
pub const RATE_LIMIT_LIMIT_HEADER: &str = "X-RateLimit-Limit";
/// Admissions left in the current window.
pub const RATE_LIMIT_REMAINING_HEADER: &str = "X-RateLimit-Remaining";
/// End of the current window, only sent when a request is rejected.
pub const RATE_LIMIT_RESET_HEADER: &str = "X-RateLimit-Reset";

/// Header name/value pairs to set on a response.
pub type HeaderList = Vec<(&'static str, String)>;

/// Limit and remaining headers for an admitted request.
pub fn quota_headers(quota: &Quota) -> HeaderList {
    vec![
        (RATE_LIMIT_LIMIT_HEADER, quota.limit.to_string()),
        (RATE_LIMIT_REMAINING_HEADER, quota.remaining.to_string()),
    ]
}

/// Headers for a rejection response, sorted by name.
///
/// The reset header is always present; limit and remaining only when
/// `show_quota` is set.
pub fn rejection_headers(quota: &Quota, show_quota: bool) -> HeaderList {
    let mut headers = vec![(RATE_LIMIT_RESET_HEADER, quota.reset_at.to_string())];
    if show_quota {
        headers.push((RATE_LIMIT_LIMIT_HEADER, quota.limit.to_string()));
        headers.push((RATE_LIMIT_REMAINING_HEADER, "0".to_string()));
    }
    headers.sort_by(|a, b| a.0.cmp(b.0));
    headers
}

/// Case-insensitive lookup of the first header named `name`.
pub fn header_value<'a, K, V>(headers: &'a [(K, V)], name: &str) -> Option<&'a str>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    headers
        .iter()
        .find(|(k, _)| k.as_ref().eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quota() -> Quota {
        Quota {
            limit: 10,
            remaining: 3,
            reset_at: 1_700_000_001_000_000_000,
        }
    }

    #[test]
    fn test_quota_headers() {
        let headers = quota_headers(&quota());
        assert_eq!(
            headers,
            vec![
                (RATE_LIMIT_LIMIT_HEADER, "10".to_string()),
                (RATE_LIMIT_REMAINING_HEADER, "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_rejection_headers_without_quota() {
        let headers = rejection_headers(&quota(), false);
        assert_eq!(
            headers,
            vec![(RATE_LIMIT_RESET_HEADER, "1700000001000000000".to_string())]
        );
    }

    #[test]
    fn test_rejection_headers_sorted_with_quota() {
        let headers = rejection_headers(&quota(), true);
        let names: Vec<&str> = headers.iter().map(|(k, _)| *k).collect();

        assert_eq!(
            names,
            vec![
                RATE_LIMIT_LIMIT_HEADER,
                RATE_LIMIT_REMAINING_HEADER,
                RATE_LIMIT_RESET_HEADER
            ]
        );
        assert_eq!(headers[1].1, "0");
    }

    #[test]
    fn test_header_value_is_case_insensitive() {
        let headers = vec![
            ("content-type".to_string(), "text/plain".to_string()),
            ("host".to_string(), "api.example.com".to_string()),
        ];

        assert_eq!(header_value(&headers, HOST_HEADER), Some("api.example.com"));
        assert_eq!(header_value(&headers, "x-missing"), None);
    }
}
