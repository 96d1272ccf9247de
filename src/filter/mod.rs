//! Host-side request filter.
//!
//! Translates admission decisions into the actions an intercepting proxy
//! performs: continue the request, or answer it with a rejection, plus the
//! optional `X-RateLimit-*` quota headers on either path.

mod handler;
mod headers;

pub use handler::{FilterAction, Rejection, RequestFilter};
pub use headers::{
    header_value, quota_headers, rejection_headers, HeaderList, HOST_HEADER,
    RATE_LIMIT_LIMIT_HEADER, RATE_LIMIT_REMAINING_HEADER, RATE_LIMIT_RESET_HEADER,
};

use crate::config::{DEFAULT_REJECTED_CODE, DEFAULT_REJECTED_MSG};

/// Response-side behaviour of the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSettings {
    /// Attach limit/remaining headers to responses
    pub show_limit_quota_header: bool,
    /// Status code for rejected requests
    pub rejected_code: u16,
    /// Body for rejected requests
    pub rejected_msg: String,
}

impl Default for ResponseSettings {
    fn default() -> Self {
        Self {
            show_limit_quota_header: false,
            rejected_code: DEFAULT_REJECTED_CODE,
            rejected_msg: DEFAULT_REJECTED_MSG.to_string(),
        }
    }
}
