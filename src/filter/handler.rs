//! Request/response phase handling.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::headers::{header_value, quota_headers, rejection_headers, HeaderList, HOST_HEADER};
use super::ResponseSettings;
use crate::config::TurnstileConfig;
use crate::error::Result;
use crate::ratelimit::{Admission, Decision, Quota};

/// A synthesized rejection response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub status: u16,
    pub body: String,
    /// Sorted by header name
    pub headers: HeaderList,
    /// Quota of the exhausted bucket
    pub quota: Quota,
}

/// What the proxy should do with a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FilterAction {
    /// Forward the request upstream. `context` is handed back to
    /// [`RequestFilter::on_response_headers`] and is `None` for whitelisted
    /// requests.
    Continue { context: Option<Quota> },
    /// Answer the request directly.
    Reject(Rejection),
}

impl FilterAction {
    /// Quota behind the action; `None` for whitelisted requests.
    pub fn quota(&self) -> Option<&Quota> {
        match self {
            FilterAction::Continue { context } => context.as_ref(),
            FilterAction::Reject(rejection) => Some(&rejection.quota),
        }
    }
}

/// Applies admission decisions at the proxy's header phases.
pub struct RequestFilter {
    admission: Arc<Admission>,
    settings: ResponseSettings,
}

impl RequestFilter {
    pub fn new(admission: Arc<Admission>, settings: ResponseSettings) -> Self {
        Self {
            admission,
            settings,
        }
    }

    /// Build a filter from configuration.
    pub fn from_config(config: &TurnstileConfig) -> Result<Self> {
        let admission = Arc::new(config.build()?);
        Ok(Self::new(admission, config.response_settings()))
    }

    pub fn admission(&self) -> &Arc<Admission> {
        &self.admission
    }

    pub fn settings(&self) -> &ResponseSettings {
        &self.settings
    }

    /// Request-header phase, given the full request header list.
    pub fn on_request<K, V>(&self, headers: &[(K, V)]) -> FilterAction
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.on_request_headers(header_value(headers, HOST_HEADER))
    }

    /// Request-header phase, given the `Host` header value if present.
    #[instrument(skip(self), level = "trace")]
    pub fn on_request_headers(&self, host: Option<&str>) -> FilterAction {
        match self.admission.admit_optional(host) {
            Decision::Exempt => FilterAction::Continue { context: None },
            Decision::Allowed(quota) => FilterAction::Continue {
                context: Some(quota),
            },
            Decision::Limited(quota) => {
                debug!(
                    host = host.unwrap_or_default(),
                    status = self.settings.rejected_code,
                    "Rejecting rate limited request"
                );
                FilterAction::Reject(self.rejection(&quota))
            }
        }
    }

    /// Response-header phase: headers to replace on the upstream response.
    pub fn on_response_headers(&self, context: Option<&Quota>) -> HeaderList {
        match context {
            Some(quota) if self.settings.show_limit_quota_header => quota_headers(quota),
            _ => Vec::new(),
        }
    }

    fn rejection(&self, quota: &Quota) -> Rejection {
        Rejection {
            status: self.settings.rejected_code,
            body: self.settings.rejected_msg.clone(),
            headers: rejection_headers(quota, self.settings.show_limit_quota_header),
            quota: *quota,
        }
    }
}
