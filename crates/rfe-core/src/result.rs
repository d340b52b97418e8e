// SPDX-License-Identifier: MIT OR Apache-2.0
//! Observations recorded for each executed call.

use crate::fault::DetectedFault;
use crate::verb::StatusGroup;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a sequence stopped after a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A call that must provide a location for later calls did not succeed.
    MissingLocation,
    /// The call timed out.
    Timeout,
    /// The connection was dropped mid-exchange.
    TcpProblem,
    /// The server redirected in a loop.
    RedirectLoop,
    /// A required hyperlink could not be followed.
    UnresolvedLink,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MissingLocation => "missing_location",
            Self::Timeout => "timeout",
            Self::TcpProblem => "tcp_problem",
            Self::RedirectLoop => "redirect_loop",
            Self::UnresolvedLink => "unresolved_link",
        })
    }
}

/// Everything observed while executing one call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallResult {
    /// Local id of the call this result belongs to.
    pub source_local_id: String,
    /// Response status; `None` when no response arrived.
    pub status: Option<u16>,
    /// `Location` header, or a location derived from the body.
    pub location: Option<String>,
    /// Response headers in wire order.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Response body, unless absent or too large.
    pub body: Option<String>,
    /// Media type of the body.
    pub body_type: Option<String>,
    /// Whether a link was applied to this call before sending it.
    pub applied_link: bool,
    /// Faults found for this call.
    pub faults: Vec<DetectedFault>,
    /// The call or its body read timed out.
    pub timed_out: bool,
    /// The connection was dropped.
    pub tcp_problem: bool,
    /// The server redirected in a loop.
    pub infinite_loop: bool,
    /// The body exceeded the configured size limit.
    pub too_large_body: bool,
    /// [`Self::location`] was derived from a resource id in the body.
    pub heuristics_for_chained_location: bool,
    /// The call made the server contact the SSRF verifier.
    pub vulnerable_ssrf: bool,
    /// Diagnostic text for failed calls.
    pub error_message: Option<String>,
    /// Set when the sequence stopped after this call.
    pub stopping: Option<StopReason>,
}

impl CallResult {
    /// Empty result for the call with `source_local_id`.
    pub fn new(source_local_id: impl Into<String>) -> Self {
        Self {
            source_local_id: source_local_id.into(),
            ..Default::default()
        }
    }

    /// Whether the sequence stopped after this call.
    pub fn is_stopping(&self) -> bool {
        self.stopping.is_some()
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        StatusGroup::G2xx.is_in_group(self.status)
    }

    /// Status for objective naming; `-1` when none was received.
    pub fn status_or_missing(&self) -> i32 {
        self.status.map(i32::from).unwrap_or(-1)
    }

    /// Record a fault.
    pub fn add_fault(&mut self, fault: DetectedFault) {
        self.faults.push(fault);
    }

    /// Identifier of the resource in a JSON body: a top-level `id` string or
    /// number.
    pub fn resource_id(&self) -> Option<String> {
        let body = self.body.as_deref()?;
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        match value.get("id")? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// First response header named `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the body is present and not just whitespace.
    pub fn has_non_empty_body(&self) -> bool {
        self.body.as_deref().is_some_and(|b| !b.trim().is_empty())
    }
}
