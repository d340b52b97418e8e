// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fault categories and the objective ids derived from detected faults.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix shared by every fault objective id.
pub const FAULT_TARGET_PREFIX: &str = "PotentialFault";

/// Kind of problem found in a response or response sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultCategory {
    /// The server answered 500.
    Http500,
    /// The response does not match its declared schema.
    SchemaInvalidResponse,
    /// The server fetched a URL taken from request input.
    Ssrf,
    /// A write succeeded with credentials that were just refused a sibling
    /// write.
    SecurityWrongAuthorization,
    /// 403 and 404 on the same path disclose resource existence.
    SecurityExistenceLeakage,
    /// Valid credentials were answered with 401.
    SecurityNotRecognizedAuthenticated,
    /// An endpoint protected for some callers answers 2xx without
    /// credentials.
    SecurityForgottenAuthentication,
    /// Two identical PUTs both answered 201.
    HttpRepeatedCreatePut,
    /// A successful DELETE left the resource retrievable.
    HttpNonWorkingDelete,
}

impl FaultCategory {
    /// Stable label used in objective ids and reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Http500 => "HTTP_STATUS_500",
            Self::SchemaInvalidResponse => "SCHEMA_INVALID_RESPONSE",
            Self::Ssrf => "SSRF",
            Self::SecurityWrongAuthorization => "SECURITY_WRONG_AUTHORIZATION",
            Self::SecurityExistenceLeakage => "SECURITY_EXISTENCE_LEAKAGE",
            Self::SecurityNotRecognizedAuthenticated => "SECURITY_NOT_RECOGNIZED_AUTHENTICATED",
            Self::SecurityForgottenAuthentication => "SECURITY_FORGOTTEN_AUTHENTICATION",
            Self::HttpRepeatedCreatePut => "HTTP_REPEATED_CREATE_PUT",
            Self::HttpNonWorkingDelete => "HTTP_NONWORKING_DELETE",
        }
    }

    /// Categories whose discriminant already names the endpoint, so that it
    /// alone tells faults apart.
    fn discriminant_is_qualified(&self) -> bool {
        matches!(self, Self::Http500 | Self::SchemaInvalidResponse)
    }
}

impl fmt::Display for FaultCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A fault attached to a call result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedFault {
    /// Kind of fault.
    pub category: FaultCategory,
    /// Name of the call the fault was found on, `VERB:/template`.
    pub endpoint: String,
    /// Distinguishes faults of one category on one endpoint.
    pub discriminant: Option<String>,
    /// Free-form explanation.
    pub detail: Option<String>,
}

impl DetectedFault {
    /// Fault without discriminant or detail.
    pub fn new(category: FaultCategory, endpoint: impl Into<String>) -> Self {
        Self {
            category,
            endpoint: endpoint.into(),
            discriminant: None,
            detail: None,
        }
    }

    /// Builder: set the discriminant.
    pub fn with_discriminant(mut self, discriminant: impl Into<String>) -> Self {
        self.discriminant = Some(discriminant.into());
        self
    }

    /// Builder: set the detail.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Objective id for this fault.
    pub fn target_id(&self) -> String {
        fault_target_id(self.category, &self.endpoint, self.discriminant.as_deref())
    }
}

/// Objective id for a fault, as a pure function of its identity.
pub fn fault_target_id(category: FaultCategory, endpoint: &str, discriminant: Option<&str>) -> String {
    let postfix = match discriminant {
        Some(d) if category.discriminant_is_qualified() => d,
        _ => endpoint,
    };
    format!("{FAULT_TARGET_PREFIX}_{}_{postfix}", category.label())
}
