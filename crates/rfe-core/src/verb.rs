// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP verbs and status-code families.

use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP method of a call descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
    /// `PATCH`
    Patch,
    /// `OPTIONS`
    Options,
    /// `HEAD`
    Head,
    /// `TRACE`
    Trace,
}

impl HttpVerb {
    /// Upper-case method name as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Options => "OPTIONS",
            Self::Head => "HEAD",
            Self::Trace => "TRACE",
        }
    }

    /// Verbs that modify an existing resource in place.
    pub const WRITE_OPERATIONS: [HttpVerb; 3] = [HttpVerb::Put, HttpVerb::Patch, HttpVerb::Delete];

    /// The write operations other than `self`.
    pub fn other_write_operations(&self) -> impl Iterator<Item = HttpVerb> + '_ {
        Self::WRITE_OPERATIONS.into_iter().filter(move |v| v != self)
    }

    /// Whether an empty body should still be framed as a form payload.
    pub fn sends_empty_form_by_default(&self) -> bool {
        matches!(self, Self::Put | Self::Patch | Self::Post)
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Family of HTTP status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusGroup {
    /// 100–199
    G1xx,
    /// 200–299
    G2xx,
    /// 300–399
    G3xx,
    /// 400–499
    G4xx,
    /// 500–599
    G5xx,
}

impl StatusGroup {
    /// Whether `status` is present and belongs to this family.
    pub fn is_in_group(&self, status: Option<u16>) -> bool {
        status.is_some_and(|s| Self::of(s) == Some(*self))
    }

    /// Family of a status code, `None` outside 100–599.
    pub fn of(status: u16) -> Option<StatusGroup> {
        match status {
            100..=199 => Some(Self::G1xx),
            200..=299 => Some(Self::G2xx),
            300..=399 => Some(Self::G3xx),
            400..=499 => Some(Self::G4xx),
            500..=599 => Some(Self::G5xx),
            _ => None,
        }
    }
}
