// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stable error codes for the REST fitness engine.
//!
//! Findings about the system under test (faults, failed calls, timeouts) are
//! data, not errors. [`EngineError`] is reserved for conditions that make an
//! evaluation meaningless: the target cannot be reached, the caller handed us
//! a structurally broken call sequence, or the engine itself is misconfigured.
//! Every error carries a stable [`ErrorCode`] and optional structured context.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The system under test is unreachable or misaddressed.
    Environment,
    /// Transport failures that the engine could not classify.
    Transport,
    /// The call sequence handed to the engine is malformed.
    Structure,
    /// Engine configuration errors.
    Config,
    /// Catch-all for engine bugs.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Environment => "environment",
            Self::Transport => "transport",
            Self::Structure => "structure",
            Self::Config => "config",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Each variant serialises to a `SCREAMING_SNAKE_CASE` string that is
/// guaranteed not to change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // -- Environment --
    /// TCP connection to the target was refused.
    SutUnreachable,
    /// Host name of the target could not be resolved.
    SutUnknownHost,
    /// White-box controller failed to reset or report.
    SutControllerFailed,
    /// Session credentials could not be obtained.
    AuthFailed,

    // -- Transport --
    /// A transport failure that none of the recovery rules handle.
    TransportFailed,

    // -- Structure --
    /// Call descriptors reference links, locations or bodies inconsistently.
    InvalidActionStructure,
    /// A body parameter declares a media type the invoker cannot encode.
    UnsupportedContentType,
    /// A DTO named by white-box feedback has no schema counterpart.
    MissingDto,

    // -- Config --
    /// Configuration file or value is invalid.
    ConfigInvalid,

    // -- Internal --
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::SutUnreachable
            | Self::SutUnknownHost
            | Self::SutControllerFailed
            | Self::AuthFailed => ErrorCategory::Environment,

            Self::TransportFailed => ErrorCategory::Transport,

            Self::InvalidActionStructure | Self::UnsupportedContentType | Self::MissingDto => {
                ErrorCategory::Structure
            }

            Self::ConfigInvalid => ErrorCategory::Config,

            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Stable `&'static str` representation of the code (e.g.
    /// `"SUT_UNREACHABLE"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SutUnreachable => "SUT_UNREACHABLE",
            Self::SutUnknownHost => "SUT_UNKNOWN_HOST",
            Self::SutControllerFailed => "SUT_CONTROLLER_FAILED",
            Self::AuthFailed => "AUTH_FAILED",
            Self::TransportFailed => "TRANSPORT_FAILED",
            Self::InvalidActionStructure => "INVALID_ACTION_STRUCTURE",
            Self::UnsupportedContentType => "UNSUPPORTED_CONTENT_TYPE",
            Self::MissingDto => "MISSING_DTO",
            Self::ConfigInvalid => "CONFIG_INVALID",
            Self::Internal => "INTERNAL",
        }
    }

    /// Whether an error with this code means the whole search should stop,
    /// as opposed to a single evaluation being discarded.
    pub fn is_environmental(&self) -> bool {
        self.category() == ErrorCategory::Environment
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// Fatal engine error.
///
/// # Builder usage
///
/// ```
/// use rfe_error::{EngineError, ErrorCode};
///
/// let err = EngineError::new(ErrorCode::SutUnreachable, "connection refused")
///     .with_context("base_url", "http://localhost:8080")
///     .with_context("call_index", 3);
/// assert_eq!(err.code, ErrorCode::SutUnreachable);
/// ```
pub struct EngineError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl EngineError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// Values that fail to serialise are skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Shorthand for an [`ErrorCode::InvalidActionStructure`] error.
    pub fn structure(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidActionStructure, message)
    }

    /// Shorthand for an [`ErrorCode::Internal`] error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }
}

impl fmt::Debug for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("EngineError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
