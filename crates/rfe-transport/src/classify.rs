// SPDX-License-Identifier: MIT OR Apache-2.0
//! Classification of transport failures.
//!
//! HTTP clients report failures as opaque error chains. [`classify`] reduces
//! them to a closed [`TransportFailure`] set, checking the most specific
//! conditions first, so that the evaluator can decide between retrying,
//! aborting the sequence, and stopping the search.

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Kind of a failed exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportFailure {
    /// Redirects did not terminate.
    RedirectLoop,
    /// No response within the timeout.
    Timeout,
    /// The OS ran out of local ports for new connections.
    EphemeralPortsExhausted,
    /// The connection was reset or closed mid-exchange.
    ConnectionDropped,
    /// The host name did not resolve.
    UnknownHost,
    /// Nothing listens at the target address.
    ConnectionRefused,
    /// The request could not be built.
    Internal,
    /// Anything else.
    Other,
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RedirectLoop => "redirect loop",
            Self::Timeout => "timeout",
            Self::EphemeralPortsExhausted => "ephemeral ports exhausted",
            Self::ConnectionDropped => "connection dropped",
            Self::UnknownHost => "unknown host",
            Self::ConnectionRefused => "connection refused",
            Self::Internal => "request construction failure",
            Self::Other => "transport failure",
        })
    }
}

/// A failed exchange, classified.
#[derive(Debug, thiserror::Error)]
#[error("{failure} calling {url}: {message}")]
pub struct TransportError {
    /// Classification.
    pub failure: TransportFailure,
    /// URL of the request.
    pub url: String,
    /// Rendered error chain.
    pub message: String,
    /// Underlying error.
    #[source]
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

impl TransportError {
    /// Error without an underlying cause.
    pub fn new(failure: TransportFailure, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            failure,
            url: url.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Classify a `reqwest` failure.
    pub fn from_reqwest(err: reqwest::Error, url: &str) -> Self {
        let failure = classify(&err);
        Self {
            failure,
            url: url.to_string(),
            message: render_chain(&err),
            source: Some(Box::new(err)),
        }
    }
}

/// What can be learned about a failure without knowing the client type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureSignals {
    /// The client gave up following redirects.
    pub redirect: bool,
    /// The client timed out.
    pub timeout: bool,
    /// The failure happened while connecting.
    pub connect: bool,
    /// The request could not be built.
    pub builder: bool,
    /// `io::ErrorKind`s found in the source chain.
    pub io_kinds: Vec<io::ErrorKind>,
    /// Lower-cased messages of the whole chain.
    pub messages: Vec<String>,
}

impl FailureSignals {
    /// Collect signals from a `reqwest` error and its sources.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let mut signals = Self {
            redirect: err.is_redirect(),
            timeout: err.is_timeout(),
            connect: err.is_connect(),
            builder: err.is_builder(),
            ..Default::default()
        };
        let mut current: Option<&(dyn StdError + 'static)> = Some(err);
        while let Some(e) = current {
            if let Some(io) = e.downcast_ref::<io::Error>() {
                signals.io_kinds.push(io.kind());
            }
            signals.messages.push(e.to_string().to_ascii_lowercase());
            current = e.source();
        }
        signals
    }

    fn has_kind(&self, kinds: &[io::ErrorKind]) -> bool {
        self.io_kinds.iter().any(|k| kinds.contains(k))
    }

    fn mentions(&self, needles: &[&str]) -> bool {
        self.messages
            .iter()
            .any(|m| needles.iter().any(|n| m.contains(n)))
    }
}

/// Classify a `reqwest` error.
pub fn classify(err: &reqwest::Error) -> TransportFailure {
    classify_signals(&FailureSignals::from_reqwest(err))
}

/// Classify from extracted signals, most specific condition first.
pub fn classify_signals(s: &FailureSignals) -> TransportFailure {
    if s.redirect || s.mentions(&["too many redirects", "redirect loop"]) {
        return TransportFailure::RedirectLoop;
    }
    if s.timeout || s.has_kind(&[io::ErrorKind::TimedOut]) {
        return TransportFailure::Timeout;
    }
    if s.has_kind(&[io::ErrorKind::AddrNotAvailable])
        || s.mentions(&["cannot assign requested address", "os error 99"])
    {
        return TransportFailure::EphemeralPortsExhausted;
    }
    if s.has_kind(&[
        io::ErrorKind::ConnectionReset,
        io::ErrorKind::ConnectionAborted,
        io::ErrorKind::BrokenPipe,
        io::ErrorKind::UnexpectedEof,
    ]) || s.mentions(&[
        "connection closed before message completed",
        "connection reset",
        "unexpected eof",
        "incomplete message",
    ]) {
        return TransportFailure::ConnectionDropped;
    }
    if s.mentions(&[
        "dns error",
        "failed to lookup address",
        "name or service not known",
        "no such host",
    ]) {
        return TransportFailure::UnknownHost;
    }
    if s.has_kind(&[io::ErrorKind::ConnectionRefused]) || s.mentions(&["connection refused"]) {
        return TransportFailure::ConnectionRefused;
    }
    if s.builder {
        return TransportFailure::Internal;
    }
    TransportFailure::Other
}

fn render_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = err.source();
    while let Some(e) = current {
        parts.push(e.to_string());
        current = e.source();
    }
    parts.join(": ")
}
