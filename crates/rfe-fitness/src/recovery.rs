// SPDX-License-Identifier: MIT OR Apache-2.0
//! What to do after a failed exchange.

use rfe_core::{CallResult, StopReason};
use rfe_error::{EngineError, ErrorCode};
use rfe_transport::{TransportError, TransportFailure};

/// Reaction to a [`TransportFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Record the failure on the call and stop the sequence.
    Abort(StopReason),
    /// Replace the transport, wait for the OS to free ports, and send the
    /// call once more.
    RetryWithNewTransport,
    /// Stop the whole search with this code.
    Fatal(ErrorCode),
}

/// Recovery for `failure`.
///
/// A refused connection is fatal only in black-box mode; in white-box mode
/// the controller owns the target's lifecycle and the error is passed on
/// unchanged.
pub fn recovery_for(failure: TransportFailure, black_box: bool) -> Recovery {
    match failure {
        TransportFailure::RedirectLoop => Recovery::Abort(StopReason::RedirectLoop),
        TransportFailure::Timeout => Recovery::Abort(StopReason::Timeout),
        TransportFailure::ConnectionDropped => Recovery::Abort(StopReason::TcpProblem),
        TransportFailure::EphemeralPortsExhausted => Recovery::RetryWithNewTransport,
        TransportFailure::ConnectionRefused if black_box => Recovery::Fatal(ErrorCode::SutUnreachable),
        TransportFailure::UnknownHost => Recovery::Fatal(ErrorCode::SutUnknownHost),
        TransportFailure::Internal => Recovery::Fatal(ErrorCode::Internal),
        TransportFailure::ConnectionRefused | TransportFailure::Other => {
            Recovery::Fatal(ErrorCode::TransportFailed)
        }
    }
}

/// Record an aborted exchange on `result`.
pub fn mark_aborted(result: &mut CallResult, reason: StopReason, err: &TransportError) {
    match reason {
        StopReason::RedirectLoop => result.infinite_loop = true,
        StopReason::Timeout => result.timed_out = true,
        StopReason::TcpProblem => result.tcp_problem = true,
        StopReason::MissingLocation | StopReason::UnresolvedLink => {}
    }
    result.error_message = Some(err.to_string());
    result.stopping = Some(reason);
}

/// The fatal error for `code`, worded for whoever runs the search.
pub fn fatal_error(
    code: ErrorCode,
    err: TransportError,
    base_url: &str,
    resolved_path: &str,
) -> EngineError {
    let message = match code {
        ErrorCode::SutUnreachable => format!(
            "Failed to connect API with TCP. Is the API up and running at '{base_url}'? \
             If not, set base_url (or RFE_BASE_URL) to where it listens"
        ),
        ErrorCode::SutUnknownHost => format!("Unknown host: {}", host_of(&err.url)),
        ErrorCode::Internal => format!(
            "Internal bug in the fitness engine while building the call toward {resolved_path}"
        ),
        _ => format!("HTTP call toward {resolved_path} failed: {}", err.message),
    };
    let url = err.url.clone();
    EngineError::new(code, message)
        .with_context("url", url)
        .with_context("failure", err.failure.to_string())
        .with_source(err)
}

fn host_of(raw: &str) -> String {
    url::Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovery_table() {
        let cases = [
            (TransportFailure::RedirectLoop, true, Recovery::Abort(StopReason::RedirectLoop)),
            (TransportFailure::Timeout, false, Recovery::Abort(StopReason::Timeout)),
            (TransportFailure::ConnectionDropped, true, Recovery::Abort(StopReason::TcpProblem)),
            (TransportFailure::EphemeralPortsExhausted, true, Recovery::RetryWithNewTransport),
            (TransportFailure::ConnectionRefused, true, Recovery::Fatal(ErrorCode::SutUnreachable)),
            (TransportFailure::ConnectionRefused, false, Recovery::Fatal(ErrorCode::TransportFailed)),
            (TransportFailure::UnknownHost, false, Recovery::Fatal(ErrorCode::SutUnknownHost)),
            (TransportFailure::Internal, true, Recovery::Fatal(ErrorCode::Internal)),
            (TransportFailure::Other, true, Recovery::Fatal(ErrorCode::TransportFailed)),
        ];
        for (failure, black_box, expected) in cases {
            assert_eq!(recovery_for(failure, black_box), expected, "{failure:?}");
        }
    }

    #[test]
    fn timeout_marks_and_stops() {
        let mut result = CallResult::new("a");
        let err = TransportError::new(TransportFailure::Timeout, "http://h/x", "deadline");
        mark_aborted(&mut result, StopReason::Timeout, &err);
        assert!(result.timed_out);
        assert_eq!(result.stopping, Some(StopReason::Timeout));
        assert!(result.error_message.unwrap().contains("deadline"));
    }

    #[test]
    fn unreachable_message_names_the_target() {
        let err = TransportError::new(TransportFailure::ConnectionRefused, "http://localhost:1/a", "refused");
        let fatal = fatal_error(ErrorCode::SutUnreachable, err, "http://localhost:1", "/a");
        assert_eq!(fatal.code, ErrorCode::SutUnreachable);
        assert!(fatal.message.contains("'http://localhost:1'"));
        assert_eq!(fatal.context["url"], "http://localhost:1/a");
    }

    #[test]
    fn unknown_host_names_the_host() {
        let err = TransportError::new(TransportFailure::UnknownHost, "http://nowhere.invalid:8080/a", "dns");
        let fatal = fatal_error(ErrorCode::SutUnknownHost, err, "http://nowhere.invalid:8080", "/a");
        assert_eq!(fatal.message, "Unknown host: nowhere.invalid");
    }

    #[test]
    fn internal_names_the_path() {
        let err = TransportError::new(TransportFailure::Internal, "", "builder");
        let fatal = fatal_error(ErrorCode::Internal, err, "http://h", "/users/1?x=2");
        assert!(fatal.message.ends_with("toward /users/1?x=2"));
    }
}
