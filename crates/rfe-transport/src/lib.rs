// SPDX-License-Identifier: MIT OR Apache-2.0
//! Call invocation for the REST fitness engine.
//!
//! - [`request`]: descriptor → [`PreparedRequest`] (URI, headers, body).
//! - [`client`]: the [`HttpTransport`] seam and its `reqwest` implementation.
//! - [`classify`]: reduction of client failures to [`TransportFailure`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod classify;
pub mod client;
pub mod request;

pub use classify::{FailureSignals, TransportError, TransportFailure, classify, classify_signals};
pub use client::{
    HttpTransport, RawResponse, ReqwestFactory, ReqwestTransport, ResponseBody, TransportFactory,
    TransportHandle, TransportSettings,
};
pub use request::{
    InvokeError, PreparedBody, PreparedRequest, RequestContext, SessionCredentials,
    prepare_request, resolve_location,
};
