// SPDX-License-Identifier: MIT OR Apache-2.0
//! Oracles consulted while scoring a call sequence.
//!
//! Each oracle is a trait so the evaluator can run against test doubles or
//! richer implementations; this crate also ships the default ones:
//!
//! - [`JsonSchemaOracle`]: response bodies against declared JSON schemas.
//! - [`DefaultSecurityOracle`]: access-control inconsistencies across calls.
//! - [`DefaultHttpSemanticsOracle`]: PUT and DELETE behaviour.
//! - [`PathResourceGraph`]: child locations of created resources.
//! - [`InMemorySsrfVerifier`]: SSRF callbacks recorded by a listener.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod resource;
pub mod schema;
pub mod security;
pub mod semantics;
pub mod ssrf;

pub use resource::PathResourceGraph;
pub use schema::JsonSchemaOracle;
pub use security::DefaultSecurityOracle;
pub use semantics::DefaultHttpSemanticsOracle;
pub use ssrf::InMemorySsrfVerifier;

use rfe_core::{CallResult, Gene, HttpVerb, Individual, RestCall, RestPath};

// ---------------------------------------------------------------------------
// Schema validation
// ---------------------------------------------------------------------------

/// One schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationMessage {
    /// Stable kind of violation, e.g.
    /// `validation.response.body.schema.required`.
    pub key: String,
    /// Human-readable explanation.
    pub message: String,
}

/// Failures of an oracle itself, as opposed to findings about the target.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// A schema handed to the oracle does not compile.
    #[error("invalid schema for {endpoint} ({status}): {reason}")]
    InvalidSchema {
        /// Call name.
        endpoint: String,
        /// Status the schema applies to.
        status: u16,
        /// Compiler message.
        reason: String,
    },
    /// The oracle could not evaluate a response.
    #[error("validation of {endpoint} failed: {reason}")]
    ValidationFailed {
        /// Call name.
        endpoint: String,
        /// Reason.
        reason: String,
    },
}

/// Checks responses against the API schema.
pub trait SchemaOracle: Send + Sync {
    /// Violations found in `result`, the response to `call`.
    fn validate(
        &self,
        call: &RestCall,
        result: &CallResult,
    ) -> Result<Vec<ValidationMessage>, OracleError>;
}

// ---------------------------------------------------------------------------
// Sequence oracles
// ---------------------------------------------------------------------------

/// Access-control checks over a whole executed sequence.
pub trait SecurityOracle: Send + Sync {
    /// The second-to-last call was a `verb` refused with 403, and the last
    /// call then modified the same resource with the same credentials
    /// through another write verb.
    fn has_forbidden_operation(
        &self,
        verb: HttpVerb,
        individual: &Individual,
        results: &[CallResult],
    ) -> bool;

    /// GETs on `path` answered both 403 and 404.
    fn has_existence_leakage(
        &self,
        path: &RestPath,
        individual: &Individual,
        results: &[CallResult],
    ) -> bool;

    /// `endpoint` refused some credentials (401/403) yet answered 2xx to an
    /// unauthenticated call.
    fn has_forgotten_authentication(
        &self,
        endpoint: &str,
        individual: &Individual,
        results: &[CallResult],
    ) -> bool;

    /// `call` was answered 401 although its credentials obtained 2xx on an
    /// endpoint that does enforce authentication.
    fn has_not_recognized_authenticated(
        &self,
        call: &RestCall,
        individual: &Individual,
        results: &[CallResult],
    ) -> bool;
}

/// Outcome of the GET / DELETE / GET check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteCheck {
    /// The sequence ends in a successful GET then successful DELETE on one
    /// resource, followed by a GET.
    pub checking_delete: bool,
    /// The final GET still returned the resource.
    pub non_working: bool,
    /// Index of the DELETE call.
    pub delete_index: usize,
}

/// HTTP-semantics checks over a whole executed sequence.
pub trait HttpSemanticsOracle: Send + Sync {
    /// The last two calls are identical PUTs that both answered 201.
    fn has_repeated_create_put(&self, individual: &Individual, results: &[CallResult]) -> bool;

    /// GET / DELETE / GET analysis of the last three calls.
    fn non_working_delete(&self, individual: &Individual, results: &[CallResult]) -> DeleteCheck;
}

// ---------------------------------------------------------------------------
// Other collaborators
// ---------------------------------------------------------------------------

/// Reports whether the server reached out to the SSRF callback endpoint.
pub trait SsrfVerifier: Send + Sync {
    /// Whether executing `call` triggered a callback.
    fn any_calls_made_to_verifier(&self, call: &RestCall) -> bool;

    /// Name of the parameter whose value triggered the callback.
    fn vulnerable_parameter(&self, call: &RestCall) -> Option<String>;
}

/// Knowledge of how resources nest.
pub trait ResourceGraph: Send + Sync {
    /// Location of the resource with `resource_id` created by `create`.
    fn resolve_location_for_child(&self, create: &RestCall, resource_id: &str) -> Option<String>;
}

/// Request body shapes named by the server's parsing code.
pub trait DtoSource: Send + Sync {
    /// Value tree for the DTO `name`.
    fn gene_for_dto(&self, name: &str) -> Option<Gene>;
}

/// Result of `call`, matched by local id.
pub fn result_of<'a>(results: &'a [CallResult], call: &RestCall) -> Option<&'a CallResult> {
    results.iter().find(|r| r.source_local_id == call.local_id)
}

/// Calls paired with their results; calls without a result are skipped.
pub fn executed<'a>(
    individual: &'a Individual,
    results: &'a [CallResult],
) -> impl Iterator<Item = (&'a RestCall, &'a CallResult)> {
    individual
        .calls
        .iter()
        .filter_map(move |c| result_of(results, c).map(|r| (c, r)))
}
