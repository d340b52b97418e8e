// SPDX-License-Identifier: MIT OR Apache-2.0
//! Data model of the REST fitness engine.
//!
//! An [`Individual`] is an ordered sequence of [`RestCall`]s. Executing it
//! yields one [`CallResult`] per executed call and a [`FitnessValue`] holding
//! the score of every objective touched. This crate defines those types, the
//! [`ChainState`] carried between calls, fault identities, and the naming of
//! objective ids. It performs no I/O.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod action;
pub mod chain;
pub mod fault;
pub mod fitness;
pub mod gene;
pub mod objective;
pub mod param;
pub mod result;
pub mod verb;

pub use action::{
    AuthInfo, BackwardLinkReference, CreationId, Individual, Link, LinkExpression, LinkParameter,
    NO_AUTH, RestCall, RestPath, SampleType,
};
pub use chain::{ChainKey, ChainState};
pub use fault::{DetectedFault, FaultCategory, fault_target_id};
pub use fitness::{FitnessRecord, FitnessValue, TargetScore};
pub use gene::{EXAMPLES_NAME, Gene, GeneKind};
pub use param::{APPLICATION_JSON, BodyEncoding, BodyParam, FORM_URLENCODED, Param};
pub use result::{CallResult, StopReason};
pub use verb::{HttpVerb, StatusGroup};

/// Type id of the call that fetches the API schema itself; its responses are
/// not validated against that schema.
pub const SCHEMA_FETCH_ACTION_ID: &str = "Call to Swagger";

/// Execution details reported by a white-box controller for one call.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ActionExecutionInfo {
    /// Last statement executed in application code, e.g.
    /// `UserController.delete:88`.
    pub last_executed_statement: Option<String>,
    /// Request headers the application read.
    #[serde(default)]
    pub headers: std::collections::BTreeSet<String>,
    /// Query parameters the application read.
    #[serde(default)]
    pub query_parameters: std::collections::BTreeSet<String>,
    /// The application read the raw request body.
    #[serde(default)]
    pub raw_access_of_http_body_payload: bool,
    /// DTO types the application parsed the body into.
    #[serde(default)]
    pub parsed_dto_names: std::collections::BTreeSet<String>,
}
