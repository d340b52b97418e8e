// SPDX-License-Identifier: MIT OR Apache-2.0
//! Services the evaluator consults but does not implement.

use anyhow::Result;
use async_trait::async_trait;
use rfe_core::{ActionExecutionInfo, Individual};
use rfe_oracle::{
    DefaultHttpSemanticsOracle, DefaultSecurityOracle, DtoSource, HttpSemanticsOracle,
    PathResourceGraph, ResourceGraph, SchemaOracle, SecurityOracle, SsrfVerifier,
};
use rfe_transport::SessionCredentials;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Supplies session cookies and tokens before a sequence runs.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Credentials for every login used by `individual`.
    async fn credentials(&self, individual: &Individual) -> Result<SessionCredentials>;
}

/// [`AuthProvider`] returning the same credentials for every individual.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    credentials: SessionCredentials,
}

impl StaticCredentials {
    /// Provider handing out `credentials`.
    pub fn new(credentials: SessionCredentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl AuthProvider for StaticCredentials {
    async fn credentials(&self, _individual: &Individual) -> Result<SessionCredentials> {
        Ok(self.credentials.clone())
    }
}

/// A coverage objective reported by the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageTarget {
    /// Objective id.
    pub id: String,
    /// Heuristic score in `[0, 1]`.
    pub value: f64,
    /// Call during which the score was reached.
    pub action_index: usize,
}

/// What the controller observed during one sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestResults {
    /// Coverage objectives.
    pub targets: Vec<CoverageTarget>,
    /// Execution details, one entry per executed call.
    pub additional_info: Vec<ActionExecutionInfo>,
}

/// Instrumentation agent of a white-box target.
#[async_trait]
pub trait SutController: Send + Sync {
    /// Reset the target's state before a sequence.
    async fn reset_sut(&self) -> Result<()>;

    /// Announce that call `index` is about to be sent.
    async fn register_new_action(&self, index: usize) -> Result<()>;

    /// Coverage and execution details of the sequence just run; `None` when
    /// the controller could not collect them.
    async fn test_results(&self) -> Result<Option<TestResults>>;
}

/// Every collaborator of an [`crate::Evaluator`].
///
/// Defaults: static empty credentials, no controller, no schema oracle, the
/// default security and HTTP-semantics oracles, no SSRF verifier, the path
/// resource graph, and no DTO source.
#[derive(Clone)]
pub struct Collaborators {
    /// Session credentials.
    pub auth: Arc<dyn AuthProvider>,
    /// White-box controller; required in white-box mode.
    pub controller: Option<Arc<dyn SutController>>,
    /// Response schema validation.
    pub schema: Option<Arc<dyn SchemaOracle>>,
    /// Access-control judgments.
    pub security: Arc<dyn SecurityOracle>,
    /// HTTP-semantics judgments.
    pub semantics: Arc<dyn HttpSemanticsOracle>,
    /// SSRF callback verification.
    pub ssrf: Option<Arc<dyn SsrfVerifier>>,
    /// Child locations of created resources.
    pub resources: Arc<dyn ResourceGraph>,
    /// Body shapes for expansion.
    pub dtos: Option<Arc<dyn DtoSource>>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            auth: Arc::new(StaticCredentials::default()),
            controller: None,
            schema: None,
            security: Arc::new(DefaultSecurityOracle),
            semantics: Arc::new(DefaultHttpSemanticsOracle),
            ssrf: None,
            resources: Arc::new(PathResourceGraph),
            dtos: None,
        }
    }
}

impl Collaborators {
    /// Default collaborators.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the auth provider.
    pub fn with_auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = auth;
        self
    }

    /// Builder: set the white-box controller.
    pub fn with_controller(mut self, controller: Arc<dyn SutController>) -> Self {
        self.controller = Some(controller);
        self
    }

    /// Builder: set the schema oracle.
    pub fn with_schema_oracle(mut self, oracle: Arc<dyn SchemaOracle>) -> Self {
        self.schema = Some(oracle);
        self
    }

    /// Builder: set the security oracle.
    pub fn with_security_oracle(mut self, oracle: Arc<dyn SecurityOracle>) -> Self {
        self.security = oracle;
        self
    }

    /// Builder: set the HTTP-semantics oracle.
    pub fn with_semantics_oracle(mut self, oracle: Arc<dyn HttpSemanticsOracle>) -> Self {
        self.semantics = oracle;
        self
    }

    /// Builder: set the SSRF verifier.
    pub fn with_ssrf_verifier(mut self, verifier: Arc<dyn SsrfVerifier>) -> Self {
        self.ssrf = Some(verifier);
        self
    }

    /// Builder: set the resource graph.
    pub fn with_resource_graph(mut self, graph: Arc<dyn ResourceGraph>) -> Self {
        self.resources = graph;
        self
    }

    /// Builder: set the DTO source.
    pub fn with_dto_source(mut self, dtos: Arc<dyn DtoSource>) -> Self {
        self.dtos = Some(dtos);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_credentials_are_shared() {
        let provider =
            StaticCredentials::new(SessionCredentials::new().with_token("alice", "Bearer t"));
        let creds = provider.credentials(&Individual::new(vec![])).await.unwrap();
        assert_eq!(creds.token("alice"), Some("Bearer t"));
    }

    #[test]
    fn test_results_deserialize_without_info() {
        let results: TestResults = serde_json::from_str(
            r#"{"targets":[{"id":"Line_1","value":1.0,"action_index":0}],"additional_info":[]}"#,
        )
        .unwrap();
        assert_eq!(results.targets[0].id, "Line_1");
    }
}
