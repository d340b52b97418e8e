// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fitness evaluation of REST call sequences.
//!
//! An [`Evaluator`] executes an [`Individual`] call by call against the
//! system under test, threading locations and link values from earlier
//! responses into later requests, and scores what it observed:
//!
//! 1. [`execute_sequence`](Evaluator::execute_sequence) sends the calls and
//!    records one [`CallResult`] each, stopping early when a call leaves the
//!    rest of the sequence meaningless.
//! 2. [`objectives`] maps every result to objective scores.
//! 3. [`analyzers`] run whole-sequence security, SSRF and HTTP-semantics
//!    checks.
//! 4. [`expand::expand_individual`] grows the individual with inputs the
//!    server was seen to read (white-box only).
//!
//! Transport failures are classified and either recorded on the result,
//! retried once, or escalated as an [`EngineError`]; see [`recovery`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod analyzers;
pub mod classifier;
pub mod collaborators;
pub mod expand;
pub mod links;
pub mod objectives;
pub mod ratelimit;
pub mod recovery;

pub use collaborators::{
    AuthProvider, Collaborators, CoverageTarget, StaticCredentials, SutController, TestResults,
};
pub use expand::{KNOWN_HTTP_HEADERS, expand_individual};
pub use links::LinkOutcome;
pub use recovery::{Recovery, recovery_for};

use ratelimit::RateLimiter;
use rfe_config::EngineConfig;
use rfe_core::{
    CallResult, ChainState, FitnessRecord, FitnessValue, Individual, RestCall,
    SCHEMA_FETCH_ACTION_ID, SampleType, StopReason,
};
use rfe_error::{EngineError, ErrorCode};
use rfe_telemetry::{EvaluationCounters, EvaluationMetrics, MetricsCollector};
use rfe_transport::{
    PreparedRequest, RawResponse, ReqwestFactory, RequestContext, SessionCredentials,
    TransportError, TransportFactory, TransportHandle, TransportSettings, prepare_request,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// How a sequence ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Termination {
    /// Every call was executed.
    Completed,
    /// Call `index` forbade continuing.
    StoppedEarly {
        /// Index of the last executed call.
        index: usize,
        /// Why the sequence stopped.
        reason: StopReason,
    },
}

/// Results of executing a sequence, before scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceOutcome {
    /// One result per executed call, in order.
    pub results: Vec<CallResult>,
    /// How the sequence ended.
    pub termination: Termination,
}

/// A scored evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Objective scores.
    pub fitness: FitnessValue,
    /// One result per executed call, in order.
    pub results: Vec<CallResult>,
    /// How the sequence ended.
    pub termination: Termination,
}

/// Executes and scores individuals against one system under test.
pub struct Evaluator {
    config: EngineConfig,
    transport: TransportHandle,
    collaborators: Collaborators,
    counters: EvaluationCounters,
    metrics: MetricsCollector,
    limiter: RateLimiter,
}

impl Evaluator {
    /// Evaluator talking HTTP through `reqwest`.
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Result<Self, EngineError> {
        let factory = Arc::new(ReqwestFactory::new(TransportSettings::from_config(&config)));
        Self::with_transport(config, factory, collaborators)
    }

    /// Evaluator whose transports come from `factory`.
    pub fn with_transport(
        config: EngineConfig,
        factory: Arc<dyn TransportFactory>,
        collaborators: Collaborators,
    ) -> Result<Self, EngineError> {
        let warnings = rfe_config::validate_config(&config).map_err(|e| {
            EngineError::new(ErrorCode::ConfigInvalid, e.to_string()).with_source(e)
        })?;
        for warning in warnings {
            warn!(target: "rfe.fitness", %warning, "configuration");
        }
        if !config.is_black_box() && collaborators.controller.is_none() {
            return Err(EngineError::new(
                ErrorCode::ConfigInvalid,
                "white-box evaluation needs a controller",
            ));
        }

        let transport = TransportHandle::new(factory).map_err(transport_setup_error)?;
        Ok(Self {
            limiter: RateLimiter::new(config.min_call_interval()),
            config,
            transport,
            collaborators,
            counters: EvaluationCounters::new(),
            metrics: MetricsCollector::new(),
        })
    }

    /// Builder: share `counters` with other evaluators.
    pub fn with_counters(mut self, counters: EvaluationCounters) -> Self {
        self.counters = counters;
        self
    }

    /// Builder: record per-evaluation metrics into `metrics`.
    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = metrics;
        self
    }

    /// The configuration in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Incident counters.
    pub fn counters(&self) -> &EvaluationCounters {
        &self.counters
    }

    /// Per-evaluation metrics.
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Number of times the transport was replaced.
    pub fn transport_generation(&self) -> u64 {
        self.transport.generation()
    }

    /// Execute and score `individual`.
    ///
    /// Returns `Ok(None)` when the run must not be scored: a connection was
    /// dropped, or the controller could not report coverage. White-box
    /// runs may add parameters to `individual` afterwards; see
    /// [`expand_individual`].
    pub async fn evaluate(
        &mut self,
        individual: &mut Individual,
    ) -> Result<Option<Evaluation>, EngineError> {
        let started = Instant::now();
        self.counters.record_evaluation();

        let controller = self.collaborators.controller.clone().filter(|_| !self.config.is_black_box());
        if let Some(controller) = &controller {
            controller
                .reset_sut()
                .await
                .map_err(|e| controller_error("reset the system under test", e))?;
        }

        let credentials = self
            .collaborators
            .auth
            .credentials(individual)
            .await
            .map_err(|e| {
                EngineError::new(ErrorCode::AuthFailed, format!("failed to log in: {e:#}"))
            })?;

        let SequenceOutcome {
            mut results,
            termination,
        } = self.execute_sequence(individual, &credentials).await?;

        if results.iter().any(|r| r.tcp_problem) {
            warn!(target: "rfe.fitness", "connection dropped during the sequence, not scoring it");
            self.counters.record_discarded();
            return Ok(None);
        }

        let mut fitness = FitnessValue::new();
        let mut infos = Vec::new();
        if let Some(controller) = &controller {
            let Some(test_results) = controller
                .test_results()
                .await
                .map_err(|e| controller_error("collect coverage", e))?
            else {
                warn!(target: "rfe.fitness", "controller returned no coverage, not scoring the sequence");
                self.counters.record_discarded();
                return Ok(None);
            };
            for target in &test_results.targets {
                fitness.update_target(&target.id, target.value, target.action_index);
            }
            infos = test_results.additional_info;
        }

        self.score(individual, &mut results, &infos, &mut fitness);

        if self.config.expand_individuals && !infos.is_empty() {
            let dtos = self.collaborators.dtos.as_deref();
            expand_individual(individual, &infos, &results, dtos)?;
        }

        let faults = results.iter().map(|r| r.faults.len() as u64).sum();
        self.metrics.record(EvaluationMetrics {
            sample_type: sample_type_label(individual.sample_type).to_string(),
            duration_ms: started.elapsed().as_millis() as u64,
            calls_executed: results.len() as u64,
            targets: fitness.len() as u64,
            covered_targets: fitness.covered_count() as u64,
            faults,
            stopped_early: matches!(termination, Termination::StoppedEarly { .. }),
        });

        Ok(Some(Evaluation {
            fitness,
            results,
            termination,
        }))
    }

    fn score(
        &self,
        individual: &Individual,
        results: &mut [CallResult],
        infos: &[rfe_core::ActionExecutionInfo],
        fitness: &mut FitnessValue,
    ) {
        objectives::map_objectives(&self.config, individual, results, infos, fitness);

        if self.config.security && individual.sample_type == SampleType::Security {
            analyzers::analyze_security(self.collaborators.security.as_ref(), individual, results);
        }
        if self.config.ssrf_enabled()
            && let Some(verifier) = &self.collaborators.ssrf
        {
            analyzers::analyze_ssrf(verifier.as_ref(), individual, results);
        }
        if self.config.http_oracles && individual.sample_type == SampleType::HttpSemantics {
            analyzers::analyze_http_semantics(
                self.collaborators.semantics.as_ref(),
                individual,
                results,
                fitness,
            );
        }

        analyzers::fault_objectives(results, fitness);
    }

    /// Send the calls of `individual` in order and record what came back.
    ///
    /// Calls bound to a backward link get their parameters overwritten
    /// before they are sent. The sequence stops after the first result
    /// with [`CallResult::stopping`] set; nothing after it is sent.
    pub async fn execute_sequence(
        &mut self,
        individual: &mut Individual,
        credentials: &SessionCredentials,
    ) -> Result<SequenceOutcome, EngineError> {
        let controller = self.collaborators.controller.clone().filter(|_| !self.config.is_black_box());
        let mut chain = ChainState::new();
        let mut results: Vec<CallResult> = Vec::with_capacity(individual.calls.len());

        for index in 0..individual.calls.len() {
            self.limiter.wait().await;
            if let Some(controller) = &controller {
                controller
                    .register_new_action(index)
                    .await
                    .map_err(|e| controller_error("register the next call", e))?;
            }

            let link = links::bind_backward_link(individual, &results, index)?;
            let call = &individual.calls[index];
            let mut result = CallResult::new(call.local_id.as_str());
            result.applied_link = link == LinkOutcome::Applied;

            self.execute_call(call, &mut chain, credentials, &mut result)
                .await
                .map_err(|e| e.with_context("call_index", index))?;

            if link == LinkOutcome::Unresolved && self.config.is_black_box() && !result.is_stopping() {
                result.stopping = Some(StopReason::UnresolvedLink);
            }

            let stop = result.stopping;
            results.push(result);
            if let Some(reason) = stop {
                info!(target: "rfe.fitness", index, %reason, "sequence stopped early");
                return Ok(SequenceOutcome {
                    results,
                    termination: Termination::StoppedEarly { index, reason },
                });
            }
        }

        Ok(SequenceOutcome {
            results,
            termination: Termination::Completed,
        })
    }

    async fn execute_call(
        &mut self,
        call: &RestCall,
        chain: &mut ChainState,
        credentials: &SessionCredentials,
        result: &mut CallResult,
    ) -> Result<(), EngineError> {
        let ctx = RequestContext {
            base_url: &self.config.base_url,
            chain,
            credentials,
        };
        let request = prepare_request(call, &ctx)?;
        debug!(target: "rfe.fitness", verb = %request.verb, url = %request.url, "sending");

        self.counters.record_call();
        let Some(response) = self.send(call, &request, result).await? else {
            return Ok(());
        };
        if response.requests_connection_close() {
            self.counters.record_connection_close(Some(response.status));
        }
        if !classifier::record_response(result, response, &self.counters, &call.name()) {
            return Ok(());
        }

        if self.config.schema_oracles
            && call.id != SCHEMA_FETCH_ACTION_ID
            && let Some(oracle) = &self.collaborators.schema
        {
            classifier::apply_schema_oracle(oracle.as_ref(), call, result);
        }

        if call.save_location {
            self.save_location(call, chain, result);
        }

        if self.config.ssrf_enabled()
            && let Some(verifier) = &self.collaborators.ssrf
        {
            classifier::flag_ssrf(verifier.as_ref(), call, result);
        }
        Ok(())
    }

    /// Remember where `call` created its resource, or stop the sequence if
    /// it created none.
    fn save_location(&self, call: &RestCall, chain: &mut ChainState, result: &mut CallResult) {
        if !result.is_success() {
            debug!(
                target: "rfe.fitness",
                endpoint = %call.name(),
                status = ?result.status,
                "creation failed, later calls have no location to use"
            );
            result.stopping = Some(StopReason::MissingLocation);
            return;
        }

        let location = match &result.location {
            Some(location) => location.clone(),
            None => {
                let derived = result
                    .resource_id()
                    .and_then(|id| self.collaborators.resources.resolve_location_for_child(call, &id));
                match derived {
                    Some(location) => {
                        result.heuristics_for_chained_location = true;
                        result.location = Some(location.clone());
                        location
                    }
                    None => String::new(),
                }
            }
        };
        chain.save_location(call.creation_location_id(), location);
    }

    /// Send `request`, applying the recovery rules on failure. `Ok(None)`
    /// means the failure was recorded on `result`.
    async fn send(
        &mut self,
        call: &RestCall,
        request: &PreparedRequest,
        result: &mut CallResult,
    ) -> Result<Option<RawResponse>, EngineError> {
        let mut retried = false;
        loop {
            let err = match self.transport.current().send(request).await {
                Ok(response) => return Ok(Some(response)),
                Err(err) => err,
            };

            // A fresh transport gets exactly one attempt.
            if retried {
                return Err(EngineError::new(
                    ErrorCode::TransportFailed,
                    format!("call failed again after recreating the transport: {}", err.failure),
                )
                .with_context("url", request.url.as_str())
                .with_source(err));
            }

            match recovery_for(err.failure, self.config.is_black_box()) {
                Recovery::Abort(reason) => {
                    warn!(target: "rfe.fitness", endpoint = %call.name(), %reason, error = %err, "call failed");
                    match reason {
                        StopReason::Timeout => self.counters.record_timeout(&call.name()),
                        StopReason::TcpProblem => self.counters.record_tcp_problem(),
                        _ => {}
                    }
                    recovery::mark_aborted(result, reason, &err);
                    return Ok(None);
                }
                Recovery::RetryWithNewTransport => {
                    let wait = self.config.ephemeral_port_wait();
                    warn!(
                        target: "rfe.fitness",
                        wait_ms = wait.as_millis() as u64,
                        "ephemeral ports exhausted, recreating the transport"
                    );
                    self.counters.record_ephemeral_port_retry();
                    self.transport.recreate().map_err(transport_setup_error)?;
                    tokio::time::sleep(wait).await;
                    retried = true;
                }
                Recovery::Fatal(code) => {
                    return Err(recovery::fatal_error(
                        code,
                        err,
                        &self.config.base_url,
                        &call.resolved_path(),
                    ));
                }
            }
        }
    }
}

fn controller_error(action: &str, err: anyhow::Error) -> EngineError {
    EngineError::new(
        ErrorCode::SutControllerFailed,
        format!("controller failed to {action}: {err:#}"),
    )
}

fn transport_setup_error(err: TransportError) -> EngineError {
    EngineError::new(ErrorCode::TransportFailed, "failed to build the HTTP transport").with_source(err)
}

fn sample_type_label(sample_type: SampleType) -> &'static str {
    match sample_type {
        SampleType::Random => "random",
        SampleType::Seeded => "seeded",
        SampleType::Security => "security",
        SampleType::HttpSemantics => "http_semantics",
    }
}
