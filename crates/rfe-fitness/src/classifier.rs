// SPDX-License-Identifier: MIT OR Apache-2.0
//! Turning responses into recorded observations and faults.

use rfe_core::{
    ActionExecutionInfo, CallResult, DetectedFault, FaultCategory, RestCall, StopReason,
};
use rfe_oracle::{SchemaOracle, SsrfVerifier};
use rfe_telemetry::EvaluationCounters;
use rfe_transport::{RawResponse, ResponseBody};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Violation key that too many schemas trip over to be useful.
pub const IGNORED_SCHEMA_KEY: &str = "validation.response.body.schema.additionalProperties";

/// Discriminant location used when the controller saw no application code run.
pub const FRAMEWORK_CODE: &str = "framework_code";

/// Copy status, headers, media type and body of `response` into `result`.
///
/// Returns `false` when reading the body timed out; the result then stops
/// the sequence.
pub fn record_response(
    result: &mut CallResult,
    response: RawResponse,
    counters: &EvaluationCounters,
    endpoint: &str,
) -> bool {
    result.status = Some(response.status);
    result.location = response.location().map(str::to_string);
    let content_type = response.content_type().map(str::to_string);
    result.headers = response.headers;

    match response.body {
        ResponseBody::Empty => {}
        ResponseBody::Text(text) => {
            result.body_type = content_type;
            result.body = Some(text);
        }
        ResponseBody::TooLarge => {
            warn!(target: "rfe.fitness", endpoint, "response body over the size limit, dropped");
            counters.record_too_large_body();
            result.body_type = content_type;
            result.too_large_body = true;
        }
        ResponseBody::ReadTimeout => {
            counters.record_timeout(endpoint);
            result.timed_out = true;
            result.error_message = Some("timed out reading the response body".into());
            result.stopping = Some(StopReason::Timeout);
            return false;
        }
        ResponseBody::ReadFailed(reason) => {
            warn!(target: "rfe.fitness", endpoint, %reason, "failed to read response body");
            result.error_message = Some(reason);
        }
    }
    true
}

/// Attach one fault per distinct schema violation key.
pub fn apply_schema_oracle(oracle: &dyn SchemaOracle, call: &RestCall, result: &mut CallResult) {
    let messages = match oracle.validate(call, result) {
        Ok(m) => m,
        Err(e) => {
            warn!(target: "rfe.fitness", endpoint = %call.name(), error = %e, "schema validation skipped");
            return;
        }
    };

    let name = call.name();
    let mut seen = HashSet::new();
    for message in messages {
        if message.key == IGNORED_SCHEMA_KEY || !seen.insert(message.key.clone()) {
            continue;
        }
        let fault = DetectedFault::new(FaultCategory::SchemaInvalidResponse, name.as_str())
            .with_discriminant(format!("{name} -> {}", message.key))
            .with_detail(format!("Type: {}\n{}", message.key, message.message));
        result.add_fault(fault);
    }
}

/// Attach an HTTP 500 fault when the call returned 500.
///
/// In white-box mode the discriminant is the last statement the
/// application executed, so distinct crash sites are distinct faults. In
/// black-box mode there is none.
pub fn detect_server_error(
    call: &RestCall,
    result: &mut CallResult,
    info: Option<&ActionExecutionInfo>,
    black_box: bool,
) {
    if result.status != Some(500) {
        return;
    }
    let name = call.name();
    let mut fault = DetectedFault::new(FaultCategory::Http500, name.as_str());
    if !black_box {
        let location = info
            .and_then(|i| i.last_executed_statement.as_deref())
            .unwrap_or(FRAMEWORK_CODE);
        fault = fault.with_discriminant(format!("{location} {name}"));
    }
    debug!(target: "rfe.fitness", endpoint = %name, target = %fault.target_id(), "server error");
    result.add_fault(fault);
}

/// Flag `result` when executing `call` made the server reach the verifier.
pub fn flag_ssrf(verifier: &dyn SsrfVerifier, call: &RestCall, result: &mut CallResult) {
    if verifier.any_calls_made_to_verifier(call) {
        result.vulnerable_ssrf = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfe_core::HttpVerb;
    use rfe_oracle::{OracleError, ValidationMessage};

    struct Fixed(Vec<(&'static str, &'static str)>);

    impl SchemaOracle for Fixed {
        fn validate(&self, _: &RestCall, _: &CallResult) -> Result<Vec<ValidationMessage>, OracleError> {
            Ok(self
                .0
                .iter()
                .map(|(k, m)| ValidationMessage {
                    key: k.to_string(),
                    message: m.to_string(),
                })
                .collect())
        }
    }

    struct Broken;

    impl SchemaOracle for Broken {
        fn validate(&self, call: &RestCall, _: &CallResult) -> Result<Vec<ValidationMessage>, OracleError> {
            Err(OracleError::ValidationFailed {
                endpoint: call.name(),
                reason: "boom".into(),
            })
        }
    }

    fn delete_user() -> RestCall {
        RestCall::new("d", HttpVerb::Delete, "/users/{id}")
    }

    #[test]
    fn body_over_limit_is_flagged_not_kept() {
        let counters = EvaluationCounters::new();
        let mut result = CallResult::new("a");
        let response =
            RawResponse::new(200, ResponseBody::TooLarge).with_header("Content-Type", "application/json");
        assert!(record_response(&mut result, response, &counters, "GET:/a"));
        assert!(result.too_large_body);
        assert!(result.body.is_none());
        assert_eq!(counters.snapshot().too_large_bodies, 1);
    }

    #[test]
    fn body_read_timeout_stops() {
        let counters = EvaluationCounters::new();
        let mut result = CallResult::new("a");
        assert!(!record_response(
            &mut result,
            RawResponse::new(200, ResponseBody::ReadTimeout),
            &counters,
            "GET:/a"
        ));
        assert!(result.timed_out);
        assert_eq!(result.stopping, Some(StopReason::Timeout));
        assert_eq!(counters.snapshot().timeouts, 1);
    }

    #[test]
    fn response_fields_are_copied() {
        let counters = EvaluationCounters::new();
        let mut result = CallResult::new("a");
        let response = RawResponse::new(201, ResponseBody::Text("{}".into()))
            .with_header("Location", "/users/7")
            .with_header("Content-Type", "application/json");
        record_response(&mut result, response, &counters, "POST:/users");
        assert_eq!(result.status, Some(201));
        assert_eq!(result.location.as_deref(), Some("/users/7"));
        assert_eq!(result.body_type.as_deref(), Some("application/json"));
        assert_eq!(result.header("content-type"), Some("application/json"));
    }

    #[test]
    fn schema_faults_are_deduplicated_by_key() {
        let oracle = Fixed(vec![
            ("validation.response.body.schema.required", "missing name"),
            ("validation.response.body.schema.required", "missing age"),
            (IGNORED_SCHEMA_KEY, "extra"),
            ("validation.response.body.schema.type", "wrong type"),
        ]);
        let mut result = CallResult::new("d");
        apply_schema_oracle(&oracle, &delete_user(), &mut result);
        let discriminants: Vec<_> = result
            .faults
            .iter()
            .map(|f| f.discriminant.clone().unwrap())
            .collect();
        assert_eq!(
            discriminants,
            vec![
                "DELETE:/users/{id} -> validation.response.body.schema.required",
                "DELETE:/users/{id} -> validation.response.body.schema.type",
            ]
        );
        assert!(result.faults[0].detail.as_deref().unwrap().contains("missing name"));
    }

    #[test]
    fn oracle_failure_adds_nothing() {
        let mut result = CallResult::new("d");
        apply_schema_oracle(&Broken, &delete_user(), &mut result);
        assert!(result.faults.is_empty());
    }

    #[test]
    fn white_box_500_names_the_crash_site() {
        let mut result = CallResult::new("d");
        result.status = Some(500);
        let info = ActionExecutionInfo {
            last_executed_statement: Some("UserController.delete:88".into()),
            ..Default::default()
        };
        detect_server_error(&delete_user(), &mut result, Some(&info), false);
        assert_eq!(
            result.faults[0].discriminant.as_deref(),
            Some("UserController.delete:88 DELETE:/users/{id}")
        );
    }

    #[test]
    fn white_box_500_without_statement_blames_the_framework() {
        let mut result = CallResult::new("d");
        result.status = Some(500);
        detect_server_error(&delete_user(), &mut result, None, false);
        assert_eq!(
            result.faults[0].discriminant.as_deref(),
            Some("framework_code DELETE:/users/{id}")
        );
    }

    #[test]
    fn black_box_500_has_no_discriminant() {
        let mut result = CallResult::new("d");
        result.status = Some(500);
        detect_server_error(&delete_user(), &mut result, None, true);
        assert_eq!(result.faults.len(), 1);
        assert!(result.faults[0].discriminant.is_none());
        result.faults.clear();
        result.status = Some(503);
        detect_server_error(&delete_user(), &mut result, None, true);
        assert!(result.faults.is_empty());
    }
}
