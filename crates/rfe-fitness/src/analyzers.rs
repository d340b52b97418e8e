// SPDX-License-Identifier: MIT OR Apache-2.0
//! Whole-sequence analyses run after the last call.
//!
//! Oracles judge; this module only turns their verdicts into faults on the
//! right results. Results are positionally aligned with calls and may be
//! shorter than the individual when the sequence stopped early; calls
//! without a result are skipped.

use rfe_core::{
    CallResult, DetectedFault, FaultCategory, FitnessRecord, HttpVerb, Individual, RestPath,
    objective,
};
use rfe_oracle::{HttpSemanticsOracle, SecurityOracle, SsrfVerifier};
use std::collections::BTreeSet;
use tracing::{debug, warn};

fn fault_on(results: &mut [CallResult], index: usize, category: FaultCategory, endpoint: String) {
    if let Some(result) = results.get_mut(index) {
        debug!(target: "rfe.fitness", %category, %endpoint, index, "fault detected");
        result.add_fault(DetectedFault::new(category, endpoint));
    }
}

/// Access-control analyses.
pub fn analyze_security(
    oracle: &dyn SecurityOracle,
    individual: &Individual,
    results: &mut [CallResult],
) {
    let calls = &individual.calls;

    // Forbidden operation: blame the write that went through.
    if let Some(last) = calls.len().checked_sub(1) {
        let forbidden = HttpVerb::WRITE_OPERATIONS
            .into_iter()
            .any(|verb| oracle.has_forbidden_operation(verb, individual, results));
        if forbidden {
            fault_on(results, last, FaultCategory::SecurityWrongAuthorization, calls[last].name());
        }
    }

    // Existence leakage: blame every 404 GET on the path.
    let get_paths: BTreeSet<&str> = calls
        .iter()
        .filter(|c| c.verb == HttpVerb::Get)
        .map(|c| c.path.as_str())
        .collect();
    for path in get_paths {
        if !oracle.has_existence_leakage(&RestPath::new(path), individual, results) {
            continue;
        }
        let leaking: Vec<usize> = calls
            .iter()
            .zip(results.iter())
            .enumerate()
            .filter(|(_, (c, r))| c.verb == HttpVerb::Get && c.path.as_str() == path && r.status == Some(404))
            .map(|(i, _)| i)
            .collect();
        for i in leaking {
            fault_on(results, i, FaultCategory::SecurityExistenceLeakage, calls[i].name());
        }
    }

    // Forgotten authentication: blame every unauthenticated 2xx.
    let open_endpoints: BTreeSet<String> = calls
        .iter()
        .filter(|c| !c.has_auth())
        .map(|c| c.name())
        .collect();
    for endpoint in open_endpoints {
        if !oracle.has_forgotten_authentication(&endpoint, individual, results) {
            continue;
        }
        let exposed: Vec<usize> = calls
            .iter()
            .zip(results.iter())
            .enumerate()
            .filter(|(_, (c, r))| !c.has_auth() && c.name() == endpoint && r.is_success())
            .map(|(i, _)| i)
            .collect();
        for i in exposed {
            fault_on(results, i, FaultCategory::SecurityForgottenAuthentication, calls[i].name());
        }
    }

    // Not-recognized authenticated: calls cut off by an early stop have no
    // result and are not judged.
    let rejected: Vec<usize> = calls
        .iter()
        .zip(results.iter())
        .enumerate()
        .filter(|(_, (c, r))| c.has_auth() && r.status == Some(401))
        .filter(|(_, (c, _))| oracle.has_not_recognized_authenticated(c, individual, results))
        .map(|(i, _)| i)
        .collect();
    for i in rejected {
        fault_on(results, i, FaultCategory::SecurityNotRecognizedAuthenticated, calls[i].name());
    }
}

/// Turn SSRF flags into faults discriminated by the vulnerable parameter.
pub fn analyze_ssrf(verifier: &dyn SsrfVerifier, individual: &Individual, results: &mut [CallResult]) {
    for (call, result) in individual.calls.iter().zip(results.iter_mut()) {
        if !result.vulnerable_ssrf {
            continue;
        }
        let mut fault = DetectedFault::new(FaultCategory::Ssrf, call.name());
        if let Some(param) = verifier.vulnerable_parameter(call) {
            fault = fault.with_discriminant(param);
        }
        result.add_fault(fault);
    }
}

/// HTTP-semantics analyses.
pub fn analyze_http_semantics(
    oracle: &dyn HttpSemanticsOracle,
    individual: &Individual,
    results: &mut [CallResult],
    fitness: &mut dyn FitnessRecord,
) {
    let calls = &individual.calls;

    if oracle.has_repeated_create_put(individual, results)
        && let Some(last) = calls.len().checked_sub(1)
    {
        fault_on(results, last, FaultCategory::HttpRepeatedCreatePut, calls[last].name());
    }

    let check = oracle.non_working_delete(individual, results);
    if check.checking_delete {
        let delete = check.delete_index;
        let Some(call) = calls.get(delete) else {
            warn!(target: "rfe.fitness", index = delete, calls = calls.len(), "delete check points past the sequence");
            return;
        };
        let name = call.name();
        fitness.update_target(&objective::check_delete(&name), 1.0, delete);
        if check.non_working {
            fault_on(results, delete, FaultCategory::HttpNonWorkingDelete, name);
        }
    }
}

/// Score every attached fault as a covered objective.
pub fn fault_objectives(results: &[CallResult], fitness: &mut dyn FitnessRecord) {
    for (index, result) in results.iter().enumerate() {
        for fault in &result.faults {
            fitness.update_target(&fault.target_id(), 1.0, index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfe_core::{AuthInfo, FitnessValue, Gene, Param, RestCall};
    use rfe_oracle::{DefaultHttpSemanticsOracle, DefaultSecurityOracle, DeleteCheck, InMemorySsrfVerifier};

    fn item(id: &str, verb: HttpVerb, auth: Option<&str>) -> RestCall {
        let call = RestCall::new(id, verb, "/items/{id}").with_param(Param::path(Gene::integer("id", 3)));
        match auth {
            Some(a) => call.with_auth(AuthInfo::with_headers(a, vec![])),
            None => call,
        }
    }

    fn result(id: &str, status: u16) -> CallResult {
        let mut r = CallResult::new(id);
        r.status = Some(status);
        r
    }

    fn categories(results: &[CallResult]) -> Vec<Vec<FaultCategory>> {
        results
            .iter()
            .map(|r| r.faults.iter().map(|f| f.category).collect())
            .collect()
    }

    #[test]
    fn forbidden_operation_blames_last_call() {
        let ind = Individual::new(vec![
            item("1", HttpVerb::Delete, Some("bob")),
            item("2", HttpVerb::Patch, Some("bob")),
        ]);
        let mut results = vec![result("1", 403), result("2", 200)];
        analyze_security(&DefaultSecurityOracle, &ind, &mut results);
        assert_eq!(
            categories(&results),
            vec![vec![], vec![FaultCategory::SecurityWrongAuthorization]]
        );
    }

    #[test]
    fn existence_leakage_blames_404s() {
        let ind = Individual::new(vec![
            item("1", HttpVerb::Get, Some("bob")),
            item("2", HttpVerb::Get, Some("eve")),
        ]);
        let mut results = vec![result("1", 403), result("2", 404)];
        analyze_security(&DefaultSecurityOracle, &ind, &mut results);
        assert_eq!(
            categories(&results),
            vec![vec![], vec![FaultCategory::SecurityExistenceLeakage]]
        );
    }

    #[test]
    fn forgotten_authentication_blames_open_calls() {
        let ind = Individual::new(vec![
            item("1", HttpVerb::Get, Some("bob")),
            item("2", HttpVerb::Get, None),
        ]);
        let mut results = vec![result("1", 401), result("2", 200)];
        analyze_security(&DefaultSecurityOracle, &ind, &mut results);
        assert_eq!(
            categories(&results),
            vec![vec![], vec![FaultCategory::SecurityForgottenAuthentication]]
        );
    }

    #[test]
    fn not_recognized_survives_an_early_stop() {
        let bob = || AuthInfo::with_headers("bob", vec![]);
        let ind = Individual::new(vec![
            item("1", HttpVerb::Get, None),
            item("2", HttpVerb::Get, Some("bob")),
            RestCall::new("3", HttpVerb::Get, "/other").with_auth(bob()),
            RestCall::new("4", HttpVerb::Get, "/slow").with_auth(bob()),
        ]);
        let mut timed_out = CallResult::new("4");
        timed_out.timed_out = true;
        timed_out.stopping = Some(rfe_core::StopReason::Timeout);
        let mut results = vec![result("1", 401), result("2", 200), result("3", 401), timed_out];
        analyze_security(&DefaultSecurityOracle, &ind, &mut results);
        assert_eq!(
            categories(&results)[2],
            vec![FaultCategory::SecurityNotRecognizedAuthenticated]
        );
        assert!(results[3].faults.is_empty());
    }

    #[test]
    fn not_recognized_skips_calls_without_result() {
        let bob = || AuthInfo::with_headers("bob", vec![]);
        let ind = Individual::new(vec![
            item("1", HttpVerb::Get, None),
            item("2", HttpVerb::Get, Some("bob")),
            RestCall::new("3", HttpVerb::Get, "/other").with_auth(bob()),
        ]);
        let mut results = vec![result("1", 401), result("2", 200)];
        analyze_security(&DefaultSecurityOracle, &ind, &mut results);
        assert!(results.iter().all(|r| r.faults.is_empty()));
    }

    #[test]
    fn missing_results_are_tolerated() {
        let ind = Individual::new(vec![
            item("1", HttpVerb::Delete, Some("bob")),
            item("2", HttpVerb::Put, Some("bob")),
        ]);
        let mut results = vec![result("1", 403)];
        analyze_security(&DefaultSecurityOracle, &ind, &mut results);
        assert!(results[0].faults.is_empty());
    }

    #[test]
    fn ssrf_fault_names_parameter() {
        let ind = Individual::new(vec![item("1", HttpVerb::Get, None)]);
        let verifier = InMemorySsrfVerifier::new();
        verifier.record_hit("1", "callbackUrl");
        let mut results = vec![result("1", 200)];
        results[0].vulnerable_ssrf = true;
        analyze_ssrf(&verifier, &ind, &mut results);
        let fault = &results[0].faults[0];
        assert_eq!(fault.category, FaultCategory::Ssrf);
        assert_eq!(fault.discriminant.as_deref(), Some("callbackUrl"));
        assert!(fault.detail.is_none());
        assert_eq!(fault.target_id(), "PotentialFault_SSRF_GET:/items/{id}");
    }

    #[test]
    fn non_working_delete_scores_and_blames_delete() {
        let ind = Individual::new(vec![
            item("1", HttpVerb::Get, None),
            item("2", HttpVerb::Delete, None),
            item("3", HttpVerb::Get, None),
        ]);
        let mut results = vec![result("1", 200), result("2", 204), result("3", 200)];
        results[2].body = Some(r#"{"id":3}"#.into());
        let mut fitness = FitnessValue::new();
        analyze_http_semantics(&DefaultHttpSemanticsOracle, &ind, &mut results, &mut fitness);
        assert!(fitness.is_covered("checkdelete:DELETE:/items/{id}"));
        assert_eq!(fitness.get("checkdelete:DELETE:/items/{id}").unwrap().call_index, Some(1));
        assert_eq!(categories(&results)[1], vec![FaultCategory::HttpNonWorkingDelete]);
    }

    struct OutOfRangeDelete;

    impl HttpSemanticsOracle for OutOfRangeDelete {
        fn has_repeated_create_put(&self, _: &Individual, _: &[CallResult]) -> bool {
            false
        }

        fn non_working_delete(&self, _: &Individual, _: &[CallResult]) -> DeleteCheck {
            DeleteCheck {
                checking_delete: true,
                non_working: true,
                delete_index: 99,
            }
        }
    }

    #[test]
    fn delete_check_past_the_sequence_is_ignored() {
        let ind = Individual::new(vec![item("1", HttpVerb::Get, None), item("2", HttpVerb::Delete, None)]);
        let mut results = vec![result("1", 200), result("2", 204)];
        let mut fitness = FitnessValue::new();
        analyze_http_semantics(&OutOfRangeDelete, &ind, &mut results, &mut fitness);
        assert!(fitness.is_empty());
        assert!(results.iter().all(|r| r.faults.is_empty()));
    }

    #[test]
    fn repeated_put_blames_last_call() {
        let ind = Individual::new(vec![item("1", HttpVerb::Put, None), item("2", HttpVerb::Put, None)]);
        let mut results = vec![result("1", 201), result("2", 201)];
        let mut fitness = FitnessValue::new();
        analyze_http_semantics(&DefaultHttpSemanticsOracle, &ind, &mut results, &mut fitness);
        assert_eq!(categories(&results)[1], vec![FaultCategory::HttpRepeatedCreatePut]);
        assert!(fitness.is_empty());
    }

    #[test]
    fn faults_become_objectives() {
        let mut results = vec![result("1", 500)];
        results[0].add_fault(DetectedFault::new(FaultCategory::Http500, "GET:/a"));
        let mut fitness = FitnessValue::new();
        fault_objectives(&results, &mut fitness);
        assert!(fitness.is_covered("PotentialFault_HTTP_STATUS_500_GET:/a"));
    }
}
