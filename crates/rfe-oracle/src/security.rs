// SPDX-License-Identifier: MIT OR Apache-2.0
//! Access-control checks across calls.

use crate::{SecurityOracle, executed, result_of};
use rfe_core::{CallResult, HttpVerb, Individual, RestCall, RestPath, StatusGroup};

/// Default [`SecurityOracle`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSecurityOracle;

fn refused(result: &CallResult) -> bool {
    matches!(result.status, Some(401) | Some(403))
}

impl SecurityOracle for DefaultSecurityOracle {
    fn has_forbidden_operation(
        &self,
        verb: HttpVerb,
        individual: &Individual,
        results: &[CallResult],
    ) -> bool {
        let calls = &individual.calls;
        let [.., refused_call, last] = calls.as_slice() else {
            return false;
        };
        let (Some(refused_result), Some(last_result)) =
            (result_of(results, refused_call), result_of(results, last))
        else {
            return false;
        };

        refused_call.verb == verb
            && refused_result.status == Some(403)
            && verb.other_write_operations().any(|v| v == last.verb)
            && last_result.is_success()
            && last.uses_same_resolved_path(refused_call)
            && last.same_auth(refused_call)
    }

    fn has_existence_leakage(
        &self,
        path: &RestPath,
        individual: &Individual,
        results: &[CallResult],
    ) -> bool {
        let statuses: Vec<Option<u16>> = executed(individual, results)
            .filter(|(c, _)| c.verb == HttpVerb::Get && &c.path == path)
            .map(|(_, r)| r.status)
            .collect();
        statuses.contains(&Some(403)) && statuses.contains(&Some(404))
    }

    fn has_forgotten_authentication(
        &self,
        endpoint: &str,
        individual: &Individual,
        results: &[CallResult],
    ) -> bool {
        let on_endpoint: Vec<_> = executed(individual, results)
            .filter(|(c, _)| c.name() == endpoint)
            .collect();
        let protected = on_endpoint.iter().any(|(c, r)| c.has_auth() && refused(r));
        let open = on_endpoint
            .iter()
            .any(|(c, r)| !c.has_auth() && r.is_success());
        protected && open
    }

    fn has_not_recognized_authenticated(
        &self,
        call: &RestCall,
        individual: &Individual,
        results: &[CallResult],
    ) -> bool {
        let Some(result) = result_of(results, call) else {
            return false;
        };
        if !call.has_auth() || result.status != Some(401) {
            return false;
        }
        // The same credentials worked on an endpoint that does check them.
        executed(individual, results)
            .filter(|(c, r)| c.same_auth(call) && StatusGroup::G2xx.is_in_group(r.status))
            .any(|(ok_call, _)| {
                let endpoint = ok_call.name();
                executed(individual, results)
                    .any(|(c, r)| c.name() == endpoint && refused(r))
            })
    }
}
