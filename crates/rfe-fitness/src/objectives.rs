// SPDX-License-Identifier: MIT OR Apache-2.0
//! Objectives derived from executed calls.

use crate::classifier;
use rfe_config::EngineConfig;
use rfe_core::{
    ActionExecutionInfo, CallResult, FitnessRecord, Individual, Param, RestCall, StatusGroup,
    objective,
};

/// Scores of `HTTP_SUCCESS` and `HTTP_FAULT` for a status family.
///
/// A 2xx still pays half towards faults and a 5xx half towards success, so
/// neither objective loses its gradient once the other is reached.
pub fn graded_scores(status: Option<u16>) -> Option<(f64, f64)> {
    match StatusGroup::of(status?)? {
        StatusGroup::G2xx => Some((1.0, 0.5)),
        StatusGroup::G4xx => Some((0.1, 0.1)),
        StatusGroup::G5xx => Some((0.5, 1.0)),
        StatusGroup::G1xx | StatusGroup::G3xx => None,
    }
}

/// Record every per-call objective of an executed sequence and attach
/// 500 faults.
///
/// `results` are positionally aligned with `individual.calls` and may be
/// shorter when the sequence stopped early. `infos` holds the controller's
/// execution details in white-box mode and is empty otherwise.
pub fn map_objectives(
    config: &EngineConfig,
    individual: &Individual,
    results: &mut [CallResult],
    infos: &[ActionExecutionInfo],
    fitness: &mut dyn FitnessRecord,
) {
    let auth_configured = !individual.authentications().is_empty();

    for (index, (call, result)) in individual.calls.iter().zip(results.iter_mut()).enumerate() {
        let name = call.name();

        fitness.update_target(&objective::status(result.status_or_missing(), &name), 1.0, index);
        if let Some((success, fault)) = graded_scores(result.status) {
            fitness.update_target(&objective::http_success(&name), success, index);
            fitness.update_target(&objective::http_fault(&name), fault, index);
        }

        classifier::detect_server_error(call, result, infos.get(index), config.is_black_box());

        let mock_handled = call.auth.as_ref().is_some_and(|a| a.require_mock_handling);
        if result.status == Some(401) && call.has_auth() && !mock_handled {
            fitness.update_target(&objective::wrong_authorization(&name), 1.0, index);
        }

        if config.security && auth_configured {
            let outcome = match result.status {
                Some(s) if StatusGroup::of(s) == Some(StatusGroup::G2xx) => Some("2xx"),
                Some(401) if !mock_handled => Some("401"),
                Some(403) => Some("403"),
                _ => None,
            };
            if let Some(outcome) = outcome {
                let id = objective::auth_outcome(call.auth_name(), &name, outcome);
                fitness.update_target(&id, 1.0, index);
            }
        }

        if config.advanced_black_box_coverage {
            advanced_objectives(call, result, fitness);
        }
    }
}

/// Presence objectives: links followed, query parameters sent or omitted,
/// value classes of inputs, response media types and examples used.
///
/// Body payloads are left out of the value classes; only the selected
/// content type of a body counts.
fn advanced_objectives(call: &RestCall, result: &CallResult, fitness: &mut dyn FitnessRecord) {
    let id = call.id.as_str();
    let success = result.is_success();
    let mut cover = |target: String| fitness.cover_target(&target);

    if result.applied_link {
        cover(objective::link_followed(id, false));
        if success {
            cover(objective::link_followed(id, true));
        }
    }

    for param in &call.params {
        let gene = param.gene();
        match param {
            Param::Query { .. } => {
                let present = gene.is_active();
                cover(objective::query_param(id, &gene.name, present, false));
                if success {
                    cover(objective::query_param(id, &gene.name, present, true));
                }
            }
            Param::Path { .. } | Param::Header { .. } | Param::Form { .. } | Param::Body(_) => {}
        }

        let valued = match param {
            Param::Body(body) => &body.content_type,
            _ => gene,
        };
        for leaf in valued.impacting_leaves() {
            let Some(class) = leaf.value_class() else {
                continue;
            };
            let kind = param.kind_label();
            cover(objective::input_value(id, kind, param.name(), &leaf.name, &class, false));
            if success {
                cover(objective::input_value(id, kind, param.name(), &leaf.name, &class, true));
            }
        }

        for (parent, label) in gene.examples(param.name()) {
            cover(objective::example(id, &parent, &label));
        }
    }

    cover(objective::response_payload(id, result.body_type.as_deref()));
}
