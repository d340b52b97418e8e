// SPDX-License-Identifier: MIT OR Apache-2.0
//! Feeding values from earlier responses into later calls.

use rfe_core::{CallResult, Individual, Link, LinkExpression, Param};
use rfe_error::EngineError;
use tracing::debug;

/// Result of binding a call's backward link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The call has no backward link.
    NotRequested,
    /// Parameters were overwritten from the source response.
    Applied,
    /// The link could not be followed; the call is unchanged.
    Unresolved,
}

/// Bind the backward link of call `index` against the earlier `results`.
///
/// The source is the nearest preceding call of the referenced type whose
/// response had the referenced status. If it declares no link with the
/// referenced id the individual is malformed. If a value cannot be
/// extracted or does not fit its parameter, nothing is modified and the
/// reference is marked unused.
pub fn bind_backward_link(
    individual: &mut Individual,
    results: &[CallResult],
    index: usize,
) -> Result<LinkOutcome, EngineError> {
    let Some(reference) = individual
        .calls
        .get(index)
        .and_then(|c| c.backward_link.clone())
    else {
        return Ok(LinkOutcome::NotRequested);
    };

    let source = (0..index.min(results.len())).rev().find(|&j| {
        individual.calls[j].id == reference.source_action_id
            && results[j].status == Some(reference.status_code)
    });
    let Some(source) = source else {
        debug!(
            target: "rfe.fitness",
            index,
            source = %reference.source_action_id,
            "no earlier call to follow the link from"
        );
        return Ok(unresolved(individual, index));
    };

    let source_call = &individual.calls[source];
    let link = source_call
        .links
        .iter()
        .find(|l| l.id == reference.source_link_id)
        .cloned()
        .ok_or_else(|| {
            EngineError::structure(format!(
                "link '{}' is not declared on {}",
                reference.source_link_id,
                source_call.name()
            ))
            .with_context("call_index", index)
        })?;
    let source_local_id = source_call.local_id.clone();

    let Some(params) = linked_params(&individual.calls[index].params, &link, &results[source])
    else {
        debug!(target: "rfe.fitness", index, link = %link.id, "link values could not be applied");
        return Ok(unresolved(individual, index));
    };

    let call = &mut individual.calls[index];
    call.params = params;
    if let Some(reference) = call.backward_link.as_mut() {
        reference.actual_source_local_id = Some(source_local_id);
    }
    Ok(LinkOutcome::Applied)
}

fn unresolved(individual: &mut Individual, index: usize) -> LinkOutcome {
    if let Some(reference) = individual.calls[index].backward_link.as_mut() {
        reference.actual_source_local_id = None;
    }
    LinkOutcome::Unresolved
}

/// `params` with every link parameter set, or `None` if any binding fails.
fn linked_params(params: &[Param], link: &Link, source: &CallResult) -> Option<Vec<Param>> {
    let mut updated = params.to_vec();
    for binding in &link.parameters {
        let value = extract(&binding.expression, source)?;
        let param = updated
            .iter_mut()
            .find(|p| !matches!(p, Param::Body(_)) && p.name() == binding.name)?;
        if !param.gene_mut().set_from_raw(&value) {
            return None;
        }
    }
    Some(updated)
}

fn extract(expression: &LinkExpression, source: &CallResult) -> Option<String> {
    match expression {
        LinkExpression::ResponseHeader { name } => source.header(name).map(str::to_string),
        LinkExpression::ResponseBody { pointer } => {
            let body: serde_json::Value = serde_json::from_str(source.body.as_deref()?).ok()?;
            match body.pointer(pointer)? {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfe_core::{BackwardLinkReference, Gene, HttpVerb, LinkParameter, RestCall};

    fn create() -> RestCall {
        RestCall::new("c1", HttpVerb::Post, "/users").with_link(Link {
            id: "GetUser".into(),
            status_code: 201,
            target_action_id: "GET:/users/{id}".into(),
            parameters: vec![LinkParameter {
                name: "id".into(),
                expression: LinkExpression::ResponseBody {
                    pointer: "/id".into(),
                },
            }],
        })
    }

    fn read(link_id: &str) -> RestCall {
        RestCall::new("c2", HttpVerb::Get, "/users/{id}")
            .with_param(Param::path(Gene::integer("id", 0)))
            .with_backward_link(BackwardLinkReference {
                source_action_id: "POST:/users".into(),
                source_link_id: link_id.into(),
                status_code: 201,
                actual_source_local_id: Some("stale".into()),
            })
    }

    fn created(body: &str) -> CallResult {
        let mut r = CallResult::new("c1");
        r.status = Some(201);
        r.body = Some(body.into());
        r
    }

    #[test]
    fn body_value_is_applied() {
        let mut ind = Individual::new(vec![create(), read("GetUser")]);
        let outcome = bind_backward_link(&mut ind, &[created(r#"{"id":42}"#)], 1).unwrap();
        assert_eq!(outcome, LinkOutcome::Applied);
        assert_eq!(ind.calls[1].resolved_path(), "/users/42");
        assert_eq!(
            ind.calls[1].backward_link.as_ref().unwrap().actual_source_local_id.as_deref(),
            Some("c1")
        );
    }

    #[test]
    fn header_value_is_applied() {
        let mut ind = Individual::new(vec![
            RestCall::new("c1", HttpVerb::Post, "/users").with_link(Link {
                id: "ByHeader".into(),
                status_code: 201,
                target_action_id: "GET:/users/{id}".into(),
                parameters: vec![LinkParameter {
                    name: "id".into(),
                    expression: LinkExpression::ResponseHeader {
                        name: "X-Id".into(),
                    },
                }],
            }),
            read("ByHeader"),
        ]);
        let mut source = created("");
        source.headers.push(("x-id".into(), "9".into()));
        assert_eq!(bind_backward_link(&mut ind, &[source], 1).unwrap(), LinkOutcome::Applied);
        assert_eq!(ind.calls[1].resolved_path(), "/users/9");
    }

    #[test]
    fn status_mismatch_leaves_call_untouched() {
        let mut ind = Individual::new(vec![create(), read("GetUser")]);
        let mut failed = created(r#"{"id":42}"#);
        failed.status = Some(400);
        let before = ind.calls[1].params.clone();
        assert_eq!(bind_backward_link(&mut ind, &[failed], 1).unwrap(), LinkOutcome::Unresolved);
        assert_eq!(ind.calls[1].params, before);
        assert!(!ind.calls[1].backward_link.as_ref().unwrap().is_in_use());
    }

    #[test]
    fn value_of_wrong_shape_is_not_applied() {
        let mut ind = Individual::new(vec![create(), read("GetUser")]);
        let outcome = bind_backward_link(&mut ind, &[created(r#"{"id":"abc"}"#)], 1).unwrap();
        assert_eq!(outcome, LinkOutcome::Unresolved);
        assert_eq!(ind.calls[1].resolved_path(), "/users/0");
    }

    #[test]
    fn undeclared_link_is_a_structure_error() {
        let mut ind = Individual::new(vec![create(), read("Nope")]);
        let err = bind_backward_link(&mut ind, &[created("{}")], 1).unwrap_err();
        assert_eq!(err.code, rfe_error::ErrorCode::InvalidActionStructure);
    }

    #[test]
    fn no_reference_means_nothing_to_do() {
        let mut ind = Individual::new(vec![create()]);
        assert_eq!(bind_backward_link(&mut ind, &[], 0).unwrap(), LinkOutcome::NotRequested);
    }
}
