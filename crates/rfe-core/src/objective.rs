// SPDX-License-Identifier: MIT OR Apache-2.0
//! Objective ids.
//!
//! Every id is a pure function of stable inputs (call names, type ids,
//! parameter names, observed values) so that identical executions yield
//! identical ids across runs.

/// Status code returned by a call: `"<status>:<name>"`, `-1` when none.
pub fn status(status: i32, call_name: &str) -> String {
    format!("{status}:{call_name}")
}

/// Graded success objective of a call.
pub fn http_success(call_name: &str) -> String {
    format!("HTTP_SUCCESS:{call_name}")
}

/// Graded server-fault objective of a call.
pub fn http_fault(call_name: &str) -> String {
    format!("HTTP_FAULT:{call_name}")
}

/// Credentials answered with 401.
pub fn wrong_authorization(call_name: &str) -> String {
    format!("wrong_authorization:{call_name}")
}

/// Outcome of a call under given credentials; `outcome` is `2xx`, `401` or
/// `403`.
pub fn auth_outcome(auth_name: &str, call_name: &str, outcome: &str) -> String {
    format!("Auth:{auth_name}:{call_name}:{outcome}")
}

/// A link was followed into a call of this type.
pub fn link_followed(action_id: &str, success: bool) -> String {
    if success {
        format!("LINK_FOLLOWED_SUCCESS_{action_id}")
    } else {
        format!("LINK_FOLLOWED_{action_id}")
    }
}

/// A query parameter was sent (`present`) or omitted.
pub fn query_param(action_id: &str, param: &str, present: bool, success: bool) -> String {
    let infix = if success { "SUCCESS_" } else { "" };
    format!("QUERY_PARAM_{infix}{present}_{param}_{action_id}")
}

/// A value class of an input leaf was exercised.
pub fn input_value(
    action_id: &str,
    param_kind: &str,
    param: &str,
    gene: &str,
    value_class: &str,
    success: bool,
) -> String {
    let infix = if success { "SUCCESS_" } else { "" };
    format!("INPUT_{action_id}_{param_kind}_{param}_{gene}_{infix}{value_class}")
}

/// A response of a given media type came back; `None` when the response
/// declared none.
pub fn response_payload(action_id: &str, body_type: Option<&str>) -> String {
    let body_type = body_type.unwrap_or("null");
    format!("RESPONSE_BODY_PAYLOAD_{action_id}_{body_type}")
}

/// A schema example was used.
pub fn example(action_id: &str, param: &str, label: &str) -> String {
    format!("EXAMPLE_{action_id}_{param}_{label}")
}

/// A GET/DELETE/GET triple was checked on this DELETE.
pub fn check_delete(call_name: &str) -> String {
    format!("checkdelete:{call_name}")
}
