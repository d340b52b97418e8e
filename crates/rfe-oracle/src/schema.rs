// SPDX-License-Identifier: MIT OR Apache-2.0
//! Response validation against declared JSON schemas.

use crate::{OracleError, SchemaOracle, ValidationMessage};
use rfe_core::{CallResult, RestCall};
use std::collections::HashMap;

const KEY_PREFIX: &str = "validation.response";

/// [`SchemaOracle`] backed by the `jsonschema` crate.
///
/// Responses are declared per call type id and status. A status that is not
/// declared for a known operation is itself a violation.
#[derive(Default)]
pub struct JsonSchemaOracle {
    responses: HashMap<String, HashMap<u16, Option<jsonschema::Validator>>>,
}

impl JsonSchemaOracle {
    /// Oracle with no declared responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that `action_id` may answer `status`, with a body matching
    /// `schema` when one is given.
    pub fn with_response(
        mut self,
        action_id: impl Into<String>,
        status: u16,
        schema: Option<&serde_json::Value>,
    ) -> Result<Self, OracleError> {
        let action_id = action_id.into();
        let validator = schema
            .map(|s| {
                jsonschema::validator_for(s).map_err(|e| OracleError::InvalidSchema {
                    endpoint: action_id.clone(),
                    status,
                    reason: e.to_string(),
                })
            })
            .transpose()?;
        self.responses
            .entry(action_id)
            .or_default()
            .insert(status, validator);
        Ok(self)
    }
}

impl SchemaOracle for JsonSchemaOracle {
    fn validate(
        &self,
        call: &RestCall,
        result: &CallResult,
    ) -> Result<Vec<ValidationMessage>, OracleError> {
        let (Some(declared), Some(status)) = (self.responses.get(&call.id), result.status) else {
            return Ok(Vec::new());
        };
        let Some(validator) = declared.get(&status) else {
            return Ok(vec![ValidationMessage {
                key: format!("{KEY_PREFIX}.status.unknown"),
                message: format!("status {status} is not declared for {}", call.name()),
            }]);
        };
        let (Some(validator), Some(body)) = (validator, result.body.as_deref()) else {
            return Ok(Vec::new());
        };
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        let instance: serde_json::Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(e) => {
                return Ok(vec![ValidationMessage {
                    key: format!("{KEY_PREFIX}.body.schema.invalidJson"),
                    message: e.to_string(),
                }]);
            }
        };

        Ok(validator
            .iter_errors(&instance)
            .map(|e| ValidationMessage {
                key: format!("{KEY_PREFIX}.body.schema.{}", keyword(&format!("{:?}", e.kind))),
                message: e.to_string(),
            })
            .collect())
    }
}

/// Schema keyword from the debug rendering of an error kind:
/// `AdditionalProperties { .. }` becomes `additionalProperties`.
fn keyword(kind_debug: &str) -> String {
    let name: String = kind_debug
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfe_core::HttpVerb;
    use serde_json::json;

    fn oracle() -> JsonSchemaOracle {
        let schema = json!({
            "type": "object",
            "required": ["id", "name"],
            "properties": {"id": {"type": "integer"}, "name": {"type": "string"}},
            "additionalProperties": false
        });
        JsonSchemaOracle::new()
            .with_response("GET:/users/{id}", 200, Some(&schema))
            .unwrap()
            .with_response("GET:/users/{id}", 404, None)
            .unwrap()
    }

    fn result(status: u16, body: &str) -> CallResult {
        let mut r = CallResult::new("1");
        r.status = Some(status);
        r.body = Some(body.to_string());
        r
    }

    fn call() -> RestCall {
        RestCall::new("1", HttpVerb::Get, "/users/{id}")
    }

    #[test]
    fn valid_body_has_no_messages() {
        let msgs = oracle().validate(&call(), &result(200, r#"{"id":1,"name":"a"}"#)).unwrap();
        assert!(msgs.is_empty());
    }

    #[test]
    fn violations_are_keyed_by_keyword() {
        let msgs = oracle()
            .validate(&call(), &result(200, r#"{"id":"x","extra":true}"#))
            .unwrap();
        let keys: Vec<_> = msgs.iter().map(|m| m.key.as_str()).collect();
        assert!(keys.contains(&"validation.response.body.schema.type"), "{keys:?}");
        assert!(keys.contains(&"validation.response.body.schema.required"), "{keys:?}");
        assert!(
            keys.contains(&"validation.response.body.schema.additionalProperties"),
            "{keys:?}"
        );
    }

    #[test]
    fn undeclared_status_is_reported() {
        let msgs = oracle().validate(&call(), &result(500, "")).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].key, "validation.response.status.unknown");
    }

    #[test]
    fn declared_status_without_schema_accepts_anything() {
        assert!(oracle().validate(&call(), &result(404, "<html/>")).unwrap().is_empty());
    }

    #[test]
    fn unknown_operation_is_skipped() {
        let other = RestCall::new("1", HttpVerb::Post, "/other");
        assert!(oracle().validate(&other, &result(500, "x")).unwrap().is_empty());
    }

    #[test]
    fn non_json_body_is_reported() {
        let msgs = oracle().validate(&call(), &result(200, "<html/>")).unwrap();
        assert_eq!(msgs[0].key, "validation.response.body.schema.invalidJson");
    }

    #[test]
    fn broken_schema_is_rejected() {
        let err = JsonSchemaOracle::new()
            .with_response("GET:/a", 200, Some(&json!({"type": 12})))
            .err()
            .unwrap();
        assert!(matches!(err, OracleError::InvalidSchema { status: 200, .. }));
    }

    #[test]
    fn keyword_extraction() {
        assert_eq!(keyword("AdditionalProperties { unexpected: [] }"), "additionalProperties");
        assert_eq!(keyword("Required { property: String(\"x\") }"), "required");
        assert_eq!(keyword(""), "unknown");
    }
}
