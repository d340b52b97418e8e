// SPDX-License-Identifier: MIT OR Apache-2.0
//! Growing individuals with inputs the server was seen to read.
//!
//! Everything added here is switched off (inactive optionals, bodies
//! pending an update), so the fitness just computed for the individual
//! stays valid.

use rfe_core::{
    APPLICATION_JSON, ActionExecutionInfo, BodyParam, CallResult, Gene, Individual, Param,
};
use rfe_error::{EngineError, ErrorCode};
use rfe_oracle::DtoSource;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Standard request headers; reading one of these says nothing about the
/// API's own inputs. Lower case.
pub const KNOWN_HTTP_HEADERS: &[&str] = &[
    "a-im",
    "accept",
    "accept-charset",
    "accept-datetime",
    "accept-encoding",
    "accept-language",
    "access-control-request-headers",
    "access-control-request-method",
    "authorization",
    "cache-control",
    "connection",
    "content-encoding",
    "content-length",
    "content-md5",
    "content-type",
    "cookie",
    "date",
    "expect",
    "forwarded",
    "from",
    "host",
    "http2-settings",
    "if-match",
    "if-modified-since",
    "if-none-match",
    "if-range",
    "if-unmodified-since",
    "max-forwards",
    "origin",
    "pragma",
    "prefer",
    "proxy-authorization",
    "range",
    "referer",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "user-agent",
    "via",
    "warning",
    "www-authenticate",
];

/// Form field used by frameworks to override the HTTP method.
const METHOD_OVERRIDE_FIELD: &str = "_method";

/// Whether `name` is a standard request header, case-insensitively.
pub fn is_known_header(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    KNOWN_HTTP_HEADERS.contains(&lower.as_str())
}

/// Add parameters observed at runtime to `individual`.
///
/// `infos` and `results` are positionally aligned with the executed calls.
/// Returns the number of parameters added.
pub fn expand_individual(
    individual: &mut Individual,
    infos: &[ActionExecutionInfo],
    results: &[CallResult],
    dtos: Option<&dyn DtoSource>,
) -> Result<usize, EngineError> {
    if individual.calls.len() < infos.len() {
        warn!(
            target: "rfe.fitness",
            calls = individual.calls.len(),
            infos = infos.len(),
            "more execution reports than calls, not expanding"
        );
        return Ok(0);
    }

    let mut added = 0;
    for (index, info) in infos.iter().enumerate() {
        let call = &mut individual.calls[index];

        for header in &info.headers {
            if is_known_header(header) || call.has_header(header) {
                continue;
            }
            call.params.push(Param::header(Gene::optional(Gene::text(header.as_str(), ""), false)));
            added += 1;
        }

        let form_fields: HashSet<String> = call.form_fields().map(|g| g.name.clone()).collect();
        for query in &info.query_parameters {
            if query == METHOD_OVERRIDE_FIELD || form_fields.contains(query) || call.has_query(query) {
                continue;
            }
            call.params.push(Param::query(Gene::optional(Gene::text(query.as_str(), ""), false)));
            added += 1;
        }

        let unsupported_media = results.get(index).is_some_and(|r| r.status == Some(415));
        if unsupported_media && call.body().is_none() {
            call.params.push(Param::Body(pending_body(Gene::object("body", vec![]))));
            added += 1;
        }

        let body_is_empty = call.body().is_none_or(|b| b.gene.is_empty_object());
        if info.raw_access_of_http_body_payload && !info.parsed_dto_names.is_empty() && body_is_empty {
            if info.parsed_dto_names.len() > 1 {
                warn!(
                    target: "rfe.fitness",
                    endpoint = %call.name(),
                    dtos = ?info.parsed_dto_names,
                    "body parsed as several DTOs, using the first"
                );
            }
            let Some(dtos) = dtos else {
                debug!(target: "rfe.fitness", endpoint = %call.name(), "no DTO source to build a body from");
                continue;
            };
            let Some(name) = info.parsed_dto_names.iter().next() else {
                continue;
            };
            let gene = dtos.gene_for_dto(name).ok_or_else(|| {
                EngineError::new(ErrorCode::MissingDto, format!("no schema for DTO '{name}'"))
                    .with_context("endpoint", call.name())
            })?;
            match call.body_mut() {
                Some(body) => body.gene = gene,
                None => {
                    call.params.push(Param::Body(pending_body(gene)));
                    added += 1;
                }
            }
        }
    }

    if added > 0 {
        debug!(target: "rfe.fitness", added, "individual expanded");
    }
    Ok(added)
}

fn pending_body(gene: Gene) -> BodyParam {
    let mut body = BodyParam::new(gene, &[APPLICATION_JSON]);
    body.pending_update = true;
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfe_core::{HttpVerb, RestCall};

    struct OneDto;

    impl DtoSource for OneDto {
        fn gene_for_dto(&self, name: &str) -> Option<Gene> {
            (name == "UserDto").then(|| Gene::object("body", vec![Gene::text("name", "x")]))
        }
    }

    fn info() -> ActionExecutionInfo {
        ActionExecutionInfo::default()
    }

    #[test]
    fn unknown_headers_and_queries_are_added_inactive() {
        let mut ind = Individual::new(vec![
            RestCall::new("a", HttpVerb::Post, "/login")
                .with_param(Param::header(Gene::text("X-Known", "1")))
                .with_param(Param::form(Gene::text("user", "u"))),
        ]);
        let mut observed = info();
        observed.headers = ["Accept", "x-known", "X-Tenant"].map(String::from).into();
        observed.query_parameters = ["user", "_method", "debug"].map(String::from).into();

        let added = expand_individual(&mut ind, &[observed], &[], None).unwrap();
        assert_eq!(added, 2);
        let call = &ind.calls[0];
        assert!(call.has_header("X-Tenant"));
        assert!(call.has_query("debug"));
        assert!(!call.has_query("user"));
        assert!(call.params.iter().skip(2).all(|p| !p.gene().is_active()));
        assert_eq!(call.resolved_path(), "/login");
    }

    #[test]
    fn unsupported_media_type_adds_pending_body() {
        let mut ind = Individual::new(vec![RestCall::new("a", HttpVerb::Post, "/items")]);
        let mut rejected = CallResult::new("a");
        rejected.status = Some(415);
        expand_individual(&mut ind, &[info()], &[rejected], None).unwrap();
        let body = ind.calls[0].body().unwrap();
        assert!(body.pending_update);
        assert_eq!(body.media_type(), APPLICATION_JSON);
        assert!(body.gene.is_empty_object());
    }

    #[test]
    fn raw_body_access_builds_body_from_dto() {
        let mut ind = Individual::new(vec![RestCall::new("a", HttpVerb::Post, "/users")]);
        let mut observed = info();
        observed.raw_access_of_http_body_payload = true;
        observed.parsed_dto_names.insert("UserDto".into());
        expand_individual(&mut ind, &[observed], &[], Some(&OneDto)).unwrap();
        let body = ind.calls[0].body().unwrap();
        assert_eq!(body.gene.to_json(), serde_json::json!({"name": "x"}));
    }

    #[test]
    fn unknown_dto_is_an_error() {
        let mut ind = Individual::new(vec![RestCall::new("a", HttpVerb::Post, "/users")]);
        let mut observed = info();
        observed.raw_access_of_http_body_payload = true;
        observed.parsed_dto_names.insert("Ghost".into());
        let err = expand_individual(&mut ind, &[observed], &[], Some(&OneDto)).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingDto);
    }

    #[test]
    fn too_many_reports_skips_expansion() {
        let mut ind = Individual::new(vec![]);
        let mut observed = info();
        observed.headers.insert("X-Tenant".into());
        assert_eq!(expand_individual(&mut ind, &[observed], &[], None).unwrap(), 0);
    }

    #[test]
    fn header_table_is_case_insensitive() {
        assert!(is_known_header("User-Agent"));
        assert!(!is_known_header("X-Api-Key"));
    }
}
