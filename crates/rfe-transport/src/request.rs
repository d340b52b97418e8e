// SPDX-License-Identifier: MIT OR Apache-2.0
//! Turning a call descriptor into a concrete HTTP request.
//!
//! Nothing here performs I/O: [`prepare_request`] resolves the target URI
//! (following a chained location when the call asks for one), adds auth and
//! declared headers, and serialises the body for its media type.

use rfe_core::{BodyEncoding, ChainState, FORM_URLENCODED, HttpVerb, RestCall};
use rfe_error::{EngineError, ErrorCode};
use std::collections::{HashMap, HashSet};
use tracing::warn;
use url::Url;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A request ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    /// HTTP method.
    pub verb: HttpVerb,
    /// Absolute, escaped URL.
    pub url: String,
    /// Headers in insertion order, `Accept` first.
    pub headers: Vec<(String, String)>,
    /// Payload, if any.
    pub body: Option<PreparedBody>,
}

impl PreparedRequest {
    /// First header named `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Serialised body and its media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedBody {
    /// Value of the `Content-Type` header.
    pub content_type: String,
    /// Encoded payload.
    pub payload: String,
}

/// Session material obtained by logging users in before a sequence runs.
#[derive(Debug, Clone, Default)]
pub struct SessionCredentials {
    cookies: HashMap<String, Vec<(String, String)>>,
    tokens: HashMap<String, String>,
}

impl SessionCredentials {
    /// No sessions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: session cookies of `user`.
    pub fn with_cookies(mut self, user: impl Into<String>, cookies: Vec<(String, String)>) -> Self {
        self.cookies.insert(user.into(), cookies);
        self
    }

    /// Builder: `Authorization` value of `user`, e.g. `Bearer abc`.
    pub fn with_token(mut self, user: impl Into<String>, token: impl Into<String>) -> Self {
        self.tokens.insert(user.into(), token.into());
        self
    }

    /// Cookies of `user`.
    pub fn cookies(&self, user: &str) -> Option<&[(String, String)]> {
        self.cookies.get(user).map(Vec::as_slice)
    }

    /// Token of `user`.
    pub fn token(&self, user: &str) -> Option<&str> {
        self.tokens.get(user).map(String::as_str)
    }
}

/// Inputs shared by every call of one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    /// Base URL of the system under test.
    pub base_url: &'a str,
    /// Locations recorded earlier in the sequence.
    pub chain: &'a ChainState,
    /// Logged-in sessions.
    pub credentials: &'a SessionCredentials,
}

/// Reasons a call descriptor cannot be turned into a request.
///
/// All of them are defects of the descriptor, not of the target.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    /// The call targets a location that no earlier call recorded.
    #[error("call {local_id} needs the location created under '{creation_id}' but none was recorded")]
    MissingChainedLocation {
        /// Local id of the call.
        local_id: String,
        /// Key of the missing location.
        creation_id: String,
    },

    /// The selected media type has no encoder.
    #[error("cannot encode the body of {endpoint} as '{media_type}'")]
    UnsupportedContentType {
        /// Call name.
        endpoint: String,
        /// Offending media type.
        media_type: String,
    },

    /// A body parameter and form fields are both present.
    #[error("{endpoint} declares both a body and form fields")]
    BodyAndFormConflict {
        /// Call name.
        endpoint: String,
    },

    /// The resolved URL does not parse.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The URL text.
        url: String,
        /// Parser message.
        reason: String,
    },
}

impl From<InvokeError> for EngineError {
    fn from(err: InvokeError) -> Self {
        let code = match err {
            InvokeError::UnsupportedContentType { .. } => ErrorCode::UnsupportedContentType,
            InvokeError::MissingChainedLocation { .. }
            | InvokeError::BodyAndFormConflict { .. }
            | InvokeError::InvalidUrl { .. } => ErrorCode::InvalidActionStructure,
        };
        EngineError::new(code, err.to_string()).with_source(err)
    }
}

// ---------------------------------------------------------------------------
// Preparation
// ---------------------------------------------------------------------------

/// Build the request for `call`.
pub fn prepare_request(
    call: &RestCall,
    ctx: &RequestContext<'_>,
) -> Result<PreparedRequest, InvokeError> {
    let url = build_url(call, ctx)?;

    let accept = call
        .produces
        .first()
        .cloned()
        .unwrap_or_else(|| "*/*".to_string());
    let mut headers = vec![("Accept".to_string(), accept)];
    add_headers(call, ctx.credentials, &mut headers);

    Ok(PreparedRequest {
        verb: call.verb,
        url,
        headers,
        body: build_body(call)?,
    })
}

fn build_url(call: &RestCall, ctx: &RequestContext<'_>) -> Result<String, InvokeError> {
    let base = ctx.base_url.trim_end_matches('/');
    let expected = format!("{base}{}", call.resolved_path());

    let raw = match &call.use_previous_location {
        None => expected,
        Some(id) => {
            let location =
                ctx.chain
                    .location(id)
                    .ok_or_else(|| InvokeError::MissingChainedLocation {
                        local_id: call.local_id.clone(),
                        creation_id: id.to_string(),
                    })?;
            resolve_location(location, &expected)
        }
    };

    Url::parse(&raw)
        .map(|u| u.to_string())
        .map_err(|e| InvokeError::InvalidUrl {
            url: raw,
            reason: e.to_string(),
        })
}

/// Merge a `Location` value into the URL a call would otherwise target.
///
/// Scheme, host and port come from `location` when it is absolute. The path
/// is the location's path, extended with any trailing segments of
/// `expected` beyond the location's depth. The query comes from `expected`.
/// An empty location leaves `expected` unchanged.
pub fn resolve_location(location: &str, expected: &str) -> String {
    if location.is_empty() {
        return expected.to_string();
    }
    let Ok(template) = Url::parse(expected) else {
        warn!(target: "rfe.transport", expected, "cannot parse target URL, ignoring location");
        return expected.to_string();
    };
    let Ok(mut target) = Url::parse(location).or_else(|_| template.join(location)) else {
        warn!(target: "rfe.transport", location, "cannot parse location, ignoring it");
        return expected.to_string();
    };

    let location_path = target.path().to_string();
    let depth = location_path.split('/').count();
    let mut path = location_path;
    for token in template.path().split('/').skip(depth) {
        path.push('/');
        path.push_str(token);
    }

    target.set_path(&path);
    target.set_query(template.query());
    target.set_fragment(None);
    target.to_string()
}

fn add_headers(call: &RestCall, credentials: &SessionCredentials, out: &mut Vec<(String, String)>) {
    let mut preset: HashSet<String> = HashSet::new();
    let token_login = call.auth.as_ref().and_then(|a| a.token_login.as_deref());

    if let Some(auth) = &call.auth {
        for (name, value) in &auth.headers {
            preset.insert(name.to_ascii_lowercase());
            out.push((name.clone(), value.clone()));
        }
    }

    for param in &call.params {
        let rfe_core::Param::Header { gene } = param else {
            continue;
        };
        if !gene.is_active() {
            continue;
        }
        let lower = gene.name.to_ascii_lowercase();
        if preset.contains(&lower) || (token_login.is_some() && lower == "authorization") {
            continue;
        }
        out.push((gene.name.clone(), gene.raw_string()));
    }

    if let Some(user) = call.auth.as_ref().and_then(|a| a.cookie_login.as_deref()) {
        match credentials.cookies(user) {
            Some(cookies) if !cookies.is_empty() => {
                let joined = cookies
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join("; ");
                out.push(("Cookie".to_string(), joined));
            }
            _ => warn!(target: "rfe.transport", user, "no session cookies available"),
        }
    }

    if let Some(user) = token_login {
        match credentials.token(user) {
            Some(token) => out.push(("Authorization".to_string(), token.to_string())),
            None => warn!(target: "rfe.transport", user, "no auth token available"),
        }
    }
}

fn build_body(call: &RestCall) -> Result<Option<PreparedBody>, InvokeError> {
    let body = call.body().filter(|b| !b.pending_update);
    let forms: Vec<_> = call.form_fields().filter(|g| g.is_active()).collect();

    if body.is_some() && !forms.is_empty() {
        return Err(InvokeError::BodyAndFormConflict {
            endpoint: call.name(),
        });
    }

    if let Some(body) = body {
        let media_type = body.media_type();
        let payload = match body.encoding() {
            Some(BodyEncoding::Json) => body.gene.to_json().to_string(),
            Some(BodyEncoding::Xml) => body.gene.to_xml(),
            Some(BodyEncoding::Form) => encode_form(body.gene.form_pairs()),
            Some(BodyEncoding::Text) => body.gene.raw_string(),
            None => {
                return Err(InvokeError::UnsupportedContentType {
                    endpoint: call.name(),
                    media_type,
                });
            }
        };
        return Ok(Some(PreparedBody {
            content_type: media_type,
            payload,
        }));
    }

    if !forms.is_empty() {
        let pairs = forms.iter().map(|g| (g.name.clone(), g.raw_string())).collect();
        return Ok(Some(form_body(encode_form(pairs))));
    }

    // Some servers reject body-carrying verbs without a content type.
    if call.verb.sends_empty_form_by_default() {
        return Ok(Some(form_body(String::new())));
    }

    Ok(None)
}

fn form_body(payload: String) -> PreparedBody {
    PreparedBody {
        content_type: FORM_URLENCODED.to_string(),
        payload,
    }
}

fn encode_form(pairs: Vec<(String, String)>) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in &pairs {
        serializer.append_pair(k, v);
    }
    serializer.finish()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
