// SPDX-License-Identifier: MIT OR Apache-2.0
//! Call descriptors and the individuals that sequence them.

use crate::param::{BodyParam, Param};
use crate::verb::HttpVerb;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Path template such as `/users/{id}/orders`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RestPath(String);

impl RestPath {
    /// Wrap a template. A missing leading `/` is added.
    pub fn new(template: impl Into<String>) -> Self {
        let t = template.into();
        if t.starts_with('/') {
            Self(t)
        } else {
            Self(format!("/{t}"))
        }
    }

    /// The template text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments of the template.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Whether the last segment is a `{placeholder}`.
    pub fn is_last_element_a_parameter(&self) -> bool {
        self.segments()
            .last()
            .is_some_and(|s| s.starts_with('{') && s.ends_with('}'))
    }

    /// Path with every `{name}` replaced by the encoded value of the path
    /// parameter of that name. Placeholders without a parameter are kept.
    pub fn resolve_only_path(&self, params: &[Param]) -> String {
        let mut out = String::new();
        for segment in self.segments() {
            out.push('/');
            let value = segment
                .strip_prefix('{')
                .and_then(|s| s.strip_suffix('}'))
                .and_then(|name| {
                    params.iter().find_map(|p| match p {
                        Param::Path { gene } if gene.name == name => Some(gene.raw_string()),
                        _ => None,
                    })
                });
            match value {
                Some(v) => out.push_str(&encode_path_segment(&v)),
                None => out.push_str(segment),
            }
        }
        if out.is_empty() {
            out.push('/');
        }
        out
    }

    /// [`Self::resolve_only_path`] plus the query string built from active
    /// query parameters.
    pub fn resolve(&self, params: &[Param]) -> String {
        let path = self.resolve_only_path(params);
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        let mut any = false;
        for param in params {
            if let Param::Query { gene } = param
                && gene.is_active()
            {
                query.append_pair(&gene.name, &gene.raw_string());
                any = true;
            }
        }
        if any {
            format!("{path}?{}", query.finish())
        } else {
            path
        }
    }
}

impl fmt::Display for RestPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn encode_path_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b':' | b'@' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Name reported for calls made without credentials.
pub const NO_AUTH: &str = "NoAuth";

/// Credentials a call is made with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthInfo {
    /// Identifier of this authentication setting.
    pub name: String,
    /// Fixed headers, e.g. an API key.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// User whose session cookies are sent.
    #[serde(default)]
    pub cookie_login: Option<String>,
    /// User whose bearer token is sent as `Authorization`.
    #[serde(default)]
    pub token_login: Option<String>,
    /// Credentials are only honoured through mocked external services.
    #[serde(default)]
    pub require_mock_handling: bool,
    /// 401 responses under these credentials are not treated as suspicious.
    #[serde(default)]
    pub exclude_from_auth_check: bool,
}

impl AuthInfo {
    /// Credentials sent as fixed headers.
    pub fn with_headers(name: impl Into<String>, headers: Vec<(String, String)>) -> Self {
        Self {
            name: name.into(),
            headers,
            cookie_login: None,
            token_login: None,
            require_mock_handling: false,
            exclude_from_auth_check: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// Where a link takes a value from in the source response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkExpression {
    /// `$response.body#/json/pointer`
    ResponseBody {
        /// JSON pointer into the body.
        pointer: String,
    },
    /// `$response.header.Name`
    ResponseHeader {
        /// Header name.
        name: String,
    },
}

impl LinkExpression {
    /// Parse a runtime expression. `None` for unsupported forms.
    pub fn parse(expression: &str) -> Option<Self> {
        let expression = expression.trim();
        if let Some(pointer) = expression.strip_prefix("$response.body#") {
            return Some(Self::ResponseBody {
                pointer: pointer.to_string(),
            });
        }
        if expression == "$response.body" {
            return Some(Self::ResponseBody {
                pointer: String::new(),
            });
        }
        expression
            .strip_prefix("$response.header.")
            .filter(|n| !n.is_empty())
            .map(|name| Self::ResponseHeader {
                name: name.to_string(),
            })
    }
}

/// Binding of one target parameter to a value of the source response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkParameter {
    /// Name of the parameter set on the target call.
    pub name: String,
    /// Source of the value.
    pub expression: LinkExpression,
}

/// A hyperlink declared on a response of a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Identifier, unique within the declaring call.
    pub id: String,
    /// Status code of the response declaring the link.
    pub status_code: u16,
    /// Type id of the call the link leads to.
    pub target_action_id: String,
    /// Parameter bindings.
    pub parameters: Vec<LinkParameter>,
}

/// Reference from a call back to a link declared on an earlier call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackwardLinkReference {
    /// Type id of the call declaring the link.
    pub source_action_id: String,
    /// Identifier of the link on that call.
    pub source_link_id: String,
    /// Status the source response must have had.
    pub status_code: u16,
    /// Local id of the earlier call the link was resolved against; set
    /// during evaluation.
    #[serde(default)]
    pub actual_source_local_id: Option<String>,
}

impl BackwardLinkReference {
    /// Whether the last evaluation bound the link to a previous call.
    pub fn is_in_use(&self) -> bool {
        self.actual_source_local_id.is_some()
    }
}

// ---------------------------------------------------------------------------
// Call descriptors
// ---------------------------------------------------------------------------

/// Key under which a created resource's location is remembered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CreationId(pub String);

impl CreationId {
    /// Wrap an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for CreationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One HTTP call of an individual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestCall {
    /// Type id, shared by every call generated from the same operation.
    pub id: String,
    /// Identifier unique within the individual.
    pub local_id: String,
    /// HTTP method.
    pub verb: HttpVerb,
    /// Path template.
    pub path: RestPath,
    /// Parameters.
    #[serde(default)]
    pub params: Vec<Param>,
    /// Media types the operation can return.
    #[serde(default)]
    pub produces: Vec<String>,
    /// Credentials; `None` means unauthenticated.
    #[serde(default)]
    pub auth: Option<AuthInfo>,
    /// Links declared on this operation's responses.
    #[serde(default)]
    pub links: Vec<Link>,
    /// Link on an earlier call whose values feed this one.
    #[serde(default)]
    pub backward_link: Option<BackwardLinkReference>,
    /// Target this call at the location created by an earlier call.
    #[serde(default)]
    pub use_previous_location: Option<CreationId>,
    /// Remember the location this call creates.
    #[serde(default)]
    pub save_location: bool,
    /// Key under which [`Self::save_location`] stores the location.
    #[serde(default)]
    pub location_id: Option<CreationId>,
}

impl RestCall {
    /// Call with no parameters, typed by its `VERB:/template` name.
    pub fn new(local_id: impl Into<String>, verb: HttpVerb, template: impl Into<String>) -> Self {
        let path = RestPath::new(template);
        Self {
            id: format!("{verb}:{path}"),
            local_id: local_id.into(),
            verb,
            path,
            params: Vec::new(),
            produces: Vec::new(),
            auth: None,
            links: Vec::new(),
            backward_link: None,
            use_previous_location: None,
            save_location: false,
            location_id: None,
        }
    }

    /// Builder: add a parameter.
    pub fn with_param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Builder: declare a produced media type.
    pub fn with_produces(mut self, media_type: impl Into<String>) -> Self {
        self.produces.push(media_type.into());
        self
    }

    /// Builder: set credentials.
    pub fn with_auth(mut self, auth: AuthInfo) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Builder: declare a link.
    pub fn with_link(mut self, link: Link) -> Self {
        self.links.push(link);
        self
    }

    /// Builder: bind to a link of an earlier call.
    pub fn with_backward_link(mut self, reference: BackwardLinkReference) -> Self {
        self.backward_link = Some(reference);
        self
    }

    /// Builder: remember the created location under `id`.
    pub fn saving_location(mut self, id: CreationId) -> Self {
        self.save_location = true;
        self.location_id = Some(id);
        self
    }

    /// Builder: target the location stored under `id`.
    pub fn using_location_of(mut self, id: CreationId) -> Self {
        self.use_previous_location = Some(id);
        self
    }

    /// Stable objective key, `VERB:/template`.
    pub fn name(&self) -> String {
        format!("{}:{}", self.verb, self.path)
    }

    /// Resolved path including the query string.
    pub fn resolved_path(&self) -> String {
        self.path.resolve(&self.params)
    }

    /// Resolved path without the query string.
    pub fn resolved_only_path(&self) -> String {
        self.path.resolve_only_path(&self.params)
    }

    /// Whether both calls hit the same concrete resource.
    pub fn uses_same_resolved_path(&self, other: &RestCall) -> bool {
        self.resolved_only_path() == other.resolved_only_path()
    }

    /// Key under which this call's created location is stored.
    pub fn creation_location_id(&self) -> CreationId {
        self.location_id
            .clone()
            .unwrap_or_else(|| CreationId::new(self.path.as_str()))
    }

    /// Name of the credentials, [`NO_AUTH`] when there are none.
    pub fn auth_name(&self) -> &str {
        self.auth.as_ref().map(|a| a.name.as_str()).unwrap_or(NO_AUTH)
    }

    /// Whether the call carries credentials.
    pub fn has_auth(&self) -> bool {
        self.auth.is_some()
    }

    /// Whether both calls use the same credentials.
    pub fn same_auth(&self, other: &RestCall) -> bool {
        self.auth_name() == other.auth_name()
    }

    /// The body parameter, if any.
    pub fn body(&self) -> Option<&BodyParam> {
        self.params.iter().find_map(|p| match p {
            Param::Body(b) => Some(b),
            _ => None,
        })
    }

    /// Mutable body parameter, if any.
    pub fn body_mut(&mut self) -> Option<&mut BodyParam> {
        self.params.iter_mut().find_map(|p| match p {
            Param::Body(b) => Some(b),
            _ => None,
        })
    }

    /// Form fields.
    pub fn form_fields(&self) -> impl Iterator<Item = &crate::gene::Gene> {
        self.params.iter().filter_map(|p| match p {
            Param::Form { gene } => Some(gene),
            _ => None,
        })
    }

    /// Whether a header parameter named `name` exists (case-insensitive).
    pub fn has_header(&self, name: &str) -> bool {
        self.params
            .iter()
            .any(|p| matches!(p, Param::Header { gene } if gene.name.eq_ignore_ascii_case(name)))
    }

    /// Whether a query parameter named `name` exists.
    pub fn has_query(&self, name: &str) -> bool {
        self.params
            .iter()
            .any(|p| matches!(p, Param::Query { gene } if gene.name == name))
    }
}

// ---------------------------------------------------------------------------
// Individuals
// ---------------------------------------------------------------------------

/// How an individual was produced; some analyzers only run on dedicated
/// samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleType {
    /// Random sampling or mutation.
    #[default]
    Random,
    /// Seeded from user-provided tests.
    Seeded,
    /// Built to exercise access control.
    Security,
    /// Built to exercise HTTP semantics.
    HttpSemantics,
}

/// An ordered call sequence under evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    /// Calls in execution order.
    pub calls: Vec<RestCall>,
    /// Origin of the individual.
    #[serde(default)]
    pub sample_type: SampleType,
}

impl Individual {
    /// Randomly sampled individual.
    pub fn new(calls: Vec<RestCall>) -> Self {
        Self {
            calls,
            sample_type: SampleType::Random,
        }
    }

    /// Builder: set the sample type.
    pub fn with_sample_type(mut self, sample_type: SampleType) -> Self {
        self.sample_type = sample_type;
        self
    }

    /// Distinct credentials used by the calls, in first-use order.
    pub fn authentications(&self) -> Vec<&AuthInfo> {
        let mut seen: Vec<&AuthInfo> = Vec::new();
        for auth in self.calls.iter().filter_map(|c| c.auth.as_ref()) {
            if !seen.iter().any(|a| a.name == auth.name) {
                seen.push(auth);
            }
        }
        seen
    }
}
