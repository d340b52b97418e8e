// SPDX-License-Identifier: MIT OR Apache-2.0
//! Request parameters.

use crate::gene::Gene;
use serde::{Deserialize, Serialize};

/// Media type used for JSON bodies.
pub const APPLICATION_JSON: &str = "application/json";
/// Media type used for form bodies.
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// One parameter of a call descriptor.
///
/// The set of locations is closed: every consumer matches all of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "in", rename_all = "snake_case")]
pub enum Param {
    /// Substituted into `{name}` in the path template.
    Path {
        /// Value; its name is the placeholder name.
        gene: Gene,
    },
    /// Appended to the query string.
    Query {
        /// Value; its name is the query key.
        gene: Gene,
    },
    /// Sent as a request header.
    Header {
        /// Value; its name is the header name.
        gene: Gene,
    },
    /// Sent as a field of a form-urlencoded body.
    Form {
        /// Value; its name is the field name.
        gene: Gene,
    },
    /// Request payload.
    Body(BodyParam),
}

/// Request payload and its media type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyParam {
    /// Payload value.
    pub gene: Gene,
    /// Enumeration of the declared media types; the selected one is sent.
    pub content_type: Gene,
    /// Set on bodies added after the fact; such bodies are not sent until
    /// the search activates them.
    #[serde(default)]
    pub pending_update: bool,
}

impl BodyParam {
    /// Body with the first of `media_types` selected.
    pub fn new(gene: Gene, media_types: &[&str]) -> Self {
        Self {
            gene,
            content_type: Gene::enumeration("contentType", media_types, 0),
            pending_update: false,
        }
    }

    /// Currently selected media type.
    pub fn media_type(&self) -> String {
        self.content_type.raw_string()
    }

    /// Encoding for the selected media type.
    pub fn encoding(&self) -> Option<BodyEncoding> {
        BodyEncoding::from_media_type(&self.media_type())
    }
}

impl Param {
    /// Path parameter.
    pub fn path(gene: Gene) -> Self {
        Self::Path { gene }
    }

    /// Query parameter.
    pub fn query(gene: Gene) -> Self {
        Self::Query { gene }
    }

    /// Header parameter.
    pub fn header(gene: Gene) -> Self {
        Self::Header { gene }
    }

    /// Form field.
    pub fn form(gene: Gene) -> Self {
        Self::Form { gene }
    }

    /// Body parameter.
    pub fn body(gene: Gene, media_types: &[&str]) -> Self {
        Self::Body(BodyParam::new(gene, media_types))
    }

    /// Parameter name.
    pub fn name(&self) -> &str {
        &self.gene().name
    }

    /// Value tree.
    pub fn gene(&self) -> &Gene {
        match self {
            Self::Path { gene } | Self::Query { gene } | Self::Header { gene } | Self::Form { gene } => gene,
            Self::Body(body) => &body.gene,
        }
    }

    /// Mutable value tree.
    pub fn gene_mut(&mut self) -> &mut Gene {
        match self {
            Self::Path { gene } | Self::Query { gene } | Self::Header { gene } | Self::Form { gene } => gene,
            Self::Body(body) => &mut body.gene,
        }
    }

    /// Stable label used in objective ids.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Path { .. } => "PathParam",
            Self::Query { .. } => "QueryParam",
            Self::Header { .. } => "HeaderParam",
            Self::Form { .. } => "FormParam",
            Self::Body(_) => "BodyParam",
        }
    }
}

/// How a body is serialised for its media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    /// `application/json` and `+json` suffixes.
    Json,
    /// `application/xml`, `text/xml` and `+xml` suffixes.
    Xml,
    /// `application/x-www-form-urlencoded`.
    Form,
    /// `text/plain` and other `text/*`.
    Text,
}

impl BodyEncoding {
    /// Encoding for a media type, ignoring parameters such as `charset`.
    /// `None` when the engine cannot produce that media type.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if essence == APPLICATION_JSON || essence.ends_with("+json") {
            Some(Self::Json)
        } else if essence == "application/xml" || essence == "text/xml" || essence.ends_with("+xml")
        {
            Some(Self::Xml)
        } else if essence == FORM_URLENCODED {
            Some(Self::Form)
        } else if essence.starts_with("text/") {
            Some(Self::Text)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodings_from_media_types() {
        assert_eq!(
            BodyEncoding::from_media_type("application/json; charset=utf-8"),
            Some(BodyEncoding::Json)
        );
        assert_eq!(
            BodyEncoding::from_media_type("application/problem+json"),
            Some(BodyEncoding::Json)
        );
        assert_eq!(BodyEncoding::from_media_type("TEXT/XML"), Some(BodyEncoding::Xml));
        assert_eq!(BodyEncoding::from_media_type(FORM_URLENCODED), Some(BodyEncoding::Form));
        assert_eq!(BodyEncoding::from_media_type("text/plain"), Some(BodyEncoding::Text));
        assert_eq!(BodyEncoding::from_media_type("multipart/form-data"), None);
    }

    #[test]
    fn body_selects_first_media_type() {
        let body = BodyParam::new(Gene::object("b", vec![]), &[APPLICATION_JSON, "application/xml"]);
        assert_eq!(body.media_type(), APPLICATION_JSON);
        assert_eq!(body.encoding(), Some(BodyEncoding::Json));
    }

    #[test]
    fn param_accessors() {
        let mut p = Param::query(Gene::integer("page", 1));
        assert_eq!(p.name(), "page");
        assert_eq!(p.kind_label(), "QueryParam");
        assert!(p.gene_mut().set_from_raw("2"));
        assert_eq!(p.gene().raw_string(), "2");
    }
}
