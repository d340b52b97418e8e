// SPDX-License-Identifier: MIT OR Apache-2.0
//! Parameter value trees.
//!
//! The search owns mutation of these values; this module only reads them
//! (rendering, traversal) and writes them when a link binds a value taken
//! from an earlier response.

use serde::{Deserialize, Serialize};

/// Name given to genes holding schema-provided example values.
pub const EXAMPLES_NAME: &str = "EXAMPLES";

/// A named value node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gene {
    /// Field or parameter name.
    pub name: String,
    /// Shape and current value.
    pub kind: GeneKind,
}

/// Shape and current value of a [`Gene`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeneKind {
    /// Free text.
    Text {
        /// Current value.
        value: String,
    },
    /// Signed integer.
    Integer {
        /// Current value.
        value: i64,
    },
    /// Floating-point number.
    Number {
        /// Current value.
        value: f64,
    },
    /// Boolean flag.
    Boolean {
        /// Current value.
        value: bool,
    },
    /// One of a fixed set of string values.
    Enum {
        /// Allowed values.
        values: Vec<String>,
        /// Index of the selected value.
        index: usize,
    },
    /// One of several alternative sub-trees.
    Choice {
        /// Alternatives.
        options: Vec<Gene>,
        /// Index of the active alternative.
        active: usize,
    },
    /// A value that may be omitted from the request.
    Optional {
        /// Whether the value is sent.
        active: bool,
        /// The wrapped value.
        inner: Box<Gene>,
    },
    /// Ordered named fields.
    Object {
        /// Fields in declaration order.
        fields: Vec<Gene>,
    },
    /// Homogeneous list.
    Array {
        /// Elements.
        items: Vec<Gene>,
    },
}

impl Gene {
    /// Text value.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, GeneKind::Text { value: value.into() })
    }

    /// Integer value.
    pub fn integer(name: impl Into<String>, value: i64) -> Self {
        Self::new(name, GeneKind::Integer { value })
    }

    /// Number value.
    pub fn number(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, GeneKind::Number { value })
    }

    /// Boolean value.
    pub fn boolean(name: impl Into<String>, value: bool) -> Self {
        Self::new(name, GeneKind::Boolean { value })
    }

    /// Enumeration with `values[index]` selected.
    pub fn enumeration(name: impl Into<String>, values: &[&str], index: usize) -> Self {
        Self::new(
            name,
            GeneKind::Enum {
                values: values.iter().map(|v| v.to_string()).collect(),
                index,
            },
        )
    }

    /// Choice between alternatives.
    pub fn choice(name: impl Into<String>, options: Vec<Gene>, active: usize) -> Self {
        Self::new(name, GeneKind::Choice { options, active })
    }

    /// Wraps `inner` so that it can be switched off.
    pub fn optional(inner: Gene, active: bool) -> Self {
        Self::new(
            inner.name.clone(),
            GeneKind::Optional {
                active,
                inner: Box::new(inner),
            },
        )
    }

    /// Object with ordered fields.
    pub fn object(name: impl Into<String>, fields: Vec<Gene>) -> Self {
        Self::new(name, GeneKind::Object { fields })
    }

    /// Array of elements.
    pub fn array(name: impl Into<String>, items: Vec<Gene>) -> Self {
        Self::new(name, GeneKind::Array { items })
    }

    fn new(name: impl Into<String>, kind: GeneKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// `false` only for a switched-off optional.
    pub fn is_active(&self) -> bool {
        !matches!(self.kind, GeneKind::Optional { active: false, .. })
    }

    /// Whether this is an empty object (nothing to send).
    pub fn is_empty_object(&self) -> bool {
        match &self.kind {
            GeneKind::Object { fields } => fields.iter().all(|f| !f.is_active()),
            GeneKind::Optional { active, inner } => !active || inner.is_empty_object(),
            _ => false,
        }
    }

    /// Value as it appears in a path segment, query string or header.
    pub fn raw_string(&self) -> String {
        match &self.kind {
            GeneKind::Text { value } => value.clone(),
            GeneKind::Integer { value } => value.to_string(),
            GeneKind::Number { value } => value.to_string(),
            GeneKind::Boolean { value } => value.to_string(),
            GeneKind::Enum { values, index } => values.get(*index).cloned().unwrap_or_default(),
            GeneKind::Choice { options, active } => options
                .get(*active)
                .map(Gene::raw_string)
                .unwrap_or_default(),
            GeneKind::Optional { active, inner } => {
                if *active {
                    inner.raw_string()
                } else {
                    String::new()
                }
            }
            GeneKind::Object { .. } | GeneKind::Array { .. } => self.to_json().to_string(),
        }
    }

    /// JSON rendering. Switched-off optional fields are omitted from objects.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match &self.kind {
            GeneKind::Text { value } => Value::String(value.clone()),
            GeneKind::Integer { value } => Value::from(*value),
            GeneKind::Number { value } => serde_json::Number::from_f64(*value)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            GeneKind::Boolean { value } => Value::Bool(*value),
            GeneKind::Enum { .. } => Value::String(self.raw_string()),
            GeneKind::Choice { options, active } => options
                .get(*active)
                .map(Gene::to_json)
                .unwrap_or(Value::Null),
            GeneKind::Optional { active, inner } => {
                if *active {
                    inner.to_json()
                } else {
                    Value::Null
                }
            }
            GeneKind::Object { fields } => Value::Object(
                fields
                    .iter()
                    .filter(|f| f.is_active())
                    .map(|f| (f.name.clone(), f.to_json()))
                    .collect(),
            ),
            GeneKind::Array { items } => Value::Array(items.iter().map(Gene::to_json).collect()),
        }
    }

    /// XML rendering with this gene's name as the root element.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out);
        out
    }

    fn write_xml(&self, out: &mut String) {
        if !self.is_active() {
            return;
        }
        out.push('<');
        out.push_str(&self.name);
        out.push('>');
        match &self.kind {
            GeneKind::Object { fields } => fields.iter().for_each(|f| f.write_xml(out)),
            GeneKind::Array { items } => items.iter().for_each(|i| i.write_xml(out)),
            GeneKind::Optional { inner, .. } => inner.write_xml_content(out),
            GeneKind::Choice { options, active } => {
                if let Some(option) = options.get(*active) {
                    option.write_xml_content(out);
                }
            }
            _ => out.push_str(&escape_xml(&self.raw_string())),
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }

    fn write_xml_content(&self, out: &mut String) {
        match &self.kind {
            GeneKind::Object { fields } => fields.iter().for_each(|f| f.write_xml(out)),
            GeneKind::Array { items } => items.iter().for_each(|i| i.write_xml(out)),
            _ => out.push_str(&escape_xml(&self.raw_string())),
        }
    }

    /// Key/value pairs for a form-urlencoded body.
    pub fn form_pairs(&self) -> Vec<(String, String)> {
        match &self.kind {
            GeneKind::Object { fields } => fields
                .iter()
                .filter(|f| f.is_active())
                .map(|f| (f.name.clone(), f.raw_string()))
                .collect(),
            GeneKind::Optional { active: true, inner } => inner.form_pairs(),
            GeneKind::Optional { active: false, .. } => Vec::new(),
            _ => vec![(self.name.clone(), self.raw_string())],
        }
    }

    /// Scalar leaves that influence the request, in depth-first order.
    ///
    /// Sub-trees under a switched-off optional or an inactive choice
    /// alternative are not visited.
    pub fn impacting_leaves(&self) -> Vec<&Gene> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Gene>) {
        match &self.kind {
            GeneKind::Optional { active, inner } => {
                if *active {
                    inner.collect_leaves(out);
                }
            }
            GeneKind::Choice { options, active } => {
                if let Some(option) = options.get(*active) {
                    option.collect_leaves(out);
                }
            }
            GeneKind::Object { fields } => fields.iter().for_each(|f| f.collect_leaves(out)),
            GeneKind::Array { items } => items.iter().for_each(|i| i.collect_leaves(out)),
            _ => out.push(self),
        }
    }

    /// Selected example labels as `(parent name, label)` pairs.
    ///
    /// `parent` is the name reported for an examples gene at the root.
    pub fn examples(&self, parent: &str) -> Vec<(String, String)> {
        let mut found = Vec::new();
        self.collect_examples(parent, &mut found);
        found
    }

    fn collect_examples(&self, parent: &str, out: &mut Vec<(String, String)>) {
        if self.name == EXAMPLES_NAME {
            match &self.kind {
                GeneKind::Enum { .. } => {
                    out.push((parent.to_string(), self.raw_string()));
                    return;
                }
                GeneKind::Choice { active, .. } => {
                    out.push((parent.to_string(), active.to_string()));
                    return;
                }
                _ => {}
            }
        }
        let own = if self.name == EXAMPLES_NAME {
            parent
        } else {
            self.name.as_str()
        };
        match &self.kind {
            GeneKind::Optional { active: true, inner } => inner.collect_examples(parent, out),
            GeneKind::Choice { options, active } => {
                if let Some(option) = options.get(*active) {
                    option.collect_examples(own, out);
                }
            }
            GeneKind::Object { fields } => fields.iter().for_each(|f| f.collect_examples(own, out)),
            GeneKind::Array { items } => items.iter().for_each(|i| i.collect_examples(own, out)),
            _ => {}
        }
    }

    /// Value-class label of a scalar leaf, `None` for leaves without one.
    ///
    /// Enumerations and booleans report their value; numbers report their
    /// sign class.
    pub fn value_class(&self) -> Option<String> {
        match &self.kind {
            GeneKind::Enum { .. } | GeneKind::Boolean { .. } => Some(self.raw_string()),
            GeneKind::Integer { .. } | GeneKind::Number { .. } => {
                if self.raw_string().starts_with('-') {
                    Some("negative".into())
                } else {
                    Some("positive".into())
                }
            }
            _ => None,
        }
    }

    /// Overwrites the value with one parsed from `raw`.
    ///
    /// Returns `false` when `raw` does not fit the gene's shape. Optionals
    /// are switched on when their inner value is set.
    pub fn set_from_raw(&mut self, raw: &str) -> bool {
        match &mut self.kind {
            GeneKind::Text { value } => {
                *value = raw.to_string();
                true
            }
            GeneKind::Integer { value } => raw.parse().map(|v| *value = v).is_ok(),
            GeneKind::Number { value } => raw.parse().map(|v| *value = v).is_ok(),
            GeneKind::Boolean { value } => raw.parse().map(|v| *value = v).is_ok(),
            GeneKind::Enum { values, index } => match values.iter().position(|v| v == raw) {
                Some(i) => {
                    *index = i;
                    true
                }
                None => false,
            },
            GeneKind::Optional { active, inner } => {
                let set = inner.set_from_raw(raw);
                if set {
                    *active = true;
                }
                set
            }
            GeneKind::Choice { options, active } => options
                .get_mut(*active)
                .is_some_and(|option| option.set_from_raw(raw)),
            GeneKind::Object { .. } | GeneKind::Array { .. } => false,
        }
    }
}

fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user() -> Gene {
        Gene::object(
            "user",
            vec![
                Gene::text("name", "a<b"),
                Gene::integer("age", -3),
                Gene::optional(Gene::boolean("admin", true), false),
                Gene::enumeration("role", &["guest", "owner"], 1),
            ],
        )
    }

    #[test]
    fn json_omits_inactive_optionals() {
        assert_eq!(
            user().to_json(),
            json!({"name": "a<b", "age": -3, "role": "owner"})
        );
    }

    #[test]
    fn xml_escapes_text() {
        assert_eq!(
            user().to_xml(),
            "<user><name>a&lt;b</name><age>-3</age><role>owner</role></user>"
        );
    }

    #[test]
    fn form_pairs_of_object() {
        let pairs = user().form_pairs();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[1], ("age".to_string(), "-3".to_string()));
    }

    #[test]
    fn impacting_leaves_skip_inactive_subtrees() {
        let gene = user();
        let names: Vec<_> = gene.impacting_leaves().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["name", "age", "role"]);
    }

    #[test]
    fn value_classes() {
        assert_eq!(Gene::integer("x", -1).value_class().as_deref(), Some("negative"));
        assert_eq!(Gene::number("x", 0.5).value_class().as_deref(), Some("positive"));
        assert_eq!(Gene::boolean("x", false).value_class().as_deref(), Some("false"));
        assert_eq!(Gene::text("x", "y").value_class(), None);
    }

    #[test]
    fn examples_report_parent_name() {
        let gene = Gene::object(
            "body",
            vec![Gene::object(
                "address",
                vec![Gene::enumeration(EXAMPLES_NAME, &["home", "work"], 1)],
            )],
        );
        assert_eq!(
            gene.examples("body"),
            vec![("address".to_string(), "work".to_string())]
        );
        let root = Gene::choice(EXAMPLES_NAME, vec![Gene::text("a", "1"), Gene::text("b", "2")], 1);
        assert_eq!(root.examples("q"), vec![("q".to_string(), "1".to_string())]);
    }

    #[test]
    fn set_from_raw_respects_shape() {
        let mut id = Gene::integer("id", 0);
        assert!(id.set_from_raw("42"));
        assert_eq!(id.raw_string(), "42");
        assert!(!id.set_from_raw("abc"));

        let mut opt = Gene::optional(Gene::text("q", ""), false);
        assert!(opt.set_from_raw("x"));
        assert!(opt.is_active());

        let mut role = Gene::enumeration("role", &["a", "b"], 0);
        assert!(!role.set_from_raw("c"));
        assert!(role.set_from_raw("b"));
    }

    #[test]
    fn empty_object_detection() {
        assert!(Gene::object("b", vec![]).is_empty_object());
        assert!(!user().is_empty_object());
    }
}
