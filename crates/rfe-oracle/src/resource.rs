// SPDX-License-Identifier: MIT OR Apache-2.0
//! Locations of created resources.

use crate::ResourceGraph;
use rfe_core::{HttpVerb, RestCall};

/// [`ResourceGraph`] that assumes collections live at their path: a POST to
/// `/users` creates `/users/{id}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathResourceGraph;

impl ResourceGraph for PathResourceGraph {
    fn resolve_location_for_child(&self, create: &RestCall, resource_id: &str) -> Option<String> {
        if create.verb != HttpVerb::Post || create.path.is_last_element_a_parameter() {
            return None;
        }
        let parent = create.resolved_only_path();
        Some(format!("{}/{resource_id}", parent.trim_end_matches('/')))
    }
}
