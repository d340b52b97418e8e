// SPDX-License-Identifier: MIT OR Apache-2.0
//! SSRF callbacks recorded in memory.

use crate::SsrfVerifier;
use rfe_core::RestCall;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// [`SsrfVerifier`] fed by whatever listens for callbacks.
///
/// The listener embeds the call's local id in each callback URL it hands
/// out and reports hits through [`Self::record_hit`].
#[derive(Debug, Default)]
pub struct InMemorySsrfVerifier {
    hits: Mutex<HashMap<String, String>>,
}

impl InMemorySsrfVerifier {
    /// Verifier with no hits.
    pub fn new() -> Self {
        Self::default()
    }

    fn hits(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.hits.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The call with `local_id` made the server fetch the URL given in
    /// `parameter`.
    pub fn record_hit(&self, local_id: impl Into<String>, parameter: impl Into<String>) {
        self.hits().insert(local_id.into(), parameter.into());
    }

    /// Forget all hits.
    pub fn reset(&self) {
        self.hits().clear();
    }
}

impl SsrfVerifier for InMemorySsrfVerifier {
    fn any_calls_made_to_verifier(&self, call: &RestCall) -> bool {
        self.hits().contains_key(&call.local_id)
    }

    fn vulnerable_parameter(&self, call: &RestCall) -> Option<String> {
        self.hits().get(&call.local_id).cloned()
    }
}
