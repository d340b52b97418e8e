// SPDX-License-Identifier: MIT OR Apache-2.0
//! PUT and DELETE behaviour checks.

use crate::{DeleteCheck, HttpSemanticsOracle, result_of};
use rfe_core::{CallResult, HttpVerb, Individual};

/// Default [`HttpSemanticsOracle`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHttpSemanticsOracle;

impl HttpSemanticsOracle for DefaultHttpSemanticsOracle {
    fn has_repeated_create_put(&self, individual: &Individual, results: &[CallResult]) -> bool {
        let [.., first, second] = individual.calls.as_slice() else {
            return false;
        };
        if first.verb != HttpVerb::Put || second.verb != HttpVerb::Put {
            return false;
        }
        if !first.uses_same_resolved_path(second) || !first.same_auth(second) {
            return false;
        }
        matches!(
            (result_of(results, first), result_of(results, second)),
            (Some(a), Some(b)) if a.status == Some(201) && b.status == Some(201)
        )
    }

    fn non_working_delete(&self, individual: &Individual, results: &[CallResult]) -> DeleteCheck {
        let calls = individual.calls.as_slice();
        let [.., get_before, delete, get_after] = calls else {
            return DeleteCheck::default();
        };
        let delete_index = calls.len() - 2;
        if get_before.verb != HttpVerb::Get
            || delete.verb != HttpVerb::Delete
            || get_after.verb != HttpVerb::Get
            || !get_before.uses_same_resolved_path(delete)
            || !delete.uses_same_resolved_path(get_after)
        {
            return DeleteCheck::default();
        }
        let (Some(before), Some(deleted), Some(after)) = (
            result_of(results, get_before),
            result_of(results, delete),
            result_of(results, get_after),
        ) else {
            return DeleteCheck::default();
        };

        let checking_delete = before.is_success() && deleted.is_success();
        DeleteCheck {
            checking_delete,
            non_working: checking_delete && after.is_success() && after.has_non_empty_body(),
            delete_index,
        }
    }
}
