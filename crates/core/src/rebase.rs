//! Rebase helper invoked by the client pull loop's `onRebaseRequired` hook (§4.5).
//!
//! The hook itself is host-provided (it owns the local events table), but the
//! *shift computation* — which pending events move, and in what order, so the
//! `(aggregateType, aggregateId, version)` unique index never collides
//! transiently — is pure and belongs here.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebaseRequest {
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub from_version_inclusive: i64,
    /// Count of remote events the apply path just landed on this aggregate
    /// at or above `from_version_inclusive` — the exact shift width every
    /// surviving pending version must move by. Threaded in from the apply
    /// path rather than re-derived by the hook, which has no way to tell a
    /// freshly-collided remote event apart from one that was never applied
    /// at all (both are absent from its own local log at the time it runs).
    pub applied_count: i64,
}

/// One pending local event's version, before and after rebase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionShift {
    pub old_version: i64,
    pub new_version: i64,
}

/// Computes the version shift for every pending version `>= from_version_inclusive`,
/// given `applied_count` remote events landed on the same aggregate.
///
/// Returned in descending `old_version` order — the order the host MUST apply
/// them in, so that writing `new_version` never collides with an
/// not-yet-shifted `old_version` still occupying that slot.
pub fn compute_rebase_shifts(
    pending_versions: &[i64],
    from_version_inclusive: i64,
    applied_count: i64,
) -> Vec<VersionShift> {
    let mut affected: Vec<i64> = pending_versions
        .iter()
        .copied()
        .filter(|v| *v >= from_version_inclusive)
        .collect();
    affected.sort_unstable_by(|a, b| b.cmp(a));
    affected
        .into_iter()
        .map(|old_version| VersionShift {
            old_version,
            new_version: old_version + applied_count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifts_only_versions_at_or_above_threshold() {
        let shifts = compute_rebase_shifts(&[1, 2, 3], 2, 1);
        assert_eq!(
            shifts,
            vec![
                VersionShift { old_version: 3, new_version: 4 },
                VersionShift { old_version: 2, new_version: 3 },
            ]
        );
    }

    #[test]
    fn descending_order_avoids_transient_collisions() {
        let shifts = compute_rebase_shifts(&[5, 6, 7], 5, 2);
        let olds: Vec<i64> = shifts.iter().map(|s| s.old_version).collect();
        assert_eq!(olds, vec![7, 6, 5]);
    }

    #[test]
    fn scenario_s6_rebase() {
        // Pending local event at version 1; one remote event lands at version 1.
        let shifts = compute_rebase_shifts(&[1], 1, 1);
        assert_eq!(shifts, vec![VersionShift { old_version: 1, new_version: 2 }]);
    }
}
