//! Conflict policy evaluation: whether a task should proceed when its
//! destination already exists.

use driftbox_core::types::ConflictPolicy;

/// Outcome of checking a conflict policy against an existing destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictDecision {
    Proceed,
    Skip { reason: String },
    /// Only returned for `Interactive`; the caller must prompt and decide.
    AskUser,
}

/// Decide what to do about a task whose destination already exists.
/// `source_mtime`/`dest_mtime` are only consulted for `Newer`.
pub fn evaluate(
    policy: ConflictPolicy,
    source_mtime: Option<i64>,
    dest_mtime: Option<i64>,
) -> ConflictDecision {
    match policy {
        ConflictPolicy::Skip => ConflictDecision::Skip {
            reason: "conflict".into(),
        },
        ConflictPolicy::Overwrite => ConflictDecision::Proceed,
        ConflictPolicy::Interactive => ConflictDecision::AskUser,
        ConflictPolicy::Newer => match (source_mtime, dest_mtime) {
            (Some(src), Some(dst)) if src > dst => ConflictDecision::Proceed,
            (Some(_), Some(_)) => ConflictDecision::Skip {
                reason: "newer".into(),
            },
            _ => ConflictDecision::Skip {
                reason: "no_timestamp".into(),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_policy_always_skips() {
        assert_eq!(
            evaluate(ConflictPolicy::Skip, Some(5), Some(1)),
            ConflictDecision::Skip {
                reason: "conflict".into()
            }
        );
    }

    #[test]
    fn overwrite_policy_always_proceeds() {
        assert_eq!(
            evaluate(ConflictPolicy::Overwrite, None, None),
            ConflictDecision::Proceed
        );
    }

    #[test]
    fn newer_policy_proceeds_only_when_source_is_strictly_newer() {
        assert_eq!(
            evaluate(ConflictPolicy::Newer, Some(100), Some(50)),
            ConflictDecision::Proceed
        );
        assert_eq!(
            evaluate(ConflictPolicy::Newer, Some(50), Some(100)),
            ConflictDecision::Skip {
                reason: "newer".into()
            }
        );
        assert_eq!(
            evaluate(ConflictPolicy::Newer, Some(50), Some(50)),
            ConflictDecision::Skip {
                reason: "newer".into()
            }
        );
    }

    #[test]
    fn newer_policy_skips_with_distinct_reason_when_timestamps_missing() {
        assert_eq!(
            evaluate(ConflictPolicy::Newer, None, Some(50)),
            ConflictDecision::Skip {
                reason: "no_timestamp".into()
            }
        );
    }

    #[test]
    fn interactive_policy_defers_to_caller() {
        assert_eq!(
            evaluate(ConflictPolicy::Interactive, None, None),
            ConflictDecision::AskUser
        );
    }
}
