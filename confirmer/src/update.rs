//! Updates emitted by a confirmation task, one per state transition.

use serde::{Deserialize, Serialize};
use std::fmt;

use pulse_types::TxHash;

/// Kind of state transition a confirmation task reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    /// An iteration acted but produced no progress (usually a failed call).
    NoAction,
    /// The bundle was reattached with fresh tips and proof-of-work.
    Reattach,
    /// A zero-value promotion was attached to the current tail.
    Promote,
    /// The bundle was observed confirmed; terminal.
    Confirm,
    /// The task gave up; terminal. Reserved for a future task timeout.
    Failed,
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoAction => "no action",
            Self::Reattach => "reattach",
            Self::Promote => "promote",
            Self::Confirm => "confirm",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// One immutable update record. Counters are cumulative since task start.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfirmerUpdate {
    pub kind: UpdateKind,
    pub num_attaches: u64,
    pub num_promotions: u64,
    /// Total proof-of-work time spent so far, in milliseconds.
    pub total_pow_ms: u64,
    /// Total tip-selection time spent so far, in milliseconds.
    pub total_tipsel_ms: u64,
    /// Unix milliseconds at emission.
    pub timestamp_ms: u64,
    /// The tail that was promoted, for `promote` updates.
    pub promoted_tail: Option<TxHash>,
    /// The error behind a `no action` update.
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_display_matches_wire_names() {
        assert_eq!(UpdateKind::NoAction.to_string(), "no action");
        assert_eq!(UpdateKind::Reattach.to_string(), "reattach");
        assert_eq!(UpdateKind::Promote.to_string(), "promote");
        assert_eq!(UpdateKind::Confirm.to_string(), "confirm");
        assert_eq!(UpdateKind::Failed.to_string(), "failed");
    }

    #[test]
    fn update_serializes_with_snake_case_kind() {
        let upd = ConfirmerUpdate {
            kind: UpdateKind::NoAction,
            num_attaches: 1,
            num_promotions: 2,
            total_pow_ms: 30,
            total_tipsel_ms: 5,
            timestamp_ms: 1_000,
            promoted_tail: None,
            error: Some("boom".to_string()),
        };
        let json = serde_json::to_string(&upd).expect("serializable");
        assert!(json.contains("\"no_action\""));
        assert!(json.contains("\"boom\""));
    }
}
