//! Review workflow for financial transactions.
//!
//! Every collection, disbursement, and DFUR project moves through the same
//! three-valued lifecycle: an encoder submits it as `pending`, a checker
//! verifies it (or flags it back with a comment), and an approver issues the
//! final disposition. `approved` is terminal. A flagged record may be
//! re-submitted by the encoder, which resets it to `pending`.
//!
//! The checker's "ready for approval" mark is not a status of its own; it is
//! tracked in the `checked_by`/`checked_at` columns so the status field stays
//! restricted to the three public values.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json as AxumJson, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Flagged,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Flagged => "flagged",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReviewStatus::Pending),
            "approved" => Some(ReviewStatus::Approved),
            "flagged" => Some(ReviewStatus::Flagged),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Superadmin,
    Admin,
    Encoder,
    Checker,
    Reviewer,
    Approver,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Superadmin => "superadmin",
            Role::Admin => "admin",
            Role::Encoder => "encoder",
            Role::Checker => "checker",
            Role::Reviewer => "reviewer",
            Role::Approver => "approver",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "superadmin" => Some(Role::Superadmin),
            "admin" => Some(Role::Admin),
            "encoder" => Some(Role::Encoder),
            "checker" => Some(Role::Checker),
            "reviewer" => Some(Role::Reviewer),
            "approver" => Some(Role::Approver),
            _ => None,
        }
    }

    /// Admins and superadmins may perform corrective edits in place of any
    /// workflow role. The terminal-state rule still applies to them.
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Superadmin | Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow action requested against a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    /// Checker marks a pending record verified and ready for final approval.
    Check,
    /// Move a pending record to flagged. Requires a comment.
    Flag,
    /// Final disposition: pending -> approved.
    Approve,
    /// Encoder re-submits a flagged record, resetting it to pending.
    Resubmit,
}

impl ReviewAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewAction::Check => "check",
            ReviewAction::Flag => "flag",
            ReviewAction::Approve => "approve",
            ReviewAction::Resubmit => "resubmit",
        }
    }
}

/// Current workflow position of a record, read back from storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewState {
    pub status: ReviewStatus,
    /// Whether a checker has marked the record ready for approval.
    pub checked: bool,
}

/// Validated result of a review action; the db layer applies it verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewEffect {
    /// Set checked_by/checked_at; status stays pending.
    Checked,
    /// Set status to flagged with the supplied comment.
    Flagged,
    /// Set status to approved. Terminal.
    Approved,
    /// Reset to pending and clear all review fields on the record.
    Resubmitted,
}

impl ReviewEffect {
    /// Status of the record after the effect is applied.
    pub fn resulting_status(&self) -> ReviewStatus {
        match self {
            ReviewEffect::Checked | ReviewEffect::Resubmitted => ReviewStatus::Pending,
            ReviewEffect::Flagged => ReviewStatus::Flagged,
            ReviewEffect::Approved => ReviewStatus::Approved,
        }
    }
}

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("transaction is approved and can no longer be modified")]
    Terminal,
    #[error("cannot move a transaction from {from} to {to}")]
    InvalidTransition { from: ReviewStatus, to: ReviewStatus },
    #[error("a comment is required when flagging a transaction")]
    CommentRequired,
    #[error("transaction has not been checked and is not ready for final approval")]
    NotChecked,
    #[error("role {role} is not allowed to {action} this transaction")]
    Forbidden { role: Role, action: &'static str },
}

impl ReviewError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ReviewError::Terminal => StatusCode::CONFLICT,
            ReviewError::InvalidTransition { .. } => StatusCode::CONFLICT,
            ReviewError::NotChecked => StatusCode::CONFLICT,
            ReviewError::CommentRequired => StatusCode::BAD_REQUEST,
            ReviewError::Forbidden { .. } => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for ReviewError {
    fn into_response(self) -> Response {
        let code = self.status_code();
        (code, AxumJson(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Status transition guard. Permits only the edges
/// pending -> flagged, pending -> approved, and flagged -> pending.
pub fn check_transition(from: ReviewStatus, to: ReviewStatus) -> Result<(), ReviewError> {
    use ReviewStatus::*;
    match (from, to) {
        (Approved, _) => Err(ReviewError::Terminal),
        (Pending, Flagged) | (Pending, Approved) | (Flagged, Pending) => Ok(()),
        (from, to) => Err(ReviewError::InvalidTransition { from, to }),
    }
}

/// Evaluates a review action against the record's current state and the
/// acting user's role. Returns the effect to persist, or the error to report.
pub fn evaluate(
    role: Role,
    action: ReviewAction,
    state: ReviewState,
    comment: Option<&str>,
) -> Result<ReviewEffect, ReviewError> {
    // Terminal state first: not even admins may touch an approved record.
    if state.status == ReviewStatus::Approved {
        return Err(ReviewError::Terminal);
    }

    match action {
        ReviewAction::Check => {
            if state.status != ReviewStatus::Pending {
                return Err(ReviewError::InvalidTransition {
                    from: state.status,
                    to: ReviewStatus::Pending,
                });
            }
            if !(role == Role::Checker || role.is_admin()) {
                return Err(ReviewError::Forbidden { role, action: "check" });
            }
            Ok(ReviewEffect::Checked)
        }
        ReviewAction::Flag => {
            check_transition(state.status, ReviewStatus::Flagged)?;
            let has_comment = comment.map(|c| !c.trim().is_empty()).unwrap_or(false);
            if !has_comment {
                return Err(ReviewError::CommentRequired);
            }
            let permitted = match role {
                Role::Checker => true,
                // Approvers issue dispositions only on checker-reviewed records.
                Role::Approver => {
                    if !state.checked {
                        return Err(ReviewError::NotChecked);
                    }
                    true
                }
                _ => role.is_admin(),
            };
            if !permitted {
                return Err(ReviewError::Forbidden { role, action: "flag" });
            }
            Ok(ReviewEffect::Flagged)
        }
        ReviewAction::Approve => {
            check_transition(state.status, ReviewStatus::Approved)?;
            match role {
                Role::Approver => {
                    if !state.checked {
                        return Err(ReviewError::NotChecked);
                    }
                }
                r if r.is_admin() => {}
                _ => return Err(ReviewError::Forbidden { role, action: "approve" }),
            }
            Ok(ReviewEffect::Approved)
        }
        ReviewAction::Resubmit => {
            check_transition(state.status, ReviewStatus::Pending)?;
            if !(role == Role::Encoder || role.is_admin()) {
                return Err(ReviewError::Forbidden { role, action: "resubmit" });
            }
            Ok(ReviewEffect::Resubmitted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> ReviewState {
        ReviewState { status: ReviewStatus::Pending, checked: false }
    }

    fn checked_pending() -> ReviewState {
        ReviewState { status: ReviewStatus::Pending, checked: true }
    }

    fn flagged() -> ReviewState {
        ReviewState { status: ReviewStatus::Flagged, checked: true }
    }

    fn approved() -> ReviewState {
        ReviewState { status: ReviewStatus::Approved, checked: true }
    }

    #[test]
    fn permitted_edges_only() {
        use ReviewStatus::*;
        assert!(check_transition(Pending, Flagged).is_ok());
        assert!(check_transition(Pending, Approved).is_ok());
        assert!(check_transition(Flagged, Pending).is_ok());
        assert!(matches!(check_transition(Approved, Pending), Err(ReviewError::Terminal)));
        assert!(matches!(check_transition(Approved, Flagged), Err(ReviewError::Terminal)));
        assert!(matches!(
            check_transition(Flagged, Approved),
            Err(ReviewError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn approved_is_terminal_for_everyone() {
        for role in [Role::Superadmin, Role::Admin, Role::Encoder, Role::Checker, Role::Approver] {
            for action in [
                ReviewAction::Check,
                ReviewAction::Flag,
                ReviewAction::Approve,
                ReviewAction::Resubmit,
            ] {
                let err = evaluate(role, action, approved(), Some("note")).unwrap_err();
                assert!(matches!(err, ReviewError::Terminal), "{role} {}", action.as_str());
            }
        }
    }

    #[test]
    fn flag_requires_comment() {
        let err = evaluate(Role::Checker, ReviewAction::Flag, pending(), None).unwrap_err();
        assert!(matches!(err, ReviewError::CommentRequired));
        let err = evaluate(Role::Checker, ReviewAction::Flag, pending(), Some("   ")).unwrap_err();
        assert!(matches!(err, ReviewError::CommentRequired));
        let ok = evaluate(Role::Checker, ReviewAction::Flag, pending(), Some("missing OR number"));
        assert_eq!(ok.unwrap(), ReviewEffect::Flagged);
    }

    #[test]
    fn approve_does_not_require_comment() {
        let effect = evaluate(Role::Approver, ReviewAction::Approve, checked_pending(), None).unwrap();
        assert_eq!(effect, ReviewEffect::Approved);
        assert_eq!(effect.resulting_status(), ReviewStatus::Approved);
    }

    #[test]
    fn checker_cannot_approve() {
        let err =
            evaluate(Role::Checker, ReviewAction::Approve, checked_pending(), None).unwrap_err();
        assert!(matches!(err, ReviewError::Forbidden { role: Role::Checker, .. }));
    }

    #[test]
    fn encoder_cannot_check_flag_or_approve() {
        for action in [ReviewAction::Check, ReviewAction::Flag, ReviewAction::Approve] {
            let err = evaluate(Role::Encoder, action, checked_pending(), Some("c")).unwrap_err();
            assert!(matches!(err, ReviewError::Forbidden { .. }));
        }
    }

    #[test]
    fn reviewer_has_no_transitions() {
        for action in [
            ReviewAction::Check,
            ReviewAction::Flag,
            ReviewAction::Approve,
            ReviewAction::Resubmit,
        ] {
            let state = if action == ReviewAction::Resubmit { flagged() } else { checked_pending() };
            let err = evaluate(Role::Reviewer, action, state, Some("c")).unwrap_err();
            assert!(matches!(err, ReviewError::Forbidden { .. }));
        }
    }

    #[test]
    fn approver_needs_checked_record() {
        let err = evaluate(Role::Approver, ReviewAction::Approve, pending(), None).unwrap_err();
        assert!(matches!(err, ReviewError::NotChecked));
        let err = evaluate(Role::Approver, ReviewAction::Flag, pending(), Some("c")).unwrap_err();
        assert!(matches!(err, ReviewError::NotChecked));
    }

    #[test]
    fn admin_bypasses_checked_gate_but_not_terminal() {
        let effect = evaluate(Role::Admin, ReviewAction::Approve, pending(), None).unwrap();
        assert_eq!(effect, ReviewEffect::Approved);
        let err = evaluate(Role::Admin, ReviewAction::Approve, approved(), None).unwrap_err();
        assert!(matches!(err, ReviewError::Terminal));
    }

    #[test]
    fn encoder_resubmits_flagged() {
        let effect = evaluate(Role::Encoder, ReviewAction::Resubmit, flagged(), None).unwrap();
        assert_eq!(effect, ReviewEffect::Resubmitted);
        assert_eq!(effect.resulting_status(), ReviewStatus::Pending);
        // Resubmitting a pending record is not a valid edge.
        let err = evaluate(Role::Encoder, ReviewAction::Resubmit, pending(), None).unwrap_err();
        assert!(matches!(err, ReviewError::InvalidTransition { .. }));
    }

    #[test]
    fn check_keeps_status_pending() {
        let effect = evaluate(Role::Checker, ReviewAction::Check, pending(), None).unwrap();
        assert_eq!(effect, ReviewEffect::Checked);
        assert_eq!(effect.resulting_status(), ReviewStatus::Pending);
        // Checking a flagged record is rejected.
        let err = evaluate(Role::Checker, ReviewAction::Check, flagged(), None).unwrap_err();
        assert!(matches!(err, ReviewError::InvalidTransition { .. }));
    }
}
