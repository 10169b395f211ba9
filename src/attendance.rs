use std::fmt;
use std::str::FromStr;

use anyhow::bail;

use crate::models::{ApprovalStatus, Role, UserRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn as_status(self) -> ApprovalStatus {
        match self {
            Decision::Approve => ApprovalStatus::Approved,
            Decision::Reject => ApprovalStatus::Rejected,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
        };
        f.write_str(label)
    }
}

impl FromStr for Decision {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Decision::Approve),
            "reject" => Ok(Decision::Reject),
            other => bail!("action must be approve or reject, got {other:?}"),
        }
    }
}

/// Status a check-in or check-out lands in. Supervisory roles self-approve;
/// everyone else waits for a decision. A check-out re-applies this even when
/// the check-in was already approved.
pub fn auto_status(role: Role) -> ApprovalStatus {
    if role.is_privileged() {
        ApprovalStatus::Approved
    } else {
        ApprovalStatus::Pending
    }
}

/// Supervisory scope: any admin, or the manager the owner reports to.
pub fn supervises(approver: &UserRecord, owner: &UserRecord) -> bool {
    match approver.role {
        Role::Admin => true,
        Role::Manager => owner.manager_id == Some(approver.id),
        Role::Employee => false,
    }
}

/// Approved and rejected are terminal; only an idempotent repeat of the
/// same decision is accepted against them.
pub fn decision_allowed(current: ApprovalStatus, decision: Decision) -> bool {
    match current {
        ApprovalStatus::Pending => true,
        ApprovalStatus::Approved => decision == Decision::Approve,
        ApprovalStatus::Rejected => decision == Decision::Reject,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(role: Role, manager_id: Option<Uuid>) -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            full_name: "Asha Rao".to_string(),
            email: "asha@example.com".to_string(),
            role,
            manager_id,
        }
    }

    #[test]
    fn employees_wait_for_approval_supervisors_do_not() {
        assert_eq!(auto_status(Role::Employee), ApprovalStatus::Pending);
        assert_eq!(auto_status(Role::Manager), ApprovalStatus::Approved);
        assert_eq!(auto_status(Role::Admin), ApprovalStatus::Approved);
    }

    #[test]
    fn admins_supervise_everyone() {
        let admin = user(Role::Admin, None);
        let stranger = user(Role::Employee, Some(Uuid::new_v4()));
        assert!(supervises(&admin, &stranger));
    }

    #[test]
    fn managers_supervise_only_direct_reports() {
        let manager = user(Role::Manager, None);
        let report = user(Role::Employee, Some(manager.id));
        let other = user(Role::Employee, Some(Uuid::new_v4()));
        let unmanaged = user(Role::Employee, None);

        assert!(supervises(&manager, &report));
        assert!(!supervises(&manager, &other));
        assert!(!supervises(&manager, &unmanaged));
    }

    #[test]
    fn employees_never_supervise() {
        let employee = user(Role::Employee, None);
        let report = user(Role::Employee, Some(employee.id));
        assert!(!supervises(&employee, &report));
    }

    #[test]
    fn pending_accepts_either_decision() {
        assert!(decision_allowed(ApprovalStatus::Pending, Decision::Approve));
        assert!(decision_allowed(ApprovalStatus::Pending, Decision::Reject));
    }

    #[test]
    fn terminal_states_accept_only_their_own_decision() {
        assert!(decision_allowed(ApprovalStatus::Approved, Decision::Approve));
        assert!(!decision_allowed(ApprovalStatus::Approved, Decision::Reject));
        assert!(decision_allowed(ApprovalStatus::Rejected, Decision::Reject));
        assert!(!decision_allowed(ApprovalStatus::Rejected, Decision::Approve));
    }
}
