use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::models::ApprovalStatus;

/// Recoverable failures of the attendance engine. The CLI surfaces the
/// display strings directly to the operator.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("already checked in for {day}")]
    AlreadyCheckedIn { day: NaiveDate },

    #[error("no check-in recorded for {day}")]
    NotCheckedIn { day: NaiveDate },

    #[error("already checked out for {day}")]
    AlreadyCheckedOut { day: NaiveDate },

    #[error("approver has no supervisory scope over this record")]
    NotAuthorized,

    #[error("attendance record {id} not found")]
    RecordNotFound { id: Uuid },

    #[error("no user found for {ident}")]
    UserNotFound { ident: String },

    #[error("record was already {status}; conflicting decisions are rejected")]
    AlreadyDecided { status: ApprovalStatus },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
