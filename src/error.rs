//! Error kinds surfaced by the engine and the service around it.

use thiserror::Error;

use crate::data::{ClassroomId, DepartmentId, FormId, Role, StaffId, SubjectId};
use crate::forms::FormStatus;
use crate::solver::RunState;

/// Malformed constraint or schedule configuration. Aborts a run before
/// anything is committed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid {field} for role {role}: {value}")]
    InvalidCap {
        role: Role,
        field: &'static str,
        value: i64,
    },

    #[error("schedule config has no working days")]
    EmptyWorkingDays,

    #[error("working day listed twice: {0}")]
    DuplicateWorkingDay(String),

    #[error("schedule config has zero periods per day")]
    ZeroPeriods,

    #[error("invalid {field}: {value:?}")]
    InvalidTime { field: &'static str, value: String },

    #[error("start time {start} is not before end time {end}")]
    InvertedHours { start: String, end: String },

    #[error("period duration is zero minutes")]
    ZeroPeriodDuration,

    #[error("{periods} periods of {duration} minutes run past end time {end}")]
    PeriodsOverrunDay {
        periods: u32,
        duration: u32,
        end: String,
    },

    #[error("subject {subject_id} has zero credits")]
    ZeroCredits { subject_id: SubjectId },

    #[error("subject {subject_id} demand overflows")]
    DemandOverflow { subject_id: SubjectId },

    #[error("duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: u32 },
}

/// A request rejected synchronously without any state change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("subject selection of staff {staff_id} is already locked")]
    SelectionLocked { staff_id: StaffId },

    #[error("subject selection is empty")]
    EmptySelection,

    #[error("maximum {max} subjects allowed for {role}, got {requested}")]
    TooManySubjects {
        role: Role,
        requested: usize,
        max: u32,
    },

    #[error("unknown subject {0}")]
    UnknownSubject(SubjectId),

    #[error("unknown staff member {0}")]
    UnknownStaff(StaffId),

    #[error("unknown choice form {0}")]
    UnknownForm(FormId),

    #[error("choice form {form_id} is {status:?}, not open for submissions")]
    FormNotOpen { form_id: FormId, status: FormStatus },

    #[error("choice form {form_id} cannot move from {from:?} to {to:?}")]
    InvalidFormTransition {
        form_id: FormId,
        from: FormStatus,
        to: FormStatus,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("unknown department {0}")]
    UnknownDepartment(DepartmentId),

    #[error("store lock poisoned: {0}")]
    Poisoned(&'static str),

    #[error("write rejected: {0}")]
    WriteRejected(String),
}

/// Why a scheduler run was aborted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolveError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("generation exceeded its {limit_ms} ms deadline")]
    DeadlineExceeded { limit_ms: u64 },

    #[error("scheduler already finished in state {state:?}")]
    AlreadyFinished { state: RunState },
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("generation timed out after {limit_ms} ms")]
    Timeout { limit_ms: u64 },

    #[error("no timetable has been generated for department {0}")]
    NotGenerated(DepartmentId),

    #[error("staff member {0} is not part of the committed timetable directory")]
    UnknownStaff(StaffId),

    #[error("classroom {0} is not part of the committed timetable directory")]
    UnknownClassroom(ClassroomId),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<SolveError> for ServiceError {
    fn from(err: SolveError) -> Self {
        match err {
            SolveError::Config(e) => ServiceError::Config(e),
            SolveError::DeadlineExceeded { limit_ms } => ServiceError::Timeout { limit_ms },
            err @ SolveError::AlreadyFinished { .. } => ServiceError::Internal(err.to_string()),
        }
    }
}
