use ulid::Ulid;

use super::conflict::Conflict;
use crate::kyc::{KycAction, KycStatus};
use crate::lifecycle::Transition;
use crate::model::{BookingStatus, Day, RequestStatus};

#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    InvalidRange {
        start: Day,
        end: Day,
    },
    InvalidInput(String),
    LimitExceeded(&'static str),
    AlreadyProcessed {
        id: Ulid,
        status: RequestStatus,
    },
    InvalidTransition {
        id: Ulid,
        from: BookingStatus,
        transition: Transition,
    },
    KycNotVerified {
        id: Ulid,
        status: KycStatus,
    },
    KycInvalidTransition {
        id: Ulid,
        from: KycStatus,
        action: KycAction,
    },
    TooEarly {
        id: Ulid,
        check_in: Day,
        today: Day,
    },
    Unavailable(Conflict),
    Denied {
        reason: String,
        status: u16,
    },
    WalError(String),
}

/// The closed set of outcomes an operator-facing surface distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidRange,
    NotFound,
    StatusConflict,
    AvailabilityConflict,
    StorageError,
    Denied,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::InvalidRange { .. }
            | EngineError::InvalidInput(_)
            | EngineError::LimitExceeded(_) => ErrorKind::InvalidRange,
            EngineError::AlreadyExists(_)
            | EngineError::AlreadyProcessed { .. }
            | EngineError::InvalidTransition { .. }
            | EngineError::KycNotVerified { .. }
            | EngineError::KycInvalidTransition { .. }
            | EngineError::TooEarly { .. } => ErrorKind::StatusConflict,
            EngineError::Unavailable(_) => ErrorKind::AvailabilityConflict,
            EngineError::Denied { .. } => ErrorKind::Denied,
            EngineError::WalError(_) => ErrorKind::StorageError,
        }
    }

    pub fn http_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::InvalidRange => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::StatusConflict | ErrorKind::AvailabilityConflict => 409,
            ErrorKind::StorageError => 500,
            ErrorKind::Denied => match self {
                EngineError::Denied { status, .. } => *status,
                _ => 403,
            },
        }
    }

    /// SQLSTATE reported on the wire.
    pub fn sqlstate(&self) -> &'static str {
        match self {
            EngineError::AlreadyExists(_) => "23505",
            EngineError::LimitExceeded(_) => "54000",
            EngineError::Denied { status: 401, .. } => "28000",
            _ => match self.kind() {
                ErrorKind::InvalidRange => "22023",
                ErrorKind::NotFound => "P0002",
                ErrorKind::StatusConflict => "55000",
                ErrorKind::AvailabilityConflict => "23P01",
                ErrorKind::StorageError => "58030",
                ErrorKind::Denied => "42501",
            },
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::InvalidRange { start, end } => {
                write!(f, "invalid range: {start} must be before {end}")
            }
            EngineError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::AlreadyProcessed { id, status } => {
                write!(f, "request {id} already processed: {status}")
            }
            EngineError::InvalidTransition {
                id,
                from,
                transition,
            } => write!(f, "booking {id}: cannot {transition} from {from}"),
            EngineError::KycNotVerified { id, status } => {
                write!(f, "booking {id}: identity not verified (kyc {status})")
            }
            EngineError::KycInvalidTransition { id, from, action } => write!(
                f,
                "booking {id}: cannot {} identity documents in state {from}",
                action.as_str()
            ),
            EngineError::TooEarly {
                id,
                check_in,
                today,
            } => write!(
                f,
                "booking {id}: no-show not allowed before check-in day {check_in} (today {today})"
            ),
            EngineError::Unavailable(c) => write!(f, "dates unavailable: {c}"),
            EngineError::Denied { reason, .. } => write!(f, "permission denied: {reason}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
