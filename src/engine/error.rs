use ulid::Ulid;

use crate::model::MeetingStatus;

#[derive(Debug)]
pub enum EngineError {
    RoomNotFound(Ulid),
    ParticipantNotFound(Ulid),
    MeetingNotFound(Ulid),
    DuplicateRoomName(String),
    DuplicateEmail(String),
    RoomUnavailable(Ulid),
    RoomInUse(Ulid),
    ParticipantInUse(Ulid),
    InvalidTransition {
        from: MeetingStatus,
        to: MeetingStatus,
    },
    ImmutableMeeting {
        id: Ulid,
        status: MeetingStatus,
    },
    /// The monitor's delete-time handler raised at ERROR or above; the
    /// delete was refused and nothing was persisted.
    MonitorRefused {
        violations: Vec<String>,
    },
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::RoomNotFound(id) => write!(f, "room not found: {id}"),
            EngineError::ParticipantNotFound(id) => write!(f, "participant not found: {id}"),
            EngineError::MeetingNotFound(id) => write!(f, "meeting not found: {id}"),
            EngineError::DuplicateRoomName(name) => write!(f, "room name already taken: {name}"),
            EngineError::DuplicateEmail(email) => {
                write!(f, "participant email already taken: {email}")
            }
            EngineError::RoomUnavailable(id) => write!(f, "room is not available: {id}"),
            EngineError::RoomInUse(id) => {
                write!(f, "cannot delete room {id}: referenced by live meetings")
            }
            EngineError::ParticipantInUse(id) => {
                write!(f, "cannot delete participant {id}: referenced by live meetings")
            }
            EngineError::InvalidTransition { from, to } => {
                write!(f, "invalid status transition: {from} -> {to}")
            }
            EngineError::ImmutableMeeting { id, status } => {
                write!(f, "meeting {id} cannot be modified in status {status}")
            }
            EngineError::MonitorRefused { violations } => {
                write!(f, "delete refused by lifecycle monitor: {}", violations.join("; "))
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
