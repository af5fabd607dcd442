use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix seconds, UTC — the only time type. Boundary layers convert;
/// everything in here compares raw seconds.
pub type Sec = i64;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Sec,
    pub end: Sec,
}

impl Span {
    pub fn new(start: Sec, end: Sec) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_secs(&self) -> Sec {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Sec) -> bool {
        self.start <= t && t < self.end
    }
}

// ── Entities ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: Ulid,
    /// Unique across rooms.
    pub name: String,
    pub capacity: u32,
    pub location: Option<String>,
    pub description: Option<String>,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: Ulid,
    pub name: String,
    /// Unique across participants.
    pub email: String,
    pub department: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeetingStatus {
    Pending,
    Confirmed,
    Rejected,
    Cancelled,
    Completed,
}

impl MeetingStatus {
    /// The status machine. Pending resolves to Confirmed or Rejected;
    /// Confirmed resolves to Cancelled or Completed; everything else is final.
    pub fn can_transition_to(&self, next: MeetingStatus) -> bool {
        use MeetingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Rejected)
                | (Confirmed, Cancelled)
                | (Confirmed, Completed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        use MeetingStatus::*;
        matches!(self, Rejected | Cancelled | Completed)
    }

    /// A meeting that still occupies its room slot.
    pub fn is_live(&self) -> bool {
        use MeetingStatus::*;
        matches!(self, Pending | Confirmed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingStatus::Pending => "PENDING",
            MeetingStatus::Confirmed => "CONFIRMED",
            MeetingStatus::Rejected => "REJECTED",
            MeetingStatus::Cancelled => "CANCELLED",
            MeetingStatus::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for MeetingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: Ulid,
    pub title: String,
    pub description: Option<String>,
    pub room_id: Ulid,
    /// Non-empty; bounded by the room capacity at admission time.
    pub participant_ids: Vec<Ulid>,
    pub span: Span,
    pub status: MeetingStatus,
    pub created_at: Sec,
    pub updated_at: Sec,
}

/// Inbound shape for create: everything a meeting needs except identity
/// and status, which the service assigns.
#[derive(Debug, Clone)]
pub struct MeetingDraft {
    pub title: String,
    pub description: Option<String>,
    pub room_id: Ulid,
    pub participant_ids: Vec<Ulid>,
    pub start: Sec,
    pub end: Sec,
}

/// Partial overlay for update. `None` keeps the persisted field.
#[derive(Debug, Clone, Default)]
pub struct MeetingUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub room_id: Option<Ulid>,
    pub participant_ids: Option<Vec<Ulid>>,
    pub start: Option<Sec>,
    pub end: Option<Sec>,
}

// ── Persistence events ───────────────────────────────────────────

/// The event types — flat, no nesting. This is the WAL record format.
/// `MeetingCreated` carries the whole meeting (status included) so
/// compaction can emit a single record per meeting regardless of how far
/// its lifecycle progressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated {
        id: Ulid,
        name: String,
        capacity: u32,
        location: Option<String>,
        description: Option<String>,
        available: bool,
    },
    RoomUpdated {
        id: Ulid,
        name: String,
        capacity: u32,
        location: Option<String>,
        description: Option<String>,
        available: bool,
    },
    RoomDeleted {
        id: Ulid,
    },
    ParticipantCreated {
        id: Ulid,
        name: String,
        email: String,
        department: Option<String>,
    },
    ParticipantUpdated {
        id: Ulid,
        name: String,
        email: String,
        department: Option<String>,
    },
    ParticipantDeleted {
        id: Ulid,
    },
    MeetingCreated {
        meeting: Meeting,
    },
    MeetingUpdated {
        id: Ulid,
        title: String,
        description: Option<String>,
        room_id: Ulid,
        participant_ids: Vec<Ulid>,
        span: Span,
        updated_at: Sec,
    },
    MeetingStatusChanged {
        id: Ulid,
        from: MeetingStatus,
        to: MeetingStatus,
        at: Sec,
    },
    MeetingDeleted {
        id: Ulid,
    },
}

// ── Scheduling result (crosses the API boundary unchanged) ───────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverStatus {
    Satisfiable,
    Unsatisfiable,
    Error,
}

impl SolverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolverStatus::Satisfiable => "SATISFIABLE",
            SolverStatus::Unsatisfiable => "UNSATISFIABLE",
            SolverStatus::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingResult {
    pub success: bool,
    pub meeting: Option<Meeting>,
    pub constraint_violations: Vec<String>,
    /// Monitor observations attached after a successful persist. They never
    /// revert the persist; they surface state skew worth investigating.
    pub runtime_warnings: Vec<String>,
    pub solver_status: SolverStatus,
    pub explanation: String,
    pub solving_time_ms: i64,
}

impl SchedulingResult {
    pub fn success(meeting: Meeting, explanation: impl Into<String>, solving_time_ms: i64) -> Self {
        Self {
            success: true,
            meeting: Some(meeting),
            constraint_violations: Vec::new(),
            runtime_warnings: Vec::new(),
            solver_status: SolverStatus::Satisfiable,
            explanation: explanation.into(),
            solving_time_ms,
        }
    }

    pub fn failure(
        violations: Vec<String>,
        explanation: impl Into<String>,
        solving_time_ms: i64,
    ) -> Self {
        Self {
            success: false,
            meeting: None,
            constraint_violations: violations,
            runtime_warnings: Vec::new(),
            solver_status: SolverStatus::Unsatisfiable,
            explanation: explanation.into(),
            solving_time_ms,
        }
    }

    pub fn backend_error(message: impl Into<String>, solving_time_ms: i64) -> Self {
        let message = message.into();
        Self {
            success: false,
            meeting: None,
            constraint_violations: vec![message.clone()],
            runtime_warnings: Vec::new(),
            solver_status: SolverStatus::Error,
            explanation: message,
            solving_time_ms,
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.runtime_warnings = warnings;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_basics() {
        let s = Span::new(100, 200);
        assert_eq!(s.duration_secs(), 100);
        assert!(s.contains_instant(100));
        assert!(s.contains_instant(199));
        assert!(!s.contains_instant(200)); // half-open
    }

    #[test]
    fn span_overlap() {
        let a = Span::new(100, 200);
        let b = Span::new(150, 250);
        let c = Span::new(200, 300);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c)); // adjacent, not overlapping
    }

    #[test]
    fn status_machine_allows_documented_transitions() {
        use MeetingStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Completed));
    }

    #[test]
    fn status_machine_rejects_everything_else() {
        use MeetingStatus::*;
        let all = [Pending, Confirmed, Rejected, Cancelled, Completed];
        let allowed = [
            (Pending, Confirmed),
            (Pending, Rejected),
            (Confirmed, Cancelled),
            (Confirmed, Completed),
        ];
        for from in all {
            for to in all {
                let expect = allowed.contains(&(from, to));
                assert_eq!(from.can_transition_to(to), expect, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn terminal_statuses() {
        use MeetingStatus::*;
        assert!(!Pending.is_terminal());
        assert!(!Confirmed.is_terminal());
        assert!(Rejected.is_terminal());
        assert!(Cancelled.is_terminal());
        assert!(Completed.is_terminal());
    }

    #[test]
    fn live_statuses() {
        use MeetingStatus::*;
        assert!(Pending.is_live());
        assert!(Confirmed.is_live());
        assert!(!Rejected.is_live());
        assert!(!Cancelled.is_live());
        assert!(!Completed.is_live());
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::MeetingStatusChanged {
            id: Ulid::new(),
            from: MeetingStatus::Pending,
            to: MeetingStatus::Confirmed,
            at: 1_700_000_000,
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn result_constructors() {
        let failure = SchedulingResult::failure(vec!["Room conflict: x".into()], "infeasible", 3);
        assert!(!failure.success);
        assert_eq!(failure.solver_status, SolverStatus::Unsatisfiable);
        assert!(failure.meeting.is_none());

        let err = SchedulingResult::backend_error("solver timeout", 5000);
        assert_eq!(err.solver_status, SolverStatus::Error);
        assert_eq!(err.constraint_violations, vec!["solver timeout".to_string()]);
    }
}
