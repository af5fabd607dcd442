mod backend;
mod encoder;

pub use backend::IntervalBackend;

use ulid::Ulid;

use crate::model::{Sec, Span};

/// A proposed meeting, flattened to exactly what admission needs.
#[derive(Debug, Clone)]
pub struct SchedulingConstraint {
    /// Set on update so the persisted row is excluded from checking
    /// (a title-only update must decide SAT against itself).
    pub meeting_id: Option<Ulid>,
    pub room_id: Ulid,
    pub room_capacity: u32,
    /// Raw bounds, deliberately not a `Span`: an inverted range must reach
    /// the pre-check and come back as a witness, not panic upstream.
    pub start: Sec,
    pub end: Sec,
    pub participant_ids: Vec<Ulid>,
}

impl SchedulingConstraint {
    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }
}

/// One row of the confirmed snapshot handed to the backend.
#[derive(Debug, Clone)]
pub struct ExistingMeeting {
    pub meeting_id: Ulid,
    pub room_id: Ulid,
    pub span: Span,
    pub participant_ids: Vec<Ulid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionResult {
    Sat {
        solving_time_ms: i64,
    },
    /// One human-readable witness per violated constraint.
    Unsat {
        violations: Vec<String>,
        solving_time_ms: i64,
    },
    Error {
        message: String,
        solving_time_ms: i64,
    },
}

impl DecisionResult {
    pub fn is_sat(&self) -> bool {
        matches!(self, DecisionResult::Sat { .. })
    }

    pub fn solving_time_ms(&self) -> i64 {
        match self {
            DecisionResult::Sat { solving_time_ms }
            | DecisionResult::Unsat { solving_time_ms, .. }
            | DecisionResult::Error { solving_time_ms, .. } => *solving_time_ms,
        }
    }
}

/// A decision engine for the scheduling constraint set.
///
/// The current constraints decide in linear time, but implementations keep
/// push/pop framing around each conflict assertion so hypotheses can be
/// added and retracted without rebuilding the whole formula — the shape an
/// SMT-style backend needs once softer constraints arrive.
pub trait DecisionBackend: Send + Sync {
    fn check_feasibility(
        &self,
        proposed: &SchedulingConstraint,
        existing: &[ExistingMeeting],
    ) -> DecisionResult;

    /// Check several proposals against the snapshot and against each other
    /// (every ordered pair `(i, j)` with `i < j`). Witnesses name proposals
    /// by 0-based index.
    fn check_batch(
        &self,
        proposals: &[SchedulingConstraint],
        existing: &[ExistingMeeting],
    ) -> DecisionResult;

    /// Live switch. Disabled means every check is `Sat` in 0 ms — the
    /// unverified regime, for runtime comparison without a redeploy.
    fn set_enabled(&self, enabled: bool);

    fn is_enabled(&self) -> bool;
}
