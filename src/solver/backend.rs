use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::model::Span;
use crate::observability;

use super::{DecisionBackend, DecisionResult, ExistingMeeting, SchedulingConstraint, encoder};

/// One fact asserted into the current frame.
#[derive(Debug, Clone, Copy)]
enum Assertion {
    /// The proposed interval stays disjoint from an existing hold on the
    /// same room.
    RoomDisjoint { proposed: Span, existing: Span },
    /// The proposed interval stays disjoint from an existing booking of a
    /// shared participant.
    ParticipantDisjoint { proposed: Span, existing: Span },
}

impl Assertion {
    fn holds(&self) -> bool {
        match self {
            Assertion::RoomDisjoint { proposed, existing }
            | Assertion::ParticipantDisjoint { proposed, existing } => {
                !proposed.overlaps(existing)
            }
        }
    }
}

/// Incremental assertion stack. `push` opens a frame, `pop` retracts every
/// assertion made since, so one conflict hypothesis can be tested and
/// withdrawn without touching the rest of the formula.
#[derive(Default)]
struct FrameStack {
    assertions: Vec<Assertion>,
    marks: Vec<usize>,
}

impl FrameStack {
    fn push(&mut self) {
        self.marks.push(self.assertions.len());
    }

    fn assert(&mut self, assertion: Assertion) {
        self.assertions.push(assertion);
    }

    /// Satisfiable iff every assertion in scope holds.
    fn check(&self) -> bool {
        self.assertions.iter().all(Assertion::holds)
    }

    fn pop(&mut self) {
        let mark = self.marks.pop().unwrap_or(0);
        self.assertions.truncate(mark);
    }
}

/// Pure algorithmic decision backend over interval disjointness.
///
/// Calls are serialized by the internal mutex; frames never leak across
/// calls. Equivalent in contract to an SMT adapter, minus the solver
/// process.
pub struct IntervalBackend {
    core: Mutex<FrameStack>,
    enabled: AtomicBool,
    timeout: Duration,
}

impl IntervalBackend {
    pub fn new(enabled: bool, timeout: Duration) -> Self {
        Self {
            core: Mutex::new(FrameStack::default()),
            enabled: AtomicBool::new(enabled),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.solver_enabled, config.solver_timeout)
    }

    fn deadline_exceeded(&self, started: Instant) -> bool {
        started.elapsed() > self.timeout
    }

    /// Test one proposal against the snapshot, appending witnesses.
    /// Returns false when the deadline fired.
    fn solve_one(
        &self,
        core: &mut FrameStack,
        proposed: &SchedulingConstraint,
        existing: &[ExistingMeeting],
        started: Instant,
        violations: &mut Vec<String>,
    ) -> bool {
        let span = proposed.span();
        for candidate in existing {
            if Some(candidate.meeting_id) == proposed.meeting_id {
                continue; // update self-exclusion
            }
            if self.deadline_exceeded(started) {
                return false;
            }

            if candidate.room_id == proposed.room_id {
                core.push();
                core.assert(Assertion::RoomDisjoint {
                    proposed: span,
                    existing: candidate.span,
                });
                if !core.check() {
                    violations.push(encoder::room_conflict(candidate));
                }
                core.pop();
            }

            for participant in encoder::shared_participants(proposed, candidate) {
                core.push();
                core.assert(Assertion::ParticipantDisjoint {
                    proposed: span,
                    existing: candidate.span,
                });
                if !core.check() {
                    violations.push(encoder::participant_conflict(participant, candidate));
                }
                core.pop();
            }
        }
        true
    }

    fn finish(&self, violations: Vec<String>, started: Instant) -> DecisionResult {
        let solving_time_ms = started.elapsed().as_millis() as i64;
        if violations.is_empty() {
            metrics::counter!(observability::CHECKS_TOTAL, "status" => "sat").increment(1);
            DecisionResult::Sat { solving_time_ms }
        } else {
            metrics::counter!(observability::CHECKS_TOTAL, "status" => "unsat").increment(1);
            DecisionResult::Unsat {
                violations,
                solving_time_ms,
            }
        }
    }

    fn timed_out(&self, started: Instant) -> DecisionResult {
        metrics::counter!(observability::CHECKS_TOTAL, "status" => "error").increment(1);
        DecisionResult::Error {
            message: "solver timeout".to_string(),
            solving_time_ms: started.elapsed().as_millis() as i64,
        }
    }
}

impl DecisionBackend for IntervalBackend {
    fn check_feasibility(
        &self,
        proposed: &SchedulingConstraint,
        existing: &[ExistingMeeting],
    ) -> DecisionResult {
        if !self.is_enabled() {
            return DecisionResult::Sat { solving_time_ms: 0 };
        }
        let started = Instant::now();

        let violations = encoder::pre_check(proposed);
        if !violations.is_empty() {
            return self.finish(violations, started);
        }

        let mut core = match self.core.lock() {
            Ok(core) => core,
            Err(_) => {
                metrics::counter!(observability::CHECKS_TOTAL, "status" => "error").increment(1);
                return DecisionResult::Error {
                    message: "solver state poisoned".to_string(),
                    solving_time_ms: started.elapsed().as_millis() as i64,
                };
            }
        };

        let mut violations = Vec::new();
        if !self.solve_one(&mut core, proposed, existing, started, &mut violations) {
            return self.timed_out(started);
        }
        drop(core);

        metrics::histogram!(observability::CHECK_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        self.finish(violations, started)
    }

    fn check_batch(
        &self,
        proposals: &[SchedulingConstraint],
        existing: &[ExistingMeeting],
    ) -> DecisionResult {
        if !self.is_enabled() {
            return DecisionResult::Sat { solving_time_ms: 0 };
        }
        let started = Instant::now();
        let mut violations = Vec::new();

        // Each proposal against the snapshot. Pre-check failures are
        // labelled with the proposal index and skip the scan.
        let mut core = match self.core.lock() {
            Ok(core) => core,
            Err(_) => {
                metrics::counter!(observability::CHECKS_TOTAL, "status" => "error").increment(1);
                return DecisionResult::Error {
                    message: "solver state poisoned".to_string(),
                    solving_time_ms: started.elapsed().as_millis() as i64,
                };
            }
        };

        let mut shaped = vec![true; proposals.len()];
        for (i, proposal) in proposals.iter().enumerate() {
            let pre = encoder::pre_check(proposal);
            if !pre.is_empty() {
                shaped[i] = false;
                violations.extend(pre.into_iter().map(|v| format!("Proposal {i}: {v}")));
                continue;
            }
            let mut own = Vec::new();
            if !self.solve_one(&mut core, proposal, existing, started, &mut own) {
                return self.timed_out(started);
            }
            violations.extend(own.into_iter().map(|v| format!("Proposal {i}: {v}")));
        }
        drop(core);

        // Every ordered pair among the proposals themselves.
        for i in 0..proposals.len() {
            for j in (i + 1)..proposals.len() {
                if !shaped[i] || !shaped[j] {
                    continue;
                }
                if self.deadline_exceeded(started) {
                    return self.timed_out(started);
                }
                let (a, b) = (&proposals[i], &proposals[j]);
                if !a.span().overlaps(&b.span()) {
                    continue;
                }
                if a.room_id == b.room_id {
                    violations.push(encoder::batch_room_conflict(i, j, a.room_id, &b.span()));
                }
                for p in a.participant_ids.iter().filter(|p| b.participant_ids.contains(p)) {
                    violations.push(encoder::batch_participant_conflict(i, j, *p));
                }
            }
        }

        metrics::histogram!(observability::CHECK_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        self.finish(violations, started)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn backend() -> IntervalBackend {
        IntervalBackend::new(true, Duration::from_secs(5))
    }

    fn constraint(room: Ulid, start: i64, end: i64, participants: &[Ulid]) -> SchedulingConstraint {
        SchedulingConstraint {
            meeting_id: None,
            room_id: room,
            room_capacity: 10,
            start,
            end,
            participant_ids: participants.to_vec(),
        }
    }

    fn existing(room: Ulid, start: i64, end: i64, participants: &[Ulid]) -> ExistingMeeting {
        ExistingMeeting {
            meeting_id: Ulid::new(),
            room_id: room,
            span: Span::new(start, end),
            participant_ids: participants.to_vec(),
        }
    }

    #[test]
    fn frame_stack_pop_retracts() {
        let mut stack = FrameStack::default();
        stack.push();
        stack.assert(Assertion::RoomDisjoint {
            proposed: Span::new(0, 100),
            existing: Span::new(50, 150),
        });
        assert!(!stack.check());
        stack.pop();
        assert!(stack.check()); // empty formula is satisfiable
        assert!(stack.assertions.is_empty());
    }

    #[test]
    fn frame_stack_nested_frames() {
        let mut stack = FrameStack::default();
        stack.push();
        stack.assert(Assertion::RoomDisjoint {
            proposed: Span::new(0, 100),
            existing: Span::new(200, 300),
        });
        stack.push();
        stack.assert(Assertion::ParticipantDisjoint {
            proposed: Span::new(0, 100),
            existing: Span::new(50, 150),
        });
        assert!(!stack.check());
        stack.pop();
        assert!(stack.check()); // outer assertion alone holds
        stack.pop();
        assert!(stack.assertions.is_empty());
    }

    #[test]
    fn empty_snapshot_is_sat() {
        let result = backend().check_feasibility(&constraint(Ulid::new(), 100, 200, &[]), &[]);
        assert!(result.is_sat());
    }

    #[test]
    fn room_conflict_is_unsat_with_witness() {
        let room = Ulid::new();
        let e = existing(room, 100, 200, &[]);
        let result = backend().check_feasibility(&constraint(room, 150, 250, &[]), &[e.clone()]);
        match result {
            DecisionResult::Unsat { violations, .. } => {
                assert_eq!(violations.len(), 1);
                assert!(violations[0].starts_with("Room conflict"));
                assert!(violations[0].contains(&e.meeting_id.to_string()));
            }
            other => panic!("expected Unsat, got {other:?}"),
        }
    }

    #[test]
    fn adjacent_meetings_do_not_conflict() {
        let room = Ulid::new();
        let e = existing(room, 100, 200, &[]);
        let result = backend().check_feasibility(&constraint(room, 200, 300, &[]), &[e]);
        assert!(result.is_sat());
    }

    #[test]
    fn participant_conflict_across_rooms() {
        let p = Ulid::new();
        let e = existing(Ulid::new(), 100, 200, &[p]);
        let result =
            backend().check_feasibility(&constraint(Ulid::new(), 150, 250, &[p]), &[e.clone()]);
        match result {
            DecisionResult::Unsat { violations, .. } => {
                assert_eq!(violations.len(), 1);
                assert!(violations[0].starts_with("Participant conflict"));
                assert!(violations[0].contains(&p.to_string()));
                assert!(violations[0].contains(&e.meeting_id.to_string()));
            }
            other => panic!("expected Unsat, got {other:?}"),
        }
    }

    #[test]
    fn one_witness_per_shared_participant() {
        let (p1, p2) = (Ulid::new(), Ulid::new());
        let e = existing(Ulid::new(), 100, 200, &[p1, p2]);
        let result = backend().check_feasibility(&constraint(Ulid::new(), 150, 250, &[p1, p2]), &[e]);
        match result {
            DecisionResult::Unsat { violations, .. } => assert_eq!(violations.len(), 2),
            other => panic!("expected Unsat, got {other:?}"),
        }
    }

    #[test]
    fn update_excludes_self() {
        let room = Ulid::new();
        let p = Ulid::new();
        let e = existing(room, 100, 200, &[p]);
        let mut proposed = constraint(room, 100, 200, &[p]);
        proposed.meeting_id = Some(e.meeting_id);
        let result = backend().check_feasibility(&proposed, &[e]);
        assert!(result.is_sat());
    }

    #[test]
    fn capacity_pre_check_skips_snapshot_scan() {
        let room = Ulid::new();
        let (p1, p2) = (Ulid::new(), Ulid::new());
        let mut proposed = constraint(room, 100, 200, &[p1, p2]);
        proposed.room_capacity = 1;
        // Even with a conflicting snapshot, only the capacity witness comes back.
        let e = existing(room, 100, 200, &[p1]);
        match backend().check_feasibility(&proposed, &[e]) {
            DecisionResult::Unsat { violations, .. } => {
                assert_eq!(
                    violations,
                    vec!["Room capacity exceeded: 2 requested, capacity 1".to_string()]
                );
            }
            other => panic!("expected Unsat, got {other:?}"),
        }
    }

    #[test]
    fn check_is_idempotent() {
        let room = Ulid::new();
        let e = existing(room, 100, 200, &[]);
        let proposed = constraint(room, 150, 250, &[]);
        let b = backend();
        let first = b.check_feasibility(&proposed, std::slice::from_ref(&e));
        let second = b.check_feasibility(&proposed, std::slice::from_ref(&e));
        match (first, second) {
            (
                DecisionResult::Unsat { violations: v1, .. },
                DecisionResult::Unsat { violations: v2, .. },
            ) => assert_eq!(v1, v2),
            other => panic!("expected two Unsat results, got {other:?}"),
        }
    }

    #[test]
    fn disabled_backend_admits_everything() {
        let b = backend();
        b.set_enabled(false);
        assert!(!b.is_enabled());
        // Inverted range would normally fail the pre-check.
        let proposed = constraint(Ulid::new(), 200, 100, &[]);
        let result = b.check_feasibility(&proposed, &[]);
        assert_eq!(result, DecisionResult::Sat { solving_time_ms: 0 });

        b.set_enabled(true);
        assert!(!b.check_feasibility(&proposed, &[]).is_sat());
    }

    #[test]
    fn timeout_reports_error() {
        let b = IntervalBackend::new(true, Duration::ZERO);
        let room = Ulid::new();
        let e = existing(room, 100, 200, &[]);
        let result = b.check_feasibility(&constraint(room, 150, 250, &[]), &[e]);
        match result {
            DecisionResult::Error { message, .. } => assert_eq!(message, "solver timeout"),
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[test]
    fn batch_flags_pairwise_room_conflict() {
        let room = Ulid::new();
        let proposals = vec![
            constraint(room, 100, 200, &[]),
            constraint(Ulid::new(), 100, 200, &[]),
            constraint(room, 150, 250, &[]),
        ];
        match backend().check_batch(&proposals, &[]) {
            DecisionResult::Unsat { violations, .. } => {
                assert_eq!(violations.len(), 1);
                assert!(violations[0].contains("proposals 0 and 2"));
            }
            other => panic!("expected Unsat, got {other:?}"),
        }
    }

    #[test]
    fn batch_flags_pairwise_participant_conflict() {
        let p = Ulid::new();
        let proposals = vec![
            constraint(Ulid::new(), 100, 200, &[p]),
            constraint(Ulid::new(), 150, 250, &[p]),
        ];
        match backend().check_batch(&proposals, &[]) {
            DecisionResult::Unsat { violations, .. } => {
                assert_eq!(violations.len(), 1);
                assert!(violations[0].contains("proposals 0 and 1"));
                assert!(violations[0].contains(&p.to_string()));
            }
            other => panic!("expected Unsat, got {other:?}"),
        }
    }

    #[test]
    fn batch_checks_against_snapshot_with_index_prefix() {
        let room = Ulid::new();
        let e = existing(room, 100, 200, &[]);
        let proposals = vec![
            constraint(Ulid::new(), 100, 200, &[]),
            constraint(room, 150, 250, &[]),
        ];
        match backend().check_batch(&proposals, &[e]) {
            DecisionResult::Unsat { violations, .. } => {
                assert_eq!(violations.len(), 1);
                assert!(violations[0].starts_with("Proposal 1: Room conflict"));
            }
            other => panic!("expected Unsat, got {other:?}"),
        }
    }

    #[test]
    fn batch_of_disjoint_proposals_is_sat() {
        let room = Ulid::new();
        let proposals = vec![
            constraint(room, 100, 200, &[]),
            constraint(room, 200, 300, &[]),
        ];
        assert!(backend().check_batch(&proposals, &[]).is_sat());
    }

    #[test]
    fn batch_skips_pairwise_for_malformed_proposal() {
        let room = Ulid::new();
        let proposals = vec![
            constraint(room, 200, 100, &[]), // inverted
            constraint(room, 100, 300, &[]),
        ];
        match backend().check_batch(&proposals, &[]) {
            DecisionResult::Unsat { violations, .. } => {
                assert_eq!(violations, vec!["Proposal 0: Invalid time range".to_string()]);
            }
            other => panic!("expected Unsat, got {other:?}"),
        }
    }
}
