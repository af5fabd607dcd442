//! Witness text and the fast-path checks that never reach the frame stack.

use ulid::Ulid;

use crate::model::Span;

use super::{ExistingMeeting, SchedulingConstraint};

/// Shape checks, in order. Any hit means the backend is not consulted.
pub(super) fn pre_check(proposed: &SchedulingConstraint) -> Vec<String> {
    if proposed.start >= proposed.end {
        return vec!["Invalid time range".to_string()];
    }
    let requested = proposed.participant_ids.len();
    if requested > proposed.room_capacity as usize {
        return vec![format!(
            "Room capacity exceeded: {requested} requested, capacity {}",
            proposed.room_capacity
        )];
    }
    Vec::new()
}

/// Participants the proposal shares with an existing meeting, in proposal order.
pub(super) fn shared_participants(
    proposed: &SchedulingConstraint,
    existing: &ExistingMeeting,
) -> Vec<Ulid> {
    proposed
        .participant_ids
        .iter()
        .filter(|p| existing.participant_ids.contains(p))
        .copied()
        .collect()
}

pub(super) fn room_conflict(existing: &ExistingMeeting) -> String {
    format!(
        "Room conflict: overlaps with meeting {} in room {} ({}-{})",
        existing.meeting_id, existing.room_id, existing.span.start, existing.span.end
    )
}

pub(super) fn participant_conflict(participant: Ulid, existing: &ExistingMeeting) -> String {
    format!(
        "Participant conflict: participant {participant} already booked in meeting {} ({}-{})",
        existing.meeting_id, existing.span.start, existing.span.end
    )
}

pub(super) fn batch_room_conflict(i: usize, j: usize, room: Ulid, span: &Span) -> String {
    format!(
        "Room conflict: proposals {i} and {j} overlap in room {room} ({}-{})",
        span.start, span.end
    )
}

pub(super) fn batch_participant_conflict(i: usize, j: usize, participant: Ulid) -> String {
    format!("Participant conflict: participant {participant} double-booked by proposals {i} and {j}")
}
