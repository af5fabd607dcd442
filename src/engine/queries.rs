use ulid::Ulid;

use crate::limits::MAX_BATCH_SIZE;
use crate::model::*;
use crate::solver::{DecisionResult, ExistingMeeting, SchedulingConstraint};

use super::{Engine, EngineError};

impl Engine {
    pub fn room(&self, id: &Ulid) -> Option<Room> {
        self.store.get_room(id)
    }

    pub fn rooms(&self) -> Vec<Room> {
        let mut rooms = self.store.rooms();
        rooms.sort_by(|a, b| a.name.cmp(&b.name));
        rooms
    }

    pub fn participant(&self, id: &Ulid) -> Option<Participant> {
        self.store.get_participant(id)
    }

    pub fn participants(&self) -> Vec<Participant> {
        let mut participants = self.store.participants();
        participants.sort_by(|a, b| a.email.cmp(&b.email));
        participants
    }

    pub fn meeting(&self, id: &Ulid) -> Option<Meeting> {
        self.store.get_meeting(id)
    }

    pub fn meetings(&self) -> Vec<Meeting> {
        let mut meetings = self.store.meetings();
        meetings.sort_by_key(|m| m.span.start);
        meetings
    }

    pub fn meetings_by_status(&self, status: MeetingStatus) -> Vec<Meeting> {
        let mut meetings: Vec<Meeting> = self
            .store
            .meetings()
            .into_iter()
            .filter(|m| m.status == status)
            .collect();
        meetings.sort_by_key(|m| m.span.start);
        meetings
    }

    pub fn meetings_for_room(&self, room_id: &Ulid) -> Vec<Meeting> {
        let mut meetings: Vec<Meeting> = self
            .store
            .meetings()
            .into_iter()
            .filter(|m| m.room_id == *room_id)
            .collect();
        meetings.sort_by_key(|m| m.span.start);
        meetings
    }

    /// Meetings whose interval intersects the query window.
    pub fn meetings_in_range(&self, window: &Span) -> Vec<Meeting> {
        let mut meetings: Vec<Meeting> = self
            .store
            .meetings()
            .into_iter()
            .filter(|m| m.span.overlaps(window))
            .collect();
        meetings.sort_by_key(|m| m.span.start);
        meetings
    }

    /// The set the static check runs against: meetings confirmed at the
    /// instant of the call. Pending holds are deliberately absent — two
    /// concurrent proposals must not exclude each other; the monitor's
    /// overlap property covers the race instead.
    pub(super) fn confirmed_snapshot(&self) -> Vec<ExistingMeeting> {
        self.store
            .meetings()
            .into_iter()
            .filter(|m| m.status == MeetingStatus::Confirmed)
            .map(|m| ExistingMeeting {
                meeting_id: m.id,
                room_id: m.room_id,
                span: m.span,
                participant_ids: m.participant_ids,
            })
            .collect()
    }

    /// Planning query: decide a set of proposals together against the
    /// confirmed snapshot. Nothing is persisted, the monitor never hears
    /// about it.
    pub fn verify_batch(&self, drafts: &[MeetingDraft]) -> Result<DecisionResult, EngineError> {
        if drafts.len() > MAX_BATCH_SIZE {
            return Err(EngineError::LimitExceeded("batch too large"));
        }
        let mut proposals = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let room = self
                .store
                .get_room(&draft.room_id)
                .ok_or(EngineError::RoomNotFound(draft.room_id))?;
            proposals.push(SchedulingConstraint {
                meeting_id: None,
                room_id: room.id,
                room_capacity: room.capacity,
                start: draft.start,
                end: draft.end,
                participant_ids: draft.participant_ids.clone(),
            });
        }
        Ok(self
            .solver()
            .check_batch(&proposals, &self.confirmed_snapshot()))
    }
}
