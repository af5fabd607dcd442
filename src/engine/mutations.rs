use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::monitor::{PropertyViolation, Severity};
use crate::observability;
use crate::solver::{DecisionResult, SchedulingConstraint};

use super::{Engine, EngineError, now_sec};

fn validate_span_bounds(start: Sec, end: Sec) -> Result<(), EngineError> {
    if start < MIN_VALID_TIMESTAMP || end > MAX_VALID_TIMESTAMP {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if end - start > MAX_SPAN_DURATION_SECS {
        return Err(EngineError::LimitExceeded("meeting too long"));
    }
    Ok(())
}

fn render_warnings(violations: &[PropertyViolation]) -> Vec<String> {
    violations
        .iter()
        .map(|v| format!("{} [{}]: {}", v.property.name(), v.severity, v.description))
        .collect()
}

impl Engine {
    // ── Rooms ────────────────────────────────────────────────

    pub async fn create_room(
        &self,
        name: String,
        capacity: u32,
        location: Option<String>,
        description: Option<String>,
        available: bool,
    ) -> Result<Room, EngineError> {
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("room name length"));
        }
        if capacity == 0 {
            return Err(EngineError::LimitExceeded("room capacity must be at least 1"));
        }
        if self.store.room_name_taken(&name, None) {
            return Err(EngineError::DuplicateRoomName(name));
        }

        let id = Ulid::new();
        self.persist_and_apply(&Event::RoomCreated {
            id,
            name,
            capacity,
            location,
            description,
            available,
        })
        .await?;
        self.monitor().set_room_capacity(id, capacity);
        self.store
            .get_room(&id)
            .ok_or(EngineError::RoomNotFound(id))
    }

    pub async fn update_room(
        &self,
        id: Ulid,
        name: String,
        capacity: u32,
        location: Option<String>,
        description: Option<String>,
        available: bool,
    ) -> Result<Room, EngineError> {
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("room name length"));
        }
        if capacity == 0 {
            return Err(EngineError::LimitExceeded("room capacity must be at least 1"));
        }
        if self.store.get_room(&id).is_none() {
            return Err(EngineError::RoomNotFound(id));
        }
        if self.store.room_name_taken(&name, Some(id)) {
            return Err(EngineError::DuplicateRoomName(name));
        }

        self.persist_and_apply(&Event::RoomUpdated {
            id,
            name,
            capacity,
            location,
            description,
            available,
        })
        .await?;
        self.monitor().set_room_capacity(id, capacity);
        self.store
            .get_room(&id)
            .ok_or(EngineError::RoomNotFound(id))
    }

    /// Deletion does not cascade: a room referenced by live meetings is
    /// refused outright.
    pub async fn delete_room(&self, id: Ulid) -> Result<(), EngineError> {
        if self.store.get_room(&id).is_none() {
            return Err(EngineError::RoomNotFound(id));
        }
        if self.store.room_in_use(&id) {
            return Err(EngineError::RoomInUse(id));
        }
        self.persist_and_apply(&Event::RoomDeleted { id }).await?;
        self.monitor().forget_room(&id);
        Ok(())
    }

    // ── Participants ─────────────────────────────────────────

    pub async fn create_participant(
        &self,
        name: String,
        email: String,
        department: Option<String>,
    ) -> Result<Participant, EngineError> {
        if name.is_empty() || name.len() > MAX_NAME_LEN || email.is_empty() || email.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("participant name or email length"));
        }
        if self.store.email_taken(&email, None) {
            return Err(EngineError::DuplicateEmail(email));
        }

        let id = Ulid::new();
        self.persist_and_apply(&Event::ParticipantCreated {
            id,
            name,
            email,
            department,
        })
        .await?;
        self.store
            .get_participant(&id)
            .ok_or(EngineError::ParticipantNotFound(id))
    }

    pub async fn update_participant(
        &self,
        id: Ulid,
        name: String,
        email: String,
        department: Option<String>,
    ) -> Result<Participant, EngineError> {
        if name.is_empty() || name.len() > MAX_NAME_LEN || email.is_empty() || email.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("participant name or email length"));
        }
        if self.store.get_participant(&id).is_none() {
            return Err(EngineError::ParticipantNotFound(id));
        }
        if self.store.email_taken(&email, Some(id)) {
            return Err(EngineError::DuplicateEmail(email));
        }

        self.persist_and_apply(&Event::ParticipantUpdated {
            id,
            name,
            email,
            department,
        })
        .await?;
        self.store
            .get_participant(&id)
            .ok_or(EngineError::ParticipantNotFound(id))
    }

    pub async fn delete_participant(&self, id: Ulid) -> Result<(), EngineError> {
        if self.store.get_participant(&id).is_none() {
            return Err(EngineError::ParticipantNotFound(id));
        }
        if self.store.participant_in_use(&id) {
            return Err(EngineError::ParticipantInUse(id));
        }
        self.persist_and_apply(&Event::ParticipantDeleted { id })
            .await?;
        Ok(())
    }

    // ── Meetings ─────────────────────────────────────────────

    /// Admission pipeline: shape checks, static feasibility against the
    /// confirmed snapshot, persist as Pending, then notify the monitor.
    /// UNSAT persists nothing and emits no monitor event.
    pub async fn create_meeting(&self, draft: MeetingDraft) -> Result<SchedulingResult, EngineError> {
        if draft.title.trim().is_empty() {
            return Ok(SchedulingResult::failure(
                vec!["Title must not be empty".to_string()],
                "request rejected before checking",
                0,
            ));
        }
        if draft.participant_ids.is_empty() {
            return Ok(SchedulingResult::failure(
                vec!["At least one participant is required".to_string()],
                "request rejected before checking",
                0,
            ));
        }
        if draft.start >= draft.end {
            return Ok(SchedulingResult::failure(
                vec!["Invalid time range".to_string()],
                "request rejected before checking",
                0,
            ));
        }
        if draft.title.len() > MAX_TITLE_LEN {
            return Err(EngineError::LimitExceeded("meeting title length"));
        }
        if draft.description.as_ref().is_some_and(|d| d.len() > MAX_TEXT_LEN) {
            return Err(EngineError::LimitExceeded("meeting description length"));
        }
        if draft.participant_ids.len() > MAX_PARTICIPANTS_PER_MEETING {
            return Err(EngineError::LimitExceeded("too many participants"));
        }
        validate_span_bounds(draft.start, draft.end)?;

        let room = self
            .store
            .get_room(&draft.room_id)
            .ok_or(EngineError::RoomNotFound(draft.room_id))?;
        if !room.available {
            return Err(EngineError::RoomUnavailable(room.id));
        }

        let participant_ids = self.resolve_participants(&draft.participant_ids)?;

        let constraint = SchedulingConstraint {
            meeting_id: None,
            room_id: room.id,
            room_capacity: room.capacity,
            start: draft.start,
            end: draft.end,
            participant_ids: participant_ids.clone(),
        };
        let snapshot = self.confirmed_snapshot();

        match self.solver().check_feasibility(&constraint, &snapshot) {
            DecisionResult::Sat { solving_time_ms } => {
                let now = now_sec();
                let meeting = Meeting {
                    id: Ulid::new(),
                    title: draft.title,
                    description: draft.description,
                    room_id: room.id,
                    participant_ids,
                    span: Span::new(draft.start, draft.end),
                    status: MeetingStatus::Pending,
                    created_at: now,
                    updated_at: now,
                };
                self.persist_and_apply(&Event::MeetingCreated {
                    meeting: meeting.clone(),
                })
                .await?;

                let raised = self.monitor().on_create(&meeting, now);
                metrics::counter!(observability::MEETINGS_CREATED_TOTAL).increment(1);
                tracing::info!(meeting = %meeting.id, room = %room.id, "meeting admitted");

                Ok(SchedulingResult::success(
                    meeting,
                    "all scheduling constraints satisfiable",
                    solving_time_ms,
                )
                .with_warnings(render_warnings(&raised)))
            }
            DecisionResult::Unsat {
                violations,
                solving_time_ms,
            } => {
                metrics::counter!(observability::MEETINGS_REJECTED_TOTAL).increment(1);
                tracing::info!(room = %room.id, witnesses = violations.len(), "meeting refused");
                Ok(SchedulingResult::failure(
                    violations,
                    "scheduling constraints unsatisfiable",
                    solving_time_ms,
                ))
            }
            DecisionResult::Error {
                message,
                solving_time_ms,
            } => {
                tracing::error!(room = %room.id, "decision backend failed: {message}");
                Ok(SchedulingResult::backend_error(message, solving_time_ms))
            }
        }
    }

    /// Overlay `delta` on the persisted meeting and re-check with the
    /// meeting itself excluded from the snapshot, so a no-op change (or a
    /// title edit) decides SAT against its own slot.
    pub async fn update_meeting(
        &self,
        id: Ulid,
        delta: MeetingUpdate,
    ) -> Result<SchedulingResult, EngineError> {
        let current = self
            .store
            .get_meeting(&id)
            .ok_or(EngineError::MeetingNotFound(id))?;
        if matches!(
            current.status,
            MeetingStatus::Completed | MeetingStatus::Cancelled
        ) {
            return Err(EngineError::ImmutableMeeting {
                id,
                status: current.status,
            });
        }

        let title = delta.title.unwrap_or(current.title);
        let description = delta.description.unwrap_or(current.description);
        let room_id = delta.room_id.unwrap_or(current.room_id);
        let participant_ids = delta.participant_ids.unwrap_or(current.participant_ids);
        let start = delta.start.unwrap_or(current.span.start);
        let end = delta.end.unwrap_or(current.span.end);

        if title.trim().is_empty() || title.len() > MAX_TITLE_LEN {
            return Err(EngineError::LimitExceeded("meeting title length"));
        }
        if description.as_ref().is_some_and(|d| d.len() > MAX_TEXT_LEN) {
            return Err(EngineError::LimitExceeded("meeting description length"));
        }
        if participant_ids.is_empty() {
            return Ok(SchedulingResult::failure(
                vec!["At least one participant is required".to_string()],
                "request rejected before checking",
                0,
            ));
        }
        if participant_ids.len() > MAX_PARTICIPANTS_PER_MEETING {
            return Err(EngineError::LimitExceeded("too many participants"));
        }
        if start >= end {
            return Ok(SchedulingResult::failure(
                vec!["Invalid time range".to_string()],
                "request rejected before checking",
                0,
            ));
        }
        validate_span_bounds(start, end)?;

        let room = self
            .store
            .get_room(&room_id)
            .ok_or(EngineError::RoomNotFound(room_id))?;
        if room_id != current.room_id && !room.available {
            return Err(EngineError::RoomUnavailable(room_id));
        }
        let participant_ids = self.resolve_participants(&participant_ids)?;

        let constraint = SchedulingConstraint {
            meeting_id: Some(id),
            room_id,
            room_capacity: room.capacity,
            start,
            end,
            participant_ids: participant_ids.clone(),
        };
        let snapshot = self.confirmed_snapshot();

        match self.solver().check_feasibility(&constraint, &snapshot) {
            DecisionResult::Sat { solving_time_ms } => {
                let now = now_sec();
                self.persist_and_apply(&Event::MeetingUpdated {
                    id,
                    title,
                    description,
                    room_id,
                    participant_ids,
                    span: Span::new(start, end),
                    updated_at: now,
                })
                .await?;
                self.monitor().on_update(id, now);

                let updated = self
                    .store
                    .get_meeting(&id)
                    .ok_or(EngineError::MeetingNotFound(id))?;
                Ok(SchedulingResult::success(
                    updated,
                    "all scheduling constraints satisfiable",
                    solving_time_ms,
                ))
            }
            DecisionResult::Unsat {
                violations,
                solving_time_ms,
            } => Ok(SchedulingResult::failure(
                violations,
                "scheduling constraints unsatisfiable",
                solving_time_ms,
            )),
            DecisionResult::Error {
                message,
                solving_time_ms,
            } => Ok(SchedulingResult::backend_error(message, solving_time_ms)),
        }
    }

    pub async fn confirm_meeting(&self, id: Ulid) -> Result<Meeting, EngineError> {
        self.transition(id, MeetingStatus::Confirmed).await
    }

    pub async fn reject_meeting(&self, id: Ulid) -> Result<Meeting, EngineError> {
        self.transition(id, MeetingStatus::Rejected).await
    }

    pub async fn cancel_meeting(&self, id: Ulid) -> Result<Meeting, EngineError> {
        self.transition(id, MeetingStatus::Cancelled).await
    }

    pub async fn complete_meeting(&self, id: Ulid) -> Result<Meeting, EngineError> {
        self.transition(id, MeetingStatus::Completed).await
    }

    async fn transition(&self, id: Ulid, to: MeetingStatus) -> Result<Meeting, EngineError> {
        let current = self
            .store
            .get_meeting(&id)
            .ok_or(EngineError::MeetingNotFound(id))?;
        let from = current.status;
        if !from.can_transition_to(to) {
            return Err(EngineError::InvalidTransition { from, to });
        }

        let at = now_sec();
        self.persist_and_apply(&Event::MeetingStatusChanged { id, from, to, at })
            .await?;

        match to {
            MeetingStatus::Confirmed => {
                self.monitor().on_confirm(id, from, at);
            }
            MeetingStatus::Rejected => {
                self.monitor().on_reject(id, from, at);
            }
            MeetingStatus::Cancelled => {
                self.monitor().on_cancel(id, Some(from), at);
            }
            MeetingStatus::Completed => {
                self.monitor().on_complete(id, at);
            }
            MeetingStatus::Pending => unreachable!("no transition re-enters Pending"),
        }

        tracing::info!(meeting = %id, %from, %to, "meeting transitioned");
        self.store
            .get_meeting(&id)
            .ok_or(EngineError::MeetingNotFound(id))
    }

    /// The monitor sees the delete first; an ERROR or CRITICAL from its
    /// handler vetoes the delete before anything is persisted.
    pub async fn delete_meeting(&self, id: Ulid) -> Result<Meeting, EngineError> {
        let current = self
            .store
            .get_meeting(&id)
            .ok_or(EngineError::MeetingNotFound(id))?;

        let raised = self.monitor().on_delete(id, Some(current.status), now_sec());
        if raised.iter().any(|v| v.severity >= Severity::Error) {
            return Err(EngineError::MonitorRefused {
                violations: render_warnings(&raised),
            });
        }

        self.persist_and_apply(&Event::MeetingDeleted { id }).await?;
        self.monitor().remove_violations_for_meeting(id);
        tracing::info!(meeting = %id, "meeting deleted");
        Ok(current)
    }

    fn resolve_participants(&self, ids: &[Ulid]) -> Result<Vec<Ulid>, EngineError> {
        let mut resolved = Vec::with_capacity(ids.len());
        for id in ids {
            if self.store.get_participant(id).is_none() {
                return Err(EngineError::ParticipantNotFound(*id));
            }
            if !resolved.contains(id) {
                resolved.push(*id);
            }
        }
        Ok(resolved)
    }
}
