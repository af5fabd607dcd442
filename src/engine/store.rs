use dashmap::DashMap;
use ulid::Ulid;

use crate::model::*;

/// Store of record, rebuilt from the WAL on startup. Unique-name and
/// unique-email indices are maintained alongside the entity maps.
pub struct InMemoryStore {
    rooms: DashMap<Ulid, Room>,
    participants: DashMap<Ulid, Participant>,
    meetings: DashMap<Ulid, Meeting>,
    room_names: DashMap<String, Ulid>,
    participant_emails: DashMap<String, Ulid>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            participants: DashMap::new(),
            meetings: DashMap::new(),
            room_names: DashMap::new(),
            participant_emails: DashMap::new(),
        }
    }

    // ── Rooms ────────────────────────────────────────────────

    pub fn get_room(&self, id: &Ulid) -> Option<Room> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    pub fn rooms(&self) -> Vec<Room> {
        self.rooms.iter().map(|e| e.value().clone()).collect()
    }

    pub fn room_name_taken(&self, name: &str, exclude: Option<Ulid>) -> bool {
        self.room_names
            .get(name)
            .is_some_and(|e| Some(*e.value()) != exclude)
    }

    // ── Participants ─────────────────────────────────────────

    pub fn get_participant(&self, id: &Ulid) -> Option<Participant> {
        self.participants.get(id).map(|e| e.value().clone())
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.participants.iter().map(|e| e.value().clone()).collect()
    }

    pub fn email_taken(&self, email: &str, exclude: Option<Ulid>) -> bool {
        self.participant_emails
            .get(email)
            .is_some_and(|e| Some(*e.value()) != exclude)
    }

    // ── Meetings ─────────────────────────────────────────────

    pub fn get_meeting(&self, id: &Ulid) -> Option<Meeting> {
        self.meetings.get(id).map(|e| e.value().clone())
    }

    pub fn meetings(&self) -> Vec<Meeting> {
        self.meetings.iter().map(|e| e.value().clone()).collect()
    }

    pub fn meeting_count(&self) -> usize {
        self.meetings.len()
    }

    /// True when any live meeting references the room.
    pub fn room_in_use(&self, room_id: &Ulid) -> bool {
        self.meetings
            .iter()
            .any(|e| e.value().room_id == *room_id && e.value().status.is_live())
    }

    /// True when any live meeting lists the participant.
    pub fn participant_in_use(&self, participant_id: &Ulid) -> bool {
        self.meetings.iter().any(|e| {
            e.value().status.is_live() && e.value().participant_ids.contains(participant_id)
        })
    }

    // ── Event application ────────────────────────────────────

    /// Single write path: live mutations and WAL replay both land here.
    pub fn apply_event(&self, event: &Event) {
        match event {
            Event::RoomCreated {
                id,
                name,
                capacity,
                location,
                description,
                available,
            } => {
                self.rooms.insert(
                    *id,
                    Room {
                        id: *id,
                        name: name.clone(),
                        capacity: *capacity,
                        location: location.clone(),
                        description: description.clone(),
                        available: *available,
                    },
                );
                self.room_names.insert(name.clone(), *id);
            }
            Event::RoomUpdated {
                id,
                name,
                capacity,
                location,
                description,
                available,
            } => {
                if let Some(mut room) = self.rooms.get_mut(id) {
                    if room.name != *name {
                        self.room_names.remove(&room.name);
                        self.room_names.insert(name.clone(), *id);
                    }
                    room.name = name.clone();
                    room.capacity = *capacity;
                    room.location = location.clone();
                    room.description = description.clone();
                    room.available = *available;
                }
            }
            Event::RoomDeleted { id } => {
                if let Some((_, room)) = self.rooms.remove(id) {
                    self.room_names.remove(&room.name);
                }
            }
            Event::ParticipantCreated {
                id,
                name,
                email,
                department,
            } => {
                self.participants.insert(
                    *id,
                    Participant {
                        id: *id,
                        name: name.clone(),
                        email: email.clone(),
                        department: department.clone(),
                    },
                );
                self.participant_emails.insert(email.clone(), *id);
            }
            Event::ParticipantUpdated {
                id,
                name,
                email,
                department,
            } => {
                if let Some(mut participant) = self.participants.get_mut(id) {
                    if participant.email != *email {
                        self.participant_emails.remove(&participant.email);
                        self.participant_emails.insert(email.clone(), *id);
                    }
                    participant.name = name.clone();
                    participant.email = email.clone();
                    participant.department = department.clone();
                }
            }
            Event::ParticipantDeleted { id } => {
                if let Some((_, participant)) = self.participants.remove(id) {
                    self.participant_emails.remove(&participant.email);
                }
            }
            Event::MeetingCreated { meeting } => {
                self.meetings.insert(meeting.id, meeting.clone());
            }
            Event::MeetingUpdated {
                id,
                title,
                description,
                room_id,
                participant_ids,
                span,
                updated_at,
            } => {
                if let Some(mut meeting) = self.meetings.get_mut(id) {
                    meeting.title = title.clone();
                    meeting.description = description.clone();
                    meeting.room_id = *room_id;
                    meeting.participant_ids = participant_ids.clone();
                    meeting.span = *span;
                    meeting.updated_at = *updated_at;
                }
            }
            Event::MeetingStatusChanged { id, from, to, at } => {
                if let Some(mut meeting) = self.meetings.get_mut(id) {
                    // Stale transition events (lost races, old WAL tails) are
                    // ignored rather than corrupting the status machine.
                    if meeting.status == *from && meeting.status.can_transition_to(*to) {
                        meeting.status = *to;
                        meeting.updated_at = *at;
                    }
                }
            }
            Event::MeetingDeleted { id } => {
                self.meetings.remove(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room_created(name: &str) -> (Ulid, Event) {
        let id = Ulid::new();
        (
            id,
            Event::RoomCreated {
                id,
                name: name.into(),
                capacity: 4,
                location: None,
                description: None,
                available: true,
            },
        )
    }

    #[test]
    fn room_create_maintains_name_index() {
        let store = InMemoryStore::new();
        let (id, event) = room_created("Aurora");
        store.apply_event(&event);

        assert!(store.room_name_taken("Aurora", None));
        assert!(!store.room_name_taken("Aurora", Some(id)));
        assert!(!store.room_name_taken("Borealis", None));
    }

    #[test]
    fn room_rename_moves_name_index() {
        let store = InMemoryStore::new();
        let (id, event) = room_created("Aurora");
        store.apply_event(&event);
        store.apply_event(&Event::RoomUpdated {
            id,
            name: "Borealis".into(),
            capacity: 6,
            location: None,
            description: None,
            available: true,
        });

        assert!(!store.room_name_taken("Aurora", None));
        assert!(store.room_name_taken("Borealis", None));
        assert_eq!(store.get_room(&id).unwrap().capacity, 6);
    }

    #[test]
    fn room_delete_frees_name() {
        let store = InMemoryStore::new();
        let (id, event) = room_created("Aurora");
        store.apply_event(&event);
        store.apply_event(&Event::RoomDeleted { id });

        assert!(store.get_room(&id).is_none());
        assert!(!store.room_name_taken("Aurora", None));
    }

    #[test]
    fn participant_email_index() {
        let store = InMemoryStore::new();
        let id = Ulid::new();
        store.apply_event(&Event::ParticipantCreated {
            id,
            name: "Ada".into(),
            email: "ada@example.com".into(),
            department: None,
        });
        assert!(store.email_taken("ada@example.com", None));

        store.apply_event(&Event::ParticipantUpdated {
            id,
            name: "Ada".into(),
            email: "ada@corp.example".into(),
            department: Some("Research".into()),
        });
        assert!(!store.email_taken("ada@example.com", None));
        assert!(store.email_taken("ada@corp.example", None));
    }

    #[test]
    fn stale_status_change_is_ignored() {
        let store = InMemoryStore::new();
        let meeting = Meeting {
            id: Ulid::new(),
            title: "m".into(),
            description: None,
            room_id: Ulid::new(),
            participant_ids: vec![Ulid::new()],
            span: Span::new(1000, 2000),
            status: MeetingStatus::Pending,
            created_at: 1,
            updated_at: 1,
        };
        store.apply_event(&Event::MeetingCreated {
            meeting: meeting.clone(),
        });

        store.apply_event(&Event::MeetingStatusChanged {
            id: meeting.id,
            from: MeetingStatus::Pending,
            to: MeetingStatus::Confirmed,
            at: 2,
        });
        assert_eq!(
            store.get_meeting(&meeting.id).unwrap().status,
            MeetingStatus::Confirmed
        );

        // A second Pending->Rejected event no longer matches and is dropped.
        store.apply_event(&Event::MeetingStatusChanged {
            id: meeting.id,
            from: MeetingStatus::Pending,
            to: MeetingStatus::Rejected,
            at: 3,
        });
        assert_eq!(
            store.get_meeting(&meeting.id).unwrap().status,
            MeetingStatus::Confirmed
        );
    }

    #[test]
    fn in_use_checks_only_live_meetings() {
        let store = InMemoryStore::new();
        let room_id = Ulid::new();
        let participant = Ulid::new();
        let meeting = Meeting {
            id: Ulid::new(),
            title: "m".into(),
            description: None,
            room_id,
            participant_ids: vec![participant],
            span: Span::new(1000, 2000),
            status: MeetingStatus::Pending,
            created_at: 1,
            updated_at: 1,
        };
        store.apply_event(&Event::MeetingCreated {
            meeting: meeting.clone(),
        });
        assert!(store.room_in_use(&room_id));
        assert!(store.participant_in_use(&participant));

        store.apply_event(&Event::MeetingStatusChanged {
            id: meeting.id,
            from: MeetingStatus::Pending,
            to: MeetingStatus::Rejected,
            at: 2,
        });
        assert!(!store.room_in_use(&room_id));
        assert!(!store.participant_in_use(&participant));
    }
}
