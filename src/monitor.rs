//! Runtime observer for meeting lifecycles.
//!
//! The monitor keeps its own derived mirror of lifecycle-relevant state and
//! evaluates every state transition against a small catalogue of temporal
//! properties: created meetings must eventually resolve, deletes must refer
//! to known meetings, live meetings in one room must not overlap, and
//! attendance must fit the room. Violations are observations, not vetoes —
//! the store of record is owned by the engine, and the two are reconciled
//! only through the event stream.
//!
//! All handlers are synchronous, never block, and touch only the room they
//! concern plus the append-only logs. The mirror is volatile: nothing here
//! is persisted, and `reset` rebuilds from zero.

use std::sync::Mutex;

use dashmap::{DashMap, DashSet};
use ulid::Ulid;

use crate::model::{Meeting, MeetingStatus, Sec, Span};
use crate::observability;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The monitored property a violation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    CapacityExceeded,
    MeetingOverlap,
    ConfirmWithoutCreate,
    UnresolvedMeeting,
    DeleteNonexistent,
}

impl Property {
    pub fn name(&self) -> &'static str {
        match self {
            Property::CapacityExceeded => "CAPACITY_EXCEEDED",
            Property::MeetingOverlap => "MEETING_OVERLAP",
            Property::ConfirmWithoutCreate => "CONFIRM_WITHOUT_CREATE",
            Property::UnresolvedMeeting => "UNRESOLVED_MEETING",
            Property::DeleteNonexistent => "DELETE_NONEXISTENT",
        }
    }
}

impl std::fmt::Display for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyViolation {
    pub property: Property,
    pub severity: Severity,
    pub meeting_id: Ulid,
    pub description: String,
    pub details: String,
    pub detected_at: Sec,
}

impl PropertyViolation {
    /// Dedup identity: detection time is deliberately excluded so the same
    /// observation raised twice collapses to one log entry.
    fn is_duplicate_of(&self, other: &PropertyViolation) -> bool {
        self.property == other.property
            && self.meeting_id == other.meeting_id
            && self.description == other.description
            && self.details == other.details
    }
}

/// The observed transition stream — flat, no nesting, append-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    Create {
        meeting_id: Ulid,
        room_id: Ulid,
        span: Span,
        participants: usize,
        at: Sec,
    },
    Confirm {
        meeting_id: Ulid,
        from: MeetingStatus,
        at: Sec,
    },
    Reject {
        meeting_id: Ulid,
        from: MeetingStatus,
        at: Sec,
    },
    Cancel {
        meeting_id: Ulid,
        prior: Option<MeetingStatus>,
        at: Sec,
    },
    Complete {
        meeting_id: Ulid,
        at: Sec,
    },
    Delete {
        meeting_id: Ulid,
        prior: Option<MeetingStatus>,
        at: Sec,
    },
    Update {
        meeting_id: Ulid,
        at: Sec,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    meeting_id: Ulid,
    span: Span,
}

#[derive(Debug, Clone)]
struct PendingEntry {
    span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MonitorStatistics {
    pub total_events: usize,
    pub total_violations: usize,
    pub warnings: usize,
    pub errors: usize,
    pub criticals: usize,
    pub pending_meetings: usize,
    pub tracked_rooms: usize,
}

/// Process-wide lifecycle observer. One instance is shared by every request
/// handler; state is fine-grained so unrelated rooms never serialize on
/// each other.
pub struct LifecycleMonitor {
    room_capacities: DashMap<Ulid, u32>,
    /// Every id ever CREATEd and not yet DELETEd.
    created_ids: DashSet<Ulid>,
    /// CREATEs not yet resolved by a CONFIRM or REJECT.
    pending: DashMap<Ulid, PendingEntry>,
    /// Per-room timeline of slots currently counted as live. Each list
    /// serializes its own mutations.
    room_slots: DashMap<Ulid, Mutex<Vec<Slot>>>,
    events: Mutex<Vec<MonitorEvent>>,
    violations: Mutex<Vec<PropertyViolation>>,
}

impl Default for LifecycleMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleMonitor {
    pub fn new() -> Self {
        Self {
            room_capacities: DashMap::new(),
            created_ids: DashSet::new(),
            pending: DashMap::new(),
            room_slots: DashMap::new(),
            events: Mutex::new(Vec::new()),
            violations: Mutex::new(Vec::new()),
        }
    }

    /// Capacity table feed. The engine calls this on room create/update.
    pub fn set_room_capacity(&self, room_id: Ulid, capacity: u32) {
        self.room_capacities.insert(room_id, capacity);
    }

    pub fn forget_room(&self, room_id: &Ulid) {
        self.room_capacities.remove(room_id);
        self.room_slots.remove(room_id);
    }

    // ── Event handlers ───────────────────────────────────────

    pub fn on_create(&self, meeting: &Meeting, at: Sec) -> Vec<PropertyViolation> {
        self.append_event(MonitorEvent::Create {
            meeting_id: meeting.id,
            room_id: meeting.room_id,
            span: meeting.span,
            participants: meeting.participant_ids.len(),
            at,
        });
        self.created_ids.insert(meeting.id);
        self.pending
            .insert(meeting.id, PendingEntry { span: meeting.span });

        let mut raised = Vec::new();

        if let Some(capacity) = self.room_capacities.get(&meeting.room_id) {
            let attendees = meeting.participant_ids.len();
            if attendees > *capacity as usize {
                raised.extend(self.record(PropertyViolation {
                    property: Property::CapacityExceeded,
                    severity: Severity::Error,
                    meeting_id: meeting.id,
                    description: format!(
                        "{attendees} attendees assigned to room {} with capacity {}",
                        meeting.room_id, *capacity
                    ),
                    details: "attendance must never exceed the capacity of the assigned room"
                        .to_string(),
                    detected_at: at,
                }));
            }
        }

        let timeline = self
            .room_slots
            .entry(meeting.room_id)
            .or_insert_with(|| Mutex::new(Vec::new()));
        let mut slots = timeline.lock().expect("room timeline lock");
        let mut overlapped = false;
        for slot in slots.iter() {
            if slot.span.overlaps(&meeting.span) {
                overlapped = true;
                raised.extend(self.record(PropertyViolation {
                    property: Property::MeetingOverlap,
                    severity: Severity::Critical,
                    meeting_id: meeting.id,
                    description: format!(
                        "meeting {} overlaps meeting {} in room {} ({}-{})",
                        meeting.id, slot.meeting_id, meeting.room_id, slot.span.start, slot.span.end
                    ),
                    details: "no two live meetings in the same room may overlap in time"
                        .to_string(),
                    detected_at: at,
                }));
            }
        }
        if !overlapped {
            slots.push(Slot {
                meeting_id: meeting.id,
                span: meeting.span,
            });
        }

        raised
    }

    pub fn on_confirm(&self, meeting_id: Ulid, from: MeetingStatus, at: Sec) -> Vec<PropertyViolation> {
        self.append_event(MonitorEvent::Confirm {
            meeting_id,
            from,
            at,
        });
        let mut raised = Vec::new();
        if self.pending.remove(&meeting_id).is_none() {
            raised.extend(self.record(PropertyViolation {
                property: Property::ConfirmWithoutCreate,
                severity: Severity::Warning,
                meeting_id,
                description: format!("confirm observed for meeting {meeting_id} with no pending create"),
                details: "the monitor mirror disagrees with the store; state skew worth investigating"
                    .to_string(),
                detected_at: at,
            }));
        }
        self.scrub_unresolved(meeting_id);
        raised
    }

    pub fn on_reject(&self, meeting_id: Ulid, from: MeetingStatus, at: Sec) -> Vec<PropertyViolation> {
        self.append_event(MonitorEvent::Reject {
            meeting_id,
            from,
            at,
        });
        self.pending.remove(&meeting_id);
        self.scrub_unresolved(meeting_id);
        // A rejected booking releases its slot.
        self.release_slots(meeting_id);
        Vec::new()
    }

    pub fn on_cancel(
        &self,
        meeting_id: Ulid,
        prior: Option<MeetingStatus>,
        at: Sec,
    ) -> Vec<PropertyViolation> {
        self.append_event(MonitorEvent::Cancel {
            meeting_id,
            prior,
            at,
        });
        self.pending.remove(&meeting_id);
        self.release_slots(meeting_id);
        Vec::new()
    }

    pub fn on_complete(&self, meeting_id: Ulid, at: Sec) -> Vec<PropertyViolation> {
        self.append_event(MonitorEvent::Complete { meeting_id, at });
        self.release_slots(meeting_id);
        Vec::new()
    }

    pub fn on_delete(
        &self,
        meeting_id: Ulid,
        prior: Option<MeetingStatus>,
        at: Sec,
    ) -> Vec<PropertyViolation> {
        self.append_event(MonitorEvent::Delete {
            meeting_id,
            prior,
            at,
        });
        let mut raised = Vec::new();
        if !self.created_ids.contains(&meeting_id) {
            raised.extend(self.record(PropertyViolation {
                property: Property::DeleteNonexistent,
                severity: Severity::Error,
                meeting_id,
                description: format!("delete observed for meeting {meeting_id} that was never created"),
                details: "deletions must refer to previously created meetings".to_string(),
                detected_at: at,
            }));
        }
        self.created_ids.remove(&meeting_id);
        self.pending.remove(&meeting_id);
        self.release_slots(meeting_id);
        raised
    }

    pub fn on_update(&self, meeting_id: Ulid, at: Sec) -> Vec<PropertyViolation> {
        // Logged for the event trail only; an update does not resolve or
        // re-open the pending entry.
        self.append_event(MonitorEvent::Update { meeting_id, at });
        Vec::new()
    }

    /// Checkpoint sweep: every pending meeting whose start has already
    /// passed without a confirm or reject is flagged.
    pub fn check_pending(&self, now: Sec) -> Vec<PropertyViolation> {
        let mut raised = Vec::new();
        for entry in self.pending.iter() {
            if entry.value().span.start < now {
                let meeting_id = *entry.key();
                raised.extend(self.record(PropertyViolation {
                    property: Property::UnresolvedMeeting,
                    severity: Severity::Error,
                    meeting_id,
                    description: format!(
                        "meeting {meeting_id} reached its start time still unresolved"
                    ),
                    details: "every created meeting is eventually confirmed or rejected"
                        .to_string(),
                    detected_at: now,
                }));
            }
        }
        raised
    }

    // ── Read surface ─────────────────────────────────────────

    pub fn violations(&self) -> Vec<PropertyViolation> {
        self.violations.lock().expect("violation log lock").clone()
    }

    pub fn violations_by_severity(&self, severity: Severity) -> Vec<PropertyViolation> {
        self.violations
            .lock()
            .expect("violation log lock")
            .iter()
            .filter(|v| v.severity == severity)
            .cloned()
            .collect()
    }

    pub fn event_history(&self) -> Vec<MonitorEvent> {
        self.events.lock().expect("event log lock").clone()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Prune violation history for a meeting that left the store.
    pub fn remove_violations_for_meeting(&self, meeting_id: Ulid) {
        self.violations
            .lock()
            .expect("violation log lock")
            .retain(|v| v.meeting_id != meeting_id);
    }

    /// Clear every piece of monitor state. For tests and operator resets.
    pub fn reset(&self) {
        self.room_capacities.clear();
        self.created_ids.clear();
        self.pending.clear();
        self.room_slots.clear();
        self.events.lock().expect("event log lock").clear();
        self.violations.lock().expect("violation log lock").clear();
    }

    pub fn statistics(&self) -> MonitorStatistics {
        // Counters are read before the violation log is locked so this
        // never holds the log lock while touching the shard maps.
        let total_events = self.events.lock().expect("event log lock").len();
        let pending_meetings = self.pending.len();
        let tracked_rooms = self.room_capacities.len();

        let violations = self.violations.lock().expect("violation log lock");
        let mut stats = MonitorStatistics {
            total_events,
            total_violations: violations.len(),
            pending_meetings,
            tracked_rooms,
            ..MonitorStatistics::default()
        };
        for v in violations.iter() {
            match v.severity {
                Severity::Warning => stats.warnings += 1,
                Severity::Error => stats.errors += 1,
                Severity::Critical => stats.criticals += 1,
            }
        }
        stats
    }

    // ── Internals ────────────────────────────────────────────

    fn append_event(&self, event: MonitorEvent) {
        self.events.lock().expect("event log lock").push(event);
    }

    /// Append unless an identical observation is already logged. Returns the
    /// violation when it is new.
    fn record(&self, violation: PropertyViolation) -> Option<PropertyViolation> {
        let mut log = self.violations.lock().expect("violation log lock");
        if log.iter().any(|v| v.is_duplicate_of(&violation)) {
            return None;
        }
        tracing::warn!(
            property = violation.property.name(),
            severity = violation.severity.as_str(),
            meeting = %violation.meeting_id,
            "{}",
            violation.description
        );
        metrics::counter!(
            observability::VIOLATIONS_TOTAL,
            "severity" => violation.severity.as_str()
        )
        .increment(1);
        log.push(violation.clone());
        Some(violation)
    }

    fn scrub_unresolved(&self, meeting_id: Ulid) {
        self.violations
            .lock()
            .expect("violation log lock")
            .retain(|v| !(v.property == Property::UnresolvedMeeting && v.meeting_id == meeting_id));
    }

    fn release_slots(&self, meeting_id: Ulid) {
        for timeline in self.room_slots.iter() {
            let mut slots = timeline.value().lock().expect("room timeline lock");
            slots.retain(|s| s.meeting_id != meeting_id);
        }
    }
}
