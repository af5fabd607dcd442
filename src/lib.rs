//! Verified meeting scheduler core.
//!
//! Two verification layers sit between the request boundary and the store
//! of record. A static constraint check ([`solver`]) decides, before any
//! state change, whether a proposed meeting fits the confirmed schedule
//! under room exclusivity, participant exclusivity, and room capacity,
//! producing a human-readable witness for every violated constraint. A
//! runtime [`monitor`] then observes every committed transition and checks
//! the observable lifecycle against temporal properties, keeping its own
//! volatile mirror of the schedule.
//!
//! The [`engine`] sequences the two: validate, check, persist to the WAL,
//! notify the monitor, return a [`model::SchedulingResult`].

pub mod checkpoint;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod monitor;
pub mod observability;
pub mod solver;
pub mod wal;

pub use config::Config;
pub use engine::{Engine, EngineError};
pub use model::{
    Meeting, MeetingDraft, MeetingStatus, MeetingUpdate, Participant, Room, SchedulingResult, Sec,
    SolverStatus, Span,
};
pub use monitor::{
    LifecycleMonitor, MonitorEvent, MonitorStatistics, Property, PropertyViolation, Severity,
};
pub use solver::{
    DecisionBackend, DecisionResult, ExistingMeeting, IntervalBackend, SchedulingConstraint,
};
