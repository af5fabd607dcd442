mod availability;
mod error;
mod mutations;
mod queries;
mod store;

pub use availability::{merge_overlapping, round_up_to_grid};
pub use error::EngineError;
pub use store::InMemoryStore;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::config::Config;
use crate::model::*;
use crate::monitor::{LifecycleMonitor, PropertyViolation};
use crate::observability;
use crate::solver::{DecisionBackend, IntervalBackend};
use crate::wal::Wal;

pub(crate) fn now_sec() -> Sec {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs() as Sec
}

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL. Scheduling events arriving close
/// together are committed as one group: buffer everything already queued,
/// fsync once, answer every waiting request handler. Compaction and the
/// append counter are handled between groups, never in the middle of one.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let mut deferred = None;
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                // Widen the commit group with whatever is already queued.
                while let Ok(next) = rx.try_recv() {
                    match next {
                        WalCommand::Append { event, response } => batch.push((event, response)),
                        other => {
                            deferred = Some(other);
                            break;
                        }
                    }
                }
                flush_and_respond(&mut wal, batch);
            }
            other => deferred = Some(other),
        }
        match deferred {
            Some(WalCommand::Compact { events, response }) => {
                let result = Wal::write_compact_file(wal.path(), &events)
                    .and_then(|()| wal.swap_compact_file());
                let _ = response.send(result);
            }
            Some(WalCommand::AppendsSinceCompact { response }) => {
                let _ = response.send(wal.appends_since_compact());
            }
            Some(WalCommand::Append { .. }) | None => {}
        }
    }
}

/// Append the whole group, fsync once, then answer every waiting caller
/// with the shared outcome.
fn flush_and_respond(wal: &mut Wal, batch: Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();

    let mut outcome = Ok(());
    for (event, _) in &batch {
        if let Err(e) = wal.append_buffered(event) {
            outcome = Err(e);
            break;
        }
    }
    // The sync runs even when an append failed: the buffer must not carry
    // half-written frames into a later group that will report success.
    let synced = wal.flush_sync();
    if outcome.is_ok() {
        outcome = synced;
    }
    metrics::histogram!(observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());

    for (_, tx) in batch {
        let reply = match &outcome {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(reply);
    }
}

/// The scheduling service: sequences static checking, persistence, and
/// monitor notification, and owns the meeting status machine.
pub struct Engine {
    pub(super) store: InMemoryStore,
    wal_tx: mpsc::Sender<WalCommand>,
    monitor: Arc<LifecycleMonitor>,
    solver: Arc<dyn DecisionBackend>,
    pub(super) config: Config,
}

impl Engine {
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        Self::with_config(wal_path, Config::default())
    }

    pub fn with_config(wal_path: PathBuf, config: Config) -> io::Result<Self> {
        let solver: Arc<dyn DecisionBackend> = Arc::new(IntervalBackend::from_config(&config));
        Self::with_parts(wal_path, config, Arc::new(LifecycleMonitor::new()), solver)
    }

    /// Full injection point: the monitor and backend are process-wide
    /// singletons owned by the caller, never module-level globals.
    pub fn with_parts(
        wal_path: PathBuf,
        config: Config,
        monitor: Arc<LifecycleMonitor>,
        solver: Arc<dyn DecisionBackend>,
    ) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let store = InMemoryStore::new();
        for event in &events {
            store.apply_event(event);
        }

        // The monitor's mirror is volatile and starts from zero; only the
        // capacity table is derived from the replayed store so the
        // attendance property has something to check against.
        for room in store.rooms() {
            monitor.set_room_capacity(room.id, room.capacity);
        }

        tracing::info!(
            replayed = events.len(),
            rooms = store.rooms().len(),
            meetings = store.meeting_count(),
            "engine started"
        );

        Ok(Self {
            store,
            wal_tx,
            monitor,
            solver,
            config,
        })
    }

    pub fn monitor(&self) -> &Arc<LifecycleMonitor> {
        &self.monitor
    }

    pub fn solver(&self) -> &Arc<dyn DecisionBackend> {
        &self.solver
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// WAL-append then apply to the store. The WAL is the commit point;
    /// the in-memory view never runs ahead of it.
    pub(super) async fn persist_and_apply(&self, event: &Event) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.store.apply_event(event);
        Ok(())
    }

    /// Checkpoint entry point: sweep unresolved meetings against the wall
    /// clock. Violations land in the monitor's log; the new ones are
    /// returned.
    pub fn run_pending_check(&self) -> Vec<PropertyViolation> {
        self.monitor.check_pending(now_sec())
    }

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();
        for room in self.store.rooms() {
            events.push(Event::RoomCreated {
                id: room.id,
                name: room.name,
                capacity: room.capacity,
                location: room.location,
                description: room.description,
                available: room.available,
            });
        }
        for participant in self.store.participants() {
            events.push(Event::ParticipantCreated {
                id: participant.id,
                name: participant.name,
                email: participant.email,
                department: participant.department,
            });
        }
        for meeting in self.store.meetings() {
            events.push(Event::MeetingCreated { meeting });
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact {
                events,
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
