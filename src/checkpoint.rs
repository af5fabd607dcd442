use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::Engine;

/// Background task that periodically sweeps unresolved meetings: every
/// pending meeting whose start has passed without a confirm or reject is
/// flagged by the monitor.
pub async fn run_pending_checker(engine: Arc<Engine>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        let raised = engine.run_pending_check();
        if !raised.is_empty() {
            info!(
                count = raised.len(),
                "pending check flagged unresolved meetings"
            );
        }
    }
}

/// Background task that rewrites the WAL once enough scheduling events
/// have piled up since the last rewrite. The compacted log carries one
/// record per surviving room, participant, and meeting, so a long-lived
/// deployment does not replay its whole mutation history on restart.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(10));
    loop {
        interval.tick().await;
        let appends = engine.wal_appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        match engine.compact_wal().await {
            Ok(()) => info!(
                appends,
                rooms = engine.rooms().len(),
                meetings = engine.meetings().len(),
                "WAL rewritten from live scheduler state"
            ),
            Err(e) => tracing::warn!(appends, "WAL compaction failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::Engine;
    use crate::model::MeetingDraft;
    use crate::monitor::Property;
    use std::path::PathBuf;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("quorum_test_checkpoint");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    #[tokio::test]
    async fn pending_check_flags_past_unresolved_meeting() {
        let engine = Engine::new(test_wal_path("pending_check.wal")).unwrap();

        let room = engine
            .create_room("Aurora".into(), 4, None, None, true)
            .await
            .unwrap();
        let p = engine
            .create_participant("Ada".into(), "ada@example.com".into(), None)
            .await
            .unwrap();

        // A meeting that already started and was never resolved.
        let now = crate::engine::now_sec();
        let result = engine
            .create_meeting(MeetingDraft {
                title: "retro".into(),
                description: None,
                room_id: room.id,
                participant_ids: vec![p.id],
                start: now - 3600,
                end: now - 1800,
            })
            .await
            .unwrap();
        assert!(result.success);

        let raised = engine.run_pending_check();
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].property, Property::UnresolvedMeeting);

        // Second sweep is deduplicated.
        assert!(engine.run_pending_check().is_empty());
    }
}
