use ulid::Ulid;

use crate::limits::MAX_QUERY_WINDOW_SECS;
use crate::model::{MeetingStatus, Sec, Span};

use super::{Engine, EngineError};

// ── Availability Algorithm ────────────────────────────────────────

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end
        {
            last.end = last.end.max(span.end);
            continue;
        }
        merged.push(span);
    }
    merged
}

/// Smallest grid point at or after `t`, on the grid anchored at `origin`.
pub fn round_up_to_grid(t: Sec, origin: Sec, increment: Sec) -> Sec {
    let offset = t - origin;
    let quotient = offset / increment;
    let remainder = offset % increment;
    let div_ceil = if (remainder > 0 && increment > 0) || (remainder < 0 && increment < 0) {
        quotient + 1
    } else {
        quotient
    };
    origin + div_ceil * increment
}

/// Walk the search window on the increment grid. Each grid point whose
/// candidate interval is disjoint from every busy span is emitted; on a
/// collision the cursor jumps straight past the busy span, re-aligned to
/// the grid.
fn walk_grid(busy: &[Span], window: &Span, duration: Sec, increment: Sec) -> Vec<Span> {
    let mut free = Vec::new();
    let mut cursor = window.start;
    while cursor + duration <= window.end {
        let candidate = Span::new(cursor, cursor + duration);
        match busy.iter().find(|s| s.overlaps(&candidate)) {
            None => {
                free.push(candidate);
                cursor += increment;
            }
            Some(blocking) => {
                cursor = round_up_to_grid(blocking.end, window.start, increment);
            }
        }
    }
    free
}

impl Engine {
    /// Best-effort helper: enumerate start times in `window` where a
    /// meeting of `duration_min` minutes would not collide with any
    /// confirmed meeting in the room.
    pub fn find_available_slots(
        &self,
        room_id: Ulid,
        duration_min: i64,
        window: &Span,
    ) -> Result<Vec<Span>, EngineError> {
        if duration_min <= 0 {
            return Err(EngineError::LimitExceeded("slot duration must be positive"));
        }
        if window.end - window.start > MAX_QUERY_WINDOW_SECS {
            return Err(EngineError::LimitExceeded("query window too wide"));
        }
        if self.store.get_room(&room_id).is_none() {
            return Err(EngineError::RoomNotFound(room_id));
        }

        let duration = duration_min * 60;
        let increment = self.config.slot_increment_min * 60;
        if increment <= 0 {
            return Err(EngineError::LimitExceeded("slot increment must be positive"));
        }

        let mut busy: Vec<Span> = self
            .store
            .meetings()
            .into_iter()
            .filter(|m| m.room_id == room_id && m.status == MeetingStatus::Confirmed)
            .map(|m| m.span)
            .collect();
        busy.sort_by_key(|s| s.start);
        let busy = merge_overlapping(&busy);

        Ok(walk_grid(&busy, window, duration, increment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: Sec = 60;

    #[test]
    fn merge_overlapping_basic() {
        let spans = vec![
            Span::new(100, 300),
            Span::new(200, 400),
            Span::new(500, 600),
        ];
        let merged = merge_overlapping(&spans);
        assert_eq!(merged, vec![Span::new(100, 400), Span::new(500, 600)]);
    }

    #[test]
    fn merge_overlapping_adjacent() {
        let spans = vec![Span::new(100, 200), Span::new(200, 300)];
        let merged = merge_overlapping(&spans);
        assert_eq!(merged, vec![Span::new(100, 300)]);
    }

    #[test]
    fn round_up_lands_on_grid() {
        assert_eq!(round_up_to_grid(0, 0, 900), 0);
        assert_eq!(round_up_to_grid(1, 0, 900), 900);
        assert_eq!(round_up_to_grid(900, 0, 900), 900);
        assert_eq!(round_up_to_grid(901, 0, 900), 1800);
        // Grid anchored at a non-zero origin.
        assert_eq!(round_up_to_grid(1000, 100, 900), 1900);
    }

    #[test]
    fn empty_timeline_yields_every_grid_point() {
        let window = Span::new(0, 60 * MIN);
        let free = walk_grid(&[], &window, 30 * MIN, 15 * MIN);
        assert_eq!(
            free,
            vec![
                Span::new(0, 30 * MIN),
                Span::new(15 * MIN, 45 * MIN),
                Span::new(30 * MIN, 60 * MIN),
            ]
        );
    }

    #[test]
    fn busy_span_skipped_to_grid_rounded_end() {
        // Busy [20, 40) min; 30-min candidates on a 15-min grid.
        let busy = vec![Span::new(20 * MIN, 40 * MIN)];
        let window = Span::new(0, 90 * MIN);
        let free = walk_grid(&busy, &window, 30 * MIN, 15 * MIN);
        // Cursor 0 collides (0..30 overlaps 20..40), jumps to 40 rounded up
        // to 45; slots then run until 60.
        assert_eq!(
            free,
            vec![Span::new(45 * MIN, 75 * MIN), Span::new(60 * MIN, 90 * MIN)]
        );
    }

    #[test]
    fn busy_end_on_grid_resumes_exactly_there() {
        let busy = vec![Span::new(0, 30 * MIN)];
        let window = Span::new(0, 75 * MIN);
        let free = walk_grid(&busy, &window, 30 * MIN, 15 * MIN);
        assert_eq!(
            free,
            vec![Span::new(30 * MIN, 60 * MIN), Span::new(45 * MIN, 75 * MIN)]
        );
    }

    #[test]
    fn duration_longer_than_window_yields_nothing() {
        let window = Span::new(0, 20 * MIN);
        assert!(walk_grid(&[], &window, 30 * MIN, 15 * MIN).is_empty());
    }

    #[test]
    fn fully_booked_window_yields_nothing() {
        let busy = vec![Span::new(0, 120 * MIN)];
        let window = Span::new(0, 120 * MIN);
        assert!(walk_grid(&busy, &window, 30 * MIN, 15 * MIN).is_empty());
    }

    #[test]
    fn gap_between_bookings_found() {
        let busy = vec![Span::new(0, 30 * MIN), Span::new(60 * MIN, 120 * MIN)];
        let window = Span::new(0, 120 * MIN);
        let free = walk_grid(&busy, &window, 30 * MIN, 15 * MIN);
        assert_eq!(free, vec![Span::new(30 * MIN, 60 * MIN)]);
    }
}
