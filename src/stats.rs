//! Meditation statistics
//!
//! Stats are recomputed from scratch on every query; nothing is cached.

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};

use crate::types::{MeditationSession, MeditationStats, SessionTypeCounts};

/// Compute stats over sessions at or after `window_start`, using local calendar days
pub fn compute_stats(sessions: &[MeditationSession], window_start: DateTime<Utc>) -> MeditationStats {
    compute_stats_in(sessions, window_start, &Local)
}

/// Compute stats with calendar days taken in `tz`
pub fn compute_stats_in<Tz: TimeZone>(
    sessions: &[MeditationSession],
    window_start: DateTime<Utc>,
    tz: &Tz,
) -> MeditationStats {
    let mut window: Vec<&MeditationSession> = sessions
        .iter()
        .filter(|s| s.timestamp >= window_start)
        .collect();
    window.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let total_sessions = window.len() as u32;
    let total_duration: u64 = window.iter().map(|s| u64::from(s.duration_minutes)).sum();
    let average_duration = if total_sessions > 0 {
        total_duration as f64 / f64::from(total_sessions)
    } else {
        0.0
    };

    let mut session_types = SessionTypeCounts::default();
    for session in &window {
        session_types.increment(session.session_type);
    }

    let days: Vec<NaiveDate> = window
        .iter()
        .map(|s| s.timestamp.with_timezone(tz).date_naive())
        .collect();

    MeditationStats {
        total_sessions,
        total_duration,
        average_duration,
        streak: streak_from_days(&days),
        last_session_date: window.first().map(|s| s.timestamp),
        session_types,
    }
}

/// Consecutive-day streak over newest-first calendar days.
///
/// Same-day entries are skipped; the walk stops at the first gap.
fn streak_from_days(days: &[NaiveDate]) -> u32 {
    let Some(mut current) = days.first().copied() else {
        return 0;
    };

    let mut streak = 1;
    for day in &days[1..] {
        match (current - *day).num_days() {
            1 => {
                streak += 1;
                current = *day;
            }
            gap if gap > 1 => break,
            _ => {}
        }
    }
    streak
}
