//! Session Grouper (§4.8). Grounded directly on `services.py`'s
//! `_get_session_directory`: rolls over on a date change, on inactivity
//! exceeding `session_inactivity_timeout`, or when the base path already
//! exists and `photos_in_session > 100` — in which case a `_NNN` suffix is
//! appended, picking the first non-existing counter.

use std::path::{Path, PathBuf};

use crate::clock::Clock;

pub struct Session {
    pub dir: PathBuf,
    pub date: String,
    pub photos_in_session: u32,
    last_capture_mono_ms: Option<u64>,
}

pub struct SessionGrouper {
    current: Option<Session>,
    photo_base_dir: PathBuf,
    cam_ordinal: u32,
    inactivity_timeout_ms: u64,
}

impl SessionGrouper {
    pub fn new(photo_base_dir: PathBuf, cam_ordinal: u32, inactivity_timeout_ms: u64) -> Self {
        Self { current: None, photo_base_dir, cam_ordinal, inactivity_timeout_ms }
    }

    /// Returns the session directory to capture into, rolling over first if needed.
    /// `dir_exists` lets callers (and tests) avoid touching the real filesystem
    /// when probing for an existing rollover counter.
    pub fn resolve(&mut self, clock: &dyn Clock, dir_exists: impl Fn(&Path) -> bool) -> &Session {
        let now_ms = clock.now_mono_ms();
        let today = clock.today();

        let needs_new_session = match &self.current {
            None => true,
            Some(s) => {
                s.date != today
                    || s.last_capture_mono_ms.is_some_and(|last| now_ms.saturating_sub(last) > self.inactivity_timeout_ms)
            }
        };

        if needs_new_session {
            let base_dir = self.photo_base_dir.join(format!("helmet-cam{}", self.cam_ordinal));
            let prior_photos = self.current.as_ref().map(|s| s.photos_in_session).unwrap_or(0);

            let mut session_name = format!("session_{today}");
            let mut session_dir = base_dir.join(&session_name);
            let mut counter = 1u32;
            while dir_exists(&session_dir) && prior_photos > 100 {
                session_name = format!("session_{today}_{counter:03}");
                session_dir = base_dir.join(&session_name);
                counter += 1;
            }

            self.current = Some(Session {
                dir: session_dir,
                date: today,
                photos_in_session: 0,
                last_capture_mono_ms: None,
            });
        }

        self.current.as_ref().expect("just set")
    }

    pub fn record_capture(&mut self, now_ms: u64) {
        if let Some(session) = &mut self.current {
            session.photos_in_session += 1;
            session.last_capture_mono_ms = Some(now_ms);
        }
    }

    pub fn current_session_name(&self) -> Option<String> {
        self.current.as_ref().and_then(|s| s.dir.file_name()).map(|n| n.to_string_lossy().into_owned())
    }

    pub fn photos_in_session(&self) -> u32 {
        self.current.as_ref().map(|s| s.photos_in_session).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;

    #[test]
    fn first_resolve_creates_a_session() {
        let mut grouper = SessionGrouper::new(PathBuf::from("/tmp/photos"), 0, 1_800_000);
        let clock = FakeClock::new("20260101");
        let session = grouper.resolve(&clock, |_| false);
        assert_eq!(session.dir, PathBuf::from("/tmp/photos/helmet-cam0/session_20260101"));
        assert_eq!(session.photos_in_session, 0);
    }

    #[test]
    fn date_change_rolls_over() {
        let mut grouper = SessionGrouper::new(PathBuf::from("/tmp/photos"), 0, 1_800_000);
        let clock = FakeClock::new("20260101");
        grouper.resolve(&clock, |_| false);
        grouper.record_capture(0);

        clock.set_date("20260102");
        let session = grouper.resolve(&clock, |_| false);
        assert_eq!(session.dir, PathBuf::from("/tmp/photos/helmet-cam0/session_20260102"));
        assert_eq!(session.photos_in_session, 0);
    }

    #[test]
    fn inactivity_timeout_rolls_over_same_day() {
        let mut grouper = SessionGrouper::new(PathBuf::from("/tmp/photos"), 0, 1_000);
        let clock = FakeClock::new("20260101");
        grouper.resolve(&clock, |_| false);
        grouper.record_capture(0);

        clock.advance_ms(5_000);
        let session = grouper.resolve(&clock, |_| false);
        // Same date, so the path is identical, but photos_in_session resets.
        assert_eq!(session.photos_in_session, 0);
    }

    #[test]
    fn over_100_photos_and_existing_path_picks_next_counter() {
        let mut grouper = SessionGrouper::new(PathBuf::from("/tmp/photos"), 0, 1_800_000);
        let clock = FakeClock::new("20260101");
        grouper.resolve(&clock, |_| false);
        for i in 0..101 {
            grouper.record_capture(i);
        }

        // Simulate both the default session path and the first counter
        // variant already existing on disk.
        let existing = [
            PathBuf::from("/tmp/photos/helmet-cam0/session_20260101"),
            PathBuf::from("/tmp/photos/helmet-cam0/session_20260101_001"),
        ];
        clock.advance_ms(2_000_000); // force rollover via inactivity
        let session = grouper.resolve(&clock, |p| existing.contains(&p.to_path_buf()));
        assert_eq!(session.dir, PathBuf::from("/tmp/photos/helmet-cam0/session_20260101_002"));
    }
}
