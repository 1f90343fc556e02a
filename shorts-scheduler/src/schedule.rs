//! The durable schedule cursor.
//!
//! Every video gets its own day, published at noon. The last day handed out is recorded in a
//! small JSON file so the next run continues with the day after it:
//!
//! ```json
//! {"last_scheduled_date": "2025-03-14T12:00:00"}
//! ```
//!
//! Times are wall-clock values without a zone; nothing here converts between zones.

use crate::Error;
use crate::record;
use eyre::Context;
use jiff::ToSpan;
use jiff::civil::DateTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The persisted cursor record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleState {
    pub last_scheduled_date: DateTime,
}

/// Pins `moment` to noon on the same day.
pub fn at_noon(moment: DateTime) -> DateTime {
    moment.date().at(12, 0, 0, 0)
}

/// The slot after `slot`.
///
/// This is a plain 24 hour step on the wall clock; it does not care about month ends or
/// daylight saving.
pub fn following(slot: DateTime) -> eyre::Result<DateTime> {
    slot.checked_add(24.hours())
        .with_context(|| format!("advance {slot} by one day"))
}

/// Renders a slot the way the YouTube API wants `publishAt`: `YYYY-MM-DDTHH:MM:SSZ`.
pub fn publish_at(slot: DateTime) -> String {
    slot.strftime("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Reads and writes the schedule state file.
#[derive(Debug, Clone)]
pub struct ScheduleCursor {
    state_file: PathBuf,
}

impl ScheduleCursor {
    pub fn new(state_file: impl Into<PathBuf>) -> Self {
        Self {
            state_file: state_file.into(),
        }
    }

    pub fn state_file(&self) -> &Path {
        &self.state_file
    }

    /// Reads the recorded state. A present but malformed record is a configuration error.
    pub async fn load(&self) -> Result<Option<ScheduleState>, Error> {
        let Some(bytes) = record::read(&self.state_file)
            .await
            .map_err(|e| Error::io("read schedule state", e))?
        else {
            return Ok(None);
        };
        record::parse(&bytes)
            .map(Some)
            .map_err(|e| Error::configuration(&self.state_file, e))
    }

    /// The slot the next published video should get, based on the local wall clock.
    pub async fn next_slot(&self) -> Result<DateTime, Error> {
        self.next_slot_at(jiff::Zoned::now().datetime()).await
    }

    /// The slot the next published video should get if it is currently `now`.
    ///
    /// Without recorded state this is today at noon; otherwise it's noon on the day after the
    /// last recorded slot. Any time-of-day in either is discarded.
    pub async fn next_slot_at(&self, now: DateTime) -> Result<DateTime, Error> {
        let anchor = match self.load().await? {
            None => now,
            Some(state) => following(state.last_scheduled_date)
                .map_err(|e| Error::configuration(&self.state_file, e))?,
        };
        Ok(at_noon(anchor))
    }

    /// Records `slot` as used and returns the slot for the next video in this batch.
    pub async fn advance_and_persist(&self, slot: DateTime) -> Result<DateTime, Error> {
        let state = ScheduleState {
            last_scheduled_date: slot,
        };
        record::write(&self.state_file, &state)
            .await
            .map_err(|e| Error::io("save schedule state", e))?;
        tracing::debug!(%slot, "recorded scheduled slot");
        following(slot).map_err(|e| Error::io("advance schedule", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    fn cursor_in(dir: &tempfile::TempDir) -> ScheduleCursor {
        ScheduleCursor::new(dir.path().join("schedule_state.json"))
    }

    #[tokio::test]
    async fn next_slot_is_noon_after_recorded_date() {
        for last in [
            date(2025, 3, 14).at(0, 0, 0, 0),
            date(2025, 3, 14).at(12, 0, 0, 0),
            date(2025, 3, 14).at(23, 59, 59, 999_999_000),
            date(2025, 3, 14).at(7, 30, 5, 0),
        ] {
            let dir = tempfile::tempdir().unwrap();
            let cursor = cursor_in(&dir);
            cursor.advance_and_persist(last).await.unwrap();

            let next = cursor.next_slot_at(date(2030, 1, 1).at(9, 0, 0, 0)).await.unwrap();
            assert_eq!(next, date(2025, 3, 15).at(12, 0, 0, 0), "after {last}");
        }
    }

    #[tokio::test]
    async fn next_slot_without_state_is_today_at_noon() {
        let dir = tempfile::tempdir().unwrap();
        let cursor = cursor_in(&dir);

        for now in [
            date(2025, 6, 1).at(0, 0, 1, 0),
            date(2025, 6, 1).at(12, 0, 0, 0),
            date(2025, 6, 1).at(18, 45, 0, 0),
        ] {
            assert_eq!(
                cursor.next_slot_at(now).await.unwrap(),
                date(2025, 6, 1).at(12, 0, 0, 0)
            );
        }
    }

    #[tokio::test]
    async fn wall_clock_slot_is_at_noon() {
        let dir = tempfile::tempdir().unwrap();
        let slot = cursor_in(&dir).next_slot().await.unwrap();
        assert_eq!((slot.hour(), slot.minute(), slot.second()), (12, 0, 0));
        assert_eq!(slot.subsec_nanosecond(), 0);
    }

    #[tokio::test]
    async fn advance_records_current_slot_and_returns_next_day() {
        let dir = tempfile::tempdir().unwrap();
        let cursor = cursor_in(&dir);

        let next = cursor
            .advance_and_persist(date(2025, 1, 31).at(12, 0, 0, 0))
            .await
            .unwrap();
        assert_eq!(next, date(2025, 2, 1).at(12, 0, 0, 0));
        assert_eq!(
            cursor.load().await.unwrap(),
            Some(ScheduleState {
                last_scheduled_date: date(2025, 1, 31).at(12, 0, 0, 0)
            })
        );
    }

    #[tokio::test]
    async fn reads_state_written_with_fractional_seconds() {
        let dir = tempfile::tempdir().unwrap();
        let cursor = cursor_in(&dir);
        std::fs::write(
            cursor.state_file(),
            r#"{"last_scheduled_date": "2024-12-31T12:00:00.123456"}"#,
        )
        .unwrap();

        assert_eq!(
            cursor.next_slot_at(date(2000, 1, 1).at(0, 0, 0, 0)).await.unwrap(),
            date(2025, 1, 1).at(12, 0, 0, 0)
        );
    }

    #[tokio::test]
    async fn malformed_state_is_a_configuration_error() {
        for contents in [
            r#"{"next_date": "2025-01-01T12:00:00"}"#,
            r#"{"last_scheduled_date": "yesterday"}"#,
            "not json at all",
        ] {
            let dir = tempfile::tempdir().unwrap();
            let cursor = cursor_in(&dir);
            std::fs::write(cursor.state_file(), contents).unwrap();

            let err = cursor.next_slot().await.unwrap_err();
            assert!(matches!(err, Error::Configuration { .. }), "{contents}: {err:?}");
        }
    }

    #[test]
    fn publish_at_is_utc_suffixed() {
        assert_eq!(
            publish_at(date(2025, 3, 15).at(12, 0, 0, 0)),
            "2025-03-15T12:00:00Z"
        );
    }

    #[test]
    fn following_is_a_fixed_day() {
        assert_eq!(
            following(date(2024, 2, 28).at(12, 0, 0, 0)).unwrap(),
            date(2024, 2, 29).at(12, 0, 0, 0)
        );
        assert_eq!(
            following(date(2024, 12, 31).at(12, 0, 0, 0)).unwrap(),
            date(2025, 1, 1).at(12, 0, 0, 0)
        );
    }
}
