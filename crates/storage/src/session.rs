//! Driving session history

use crate::StorageError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Summary of one finished logging session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub start_time_sec: i64,
    pub end_time_sec: i64,
    #[serde(default)]
    pub csv_path: Option<String>,
    /// Final scores, absent when driver evaluation was off
    #[serde(default)]
    pub accel_score: Option<i32>,
    #[serde(default)]
    pub fuel_score: Option<i32>,
    #[serde(default)]
    pub overall_score: Option<i32>,
}

impl SessionRecord {
    /// New record with a random id and no scores
    pub fn new(start_time_sec: i64, end_time_sec: i64, csv_path: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            start_time_sec,
            end_time_sec,
            csv_path,
            accel_score: None,
            fuel_score: None,
            overall_score: None,
        }
    }

    /// Attach final scores, clamped to 0-100 and rounded
    pub fn with_scores(mut self, accel: f64, fuel: f64, overall: f64) -> Self {
        self.accel_score = Some(score_to_int(accel));
        self.fuel_score = Some(score_to_int(fuel));
        self.overall_score = Some(score_to_int(overall));
        self
    }

    pub fn duration_sec(&self) -> i64 {
        (self.end_time_sec - self.start_time_sec).max(0)
    }
}

fn score_to_int(score: f64) -> i32 {
    score.clamp(0.0, 100.0).round() as i32
}

/// Session history persisted as a JSON array in a single file
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record
    pub fn save(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let mut records = self.load();
        records.push(record.clone());

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(&records)?;
        std::fs::write(&self.path, json)?;

        info!("Saved session {} ({} total)", record.id, records.len());
        Ok(())
    }

    /// All records, newest start time first
    pub fn list(&self) -> Vec<SessionRecord> {
        let mut records = self.load();
        records.sort_by(|a, b| b.start_time_sec.cmp(&a.start_time_sec));
        records
    }

    /// A missing or unreadable history is treated as empty
    fn load(&self) -> Vec<SessionRecord> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) => {
                debug!("No session history at {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };
        serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!("Ignoring corrupt session history {}: {}", self.path.display(), e);
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_store() -> (PathBuf, SessionStore) {
        let dir = std::env::temp_dir().join(format!("sessions-{}", Uuid::new_v4()));
        let store = SessionStore::new(dir.join("sessions.json"));
        (dir, store)
    }

    #[test]
    fn test_scores_rounded_and_clamped() {
        let record = SessionRecord::new(0, 10, None).with_scores(87.5, 99.4, 104.0);
        assert_eq!(record.accel_score, Some(88));
        assert_eq!(record.fuel_score, Some(99));
        assert_eq!(record.overall_score, Some(100));
    }

    #[test]
    fn test_list_newest_first() {
        let (dir, store) = scratch_store();
        for start in [100, 300, 200] {
            store.save(&SessionRecord::new(start, start + 60, None)).unwrap();
        }

        let starts: Vec<_> = store.list().iter().map(|r| r.start_time_sec).collect();
        assert_eq!(starts, vec![300, 200, 100]);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_round_trip_keeps_optional_fields() {
        let (dir, store) = scratch_store();
        let record = SessionRecord::new(1_700_000_000, 1_700_000_600, Some("logs/obd.csv".into()))
            .with_scores(90.0, 80.0, 85.0);
        store.save(&record).unwrap();
        store.save(&SessionRecord::new(1_600_000_000, 1_600_000_010, None)).unwrap();

        let listed = store.list();
        assert_eq!(listed[0], record);
        assert_eq!(listed[1].overall_score, None);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_missing_or_corrupt_history_is_empty() {
        let (dir, store) = scratch_store();
        assert!(store.list().is_empty());

        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(store.path(), "not json").unwrap();
        assert!(store.list().is_empty());

        // Saving over a corrupt file starts a fresh history
        store.save(&SessionRecord::new(5, 6, None)).unwrap();
        assert_eq!(store.list().len(), 1);
        std::fs::remove_dir_all(dir).unwrap();
    }
}
