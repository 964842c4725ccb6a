use crate::error::{AppError, AppResult};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: i64,
    pub event_type: String, // "room_created", "role_changed", "period_ended", ...
    pub room_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub details: serde_json::Value,
}

struct DailyFile {
    date: NaiveDate,
    file: File,
}

/// Append-only JSON-lines trail of sensitive actions, one file per UTC day
pub struct AuditTrailService {
    log_directory: PathBuf,
    current: Mutex<DailyFile>,
}

fn open_for(log_directory: &Path, date: NaiveDate) -> AppResult<File> {
    let path = log_directory.join(format!("audit_{}.log", date.format("%Y-%m-%d")));
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| AppError::Message(format!("Failed to open audit log file: {}", e)))
}

impl AuditTrailService {
    pub fn new(log_directory: PathBuf) -> AppResult<Self> {
        std::fs::create_dir_all(&log_directory)
            .map_err(|e| AppError::Message(format!("Failed to create log directory: {}", e)))?;

        let date = Utc::now().date_naive();
        let file = open_for(&log_directory, date)?;

        info!("Audit trail initialized in {:?}", log_directory);

        Ok(Self {
            log_directory,
            current: Mutex::new(DailyFile { date, file }),
        })
    }

    pub async fn log(&self, entry: AuditLogEntry) -> AppResult<()> {
        let json = serde_json::to_string(&entry)?;
        let today = Utc::now().date_naive();

        let mut current = self.current.lock().await;
        if current.date != today {
            current.file = open_for(&self.log_directory, today)?;
            current.date = today;
        }

        writeln!(current.file, "{}", json)
            .map_err(|e| AppError::Message(format!("Failed to write audit log: {}", e)))?;
        current
            .file
            .flush()
            .map_err(|e| AppError::Message(format!("Failed to flush audit log: {}", e)))?;

        Ok(())
    }

    /// Record an action; audit failures never fail the action itself
    pub async fn record(
        &self,
        event_type: &str,
        room_id: Option<Uuid>,
        actor_id: Option<Uuid>,
        details: serde_json::Value,
    ) {
        let entry = AuditLogEntry {
            timestamp: Utc::now().timestamp(),
            event_type: event_type.to_string(),
            room_id,
            actor_id,
            details,
        };
        if let Err(e) = self.log(entry).await {
            warn!("Audit write failed for {}: {}", event_type, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_entries_are_appended_as_json_lines() {
        let dir = std::env::temp_dir().join(format!("messmate-audit-{}", Uuid::new_v4()));
        let audit = AuditTrailService::new(dir.clone()).unwrap();
        let room = Uuid::new_v4();

        audit
            .record("room_created", Some(room), None, serde_json::json!({ "name": "Flat 4" }))
            .await;
        audit
            .record("room_deleted", Some(room), None, serde_json::json!({}))
            .await;

        let path = dir.join(format!("audit_{}.log", Utc::now().date_naive().format("%Y-%m-%d")));
        let contents = std::fs::read_to_string(path).unwrap();
        let lines: Vec<AuditLogEntry> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].event_type, "room_created");
        assert_eq!(lines[0].room_id, Some(room));
        assert_eq!(lines[1].event_type, "room_deleted");

        std::fs::remove_dir_all(dir).ok();
    }
}
