use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::models::task::HistoryRecord;

/// Append-only log of terminal task snapshots, kept for the lifetime of the
/// process or until explicitly cleared. Records are never mutated after
/// insertion; readers get clones.
#[derive(Default)]
pub struct HistoryLog {
    records: Mutex<Vec<HistoryRecord>>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<HistoryRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, record: HistoryRecord) {
        self.lock().push(record);
    }

    pub fn snapshot(&self) -> Vec<HistoryRecord> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::Platform;
    use chrono::Utc;
    use uuid::Uuid;

    fn record(success: bool) -> HistoryRecord {
        HistoryRecord {
            task_id: Uuid::new_v4(),
            url: "https://youtu.be/abc123".into(),
            platform: Platform::Youtube,
            title: Some("clip".into()),
            success,
            file_path: None,
            file_size: None,
            error: if success { None } else { Some("boom".into()) },
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn appends_in_order() {
        let log = HistoryLog::new();
        log.append(record(true));
        log.append(record(false));

        let records = log.snapshot();
        assert_eq!(records.len(), 2);
        assert!(records[0].success);
        assert!(!records[1].success);
    }

    #[test]
    fn snapshot_is_a_copy() {
        let log = HistoryLog::new();
        log.append(record(true));

        let mut records = log.snapshot();
        records.clear();
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn clear_empties_the_log() {
        let log = HistoryLog::new();
        log.append(record(true));
        log.clear();
        assert!(log.is_empty());
    }
}
