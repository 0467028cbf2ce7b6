//! Level completion records
//!
//! Persisted to LocalStorage. One record per (user, level); marking a level
//! complete twice is a no-op.

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// A single completed level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelRecord {
    pub user: String,
    pub level: String,
    /// XP awarded on completion
    pub xp: u32,
    /// Unix timestamp (ms) when completed
    pub completed_at: f64,
}

/// Persists "level complete" writes
pub trait ProgressStore {
    /// Record completion; returns false if it was already recorded
    fn mark_level_complete(
        &mut self,
        user: &str,
        level: &str,
        xp: u32,
        timestamp: f64,
    ) -> Result<bool, ServiceError>;
}

/// Progress book kept on the client
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProgressBook {
    pub records: Vec<LevelRecord>,
}

impl ProgressBook {
    /// LocalStorage key (used only in wasm32)
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "code_bubble_progress";

    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn is_complete(&self, user: &str, level: &str) -> bool {
        self.records
            .iter()
            .any(|r| r.user == user && r.level == level)
    }

    /// Total XP earned by a user
    pub fn total_xp(&self, user: &str) -> u32 {
        self.records
            .iter()
            .filter(|r| r.user == user)
            .map(|r| r.xp)
            .sum()
    }

    /// Completed level ids for a user, oldest first
    pub fn completed_levels(&self, user: &str) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.user == user)
            .map(|r| r.level.as_str())
            .collect()
    }

    /// Load progress from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                if let Ok(book) = serde_json::from_str::<ProgressBook>(&json) {
                    log::info!("Loaded {} progress records", book.records.len());
                    return book;
                }
            }
        }

        log::info!("No progress found, starting fresh");
        Self::new()
    }

    /// Save progress to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) -> Result<(), ServiceError> {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten()
            .ok_or_else(|| ServiceError::Unavailable("LocalStorage".to_string()))?;
        let json = serde_json::to_string(self)?;
        storage
            .set_item(Self::STORAGE_KEY, &json)
            .map_err(|_| ServiceError::Unavailable("LocalStorage write".to_string()))?;
        log::info!("Progress saved ({} records)", self.records.len());
        Ok(())
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::new()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) -> Result<(), ServiceError> {
        // No-op for native
        Ok(())
    }
}

impl ProgressBook {
    /// Append a record and hand the book to `persist`.
    ///
    /// The record is removed again when persisting fails, so a later call
    /// retries the write.
    fn record_with(
        &mut self,
        user: &str,
        level: &str,
        xp: u32,
        timestamp: f64,
        persist: impl FnOnce(&Self) -> Result<(), ServiceError>,
    ) -> Result<bool, ServiceError> {
        if self.is_complete(user, level) {
            log::debug!("Level {} already complete for {}", level, user);
            return Ok(false);
        }
        self.records.push(LevelRecord {
            user: user.to_string(),
            level: level.to_string(),
            xp,
            completed_at: timestamp,
        });
        if let Err(e) = persist(self) {
            self.records.pop();
            return Err(e);
        }
        log::info!("Level {} complete for {} (+{} XP)", level, user, xp);
        Ok(true)
    }
}

impl ProgressStore for ProgressBook {
    fn mark_level_complete(
        &mut self,
        user: &str,
        level: &str,
        xp: u32,
        timestamp: f64,
    ) -> Result<bool, ServiceError> {
        self.record_with(user, level, xp, timestamp, Self::save)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_complete_is_idempotent() {
        let mut book = ProgressBook::new();
        assert!(book.mark_level_complete("ana", "py-1", 50, 1.0).unwrap());
        assert!(!book.mark_level_complete("ana", "py-1", 50, 2.0).unwrap());
        assert_eq!(book.records.len(), 1);
        assert_eq!(book.records[0].completed_at, 1.0);
    }

    #[test]
    fn test_keyed_by_user_and_level() {
        let mut book = ProgressBook::new();
        book.mark_level_complete("ana", "py-1", 50, 1.0).unwrap();
        book.mark_level_complete("ana", "py-2", 70, 2.0).unwrap();
        book.mark_level_complete("bo", "py-1", 50, 3.0).unwrap();
        assert_eq!(book.total_xp("ana"), 120);
        assert_eq!(book.total_xp("bo"), 50);
        assert_eq!(book.completed_levels("ana"), vec!["py-1", "py-2"]);
        assert!(!book.is_complete("bo", "py-2"));
    }

    #[test]
    fn test_failed_save_is_retried() {
        let mut book = ProgressBook::new();
        let err = book
            .record_with("ana", "py-1", 50, 1.0, |_| {
                Err(ServiceError::Unavailable("LocalStorage write".into()))
            })
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
        assert!(!book.is_complete("ana", "py-1"));

        let mut saved = 0;
        let first = book
            .record_with("ana", "py-1", 50, 2.0, |b| {
                saved = b.records.len();
                Ok(())
            })
            .unwrap();
        assert!(first);
        assert_eq!(saved, 1);
        assert_eq!(book.records[0].completed_at, 2.0);
    }

    #[test]
    fn test_round_trips_through_json() {
        let mut book = ProgressBook::new();
        book.mark_level_complete("ana", "py-1", 50, 1.0).unwrap();
        let json = serde_json::to_string(&book).unwrap();
        let back: ProgressBook = serde_json::from_str(&json).unwrap();
        assert_eq!(back.records, book.records);
    }
}
