//! File-backed attempt store for offline practice.
//!
//! Keeps attempts, mastery counts, and answered dates in a single JSON file.
//! Applies the same soft-delete rules as the remote store.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use examprep_core::error::RemoteError;
use examprep_core::history::{self, AttemptPage, ListQuery};
use examprep_core::model::{AttemptRecord, MasteryUpdate, TestAttempt, UserStats};
use examprep_core::traits::{AttemptStore, MasteryTracker};

/// Per-question mastery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mastery {
    pub correct: u32,
    pub attempts: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreData {
    #[serde(default)]
    attempts: Vec<TestAttempt>,
    #[serde(default)]
    answered_dates: BTreeSet<NaiveDate>,
    #[serde(default)]
    mastery: BTreeMap<String, Mastery>,
}

pub struct LocalAttemptStore {
    path: Option<PathBuf>,
    data: Mutex<StoreData>,
    failing_saves: AtomicU32,
    failing_mastery: AtomicBool,
}

impl LocalAttemptStore {
    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::with_data(None, StoreData::default())
    }

    /// Open (or start) the store file at `path`.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let data = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read store: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("failed to parse store: {}", path.display()))?
        } else {
            StoreData::default()
        };
        Ok(Self::with_data(Some(path.to_path_buf()), data))
    }

    fn with_data(path: Option<PathBuf>, data: StoreData) -> Self {
        Self {
            path,
            data: Mutex::new(data),
            failing_saves: AtomicU32::new(0),
            failing_mastery: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Make the next `n` saves fail with a server error.
    pub fn fail_next_saves(&self, n: u32) {
        self.failing_saves.store(n, Ordering::Relaxed);
    }

    /// Make mastery updates fail until switched off.
    pub fn fail_mastery(&self, failing: bool) {
        self.failing_mastery.store(failing, Ordering::Relaxed);
    }

    pub async fn mastery(&self, question_id: &str) -> Option<Mastery> {
        self.data.lock().await.mastery.get(question_id).copied()
    }

    fn persist(&self, data: &StoreData) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(data)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write store: {}", path.display()))?;
        Ok(())
    }

    /// Apply `change` to a copy of the data and keep it only once it is on disk.
    async fn update<T>(
        &self,
        change: impl FnOnce(&mut StoreData) -> anyhow::Result<Option<T>>,
    ) -> anyhow::Result<Option<T>> {
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        let Some(value) = change(&mut next)? else {
            return Ok(None);
        };
        self.persist(&next)?;
        *data = next;
        Ok(Some(value))
    }

    fn take_save_failure(&self) -> bool {
        self.failing_saves
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn not_found(id: &str) -> anyhow::Error {
    RemoteError::NotFound(format!("attempt {id}")).into()
}

#[async_trait]
impl AttemptStore for LocalAttemptStore {
    async fn save_attempt(&self, record: &AttemptRecord) -> anyhow::Result<TestAttempt> {
        if self.take_save_failure() {
            return Err(RemoteError::ApiError {
                status: 503,
                message: "store unavailable".into(),
            }
            .into());
        }

        let attempt = TestAttempt::new(Uuid::new_v4().to_string(), record.clone());
        self.update(|data| {
            data.attempts.push(attempt.clone());
            Ok(Some(()))
        })
        .await?;
        tracing::debug!(attempt_id = %attempt.id, "attempt stored");
        Ok(attempt)
    }

    async fn list_attempts(&self, query: &ListQuery) -> anyhow::Result<AttemptPage> {
        let data = self.data.lock().await;
        Ok(history::list_visible(&data.attempts, query))
    }

    async fn all_attempts(&self) -> anyhow::Result<Vec<TestAttempt>> {
        let mut attempts = self.data.lock().await.attempts.clone();
        attempts.sort_by(|a, b| b.record.completed_at.cmp(&a.record.completed_at));
        Ok(attempts)
    }

    async fn user_stats(&self) -> anyhow::Result<UserStats> {
        let data = self.data.lock().await;
        Ok(history::user_stats(&data.attempts))
    }

    async fn delete_attempt(&self, id: &str) -> anyhow::Result<()> {
        self.update(|data| {
            let attempt = data
                .attempts
                .iter_mut()
                .find(|a| a.id == id)
                .ok_or_else(|| not_found(id))?;
            Ok(history::soft_delete(attempt, Utc::now()).then_some(()))
        })
        .await?;
        Ok(())
    }

    async fn restore_attempt(&self, id: &str) -> anyhow::Result<()> {
        self.update(|data| {
            let attempt = data
                .attempts
                .iter_mut()
                .find(|a| a.id == id)
                .ok_or_else(|| not_found(id))?;
            Ok(history::restore(attempt).then_some(()))
        })
        .await?;
        Ok(())
    }

    async fn set_bookmark(
        &self,
        attempt_id: &str,
        question_index: usize,
        bookmarked: bool,
    ) -> anyhow::Result<()> {
        self.update(|data| {
            let attempt = data
                .attempts
                .iter_mut()
                .find(|a| a.id == attempt_id)
                .ok_or_else(|| not_found(attempt_id))?;
            let response = attempt
                .record
                .responses
                .get_mut(question_index)
                .ok_or_else(|| {
                    RemoteError::NotFound(format!("response {question_index} of {attempt_id}"))
                })?;
            response.bookmarked = bookmarked;
            Ok(Some(()))
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl MasteryTracker for LocalAttemptStore {
    async fn update_mastery(&self, updates: &[MasteryUpdate]) -> anyhow::Result<()> {
        if self.failing_mastery.load(Ordering::Relaxed) {
            return Err(RemoteError::NetworkError("mastery service unreachable".into()).into());
        }

        if updates.is_empty() {
            return Ok(());
        }
        self.update(|data| {
            for update in updates {
                let entry = data.mastery.entry(update.question_id.clone()).or_default();
                entry.attempts += 1;
                if update.is_correct {
                    entry.correct += 1;
                }
            }
            data.answered_dates.insert(Utc::now().date_naive());
            Ok(Some(()))
        })
        .await?;
        Ok(())
    }

    async fn answered_dates(&self) -> anyhow::Result<Vec<NaiveDate>> {
        let data = self.data.lock().await;
        Ok(data.answered_dates.iter().copied().collect())
    }
}
