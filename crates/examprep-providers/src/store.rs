//! Attempt storage and mastery tracking over the examprep API.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use examprep_core::history::{AttemptPage, ListQuery};
use examprep_core::model::{AttemptRecord, MasteryUpdate, TestAttempt, UserStats};
use examprep_core::traits::{AttemptStore, MasteryTracker};

use crate::api::ApiClient;

pub struct HttpAttemptStore {
    client: Arc<ApiClient>,
}

impl HttpAttemptStore {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

#[derive(Serialize)]
struct MasteryBody<'a> {
    updates: &'a [MasteryUpdate],
}

#[derive(Serialize)]
struct BookmarkBody {
    bookmarked: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnsweredDates {
    #[serde(default)]
    dates: Vec<NaiveDate>,
}

#[async_trait]
impl AttemptStore for HttpAttemptStore {
    #[instrument(skip(self, record), fields(test_name = %record.test_name, score = record.score))]
    async fn save_attempt(&self, record: &AttemptRecord) -> anyhow::Result<TestAttempt> {
        let url = self.client.url(&["api", "attempts"]);
        Ok(self.client.send_json(Method::POST, url, record).await?)
    }

    #[instrument(skip(self))]
    async fn list_attempts(&self, query: &ListQuery) -> anyhow::Result<AttemptPage> {
        let mut url = self.client.url(&["api", "attempts"]);
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("page", &query.page.to_string())
                .append_pair("limit", &query.limit.to_string())
                .append_pair("sortBy", &query.sort_field.to_string())
                .append_pair("sortOrder", &query.sort_order.to_string());
            if let Some(result) = query.result {
                pairs.append_pair("result", &result.to_string());
            }
        }
        Ok(self.client.get_json(url).await?)
    }

    #[instrument(skip(self))]
    async fn all_attempts(&self) -> anyhow::Result<Vec<TestAttempt>> {
        let url = self.client.url(&["api", "attempts", "all"]);
        Ok(self.client.get_json(url).await?)
    }

    #[instrument(skip(self))]
    async fn user_stats(&self) -> anyhow::Result<UserStats> {
        let url = self.client.url(&["api", "attempts", "stats"]);
        Ok(self.client.get_json(url).await?)
    }

    #[instrument(skip(self))]
    async fn delete_attempt(&self, id: &str) -> anyhow::Result<()> {
        let url = self.client.url(&["api", "attempts", id]);
        Ok(self.client.send_empty(Method::DELETE, url).await?)
    }

    #[instrument(skip(self))]
    async fn restore_attempt(&self, id: &str) -> anyhow::Result<()> {
        let url = self.client.url(&["api", "attempts", id, "restore"]);
        Ok(self.client.send_empty(Method::PATCH, url).await?)
    }

    #[instrument(skip(self))]
    async fn set_bookmark(
        &self,
        attempt_id: &str,
        question_index: usize,
        bookmarked: bool,
    ) -> anyhow::Result<()> {
        let index = question_index.to_string();
        let url = self
            .client
            .url(&["api", "attempts", attempt_id, "responses", &index, "bookmark"]);
        Ok(self
            .client
            .send_json_unit(Method::PATCH, url, &BookmarkBody { bookmarked })
            .await?)
    }
}

#[async_trait]
impl MasteryTracker for HttpAttemptStore {
    #[instrument(skip(self, updates), fields(count = updates.len()))]
    async fn update_mastery(&self, updates: &[MasteryUpdate]) -> anyhow::Result<()> {
        let url = self.client.url(&["api", "mastery"]);
        Ok(self
            .client
            .send_json_unit(Method::POST, url, &MasteryBody { updates })
            .await?)
    }

    #[instrument(skip(self))]
    async fn answered_dates(&self) -> anyhow::Result<Vec<NaiveDate>> {
        let url = self.client.url(&["api", "mastery", "answered-dates"]);
        let response: AnsweredDates = self.client.get_json(url).await?;
        Ok(response.dates)
    }
}
