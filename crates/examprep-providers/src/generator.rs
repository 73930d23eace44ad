//! Question generation over the examprep API.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use tracing::instrument;

use examprep_core::traits::{GenerateQuestionRequest, GenerateQuestionResponse, QuestionGenerator};

use crate::api::ApiClient;

/// Requests one question at a time from `POST /api/questions/generate`.
pub struct HttpQuestionGenerator {
    client: Arc<ApiClient>,
}

impl HttpQuestionGenerator {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QuestionGenerator for HttpQuestionGenerator {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(
        skip(self, request),
        fields(
            question_number = request.question_number,
            avoid = request.avoid_list.len()
        )
    )]
    async fn generate(
        &self,
        request: &GenerateQuestionRequest,
    ) -> anyhow::Result<GenerateQuestionResponse> {
        let url = self.client.url(&["api", "questions", "generate"]);
        let response: GenerateQuestionResponse =
            self.client.send_json(Method::POST, url, request).await?;
        tracing::debug!(
            success = response.success,
            questions = response.questions.len(),
            "generator responded"
        );
        Ok(response)
    }
}
