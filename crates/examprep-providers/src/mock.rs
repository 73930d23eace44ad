//! Scripted question generator for testing sessions without a live API.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use examprep_core::error::RemoteError;
use examprep_core::traits::{
    GenerateQuestionRequest, GenerateQuestionResponse, GeneratedQuestion, QuestionGenerator,
};

/// One scripted generator reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// A successful response carrying this question.
    Question(GeneratedQuestion),
    /// A response returned verbatim, for malformed payloads.
    Raw(GenerateQuestionResponse),
    Error(RemoteError),
}

/// A mock generator that plays back a script, then synthesizes unique
/// questions once the script runs out.
pub struct MockGenerator {
    script: Mutex<VecDeque<MockReply>>,
    delay: Option<Duration>,
    call_count: AtomicU32,
    last_request: Mutex<Option<GenerateQuestionRequest>>,
}

impl MockGenerator {
    pub fn new(script: Vec<MockReply>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            delay: None,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// A generator that only synthesizes questions.
    pub fn synthetic() -> Self {
        Self::new(Vec::new())
    }

    /// Wait this long before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<GenerateQuestionRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// A well-formed question whose text embeds `n`.
    pub fn question(n: u32, category: &str) -> GeneratedQuestion {
        GeneratedQuestion {
            question: Some(format!("Practice question {n}: which option is correct?")),
            options: serde_json::json!(["First", "Second", "Third", "Fourth"]),
            answer: serde_json::json!(n as usize % 4),
            category: Some(category.to_string()),
            explanation: Some(format!("Option {} is correct.", n as usize % 4 + 1)),
            id: serde_json::json!(format!("mock-{n}")),
            ..Default::default()
        }
    }
}

#[async_trait]
impl QuestionGenerator for MockGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(
        &self,
        request: &GenerateQuestionRequest,
    ) -> anyhow::Result<GenerateQuestionResponse> {
        let n = self.call_count.fetch_add(1, Ordering::Relaxed) + 1;
        *self.last_request.lock().unwrap_or_else(|e| e.into_inner()) = Some(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        let category = request
            .categories
            .first()
            .map(String::as_str)
            .unwrap_or("General Information");

        match reply {
            Some(MockReply::Question(q)) => Ok(GenerateQuestionResponse {
                success: true,
                questions: vec![q],
            }),
            Some(MockReply::Raw(response)) => Ok(response),
            Some(MockReply::Error(e)) => Err(e.into()),
            None => Ok(GenerateQuestionResponse {
                success: true,
                questions: vec![Self::question(n, category)],
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use examprep_core::error::is_auth_failure;
    use uuid::Uuid;

    fn request() -> GenerateQuestionRequest {
        GenerateQuestionRequest {
            categories: vec!["Clerical Ability".into()],
            avoid_list: vec![],
            session_id: Uuid::nil(),
            question_number: 1,
        }
    }

    #[tokio::test]
    async fn plays_script_then_synthesizes() {
        let generator = MockGenerator::new(vec![
            MockReply::Error(RemoteError::Unauthorized("expired".into())),
            MockReply::Raw(GenerateQuestionResponse::default()),
        ]);

        let err = generator.generate(&request()).await.unwrap_err();
        assert!(is_auth_failure(&err));

        let raw = generator.generate(&request()).await.unwrap();
        assert!(!raw.success);

        let synthetic = generator.generate(&request()).await.unwrap();
        assert!(synthetic.success);
        assert_eq!(
            synthetic.questions[0].category.as_deref(),
            Some("Clerical Ability")
        );
        assert_eq!(generator.call_count(), 3);
        assert_eq!(generator.last_request().unwrap().question_number, 1);
    }

    #[tokio::test]
    async fn synthetic_questions_are_distinct() {
        let generator = MockGenerator::synthetic();
        let a = generator.generate(&request()).await.unwrap();
        let b = generator.generate(&request()).await.unwrap();
        assert_ne!(a.questions[0].question, b.questions[0].question);
    }
}
