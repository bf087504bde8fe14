//! Narration step generation.
//!
//! One chat completion request produces the activity and its ordered steps. The
//! response is parsed as returned: no repair, and step counts other than
//! [`STEP_COUNT`] are accepted with a warning.

use std::sync::Arc;

use clipmaker_core::{ChatConfig, StepPlan};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::client::{ChatCompletion, ChatMessage, ChatRequest, ResponseFormat};
use crate::error::{AgentError, Result};
use crate::prompts::{steps_prompt, system_prompt, STEP_COUNT};

/// Top-level shape of the JSON the model is asked for.
#[derive(Debug, Deserialize)]
struct StepsEnvelope {
    #[serde(default)]
    activities: Vec<StepPlan>,
}

/// Asks a language model for the narration script.
pub struct StepGenerator {
    client: Arc<dyn ChatCompletion>,
    model: String,
    temperature: f32,
    topic: String,
    product: String,
}

impl StepGenerator {
    /// Create a generator from a chat backend and its configuration.
    pub fn new(client: Arc<dyn ChatCompletion>, config: &ChatConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
            topic: config.topic.clone(),
            product: config.product.clone(),
        }
    }

    /// Build the request sent to the model.
    pub fn request(&self) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(system_prompt(&self.topic, &self.product)),
                ChatMessage::user(steps_prompt(&self.topic, &self.product)),
            ],
            temperature: Some(self.temperature),
            response_format: Some(ResponseFormat::json_object()),
        }
    }

    /// Generate the first activity and its steps.
    pub async fn generate(&self) -> Result<StepPlan> {
        let response = self.client.complete(self.request()).await?;

        let content = response
            .content()
            .filter(|c| !c.trim().is_empty())
            .ok_or(AgentError::EmptyContent)?;
        debug!(content = %content, "Step generator raw response");

        let plan = parse_steps(content)?;
        if plan.steps.len() != STEP_COUNT {
            warn!(
                expected = STEP_COUNT,
                actual = plan.steps.len(),
                "Model returned an unexpected number of steps"
            );
        }
        info!(activity = %plan.activity, steps = plan.steps.len(), "Narration steps generated");
        Ok(plan)
    }
}

/// Parse the model's JSON into the first activity.
pub fn parse_steps(content: &str) -> Result<StepPlan> {
    let envelope: StepsEnvelope = serde_json::from_str(content)?;
    envelope
        .activities
        .into_iter()
        .next()
        .ok_or(AgentError::NoActivity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ChatChoice, ChatResponse, ResponseMessage};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeChat {
        content: Option<String>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl FakeChat {
        fn new(content: Option<&str>) -> Self {
            Self {
                content: content.map(String::from),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatCompletion for FakeChat {
        async fn complete(&self, request: ChatRequest) -> Result<ChatResponse> {
            self.seen.lock().unwrap().push(request);
            Ok(ChatResponse {
                choices: vec![ChatChoice {
                    message: ResponseMessage {
                        content: self.content.clone(),
                    },
                    finish_reason: Some("stop".into()),
                }],
                usage: None,
            })
        }
    }

    const FOUR_STEPS: &str = r#"{
        "activities": [{
            "activity": "Meditation for Inner Peace",
            "description": "A journey to tranquility.",
            "steps": [
                {"step": "Step 1", "details": "Find a quiet place."},
                {"step": "Step 2", "details": "Breathe deeply."},
                {"step": "Step 3", "details": "Take your NAD+ supplement."},
                {"step": "Step 4", "details": "Rest in stillness."}
            ]
        }]
    }"#;

    fn generator(fake: Arc<FakeChat>) -> StepGenerator {
        StepGenerator::new(fake, &ChatConfig::new("test-key"))
    }

    #[tokio::test]
    async fn test_generate_parses_steps_in_order() {
        let fake = Arc::new(FakeChat::new(Some(FOUR_STEPS)));
        let plan = generator(fake.clone()).generate().await.unwrap();

        assert_eq!(plan.activity, "Meditation for Inner Peace");
        let labels: Vec<_> = plan.steps.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, ["Step 1", "Step 2", "Step 3", "Step 4"]);
        assert!(plan.steps[2].text.contains("NAD+"));

        let seen = fake.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model, "gpt-4o");
        assert_eq!(seen[0].temperature, Some(0.7));
        assert_eq!(seen[0].response_format, Some(ResponseFormat::json_object()));
        assert_eq!(seen[0].messages[0].role, "system");
        assert!(seen[0].messages[1].content.contains("third step must mention NAD+"));
    }

    #[tokio::test]
    async fn test_generate_null_content() {
        let fake = Arc::new(FakeChat::new(None));
        let err = generator(fake).generate().await.unwrap_err();
        assert!(matches!(err, AgentError::EmptyContent));
    }

    #[tokio::test]
    async fn test_generate_invalid_json() {
        let fake = Arc::new(FakeChat::new(Some("Here are your steps: 1. Breathe")));
        let err = generator(fake).generate().await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidJson(_)));
    }

    #[tokio::test]
    async fn test_generate_accepts_other_step_counts() {
        let fake = Arc::new(FakeChat::new(Some(
            r#"{"activities":[{"activity":"A","description":"B","steps":[{"step":"Step 1","details":"Only one."}]}]}"#,
        )));
        let plan = generator(fake).generate().await.unwrap();
        assert_eq!(plan.steps.len(), 1);
    }

    #[test]
    fn test_parse_steps_no_activity() {
        assert!(matches!(
            parse_steps(r#"{"activities": []}"#),
            Err(AgentError::NoActivity)
        ));
        assert!(matches!(parse_steps("{}"), Err(AgentError::NoActivity)));
    }

    #[test]
    fn test_parse_steps_takes_first_activity() {
        let plan = parse_steps(
            r#"{"activities": [
                {"activity": "First", "steps": []},
                {"activity": "Second", "steps": []}
            ]}"#,
        )
        .unwrap();
        assert_eq!(plan.activity, "First");
    }
}
