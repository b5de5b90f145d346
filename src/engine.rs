//! Answer engine
//!
//! Turns a user question into a grounded prompt, asks the model, and maps
//! whatever comes back onto a reply the user can read. The engine never
//! fails: errors become one of two fixed apology strings.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::gemini::GeminiClient;
use crate::knowledge::KnowledgeBase;

/// Reply when the model call itself failed.
pub const ERROR_FALLBACK: &str =
    "Sorry, I encountered an error while processing your request. Please try again later.";

/// Reply when the model answered but produced no usable text.
pub const EMPTY_FALLBACK: &str =
    "Sorry, I could not generate a response. Please try rephrasing your question.";

pub const SYSTEM_INSTRUCTION: &str = "You are a helpful and polite expert assistant. \
Answer the user's question using ONLY the information from the text provided below. \
If the answer is not in the text, say clearly that you do not have this information. \
Do not invent information. \
Always answer in the same language as the user's question.";

const KB_START: &str = "--- START OF TEXT ---";
const KB_END: &str = "--- END OF TEXT ---";

/// Result of a single model call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    /// Answer text, `None` when the model returned nothing usable.
    pub text: Option<String>,
    /// Finish or block reason reported by the API, if any.
    pub finish_reason: Option<String>,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            finish_reason: None,
        }
    }
}

/// A hosted model that completes a single prompt.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Completion>;
}

/// Build the grounded prompt sent for every question.
pub fn build_prompt(knowledge_base: &str, question: &str) -> String {
    format!(
        "{SYSTEM_INSTRUCTION}\n\n\
         {KB_START}\n{knowledge_base}\n{KB_END}\n\n\
         User's question: {question}"
    )
}

/// Question answering over the knowledge base
#[derive(Clone)]
pub struct AuraEngine {
    knowledge_base: KnowledgeBase,
    model: Arc<dyn LanguageModel>,
}

impl AuraEngine {
    /// Create an engine backed by Gemini.
    pub fn new(config: &Config, knowledge_base: KnowledgeBase) -> Result<Self> {
        let client = GeminiClient::from_config(config)?;
        info!("AuraEngine initialized with model {}", client.model());
        Ok(Self::with_model(Arc::new(client), knowledge_base))
    }

    pub fn with_model(model: Arc<dyn LanguageModel>, knowledge_base: KnowledgeBase) -> Self {
        Self {
            knowledge_base,
            model,
        }
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.knowledge_base
    }

    /// Answer a question. Always returns something to show the user.
    pub async fn get_response(&self, question: &str) -> String {
        info!("Engine received question ({} chars)", question.chars().count());
        let prompt = build_prompt(&self.knowledge_base, question);

        match self.model.generate(&prompt).await {
            Ok(Completion { text: Some(text), .. }) if !text.trim().is_empty() => text,
            Ok(completion) => {
                warn!(
                    "Model returned no usable text (reason: {})",
                    completion.finish_reason.as_deref().unwrap_or("unknown")
                );
                EMPTY_FALLBACK.to_string()
            }
            Err(e) => {
                error!("Error calling the model API: {:#}", e);
                ERROR_FALLBACK.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tracing_test::traced_test;

    /// Model stub returning a canned outcome and recording prompts.
    struct StubModel {
        outcome: fn() -> Result<Completion>,
        prompts: Mutex<Vec<String>>,
    }

    impl StubModel {
        fn new(outcome: fn() -> Result<Completion>) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for StubModel {
        async fn generate(&self, prompt: &str) -> Result<Completion> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            (self.outcome)()
        }
    }

    fn engine(model: Arc<StubModel>) -> AuraEngine {
        AuraEngine::with_model(model, KnowledgeBase::new("Test knowledge base."))
    }

    #[test]
    fn test_prompt_embeds_everything_verbatim() {
        let kb = "Line one.\n  Indented: F4 = no flame\n\nÜmlaut";
        let question = "  Was bedeutet F4?  ";
        let prompt = build_prompt(kb, question);

        assert!(prompt.contains(kb));
        assert!(prompt.contains(question));
        assert!(prompt.contains(SYSTEM_INSTRUCTION));
        assert!(prompt.contains("You are a helpful and polite expert assistant"));

        let start = prompt.find(KB_START).unwrap();
        let end = prompt.find(KB_END).unwrap();
        assert!(start < prompt.find(kb).unwrap());
        assert!(prompt.find(kb).unwrap() < end);
    }

    #[tokio::test]
    async fn test_returns_model_text_unchanged() {
        let model = StubModel::new(|| Ok(Completion::text("  Mocked Gemini Response\n")));
        let answer = engine(model.clone()).get_response("What is the test question?").await;

        assert_eq!(answer, "  Mocked Gemini Response\n");

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Test knowledge base."));
        assert!(prompts[0].contains("What is the test question?"));
    }

    #[tokio::test]
    async fn test_missing_text_uses_empty_fallback() {
        let model = StubModel::new(|| {
            Ok(Completion {
                text: None,
                finish_reason: Some("SAFETY".into()),
            })
        });
        assert_eq!(engine(model).get_response("q").await, EMPTY_FALLBACK);
    }

    #[tokio::test]
    async fn test_blank_text_uses_empty_fallback() {
        let model = StubModel::new(|| Ok(Completion::text("   \n")));
        assert_eq!(engine(model).get_response("q").await, EMPTY_FALLBACK);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_model_error_uses_error_fallback_and_logs_once() {
        let model = StubModel::new(|| Err(anyhow::anyhow!("quota exceeded for project")));
        let answer = engine(model).get_response("q").await;

        assert_eq!(answer, ERROR_FALLBACK);
        assert!(logs_contain("quota exceeded for project"));
        logs_assert(|lines: &[&str]| {
            let errors = lines.iter().filter(|l| l.contains("ERROR")).count();
            if errors == 1 {
                Ok(())
            } else {
                Err(format!("expected 1 error line, got {}", errors))
            }
        });
    }

    #[tokio::test]
    async fn test_empty_question_is_passed_through() {
        let model = StubModel::new(|| Ok(Completion::text("ok")));
        let answer = engine(model.clone()).get_response("").await;

        assert_eq!(answer, "ok");
        assert!(model.prompts.lock().unwrap()[0].ends_with("User's question: "));
    }

    #[test]
    fn test_fallbacks_are_distinct() {
        assert_ne!(ERROR_FALLBACK, EMPTY_FALLBACK);
        assert!(ERROR_FALLBACK.contains("encountered an error"));
        assert!(EMPTY_FALLBACK.contains("could not generate a response"));
    }
}
