use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Instant;

use csf_core::{
    build_prompt, classify_intent, ChatRequest, ChatResponse, Intent, ResponseSanitizer,
    SYSTEM_INSTRUCTION,
};
use csf_llm::{LanguageModel, LlmError};
use csf_observability::AppMetrics;
use csf_retrieval::{join_passages, ReferenceRetriever, DEFAULT_TOP_K};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{error, info, instrument, Instrument};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Upstream(#[from] LlmError),

    #[error("reference retrieval failed")]
    Retrieval(#[source] Box<dyn StdError + Send + Sync + 'static>),

    #[error("language model task was interrupted")]
    Interrupted(#[from] JoinError),
}

/// Per-request handler: classify, refuse or answer, sanitize.
///
/// Holds no per-request state; one instance serves every concurrent chat.
#[derive(Clone)]
pub struct ChatOrchestrator {
    model: Arc<dyn LanguageModel>,
    retriever: Option<Arc<dyn ReferenceRetriever>>,
    reference_top_k: usize,
    sanitizer: ResponseSanitizer,
    metrics: Arc<AppMetrics>,
}

impl ChatOrchestrator {
    pub fn new(model: Arc<dyn LanguageModel>, metrics: Arc<AppMetrics>) -> Self {
        Self {
            model,
            retriever: None,
            reference_top_k: DEFAULT_TOP_K,
            sanitizer: ResponseSanitizer::default(),
            metrics,
        }
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn ReferenceRetriever>, top_k: usize) -> Self {
        self.retriever = Some(retriever);
        self.reference_top_k = top_k.max(1);
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: ResponseSanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    pub fn retrieval_enabled(&self) -> bool {
        self.retriever.is_some()
    }

    pub fn metrics(&self) -> &Arc<AppMetrics> {
        &self.metrics
    }

    #[instrument(skip_all, fields(chat_id = %Uuid::new_v4()))]
    pub async fn handle_chat(&self, request: ChatRequest) -> Result<ChatResponse, ChatError> {
        let started = Instant::now();
        self.metrics.inc_request();

        let intent = classify_intent(&request.message);

        if intent.is_out_of_scope() {
            self.metrics.inc_refusal();
            self.metrics.observe_latency(started.elapsed());
            info!(intent = intent.as_str(), outcome = "refused", "chat handled");
            return Ok(ChatResponse::refusal());
        }

        let result = self.answer(intent, request.message).await;
        let elapsed = started.elapsed();
        self.metrics.observe_latency(elapsed);

        match &result {
            Ok(_) => info!(
                intent = intent.as_str(),
                outcome = "answered",
                latency_ms = elapsed.as_millis() as u64,
                "chat handled"
            ),
            Err(failure) => error!(
                intent = intent.as_str(),
                outcome = "error",
                latency_ms = elapsed.as_millis() as u64,
                error = %error_chain(failure),
                "chat failed"
            ),
        }

        result
    }

    async fn answer(&self, intent: Intent, message: String) -> Result<ChatResponse, ChatError> {
        let reference = self.retrieve_reference(&message)?;
        let prompt = build_prompt(&message, SYSTEM_INSTRUCTION, reference.as_deref());

        self.metrics.inc_llm_call();
        let model = Arc::clone(&self.model);
        // A dropped request must not cancel the upstream call; it runs to completion.
        let completion =
            tokio::spawn(async move { model.complete(&prompt).await }.in_current_span()).await;

        let raw = match completion {
            Ok(Ok(text)) => text,
            Ok(Err(failure)) => {
                self.metrics.inc_llm_failure();
                return Err(failure.into());
            }
            Err(join_error) => {
                self.metrics.inc_llm_failure();
                return Err(join_error.into());
            }
        };

        Ok(ChatResponse {
            agent_mode: intent.into(),
            response: self.sanitizer.sanitize(&raw),
        })
    }

    fn retrieve_reference(&self, message: &str) -> Result<Option<String>, ChatError> {
        let Some(retriever) = self.retriever.as_ref() else {
            return Ok(None);
        };

        let passages = retriever
            .search(message, self.reference_top_k)
            .map_err(|failure| ChatError::Retrieval(failure.into()))?;
        self.metrics.add_retrieval_hits(passages.len());

        if passages.is_empty() {
            Ok(None)
        } else {
            Ok(Some(join_passages(&passages)))
        }
    }
}

/// Renders an error with its full source chain, outermost first.
pub fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
