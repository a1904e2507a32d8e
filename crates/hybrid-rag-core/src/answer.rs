//! Prompt assembly, generation, and cited sources.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{FusedResult, Metadata, OwnerScope};

/// Sentinel answer when the context does not contain the answer.
pub const NO_ANSWER: &str = "I don't know";

/// Maximum characters of chunk text shown per source.
pub const PREVIEW_CHARS: usize = 200;

/// `{context}` and `{input}` are substituted by [`build_prompt`].
pub const PROMPT_TEMPLATE: &str = "Answer the question based ONLY on the following context. \
If you don't know the answer, say \"I don't know\".\n\n\
<context>\n{context}\n</context>\n\n\
Question: {input}";

/// Text-completion collaborator.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

/// One answered query, as sent to a [`TraceSink`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEvent {
    pub owner_id: String,
    pub question: String,
    pub answer: String,
    pub source_count: usize,
    pub generated: bool,
    pub latency_ms: u64,
}

/// Fire-and-forget observability hook. `record` must return without waiting
/// on I/O; its errors are logged and dropped.
pub trait TraceSink: Send + Sync {
    fn record(&self, event: TraceEvent) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRef {
    pub preview: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// Fill [`PROMPT_TEMPLATE`] with the context texts, separated by blank lines.
pub fn build_prompt(question: &str, context: &[FusedResult]) -> String {
    let joined = context
        .iter()
        .map(|r| r.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    // Substitute positionally so placeholder text inside the context is left alone.
    let (head, rest) = PROMPT_TEMPLATE
        .split_once("{context}")
        .unwrap_or((PROMPT_TEMPLATE, ""));
    let (middle, tail) = rest.split_once("{input}").unwrap_or((rest, ""));
    format!("{}{}{}{}{}", head, joined, middle, question, tail)
}

/// First [`PREVIEW_CHARS`] characters, with `...` appended only when cut.
pub fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((i, _)) => format!("{}...", &text[..i]),
        None => text.to_string(),
    }
}

pub struct AnswerAssembler {
    generator: Arc<dyn Generator>,
    tracer: Option<Arc<dyn TraceSink>>,
}

impl AnswerAssembler {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            generator,
            tracer: None,
        }
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn TraceSink>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    /// Answer `question` from `context`.
    ///
    /// With no context the generator is not called and the answer is
    /// [`NO_ANSWER`].
    pub async fn answer(
        &self,
        question: &str,
        owner: &OwnerScope,
        context: &[FusedResult],
    ) -> Result<Answer> {
        let started = Instant::now();

        let (text, generated) = if context.is_empty() {
            info!(owner = %owner, "no context retrieved, skipping generation");
            (NO_ANSWER.to_string(), false)
        } else {
            let prompt = build_prompt(question, context);
            debug!(
                prompt_chars = prompt.chars().count(),
                context_items = context.len(),
                "generating answer"
            );
            let completion = self
                .generator
                .complete(&prompt)
                .await
                .map_err(|e| Error::GenerationFailed(format!("{:#}", e)))?;
            (completion.trim().to_string(), true)
        };

        let sources: Vec<SourceRef> = context
            .iter()
            .map(|r| SourceRef {
                preview: preview(&r.text),
                metadata: r.metadata.clone(),
            })
            .collect();

        if let Some(tracer) = &self.tracer {
            let event = TraceEvent {
                owner_id: owner.as_str().to_string(),
                question: question.to_string(),
                answer: text.clone(),
                source_count: sources.len(),
                generated,
                latency_ms: started.elapsed().as_millis() as u64,
            };
            if let Err(e) = tracer.record(event) {
                debug!(error = %e, "trace sink rejected event");
            }
        }

        Ok(Answer {
            answer: text,
            sources,
        })
    }
}
