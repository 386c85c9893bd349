use crate::error::RegenError;
use crate::llm::{
    ChatBackend, ChatMessage, ChatRequest, ChatResponse, ContentBlock, ToolSpec,
    sanitize_api_error,
};

/// Multi-turn exchange with a [`ChatBackend`] for one regeneration call.
///
/// The backend is stateless, so the session keeps the transcript: the
/// replayed history window followed by every message sent and received
/// during this call. Sessions are never shared between calls.
pub struct ConversationSession<'a> {
    backend: &'a dyn ChatBackend,
    model: &'a str,
    temperature: f64,
    system_instruction: String,
    tools: Vec<ToolSpec>,
    transcript: Vec<ChatMessage>,
    sent: usize,
}

impl<'a> ConversationSession<'a> {
    pub fn new(
        backend: &'a dyn ChatBackend,
        model: &'a str,
        temperature: f64,
        system_instruction: String,
        tools: Vec<ToolSpec>,
        history: Vec<ChatMessage>,
    ) -> Self {
        Self {
            backend,
            model,
            temperature,
            system_instruction,
            tools,
            transcript: history,
            sent: 0,
        }
    }

    /// Send one user message and wait for the model's reply.
    ///
    /// A transport or provider failure, or a reply with no usable content,
    /// is fatal for the turn. The failed message is not kept.
    pub async fn send(&mut self, parts: Vec<ContentBlock>) -> Result<ChatResponse, RegenError> {
        if parts.is_empty() {
            return Err(RegenError::Validation("cannot send an empty message".into()));
        }
        self.transcript.push(ChatMessage::user(parts));

        let request = ChatRequest {
            model: self.model,
            system_instruction: &self.system_instruction,
            messages: &self.transcript,
            tools: &self.tools,
            temperature: self.temperature,
        };

        let result = self.backend.generate(request).await;
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.transcript.pop();
                return Err(RegenError::Upstream(sanitize_api_error(&format!("{e:#}"))));
            }
        };

        if response.is_empty() {
            self.transcript.pop();
            return Err(RegenError::Upstream(format!(
                "{} returned no content parts (finish reason: {})",
                self.backend.name(),
                response.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        self.sent += 1;
        self.transcript.push(response.to_model_message());
        tracing::debug!(
            backend = self.backend.name(),
            sent = self.sent,
            function_calls = response.has_function_calls(),
            input_tokens = ?response.input_tokens,
            output_tokens = ?response.output_tokens,
            "session round trip"
        );
        Ok(response)
    }

    /// Messages successfully sent during this call.
    pub fn sent_count(&self) -> usize {
        self.sent
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }
}
