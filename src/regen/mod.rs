//! Conversational regeneration: one creator request in, restyled HTML and
//! any generated images out.

pub mod agent;
pub mod observer;
pub mod prompt;
pub mod sanitize;
pub mod session;
pub mod types;

pub use agent::{AgentOutcome, ImageAgentLoop, LoopStopReason};
pub use observer::{NoopObserver, RegenEvent, RegenObserver, TracingObserver};
pub use prompt::{CompiledPrompt, GENERATE_IMAGE_FUNCTION, PromptCompiler, generate_image_tool};
pub use sanitize::sanitize_html;
pub use session::ConversationSession;
pub use types::{HistoryTurn, RegenerationOutput, RegenerationRequest, StyleGuide};

use crate::config::Config;
use crate::error::RegenError;
use crate::images::ImageGenerator;
use crate::llm::{ChatBackend, MessageRole};
use std::sync::Arc;

/// Model parameters for one [`Regenerator`].
#[derive(Debug, Clone)]
pub struct RegenSettings {
    pub model: String,
    pub temperature: f64,
    pub history_window: usize,
    pub max_image_rounds: u32,
}

impl RegenSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.gemini.model.clone(),
            temperature: config.gemini.temperature,
            history_window: config.regen.history_window,
            max_image_rounds: config.regen.max_image_rounds,
        }
    }
}

/// Entry point of the pipeline. Holds no per-turn state, so one instance
/// serves concurrent requests.
pub struct Regenerator {
    backend: Arc<dyn ChatBackend>,
    compiler: PromptCompiler,
    settings: RegenSettings,
    image_generator: Option<Arc<dyn ImageGenerator>>,
    observer: Arc<dyn RegenObserver>,
}

impl Regenerator {
    pub fn new(backend: Arc<dyn ChatBackend>, settings: RegenSettings) -> Result<Self, RegenError> {
        Ok(Self {
            backend,
            compiler: PromptCompiler::new()?,
            settings,
            image_generator: None,
            observer: Arc::new(TracingObserver),
        })
    }

    pub fn with_image_generator(mut self, generator: Arc<dyn ImageGenerator>) -> Self {
        self.image_generator = Some(generator);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RegenObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn settings(&self) -> &RegenSettings {
        &self.settings
    }

    /// Run one turn. Fails fast on a missing credential or invalid input,
    /// before any network call. Failed image calls never surface here; they
    /// are answered inside the exchange.
    pub async fn regenerate(
        &self,
        request: &RegenerationRequest,
    ) -> Result<RegenerationOutput, RegenError> {
        if !self.backend.has_credentials() {
            return Err(RegenError::Configuration(format!(
                "no API key configured for {} (set GEMINI_API_KEY)",
                self.backend.name()
            )));
        }
        validate(request)?;

        let generator = if request.include_images {
            self.image_generator.as_deref()
        } else {
            None
        };
        if request.include_images && generator.is_none() {
            tracing::debug!("images requested but no image generator is configured");
        }
        note_history_drift(request);

        let compiled = self.compiler.compile(
            request,
            self.settings.history_window,
            generator.is_some(),
        )?;
        self.observer.record_event(&RegenEvent::PromptBuilt {
            model: self.settings.model.clone(),
            system_chars: compiled.system_instruction.len(),
            history_turns: compiled.history.len(),
            parts: compiled.parts.len(),
            tools: compiled.tools.iter().map(|t| t.name.clone()).collect(),
        });

        let mut session = ConversationSession::new(
            self.backend.as_ref(),
            &self.settings.model,
            self.settings.temperature,
            compiled.system_instruction,
            compiled.tools,
            compiled.history,
        );
        let first = session.send(compiled.parts).await?;

        let agent = ImageAgentLoop::new(
            generator,
            self.observer.as_ref(),
            self.settings.max_image_rounds,
        );
        let outcome = agent.run(&mut session, first).await?;

        let html = sanitize_html(&outcome.text);
        self.observer.record_event(&RegenEvent::TurnFinalized {
            html_chars: html.len(),
            images: outcome.images.len(),
            rounds: outcome.rounds,
        });

        Ok(RegenerationOutput {
            html,
            images: outcome.images,
            image_rounds: outcome.rounds,
            round_limit_hit: outcome.stop_reason == LoopStopReason::RoundLimit,
        })
    }
}

fn validate(request: &RegenerationRequest) -> Result<(), RegenError> {
    if request.prompt.trim().is_empty() {
        return Err(RegenError::Validation("prompt is required".into()));
    }
    if request.structure.form_id.trim().is_empty() {
        return Err(RegenError::Validation("structure.formId is required".into()));
    }
    if request.submit_url.trim().is_empty() {
        return Err(RegenError::Validation("submit URL is required".into()));
    }
    Ok(())
}

/// The explicit previous HTML is what the model edits; history is context.
fn note_history_drift(request: &RegenerationRequest) {
    if request.previous_html.is_empty() {
        return;
    }
    let last_model_turn = request
        .history
        .iter()
        .rev()
        .find(|turn| turn.role == MessageRole::Model);
    if let Some(turn) = last_model_turn
        && turn.text.trim() != request.previous_html.trim()
    {
        tracing::debug!(
            history_chars = turn.text.len(),
            previous_chars = request.previous_html.len(),
            "previous HTML differs from last model turn; using previous HTML"
        );
    }
}
