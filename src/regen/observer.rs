use crate::images::ImageKind;
use tracing::{debug, info, warn};

/// Lifecycle points of one regeneration turn.
#[derive(Debug, Clone, PartialEq)]
pub enum RegenEvent {
    PromptBuilt {
        model: String,
        system_chars: usize,
        history_turns: usize,
        parts: usize,
        tools: Vec<String>,
    },
    CallDispatched {
        round: u32,
        function: String,
    },
    ImageReceived {
        round: u32,
        kind: ImageKind,
        url: String,
        mime_type: String,
    },
    ImageFailed {
        round: u32,
        error: String,
    },
    RoundLimitReached {
        rounds: u32,
    },
    TurnFinalized {
        html_chars: usize,
        images: usize,
        rounds: u32,
    },
}

/// Receives [`RegenEvent`]s from the orchestrator and the agent loop.
pub trait RegenObserver: Send + Sync {
    fn record_event(&self, event: &RegenEvent);

    fn name(&self) -> &str;
}

/// Forwards events to `tracing` as structured fields.
pub struct TracingObserver;

impl RegenObserver for TracingObserver {
    fn record_event(&self, event: &RegenEvent) {
        match event {
            RegenEvent::PromptBuilt {
                model,
                system_chars,
                history_turns,
                parts,
                tools,
            } => {
                info!(
                    model = %model,
                    system_chars,
                    history_turns,
                    parts,
                    tools = ?tools,
                    "regen.prompt_built"
                );
            }
            RegenEvent::CallDispatched { round, function } => {
                debug!(round, function = %function, "regen.call_dispatched");
            }
            RegenEvent::ImageReceived {
                round,
                kind,
                url,
                mime_type,
            } => {
                info!(round, kind = %kind, url = %url, mime = %mime_type, "regen.image_received");
            }
            RegenEvent::ImageFailed { round, error } => {
                warn!(round, error = %error, "regen.image_failed");
            }
            RegenEvent::RoundLimitReached { rounds } => {
                warn!(rounds, "regen.round_limit_reached");
            }
            RegenEvent::TurnFinalized {
                html_chars,
                images,
                rounds,
            } => {
                info!(html_chars, images, rounds, "regen.turn_finalized");
            }
        }
    }

    fn name(&self) -> &str {
        "tracing"
    }
}

/// Discards every event.
pub struct NoopObserver;

impl RegenObserver for NoopObserver {
    #[inline(always)]
    fn record_event(&self, _event: &RegenEvent) {}

    fn name(&self) -> &str {
        "noop"
    }
}
