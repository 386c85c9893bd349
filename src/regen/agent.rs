use super::observer::{RegenEvent, RegenObserver};
use super::prompt::GENERATE_IMAGE_FUNCTION;
use super::session::ConversationSession;
use crate::config::MAX_IMAGE_ROUNDS_HARD_CAP;
use crate::error::{ImageError, RegenError};
use crate::images::{GeneratedImage, ImageGenerator, ImageRequest};
use crate::llm::{ChatResponse, ContentBlock, FunctionCall, InlineImage};
use serde_json::json;

// ── Public types ─────────────────────────────────────────────────────────────

/// Why the image loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStopReason {
    /// The model answered without requesting more function calls.
    Completed,
    /// The round cap was reached while the model still wanted images.
    RoundLimit,
}

/// Final output of [`ImageAgentLoop::run`].
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    /// Raw text of the last model response, not yet sanitized.
    pub text: String,
    pub images: Vec<GeneratedImage>,
    pub rounds: u32,
    pub stop_reason: LoopStopReason,
}

/// Drives the image function-calling exchange to a final text response.
pub struct ImageAgentLoop<'a> {
    generator: Option<&'a dyn ImageGenerator>,
    observer: &'a dyn RegenObserver,
    max_rounds: u32,
}

// ── Internal types ───────────────────────────────────────────────────────────

enum LoopState {
    AwaitingResponse(ChatResponse),
    Dispatching(Vec<FunctionCall>),
    Done(String, LoopStopReason),
}

/// Messages produced by one dispatch round. Acknowledgments and vision
/// input never share a message.
struct RoundMessages {
    acknowledgments: Vec<ContentBlock>,
    vision: Vec<ContentBlock>,
}

// ── Implementation ───────────────────────────────────────────────────────────

impl<'a> ImageAgentLoop<'a> {
    /// `generator` is `None` when image generation is not permitted; any
    /// call the model makes anyway is answered as unsupported.
    pub fn new(
        generator: Option<&'a dyn ImageGenerator>,
        observer: &'a dyn RegenObserver,
        max_rounds: u32,
    ) -> Self {
        Self {
            generator,
            observer,
            max_rounds: max_rounds.clamp(1, MAX_IMAGE_ROUNDS_HARD_CAP),
        }
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    /// Run from the model's first response until it stops calling
    /// functions or the round cap is hit. Image failures are reported back to
    /// the model; only session failures end the turn with an error.
    pub async fn run(
        &self,
        session: &mut ConversationSession<'_>,
        first: ChatResponse,
    ) -> Result<AgentOutcome, RegenError> {
        let mut images = Vec::new();
        let mut rounds = 0u32;
        let mut state = LoopState::AwaitingResponse(first);

        loop {
            state = match state {
                LoopState::AwaitingResponse(response) => {
                    let calls = response.function_calls();
                    if calls.is_empty() {
                        LoopState::Done(response.text(), LoopStopReason::Completed)
                    } else if rounds >= self.max_rounds {
                        self.observer
                            .record_event(&RegenEvent::RoundLimitReached { rounds });
                        LoopState::Done(response.text(), LoopStopReason::RoundLimit)
                    } else {
                        LoopState::Dispatching(calls)
                    }
                }
                LoopState::Dispatching(calls) => {
                    rounds += 1;
                    let round = self.dispatch_round(rounds, &calls, &mut images).await;

                    let mut response = session.send(round.acknowledgments).await?;
                    if !round.vision.is_empty() {
                        response = session.send(round.vision).await?;
                    }
                    LoopState::AwaitingResponse(response)
                }
                LoopState::Done(text, stop_reason) => {
                    return Ok(AgentOutcome {
                        text,
                        images,
                        rounds,
                        stop_reason,
                    });
                }
            };
        }
    }

    /// Process every call of one round in the model's order.
    async fn dispatch_round(
        &self,
        round: u32,
        calls: &[FunctionCall],
        images: &mut Vec<GeneratedImage>,
    ) -> RoundMessages {
        let mut messages = RoundMessages {
            acknowledgments: Vec::with_capacity(calls.len()),
            vision: Vec::new(),
        };

        for call in calls {
            self.observer.record_event(&RegenEvent::CallDispatched {
                round,
                function: call.name.clone(),
            });

            match self.generate(call).await {
                Ok(image) => {
                    self.observer.record_event(&RegenEvent::ImageReceived {
                        round,
                        kind: image.kind,
                        url: image.url.clone(),
                        mime_type: image.mime_type.clone(),
                    });
                    messages.acknowledgments.push(acknowledgment(
                        call,
                        json!({
                            "url": image.url,
                            "imageType": image.kind,
                            "success": true,
                        }),
                    ));
                    messages.vision.push(ContentBlock::image(InlineImage::new(
                        image.mime_type.clone(),
                        image.base64.clone(),
                    )));
                    messages.vision.push(ContentBlock::text(vision_follow_up_text(&image)));
                    images.push(image);
                }
                Err(e) => {
                    let error = e.to_string();
                    self.observer.record_event(&RegenEvent::ImageFailed {
                        round,
                        error: error.clone(),
                    });
                    messages.acknowledgments.push(acknowledgment(
                        call,
                        json!({
                            "success": false,
                            "error": error,
                        }),
                    ));
                }
            }
        }
        messages
    }

    async fn generate(&self, call: &FunctionCall) -> Result<GeneratedImage, ImageError> {
        let generator = match self.generator {
            Some(generator) if call.name == GENERATE_IMAGE_FUNCTION => generator,
            _ => return Err(ImageError::UnsupportedFunction(call.name.clone())),
        };
        let request = ImageRequest::from_args(&call.args)?;
        generator.generate(&request).await
    }
}

fn acknowledgment(call: &FunctionCall, response: serde_json::Value) -> ContentBlock {
    ContentBlock::FunctionResponse {
        id: call.id.clone(),
        name: call.name.clone(),
        response,
    }
}

fn vision_follow_up_text(image: &GeneratedImage) -> String {
    format!(
        "Above is the generated {} image. Its URL is: {}. Use this exact URL in the HTML. \
         Pick form colors that complement this image.",
        image.kind, image.url
    )
}
