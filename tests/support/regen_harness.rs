#![allow(dead_code, clippy::needless_lifetimes)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Value, json};

use formrestyler::error::ImageError;
use formrestyler::form::{FormQuestion, FormStructure, QuestionKind};
use formrestyler::images::{GeneratedImage, ImageGenerator, ImageKind, ImageRequest};
use formrestyler::llm::{
    ChatBackend, ChatMessage, ChatRequest, ChatResponse, ContentBlock, FunctionCall, ToolSpec,
};
use formrestyler::regen::{RegenEvent, RegenObserver, RegenSettings};

pub const SUBMIT_URL: &str = "http://localhost:3000/api/submit/1FAIpQLSe";

/// What one backend call received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system_instruction: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
}

impl RecordedCall {
    /// The message this call added on top of the transcript.
    pub fn last_message(&self) -> &ChatMessage {
        self.messages.last().expect("call carried no messages")
    }
}

/// `ChatBackend` that replays scripted responses in order.
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<anyhow::Result<ChatResponse>>>,
    calls: Mutex<Vec<RecordedCall>>,
    credentials: bool,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<ChatResponse>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            calls: Mutex::new(Vec::new()),
            credentials: true,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([Err(anyhow::anyhow!(message.to_string()))])),
            calls: Mutex::new(Vec::new()),
            credentials: true,
        }
    }

    pub fn without_credentials() -> Self {
        Self {
            credentials: false,
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl ChatBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn has_credentials(&self) -> bool {
        self.credentials
    }

    fn generate<'a>(
        &'a self,
        request: ChatRequest<'a>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ChatResponse>> + Send + 'a>> {
        self.calls.lock().unwrap().push(RecordedCall {
            system_instruction: request.system_instruction.to_string(),
            messages: request.messages.to_vec(),
            tools: request.tools.to_vec(),
        });
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("script exhausted")));
        Box::pin(async move { reply })
    }
}

/// `ImageGenerator` that returns scripted results and records requests.
pub struct ScriptedImages {
    results: Mutex<VecDeque<Result<GeneratedImage, ImageError>>>,
    requests: Mutex<Vec<ImageRequest>>,
    calls: AtomicUsize,
}

impl ScriptedImages {
    pub fn new(results: Vec<Result<GeneratedImage, ImageError>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Succeeds for every call with a fresh URL.
    pub fn always_ok() -> Self {
        Self::new(Vec::new())
    }

    pub fn requests(&self) -> Vec<ImageRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ImageGenerator for ScriptedImages {
    fn generate<'a>(
        &'a self,
        request: &'a ImageRequest,
    ) -> Pin<Box<dyn Future<Output = Result<GeneratedImage, ImageError>> + Send + 'a>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let result = self
            .results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(image(request.kind, &format!("https://cdn.test/img-{n}.png"))));
        Box::pin(async move { result })
    }
}

/// Observer that keeps every event for assertions.
#[derive(Default)]
pub struct CapturingObserver {
    events: Mutex<Vec<RegenEvent>>,
}

impl CapturingObserver {
    pub fn events(&self) -> Vec<RegenEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl RegenObserver for CapturingObserver {
    fn record_event(&self, event: &RegenEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn name(&self) -> &str {
        "capture"
    }
}

pub fn image(kind: ImageKind, url: &str) -> GeneratedImage {
    GeneratedImage {
        url: url.to_string(),
        kind,
        base64: "iVBORw0KGgo=".to_string(),
        mime_type: "image/png".to_string(),
    }
}

pub fn image_call(id: &str, args: Value) -> ContentBlock {
    ContentBlock::FunctionCall(FunctionCall {
        id: Some(id.to_string()),
        name: "generate_image".to_string(),
        args,
        thought_signature: None,
    })
}

pub fn header_args() -> Value {
    json!({
        "prompt": "sunrise over soft hills",
        "imageType": "header",
        "colorPalette": "peach, cream",
        "aspectRatio": "16:9",
    })
}

pub fn calls_response(blocks: Vec<ContentBlock>) -> ChatResponse {
    ChatResponse::from_blocks(blocks)
}

pub fn settings(max_image_rounds: u32) -> RegenSettings {
    RegenSettings {
        model: "gemini-test".to_string(),
        temperature: 1.0,
        history_window: 10,
        max_image_rounds,
    }
}

/// Two-question RSVP form with one question the renderer does not support.
pub fn rsvp_form() -> FormStructure {
    FormStructure::new(
        "1FAIpQLSe",
        "Party RSVP",
        "Let us know if you can make it",
        vec![
            FormQuestion::new("0", "entry.111", "Your name", QuestionKind::ShortAnswer)
                .required(true),
            FormQuestion::new("1", "entry.222", "Attending?", QuestionKind::MultipleChoice)
                .with_options(["Yes", "No"]),
            FormQuestion::new("2", "entry.333", "Upload a photo", QuestionKind::Unknown),
        ],
    )
}

pub fn text_blocks(message: &ChatMessage) -> Vec<String> {
    message
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text.clone()),
            _ => None,
        })
        .collect()
}
