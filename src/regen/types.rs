use crate::form::FormStructure;
use crate::images::GeneratedImage;
use crate::llm::{InlineImage, MessageRole};
use serde::{Deserialize, Serialize};

/// One replayed conversation turn. Model turns carry the full HTML they
/// produced, so the history doubles as the version history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: MessageRole,
    pub text: String,
}

impl HistoryTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Model,
            text: text.into(),
        }
    }
}

/// Reference image used to bias the visual style. Never embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleGuide {
    /// `data:image/...;base64,` URL or bare base64.
    pub image_base64: String,
    #[serde(default)]
    pub focus_note: String,
}

impl StyleGuide {
    pub fn image(&self) -> InlineImage {
        InlineImage::from_data_url(&self.image_base64)
    }
}

/// Everything one regeneration turn needs.
#[derive(Debug, Clone)]
pub struct RegenerationRequest {
    pub structure: FormStructure,
    pub prompt: String,
    pub history: Vec<HistoryTurn>,
    /// HTML currently shown to the creator. Empty on the first turn.
    pub previous_html: String,
    /// Endpoint the rendered form posts its answers to.
    pub submit_url: String,
    /// Selection-region screenshot of the live preview.
    pub screenshot: Option<InlineImage>,
    pub style_guide: Option<StyleGuide>,
    pub include_images: bool,
    /// Images the caller says are embedded in the current HTML, in order.
    pub active_images: Vec<GeneratedImage>,
}

impl RegenerationRequest {
    pub fn new(
        structure: FormStructure,
        prompt: impl Into<String>,
        submit_url: impl Into<String>,
    ) -> Self {
        Self {
            structure,
            prompt: prompt.into(),
            history: Vec::new(),
            previous_html: String::new(),
            submit_url: submit_url.into(),
            screenshot: None,
            style_guide: None,
            include_images: false,
            active_images: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<HistoryTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_previous_html(mut self, html: impl Into<String>) -> Self {
        self.previous_html = html.into();
        self
    }

    pub fn with_screenshot(mut self, screenshot: InlineImage) -> Self {
        self.screenshot = Some(screenshot);
        self
    }

    pub fn with_style_guide(mut self, style_guide: StyleGuide) -> Self {
        self.style_guide = Some(style_guide);
        self
    }

    pub fn with_images(mut self, include_images: bool) -> Self {
        self.include_images = include_images;
        self
    }

    pub fn with_active_images(mut self, images: Vec<GeneratedImage>) -> Self {
        self.active_images = images;
        self
    }
}

/// Result of a successful turn. `images` is always present, possibly empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerationOutput {
    pub html: String,
    pub images: Vec<GeneratedImage>,
    pub image_rounds: u32,
    pub round_limit_hit: bool,
}
