use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_IMAGE_MIME: &str = "image/png";

/// Base64 image payload sent to (or received from) the model inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

impl InlineImage {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Accept either a `data:image/...;base64,` URL or bare base64 (assumed PNG).
    pub fn from_data_url(raw: &str) -> Self {
        if let Some(rest) = raw.strip_prefix("data:")
            && let Some((mime, data)) = rest.split_once(";base64,")
            && mime.starts_with("image/")
        {
            return Self::new(mime, data);
        }
        Self::new(DEFAULT_IMAGE_MIME, raw)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A model-initiated request to run a declared function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Value,
    /// Opaque reasoning signature that must be replayed with the call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        image: InlineImage,
    },
    FunctionCall(FunctionCall),
    FunctionResponse {
        id: Option<String>,
        name: String,
        response: Value,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(image: InlineImage) -> Self {
        Self::Image { image }
    }

    pub fn is_function_response(&self) -> bool {
        matches!(self, Self::FunctionResponse { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: Vec<ContentBlock>,
}

impl ChatMessage {
    pub fn user(content: Vec<ContentBlock>) -> Self {
        Self {
            role: MessageRole::User,
            content,
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::user(vec![ContentBlock::text(text)])
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Model,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Concatenated text blocks, ignoring images and function traffic.
    pub fn text(&self) -> String {
        join_text(&self.content)
    }
}

/// Function the model may call, described with a JSON schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// One round trip's input.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub system_instruction: &'a str,
    pub messages: &'a [ChatMessage],
    pub tools: &'a [ToolSpec],
    pub temperature: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content_blocks: Vec<ContentBlock>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub model: Option<String>,
    pub finish_reason: Option<String>,
}

impl ChatResponse {
    pub fn from_blocks(content_blocks: Vec<ContentBlock>) -> Self {
        Self {
            content_blocks,
            ..Self::default()
        }
    }

    pub fn text_only(text: impl Into<String>) -> Self {
        Self::from_blocks(vec![ContentBlock::text(text)])
    }

    pub fn with_usage(mut self, input_tokens: u64, output_tokens: u64) -> Self {
        self.input_tokens = Some(input_tokens);
        self.output_tokens = Some(output_tokens);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn text(&self) -> String {
        join_text(&self.content_blocks)
    }

    pub fn function_calls(&self) -> Vec<FunctionCall> {
        self.content_blocks
            .iter()
            .filter_map(|block| match block {
                ContentBlock::FunctionCall(call) => Some(call.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn has_function_calls(&self) -> bool {
        self.content_blocks
            .iter()
            .any(|block| matches!(block, ContentBlock::FunctionCall(_)))
    }

    /// True when the response carries neither text nor function calls.
    pub fn is_empty(&self) -> bool {
        !self.has_function_calls() && self.text().trim().is_empty()
    }

    pub fn to_model_message(&self) -> ChatMessage {
        ChatMessage {
            role: MessageRole::Model,
            content: self.content_blocks.clone(),
        }
    }
}

fn join_text(blocks: &[ContentBlock]) -> String {
    let mut out = String::new();
    for block in blocks {
        if let ContentBlock::Text { text } = block {
            out.push_str(text);
        }
    }
    out
}
