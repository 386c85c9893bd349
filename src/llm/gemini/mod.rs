//! Google Gemini `generateContent` backend.
//!
//! The API key travels in the `x-goog-api-key` header, never in the URL, so
//! transport errors that echo the request line cannot leak it.

use crate::config::GeminiConfig;
use crate::llm::{
    api_error, build_backend_client_with_timeout, sanitize_api_error, scrub_secret_patterns,
    traits::{ChatBackend, ImageModel},
    types::{
        ChatMessage, ChatRequest, ChatResponse, ContentBlock, FunctionCall, InlineImage,
        MessageRole, ToolSpec,
    },
};
use reqwest::Client;
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;

mod types;
use types::{
    Content, GeminiFunctionCall, GeminiFunctionDeclaration, GeminiFunctionResponse,
    GeminiInlineData, GeminiTool, GenerateContentRequest, GenerateContentResponse,
    GenerationConfig, Part, ResponsePart,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiClient {
    api_key: Option<String>,
    base_url: String,
    max_output_tokens: u32,
    client: Client,
}

impl GeminiClient {
    pub fn new(api_key: Option<&str>, base_url: &str, timeout_secs: u64) -> Self {
        Self {
            api_key: api_key
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(String::from),
            base_url: base_url.trim_end_matches('/').to_string(),
            max_output_tokens: 65_536,
            client: build_backend_client_with_timeout(timeout_secs),
        }
    }

    pub fn from_config(config: &GeminiConfig) -> Self {
        let mut client = Self::new(
            config.api_key.as_deref(),
            &config.base_url,
            config.request_timeout_secs,
        );
        client.max_output_tokens = config.max_output_tokens;
        client
    }

    fn model_name(model: &str) -> String {
        if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        }
    }

    fn api_key(&self) -> anyhow::Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("GEMINI_API_KEY is not set"))
    }

    fn build_tools(tools: &[ToolSpec]) -> Option<Vec<GeminiTool>> {
        if tools.is_empty() {
            return None;
        }
        let function_declarations = tools
            .iter()
            .map(|tool| GeminiFunctionDeclaration {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.parameters.clone(),
            })
            .collect();
        Some(vec![GeminiTool {
            function_declarations,
        }])
    }

    fn map_message(message: &ChatMessage) -> Content {
        let role = match message.role {
            MessageRole::User => "user",
            MessageRole::Model => "model",
        };

        let parts = message
            .content
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => Part::text(text.clone()),
                ContentBlock::Image { image } => Part::inline_data(GeminiInlineData {
                    mime_type: image.mime_type.clone(),
                    data: image.data.clone(),
                }),
                ContentBlock::FunctionCall(call) => Part {
                    function_call: Some(GeminiFunctionCall {
                        name: call.name.clone(),
                        args: call.args.clone(),
                        id: call.id.clone(),
                    }),
                    thought_signature: call.thought_signature.clone(),
                    ..Part::default()
                },
                ContentBlock::FunctionResponse { id, name, response } => Part {
                    function_response: Some(GeminiFunctionResponse {
                        name: name.clone(),
                        response: response.clone(),
                        id: id.clone(),
                    }),
                    ..Part::default()
                },
            })
            .collect();

        Content {
            role: Some(role.to_string()),
            parts,
        }
    }

    fn build_chat_request(&self, request: &ChatRequest<'_>) -> GenerateContentRequest {
        let system_instruction = (!request.system_instruction.is_empty()).then(|| Content {
            role: None,
            parts: vec![Part::text(request.system_instruction.to_string())],
        });

        GenerateContentRequest {
            contents: request.messages.iter().map(Self::map_message).collect(),
            system_instruction,
            tools: Self::build_tools(request.tools),
            generation_config: GenerationConfig {
                temperature: Some(request.temperature),
                max_output_tokens: Some(self.max_output_tokens),
                response_modalities: None,
            },
        }
    }

    fn build_image_request(prompt: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(prompt.to_string())],
            }],
            system_instruction: None,
            tools: None,
            generation_config: GenerationConfig {
                response_modalities: Some(vec!["TEXT".to_string(), "IMAGE".to_string()]),
                ..GenerationConfig::default()
            },
        }
    }

    /// Convert response parts into content blocks. Thought summaries are
    /// dropped; function-call arguments that are not objects are wrapped so
    /// downstream validation always sees an object.
    fn parse_content_blocks(parts: &[ResponsePart]) -> Vec<ContentBlock> {
        let mut blocks = Vec::new();

        for part in parts {
            if let Some(text) = &part.text
                && !part.thought
                && !text.is_empty()
            {
                blocks.push(ContentBlock::text(text.clone()));
            }

            if let Some(data) = &part.inline_data {
                blocks.push(ContentBlock::image(InlineImage::new(
                    data.mime_type.clone(),
                    data.data.clone(),
                )));
            }

            if let Some(function_call) = &part.function_call {
                let args = if function_call.args.is_object() {
                    function_call.args.clone()
                } else {
                    let mut wrapped = Map::new();
                    wrapped.insert("input".to_string(), function_call.args.clone());
                    Value::Object(wrapped)
                };
                blocks.push(ContentBlock::FunctionCall(FunctionCall {
                    id: function_call.id.clone(),
                    name: function_call.name.clone(),
                    args,
                    thought_signature: part.thought_signature.clone(),
                }));
            }
        }

        blocks
    }

    async fn call_api(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> anyhow::Result<GenerateContentResponse> {
        let api_key = self.api_key()?;
        let url = format!(
            "{}/{}:generateContent",
            self.base_url,
            Self::model_name(model)
        );

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                anyhow::anyhow!(
                    "Gemini request failed: {}",
                    scrub_secret_patterns(&e.to_string())
                )
            })?;

        if !response.status().is_success() {
            return Err(api_error("Gemini", response).await);
        }

        let result: GenerateContentResponse = response.json().await?;
        if let Some(err) = result.error.as_ref() {
            anyhow::bail!("Gemini API error: {}", sanitize_api_error(&err.message));
        }
        Ok(result)
    }

    fn into_chat_response(result: GenerateContentResponse) -> anyhow::Result<ChatResponse> {
        let Some(candidate) = result.candidates.as_ref().and_then(|c| c.first()) else {
            let reason = result
                .prompt_feedback
                .and_then(|feedback| feedback.block_reason)
                .unwrap_or_else(|| "no candidates".to_string());
            anyhow::bail!("No response from Gemini ({reason})");
        };

        let mut response =
            ChatResponse::from_blocks(Self::parse_content_blocks(&candidate.content.parts));
        response.finish_reason = candidate.finish_reason.clone();
        if let Some(usage) = result.usage_metadata {
            response = response.with_usage(usage.prompt_token_count, usage.candidates_token_count);
        }
        if let Some(model_version) = result.model_version {
            response = response.with_model(model_version);
        }
        Ok(response)
    }
}

impl Part {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            ..Self::default()
        }
    }

    fn inline_data(data: GeminiInlineData) -> Self {
        Self {
            inline_data: Some(data),
            ..Self::default()
        }
    }
}

impl ChatBackend for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    fn generate<'a>(
        &'a self,
        request: ChatRequest<'a>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ChatResponse>> + Send + 'a>> {
        Box::pin(async move {
            let body = self.build_chat_request(&request);
            let result = self.call_api(request.model, &body).await?;
            Self::into_chat_response(result)
        })
    }
}

impl ImageModel for GeminiClient {
    fn generate_image<'a>(
        &'a self,
        model: &'a str,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<InlineImage>>> + Send + 'a>> {
        Box::pin(async move {
            let body = Self::build_image_request(prompt);
            let result = self.call_api(model, &body).await?;
            let response = Self::into_chat_response(result)?;
            Ok(response.content_blocks.into_iter().find_map(|block| match block {
                ContentBlock::Image { image } if image.mime_type.starts_with("image/") => {
                    Some(image)
                }
                _ => None,
            }))
        })
    }
}
