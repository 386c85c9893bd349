//! Prompt compilation: the system instruction, the replayed history window
//! and the ordered multi-modal parts of the new user turn.

use super::types::{HistoryTurn, RegenerationRequest};
use crate::error::RegenError;
use crate::form::FormStructure;
use crate::images::ImageKind;
use crate::llm::{ChatMessage, ContentBlock, InlineImage, MessageRole, ToolSpec};
use serde::Serialize;
use serde_json::json;
use tera::{Context, Tera};

pub const GENERATE_IMAGE_FUNCTION: &str = "generate_image";

const SYSTEM_TEMPLATE_NAME: &str = "system_instruction";
const SYSTEM_TEMPLATE: &str = include_str!("templates/system_instruction.txt");

/// Output of [`PromptCompiler::compile`]: one turn, ready for a session.
#[derive(Debug, Clone)]
pub struct CompiledPrompt {
    pub system_instruction: String,
    /// Prior turns, already cut to the history window.
    pub history: Vec<ChatMessage>,
    /// The new user message, in protocol order.
    pub parts: Vec<ContentBlock>,
    /// Empty unless image generation is permitted.
    pub tools: Vec<ToolSpec>,
}

#[derive(Serialize)]
struct QuestionSummary<'a> {
    position: usize,
    text: &'a str,
    kind: String,
    hint: &'static str,
    required: bool,
}

/// Tera-backed renderer for the system instruction.
pub struct PromptCompiler {
    tera: Tera,
}

impl PromptCompiler {
    pub fn new() -> Result<Self, RegenError> {
        let mut tera = Tera::default();
        tera.add_raw_template(SYSTEM_TEMPLATE_NAME, SYSTEM_TEMPLATE)
            .map_err(|e| RegenError::Prompt(e.to_string()))?;
        Ok(Self { tera })
    }

    /// Render the system instruction. Only renderable questions reach the
    /// model, both in the structure JSON and in the per-question summary.
    pub fn system_instruction(
        &self,
        structure: &FormStructure,
        submit_url: &str,
        include_images: bool,
    ) -> Result<String, RegenError> {
        let structure = structure.renderable();
        let structure_json = serde_json::to_string_pretty(&structure)
            .map_err(|e| RegenError::Prompt(e.to_string()))?;
        let summary: Vec<QuestionSummary<'_>> = structure
            .questions
            .iter()
            .enumerate()
            .map(|(i, q)| QuestionSummary {
                position: i + 1,
                text: &q.text,
                kind: q.kind.to_string(),
                hint: q.kind.render_hint(),
                required: q.required,
            })
            .collect();

        let mut context = Context::new();
        context.insert("submit_url", submit_url);
        context.insert("include_images", &include_images);
        context.insert("structure_json", &structure_json);
        context.insert("summary", &summary);

        self.tera
            .render(SYSTEM_TEMPLATE_NAME, &context)
            .map_err(|e| RegenError::Prompt(e.to_string()))
    }

    /// `allow_images` decides both the image section of the instruction and
    /// whether `generate_image` is offered at all.
    pub fn compile(
        &self,
        request: &RegenerationRequest,
        history_window: usize,
        allow_images: bool,
    ) -> Result<CompiledPrompt, RegenError> {
        let system_instruction =
            self.system_instruction(&request.structure, &request.submit_url, allow_images)?;
        Ok(CompiledPrompt {
            system_instruction,
            history: history_messages(&request.history, history_window),
            parts: user_parts(request),
            tools: if allow_images {
                vec![generate_image_tool()]
            } else {
                Vec::new()
            },
        })
    }
}

/// The last `window` turns, oldest first. Older turns are dropped.
pub fn history_messages(history: &[HistoryTurn], window: usize) -> Vec<ChatMessage> {
    let start = history.len().saturating_sub(window);
    history[start..]
        .iter()
        .map(|turn| match turn.role {
            MessageRole::User => ChatMessage::user_text(turn.text.clone()),
            MessageRole::Model => ChatMessage::model_text(turn.text.clone()),
        })
        .collect()
}

/// Assemble the new user message. The order is fixed: style guide, active
/// images (caller order), region screenshot, then exactly one prompt text.
pub fn user_parts(request: &RegenerationRequest) -> Vec<ContentBlock> {
    let mut parts = Vec::new();

    if let Some(guide) = &request.style_guide {
        let image = guide.image();
        if !image.is_empty() {
            parts.push(ContentBlock::image(image));
            parts.push(ContentBlock::text(style_guide_text(&guide.focus_note)));
        }
    }

    for image in &request.active_images {
        parts.push(ContentBlock::image(InlineImage::new(
            image.mime_type.clone(),
            image.base64.clone(),
        )));
        parts.push(ContentBlock::text(active_image_text(image.kind, &image.url)));
    }

    if let Some(screenshot) = &request.screenshot
        && !screenshot.is_empty()
    {
        parts.push(ContentBlock::image(screenshot.clone()));
        parts.push(ContentBlock::text(
            "The image above is a screenshot of the region the creator wants to change.",
        ));
    }

    parts.push(ContentBlock::text(final_prompt_text(
        &request.previous_html,
        &request.prompt,
    )));
    parts
}

fn style_guide_text(focus_note: &str) -> String {
    let focus_note = focus_note.trim();
    let focus = if focus_note.is_empty() {
        String::new()
    } else {
        format!(" Focus specifically on: {focus_note}.")
    };
    format!(
        "Use the visual style of the image above as a reference.{focus} \
         Do not embed the image in the form."
    )
}

fn active_image_text(kind: ImageKind, url: &str) -> String {
    format!(
        "This is an existing {kind} image currently used in the form (URL: {url}). \
         You can keep it, replace it, or remove it as needed."
    )
}

/// The single closing text part: a fresh build, or the current HTML
/// followed by the new request.
pub fn final_prompt_text(previous_html: &str, prompt: &str) -> String {
    if previous_html.trim().is_empty() {
        format!("Creator request: {prompt}\n\nGenerate the complete HTML page for this form.")
    } else {
        format!(
            "Current form HTML:\n{previous_html}\n\nCreator request: {prompt}\n\n\
             Update the form to fulfil this request. Return the complete updated HTML page."
        )
    }
}

/// Declaration of the only function the model may call.
pub fn generate_image_tool() -> ToolSpec {
    ToolSpec {
        name: GENERATE_IMAGE_FUNCTION.into(),
        description: "Generate an AI image to use in the form design. Call this when an image \
                      would enhance the form, for example a header banner, a background or an \
                      accent image. Do not call this for simple surveys or internal forms that \
                      don't benefit from images."
            .into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "Detailed image generation prompt. Be specific about style, mood, composition and subject. Never request text, words or letters in the image."
                },
                "imageType": {
                    "type": "string",
                    "enum": ImageKind::ALL,
                    "description": "How the image is used: 'background' for full-page or section backgrounds (subtle, low contrast), 'header' for top banners (visually striking), 'accent' for decorative or content images."
                },
                "colorPalette": {
                    "type": "string",
                    "description": "Dominant colors the image should use, so form colors can complement it. E.g. 'warm oranges, soft yellows, cream'."
                },
                "aspectRatio": {
                    "type": "string",
                    "description": "Desired aspect ratio: '16:9' for headers, '1:1' for accents, 'flexible' for backgrounds."
                }
            },
            "required": ["prompt", "imageType", "colorPalette", "aspectRatio"]
        }),
    }
}
