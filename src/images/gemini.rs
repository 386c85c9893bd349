use super::store::ImageStore;
use super::types::{GeneratedImage, ImageGenerator, ImageKind, ImageRequest};
use crate::error::ImageError;
use crate::llm::{ImageModel, sanitize_api_error};
use base64::Engine as _;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

const NO_TEXT_RULE: &str = "Do not include any text, words, letters, or numbers in the image.";

/// Build the full image-model prompt from a validated request.
pub fn compose_image_prompt(request: &ImageRequest) -> String {
    let mut sentences = vec![request.prompt.clone()];
    if !request.color_hint.is_empty() {
        sentences.push(format!("Use these dominant colors: {}.", request.color_hint));
    }
    if !request.aspect_hint.is_empty() {
        sentences.push(format!("Aspect ratio: {}.", request.aspect_hint));
    }
    match request.kind {
        ImageKind::Background => sentences.push(
            "This image will be used as a form background. Keep it subtle with low contrast \
             so text remains readable over it."
                .into(),
        ),
        ImageKind::Header => sentences.push(
            "This image will be used as a header/banner at the top of a form. Make it \
             visually striking."
                .into(),
        ),
        ImageKind::Accent => {}
    }
    sentences.push(NO_TEXT_RULE.into());
    sentences.join(" ")
}

/// `form-<kind>-<8 random chars>.<png|jpeg>`
pub fn image_file_name(kind: ImageKind, mime_type: &str) -> String {
    let extension = if mime_type == "image/png" { "png" } else { "jpeg" };
    format!("form-{kind}-{}.{extension}", crate::util::random_id(8))
}

/// Generates images with a Gemini image model and hosts them in an
/// [`ImageStore`].
pub struct GeminiImageGenerator {
    model: Arc<dyn ImageModel>,
    model_name: String,
    store: Arc<dyn ImageStore>,
}

impl GeminiImageGenerator {
    pub fn new(
        model: Arc<dyn ImageModel>,
        model_name: impl Into<String>,
        store: Arc<dyn ImageStore>,
    ) -> Self {
        Self {
            model,
            model_name: model_name.into(),
            store,
        }
    }
}

impl ImageGenerator for GeminiImageGenerator {
    fn generate<'a>(
        &'a self,
        request: &'a ImageRequest,
    ) -> Pin<Box<dyn Future<Output = Result<GeneratedImage, ImageError>> + Send + 'a>> {
        Box::pin(async move {
            let prompt = compose_image_prompt(request);
            tracing::info!(model = %self.model_name, kind = %request.kind, "generating image");

            let image = self
                .model
                .generate_image(&self.model_name, &prompt)
                .await
                .map_err(|e| ImageError::GenerationFailed(sanitize_api_error(&e.to_string())))?
                .ok_or_else(|| {
                    ImageError::GenerationFailed(
                        "no image generated, model returned text only".into(),
                    )
                })?;

            let bytes = base64::engine::general_purpose::STANDARD
                .decode(image.data.as_bytes())
                .map_err(|e| ImageError::GenerationFailed(format!("invalid image data: {e}")))?;

            let file_name = image_file_name(request.kind, &image.mime_type);
            let url = self.store.put(&file_name, &bytes).await?;
            tracing::info!(%url, size = bytes.len(), "image hosted");

            Ok(GeneratedImage {
                url,
                kind: request.kind,
                base64: image.data,
                mime_type: image.mime_type,
            })
        })
    }
}
