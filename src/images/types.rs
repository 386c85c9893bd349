use crate::error::ImageError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

/// Where a generated image is meant to be placed in the form.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ImageKind {
    Background,
    Header,
    Accent,
}

impl ImageKind {
    pub const ALL: [&'static str; 3] = ["background", "header", "accent"];
}

/// Validated arguments of one `generate_image` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    pub prompt: String,
    #[serde(rename = "imageType")]
    pub kind: ImageKind,
    /// Dominant colors the image should use.
    #[serde(default, rename = "colorPalette")]
    pub color_hint: String,
    #[serde(default, rename = "aspectRatio")]
    pub aspect_hint: String,
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>, kind: ImageKind) -> Self {
        Self {
            prompt: prompt.into(),
            kind,
            color_hint: String::new(),
            aspect_hint: String::new(),
        }
    }

    /// Validate model-supplied arguments. The payload is untrusted: every
    /// field must have the declared type, the prompt must be non-empty and the
    /// kind must be one of the declared values. The two hints may be omitted.
    pub fn from_args(args: &Value) -> Result<Self, ImageError> {
        let object = args
            .as_object()
            .ok_or_else(|| ImageError::InvalidArguments("arguments must be an object".into()))?;

        let string_field = |name: &str, required: bool| -> Result<String, ImageError> {
            match object.get(name) {
                Some(Value::String(s)) => Ok(s.trim().to_string()),
                None | Some(Value::Null) if !required => Ok(String::new()),
                None | Some(Value::Null) => {
                    Err(ImageError::InvalidArguments(format!("missing `{name}`")))
                }
                Some(_) => Err(ImageError::InvalidArguments(format!(
                    "`{name}` must be a string"
                ))),
            }
        };

        let prompt = string_field("prompt", true)?;
        if prompt.is_empty() {
            return Err(ImageError::InvalidArguments("`prompt` is empty".into()));
        }

        let kind_raw = string_field("imageType", true)?;
        let kind = kind_raw.parse::<ImageKind>().map_err(|_| {
            ImageError::InvalidArguments(format!(
                "`imageType` must be one of {}, got `{kind_raw}`",
                ImageKind::ALL.join(", ")
            ))
        })?;

        Ok(Self {
            prompt,
            kind,
            color_hint: string_field("colorPalette", false)?,
            aspect_hint: string_field("aspectRatio", false)?,
        })
    }
}

/// An image produced for the form, hosted at a stable URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub url: String,
    #[serde(rename = "imageType")]
    pub kind: ImageKind,
    /// Raw base64 image data (no data-URL prefix).
    pub base64: String,
    pub mime_type: String,
}

/// Side-effecting image generation as seen by the agent loop.
pub trait ImageGenerator: Send + Sync {
    fn generate<'a>(
        &'a self,
        request: &'a ImageRequest,
    ) -> Pin<Box<dyn Future<Output = Result<GeneratedImage, ImageError>> + Send + 'a>>;
}
