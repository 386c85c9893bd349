//! Image generation collaborator: argument validation, the Gemini image
//! model adapter and the storage that hosts the results.

pub mod detection;
pub mod gemini;
pub mod store;
pub mod types;

pub use detection::{ALLOWED_IMAGE_MIMES, detect_image_mime, extension_from_mime};
pub use gemini::{GeminiImageGenerator, compose_image_prompt};
pub use store::{ImageStore, LocalImageStore, StoredMedia};
pub use types::{GeneratedImage, ImageGenerator, ImageKind, ImageRequest};
