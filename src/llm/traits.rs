use super::types::{ChatRequest, ChatResponse, InlineImage};
use std::future::Future;
use std::pin::Pin;

/// A generative model reachable over some transport.
///
/// One call is one stateless round trip: the caller replays whatever history
/// it wants the model to see inside `request.messages`.
pub trait ChatBackend: Send + Sync {
    /// Backend identifier (e.g. "gemini").
    fn name(&self) -> &str;

    /// Whether a credential is configured. Checked before any prompt is built.
    fn has_credentials(&self) -> bool;

    fn generate<'a>(
        &'a self,
        request: ChatRequest<'a>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ChatResponse>> + Send + 'a>>;
}

/// A model that turns a text prompt into one inline image.
pub trait ImageModel: Send + Sync {
    fn generate_image<'a>(
        &'a self,
        model: &'a str,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<InlineImage>>> + Send + 'a>>;
}
