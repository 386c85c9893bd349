// ── Infrastructure ───────────────────────────────────────────────────────────
pub mod http_client;
pub mod scrub;
pub mod traits;
pub mod types;

// ── Backend implementations ─────────────────────────────────────────────────
pub mod gemini;

pub use http_client::build_backend_client_with_timeout;
pub use scrub::{api_error, sanitize_api_error, scrub_secret_patterns};
pub use traits::{ChatBackend, ImageModel};
pub use types::{
    ChatMessage, ChatRequest, ChatResponse, ContentBlock, FunctionCall, InlineImage, MessageRole,
    ToolSpec,
};

pub use gemini::GeminiClient;
