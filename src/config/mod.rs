pub mod schema;

pub use schema::{
    Config, GatewayConfig, GeminiConfig, MAX_IMAGE_ROUNDS_HARD_CAP, MediaConfig, PublishConfig,
    RegenConfig, ScrapeConfig, ScreenshotConfig,
};
