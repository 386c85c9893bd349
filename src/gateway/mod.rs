//! Axum HTTP gateway: the editor API, published forms, the submission proxy
//! and hosted media, behind body-size and request-timeout limits.

mod handlers;

use handlers::{
    handle_generate, handle_generate_image, handle_health, handle_media, handle_publish,
    handle_published_form, handle_scrape, handle_screenshot, handle_submit, handle_upload,
};

use crate::config::Config;
use crate::form::{FormStructureProvider, GoogleFormScraper};
use crate::images::{GeminiImageGenerator, ImageGenerator, ImageStore, LocalImageStore};
use crate::llm::GeminiClient;
use crate::publish::{InMemoryPublishStore, PublishStore};
use crate::regen::{RegenSettings, Regenerator};
use crate::screenshot::{ChromiumScreenshotter, ScreenshotProvider};
use crate::submit::{DEFAULT_FORMS_BASE_URL, SubmissionForwarder};
use anyhow::{Context, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{Method, StatusCode, header},
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub regenerator: Arc<Regenerator>,
    pub scraper: Arc<dyn FormStructureProvider>,
    pub image_generator: Arc<dyn ImageGenerator>,
    pub image_store: Arc<dyn ImageStore>,
    pub screenshotter: Arc<dyn ScreenshotProvider>,
    pub publish_store: Arc<dyn PublishStore>,
    pub forwarder: Arc<SubmissionForwarder>,
    /// Origin used for submit URLs, published links and media URLs.
    pub public_base_url: String,
    pub turn_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Wire the production collaborators from config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let public_base_url = config.gateway.public_base_url();
        let gemini = Arc::new(GeminiClient::from_config(&config.gemini));

        let image_store: Arc<dyn ImageStore> =
            Arc::new(LocalImageStore::new(config.media_dir(), &public_base_url));
        let image_generator: Arc<dyn ImageGenerator> = Arc::new(GeminiImageGenerator::new(
            gemini.clone(),
            config.gemini.image_model.clone(),
            image_store.clone(),
        ));
        let regenerator = Regenerator::new(gemini, RegenSettings::from_config(config))?
            .with_image_generator(image_generator.clone());

        let forwarder = SubmissionForwarder::new(DEFAULT_FORMS_BASE_URL, config.scrape.timeout_secs)
            .context("failed to build submission client")?;

        Ok(Self {
            regenerator: Arc::new(regenerator),
            scraper: Arc::new(GoogleFormScraper::new(config.scrape.timeout_secs)),
            image_generator,
            image_store,
            screenshotter: Arc::new(ChromiumScreenshotter::new(&config.screenshot)),
            publish_store: Arc::new(InMemoryPublishStore::with_ttl_hours(config.publish.ttl_hours)),
            forwarder: Arc::new(forwarder),
            public_base_url,
            turn_timeout: Duration::from_secs(config.regen.turn_timeout_secs),
            max_upload_bytes: config.media.max_upload_mb.saturating_mul(1024 * 1024),
        })
    }

    pub fn submit_url(&self, form_id: &str) -> String {
        format!("{}/api/submit/{form_id}", self.public_base_url)
    }

    pub fn published_url(&self, id: &str) -> String {
        format!("{}/f/{id}", self.public_base_url)
    }
}

/// Build the router. Restyled pages are rendered in sandboxed frames with a
/// `null` origin, so the submit route allows any origin.
pub fn build_router(state: AppState, max_body_bytes: usize, request_timeout: Duration) -> Router {
    let submit_cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let submit = Router::new()
        .route("/api/submit/{form_id}", post(handle_submit))
        .layer(submit_cors);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/scrape", post(handle_scrape))
        .route("/api/generate", post(handle_generate))
        .route("/api/generate-image", post(handle_generate_image))
        .route("/api/screenshot", post(handle_screenshot))
        .route("/api/upload", post(handle_upload))
        .route("/api/publish", post(handle_publish))
        .route("/f/{id}", get(handle_published_form))
        .route("/media/{file}", get(handle_media))
        .merge(submit)
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
}

/// Run the HTTP gateway until Ctrl-C.
pub async fn run_gateway(host: &str, port: u16, config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid bind address {host}:{port}"))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    run_gateway_with_listener(listener, config).await
}

/// Run the HTTP gateway from a pre-bound listener.
pub async fn run_gateway_with_listener(
    listener: tokio::net::TcpListener,
    config: Config,
) -> Result<()> {
    let local_addr = listener.local_addr()?;
    let state = AppState::from_config(&config)?;

    if config.gemini.api_key.is_none() {
        tracing::warn!("no Gemini API key configured; /api/generate will fail until one is set");
    }

    println!("◆ FormRestyler listening on http://{local_addr}");
    println!("  › public URL: {}", state.public_base_url);
    println!("  POST /api/scrape          → extract a Google Form");
    println!("  POST /api/generate        → restyle the form");
    println!("  POST /api/publish         → publish restyled HTML");
    println!("  GET  /f/{{id}}             → published form");
    println!("  POST /api/submit/{{formId}} → submission proxy");
    println!("  GET  /health              → health check");
    println!("  Press Ctrl+C to stop.\n");

    let app = build_router(
        state,
        config.gateway.max_body_bytes,
        Duration::from_secs(config.gateway.request_timeout_secs),
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down gateway");
}
