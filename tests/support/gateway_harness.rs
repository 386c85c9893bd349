#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use formrestyler::config::ScreenshotConfig;
use formrestyler::error::ScrapeError;
use formrestyler::form::{FormStructure, FormStructureProvider, check_google_form_url};
use formrestyler::gateway::{AppState, build_router};
use formrestyler::images::{ImageStore, LocalImageStore};
use formrestyler::llm::ChatResponse;
use formrestyler::publish::InMemoryPublishStore;
use formrestyler::regen::Regenerator;
use formrestyler::screenshot::ChromiumScreenshotter;
use formrestyler::submit::SubmissionForwarder;

use crate::support::{ScriptedBackend, ScriptedImages, rsvp_form, settings};

pub const PUBLIC_BASE_URL: &str = "https://forms.example.com";

/// Accepts any Google Form URL and answers with a fixed structure.
pub struct StaticScraper;

impl FormStructureProvider for StaticScraper {
    fn scrape<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<FormStructure, ScrapeError>> + Send + 'a>> {
        Box::pin(async move {
            check_google_form_url(url)?;
            Ok(rsvp_form())
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub backend: Arc<ScriptedBackend>,
    _media: TempDir,
}

impl TestApp {
    /// `forms_base_url` is where the submission proxy forwards answers.
    pub fn new(replies: Vec<ChatResponse>, forms_base_url: &str) -> Self {
        let media = TempDir::new().expect("media dir should be created");
        let backend = Arc::new(ScriptedBackend::new(replies));
        let image_store: Arc<dyn ImageStore> =
            Arc::new(LocalImageStore::new(media.path(), PUBLIC_BASE_URL));
        let image_generator = Arc::new(ScriptedImages::always_ok());
        let regenerator = Regenerator::new(backend.clone(), settings(4))
            .expect("prompt templates should compile")
            .with_image_generator(image_generator.clone());

        let state = AppState {
            regenerator: Arc::new(regenerator),
            scraper: Arc::new(StaticScraper),
            image_generator,
            image_store,
            screenshotter: Arc::new(ChromiumScreenshotter::new(&ScreenshotConfig {
                chrome_binary: "/nonexistent/chromium".into(),
                ..ScreenshotConfig::default()
            })),
            publish_store: Arc::new(InMemoryPublishStore::with_ttl_hours(1)),
            forwarder: Arc::new(
                SubmissionForwarder::new(forms_base_url, 5)
                    .expect("submission client should build"),
            ),
            public_base_url: PUBLIC_BASE_URL.to_string(),
            turn_timeout: Duration::from_secs(5),
            max_upload_bytes: 1024 * 1024,
        };

        Self {
            router: build_router(state, 4 * 1024 * 1024, Duration::from_secs(10)),
            backend,
            _media: media,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> (u16, Value) {
        let request = Request::post(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request should build");
        let response = self.send(request).await;
        let status = response.status().as_u16();
        (status, json_body(response).await)
    }

    pub async fn get(&self, path: &str) -> (u16, String) {
        let request = Request::get(path)
            .body(Body::empty())
            .expect("request should build");
        let response = self.send(request).await;
        let status = response.status().as_u16();
        (status, text_body(response).await)
    }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable")
        .to_vec()
}

pub async fn text_body(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).expect("body should be utf-8")
}

pub async fn json_body(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("body should be JSON")
}
