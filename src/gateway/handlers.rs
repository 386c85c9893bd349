use super::AppState;
use crate::error::{PublishError, RegenError, ScrapeError, ScreenshotError, SubmitError};
use crate::form::FormStructure;
use crate::images::{GeneratedImage, ImageRequest, detect_image_mime, extension_from_mime};
use crate::llm::InlineImage;
use crate::publish::publish_form;
use crate::regen::{HistoryTurn, RegenerationRequest, StyleGuide};
use crate::util::random_id;
use axum::{
    body::Bytes,
    extract::{Multipart, Path, State, multipart::Field, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};

const UPLOAD_FIELD: &str = "image";

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    body.map(|Json(value)| value)
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, format!("Invalid JSON: {e}")))
}

// ── Request bodies ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UrlBody {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBody {
    #[serde(default)]
    pub structure: Option<FormStructure>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
    #[serde(default)]
    pub previous_html: String,
    #[serde(default)]
    pub screenshot_base64: Option<String>,
    #[serde(default)]
    pub style_guide: Option<StyleGuide>,
    #[serde(default)]
    pub include_images: bool,
    #[serde(default)]
    pub active_images: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishBody {
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub form_id: String,
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /health
pub(super) async fn handle_health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

/// POST /api/scrape: extract the structure of a public Google Form
pub(super) async fn handle_scrape(
    State(state): State<AppState>,
    body: Result<Json<UrlBody>, JsonRejection>,
) -> Response {
    let body = match parse_body(body) {
        Ok(body) => body,
        Err(response) => return response,
    };
    let Some(url) = body.url.filter(|u| !u.trim().is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "url is required");
    };

    match state.scraper.scrape(url.trim()).await {
        Ok(structure) => {
            tracing::info!(
                form_id = %structure.form_id,
                questions = structure.questions.len(),
                "form scraped"
            );
            Json(json!({ "structure": structure })).into_response()
        }
        Err(e) => {
            let status = match e {
                ScrapeError::NotAGoogleForm(_) => StatusCode::BAD_REQUEST,
                ScrapeError::Fetch(_) => StatusCode::BAD_GATEWAY,
                ScrapeError::Parse(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            tracing::warn!(error = %e, "scrape failed");
            error_response(status, e.to_string())
        }
    }
}

/// POST /api/generate: one regeneration turn
pub(super) async fn handle_generate(
    State(state): State<AppState>,
    body: Result<Json<GenerateBody>, JsonRejection>,
) -> Response {
    let body = match parse_body(body) {
        Ok(body) => body,
        Err(response) => return response,
    };
    let (Some(structure), Some(prompt)) = (body.structure, body.prompt) else {
        return error_response(StatusCode::BAD_REQUEST, "structure and prompt are required");
    };

    let submit_url = state.submit_url(&structure.form_id);
    let mut request = RegenerationRequest::new(structure, prompt, submit_url)
        .with_history(body.history)
        .with_previous_html(body.previous_html)
        .with_images(body.include_images)
        .with_active_images(body.active_images);
    if let Some(screenshot) = body.screenshot_base64.filter(|s| !s.is_empty()) {
        request = request.with_screenshot(InlineImage::from_data_url(&screenshot));
    }
    if let Some(style_guide) = body.style_guide.filter(|g| !g.image_base64.is_empty()) {
        request = request.with_style_guide(style_guide);
    }

    let turn = state.regenerator.regenerate(&request);
    let output = match tokio::time::timeout(state.turn_timeout, turn).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "regeneration failed");
            let status = match e {
                RegenError::Validation(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            return error_response(status, e.to_string());
        }
        Err(_) => {
            tracing::error!(
                timeout_secs = state.turn_timeout.as_secs(),
                "regeneration timed out"
            );
            return error_response(StatusCode::GATEWAY_TIMEOUT, "Generation timed out");
        }
    };

    Json(json!({
        "html": output.html,
        "generatedImages": output.images,
        "imageRounds": output.image_rounds,
        "roundLimitHit": output.round_limit_hit,
    }))
    .into_response()
}

/// POST /api/generate-image: one image outside the chat loop
pub(super) async fn handle_generate_image(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let args = match parse_body(body) {
        Ok(args) => args,
        Err(response) => return response,
    };
    let request = match ImageRequest::from_args(&args) {
        Ok(request) => request,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    match state.image_generator.generate(&request).await {
        Ok(image) => Json(image).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "image generation failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// POST /api/screenshot: capture a public page as a style reference
pub(super) async fn handle_screenshot(
    State(state): State<AppState>,
    body: Result<Json<UrlBody>, JsonRejection>,
) -> Response {
    let body = match parse_body(body) {
        Ok(body) => body,
        Err(response) => return response,
    };
    let Some(url) = body.url.filter(|u| !u.trim().is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "url is required");
    };

    match state.screenshotter.capture(&url).await {
        Ok(image) => Json(json!({ "imageBase64": image })).into_response(),
        Err(e) => {
            let status = match e {
                ScreenshotError::Blocked(_) => StatusCode::BAD_REQUEST,
                ScreenshotError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
                ScreenshotError::Capture(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            tracing::warn!(error = %e, "screenshot failed");
            error_response(status, e.to_string())
        }
    }
}

/// POST /api/upload: store a style-guide or content image
pub(super) async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Response {
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some(UPLOAD_FIELD) => {
                return store_upload(&state, field).await;
            }
            Ok(Some(_)) => {}
            Ok(None) => return error_response(StatusCode::BAD_REQUEST, "No image provided"),
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.body_text()),
        }
    }
}

async fn store_upload(state: &AppState, field: Field<'_>) -> Response {
    let declared = field
        .content_type()
        .and_then(|ct| ct.parse::<mime::Mime>().ok());
    if let Some(declared) = &declared
        && declared.type_() != mime::IMAGE
    {
        return unsupported_upload();
    }

    let bytes = match field.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.body_text()),
    };
    if bytes.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "No image provided");
    }
    if bytes.len() > state.max_upload_bytes {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!(
                "Image must be under {} MB",
                state.max_upload_bytes / (1024 * 1024)
            ),
        );
    }

    // The declared type is only a hint; the bytes decide.
    let Some(mime_type) = detect_image_mime(&bytes) else {
        return unsupported_upload();
    };
    let file_name = format!("upload-{}.{}", random_id(21), extension_from_mime(mime_type));

    match state.image_store.put(&file_name, &bytes).await {
        Ok(url) => {
            tracing::info!(%url, mime = mime_type, size = bytes.len(), "image uploaded");
            Json(json!({ "url": url })).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "upload failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn unsupported_upload() -> Response {
    error_response(
        StatusCode::BAD_REQUEST,
        "Unsupported file type. Use JPG, PNG, GIF, WebP or SVG.",
    )
}

/// POST /api/publish: store restyled HTML under a short id
pub(super) async fn handle_publish(
    State(state): State<AppState>,
    body: Result<Json<PublishBody>, JsonRejection>,
) -> Response {
    let body = match parse_body(body) {
        Ok(body) => body,
        Err(response) => return response,
    };

    match publish_form(state.publish_store.as_ref(), &body.html, &body.form_id) {
        Ok(id) => Json(json!({ "url": state.published_url(&id), "id": id })).into_response(),
        Err(PublishError::Validation(_)) => {
            error_response(StatusCode::BAD_REQUEST, "html and formId are required")
        }
        Err(e) => {
            tracing::error!(error = %e, "publish failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /f/{id}: serve a published form
pub(super) async fn handle_published_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let html_type = [(header::CONTENT_TYPE, mime::TEXT_HTML_UTF_8.to_string())];
    match state.publish_store.get(&id) {
        Ok(Some(form)) => (StatusCode::OK, html_type, form.html).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            html_type,
            "<h1>Form not found</h1>".to_string(),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "publish store read failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                html_type,
                "<h1>Something went wrong</h1>".to_string(),
            )
                .into_response()
        }
    }
}

/// POST /api/submit/{form_id}: forward answers to Google Forms
///
/// Published pages post with `text/plain` to skip the CORS preflight, so the
/// body is parsed as JSON whatever its content type.
pub(super) async fn handle_submit(
    State(state): State<AppState>,
    Path(form_id): Path<String>,
    body: Bytes,
) -> Response {
    let body: Value = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("Invalid JSON: {e}")),
    };

    match state.forwarder.forward(&form_id, &body).await {
        Ok(()) => Json(json!({ "status": "ok" })).into_response(),
        Err(e @ (SubmitError::InvalidFormId(_) | SubmitError::InvalidPayload(_))) => {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(SubmitError::Rejected { status }) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Submission failed. Please try again.",
                "upstreamStatus": status,
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(form_id = %form_id, error = %e, "submission proxy error");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /media/{file}: hosted generated and uploaded images
pub(super) async fn handle_media(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Response {
    match state.image_store.get(&file).await {
        Some(media) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, media.mime_type),
                (header::CACHE_CONTROL, "public, max-age=31536000, immutable"),
                // SVG may carry script; never let it run in our origin.
                (header::CONTENT_SECURITY_POLICY, "default-src 'none'; style-src 'unsafe-inline'"),
            ],
            media.bytes,
        )
            .into_response(),
        None => error_response(StatusCode::NOT_FOUND, "not found"),
    }
}
