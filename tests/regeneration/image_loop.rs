use std::sync::Arc;

use serde_json::json;

use formrestyler::error::{ImageError, RegenError};
use formrestyler::form::{FormQuestion, FormStructure, QuestionKind};
use formrestyler::images::ImageKind;
use formrestyler::llm::{ChatResponse, ContentBlock};
use formrestyler::regen::{RegenEvent, RegenerationRequest, Regenerator};

use crate::support::{
    CapturingObserver, SUBMIT_URL, ScriptedBackend, ScriptedImages, calls_response, header_args,
    image, image_call, rsvp_form, settings, text_blocks,
};

struct Harness {
    backend: Arc<ScriptedBackend>,
    images: Arc<ScriptedImages>,
    observer: Arc<CapturingObserver>,
    regenerator: Regenerator,
}

fn harness(replies: Vec<ChatResponse>, images: ScriptedImages, max_rounds: u32) -> Harness {
    let backend = Arc::new(ScriptedBackend::new(replies));
    let images = Arc::new(images);
    let observer = Arc::new(CapturingObserver::default());
    let regenerator = Regenerator::new(backend.clone(), settings(max_rounds))
        .unwrap()
        .with_image_generator(images.clone())
        .with_observer(observer.clone());
    Harness {
        backend,
        images,
        observer,
        regenerator,
    }
}

fn image_request() -> RegenerationRequest {
    RegenerationRequest::new(rsvp_form(), "add a sunrise header", SUBMIT_URL).with_images(true)
}

fn function_responses(blocks: &[ContentBlock]) -> Vec<serde_json::Value> {
    blocks
        .iter()
        .map(|block| match block {
            ContentBlock::FunctionResponse { response, .. } => response.clone(),
            other => panic!("acknowledgment carried {other:?}"),
        })
        .collect()
}

#[tokio::test]
async fn plain_answer_makes_no_round_trips() {
    let h = harness(
        vec![ChatResponse::text_only("<html><body>plain</body></html>")],
        ScriptedImages::always_ok(),
        4,
    );

    let output = h.regenerator.regenerate(&image_request()).await.unwrap();

    assert_eq!(output.html, "<html><body>plain</body></html>");
    assert!(output.images.is_empty());
    assert_eq!(output.image_rounds, 0);
    assert!(!output.round_limit_hit);
    assert_eq!(h.backend.call_count(), 1);
    assert_eq!(h.images.call_count(), 0);

    let events = h.observer.events();
    assert!(matches!(events.first(), Some(RegenEvent::PromptBuilt { .. })));
    assert!(matches!(
        events.last(),
        Some(RegenEvent::TurnFinalized {
            images: 0,
            rounds: 0,
            ..
        })
    ));
}

#[tokio::test]
async fn successful_image_is_acknowledged_then_shown() {
    let generated = image(ImageKind::Header, "https://cdn.test/sunrise.png");
    let h = harness(
        vec![
            calls_response(vec![image_call("call-1", header_args())]),
            ChatResponse::text_only("noted"),
            ChatResponse::text_only("```html\n<html><img src=\"https://cdn.test/sunrise.png\"></html>\n```"),
        ],
        ScriptedImages::new(vec![Ok(generated.clone())]),
        4,
    );

    let output = h.regenerator.regenerate(&image_request()).await.unwrap();

    assert_eq!(output.images, vec![generated]);
    assert_eq!(output.image_rounds, 1);
    assert_eq!(
        output.html,
        "<html><img src=\"https://cdn.test/sunrise.png\"></html>"
    );

    let calls = h.backend.calls();
    assert_eq!(calls.len(), 3);

    let ack = function_responses(&calls[1].last_message().content);
    assert_eq!(
        ack,
        vec![json!({
            "url": "https://cdn.test/sunrise.png",
            "imageType": "header",
            "success": true,
        })]
    );

    let vision = &calls[2].last_message().content;
    assert_eq!(vision.len(), 2);
    assert!(matches!(&vision[0], ContentBlock::Image { image } if image.mime_type == "image/png"));
    let follow_up = text_blocks(calls[2].last_message());
    assert!(follow_up[0].contains("Its URL is: https://cdn.test/sunrise.png"));
    assert!(!vision.iter().any(ContentBlock::is_function_response));

    let request = &h.images.requests()[0];
    assert_eq!(request.kind, ImageKind::Header);
    assert_eq!(request.color_hint, "peach, cream");
    assert_eq!(request.aspect_hint, "16:9");

    assert!(h.observer.events().iter().any(|e| matches!(
        e,
        RegenEvent::ImageReceived { round: 1, url, mime_type, .. }
            if url == "https://cdn.test/sunrise.png" && mime_type == "image/png"
    )));
}

#[tokio::test]
async fn failed_image_is_reported_and_the_turn_continues() {
    let h = harness(
        vec![
            calls_response(vec![image_call("call-1", header_args())]),
            ChatResponse::text_only("<html><body>no picture</body></html>"),
        ],
        ScriptedImages::new(vec![Err(ImageError::GenerationFailed(
            "model declined".into(),
        ))]),
        4,
    );

    let output = h.regenerator.regenerate(&image_request()).await.unwrap();

    assert!(output.images.is_empty());
    assert_eq!(output.html, "<html><body>no picture</body></html>");

    let calls = h.backend.calls();
    // no vision message after a failure
    assert_eq!(calls.len(), 2);
    let ack = function_responses(&calls[1].last_message().content);
    assert_eq!(ack[0]["success"], json!(false));
    assert!(ack[0]["error"].as_str().unwrap().contains("model declined"));

    assert!(h
        .observer
        .events()
        .iter()
        .any(|e| matches!(e, RegenEvent::ImageFailed { round: 1, .. })));
}

#[tokio::test]
async fn invalid_arguments_never_reach_the_generator() {
    let h = harness(
        vec![
            calls_response(vec![image_call(
                "call-1",
                json!({ "prompt": "x", "imageType": "poster" }),
            )]),
            ChatResponse::text_only("<html></html>"),
        ],
        ScriptedImages::always_ok(),
        4,
    );

    let output = h.regenerator.regenerate(&image_request()).await.unwrap();

    assert!(output.images.is_empty());
    assert_eq!(h.images.call_count(), 0);
    let ack = function_responses(&h.backend.calls()[1].last_message().content);
    assert!(ack[0]["error"].as_str().unwrap().contains("imageType"));
}

#[tokio::test]
async fn two_calls_in_one_round_share_one_acknowledgment() {
    let background = json!({
        "prompt": "soft paper texture",
        "imageType": "background",
        "colorPalette": "",
        "aspectRatio": "flexible",
    });
    let h = harness(
        vec![
            calls_response(vec![
                image_call("a", header_args()),
                image_call("b", background),
            ]),
            ChatResponse::text_only("noted"),
            ChatResponse::text_only("<html></html>"),
        ],
        ScriptedImages::always_ok(),
        4,
    );

    let output = h.regenerator.regenerate(&image_request()).await.unwrap();

    assert_eq!(output.images.len(), 2);
    assert_eq!(output.images[0].kind, ImageKind::Header);
    assert_eq!(output.images[1].kind, ImageKind::Background);
    assert_eq!(output.image_rounds, 1);

    let calls = h.backend.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(function_responses(&calls[1].last_message().content).len(), 2);
    assert_eq!(calls[2].last_message().content.len(), 4);
}

#[tokio::test]
async fn round_cap_stops_a_model_that_keeps_asking() {
    let still_asking = |id: &str| {
        ChatResponse::from_blocks(vec![
            ContentBlock::text("<html><body>partial</body></html>"),
            image_call(id, header_args()),
        ])
    };
    let h = harness(
        vec![
            still_asking("r1"),
            ChatResponse::text_only("noted"),
            still_asking("r2"),
            ChatResponse::text_only("noted"),
            still_asking("r3"),
        ],
        ScriptedImages::always_ok(),
        2,
    );

    let output = h.regenerator.regenerate(&image_request()).await.unwrap();

    assert!(output.round_limit_hit);
    assert_eq!(output.image_rounds, 2);
    assert_eq!(output.images.len(), 2);
    assert_eq!(output.html, "<html><body>partial</body></html>");
    assert_eq!(h.images.call_count(), 2);
    assert_eq!(h.backend.call_count(), 5);
    assert!(h
        .observer
        .events()
        .contains(&RegenEvent::RoundLimitReached { rounds: 2 }));
}

#[tokio::test]
async fn calls_are_unsupported_when_images_are_off() {
    let h = harness(
        vec![
            calls_response(vec![image_call("call-1", header_args())]),
            ChatResponse::text_only("<html></html>"),
        ],
        ScriptedImages::always_ok(),
        4,
    );
    let request = image_request().with_images(false);

    let output = h.regenerator.regenerate(&request).await.unwrap();

    assert!(output.images.is_empty());
    assert_eq!(h.images.call_count(), 0);
    let ack = function_responses(&h.backend.calls()[1].last_message().content);
    assert!(ack[0]["error"]
        .as_str()
        .unwrap()
        .contains("unsupported function"));
}

#[tokio::test]
async fn dark_mode_turn_keeps_field_names_and_bans_images() {
    let structure = FormStructure::new(
        "1FAIpQLSe",
        "Contact",
        "",
        vec![FormQuestion::new("0", "entry.111", "Name", QuestionKind::ShortAnswer).required(true)],
    );
    let reply = "```html\n<!DOCTYPE html><html><body style=\"background:#111;color:#eee\">\
                 <form><input name=\"entry.111\" required></form></body></html>\n```";
    let h = harness(
        vec![ChatResponse::text_only(reply)],
        ScriptedImages::always_ok(),
        4,
    );
    let request = RegenerationRequest::new(structure, "dark mode", SUBMIT_URL);

    let output = h.regenerator.regenerate(&request).await.unwrap();

    assert!(output.html.starts_with('<'));
    assert!(output.html.ends_with('>'));
    assert!(output.html.contains("name=\"entry.111\""));
    assert!(!output.html.contains("<img"));
    assert!(!output.html.contains("background-image"));
    assert!(output.images.is_empty());

    let call = &h.backend.calls()[0];
    assert!(call.tools.is_empty());
    assert!(call.system_instruction.contains("IMAGE RULES:"));
}

#[tokio::test]
async fn upstream_failure_fails_the_turn() {
    let backend = Arc::new(ScriptedBackend::failing("Gemini API error (500): boom"));
    let regenerator = Regenerator::new(backend, settings(4)).unwrap();

    let err = regenerator
        .regenerate(&RegenerationRequest::new(rsvp_form(), "dark", SUBMIT_URL))
        .await
        .unwrap_err();
    assert!(matches!(err, RegenError::Upstream(m) if m.contains("500")));
}

#[tokio::test]
async fn missing_credentials_are_a_configuration_error() {
    let backend = Arc::new(ScriptedBackend::without_credentials());
    let regenerator = Regenerator::new(backend.clone(), settings(4)).unwrap();

    let err = regenerator
        .regenerate(&RegenerationRequest::new(rsvp_form(), "dark", SUBMIT_URL))
        .await
        .unwrap_err();
    assert!(matches!(err, RegenError::Configuration(_)));
    assert_eq!(backend.call_count(), 0);
}
