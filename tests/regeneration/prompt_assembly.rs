use std::sync::Arc;

use formrestyler::images::ImageKind;
use formrestyler::llm::{ChatResponse, ContentBlock, InlineImage, MessageRole};
use formrestyler::regen::{HistoryTurn, RegenerationRequest, Regenerator, StyleGuide};

use crate::support::{
    RecordedCall, SUBMIT_URL, ScriptedBackend, ScriptedImages, image, rsvp_form, settings,
    text_blocks,
};

async fn single_call(request: &RegenerationRequest, with_generator: bool) -> RecordedCall {
    let backend = Arc::new(ScriptedBackend::new(vec![ChatResponse::text_only(
        "<html><body>ok</body></html>",
    )]));
    let mut regenerator = Regenerator::new(backend.clone(), settings(4)).unwrap();
    if with_generator {
        regenerator = regenerator.with_image_generator(Arc::new(ScriptedImages::always_ok()));
    }
    regenerator.regenerate(request).await.unwrap();

    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    calls.into_iter().next().unwrap()
}

#[tokio::test]
async fn only_the_last_ten_history_turns_are_replayed() {
    let history: Vec<HistoryTurn> = (0..15)
        .map(|i| {
            if i % 2 == 0 {
                HistoryTurn::user(format!("request {i}"))
            } else {
                HistoryTurn::model(format!("<p>html {i}</p>"))
            }
        })
        .collect();
    let request = RegenerationRequest::new(rsvp_form(), "make it pink", SUBMIT_URL)
        .with_history(history);

    let call = single_call(&request, false).await;

    // ten replayed turns plus the new message
    assert_eq!(call.messages.len(), 11);
    assert_eq!(call.messages[0].text(), "<p>html 5</p>");
    assert_eq!(call.messages[0].role, MessageRole::Model);
    assert_eq!(call.messages[9].text(), "request 14");
    assert!(call.messages.iter().all(|m| m.text() != "request 4"));
    assert_eq!(call.last_message().role, MessageRole::User);
}

#[tokio::test]
async fn parts_follow_style_guide_images_screenshot_prompt_order() {
    let request = RegenerationRequest::new(rsvp_form(), "match the mood", SUBMIT_URL)
        .with_style_guide(StyleGuide {
            image_base64: "data:image/jpeg;base64,/9j/STYLE".into(),
            focus_note: "the typography".into(),
        })
        .with_active_images(vec![
            image(ImageKind::Header, "https://cdn.test/header.png"),
            image(ImageKind::Background, "https://cdn.test/bg.png"),
        ])
        .with_screenshot(InlineImage::new("image/png", "U0NSRUVO"));

    let call = single_call(&request, false).await;
    let parts = &call.last_message().content;
    assert_eq!(parts.len(), 9);

    match &parts[0] {
        ContentBlock::Image { image } => {
            assert_eq!(image.mime_type, "image/jpeg");
            assert_eq!(image.data, "/9j/STYLE");
        }
        other => panic!("expected style guide image, got {other:?}"),
    }

    let texts = text_blocks(call.last_message());
    assert_eq!(texts.len(), 5);
    assert!(texts[0].contains("Focus specifically on: the typography."));
    assert!(texts[1].contains("existing header image"));
    assert!(texts[1].contains("https://cdn.test/header.png"));
    assert!(texts[2].contains("existing background image"));
    assert!(texts[3].contains("screenshot"));
    assert!(texts[4].contains("Creator request: match the mood"));

    assert!(matches!(&parts[6], ContentBlock::Image { image } if image.data == "U0NSRUVO"));
    assert!(matches!(parts.last(), Some(ContentBlock::Text { .. })));
}

#[tokio::test]
async fn previous_html_precedes_the_request_in_one_text_part() {
    let request = RegenerationRequest::new(rsvp_form(), "rounder buttons", SUBMIT_URL)
        .with_history(vec![
            HistoryTurn::user("make it blue"),
            HistoryTurn::model("<html>stale</html>"),
        ])
        .with_previous_html("<html><body>current</body></html>");

    let call = single_call(&request, false).await;
    let texts = text_blocks(call.last_message());
    assert_eq!(texts.len(), 1);

    let text = &texts[0];
    let html_at = text.find("<html><body>current</body></html>").unwrap();
    let request_at = text.find("Creator request: rounder buttons").unwrap();
    assert!(html_at < request_at);
    assert!(text.ends_with("Return the complete updated HTML page."));
    assert!(!text.contains("stale"));
}

#[tokio::test]
async fn system_instruction_carries_contract_and_skips_unknown_questions() {
    let request = RegenerationRequest::new(rsvp_form(), "dark mode", SUBMIT_URL);
    let call = single_call(&request, false).await;

    let system = &call.system_instruction;
    assert!(system.contains(SUBMIT_URL));
    assert!(system.contains("entry.111"));
    assert!(system.contains("entry.222"));
    assert!(!system.contains("entry.333"));
    assert!(!system.contains("Upload a photo"));
    assert!(system.contains("IMAGE RULES:"));
    assert!(call.tools.is_empty());
}

#[tokio::test]
async fn image_tool_is_offered_only_with_a_generator() {
    let request =
        RegenerationRequest::new(rsvp_form(), "festive header", SUBMIT_URL).with_images(true);

    let without = single_call(&request, false).await;
    assert!(without.tools.is_empty());
    assert!(without.system_instruction.contains("IMAGE RULES:"));

    let with = single_call(&request, true).await;
    assert_eq!(with.tools.len(), 1);
    assert_eq!(with.tools[0].name, "generate_image");
    assert!(with.system_instruction.contains("IMAGE GENERATION GUIDELINES"));
}
