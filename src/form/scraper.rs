use super::types::{FormQuestion, FormStructure, QuestionKind};
use crate::error::ScrapeError;
use reqwest::Client;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Global assigned by Google's form page to the serialized form definition.
const LOAD_DATA_MARKER: &str = "FB_PUBLIC_LOAD_DATA_ = ";
const GOOGLE_FORMS_HOST: &str = "docs.google.com";
const GOOGLE_FORMS_PATH_PREFIX: &str = "/forms";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; FormRestyler/1.0)";

/// Produces a [`FormStructure`] for a public form URL.
pub trait FormStructureProvider: Send + Sync {
    fn scrape<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<FormStructure, ScrapeError>> + Send + 'a>>;
}

/// Fetches a public Google Form page and normalises its embedded payload.
pub struct GoogleFormScraper {
    client: Client,
}

impl GoogleFormScraper {
    pub fn new(timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    async fn fetch_page(&self, url: &url::Url) -> Result<String, ScrapeError> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| ScrapeError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Fetch(format!(
                "{} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            )));
        }

        response
            .text()
            .await
            .map_err(|e| ScrapeError::Fetch(e.to_string()))
    }
}

impl FormStructureProvider for GoogleFormScraper {
    fn scrape<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<FormStructure, ScrapeError>> + Send + 'a>> {
        Box::pin(async move {
            let parsed = check_google_form_url(url)?;
            let html = self.fetch_page(&parsed).await?;
            let structure = parse_form_page(url, &html)?;
            tracing::info!(
                form_id = %structure.form_id,
                questions = structure.questions.len(),
                "form structure extracted"
            );
            Ok(structure)
        })
    }
}

/// Reject anything that is not an http(s) Google Forms URL.
pub fn check_google_form_url(url: &str) -> Result<url::Url, ScrapeError> {
    let invalid = || ScrapeError::NotAGoogleForm("please provide a valid Google Form URL".into());
    let parsed = url::Url::parse(url).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ScrapeError::NotAGoogleForm(format!(
            "unsupported scheme {}",
            parsed.scheme()
        )));
    }
    if parsed.host_str() != Some(GOOGLE_FORMS_HOST)
        || !parsed.path().starts_with(GOOGLE_FORMS_PATH_PREFIX)
    {
        return Err(invalid());
    }
    Ok(parsed)
}

/// Parse a fetched form page into a [`FormStructure`].
pub fn parse_form_page(url: &str, html: &str) -> Result<FormStructure, ScrapeError> {
    let script = find_load_data_script(html);
    let source = script.as_deref().unwrap_or(html);
    let json = extract_load_data(source)?;
    let raw: Value =
        serde_json::from_str(json).map_err(|e| ScrapeError::Parse(e.to_string()))?;
    Ok(normalise(url, &raw))
}

fn find_load_data_script(html: &str) -> Option<String> {
    use ::scraper::{Html, Selector};

    let document = Html::parse_document(html);
    let selector = Selector::parse("script").ok()?;
    document
        .select(&selector)
        .map(|el| el.text().collect::<String>())
        .find(|text| text.contains(LOAD_DATA_MARKER))
}

/// Slice the JSON array that follows the load-data marker.
///
/// Tracks bracket depth and skips brackets inside string literals, so option
/// text such as `"[draft]"` does not end the array early.
fn extract_load_data(source: &str) -> Result<&str, ScrapeError> {
    let marker_at = source.find(LOAD_DATA_MARKER).ok_or_else(|| {
        ScrapeError::NotAGoogleForm(
            "could not find form data; make sure the form is public".into(),
        )
    })?;
    let start = marker_at + LOAD_DATA_MARKER.len();
    let body = &source[start..];
    if !body.starts_with('[') {
        return Err(ScrapeError::Parse("form data is not a JSON array".into()));
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&body[..=i]);
                }
            }
            _ => {}
        }
    }

    Err(ScrapeError::Parse("form data array is not terminated".into()))
}

fn form_id_from_url(url: &str) -> String {
    const PREFIX: &str = "/forms/d/e/";
    let Some(at) = url.find(PREFIX) else {
        return String::new();
    };
    let rest = &url[at + PREFIX.len()..];
    match rest.find('/') {
        Some(end) => rest[..end].to_string(),
        None => String::new(),
    }
}

fn str_at<'a>(value: &'a Value, index: usize) -> Option<&'a str> {
    value.get(index).and_then(Value::as_str)
}

fn normalise(url: &str, raw: &Value) -> FormStructure {
    let meta = raw.get(1).unwrap_or(&Value::Null);
    let title = str_at(meta, 8).unwrap_or("Untitled Form");
    let description = str_at(meta, 0).unwrap_or("");
    let items = meta.get(1).and_then(Value::as_array);

    let questions = items
        .into_iter()
        .flatten()
        .enumerate()
        .filter_map(|(index, item)| normalise_question(index, item))
        .collect();

    FormStructure::new(form_id_from_url(url), title, description, questions)
}

fn normalise_question(index: usize, item: &Value) -> Option<FormQuestion> {
    let code = item.get(3).and_then(Value::as_i64).unwrap_or(-1);
    let kind = QuestionKind::from_google_code(code);
    if kind == QuestionKind::Unknown {
        return None;
    }

    let id = match item.get(0) {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => index.to_string(),
    };
    let text = str_at(item, 1).unwrap_or("");

    let answer = item.get(4).and_then(|a| a.get(0)).unwrap_or(&Value::Null);
    let entry_key = match answer.get(0) {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };
    let required = answer.get(2).and_then(Value::as_i64) == Some(1);
    let options = answer
        .get(1)
        .and_then(Value::as_array)
        .map(|opts| {
            opts.iter()
                .map(|o| str_at(o, 0).unwrap_or("").to_string())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let mut question = FormQuestion::new(id, format!("entry.{entry_key}"), text, kind)
        .required(required)
        .with_options(options);

    if kind == QuestionKind::LinearScale {
        let bounds = answer.get(3).unwrap_or(&Value::Null);
        let labels = answer.get(4).unwrap_or(&Value::Null);
        question = question.with_scale(
            bounds.get(0).and_then(Value::as_i64).unwrap_or(1),
            bounds.get(1).and_then(Value::as_i64).unwrap_or(5),
            str_at(labels, 0).unwrap_or(""),
            str_at(labels, 1).unwrap_or(""),
        );
    }

    Some(question)
}
