//! Submission proxy: turns the JSON answers posted by a restyled page into
//! the URL-encoded body Google Forms expects and forwards it.

use crate::error::SubmitError;
use serde_json::Value;

pub const DEFAULT_FORMS_BASE_URL: &str = "https://docs.google.com/forms/d/e";

/// Form ids come from the public form URL and are embedded into the
/// upstream path, so only URL-safe id characters are accepted.
pub fn validate_form_id(form_id: &str) -> Result<(), SubmitError> {
    if form_id.is_empty()
        || form_id.len() > 256
        || !form_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
    {
        return Err(SubmitError::InvalidFormId(form_id.to_string()));
    }
    Ok(())
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Encode an `{entry-key: string | string[]}` object as
/// `application/x-www-form-urlencoded`. Arrays become repeated keys, null and
/// empty values are dropped and `submit=Submit` is appended.
pub fn encode_submission(body: &Value) -> Result<String, SubmitError> {
    let Some(fields) = body.as_object() else {
        return Err(SubmitError::InvalidPayload(
            "expected a JSON object keyed by entry id".into(),
        ));
    };

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in fields {
        match value {
            Value::Array(items) => {
                for item in items {
                    if let Some(text) = scalar_text(item) {
                        serializer.append_pair(key, &text);
                    }
                }
            }
            Value::Object(_) => {
                return Err(SubmitError::InvalidPayload(format!(
                    "field {key} must be a string or a list of strings"
                )));
            }
            other => {
                if let Some(text) = scalar_text(other) {
                    serializer.append_pair(key, &text);
                }
            }
        }
    }
    serializer.append_pair("submit", "Submit");
    Ok(serializer.finish())
}

/// Forwards encoded answers to the form's `formResponse` endpoint.
pub struct SubmissionForwarder {
    base_url: String,
    client: reqwest::Client,
}

impl SubmissionForwarder {
    pub fn new(base_url: &str, timeout_secs: u64) -> anyhow::Result<Self> {
        // A redirect to the thank-you page is itself the success signal.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn response_url(&self, form_id: &str) -> String {
        format!("{}/{form_id}/formResponse", self.base_url)
    }

    pub async fn forward(&self, form_id: &str, body: &Value) -> Result<(), SubmitError> {
        validate_form_id(form_id)?;
        let encoded = encode_submission(body)?;

        let response = self
            .client
            .post(self.response_url(form_id))
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(encoded)
            .send()
            .await
            .map_err(|e| SubmitError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::OK || status.is_redirection() {
            tracing::info!(form_id, status = status.as_u16(), "submission forwarded");
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        tracing::warn!(
            form_id,
            status = status.as_u16(),
            body = %crate::util::truncate_with_ellipsis(&text, 300),
            "submission rejected upstream"
        );
        Err(SubmitError::Rejected {
            status: status.as_u16(),
        })
    }
}
