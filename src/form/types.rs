use serde::{Deserialize, Serialize};

/// Closed set of question kinds a form can contain.
///
/// `Unknown` exists only so that unrecognised kinds survive deserialization
/// long enough to be dropped; it never reaches generation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QuestionKind {
    ShortAnswer,
    Paragraph,
    MultipleChoice,
    Checkboxes,
    Dropdown,
    LinearScale,
    Date,
    Time,
    #[serde(other)]
    Unknown,
}

impl QuestionKind {
    /// Map the numeric item type used in Google's form payload.
    #[must_use]
    pub fn from_google_code(code: i64) -> Self {
        match code {
            0 => Self::ShortAnswer,
            1 => Self::Paragraph,
            2 => Self::MultipleChoice,
            3 => Self::Checkboxes,
            4 => Self::Dropdown,
            5 => Self::LinearScale,
            9 => Self::Date,
            10 => Self::Time,
            _ => Self::Unknown,
        }
    }

    /// How the kind must be rendered, as stated to the model.
    #[must_use]
    pub fn render_hint(self) -> &'static str {
        match self {
            Self::ShortAnswer => "a single-line text input",
            Self::Paragraph => "a multi-line <textarea>",
            Self::MultipleChoice => "radio buttons (single selection)",
            Self::Checkboxes => "checkboxes (multiple selections allowed)",
            Self::Dropdown => "a <select> dropdown (single selection)",
            Self::LinearScale => "one horizontal row of numbered radio buttons",
            Self::Date => "a date input",
            Self::Time => "a time input",
            Self::Unknown => "nothing (unsupported)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormQuestion {
    pub id: String,
    /// Submission field name, e.g. `entry.123456789`. Never rewritten.
    pub entry_id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    #[serde(default)]
    pub required: bool,
    /// Option text in source order. Empty for free-text kinds.
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_max: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_min_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_max_label: Option<String>,
}

impl FormQuestion {
    pub fn new(
        id: impl Into<String>,
        entry_id: impl Into<String>,
        text: impl Into<String>,
        kind: QuestionKind,
    ) -> Self {
        Self {
            id: id.into(),
            entry_id: entry_id.into(),
            text: text.into(),
            kind,
            required: false,
            options: Vec::new(),
            scale_min: None,
            scale_max: None,
            scale_min_label: None,
            scale_max_label: None,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_scale(mut self, min: i64, max: i64, min_label: &str, max_label: &str) -> Self {
        self.scale_min = Some(min);
        self.scale_max = Some(max);
        self.scale_min_label = Some(min_label.to_string());
        self.scale_max_label = Some(max_label.to_string());
        self
    }
}

/// Canonical, source-independent form model.
///
/// Deserializing drops `unknown` questions, so a structure that crossed an
/// API boundary already satisfies the invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawFormStructure")]
pub struct FormStructure {
    pub form_id: String,
    pub title: String,
    pub description: String,
    pub questions: Vec<FormQuestion>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFormStructure {
    #[serde(default)]
    form_id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    questions: Vec<FormQuestion>,
}

impl From<RawFormStructure> for FormStructure {
    fn from(raw: RawFormStructure) -> Self {
        Self::new(raw.form_id, raw.title, raw.description, raw.questions)
    }
}

impl FormStructure {
    pub fn new(
        form_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        questions: Vec<FormQuestion>,
    ) -> Self {
        Self {
            form_id: form_id.into(),
            title: title.into(),
            description: description.into(),
            questions: questions
                .into_iter()
                .filter(|q| q.kind != QuestionKind::Unknown)
                .collect(),
        }
    }

    /// Copy of this structure containing only questions that may be sent to
    /// the model. Guards against callers that pushed `unknown` questions into
    /// the public field after construction.
    #[must_use]
    pub fn renderable(&self) -> Self {
        Self::new(
            self.form_id.clone(),
            self.title.clone(),
            self.description.clone(),
            self.questions.clone(),
        )
    }
}
