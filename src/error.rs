use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `FormRestyler`.
///
/// Each subsystem defines its own error enum. Library callers can match on
/// these to decide recovery strategy; binary glue continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum RestylerError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Regeneration pipeline ────────────────────────────────────────────
    #[error("regeneration: {0}")]
    Regen(#[from] RegenError),

    // ── Image generation ─────────────────────────────────────────────────
    #[error("image: {0}")]
    Image(#[from] ImageError),

    // ── Form extraction ──────────────────────────────────────────────────
    #[error("scrape: {0}")]
    Scrape(#[from] ScrapeError),

    // ── Screenshots ──────────────────────────────────────────────────────
    #[error("screenshot: {0}")]
    Screenshot(#[from] ScreenshotError),

    // ── Published forms ──────────────────────────────────────────────────
    #[error("publish: {0}")]
    Publish(#[from] PublishError),

    // ── Submission proxy ─────────────────────────────────────────────────
    #[error("submit: {0}")]
    Submit(#[from] SubmitError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Regeneration errors ─────────────────────────────────────────────────────

/// Failure of one regeneration turn. None of these are retried internally.
#[derive(Debug, Error)]
pub enum RegenError {
    /// No model credential is available.
    #[error("configuration: {0}")]
    Configuration(String),

    /// The caller omitted or malformed a required input.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The generative backend failed or returned an unusable response.
    #[error("upstream generation failed: {0}")]
    Upstream(String),

    #[error("prompt render failed: {0}")]
    Prompt(String),
}

// ─── Image errors ────────────────────────────────────────────────────────────

/// Scoped to a single `generate_image` call. Inside the agent loop these are
/// reported back to the model as failed calls and never abort the turn.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("invalid generate_image arguments: {0}")]
    InvalidArguments(String),

    #[error("image generation failed: {0}")]
    GenerationFailed(String),

    #[error("image upload failed: {0}")]
    UploadFailed(String),

    #[error("unsupported function: {0}")]
    UnsupportedFunction(String),
}

// ─── Scrape errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("not a public Google Form: {0}")]
    NotAGoogleForm(String),

    #[error("failed to fetch form: {0}")]
    Fetch(String),

    #[error("failed to parse form data: {0}")]
    Parse(String),
}

// ─── URL guard errors ────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlGuardError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("only http and https URLs are allowed (got {0})")]
    UnsupportedScheme(String),

    #[error("private URLs are not allowed: {0}")]
    PrivateAddress(String),

    #[error("could not resolve host: {0}")]
    Resolution(String),
}

// ─── Screenshot errors ───────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ScreenshotError {
    #[error("blocked: {0}")]
    Blocked(#[from] UrlGuardError),

    #[error("capture failed: {0}")]
    Capture(String),

    #[error("capture timed out after {0}s")]
    Timeout(u64),
}

// ─── Publish errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("invalid publish request: {0}")]
    Validation(String),

    #[error("store: {0}")]
    Store(String),
}

// ─── Submission errors ───────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("invalid form id: {0}")]
    InvalidFormId(String),

    #[error("invalid submission payload: {0}")]
    InvalidPayload(String),

    #[error("upstream rejected submission with status {status}")]
    Rejected { status: u16 },

    #[error("forwarding failed: {0}")]
    Transport(String),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, RestylerError>;
