//! Structural form model and the Google Forms extractor that produces it.

pub mod scraper;
pub mod types;

pub use scraper::{
    FormStructureProvider, GoogleFormScraper, check_google_form_url, parse_form_page,
};
pub use types::{FormQuestion, FormStructure, QuestionKind};
