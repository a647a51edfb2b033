//! Restaurant enrichment through a text-completion service.
//!
//! One call per restaurant, never retried here: a failed call surfaces as a
//! `CompletionError` and the batch layer decides what to do with it.
mod provider;
mod response;

pub use provider::{build_service, CompletionError, CompletionService, ProviderConfig};
pub(crate) use provider::run_with_stdin;
pub use response::extract_object;

use crate::dataset::Campus;
use serde_json::{Map, Value};

const ENRICH_PROMPT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/enrich_restaurant.md"
));
const EXTRACT_PROMPT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/extract_listing.md"
));

/// Page text beyond this many characters is not sent for extraction.
pub const PAGE_TEXT_LIMIT: usize = 2000;

/// Current local time in RFC 3339, as stored in `last_updated`.
pub fn now_timestamp() -> String {
    chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false)
}

pub struct Enricher<'a> {
    service: &'a dyn CompletionService,
}

impl<'a> Enricher<'a> {
    pub fn new(service: &'a dyn CompletionService) -> Self {
        Self { service }
    }

    /// Ask for fresh details about `name` near `campus`.
    pub fn enrich(&self, name: &str, campus: Campus) -> Result<Map<String, Value>, CompletionError> {
        let prompt = build_enrich_prompt(name, campus, &now_timestamp());
        self.complete_object(&prompt)
    }

    /// Turn captured page text into a record for `name`.
    pub fn extract(&self, name: &str, page_text: &str) -> Result<Map<String, Value>, CompletionError> {
        let prompt = build_extract_prompt(name, page_text);
        self.complete_object(&prompt)
    }

    fn complete_object(&self, prompt: &str) -> Result<Map<String, Value>, CompletionError> {
        let text = self.service.complete(prompt)?;
        tracing::debug!(
            prompt_bytes = prompt.len(),
            response_bytes = text.len(),
            "completion received"
        );
        extract_object(&text)
    }
}

pub fn build_enrich_prompt(name: &str, campus: Campus, now: &str) -> String {
    ENRICH_PROMPT
        .replace("{location}", campus.location_hint())
        .replace("{now}", now)
        .replace("{name}", name)
}

pub fn build_extract_prompt(name: &str, page_text: &str) -> String {
    let page_text: String = page_text.chars().take(PAGE_TEXT_LIMIT).collect();
    EXTRACT_PROMPT
        .replace("{name}", name)
        .replace("{page_text}", &page_text)
}
