use std::time::Duration;
use log::info;
use serde_json::{json, Value};
use crate::analyzers::library::LibrarySummary;
use crate::{LibraryError, Result};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Stored in the summary when the annotation call fails.
pub const NO_AI_RESPONSE: &str = "No AI response due to an error.";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Produces free-text commentary on a library summary.
pub trait Annotator {
    fn annotate(&self, summary: &LibrarySummary) -> Result<String>;
}

pub fn build_prompt(summary: &LibrarySummary) -> Result<String> {
    let stats = serde_json::to_string(summary)?;
    Ok(format!(
        "You are an expert music critic and data analyst.\n\
         Analyze the following statistical summary of a personal music library:\n\n\
         {}\n\n\
         Please tell me:\n\
         1. What does the average bitrate say about the audio quality the user prefers?\n\
         2. Based on the average duration and the genre, is it coherent? \
         (E.g. punk songs tend to be short, prog songs long.)\n\
         3. Consider the variety: are there many artists for the number of songs, \
         or does the user always listen to the same ones?\n\
         4. Give me a brief conclusion about this listener's profile.\n",
        stats
    ))
}

/// Pulls the generated text out of a `generateContent` response body.
pub fn parse_response(body: &Value) -> Result<String> {
    if let Some(message) = body.pointer("/error/message").and_then(Value::as_str) {
        return Err(LibraryError::Annotation(message.to_string()));
    }

    let parts = body
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| LibraryError::Annotation("response has no candidates".into()))?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();

    if text.trim().is_empty() {
        return Err(LibraryError::Annotation("response contained no text".into()));
    }
    Ok(text)
}

/// Calls the Gemini `generateContent` REST endpoint.
pub struct GeminiAnnotator {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl GeminiAnnotator {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LibraryError::InvalidOptions("GEMINI_API_KEY is empty".into()));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LibraryError::Annotation(e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            model: model.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint.trim_end_matches('/'), self.model)
    }
}

impl Annotator for GeminiAnnotator {
    fn annotate(&self, summary: &LibrarySummary) -> Result<String> {
        let prompt = build_prompt(summary)?;
        info!("Requesting AI analysis from {}", self.model);

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&json!({ "contents": [{ "parts": [{ "text": prompt }] }] }))
            .send()
            .map_err(|e| LibraryError::Annotation(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .map_err(|e| LibraryError::Annotation(format!("{} (HTTP {})", e, status)))?;
        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::library::LibraryAnalyzer;

    #[test]
    fn prompt_embeds_summary_json() {
        let summary = LibraryAnalyzer::new().summarize(&[], 1.0);
        let prompt = build_prompt(&summary).unwrap();
        assert!(prompt.contains("\"files_analyzed\":0"));
        assert!(prompt.contains("listener's profile"));
    }

    #[test]
    fn parses_candidate_text() {
        let body = json!({
            "candidates": [{ "content": { "parts": [{ "text": "Audiophile " }, { "text": "listener." }] } }]
        });
        assert_eq!(parse_response(&body).unwrap(), "Audiophile listener.");
    }

    #[test]
    fn api_errors_and_empty_bodies_are_errors() {
        let error = json!({ "error": { "code": 403, "message": "API key not valid" } });
        match parse_response(&error) {
            Err(LibraryError::Annotation(message)) => assert_eq!(message, "API key not valid"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(parse_response(&json!({})).is_err());
        assert!(parse_response(&json!({ "candidates": [{ "content": { "parts": [] } }] })).is_err());
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(matches!(
            GeminiAnnotator::new("  ", DEFAULT_MODEL),
            Err(LibraryError::InvalidOptions(_))
        ));
    }

    #[test]
    fn url_targets_the_model() {
        let annotator = GeminiAnnotator::new("key", "gemini-test").unwrap().with_endpoint("http://localhost:9/v1/");
        assert_eq!(annotator.url(), "http://localhost:9/v1/models/gemini-test:generateContent");
    }
}
