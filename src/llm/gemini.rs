use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ProposedTask;

const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("AI provider request failed")]
    Transport(#[from] reqwest::Error),
    #[error("AI provider returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("AI response was not valid JSON")]
    Malformed(#[from] serde_json::Error),
    #[error("AI response contained no candidates")]
    NoCandidates,
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    response_mime_type: String,
    temperature: f32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

/// Client for the Gemini `generateContent` endpoint.
///
/// Generation settings lean deterministic (temperature 0.2) and ask for a
/// machine-parseable JSON body outright. One request, one response; no
/// retries, no caching.
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        let model =
            std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        GeminiClient {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model,
        }
    }

    /// Sends the raw schedule text through the fixed instruction prompt and
    /// returns the parsed task array.
    pub async fn generate_schedule(&self, raw_text: &str) -> Result<Vec<ProposedTask>, GeminiError> {
        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: build_prompt(raw_text),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                temperature: 0.2,
            },
        };

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            log::warn!("gemini returned status {}", status);
            return Err(GeminiError::Status(status));
        }

        let body: GeminiResponse = response.json().await?;
        let text = candidate_text(&body).ok_or(GeminiError::NoCandidates)?;
        parse_schedule(text)
    }
}

fn candidate_text(response: &GeminiResponse) -> Option<&str> {
    response
        .candidates
        .first()?
        .content
        .parts
        .first()
        .map(|p| p.text.as_str())
}

/// Parses the model's output text as the required JSON array of
/// `{time, task}` entries. Anything else is the malformed-response case,
/// reported distinctly from upstream failures.
pub fn parse_schedule(text: &str) -> Result<Vec<ProposedTask>, GeminiError> {
    let tasks: Vec<ProposedTask> = serde_json::from_str(text.trim())?;
    Ok(tasks)
}

/// Builds the fixed instruction prompt: rigid output-format rules, one
/// worked example, then the verbatim user text.
pub fn build_prompt(raw_text: &str) -> String {
    format!(
        r#"You are an assistant that converts raw daily schedule text into a structured JSON format.
Your output MUST be a JSON array of objects. Each object must have two string properties: "time" and "task".
For "time", use HH:MM format if a clear time is given (e.g., "9:00", "10:30 AM"). If no specific time is mentioned or it's ambiguous (e.g., "Lunch", "Afternoon break"), use the placeholder "指定なし".
For "task", provide a concise description of the activity.

Example input:
"9:00 team meeting
10:30 work on project alpha
lunch break
call the client at 14:00
prepare the presentation in the evening"

Expected JSON output:
[
  {{"time": "09:00", "task": "team meeting"}},
  {{"time": "10:30", "task": "work on project alpha"}},
  {{"time": "指定なし", "task": "lunch break"}},
  {{"time": "14:00", "task": "call the client"}},
  {{"time": "指定なし", "task": "prepare the presentation"}}
]

User input:
"{raw_text}"

Return ONLY the JSON array. Do not include any other text, explanations, or markdown fences. Ensure the output is valid JSON."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_the_user_text_verbatim() {
        let prompt = build_prompt("9:00 standup\nlunch with Kim");
        assert!(prompt.contains("\"9:00 standup\nlunch with Kim\""));
        assert!(prompt.contains("ONLY the JSON array"));
    }

    #[test]
    fn parse_schedule_accepts_a_valid_array() {
        let parsed = parse_schedule(r#"[{"time":"09:00","task":"standup"}]"#).expect("parse");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].time, "09:00");
        assert_eq!(parsed[0].task, "standup");
    }

    #[test]
    fn parse_schedule_rejects_non_array_text() {
        assert!(parse_schedule("Here is your schedule!").is_err());
        assert!(parse_schedule(r#"{"time":"09:00","task":"standup"}"#).is_err());
    }

    #[test]
    fn candidate_text_handles_empty_candidates() {
        let response = GeminiResponse { candidates: vec![] };
        assert!(candidate_text(&response).is_none());
    }
}
