use reqwest::Client;
use thiserror::Error;

use crate::models::{GenerateRequest, GenerateResponse, ErrorResponse, ProposedTask};

const DEFAULT_SERVER_URL: &str = "http://localhost:8787";

/// Client-side failure taxonomy for the proposal round trip. Every variant
/// renders as the message shown in the error banner.
#[derive(Debug, Error)]
pub enum ProposalError {
    #[error("could not reach the schedule service: {0}")]
    Transport(String),
    #[error("{0}")]
    Server(String),
    #[error("schedule generation failed (HTTP {0})")]
    Status(u16),
    #[error("the AI response could not be understood - this is not a problem with your input, please retry")]
    Malformed,
}

/// Talks to the schedule proposal service. One request at a time by
/// construction: the caller disables the generate action while a request is
/// in flight.
#[derive(Clone)]
pub struct ProposalClient {
    client: Client,
    base_url: String,
}

impl ProposalClient {
    pub fn from_env() -> Self {
        let base_url = std::env::var("DAYPLAN_SERVER_URL")
            .unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
        ProposalClient {
            client: Client::new(),
            base_url,
        }
    }

    pub async fn generate(&self, raw_text: &str) -> Result<Vec<ProposedTask>, ProposalError> {
        log::debug!("requesting schedule proposal from {}", self.base_url);
        let response = self
            .client
            .post(format!("{}/api/generate-schedule", self.base_url))
            .json(&GenerateRequest {
                raw_schedule_text: raw_text.to_string(),
            })
            .send()
            .await
            .map_err(|e| ProposalError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ProposalError::Transport(e.to_string()))?;

        proposal_from_response(status, &body)
    }
}

/// Maps a raw service response to a proposal or the appropriate error:
/// server-provided message when the body carries one, a templated message
/// with the HTTP status otherwise, and the distinct malformed-response error
/// when a success body does not hold a valid task list.
pub fn proposal_from_response(status: u16, body: &str) -> Result<Vec<ProposedTask>, ProposalError> {
    if !(200..300).contains(&status) {
        if let Ok(err) = serde_json::from_str::<ErrorResponse>(body) {
            return Err(ProposalError::Server(err.error));
        }
        return Err(ProposalError::Status(status));
    }

    match serde_json::from_str::<GenerateResponse>(body) {
        Ok(parsed) => Ok(parsed.tasks),
        Err(_) => Err(ProposalError::Malformed),
    }
}
