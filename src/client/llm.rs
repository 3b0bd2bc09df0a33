// Copyright (c) 2025 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Generative language API client.

use crate::client::{new_http_client, with_retry};
use crate::configuration::{ENV_LLM_MSG_TRACING, LanguageModelSettings, RetrySettings};
use crate::controller::ControllerConfig;
use crate::errors::ServiceError;
use crate::util::bool_from_env;
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Max accepted response size.
const MAX_RESPONSE_SIZE: usize = 1024 * 1024;

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Clone)]
pub struct LanguageModelClient {
    client: awc::Client,
    retry: RetrySettings,
    msg_tracing: bool,
}

impl LanguageModelClient {
    pub fn new(settings: &LanguageModelSettings) -> Self {
        Self {
            client: new_http_client(settings.connection_timeout, settings.request_timeout),
            retry: settings.retry,
            msg_tracing: bool_from_env(ENV_LLM_MSG_TRACING),
        }
    }

    /// Send the prompt to the configured model and return the trimmed text of the first candidate.
    ///
    /// Every failed attempt is retried: transport errors, non-success status codes and responses
    /// without usable text.
    pub async fn generate(
        &self,
        config: &ControllerConfig,
        prompt: &str,
    ) -> Result<String, ServiceError> {
        if !config.has_api_key() {
            return Err(ServiceError::Configuration(
                "Language model API key is not set".into(),
            ));
        }

        let url = config.generate_content_url()?;
        let request = GenerateContentRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text: prompt }],
            }],
        };
        let body = serde_json::to_string(&request)?;
        if self.msg_tracing {
            debug!("[llm] -> {url} {body}");
        }

        info!("Requesting lighting command from model {}", config.model());
        with_retry(self.retry, "llm", |_| self.send(url.as_str(), &body)).await
    }

    async fn send(&self, url: &str, body: &str) -> Result<String, ServiceError> {
        let mut response = self
            .client
            .post(url)
            .insert_header(("Content-Type", "application/json; charset=utf-8"))
            .send_body(body.to_string())
            .await?;
        let status = response.status();
        let payload = response.body().limit(MAX_RESPONSE_SIZE).await?;
        let payload = String::from_utf8_lossy(&payload);
        if self.msg_tracing {
            debug!("[llm] <- {status} {payload}");
        }

        if !status.is_success() {
            return Err(ServiceError::LanguageModel(format!(
                "HTTP {} / {payload}",
                status.as_u16()
            )));
        }

        let response: GenerateContentResponse = serde_json::from_str(&payload)
            .map_err(|e| ServiceError::LanguageModel(format!("Invalid response: {e}")))?;
        let text = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::LanguageModel("Response without candidates".into()))?
            .content
            .and_then(|c| c.parts.into_iter().next())
            .ok_or_else(|| ServiceError::LanguageModel("Response without content parts".into()))?
            .text
            .unwrap_or_default();

        let text = text.trim();
        if text.is_empty() {
            return Err(ServiceError::LanguageModel("Model returned no text".into()));
        }
        Ok(text.to_string())
    }
}
