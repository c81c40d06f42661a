// ABOUTME: Decision oracle interface for semantic arbitration and query decomposition.
// ABOUTME: Includes GatewayOracle, which asks an OpenAI-compatible chat endpoint for JSON answers.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

use super::error::OracleError;
use super::types::{ArbitrationRequest, ArbitrationResponse, DecompositionRequest, SelectionMode};
use crate::config::OracleConfig;

/// External reasoning service consulted by the arbiter and the decomposer.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Pick candidate indices for the query. Indices may be out of range;
    /// callers filter them.
    async fn arbitrate(
        &self,
        request: &ArbitrationRequest,
    ) -> Result<ArbitrationResponse, OracleError>;

    /// Split the query into one sub-query per worker identity.
    async fn decompose(
        &self,
        request: &DecompositionRequest,
    ) -> Result<HashMap<String, String>, OracleError>;
}

// =============================================================================
// Gateway Oracle
// =============================================================================

const ARBITRATION_SYSTEM_PROMPT: &str = "You route user requests to specialized agents. \
You are given a request and a numbered list of candidate agents with their descriptions and \
match scores. Decide which agents are actually needed. Ignore agents that only matched on \
incidental words. Respond with JSON only, in the form \
{\"selected\": [<candidate numbers>], \"reasoning\": \"<one sentence>\"}.";

const DECOMPOSITION_SYSTEM_PROMPT: &str = "You split a user request between specialized agents. \
For each agent listed, extract only the part of the request that agent should handle, phrased \
as a standalone request. Respond with JSON only, in the form \
{\"sub_queries\": {\"<agent id>\": \"<request for that agent>\"}}.";

lazy_static! {
    static ref JSON_FENCE: Regex =
        Regex::new(r"(?s)```(?:json)?\s*(\{.*\})\s*```").expect("valid fence regex");
}

/// Oracle backed by a chat completions endpoint.
pub struct GatewayOracle {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GatewayOracle {
    pub fn new(config: &OracleConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        }
    }

    /// Build a non-streaming chat completions body.
    fn build_request_body(&self, system: &str, user: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user }
            ],
            "temperature": 0,
            "stream": false
        })
    }

    /// Send a chat completion and return the assistant message content.
    async fn complete(&self, system: &str, user: &str) -> Result<String, OracleError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request_body(system, user);

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(
                serde_json::to_string(&body)
                    .map_err(|e| OracleError::Malformed(e.to_string()))?,
            );
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| OracleError::Unavailable(format!("request failed: {}", e)))?;

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|e| OracleError::Unavailable(format!("failed to read body: {}", e)))?;

        if !status.is_success() {
            log::error!("[GatewayOracle] HTTP {} from {}", status, url);
            return Err(OracleError::Unavailable(format!(
                "HTTP {}: {}",
                status,
                truncate(&body_text, 200)
            )));
        }

        extract_message_content(&body_text)
    }
}

#[async_trait]
impl Oracle for GatewayOracle {
    async fn arbitrate(
        &self,
        request: &ArbitrationRequest,
    ) -> Result<ArbitrationResponse, OracleError> {
        let content = self
            .complete(ARBITRATION_SYSTEM_PROMPT, &render_arbitration_prompt(request))
            .await?;
        parse_arbitration(&content)
    }

    async fn decompose(
        &self,
        request: &DecompositionRequest,
    ) -> Result<HashMap<String, String>, OracleError> {
        let content = self
            .complete(
                DECOMPOSITION_SYSTEM_PROMPT,
                &render_decomposition_prompt(request),
            )
            .await?;
        parse_decomposition(&content)
    }
}

// =============================================================================
// Prompt Rendering
// =============================================================================

fn render_arbitration_prompt(request: &ArbitrationRequest) -> String {
    let mut prompt = format!("Request: {}\n\nCandidates:\n", request.query);
    for (i, candidate) in request.candidates.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. {} (match score {:.2}): {}\n",
            i, candidate.identity, candidate.score, candidate.description
        ));
    }
    prompt.push('\n');
    prompt.push_str(match request.mode {
        SelectionMode::MultiSelect => {
            "Select every candidate needed to fully answer the request."
        }
        SelectionMode::SingleBest => "Select the single best candidate.",
    });
    prompt
}

fn render_decomposition_prompt(request: &DecompositionRequest) -> String {
    let mut prompt = format!("Request: {}\n\nAgents:\n", request.query);
    for worker in &request.workers {
        prompt.push_str(&format!("- {}: {}\n", worker.identity, worker.description));
    }
    prompt
}

// =============================================================================
// Response Parsing
// =============================================================================

/// Pull `choices[0].message.content` out of a chat completions response.
fn extract_message_content(body: &str) -> Result<String, OracleError> {
    let parsed: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| OracleError::Malformed(format!("response is not JSON: {}", e)))?;

    parsed
        .pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| OracleError::Malformed("missing choices[0].message.content".into()))
}

/// Locate the JSON object in model output, unwrapping a fenced block if present.
fn extract_json_object(content: &str) -> Result<serde_json::Value, OracleError> {
    let candidate = if let Some(captures) = JSON_FENCE.captures(content) {
        captures.get(1).map(|m| m.as_str()).unwrap_or(content)
    } else {
        match (content.find('{'), content.rfind('}')) {
            (Some(start), Some(end)) if end > start => &content[start..=end],
            _ => {
                return Err(OracleError::Malformed(format!(
                    "no JSON object in: {}",
                    truncate(content, 100)
                )));
            }
        }
    };

    serde_json::from_str(candidate)
        .map_err(|e| OracleError::Malformed(format!("invalid JSON: {}", e)))
}

fn parse_arbitration(content: &str) -> Result<ArbitrationResponse, OracleError> {
    let value = extract_json_object(content)?;

    let selected = value
        .get("selected")
        .or_else(|| value.get("indices"))
        .and_then(|v| v.as_array())
        .ok_or_else(|| OracleError::Malformed("missing \"selected\" array".into()))?;

    let indices = selected
        .iter()
        .map(|v| {
            v.as_i64()
                .ok_or_else(|| OracleError::Malformed(format!("non-integer index: {}", v)))
        })
        .collect::<Result<Vec<i64>, _>>()?;

    let rationale = value
        .get("reasoning")
        .or_else(|| value.get("rationale"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    Ok(ArbitrationResponse { indices, rationale })
}

fn parse_decomposition(content: &str) -> Result<HashMap<String, String>, OracleError> {
    let value = extract_json_object(content)?;

    let map = value
        .get("sub_queries")
        .and_then(|v| v.as_object())
        .ok_or_else(|| OracleError::Malformed("missing \"sub_queries\" object".into()))?;

    Ok(map
        .iter()
        .filter_map(|(id, text)| text.as_str().map(|t| (id.clone(), t.to_string())))
        .collect())
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::types::{ArbitrationCandidate, WorkerDescriptor};

    fn make_oracle() -> GatewayOracle {
        GatewayOracle::new(&OracleConfig {
            base_url: "https://api.example.com/v1/".to_string(),
            model: "router-small".to_string(),
            api_key: None,
            timeout_ms: 5_000,
        })
    }

    // =========================================================================
    // Request Building
    // =========================================================================

    #[test]
    fn builds_non_streaming_request_body() {
        let oracle = make_oracle();
        let body = oracle.build_request_body("system text", "user text");

        assert_eq!(body["model"], "router-small");
        assert_eq!(body["stream"], false);
        assert_eq!(body["temperature"], 0);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["content"], "user text");
        assert_eq!(oracle.base_url, "https://api.example.com/v1");
    }

    #[test]
    fn arbitration_prompt_numbers_candidates() {
        let request = ArbitrationRequest {
            query: "show tickets and AWS cost".to_string(),
            candidates: vec![
                ArbitrationCandidate {
                    identity: "tickets".to_string(),
                    description: "Support tickets".to_string(),
                    score: 0.4,
                },
                ArbitrationCandidate {
                    identity: "cost".to_string(),
                    description: "Cloud spend".to_string(),
                    score: 0.2,
                },
            ],
            mode: SelectionMode::SingleBest,
        };

        let prompt = render_arbitration_prompt(&request);
        assert!(prompt.contains("Request: show tickets and AWS cost"));
        assert!(prompt.contains("0. tickets (match score 0.40): Support tickets"));
        assert!(prompt.contains("1. cost (match score 0.20): Cloud spend"));
        assert!(prompt.contains("single best"));
    }

    #[test]
    fn decomposition_prompt_lists_workers() {
        let request = DecompositionRequest {
            query: "show tickets and AWS cost".to_string(),
            workers: vec![WorkerDescriptor {
                identity: "cost".to_string(),
                description: "Cloud spend".to_string(),
            }],
        };
        let prompt = render_decomposition_prompt(&request);
        assert!(prompt.contains("- cost: Cloud spend"));
    }

    // =========================================================================
    // Response Parsing
    // =========================================================================

    #[test]
    fn extracts_message_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#;
        assert_eq!(extract_message_content(body).unwrap(), "hello");
    }

    #[test]
    fn missing_content_is_malformed() {
        let err = extract_message_content(r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, OracleError::Malformed(_)));

        let err = extract_message_content("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, OracleError::Malformed(_)));
    }

    #[test]
    fn parses_plain_arbitration_json() {
        let resp = parse_arbitration(r#"{"selected": [0, 2], "reasoning": "both needed"}"#)
            .unwrap();
        assert_eq!(resp.indices, vec![0, 2]);
        assert_eq!(resp.rationale, "both needed");
    }

    #[test]
    fn parses_fenced_arbitration_json() {
        let content = "Here you go:\n```json\n{\"selected\": [1, -1, 7]}\n```";
        let resp = parse_arbitration(content).unwrap();
        assert_eq!(resp.indices, vec![1, -1, 7]);
        assert!(resp.rationale.is_empty());
    }

    #[test]
    fn parses_arbitration_json_surrounded_by_text() {
        let content = "I think {\"selected\": [], \"reasoning\": \"unsure\"} is right";
        let resp = parse_arbitration(content).unwrap();
        assert!(resp.indices.is_empty());
    }

    #[test]
    fn rejects_arbitration_without_selection() {
        assert!(matches!(
            parse_arbitration(r#"{"reasoning": "none"}"#),
            Err(OracleError::Malformed(_))
        ));
        assert!(matches!(
            parse_arbitration(r#"{"selected": ["zero"]}"#),
            Err(OracleError::Malformed(_))
        ));
        assert!(matches!(
            parse_arbitration("no json here"),
            Err(OracleError::Malformed(_))
        ));
    }

    #[test]
    fn parses_decomposition_and_skips_non_strings() {
        let content = r#"{"sub_queries": {"tickets": "show tickets", "cost": "AWS cost", "bad": 3}}"#;
        let map = parse_decomposition(content).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["tickets"], "show tickets");
        assert_eq!(map["cost"], "AWS cost");
    }

    #[test]
    fn rejects_decomposition_without_mapping() {
        assert!(matches!(
            parse_decomposition(r#"{"tickets": "show tickets"}"#),
            Err(OracleError::Malformed(_))
        ));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
