//! OpenAI-compatible analysis backend.
//!
//! [`ApiAnalyzer`] calls any `/v1/chat/completions` endpoint — Ollama
//! (OpenAI mode), OpenAI, Groq, LM Studio, vLLM, etc.  All connection
//! details come from [`AnalysisConfig`]; nothing is hardcoded.  The model
//! is instructed to answer with a single JSON object matching
//! [`AnalysisOutcome`], which is deserialized strictly at this boundary.

use async_trait::async_trait;

use crate::analysis::engine::{AnalysisError, AnalysisOutcome, AnalysisRequest, Analyzer};
use crate::config::AnalysisConfig;

/// System prompt: segmentation + edit-production contract.
const SYSTEM_PROMPT: &str = "\
You segment a live speech transcript into coherent chunks and decide how \
each chunk fits into an existing topic tree. Respond with a single JSON \
object and nothing else, in this shape:\n\
{\"chunks\": [{\"text\": \"...\", \"is_complete\": true}],\n \
\"edits\": [{\"action\": \"CREATE\", \"parent\": {\"existing\": 1}, \
\"title\": \"...\", \"summary\": \"...\", \"content\": \"...\", \
\"relationship\": \"child of\"},\n          {\"action\": \"APPEND\", \
\"target\": {\"created\": 0}, \"content\": \"...\"}]}\n\
Mark a chunk is_complete=false when the speaker has not finished the \
thought; its text will be resubmitted with the next batch. Only produce \
edits for complete chunks. Reference nodes created earlier in the same \
batch with {\"created\": index}.";

// ---------------------------------------------------------------------------
// ApiAnalyzer
// ---------------------------------------------------------------------------

/// Production [`Analyzer`] speaking the OpenAI chat-completions wire format.
pub struct ApiAnalyzer {
    client: reqwest::Client,
    config: AnalysisConfig,
}

impl ApiAnalyzer {
    /// Build an `ApiAnalyzer` from application config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`; a default client is the last-resort fallback
    /// if the builder fails (should never happen in practice).
    pub fn from_config(config: &AnalysisConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    /// Flatten one request into the user message.
    fn build_user_message(request: &AnalysisRequest<'_>) -> String {
        let mut msg = String::new();

        msg.push_str("## Existing tree\n");
        msg.push_str(request.tree_summary);
        msg.push_str("\n\n## Recent transcript (context only)\n");
        msg.push_str(request.transcript_history);

        if let Some(carry) = request.incomplete_carry {
            msg.push_str("\n\n## Unfinished text from the previous batch\n");
            msg.push_str(carry);
        }

        msg.push_str("\n\n## Text to analyze\n");
        msg.push_str(request.text);
        msg
    }
}

#[async_trait]
impl Analyzer for ApiAnalyzer {
    /// Send the request to the configured endpoint and parse the response.
    ///
    /// The `Authorization: Bearer …` header is attached only when
    /// `config.api_key` is a non-empty string — safe for Ollama and other
    /// local providers that require no authentication.
    async fn analyze(
        &self,
        request: AnalysisRequest<'_>,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);
        let user_msg = Self::build_user_message(&request);

        let body = serde_json::json!({
            "model":       self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user",   "content": user_msg      }
            ],
            "stream":      false,
            "temperature": self.config.temperature,
        });

        let mut req = self.client.post(&url).json(&body);
        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AnalysisError::Parse(e.to_string()))?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(AnalysisError::EmptyResponse)?
            .trim();

        if content.is_empty() {
            return Err(AnalysisError::EmptyResponse);
        }

        let outcome: AnalysisOutcome = serde_json::from_str(strip_code_fence(content))
            .map_err(|e| AnalysisError::Parse(e.to_string()))?;

        log::debug!(
            "analysis: {} chunks, {} edits",
            outcome.chunks.len(),
            outcome.edits.len()
        );
        Ok(outcome)
    }
}

/// Remove a surrounding markdown code fence, which chat models add even
/// when told not to.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the optional language tag on the opening fence line.
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_start_matches(['\r', '\n'])
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
