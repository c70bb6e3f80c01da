//! Application settings structs, defaults, validation and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across
//! threads.  Invalid values fail fast at startup via
//! [`AppConfig::validate`] — nothing downstream re-checks ranges.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AppPaths;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Validation failures.  Fatal at startup: a misconfigured buffer would
/// either never flush or flush garbage, and neither is recoverable later.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("flush_threshold_chars must be positive")]
    FlushThreshold,

    #[error("history_multiplier must be positive")]
    HistoryMultiplier,

    #[error("immediate_processing_multiplier must be in (0, 3], got {0}")]
    ImmediateMultiplier(f32),

    #[error("substantial_content_ratio must be in (0, 1], got {0}")]
    SubstantialRatio(f32),

    #[error("min_sentences_for_immediate must be at least 1")]
    MinSentences,

    #[error("similarity_threshold must be in (0, 1], got {0}")]
    SimilarityThreshold(f64),

    #[error("analysis timeout_secs must be positive")]
    Timeout,

    #[error("analysis max_retries must be at least 1")]
    MaxRetries,
}

// ---------------------------------------------------------------------------
// BufferConfig
// ---------------------------------------------------------------------------

/// Settings for the text buffer manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Buffer length (chars) past which the complete-sentence prefix is
    /// submitted for analysis.
    pub flush_threshold_chars: usize,
    /// Transcript-history window, as a multiple of `flush_threshold_chars`.
    pub history_multiplier: usize,
    /// Immediate-path trigger, as a multiple of `flush_threshold_chars`.
    pub immediate_processing_multiplier: f32,
    /// Minimum complete-sentence fraction for the immediate path.
    pub substantial_content_ratio: f32,
    /// Minimum sentence count for the immediate path.
    pub min_sentences_for_immediate: usize,
    /// Minimum similarity (0.0 – 1.0) for buffer reconciliation matches.
    pub similarity_threshold: f64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            flush_threshold_chars: 83,
            history_multiplier: 3,
            immediate_processing_multiplier: 1.5,
            substantial_content_ratio: 0.8,
            min_sentences_for_immediate: 3,
            similarity_threshold: 0.8,
        }
    }
}

impl BufferConfig {
    /// Check every field's range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flush_threshold_chars == 0 {
            return Err(ConfigError::FlushThreshold);
        }
        if self.history_multiplier == 0 {
            return Err(ConfigError::HistoryMultiplier);
        }
        if !(self.immediate_processing_multiplier > 0.0
            && self.immediate_processing_multiplier <= 3.0)
        {
            return Err(ConfigError::ImmediateMultiplier(
                self.immediate_processing_multiplier,
            ));
        }
        if !(self.substantial_content_ratio > 0.0 && self.substantial_content_ratio <= 1.0) {
            return Err(ConfigError::SubstantialRatio(self.substantial_content_ratio));
        }
        if self.min_sentences_for_immediate == 0 {
            return Err(ConfigError::MinSentences);
        }
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 1.0) {
            return Err(ConfigError::SimilarityThreshold(self.similarity_threshold));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AnalysisConfig
// ---------------------------------------------------------------------------

/// Settings for the analysis backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Base URL of the API endpoint.
    ///
    /// - Ollama default: `http://localhost:11434`
    /// - OpenAI: `https://api.openai.com`
    pub base_url: String,
    /// API key — `None` for local providers.
    pub api_key: Option<String>,
    /// Model identifier sent to the API (e.g. `"qwen2.5:3b"`, `"gpt-4o-mini"`).
    pub model: String,
    /// Sampling temperature (0.0 – 1.0).  Lower = more deterministic.
    pub temperature: f32,
    /// Maximum seconds to wait for a response before timing out.
    pub timeout_secs: u64,
    /// Attempts per cycle for transient failures, including the first.
    pub max_retries: u32,
    /// Base backoff delay between retries, doubled per attempt.
    pub retry_delay_ms: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            api_key: None,
            model: "qwen2.5:3b".into(),
            temperature: 0.3,
            timeout_secs: 30,
            max_retries: 3,
            retry_delay_ms: 500,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Timeout);
        }
        if self.max_retries == 0 {
            return Err(ConfigError::MaxRetries);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use voicetree::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// config.validate().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Text buffer settings.
    pub buffer: BufferConfig,
    /// Analysis backend settings.
    pub analysis: AnalysisConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check every sub-config.  Call once at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.buffer.validate()?;
        self.analysis.validate()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
