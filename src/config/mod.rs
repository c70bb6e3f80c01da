//! Configuration module.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for the buffer
//! and the analysis backend, `AppPaths` for cross-platform config
//! directories, TOML persistence via `AppConfig::load` / `AppConfig::save`,
//! and fail-fast validation via `AppConfig::validate`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AnalysisConfig, AppConfig, BufferConfig, ConfigError};
