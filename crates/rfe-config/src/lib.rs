// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading and validation for the REST fitness engine.
//!
//! [`EngineConfig`] holds every knob the evaluator reads: where the target
//! lives, how long to wait for it, which oracles run, and which advanced
//! objectives are produced. It loads from TOML, takes `RFE_*` environment
//! overrides on top, and [`validate_config`] separates hard errors from
//! advisory [`ConfigWarning`]s.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A flag is set that has no effect because another one is off.
    IneffectiveFlag {
        /// Name of the flag that does nothing.
        field: String,
        /// The flag it depends on.
        requires: String,
    },
    /// The TCP timeout is unusually large.
    LargeTimeout {
        /// Timeout value in milliseconds.
        millis: u64,
    },
    /// Responses bodies this small will truncate most JSON payloads.
    SmallResponseLimit {
        /// Configured limit in bytes.
        bytes: usize,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::IneffectiveFlag { field, requires } => {
                write!(f, "'{field}' has no effect unless '{requires}' is enabled")
            }
            ConfigWarning::LargeTimeout { millis } => {
                write!(f, "tcp_timeout_ms is unusually large ({millis}ms)")
            }
            ConfigWarning::SmallResponseLimit { bytes } => {
                write!(f, "max_response_byte_size of {bytes} bytes drops most bodies")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Whether the target is instrumented and reachable through a controller.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// Only HTTP responses are observable.
    #[default]
    BlackBox,
    /// A controller reports coverage and per-call execution details.
    WhiteBox,
}

/// Top-level configuration for fitness evaluation.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Base URL of the system under test, e.g. `http://localhost:8080`.
    pub base_url: String,
    /// Black-box or white-box evaluation.
    pub mode: EvaluationMode,
    /// Bodies larger than this are dropped and flagged.
    pub max_response_byte_size: usize,
    /// Per-call socket timeout.
    pub tcp_timeout_ms: u64,
    /// Connection establishment timeout.
    pub connect_timeout_ms: u64,
    /// How long to wait for the OS to reclaim ephemeral ports before retrying.
    pub ephemeral_port_wait_ms: u64,
    /// Upper bound on calls per minute; `0` disables rate limiting.
    pub rate_limit_per_minute: u32,
    /// Validate responses against the declared schema.
    pub schema_oracles: bool,
    /// Run security analyzers and auth-state objectives.
    pub security: bool,
    /// Detect server-side request forgery (needs `security`).
    pub ssrf: bool,
    /// Run HTTP-semantics analyzers.
    pub http_oracles: bool,
    /// Emit link/query/input/payload/example objectives.
    pub advanced_black_box_coverage: bool,
    /// Add parameters observed by the server but not declared in the schema.
    pub expand_individuals: bool,
    /// Log level (`error`, `warn`, `info`, `debug`, `trace`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            mode: EvaluationMode::BlackBox,
            max_response_byte_size: DEFAULT_MAX_RESPONSE_BYTES,
            tcp_timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            ephemeral_port_wait_ms: 1_000,
            rate_limit_per_minute: 0,
            schema_oracles: true,
            security: false,
            ssrf: false,
            http_oracles: false,
            advanced_black_box_coverage: false,
            expand_individuals: true,
            log_level: Some("info".into()),
        }
    }
}

impl EngineConfig {
    /// Whether the engine runs without a controller.
    pub fn is_black_box(&self) -> bool {
        self.mode == EvaluationMode::BlackBox
    }

    /// Per-call socket timeout as a [`Duration`].
    pub fn tcp_timeout(&self) -> Duration {
        Duration::from_millis(self.tcp_timeout_ms)
    }

    /// Connection timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Ephemeral-port reclamation delay as a [`Duration`].
    pub fn ephemeral_port_wait(&self) -> Duration {
        Duration::from_millis(self.ephemeral_port_wait_ms)
    }

    /// Minimum spacing between calls, if rate limiting is enabled.
    pub fn min_call_interval(&self) -> Option<Duration> {
        (self.rate_limit_per_minute > 0)
            .then(|| Duration::from_secs(60) / self.rate_limit_per_minute)
    }

    /// SSRF detection is only meaningful when security analysis is on.
    pub fn ssrf_enabled(&self) -> bool {
        self.security && self.ssrf
    }
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default threshold above which response bodies are dropped.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 1_000_000;

/// Above this a timeout produces a warning.
const LARGE_TIMEOUT_THRESHOLD_MS: u64 = 300_000;

/// Below this a body limit produces a warning.
const SMALL_RESPONSE_LIMIT: usize = 1_024;

/// Recognised log levels.
const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load an [`EngineConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`EngineConfig::default()`].
///
/// Environment variable overrides are applied on top in both cases.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => EngineConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into an [`EngineConfig`].
pub fn parse_toml(content: &str) -> Result<EngineConfig, ConfigError> {
    toml::from_str::<EngineConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides.
///
/// Recognised variables:
/// - `RFE_BASE_URL`
/// - `RFE_MODE` (`black_box` or `white_box`)
/// - `RFE_LOG_LEVEL`
/// - `RFE_MAX_RESPONSE_BYTES`
pub fn apply_env_overrides(config: &mut EngineConfig) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

/// Apply overrides from an arbitrary variable lookup.
///
/// Unparseable values are ignored and leave the field untouched.
pub fn apply_overrides_from(config: &mut EngineConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("RFE_BASE_URL") {
        config.base_url = val;
    }
    if let Some(val) = lookup("RFE_MODE") {
        match val.as_str() {
            "black_box" => config.mode = EvaluationMode::BlackBox,
            "white_box" => config.mode = EvaluationMode::WhiteBox,
            _ => {}
        }
    }
    if let Some(val) = lookup("RFE_LOG_LEVEL") {
        config.log_level = Some(val);
    }
    if let Some(bytes) = lookup("RFE_MAX_RESPONSE_BYTES").and_then(|v| v.parse().ok()) {
        config.max_response_byte_size = bytes;
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (unusable base URL, zero timeouts, zero body limit, unknown
/// log level) are returned as a [`ConfigError::ValidationError`].
pub fn validate_config(config: &EngineConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    let base = config.base_url.trim();
    if base.is_empty() {
        errors.push("base_url must not be empty".into());
    } else if !(base.starts_with("http://") || base.starts_with("https://")) {
        errors.push(format!("base_url '{base}' must use http or https"));
    }

    if let Some(ref level) = config.log_level
        && !VALID_LOG_LEVELS.contains(&level.as_str())
    {
        errors.push(format!("invalid log_level '{level}'"));
    }

    if config.tcp_timeout_ms == 0 {
        errors.push("tcp_timeout_ms must be positive".into());
    } else if config.tcp_timeout_ms > LARGE_TIMEOUT_THRESHOLD_MS {
        warnings.push(ConfigWarning::LargeTimeout {
            millis: config.tcp_timeout_ms,
        });
    }
    if config.connect_timeout_ms == 0 {
        errors.push("connect_timeout_ms must be positive".into());
    }

    if config.max_response_byte_size == 0 {
        errors.push("max_response_byte_size must be positive".into());
    } else if config.max_response_byte_size < SMALL_RESPONSE_LIMIT {
        warnings.push(ConfigWarning::SmallResponseLimit {
            bytes: config.max_response_byte_size,
        });
    }

    if config.ssrf && !config.security {
        warnings.push(ConfigWarning::IneffectiveFlag {
            field: "ssrf".into(),
            requires: "security".into(),
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn default_config_is_valid_without_warnings() {
        let warnings = validate_config(&EngineConfig::default()).unwrap();
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    #[test]
    fn parse_partial_toml_fills_defaults() {
        let cfg = parse_toml(
            r#"
            base_url = "http://sut:9000"
            mode = "white_box"
            security = true
            "#,
        )
        .unwrap();
        assert_eq!(cfg.base_url, "http://sut:9000");
        assert_eq!(cfg.mode, EvaluationMode::WhiteBox);
        assert!(cfg.security);
        assert_eq!(cfg.max_response_byte_size, DEFAULT_MAX_RESPONSE_BYTES);
        assert!(cfg.schema_oracles);
    }

    #[test]
    fn parse_invalid_toml_gives_parse_error() {
        let err = parse_toml("this is [not valid toml =").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn parse_unknown_mode_gives_parse_error() {
        let err = parse_toml(r#"mode = "grey_box""#).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn validation_collects_every_hard_error() {
        let cfg = EngineConfig {
            base_url: "ftp://sut".into(),
            tcp_timeout_ms: 0,
            max_response_byte_size: 0,
            log_level: Some("loud".into()),
            ..Default::default()
        };
        match validate_config(&cfg).unwrap_err() {
            ConfigError::ValidationError { reasons } => assert_eq!(reasons.len(), 4),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ssrf_without_security_warns() {
        let cfg = EngineConfig {
            ssrf: true,
            ..Default::default()
        };
        let warnings = validate_config(&cfg).unwrap();
        assert_eq!(
            warnings,
            vec![ConfigWarning::IneffectiveFlag {
                field: "ssrf".into(),
                requires: "security".into()
            }]
        );
        assert!(!cfg.ssrf_enabled());
    }

    #[test]
    fn large_timeout_and_small_limit_warn() {
        let cfg = EngineConfig {
            tcp_timeout_ms: 600_000,
            max_response_byte_size: 10,
            ..Default::default()
        };
        let warnings = validate_config(&cfg).unwrap();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].to_string().contains("600000ms"));
    }

    #[test]
    fn overrides_apply_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("RFE_BASE_URL", "http://other:1"),
            ("RFE_MODE", "white_box"),
            ("RFE_MAX_RESPONSE_BYTES", "2048"),
        ]
        .into_iter()
        .collect();
        let mut cfg = EngineConfig::default();
        apply_overrides_from(&mut cfg, |k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.base_url, "http://other:1");
        assert!(!cfg.is_black_box());
        assert_eq!(cfg.max_response_byte_size, 2048);
        assert_eq!(cfg.log_level.as_deref(), Some("info"));
    }

    #[test]
    fn garbage_overrides_are_ignored() {
        let mut cfg = EngineConfig::default();
        apply_overrides_from(&mut cfg, |k| match k {
            "RFE_MODE" => Some("sideways".into()),
            "RFE_MAX_RESPONSE_BYTES" => Some("lots".into()),
            _ => None,
        });
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn rate_limit_interval() {
        let mut cfg = EngineConfig::default();
        assert_eq!(cfg.min_call_interval(), None);
        cfg.rate_limit_per_minute = 120;
        assert_eq!(cfg.min_call_interval(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tcp_timeout_ms = 1500").unwrap();
        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.tcp_timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_config(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn json_schema_lists_fields() {
        let schema = schemars::schema_for!(EngineConfig);
        let json = serde_json::to_string(&schema).unwrap();
        assert!(json.contains("max_response_byte_size"));
        assert!(json.contains("white_box"));
    }
}
