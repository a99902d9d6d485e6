//! Compilation options
//!
//! [`CompileOptions`] controls how a single `process_graph` call behaves:
//! whether dynamic dimensions are accepted, whether the finished artifact is
//! verified, and which registered engines may be used.

use crate::error::{ForgeError, ForgeResult};
use serde::{Deserialize, Serialize};

/// Accept dynamic dimensions ("true"/"false"/"1"/"0")
pub const ALLOW_DYNAMIC_DIMS_ENV: &str = "GRAPHFORGE_ALLOW_DYNAMIC_DIMS";
/// Verify the artifact before returning it
pub const VERIFY_ARTIFACT_ENV: &str = "GRAPHFORGE_VERIFY_ARTIFACT";
/// Comma-separated list of engine ids that may be used
pub const ENGINES_ENV: &str = "GRAPHFORGE_ENGINES";

/// Options for one compilation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Accept inferred `Dim::Dynamic` extents
    pub allow_dynamic_dims: bool,

    /// Check the artifact for completeness before returning it
    pub verify_artifact: bool,

    /// Restrict assignment to these engine ids (registry order is kept)
    pub engine_filter: Option<Vec<String>>,

    /// Emit the per-engine node counts at info level
    pub log_partition_summary: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            allow_dynamic_dims: true,
            verify_artifact: true,
            engine_filter: None,
            log_partition_summary: true,
        }
    }
}

impl CompileOptions {
    /// Create compile options with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_allow_dynamic_dims(mut self, allow: bool) -> Self {
        self.allow_dynamic_dims = allow;
        self
    }

    pub fn with_verify_artifact(mut self, verify: bool) -> Self {
        self.verify_artifact = verify;
        self
    }

    /// Only the named engines take part in assignment
    pub fn with_engine_filter<I, S>(mut self, engines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.engine_filter = Some(engines.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_log_partition_summary(mut self, enabled: bool) -> Self {
        self.log_partition_summary = enabled;
        self
    }

    /// Whether `engine_id` passes the filter
    pub fn allows_engine(&self, engine_id: &str) -> bool {
        self.engine_filter
            .as_ref()
            .map_or(true, |ids| ids.iter().any(|id| id == engine_id))
    }

    /// Parse options from JSON; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> ForgeResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ForgeError::InvalidConfiguration(format!("compile options: {}", e)))
    }

    pub fn to_json_string(&self) -> ForgeResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ForgeError::InvalidConfiguration(format!("compile options: {}", e)))
    }

    /// Overlay `GRAPHFORGE_*` environment variables on top of `self`.
    ///
    /// Unset variables leave the field untouched; malformed values are an
    /// `InvalidConfiguration` error.
    pub fn with_env_overrides(mut self) -> ForgeResult<Self> {
        if let Some(value) = read_env(ALLOW_DYNAMIC_DIMS_ENV) {
            self.allow_dynamic_dims = parse_bool(ALLOW_DYNAMIC_DIMS_ENV, &value)?;
        }
        if let Some(value) = read_env(VERIFY_ARTIFACT_ENV) {
            self.verify_artifact = parse_bool(VERIFY_ARTIFACT_ENV, &value)?;
        }
        if let Some(value) = read_env(ENGINES_ENV) {
            let engines: Vec<String> = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            if engines.is_empty() {
                return Err(ForgeError::InvalidConfiguration(format!(
                    "{} lists no engines",
                    ENGINES_ENV
                )));
            }
            self.engine_filter = Some(engines);
        }
        Ok(self)
    }

    /// Defaults with the environment overlay applied
    pub fn from_env() -> ForgeResult<Self> {
        Self::default().with_env_overrides()
    }
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(name: &str, value: &str) -> ForgeResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ForgeError::InvalidConfiguration(format!(
            "{} must be a boolean, got '{}'",
            name, other
        ))),
    }
}
