//! Configuration types for SSR with validation.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SsrCoreError, MAX_PAYLOAD_SIZE};

/// Default id of the `<script>` element carrying the state payload.
pub const DEFAULT_PAYLOAD_ELEMENT_ID: &str = "__STATE_PAYLOAD__";

/// Which side of the page lifecycle a pass runs on.
///
/// Chosen once by the host and passed explicitly; nothing in this workspace
/// guesses it from the environment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Initial states are resolved through the bridge and recorded.
    #[default]
    Server,
    /// Initial states are read from the delivered payload.
    Client,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Server => "server",
            ExecutionMode::Client => "client",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = SsrCoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "server" | "ssr" => Ok(ExecutionMode::Server),
            "client" | "browser" => Ok(ExecutionMode::Client),
            other => Err(SsrCoreError::InvalidConfig(format!(
                "unknown execution mode '{other}'"
            ))),
        }
    }
}

/// Configuration for the embedded payload block (validated).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayloadConfig {
    /// Id of the `<script>` element carrying the payload.
    pub element_id: String,
    /// Largest serialized payload accepted, in bytes.
    pub max_payload_bytes: usize,
}

impl PayloadConfig {
    /// Create and validate payload config.
    ///
    /// The element id is interpolated into markup, so it is restricted to
    /// ASCII alphanumerics, `_` and `-`.
    pub fn new(element_id: impl Into<String>, max_payload_bytes: usize) -> Result<Self> {
        let element_id = element_id.into();

        if element_id.is_empty()
            || !element_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(SsrCoreError::InvalidConfig(format!(
                "invalid payload element id '{element_id}'"
            )));
        }
        if max_payload_bytes == 0 {
            return Err(SsrCoreError::InvalidConfig(
                "max payload size must be positive".to_string(),
            ));
        }

        Ok(Self {
            element_id,
            max_payload_bytes,
        })
    }
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            element_id: DEFAULT_PAYLOAD_ELEMENT_ID.to_string(),
            max_payload_bytes: MAX_PAYLOAD_SIZE,
        }
    }
}

/// Configuration for the bounded render pool (validated).
#[derive(Clone, Debug)]
pub struct RenderPoolConfig {
    /// Render passes allowed in flight at once.
    pub max_concurrent_renders: usize,
    /// How long a caller waits for a pass, in milliseconds.
    pub render_timeout_ms: u64,
    /// Payload embedding settings shared by every pass.
    pub payload: PayloadConfig,
}

impl RenderPoolConfig {
    /// Create and validate pool config.
    pub fn new(
        max_concurrent_renders: usize,
        render_timeout_ms: u64,
        payload: PayloadConfig,
    ) -> Result<Self> {
        if max_concurrent_renders == 0 {
            return Err(SsrCoreError::InvalidConcurrency);
        }
        if render_timeout_ms == 0 {
            return Err(SsrCoreError::InvalidTimeout);
        }

        Ok(Self {
            max_concurrent_renders,
            render_timeout_ms,
            payload,
        })
    }

    /// Create with defaults (10s timeout, default payload settings).
    pub fn with_defaults(max_concurrent_renders: usize) -> Result<Self> {
        Self::new(max_concurrent_renders, 10_000, PayloadConfig::default())
    }
}
