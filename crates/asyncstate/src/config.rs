use std::time::Duration;

use asyncstate_ssr::{
    ExecutionMode, PayloadConfig, RenderPoolConfig, SsrCoreError, DEFAULT_PAYLOAD_ELEMENT_ID,
    MAX_PAYLOAD_SIZE,
};
use clap::Args;

/// Settings shared by every subcommand.
///
/// Each flag falls back to an environment variable, then to its default.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Render passes allowed in flight at once
    #[arg(long, global = true, default_value_t = 4, env = "RENDER_MAX_CONCURRENT")]
    pub max_concurrent_renders: usize,

    /// How long to wait for a render pass, in milliseconds
    #[arg(long, global = true, default_value_t = 10_000, env = "RENDER_TIMEOUT_MS")]
    pub render_timeout_ms: u64,

    /// Id of the script element carrying the state payload
    #[arg(long, global = true, default_value = DEFAULT_PAYLOAD_ELEMENT_ID, env = "PAYLOAD_ELEMENT_ID")]
    pub payload_element_id: String,

    /// Simulated latency of the demo loaders, in milliseconds
    #[arg(long, global = true, default_value_t = 50, env = "DEMO_LOADER_DELAY_MS")]
    pub loader_delay_ms: u64,

    /// Side to run when no subcommand is given (server or client)
    #[arg(long, global = true, default_value = "server", env = "ASYNCSTATE_MODE")]
    pub mode: ExecutionMode,
}

/// Validated application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub pool: RenderPoolConfig,
    pub loader_delay: Duration,
    pub mode: ExecutionMode,
}

impl Config {
    /// Validate command line settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, SsrCoreError> {
        let payload = PayloadConfig::new(settings.payload_element_id.clone(), MAX_PAYLOAD_SIZE)?;
        let pool = RenderPoolConfig::new(
            settings.max_concurrent_renders,
            settings.render_timeout_ms,
            payload,
        )?;

        Ok(Self {
            pool,
            loader_delay: Duration::from_millis(settings.loader_delay_ms),
            mode: settings.mode,
        })
    }

    pub fn payload(&self) -> &PayloadConfig {
        &self.pool.payload
    }
}
