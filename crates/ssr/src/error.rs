//! SSR errors including runtime and scheduling failures.

use asyncstate_ssr_core::SsrCoreError;
use thiserror::Error;

/// Failure of a single render pass.
///
/// Loader failures never appear here: the bridge absorbs them and the
/// component renders with an empty state.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Renderer failed: {0:#}")]
    Renderer(anyhow::Error),

    #[error("Render pass panicked: {0}")]
    Panicked(String),

    #[error("Render pass was cancelled")]
    Cancelled,

    #[error(transparent)]
    Payload(#[from] SsrCoreError),
}

/// SSR errors surfaced by the render pool.
#[derive(Error, Debug)]
pub enum SsrError {
    #[error("Core error: {0}")]
    Core(#[from] SsrCoreError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Render pool closed")]
    PoolClosed,

    #[error("Render timeout after {0}ms")]
    Timeout(u64),

    #[error("Service overloaded, retry after {retry_after_secs}s")]
    Overloaded { retry_after_secs: u32 },
}

pub type Result<T> = std::result::Result<T, SsrError>;

/// Sanitize error messages for client-facing responses.
///
/// Hides internal details while providing useful feedback.
pub fn sanitize_error(error: &SsrError) -> String {
    match error {
        // Safe to expose
        SsrError::Timeout(ms) => format!("Render timed out after {ms}ms"),
        SsrError::PoolClosed => "Service temporarily unavailable".to_string(),
        SsrError::Overloaded { retry_after_secs } => {
            format!("Service busy, retry after {retry_after_secs}s")
        }
        // Hide internal details
        SsrError::Render(RenderError::Payload(SsrCoreError::PayloadTooLarge { .. })) => {
            "Page state too large".to_string()
        }
        SsrError::Render(_) => "Render failed".to_string(),
        SsrError::Core(_) => "Invalid request".to_string(),
    }
}
