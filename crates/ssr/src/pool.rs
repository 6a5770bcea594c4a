//! Bounded render pool for concurrent server rendering.
//!
//! The pool caps the number of passes in flight with a semaphore, rejects
//! work when saturated (backpressure), and bounds how long a caller waits.
//! Passes are never cancelled: a caller that times out stops waiting, but the
//! pass keeps its permit until it finishes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use asyncstate_ssr_core::{Component, ComponentTree, RenderPoolConfig, State};
use serde::Serialize;
use tokio::sync::{Semaphore, TryAcquireError};

use crate::{
    driver::{panic_message, Output, RenderDriver},
    error::{RenderError, Result, SsrError},
    renderer::Renderer,
};

/// A pool of concurrent render passes sharing one driver.
pub struct RenderPool {
    driver: RenderDriver,
    permits: Arc<Semaphore>,
    config: Arc<RenderPoolConfig>,
}

impl RenderPool {
    /// Create a new render pool.
    pub fn new(config: RenderPoolConfig, renderer: impl Renderer + 'static) -> Self {
        let driver = RenderDriver::new(renderer, config.payload.clone());
        let permits = Arc::new(Semaphore::new(config.max_concurrent_renders));

        tracing::info!(
            max_concurrent_renders = config.max_concurrent_renders,
            render_timeout_ms = config.render_timeout_ms,
            payload_element_id = %config.payload.element_id,
            "Render pool initialized"
        );

        Self {
            driver,
            permits,
            config: Arc::new(config),
        }
    }

    pub fn driver(&self) -> &RenderDriver {
        &self.driver
    }

    /// Render a tree using the pool.
    ///
    /// Returns `Overloaded` if every permit is taken, and `Timeout` if the
    /// pass does not finish within the configured time.
    pub async fn render(&self, tree: ComponentTree) -> Result<Output> {
        let timeout = Duration::from_millis(self.config.render_timeout_ms);
        self.render_within(tree, timeout).await
    }

    async fn render_within(&self, tree: ComponentTree, timeout: Duration) -> Result<Output> {
        // Check capacity before queueing (backpressure)
        let permit = Arc::clone(&self.permits)
            .try_acquire_owned()
            .map_err(|e| match e {
                TryAcquireError::NoPermits => SsrError::Overloaded {
                    retry_after_secs: 5,
                },
                TryAcquireError::Closed => SsrError::PoolClosed,
            })?;

        let driver = self.driver.clone();
        let nodes = tree.size();
        let pass = tokio::spawn(async move {
            let _permit = permit;
            driver.render_to_output(tree).await
        });

        match tokio::time::timeout(timeout, pass).await {
            Ok(Ok(result)) => result.map_err(SsrError::from),
            Ok(Err(e)) if e.is_panic() => Err(SsrError::Render(RenderError::Panicked(
                panic_message(e.into_panic()),
            ))),
            Ok(Err(_)) => Err(SsrError::Render(RenderError::Cancelled)),
            Err(_) => {
                let timeout_ms = timeout.as_millis() as u64;
                tracing::warn!(timeout_ms, nodes, "Render pass timed out, caller stopped waiting");
                Err(SsrError::Timeout(timeout_ms))
            }
        }
    }

    /// Get pool statistics (passive - no I/O).
    pub fn stats(&self) -> RenderPoolStats {
        let available = self.permits.available_permits();
        RenderPoolStats {
            max_concurrent_renders: self.config.max_concurrent_renders,
            in_flight: self.config.max_concurrent_renders.saturating_sub(available),
            available,
        }
    }

    /// Stop accepting new passes. Passes already running finish normally.
    pub fn close(&self) {
        self.permits.close();
        tracing::info!("Render pool closed");
    }

    /// Active health check - verifies a pass can complete.
    ///
    /// Renders a single-node probe tree and checks for output within 5s.
    pub async fn health_check(&self) -> Result<HealthStatus> {
        let start = Instant::now();
        let probe = ComponentTree::new(Probe);

        match self.render_within(probe, Duration::from_millis(5000)).await {
            Ok(_) => Ok(HealthStatus {
                healthy: true,
                latency_ms: start.elapsed().as_millis() as u64,
                stats: self.stats(),
                error: None,
            }),
            Err(SsrError::Render(e)) => Ok(HealthStatus {
                healthy: false,
                latency_ms: start.elapsed().as_millis() as u64,
                stats: self.stats(),
                error: Some(e.to_string()),
            }),
            Err(e) => Err(e),
        }
    }
}

/// Minimal component rendered by health checks.
struct Probe;

impl Component for Probe {
    fn name(&self) -> &str {
        "health-probe"
    }

    fn render(&self, _state: &State, _children: &str) -> String {
        String::new()
    }
}

/// Pool statistics (passive data).
#[derive(Debug, Clone, Serialize)]
pub struct RenderPoolStats {
    pub max_concurrent_renders: usize,
    pub in_flight: usize,
    pub available: usize,
}

/// Health check result.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub latency_ms: u64,
    pub stats: RenderPoolStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::MarkupRenderer;
    use asyncstate_ssr_core::{Deferred, PayloadConfig};

    struct Sleepy(u64);

    impl Component for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }

        fn initial_state_async(&self) -> Option<Deferred> {
            let ms = self.0;
            Some(Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok::<_, anyhow::Error>(State::new().with("slept_ms", ms))
            }))
        }

        fn render(&self, _state: &State, _children: &str) -> String {
            "<p>zzz</p>".to_string()
        }
    }

    fn pool(max: usize, timeout_ms: u64) -> RenderPool {
        let config = RenderPoolConfig::new(max, timeout_ms, PayloadConfig::default()).unwrap();
        RenderPool::new(config, MarkupRenderer)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_render_through_pool() {
        let pool = pool(2, 1_000);
        let output = pool.render(ComponentTree::new(Sleepy(1))).await.unwrap();

        assert_eq!(output.markup, "<p>zzz</p>");
        assert_eq!(output.entries, 1);
        assert_eq!(pool.stats().in_flight, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_overloaded_when_saturated() {
        let pool = Arc::new(pool(1, 5_000));

        let busy = tokio::spawn({
            let pool = Arc::clone(&pool);
            async move { pool.render(ComponentTree::new(Sleepy(150))).await }
        });

        // Wait until the first pass holds the only permit
        while pool.stats().available > 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let result = pool.render(ComponentTree::new(Sleepy(1))).await;
        assert!(matches!(result, Err(SsrError::Overloaded { .. })));
        assert_eq!(pool.stats().in_flight, 1);

        assert!(busy.await.unwrap().is_ok());
        assert_eq!(pool.stats().available, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timeout_does_not_cancel_pass() {
        let pool = pool(1, 20);

        let result = pool.render(ComponentTree::new(Sleepy(150))).await;
        assert!(matches!(result, Err(SsrError::Timeout(20))));

        // The stalled pass still holds its permit until it finishes
        assert_eq!(pool.stats().in_flight, 1);
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(pool.stats().in_flight, 0);
    }

    struct Explodes;

    impl Component for Explodes {
        fn name(&self) -> &str {
            "explodes"
        }

        fn render(&self, _state: &State, _children: &str) -> String {
            panic!("template bug")
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_pass_is_a_render_error() {
        let pool = pool(1, 1_000);

        let result = pool.render(ComponentTree::new(Explodes)).await;
        match result {
            Err(SsrError::Render(RenderError::Panicked(message))) => {
                assert!(message.contains("template bug"))
            }
            other => panic!("expected a panicked render, got {other:?}"),
        }
        // The permit came back and the pool still accepts work
        assert_eq!(pool.stats().available, 1);
        assert!(pool.render(ComponentTree::new(Sleepy(1))).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_closed_pool_rejects_work() {
        let pool = pool(2, 1_000);
        pool.close();

        let result = pool.render(ComponentTree::new(Sleepy(1))).await;
        assert!(matches!(result, Err(SsrError::PoolClosed)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_health_check() {
        let pool = pool(2, 1_000);
        let status = pool.health_check().await.unwrap();

        assert!(status.healthy);
        assert!(status.error.is_none());
        assert_eq!(status.stats.max_concurrent_renders, 2);
    }
}
