//! Render driver: one server render pass, end to end.
//!
//! Opens a bridge context and a fresh payload store, runs the renderer
//! synchronously, then embeds the store next to the markup.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use asyncstate_ssr_core::{embed, ComponentTree, PayloadConfig, PayloadStore};
use tokio::runtime::Handle;

use crate::bridge::BridgeGuard;
use crate::error::RenderError;
use crate::renderer::{MarkupRenderer, Renderer};
use crate::scope::RenderScope;

/// Result of a successful render pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    /// Markup produced by the renderer.
    pub markup: String,
    /// The payload `<script>` element to place after the markup.
    pub payload: String,
    /// Number of payload entries recorded during the pass.
    pub entries: usize,
}

impl Output {
    /// The markup followed by the payload block.
    pub fn into_html(self) -> String {
        let mut html = self.markup;
        html.push_str(&self.payload);
        html
    }
}

/// Runs server render passes.
///
/// Cheap to clone; every pass gets its own payload store.
#[derive(Clone)]
pub struct RenderDriver {
    renderer: Arc<dyn Renderer>,
    payload: Arc<PayloadConfig>,
}

impl RenderDriver {
    pub fn new(renderer: impl Renderer + 'static, payload: PayloadConfig) -> Self {
        Self {
            renderer: Arc::new(renderer),
            payload: Arc::new(payload),
        }
    }

    /// Driver using [`MarkupRenderer`] and the default payload settings.
    pub fn with_defaults() -> Self {
        Self::new(MarkupRenderer, PayloadConfig::default())
    }

    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }

    pub fn payload_config(&self) -> &PayloadConfig {
        &self.payload
    }

    /// Render `tree` and embed its state payload.
    ///
    /// The synchronous pass runs on the blocking pool so that waiting on
    /// loaders never occupies an async worker. Loader failures are absorbed
    /// by the bridge; only failures of the renderer itself are returned.
    /// Must be called from within a Tokio runtime.
    pub async fn render_to_output(&self, tree: ComponentTree) -> Result<Output, RenderError> {
        let handle = Handle::current();
        let driver = self.clone();

        tokio::task::spawn_blocking(move || driver.render_pass(&tree, handle))
            .await
            .map_err(|e| {
                if e.is_panic() {
                    RenderError::Panicked(panic_message(e.into_panic()))
                } else {
                    RenderError::Cancelled
                }
            })?
    }

    /// Run one render pass on the current thread.
    ///
    /// For hosts that already own a dedicated render thread. Loaders are
    /// spawned onto `handle`, and this thread blocks while they run, so it
    /// must not be one of that runtime's async workers. A renderer panic is
    /// caught and returned as [`RenderError::Panicked`].
    pub fn render_pass(&self, tree: &ComponentTree, handle: Handle) -> Result<Output, RenderError> {
        panic::catch_unwind(AssertUnwindSafe(|| self.run_pass(tree, handle)))
            .unwrap_or_else(|payload| Err(RenderError::Panicked(panic_message(payload))))
    }

    fn run_pass(&self, tree: &ComponentTree, handle: Handle) -> Result<Output, RenderError> {
        let started = Instant::now();
        let _bridge = BridgeGuard::open(handle);
        let mut store = PayloadStore::open();

        let markup = {
            let mut scope = RenderScope::server(&mut store);
            self.renderer
                .render(tree, &mut scope)
                .map_err(RenderError::Renderer)?
        };

        // Every component has written its entry by now
        let payload = embed(&store, &self.payload)?;

        tracing::debug!(
            entries = store.len(),
            markup_bytes = markup.len(),
            payload_bytes = payload.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Render pass complete"
        );

        Ok(Output {
            markup,
            payload,
            entries: store.len(),
        })
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
