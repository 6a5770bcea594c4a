//! Async initial state for synchronous rendering - Imperative Shell.
//!
//! This crate orchestrates threads and the async runtime around the pure
//! types in `asyncstate_ssr_core`. A server pass renders a component tree
//! synchronously while the bridge resolves each component's async initial
//! state; the resolved states travel with the markup as an embedded payload,
//! and the client hydrator adopts them instead of loading again.
//!
//! # Architecture
//!
//! - **Functional Core** (`asyncstate_ssr_core`): State, identities, payload codec, config
//! - **Imperative Shell** (this crate): Bridge, render passes, pool, hydration
//!
//! # Example
//!
//! ```ignore
//! use asyncstate_ssr::{Hydrator, MarkupRenderer, RenderPool, RenderPoolConfig};
//! use tokio::runtime::Handle;
//!
//! // Create pool config with validation
//! let pool = RenderPool::new(RenderPoolConfig::with_defaults(4).unwrap(), MarkupRenderer);
//!
//! // Server: render and embed the payload
//! let html = pool.render(page_tree()).await.unwrap().into_html();
//!
//! // Client: adopt the payload, loading only what is missing
//! let hydrator = Hydrator::from_document(&html, &Default::default(), Handle::current());
//! let hydration = hydrator.hydrate(&MarkupRenderer, &page_tree()).unwrap();
//! ```

mod bridge;
mod driver;
mod error;
mod hydrator;
mod pool;
mod renderer;
mod scope;

// Re-export core types for convenience
pub use asyncstate_ssr_core::{
    identity_of, Component, ComponentId, ComponentTree, Deferred, ExecutionMode, PayloadConfig,
    PayloadStore, Position, RenderPoolConfig, SsrCoreError, State, DEFAULT_PAYLOAD_ELEMENT_ID,
    MAX_PAYLOAD_SIZE,
};

// Export shell types
pub use bridge::{in_bridge_context, resolve_blocking, BridgeGuard};
pub use driver::{Output, RenderDriver};
pub use error::{sanitize_error, RenderError, Result, SsrError};
pub use hydrator::{Hydration, Hydrator, LiveComponent, Phase};
pub use pool::{HealthStatus, RenderPool, RenderPoolStats};
pub use renderer::{MarkupRenderer, Renderer};
pub use scope::{PayloadLookup, RenderScope, RenderedInstance};
