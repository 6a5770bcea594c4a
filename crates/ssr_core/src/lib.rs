//! Pure state hydration logic - no I/O, no threads, no side effects.
//!
//! This crate provides:
//! - Component state records and the shallow-merge rule
//! - Position-derived component identities
//! - The per-render payload store and its serialized form
//! - Safe embedding of the payload in rendered documents
//! - Configuration types with validation
//! - The component capability contract
//!
//! # Example
//!
//! ```
//! use asyncstate_ssr_core::{embed, extract_block, ComponentId, PayloadConfig, PayloadStore, State};
//!
//! // Record resolved state during a render pass
//! let mut store = PayloadStore::open();
//! store.set(ComponentId::root().child(0), State::new().with("count", 3));
//!
//! // Embed it next to the markup
//! let config = PayloadConfig::default();
//! let document = format!("<main>...</main>{}", embed(&store, &config).unwrap());
//!
//! // The client rebuilds the same store from the document
//! let block = extract_block(&document, &config.element_id);
//! assert_eq!(PayloadStore::deserialize(block), store);
//! ```

mod component;
mod config;
mod embed;
mod error;
mod identity;
mod payload;
mod state;

pub use component::{Component, ComponentTree, Deferred};
pub use config::{ExecutionMode, PayloadConfig, RenderPoolConfig, DEFAULT_PAYLOAD_ELEMENT_ID};
pub use embed::{embed, escape_for_script, extract_block, script_tag};
pub use error::{Result, SsrCoreError, MAX_PAYLOAD_SIZE};
pub use identity::{identity_of, ComponentId, Position};
pub use payload::PayloadStore;
pub use state::State;
