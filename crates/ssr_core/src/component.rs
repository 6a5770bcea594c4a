//! The component capability contract and the tree handed to renderers.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::state::State;

/// An initial state that is still being loaded.
///
/// Settles exactly once: `Ok` with the state, or `Err` with the reason the
/// loader gave up.
pub type Deferred = BoxFuture<'static, anyhow::Result<State>>;

/// A renderable component with optional initial-state hooks.
///
/// Both hooks are optional. When a component provides both, the synchronous
/// state is computed first and the asynchronous result is shallow-merged over
/// it.
pub trait Component: Send + Sync {
    /// Name used in logs and diagnostics.
    fn name(&self) -> &str;

    /// Synchronous initial state, computed identically on server and client.
    fn initial_state(&self) -> Option<State> {
        None
    }

    /// Starts loading the asynchronous initial state.
    ///
    /// Called at most once per pass: on the server during render, on the
    /// client only when the payload has no entry for this instance.
    fn initial_state_async(&self) -> Option<Deferred> {
        None
    }

    /// Produces markup for this instance from its initial state and the
    /// already-rendered markup of its children.
    fn render(&self, state: &State, children: &str) -> String;
}

/// A node in the component tree: a component, an optional key, and children.
#[derive(Clone)]
pub struct ComponentTree {
    component: Arc<dyn Component>,
    key: Option<String>,
    children: Vec<ComponentTree>,
}

impl ComponentTree {
    pub fn new(component: impl Component + 'static) -> Self {
        Self::from_arc(Arc::new(component))
    }

    pub fn from_arc(component: Arc<dyn Component>) -> Self {
        Self {
            component,
            key: None,
            children: Vec::new(),
        }
    }

    /// Addresses this node by key instead of its index among siblings.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_child(mut self, child: ComponentTree) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = ComponentTree>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn component(&self) -> &Arc<dyn Component> {
        &self.component
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn children(&self) -> &[ComponentTree] {
        &self.children
    }

    /// Total number of nodes, this one included.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(ComponentTree::size).sum::<usize>()
    }
}

impl fmt::Debug for ComponentTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentTree")
            .field("component", &self.component.name())
            .field("key", &self.key)
            .field("children", &self.children)
            .finish()
    }
}
