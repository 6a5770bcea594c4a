//! Per-pass render scope handed to renderers.
//!
//! The scope is the explicit context a renderer threads through its walk of
//! the tree. On the server it owns write access to the pass's payload store;
//! on the client it reads the delivered payload. Either way it records every
//! instance it resolved, in visit order.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use asyncstate_ssr_core::{Component, ComponentId, ExecutionMode, PayloadStore, State};

use crate::bridge;

/// Whether the delivered payload had an entry for an instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadLookup {
    Hit,
    Miss,
}

/// An instance the scope resolved an initial state for.
#[derive(Clone)]
pub struct RenderedInstance {
    pub id: ComponentId,
    pub component: Arc<dyn Component>,
    pub state: State,
    /// Only meaningful in client mode; server instances are always `Miss`.
    pub lookup: PayloadLookup,
}

impl std::fmt::Debug for RenderedInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderedInstance")
            .field("id", &self.id)
            .field("component", &self.component.name())
            .field("state", &self.state)
            .field("lookup", &self.lookup)
            .finish()
    }
}

enum Source<'a> {
    Server(&'a mut PayloadStore),
    Client(&'a PayloadStore),
}

/// Context for one render pass.
pub struct RenderScope<'a> {
    source: Source<'a>,
    instances: Vec<RenderedInstance>,
}

impl<'a> RenderScope<'a> {
    /// Scope for a server pass writing into `store`.
    ///
    /// Resolving asynchronous state requires an open bridge context on the
    /// calling thread.
    pub fn server(store: &'a mut PayloadStore) -> Self {
        Self {
            source: Source::Server(store),
            instances: Vec::new(),
        }
    }

    /// Scope for a client pass reading the delivered `payload`.
    pub fn client(payload: &'a PayloadStore) -> Self {
        Self {
            source: Source::Client(payload),
            instances: Vec::new(),
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        match self.source {
            Source::Server(_) => ExecutionMode::Server,
            Source::Client(_) => ExecutionMode::Client,
        }
    }

    /// Computes the initial state for the instance `id`.
    ///
    /// The synchronous hook runs on both sides. On the server the async hook
    /// is resolved through the bridge and its result recorded under `id`; on
    /// the client the recorded result is read back instead. Either way the
    /// async result is shallow-merged over the synchronous one.
    pub fn initial_state(&mut self, id: &ComponentId, component: &Arc<dyn Component>) -> State {
        let sync_state = component.initial_state().unwrap_or_default();

        let (state, lookup) = match &mut self.source {
            Source::Server(store) => {
                match panic::catch_unwind(AssertUnwindSafe(|| component.initial_state_async())) {
                    Ok(Some(deferred)) => {
                        let resolved = bridge::resolve_blocking(move || deferred);
                        tracing::trace!(component = %id, name = component.name(), "Resolved initial state");
                        store.set(id.clone(), resolved.clone());
                        (sync_state.merged(resolved), PayloadLookup::Miss)
                    }
                    Ok(None) => (sync_state, PayloadLookup::Miss),
                    Err(_) => {
                        tracing::error!(
                            component = %id,
                            name = component.name(),
                            "Initial state loader panicked before starting, using empty state"
                        );
                        // Recorded so the client adopts it instead of retrying
                        store.set(id.clone(), State::new());
                        (sync_state, PayloadLookup::Miss)
                    }
                }
            }
            Source::Client(payload) => match payload.get(id) {
                Some(delivered) => (sync_state.merged(delivered.clone()), PayloadLookup::Hit),
                None => (sync_state, PayloadLookup::Miss),
            },
        };

        self.instances.push(RenderedInstance {
            id: id.clone(),
            component: Arc::clone(component),
            state: state.clone(),
            lookup,
        });

        state
    }

    /// Instances resolved so far, in visit order.
    pub fn instances(&self) -> &[RenderedInstance] {
        &self.instances
    }

    pub fn into_instances(self) -> Vec<RenderedInstance> {
        self.instances
    }
}
