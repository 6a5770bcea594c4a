//! Client-side hydration and the loading fallback.
//!
//! The hydrator holds the payload delivered with the page. Each instance
//! looks itself up by identity at mount: a hit adopts the server's state
//! synchronously and loads nothing; a miss starts the component's async
//! loader in the background and merges the result into its live state when
//! it arrives. A missing or corrupt payload therefore degrades to a
//! client-only load, never to a failed mount.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use asyncstate_ssr_core::{
    extract_block, Component, ComponentId, ComponentTree, PayloadConfig, PayloadStore, State,
};
use futures_util::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::error::RenderError;
use crate::renderer::Renderer;
use crate::scope::{PayloadLookup, RenderScope, RenderedInstance};

/// Lifecycle of one mounted instance.
///
/// `Unmounted -> Mounting(Hit | Miss) -> Mounted`, then, for misses with a
/// loader, `StateApplied` or `StateLoadFailed`.
///
/// `mount` runs the first three transitions synchronously before returning,
/// so callers only ever observe `Mounted` and the phases after it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Unmounted,
    Mounting(PayloadLookup),
    Mounted,
    StateApplied,
    StateLoadFailed,
}

struct LiveInner {
    id: ComponentId,
    name: String,
    lookup: PayloadLookup,
    loads: bool,
    state: watch::Sender<State>,
    phase: watch::Sender<Phase>,
}

/// A mounted component instance and its live state.
#[derive(Clone)]
pub struct LiveComponent {
    inner: Arc<LiveInner>,
}

impl LiveComponent {
    fn new(id: ComponentId, name: &str, state: State, lookup: PayloadLookup, loads: bool) -> Self {
        let (state, _) = watch::channel(state);
        let (phase, _) = watch::channel(Phase::Unmounted);
        Self {
            inner: Arc::new(LiveInner {
                id,
                name: name.to_string(),
                lookup,
                loads,
                state,
                phase,
            }),
        }
    }

    pub fn id(&self) -> &ComponentId {
        &self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Current state snapshot.
    pub fn state(&self) -> State {
        self.inner.state.borrow().clone()
    }

    /// Subscribe to state changes, the way a view re-renders on update.
    pub fn subscribe(&self) -> watch::Receiver<State> {
        self.inner.state.subscribe()
    }

    pub fn phase(&self) -> Phase {
        *self.inner.phase.borrow()
    }

    /// Whether the delivered payload had an entry for this instance.
    pub fn lookup(&self) -> PayloadLookup {
        self.inner.lookup
    }

    /// Whether a client-side load was started for this instance.
    pub fn is_loading_client_side(&self) -> bool {
        self.inner.loads
    }

    /// Wait until the instance reaches its final phase.
    ///
    /// Returns immediately for instances that did not start a load.
    pub async fn settled(&self) -> Phase {
        if !self.inner.loads {
            return self.phase();
        }

        let mut phase = self.inner.phase.subscribe();
        let settled = match phase
            .wait_for(|p| matches!(p, Phase::StateApplied | Phase::StateLoadFailed))
            .await
        {
            Ok(settled) => *settled,
            // Sender lives in `inner`, which we hold
            Err(_) => self.phase(),
        };
        settled
    }

    fn set_phase(&self, phase: Phase) {
        self.inner.phase.send_replace(phase);
    }

    fn apply(&self, loaded: State) {
        self.inner.state.send_modify(|state| state.merge(loaded));
        self.set_phase(Phase::StateApplied);
    }
}

impl std::fmt::Debug for LiveComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveComponent")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("phase", &self.phase())
            .field("state", &self.state())
            .finish()
    }
}

/// Result of hydrating a whole tree.
#[derive(Debug)]
pub struct Hydration {
    /// Markup of the client-side pass; matches the server markup when the
    /// payload was intact.
    pub markup: String,
    /// Every mounted instance, in render order.
    pub components: Vec<LiveComponent>,
}

impl Hydration {
    /// Wait for every background load to settle.
    pub async fn settled(&self) {
        for component in &self.components {
            component.settled().await;
        }
    }

    pub fn get(&self, id: &ComponentId) -> Option<&LiveComponent> {
        self.components.iter().find(|c| c.id() == id)
    }
}

/// Mounts component instances against the delivered payload.
pub struct Hydrator {
    payload: PayloadStore,
    handle: Handle,
    loads_started: Arc<AtomicUsize>,
}

impl Hydrator {
    /// Hydrator over an already-decoded payload; loads run on `handle`.
    pub fn new(payload: PayloadStore, handle: Handle) -> Self {
        Self {
            payload,
            handle,
            loads_started: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Hydrator over the payload embedded in a rendered document.
    ///
    /// A missing or unreadable block is logged and treated as empty.
    pub fn from_document(document: &str, config: &PayloadConfig, handle: Handle) -> Self {
        let payload = match extract_block(document, &config.element_id) {
            Some(block) => match PayloadStore::try_deserialize(block) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        element_id = %config.element_id,
                        "Ignoring malformed state payload, components will load client-side"
                    );
                    PayloadStore::open()
                }
            },
            None => {
                tracing::warn!(
                    element_id = %config.element_id,
                    "No state payload in document, components will load client-side"
                );
                PayloadStore::open()
            }
        };

        tracing::debug!(entries = payload.len(), "State payload loaded");
        Self::new(payload, handle)
    }

    pub fn payload(&self) -> &PayloadStore {
        &self.payload
    }

    /// Number of client-side loads started so far.
    pub fn loads_started(&self) -> usize {
        self.loads_started.load(Ordering::SeqCst)
    }

    /// Initial state for an instance: its synchronous state with the
    /// delivered entry, if any, merged over it.
    pub fn initial_state(&self, id: &ComponentId, component: &dyn Component) -> (State, PayloadLookup) {
        let sync_state = component.initial_state().unwrap_or_default();
        match self.payload.get(id) {
            Some(delivered) => (sync_state.merged(delivered.clone()), PayloadLookup::Hit),
            None => (sync_state, PayloadLookup::Miss),
        }
    }

    /// Mount one instance.
    ///
    /// Never blocks: on a payload miss the loader runs in the background.
    pub fn mount(&self, id: ComponentId, component: Arc<dyn Component>) -> LiveComponent {
        let (state, lookup) = self.initial_state(&id, component.as_ref());
        self.mount_resolved(RenderedInstance {
            id,
            component,
            state,
            lookup,
        })
    }

    /// Render `tree` client-side and mount every instance, in render order.
    ///
    /// Consumes the hydrator: once every instance has consulted the payload
    /// it is discarded.
    pub fn hydrate(self, renderer: &dyn Renderer, tree: &ComponentTree) -> Result<Hydration, RenderError> {
        let mut scope = RenderScope::client(&self.payload);
        let markup = renderer
            .render(tree, &mut scope)
            .map_err(RenderError::Renderer)?;
        let instances = scope.into_instances();

        let components: Vec<_> = instances
            .into_iter()
            .map(|instance| self.mount_resolved(instance))
            .collect();

        tracing::debug!(
            components = components.len(),
            loads_started = self.loads_started(),
            "Hydration complete"
        );

        Ok(Hydration { markup, components })
    }

    fn mount_resolved(&self, instance: RenderedInstance) -> LiveComponent {
        let RenderedInstance {
            id,
            component,
            state,
            lookup,
        } = instance;

        let deferred = match lookup {
            PayloadLookup::Hit => None,
            PayloadLookup::Miss => {
                match std::panic::catch_unwind(AssertUnwindSafe(|| component.initial_state_async())) {
                    Ok(deferred) => deferred.map(Ok),
                    Err(_) => Some(Err(())),
                }
            }
        };

        let live = LiveComponent::new(id, component.name(), state, lookup, deferred.is_some());
        live.set_phase(Phase::Mounting(lookup));
        live.set_phase(Phase::Mounted);

        match deferred {
            None => {}
            Some(Err(())) => {
                tracing::error!(component = %live.id(), name = live.name(), "Initial state loader panicked");
                live.set_phase(Phase::StateLoadFailed);
            }
            Some(Ok(deferred)) => {
                self.loads_started.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(component = %live.id(), name = live.name(), "No payload entry, loading client-side");

                let task_live = live.clone();
                self.handle.spawn(async move {
                    match AssertUnwindSafe(deferred).catch_unwind().await {
                        Ok(Ok(loaded)) => task_live.apply(loaded),
                        Ok(Err(error)) => {
                            tracing::error!(
                                component = %task_live.id(),
                                error = %format!("{error:#}"),
                                "Client-side state load failed, keeping current state"
                            );
                            task_live.set_phase(Phase::StateLoadFailed);
                        }
                        Err(_) => {
                            tracing::error!(component = %task_live.id(), "Client-side state load panicked");
                            task_live.set_phase(Phase::StateLoadFailed);
                        }
                    }
                });
            }
        }

        live
    }
}
