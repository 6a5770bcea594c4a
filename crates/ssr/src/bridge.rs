//! The synchronous bridge between render passes and async loaders.
//!
//! A render pass is plain synchronous code running on a blocking-pool
//! thread. When a component needs its asynchronous initial state, the bridge
//! spawns the loader onto the async runtime and parks only the render thread
//! on a one-shot channel until the loader settles. The runtime's async
//! workers stay free, so other passes and unrelated tasks keep running.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};

use asyncstate_ssr_core::{Deferred, State};
use tokio::runtime::Handle;
use tokio::sync::oneshot;

thread_local! {
    /// Runtime the current render thread hands its loaders to.
    /// Only set while a `BridgeGuard` is alive on this thread.
    static ACTIVE_BRIDGE: RefCell<Option<Handle>> = const { RefCell::new(None) };
}

/// Keeps a bridge context open on the current thread.
///
/// Dropping the guard closes the context and restores whatever context was
/// open before it. The guard cannot leave the thread that opened it.
pub struct BridgeGuard {
    previous: Option<Handle>,
    _not_send: PhantomData<*const ()>,
}

impl BridgeGuard {
    /// Opens a bridge context whose loaders run on `handle`.
    ///
    /// Must not be called from an async worker thread: parking there would
    /// stall the runtime that is supposed to drive the loaders.
    pub fn open(handle: Handle) -> Self {
        let previous = ACTIVE_BRIDGE.with(|cell| cell.borrow_mut().replace(handle));
        Self {
            previous,
            _not_send: PhantomData,
        }
    }
}

impl Drop for BridgeGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        ACTIVE_BRIDGE.with(|cell| {
            *cell.borrow_mut() = previous;
        });
    }
}

/// Check whether the current thread has an open bridge context.
pub fn in_bridge_context() -> bool {
    ACTIVE_BRIDGE.with(|cell| cell.borrow().is_some())
}

/// Resolve an asynchronous initial state from synchronous render code.
///
/// Invokes `loader`, runs the deferred state to completion on the bridge's
/// runtime and returns it. A loader that fails, panics or is dropped before
/// settling is logged and replaced by the empty state, so one component can
/// never fail the whole page.
///
/// # Panics
///
/// Panics when called on a thread without an open bridge context. Only the
/// render driver opens one, so reaching this outside a render pass is an
/// integration defect.
pub fn resolve_blocking<F>(loader: F) -> State
where
    F: FnOnce() -> Deferred,
{
    let Some(handle) = ACTIVE_BRIDGE.with(|cell| cell.borrow().clone()) else {
        panic!(
            "resolve_blocking called outside a bridge context: \
             asynchronous initial state can only be resolved during a render pass"
        );
    };

    let deferred = match panic::catch_unwind(AssertUnwindSafe(loader)) {
        Ok(deferred) => deferred,
        Err(_) => {
            tracing::error!("Initial state loader panicked before starting, using empty state");
            return State::new();
        }
    };

    let (tx, rx) = oneshot::channel();
    handle.spawn(async move {
        // Receiver only goes away if the render thread died
        let _ = tx.send(deferred.await);
    });

    match rx.blocking_recv() {
        Ok(Ok(state)) => state,
        Ok(Err(error)) => {
            tracing::error!(error = %format!("{error:#}"), "Initial state loader failed, using empty state");
            State::new()
        }
        Err(_) => {
            tracing::error!("Initial state loader dropped before settling, using empty state");
            State::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ready(state: State) -> impl FnOnce() -> Deferred {
        move || -> Deferred { Box::pin(async move { Ok::<_, anyhow::Error>(state) }) }
    }

    fn rejecting(message: &'static str) -> Deferred {
        Box::pin(async move { Err::<State, _>(anyhow::anyhow!(message)) })
    }

    fn panicking() -> Deferred {
        Box::pin(async {
            if true {
                panic!("loader bug");
            }
            Ok::<_, anyhow::Error>(State::new())
        })
    }

    async fn on_render_thread<T, F>(f: F) -> T
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let handle = Handle::current();
        tokio::task::spawn_blocking(move || {
            let _bridge = BridgeGuard::open(handle);
            f()
        })
        .await
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_resolves_loader_state() {
        let state = on_render_thread(|| resolve_blocking(ready(State::new().with("a", 1)))).await;
        assert_eq!(state, State::new().with("a", 1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_waits_for_slow_loader() {
        let state = on_render_thread(|| {
            resolve_blocking(|| {
                Box::pin(async {
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    Ok::<_, anyhow::Error>(State::new().with("slow", true))
                })
            })
        })
        .await;
        assert_eq!(state.get("slow"), Some(&serde_json::json!(true)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_rejected_loader_yields_empty_state() {
        let state = on_render_thread(|| resolve_blocking(|| rejecting("backend unavailable"))).await;
        assert!(state.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_loader_yields_empty_state() {
        let state = on_render_thread(|| resolve_blocking(panicking)).await;
        assert!(state.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_loader_panicking_before_start_yields_empty_state() {
        let state = on_render_thread(|| resolve_blocking(|| panic!("no future for you"))).await;
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn test_works_on_current_thread_runtime() {
        // The render thread parks while the single scheduler thread drives the loader
        let state = on_render_thread(|| resolve_blocking(ready(State::new().with("b", 2)))).await;
        assert_eq!(state.get("b"), Some(&serde_json::json!(2)));
    }

    #[test]
    #[should_panic(expected = "outside a bridge context")]
    fn test_outside_bridge_context_panics() {
        resolve_blocking(ready(State::new()));
    }

    #[test]
    fn test_guard_scopes_context() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();

        assert!(!in_bridge_context());
        {
            let _outer = BridgeGuard::open(runtime.handle().clone());
            assert!(in_bridge_context());
            {
                let _inner = BridgeGuard::open(runtime.handle().clone());
                assert!(in_bridge_context());
            }
            // Inner guard restores the outer context
            assert!(in_bridge_context());
        }
        assert!(!in_bridge_context());
    }
}
