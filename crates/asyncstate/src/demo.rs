//! Demo page whose components load their state asynchronously.
//!
//! Loaders sleep for the configured delay to stand in for a backend call and
//! count their invocations, so the hosts can show that hydration does not
//! load again.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use asyncstate_ssr::{Component, ComponentTree, Deferred, Output, State};
use serde_json::{json, Value};

/// Shared count of loader invocations.
#[derive(Clone, Debug, Default)]
pub struct LoaderCalls(Arc<AtomicUsize>);

impl LoaderCalls {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Builds the demo page tree.
#[derive(Clone, Debug)]
pub struct Demo {
    delay: Duration,
    calls: LoaderCalls,
}

impl Demo {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: LoaderCalls::default(),
        }
    }

    pub fn calls(&self) -> &LoaderCalls {
        &self.calls
    }

    /// `Page` with a profile header, a keyed feed and a sync-only footer.
    pub fn tree(&self) -> ComponentTree {
        ComponentTree::new(Page).with_children([
            ComponentTree::new(Profile {
                loader: self.loader(),
            }),
            ComponentTree::new(Feed {
                loader: self.loader(),
            })
            .with_key("feed"),
            ComponentTree::new(Footer).with_key("footer"),
        ])
    }

    fn loader(&self) -> Loader {
        Loader {
            delay: self.delay,
            calls: self.calls.clone(),
        }
    }
}

/// Wrap a render output in a complete HTML document.
pub fn document(output: Output) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>asyncstate demo</title></head>\n\
         <body>\n<div id=\"root\">{}</div>\n{}\n</body>\n</html>\n",
        output.markup, output.payload
    )
}

#[derive(Clone)]
struct Loader {
    delay: Duration,
    calls: LoaderCalls,
}

impl Loader {
    fn load(&self, value: Value) -> Deferred {
        self.calls.record();
        let delay = self.delay;
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            State::from_value(value)
                .ok_or_else(|| anyhow::anyhow!("demo loader produced a non-object state"))
        })
    }
}

struct Page;

impl Component for Page {
    fn name(&self) -> &str {
        "Page"
    }

    fn initial_state(&self) -> Option<State> {
        Some(State::new().with("title", "Async state demo"))
    }

    fn render(&self, state: &State, children: &str) -> String {
        let title = text(state, "title");
        format!("<main><h1>{title}</h1>{children}</main>")
    }
}

struct Profile {
    loader: Loader,
}

impl Component for Profile {
    fn name(&self) -> &str {
        "Profile"
    }

    fn initial_state_async(&self) -> Option<Deferred> {
        Some(self.loader.load(json!({ "user": { "id": 7, "name": "Ada" } })))
    }

    fn render(&self, state: &State, _children: &str) -> String {
        match state.get("user").and_then(|u| u.get("name")).and_then(Value::as_str) {
            Some(name) => format!("<header class=\"profile\">Signed in as {name}</header>"),
            None => "<header class=\"profile\">Loading...</header>".to_string(),
        }
    }
}

struct Feed {
    loader: Loader,
}

impl Component for Feed {
    fn name(&self) -> &str {
        "Feed"
    }

    fn initial_state(&self) -> Option<State> {
        Some(State::new().with("filter", "all").with("posts", json!([])))
    }

    fn initial_state_async(&self) -> Option<Deferred> {
        Some(self.loader.load(json!({
            "posts": ["Hello from the server", "State travels with the markup"]
        })))
    }

    fn render(&self, state: &State, _children: &str) -> String {
        let posts: String = state
            .get("posts")
            .and_then(Value::as_array)
            .map(|posts| {
                posts
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|post| format!("<li>{post}</li>"))
                    .collect()
            })
            .unwrap_or_default();
        let filter = text(state, "filter");
        format!("<ul class=\"feed\" data-filter=\"{filter}\">{posts}</ul>")
    }
}

struct Footer;

impl Component for Footer {
    fn name(&self) -> &str {
        "Footer"
    }

    fn initial_state(&self) -> Option<State> {
        Some(State::new().with("year", 2024))
    }

    fn render(&self, state: &State, _children: &str) -> String {
        let year = state.get("year").and_then(Value::as_u64).unwrap_or_default();
        format!("<footer>&copy; {year}</footer>")
    }
}

fn text<'a>(state: &'a State, key: &str) -> &'a str {
    state.get(key).and_then(Value::as_str).unwrap_or_default()
}
