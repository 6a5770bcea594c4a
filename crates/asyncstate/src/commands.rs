use std::path::Path;

use anyhow::{Context, Result};
use asyncstate_ssr::{
    Hydration, Hydrator, LiveComponent, MarkupRenderer, PayloadConfig, PayloadLookup, RenderPool,
};
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;

use crate::config::Config;
use crate::demo::{document, Demo};

/// Render the demo page server-side and return the HTML document.
pub async fn render(config: &Config) -> Result<String> {
    let pool = RenderPool::new(config.pool.clone(), MarkupRenderer);
    let demo = Demo::new(config.loader_delay);

    let output = pool.render(demo.tree()).await?;
    tracing::info!(
        entries = output.entries,
        loader_calls = demo.calls().count(),
        "Rendered demo page"
    );

    Ok(document(output))
}

/// Hydrate the demo page against a rendered document.
pub async fn hydrate(config: &Config, html: &str) -> Result<HydrationReport> {
    let demo = Demo::new(config.loader_delay);
    let hydration = hydrate_document(config.payload(), html, &demo)?;
    hydration.settled().await;

    Ok(HydrationReport::new(&hydration, demo.calls().count()))
}

/// Render then hydrate in-process.
///
/// With an intact payload the client side performs no loads at all.
pub async fn roundtrip(config: &Config) -> Result<RoundtripReport> {
    let pool = RenderPool::new(config.pool.clone(), MarkupRenderer);
    let server = Demo::new(config.loader_delay);
    let output = pool.render(server.tree()).await?;
    let server_markup = output.markup.clone();
    let html = document(output);

    let client = Demo::new(config.loader_delay);
    let hydration = hydrate_document(config.payload(), &html, &client)?;
    let markup_matches = hydration.markup == server_markup;
    hydration.settled().await;

    if !markup_matches {
        tracing::warn!("Client markup differs from server markup");
    }

    Ok(RoundtripReport {
        server_loader_calls: server.calls().count(),
        client_loader_calls: client.calls().count(),
        markup_matches,
        hydration: HydrationReport::new(&hydration, client.calls().count()),
    })
}

/// Read a rendered document from `path`, or from stdin when absent.
pub async fn read_document(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display())),
        None => {
            let mut html = String::new();
            tokio::io::AsyncReadExt::read_to_string(&mut tokio::io::stdin(), &mut html)
                .await
                .context("reading document from stdin")?;
            Ok(html)
        }
    }
}

fn hydrate_document(payload: &PayloadConfig, html: &str, demo: &Demo) -> Result<Hydration> {
    let hydrator = Hydrator::from_document(html, payload, Handle::current());
    Ok(hydrator.hydrate(&MarkupRenderer, &demo.tree())?)
}

/// Per-component outcome of a hydration.
#[derive(Debug, Serialize)]
pub struct ComponentReport {
    pub id: String,
    pub name: String,
    /// `payload` when the server state was adopted, `client` when it loaded,
    /// `sync` when it has no async state at all.
    pub source: &'static str,
    pub phase: String,
    pub state: Value,
}

#[derive(Debug, Serialize)]
pub struct HydrationReport {
    pub client_loader_calls: usize,
    pub components: Vec<ComponentReport>,
}

impl HydrationReport {
    fn new(hydration: &Hydration, client_loader_calls: usize) -> Self {
        let components = hydration
            .components
            .iter()
            .map(|component| ComponentReport {
                id: component.id().to_string(),
                name: component.name().to_string(),
                source: source(component),
                phase: format!("{:?}", component.phase()),
                state: component.state().into_value(),
            })
            .collect();

        Self {
            client_loader_calls,
            components,
        }
    }
}

fn source(component: &LiveComponent) -> &'static str {
    match component.lookup() {
        PayloadLookup::Hit => "payload",
        PayloadLookup::Miss if component.is_loading_client_side() => "client",
        PayloadLookup::Miss => "sync",
    }
}

#[derive(Debug, Serialize)]
pub struct RoundtripReport {
    pub server_loader_calls: usize,
    pub client_loader_calls: usize,
    pub markup_matches: bool,
    pub hydration: HydrationReport,
}
