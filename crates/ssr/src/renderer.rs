//! Synchronous tree renderers.
//!
//! A renderer walks a component tree, asks the scope for each instance's
//! initial state, and produces markup. It is the same code on server and
//! client; only the scope differs.

use std::collections::HashSet;

use anyhow::bail;
use asyncstate_ssr_core::{identity_of, ComponentId, ComponentTree, Position};

use crate::scope::RenderScope;

/// A synchronous, single-pass tree renderer.
pub trait Renderer: Send + Sync {
    /// Renders `tree` to markup, resolving initial states through `scope`.
    fn render(&self, tree: &ComponentTree, scope: &mut RenderScope<'_>) -> anyhow::Result<String>;
}

/// Depth-first renderer: a parent's state is resolved before its children,
/// and children's markup is passed to the parent's `render`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkupRenderer;

impl Renderer for MarkupRenderer {
    fn render(&self, tree: &ComponentTree, scope: &mut RenderScope<'_>) -> anyhow::Result<String> {
        render_node(tree, identity_of(Position::Root), scope)
    }
}

fn render_node(
    node: &ComponentTree,
    id: ComponentId,
    scope: &mut RenderScope<'_>,
) -> anyhow::Result<String> {
    let state = scope.initial_state(&id, node.component());

    let mut keys = HashSet::new();
    let mut children = String::new();
    for (index, child) in node.children().iter().enumerate() {
        if let Some(key) = child.key() {
            // Keys become path segments; `.` and `$` would let one path
            // spell another instance's identity
            if key.is_empty() || key.contains(['.', '$']) {
                bail!(
                    "invalid key '{key}' among children of {id}: \
                     keys must be non-empty and contain no '.' or '$'"
                );
            }
            if !keys.insert(key) {
                bail!("duplicate key '{key}' among children of {id}");
            }
        }

        let child_id = identity_of(Position::Child {
            parent: &id,
            index,
            key: child.key(),
        });
        children.push_str(&render_node(child, child_id, scope)?);
    }

    Ok(node.component().render(&state, &children))
}

#[cfg(test)]
mod tests {
    use super::*;
    use asyncstate_ssr_core::{Component, PayloadStore, State};

    struct Tag(&'static str);

    impl Component for Tag {
        fn name(&self) -> &str {
            self.0
        }

        fn initial_state(&self) -> Option<State> {
            Some(State::new().with("tag", self.0))
        }

        fn render(&self, state: &State, children: &str) -> String {
            let tag = state.get("tag").and_then(|v| v.as_str()).unwrap_or("?");
            format!("<{tag}>{children}</{tag}>")
        }
    }

    fn tree() -> ComponentTree {
        ComponentTree::new(Tag("main")).with_children([
            ComponentTree::new(Tag("header")),
            ComponentTree::new(Tag("section"))
                .with_child(ComponentTree::new(Tag("p")))
                .with_child(ComponentTree::new(Tag("aside")).with_key("side")),
        ])
    }

    fn visit_order(mut scope: RenderScope<'_>, tree: &ComponentTree) -> (String, Vec<String>) {
        let markup = MarkupRenderer.render(tree, &mut scope).unwrap();
        let ids = scope
            .into_instances()
            .into_iter()
            .map(|instance| instance.id.to_string())
            .collect();
        (markup, ids)
    }

    #[test]
    fn test_renders_children_inside_parents() {
        let mut store = PayloadStore::open();
        let (markup, _) = visit_order(RenderScope::server(&mut store), &tree());
        assert_eq!(
            markup,
            "<main><header></header><section><p></p><aside></aside></section></main>"
        );
    }

    #[test]
    fn test_identity_sequence_is_preorder() {
        let mut store = PayloadStore::open();
        let (_, ids) = visit_order(RenderScope::server(&mut store), &tree());
        assert_eq!(ids, vec![".0", ".0.0", ".0.1", ".0.1.0", ".0.1.$side"]);
    }

    #[test]
    fn test_server_and_client_agree_on_identities() {
        let mut store = PayloadStore::open();
        let (server_markup, server_ids) = visit_order(RenderScope::server(&mut store), &tree());

        let payload = PayloadStore::open();
        let (client_markup, client_ids) = visit_order(RenderScope::client(&payload), &tree());

        assert_eq!(server_ids, client_ids);
        assert_eq!(server_markup, client_markup);
    }

    #[test]
    fn test_key_that_spells_a_nested_path_fails() {
        // `a.0` would collide with `.0.$a.0`, the first child of key `a`
        let tree = ComponentTree::new(Tag("main")).with_children([
            ComponentTree::new(Tag("nav"))
                .with_key("a")
                .with_child(ComponentTree::new(Tag("li"))),
            ComponentTree::new(Tag("aside")).with_key("a.0"),
        ]);
        let mut store = PayloadStore::open();
        let mut scope = RenderScope::server(&mut store);

        let error = MarkupRenderer.render(&tree, &mut scope).unwrap_err();
        assert!(error.to_string().contains("invalid key 'a.0'"));
    }

    #[test]
    fn test_key_with_marker_or_empty_fails() {
        for key in ["$a", ""] {
            let tree = ComponentTree::new(Tag("ul"))
                .with_child(ComponentTree::new(Tag("li")).with_key(key));
            let mut store = PayloadStore::open();
            let mut scope = RenderScope::server(&mut store);

            let error = MarkupRenderer.render(&tree, &mut scope).unwrap_err();
            assert!(error.to_string().contains("invalid key"), "key {key:?}");
        }
    }

    #[test]
    fn test_distinct_instances_get_distinct_identities() {
        let tree = ComponentTree::new(Tag("main")).with_children([
            ComponentTree::new(Tag("nav"))
                .with_key("a")
                .with_child(ComponentTree::new(Tag("li"))),
            ComponentTree::new(Tag("aside")).with_key("a-0"),
            ComponentTree::new(Tag("footer")),
        ]);
        let mut store = PayloadStore::open();
        let (_, ids) = visit_order(RenderScope::server(&mut store), &tree);

        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
        assert_eq!(ids, vec![".0", ".0.$a", ".0.$a.0", ".0.$a-0", ".0.2"]);
    }

    #[test]
    fn test_duplicate_sibling_keys_fail() {
        let tree = ComponentTree::new(Tag("ul")).with_children([
            ComponentTree::new(Tag("li")).with_key("a"),
            ComponentTree::new(Tag("li")).with_key("a"),
        ]);
        let mut store = PayloadStore::open();
        let mut scope = RenderScope::server(&mut store);

        let error = MarkupRenderer.render(&tree, &mut scope).unwrap_err();
        assert!(error.to_string().contains("duplicate key 'a'"));
    }
}
