//! Page trees.

use ppr_server::prelude::{Component, View};

use crate::components::SessionState;

/// Fallback shown in place of the dynamic slot until it streams in.
pub const FALLBACK: &str = r#"<div id="fallback">Loading...</div>"#;

fn heading(text: &str) -> View {
    View::element("h1").with_child(View::text(text))
}

/// Page whose dynamic slot sits in a suspense boundary.
pub fn suspense(title: &str, slot: impl Component + 'static) -> View {
    View::element("div").with_id("page").with_children([
        heading(title),
        View::element("div").with_id("container").with_child(
            View::boundary("suspense", FALLBACK).with_child(View::component(slot)),
        ),
    ])
}

/// Page whose dynamic slot sits `depth` boundaries deep. The innermost
/// boundary becomes the hole.
pub fn nested_suspense(depth: usize) -> View {
    let mut slot = View::element("div")
        .with_id("container")
        .with_child(View::boundary("suspense", FALLBACK).with_child(View::component(SessionState)));
    for level in (1..depth).rev() {
        slot = View::boundary(format!("nested-{}", level), FALLBACK).with_child(
            View::element("section")
                .with_child(View::text(format!("Level {}", level + 1)))
                .with_child(slot),
        );
    }

    View::element("div").with_id("page").with_children([
        heading(&format!("Nested {}", depth)),
        slot,
    ])
}

/// Page under `depth` nested layouts, the innermost with a loading
/// boundary around the dynamic slot.
pub fn nested_loading(depth: usize) -> View {
    let mut segment = View::element("div").with_id("container").with_child(
        View::boundary("loading", FALLBACK).with_child(View::component(SessionState)),
    );
    for level in (1..=depth).rev() {
        segment = View::element("section")
            .with_child(View::text(format!("Layout {}", level)))
            .with_child(segment);
    }

    View::element("div").with_id("page").with_children([
        heading(&format!("Loading {}", depth)),
        segment,
    ])
}

/// Page that reads the session with no boundary around it.
pub fn no_suspense() -> View {
    View::element("div").with_id("page").with_children([
        heading("No Suspense"),
        View::element("div")
            .with_id("container")
            .with_child(View::component(SessionState)),
    ])
}

/// Page without request data.
pub fn static_page() -> View {
    View::element("div").with_id("page").with_children([
        heading("Static"),
        View::element("p").with_child(View::text("This page is fully static.")),
    ])
}
