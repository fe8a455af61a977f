//! Html serialization of a rendered tree.

use ppr_core::NodeId;

use crate::tree::{NodeKind, RenderTree};

/// Serialization errors.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("component {0} has no rendered output")]
    MissingOutput(NodeId),

    #[error("node {0} is outside the render tree")]
    UnknownNode(NodeId),
}

/// Decides which boundaries are emitted as holes and writes their
/// placeholders.
pub trait HoleSink {
    /// Whether `boundary` is emitted as a hole.
    fn is_hole(&self, boundary: NodeId) -> bool;

    /// Write the placeholder for `boundary` at the end of `out`.
    fn write_hole(&mut self, out: &mut String, boundary: NodeId, name: &str, fallback: &str);
}

/// Emits every boundary's content inline.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHoles;

impl HoleSink for NoHoles {
    fn is_hole(&self, _boundary: NodeId) -> bool {
        false
    }

    fn write_hole(&mut self, _out: &mut String, _boundary: NodeId, _name: &str, _fallback: &str) {}
}

/// Writes html for nodes of a tree using per-node component output.
#[derive(Debug, Clone, Copy)]
pub struct HtmlWriter<'a> {
    tree: &'a RenderTree,
    outputs: &'a [Option<String>],
}

impl<'a> HtmlWriter<'a> {
    /// Create a writer. `outputs` is indexed by node id.
    pub fn new(tree: &'a RenderTree, outputs: &'a [Option<String>]) -> Self {
        Self { tree, outputs }
    }

    /// Serialize the subtree rooted at `node` (the node itself included).
    pub fn write(
        &self,
        node: NodeId,
        out: &mut String,
        holes: &mut dyn HoleSink,
    ) -> Result<(), SerializeError> {
        let current = self
            .tree
            .node(node)
            .ok_or(SerializeError::UnknownNode(node))?;

        match &current.kind {
            NodeKind::Fragment => self.write_children(node, out, holes)?,
            NodeKind::Element { tag, id } => {
                out.push('<');
                out.push_str(tag);
                if let Some(id) = id {
                    out.push_str(" id=\"");
                    out.push_str(&escape_html(id));
                    out.push('"');
                }
                out.push('>');
                self.write_children(node, out, holes)?;
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            NodeKind::Text(text) => out.push_str(&escape_html(text)),
            NodeKind::Boundary { name, fallback } => {
                if holes.is_hole(node) {
                    holes.write_hole(out, node, name, fallback);
                } else {
                    self.write_children(node, out, holes)?;
                }
            }
            NodeKind::Component(_) => {
                let html = self
                    .outputs
                    .get(node.index())
                    .and_then(Option::as_deref)
                    .ok_or(SerializeError::MissingOutput(node))?;
                out.push_str(html);
            }
        }

        Ok(())
    }

    /// Serialize only the children of `node`; this is a boundary's content.
    pub fn write_children(
        &self,
        node: NodeId,
        out: &mut String,
        holes: &mut dyn HoleSink,
    ) -> Result<(), SerializeError> {
        let current = self
            .tree
            .node(node)
            .ok_or(SerializeError::UnknownNode(node))?;
        for child in &current.children {
            self.write(*child, out, holes)?;
        }
        Ok(())
    }
}

/// Simple html escape for text and attribute values.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::View;

    #[test]
    fn test_write_elements_and_text() {
        let tree = RenderTree::from_view(
            View::element("div")
                .with_id("page")
                .with_child(View::text("a < b")),
        );

        let mut out = String::new();
        HtmlWriter::new(&tree, &[])
            .write(RenderTree::root(), &mut out, &mut NoHoles)
            .unwrap();

        assert_eq!(out, r#"<div id="page">a &lt; b</div>"#);
    }

    #[test]
    fn test_boundary_inline_without_holes() {
        let tree = RenderTree::from_view(
            View::boundary("b", "<i>wait</i>").with_child(View::text("ready")),
        );

        let mut out = String::new();
        HtmlWriter::new(&tree, &[])
            .write(RenderTree::root(), &mut out, &mut NoHoles)
            .unwrap();

        assert_eq!(out, "ready");
    }
}
