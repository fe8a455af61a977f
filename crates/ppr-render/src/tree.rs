//! Arena render tree.
//!
//! Pages are described with the owned [`View`] builder and flattened into a
//! [`RenderTree`], whose nodes are addressed by stable [`NodeId`]s. Render
//! outcomes are written into per-node slots indexed by those ids, so
//! concurrently rendering subtrees never share mutable tree structure.

use std::fmt;
use std::sync::Arc;

use ppr_core::NodeId;

use crate::scope::Component;

/// Owned page description.
#[derive(Clone)]
pub enum View {
    /// Children without a wrapping element.
    Fragment(Vec<View>),
    /// An HTML element.
    Element {
        tag: String,
        id: Option<String>,
        children: Vec<View>,
    },
    /// Escaped text.
    Text(String),
    /// A suspense boundary. Postponed descendants turn the whole boundary
    /// into a hole showing `fallback` html until resumed.
    Boundary {
        name: String,
        fallback: String,
        children: Vec<View>,
    },
    /// Application render logic.
    Component(Arc<dyn Component>),
}

impl View {
    /// Create a fragment.
    pub fn fragment(children: Vec<View>) -> Self {
        Self::Fragment(children)
    }

    /// Create an element.
    pub fn element(tag: impl Into<String>) -> Self {
        Self::Element {
            tag: tag.into(),
            id: None,
            children: Vec::new(),
        }
    }

    /// Create a text node.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a suspense boundary with fallback html.
    pub fn boundary(name: impl Into<String>, fallback: impl Into<String>) -> Self {
        Self::Boundary {
            name: name.into(),
            fallback: fallback.into(),
            children: Vec::new(),
        }
    }

    /// Wrap a component.
    pub fn component(component: impl Component + 'static) -> Self {
        Self::Component(Arc::new(component))
    }

    /// Set the `id` attribute. Ignored for anything but elements.
    pub fn with_id(mut self, value: impl Into<String>) -> Self {
        if let Self::Element { id, .. } = &mut self {
            *id = Some(value.into());
        }
        self
    }

    /// Append a child. Leaf views become a fragment of themselves and the
    /// child.
    pub fn with_child(self, child: View) -> Self {
        match self {
            Self::Fragment(mut children) => {
                children.push(child);
                Self::Fragment(children)
            }
            Self::Element {
                tag,
                id,
                mut children,
            } => {
                children.push(child);
                Self::Element { tag, id, children }
            }
            Self::Boundary {
                name,
                fallback,
                mut children,
            } => {
                children.push(child);
                Self::Boundary {
                    name,
                    fallback,
                    children,
                }
            }
            leaf => Self::Fragment(vec![leaf, child]),
        }
    }

    /// Append several children.
    pub fn with_children(self, children: impl IntoIterator<Item = View>) -> Self {
        children
            .into_iter()
            .fold(self, |view, child| view.with_child(child))
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fragment(children) => f.debug_tuple("Fragment").field(children).finish(),
            Self::Element { tag, id, children } => f
                .debug_struct("Element")
                .field("tag", tag)
                .field("id", id)
                .field("children", children)
                .finish(),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Boundary { name, children, .. } => f
                .debug_struct("Boundary")
                .field("name", name)
                .field("children", children)
                .finish(),
            Self::Component(component) => {
                f.debug_tuple("Component").field(&component.name()).finish()
            }
        }
    }
}

/// Kind of an arena node.
#[derive(Clone)]
pub enum NodeKind {
    Fragment,
    Element { tag: String, id: Option<String> },
    Text(String),
    Boundary { name: String, fallback: String },
    Component(Arc<dyn Component>),
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fragment => write!(f, "Fragment"),
            Self::Element { tag, id } => write!(f, "Element({}, {:?})", tag, id),
            Self::Text(text) => write!(f, "Text({:?})", text),
            Self::Boundary { name, .. } => write!(f, "Boundary({})", name),
            Self::Component(component) => write!(f, "Component({})", component.name()),
        }
    }
}

/// A node in the arena.
#[derive(Debug, Clone)]
pub struct Node {
    /// What the node is.
    pub kind: NodeKind,
    /// Parent node; `None` for the root.
    pub parent: Option<NodeId>,
    /// Children in document order.
    pub children: Vec<NodeId>,
}

impl Node {
    /// Whether this node is a suspense boundary.
    pub fn is_boundary(&self) -> bool {
        matches!(self.kind, NodeKind::Boundary { .. })
    }
}

/// Flattened, immutable page tree.
#[derive(Debug, Clone)]
pub struct RenderTree {
    nodes: Vec<Node>,
}

impl RenderTree {
    /// Flatten a view. The root is always a fragment at index 0.
    pub fn from_view(view: View) -> Self {
        let mut tree = Self {
            nodes: vec![Node {
                kind: NodeKind::Fragment,
                parent: None,
                children: Vec::new(),
            }],
        };
        let root = Self::root();
        match view {
            View::Fragment(children) => {
                for child in children {
                    tree.push(root, child);
                }
            }
            other => {
                tree.push(root, other);
            }
        }
        tree
    }

    fn push(&mut self, parent: NodeId, view: View) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        let (kind, children) = match view {
            View::Fragment(children) => (NodeKind::Fragment, children),
            View::Element { tag, id, children } => (NodeKind::Element { tag, id }, children),
            View::Text(text) => (NodeKind::Text(text), Vec::new()),
            View::Boundary {
                name,
                fallback,
                children,
            } => (NodeKind::Boundary { name, fallback }, children),
            View::Component(component) => (NodeKind::Component(component), Vec::new()),
        };
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.index()].children.push(id);
        for child in children {
            self.push(id, child);
        }
        id
    }

    /// The root node id.
    pub const fn root() -> NodeId {
        NodeId::new(0)
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds only the root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Look up a node.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Every component in document order.
    pub fn components(&self) -> Vec<(NodeId, Arc<dyn Component>)> {
        self.components_under(Self::root())
    }

    /// Components in the subtree rooted at `node`, in document order.
    pub fn components_under(&self, node: NodeId) -> Vec<(NodeId, Arc<dyn Component>)> {
        self.descendants(node)
            .into_iter()
            .filter_map(|id| match &self.nodes[id.index()].kind {
                NodeKind::Component(component) => Some((id, Arc::clone(component))),
                _ => None,
            })
            .collect()
    }

    /// `node` and all of its descendants in document order.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if self.node(node).is_none() {
            return out;
        }
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            out.push(id);
            for child in self.nodes[id.index()].children.iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// Nearest strict ancestor that is a boundary.
    pub fn nearest_boundary(&self, node: NodeId) -> Option<NodeId> {
        let mut current = self.node(node)?.parent;
        while let Some(id) = current {
            let ancestor = &self.nodes[id.index()];
            if ancestor.is_boundary() {
                return Some(id);
            }
            current = ancestor.parent;
        }
        None
    }

    /// Whether the tree declares any boundary.
    pub fn has_boundaries(&self) -> bool {
        self.nodes.iter().any(Node::is_boundary)
    }

    /// Human-readable path to `node`, root first, e.g.
    /// `root > div#page > boundary:dynamic`.
    pub fn path(&self, node: NodeId) -> String {
        let mut segments = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            let Some(n) = self.node(id) else { break };
            segments.push(match &n.kind {
                NodeKind::Fragment if n.parent.is_none() => "root".to_string(),
                NodeKind::Fragment => "fragment".to_string(),
                NodeKind::Element { tag, id: Some(attr) } => format!("{}#{}", tag, attr),
                NodeKind::Element { tag, id: None } => tag.clone(),
                NodeKind::Text(_) => "text".to_string(),
                NodeKind::Boundary { name, .. } => format!("boundary:{}", name),
                NodeKind::Component(component) => component.name().to_string(),
            });
            current = n.parent;
        }
        segments.reverse();
        segments.join(" > ")
    }
}
