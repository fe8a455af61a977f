//! Shell assembly from a finished prerender.

use ppr_core::{HoleId, NodeId};
use ppr_render::{HoleSink, HtmlWriter, PrerenderOutcome, RenderTree, SerializeError};

use crate::artifact::{hole_close, hole_open, HoleDescriptor, ShellArtifact};

/// Assembly errors.
#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    #[error("prerender of {pathname} still has {in_flight} subtrees rendering")]
    Incomplete { pathname: String, in_flight: usize },

    #[error(transparent)]
    Serialize(#[from] SerializeError),

    #[error("hole {0} has no resumed content")]
    UnfilledHole(HoleId),

    #[error("hole {0} does not point at a placeholder in the shell body")]
    CorruptPlaceholder(HoleId),
}

struct ShellHoles<'a> {
    pending: &'a [NodeId],
    descriptors: Vec<HoleDescriptor>,
}

impl HoleSink for ShellHoles<'_> {
    fn is_hole(&self, boundary: NodeId) -> bool {
        self.pending.contains(&boundary)
    }

    fn write_hole(&mut self, out: &mut String, boundary: NodeId, name: &str, fallback: &str) {
        let id = HoleId::new(self.descriptors.len());
        let offset = out.len();
        out.push_str(&hole_open(id));
        out.push_str(fallback);
        out.push_str(&hole_close(id));
        self.descriptors.push(HoleDescriptor {
            id,
            node: boundary,
            boundary: name.to_string(),
            offset,
            len: out.len() - offset,
        });
    }
}

/// Serialize the static parts of a prerender and place a hole descriptor
/// where each pending boundary sits.
///
/// A route that needed request data outside every boundary yields an empty,
/// ineligible artifact.
pub fn assemble(
    outcome: &PrerenderOutcome,
    tree: &RenderTree,
) -> Result<ShellArtifact, AssembleError> {
    if outcome.in_flight() > 0 {
        return Err(AssembleError::Incomplete {
            pathname: outcome.pathname().to_string(),
            in_flight: outcome.in_flight(),
        });
    }

    if outcome.is_route_dynamic() {
        tracing::debug!(pathname = outcome.pathname(), "route is fully dynamic");
        return Ok(ShellArtifact::new(
            outcome.pathname(),
            String::new(),
            Vec::new(),
            false,
            outcome.intercepted(),
        ));
    }

    let mut holes = ShellHoles {
        pending: outcome.hole_boundaries(),
        descriptors: Vec::new(),
    };
    let mut html = String::new();
    HtmlWriter::new(tree, outcome.outputs()).write(RenderTree::root(), &mut html, &mut holes)?;

    tracing::debug!(
        pathname = outcome.pathname(),
        holes = holes.descriptors.len(),
        bytes = html.len(),
        "shell assembled"
    );

    Ok(ShellArtifact::new(
        outcome.pathname(),
        html,
        holes.descriptors,
        true,
        outcome.intercepted(),
    ))
}
