//! Shell artifacts.

use std::ops::Range;

use chrono::{DateTime, Utc};
use ppr_core::{HoleId, NodeId};
use ppr_render::{ResumeTarget, ResumedHole};
use serde::{Deserialize, Serialize};

use crate::assemble::AssembleError;

/// Opening marker of a hole placeholder.
pub fn hole_open(id: HoleId) -> String {
    format!("<!--ppr:hole:{}-->", id)
}

/// Closing marker of a hole placeholder.
pub fn hole_close(id: HoleId) -> String {
    format!("<!--/ppr:hole:{}-->", id)
}

/// Position of a hole inside the shell body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoleDescriptor {
    /// Hole id, in document order.
    pub id: HoleId,
    /// Boundary node the hole stands for.
    pub node: NodeId,
    /// Boundary name.
    pub boundary: String,
    /// Byte offset of the placeholder in the shell body.
    pub offset: usize,
    /// Byte length of the placeholder, markers included.
    pub len: usize,
}

impl HoleDescriptor {
    /// The resume target that fills this hole.
    pub fn target(&self) -> ResumeTarget {
        ResumeTarget {
            hole: self.id,
            boundary: self.node,
        }
    }

    /// Byte range of the placeholder.
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset.saturating_add(self.len)
    }
}

/// Immutable snapshot of a prerendered route.
///
/// A new prerender produces a new artifact; artifacts are never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellArtifact {
    route: String,
    html: String,
    holes: Vec<HoleDescriptor>,
    eligible: bool,
    intercepted: bool,
    generated_at: DateTime<Utc>,
}

impl ShellArtifact {
    pub(crate) fn new(
        route: impl Into<String>,
        html: String,
        holes: Vec<HoleDescriptor>,
        eligible: bool,
        intercepted: bool,
    ) -> Self {
        Self {
            route: route.into(),
            html,
            holes,
            eligible,
            intercepted,
            generated_at: Utc::now(),
        }
    }

    /// Route pathname.
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Static shell body with placeholders.
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Hole descriptors in document order.
    pub fn holes(&self) -> &[HoleDescriptor] {
        &self.holes
    }

    /// Whether the shell has unresolved holes.
    pub fn has_holes(&self) -> bool {
        !self.holes.is_empty()
    }

    /// Whether the shell can be served. `false` when request data was needed
    /// outside every boundary.
    pub fn eligible(&self) -> bool {
        self.eligible
    }

    /// Whether the prerender recorded interceptions.
    pub fn intercepted(&self) -> bool {
        self.intercepted
    }

    /// When the artifact was assembled.
    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    /// Targets for resuming every hole, in hole order.
    pub fn resume_targets(&self) -> Vec<ResumeTarget> {
        self.holes.iter().map(HoleDescriptor::target).collect()
    }

    /// Placeholder text of a hole.
    pub fn placeholder(&self, id: HoleId) -> Option<&str> {
        self.holes
            .iter()
            .find(|hole| hole.id == id)
            .and_then(|hole| self.html.get(hole.range()))
    }

    /// Substitute resumed content for every placeholder.
    pub fn fill(&self, resumed: &[ResumedHole]) -> Result<String, AssembleError> {
        let mut body = String::with_capacity(self.html.len());
        let mut cursor = 0;

        for hole in &self.holes {
            let content = resumed
                .iter()
                .find(|r| r.hole == hole.id)
                .ok_or(AssembleError::UnfilledHole(hole.id))?;
            if hole.offset < cursor {
                return Err(AssembleError::CorruptPlaceholder(hole.id));
            }
            let end = hole
                .offset
                .checked_add(hole.len)
                .ok_or(AssembleError::CorruptPlaceholder(hole.id))?;
            let before = self
                .html
                .get(cursor..hole.offset)
                .ok_or(AssembleError::CorruptPlaceholder(hole.id))?;
            if self.html.get(hole.offset..end).is_none() {
                return Err(AssembleError::CorruptPlaceholder(hole.id));
            }
            body.push_str(before);
            body.push_str(&content.html);
            cursor = end;
        }
        // Every prior slice ended on a char boundary inside the body.
        body.push_str(&self.html[cursor..]);

        Ok(body)
    }

    /// Serialize for persistence.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load a persisted artifact.
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }
}
