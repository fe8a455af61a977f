//! Newtype IDs for render tree nodes, holes and render attempts.
//!
//! Using newtypes prevents accidentally mixing up index spaces, e.g.
//! passing a hole index where an arena slot is expected.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Macro to generate index-backed ID structs.
macro_rules! define_index_id {
    ($name:ident, $prefix:literal) => {
        /// A stable index identifier.
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(usize);

        impl $name {
            /// Create an ID from a raw index.
            pub const fn new(index: usize) -> Self {
                Self(index)
            }

            /// Get the raw index.
            pub const fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }

        impl From<usize> for $name {
            fn from(index: usize) -> Self {
                Self(index)
            }
        }
    };
}

define_index_id!(NodeId, "n");
define_index_id!(HoleId, "h");

/// Identifier of one render attempt.
///
/// Attempt ids are process-unique so a postpone signal raised in one attempt
/// can never be mistaken for one belonging to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttemptId(u64);

static NEXT_ATTEMPT: AtomicU64 = AtomicU64::new(1);

impl AttemptId {
    /// Allocate the next attempt id.
    pub fn next() -> Self {
        Self(NEXT_ATTEMPT.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt-{}", self.0)
    }
}
