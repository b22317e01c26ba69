use serde::{Deserialize, Serialize};

/// Identifier of a slice (one sub-visualization of a dashboard).
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SliceId(pub u64);

impl SliceId {
    pub fn new(n: u64) -> Self {
        SliceId(n)
    }
}

impl std::fmt::Display for SliceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "slice-{}", self.0)
    }
}
