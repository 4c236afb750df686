use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of one execution context (a core or a thread) within a process.
///
/// Each context owns a private translation cache; the index also selects the
/// context's slice of an allocation space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextId(usize);

impl ContextId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx:{}", self.0)
    }
}

/// Network location of a process (one machine in a cluster).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location(u32);

impl Location {
    /// Location of node `node`.
    pub const fn new(node: u32) -> Self {
        Self(node)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loc:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        assert_eq!(ContextId::new(3).to_string(), "ctx:3");
        assert_eq!(Location::new(12).to_string(), "loc:12");
    }

    #[test]
    fn ordering_follows_index() {
        assert!(ContextId::new(0) < ContextId::new(1));
        assert!(Location::new(5) > Location::new(4));
    }
}
