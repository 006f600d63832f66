use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of one instantiated expression inside a running process.
///
/// `expr_id` is the dotted child path from the root ("0", "0.1", "0.1.0"),
/// so siblings never collide while they are alive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nid {
    pub instance_id: Uuid,
    pub expr_id: String,
}

impl Nid {
    pub fn root(instance_id: Uuid) -> Self {
        Self {
            instance_id,
            expr_id: "0".to_string(),
        }
    }

    pub fn child(&self, index: usize) -> Self {
        Self {
            instance_id: self.instance_id,
            expr_id: format!("{}.{}", self.expr_id, index),
        }
    }

    pub fn is_root(&self) -> bool {
        !self.expr_id.contains('.')
    }

    /// Position of this node among its siblings, `None` for the root.
    pub fn child_index(&self) -> Option<usize> {
        self.expr_id
            .rsplit_once('.')
            .and_then(|(_, last)| last.parse().ok())
    }
}

impl fmt::Display for Nid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.expr_id, self.instance_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_paths() {
        let root = Nid::root(Uuid::new_v4());
        let c = root.child(2).child(0);
        assert_eq!(c.expr_id, "0.2.0");
        assert_eq!(c.child_index(), Some(0));
        assert!(root.is_root());
        assert!(!c.is_root());
        assert_eq!(root.child_index(), None);
    }
}
