use serde::{Serialize, Deserialize};

/// Definition of one subtree of a process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Tree {
    Sequence {
        children: Vec<Tree>,
        /// Opens a fresh variable frame for the children.
        #[serde(default)]
        scope: bool,
    },
    Concurrence {
        children: Vec<Tree>,
    },
    Reserve {
        /// Mutex name, may contain `${...}` references.
        mutex: String,
        #[serde(default)]
        child: Option<Box<Tree>>,
    },
    Participant {
        name: String,
    },
}

impl Tree {
    pub fn sequence(children: Vec<Tree>) -> Self {
        Tree::Sequence { children, scope: false }
    }

    pub fn scoped(children: Vec<Tree>) -> Self {
        Tree::Sequence { children, scope: true }
    }

    pub fn concurrence(children: Vec<Tree>) -> Self {
        Tree::Concurrence { children }
    }

    pub fn reserve(mutex: &str, child: Tree) -> Self {
        Tree::Reserve {
            mutex: mutex.to_string(),
            child: Some(Box::new(child)),
        }
    }

    pub fn empty_reserve(mutex: &str) -> Self {
        Tree::Reserve {
            mutex: mutex.to_string(),
            child: None,
        }
    }

    pub fn participant(name: &str) -> Self {
        Tree::Participant { name: name.to_string() }
    }
}
