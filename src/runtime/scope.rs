use crate::runtime::nid::Nid;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const SEPARATOR: char = '/';

/// Visibility tier of a named variable or mutex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Nearest enclosing variable frame.
    Local,
    /// Root frame of the owning process instance.
    Process,
    /// Shared by every process instance of the engine.
    Engine,
}

/// Splits a raw name into its scope tier and bare name by counting leading
/// separators. Anything beyond two separators is treated as engine-wide.
pub fn resolve(raw: &str) -> (Scope, &str) {
    let bare = raw.trim_start_matches(SEPARATOR);
    let scope = match raw.len() - bare.len() {
        0 => Scope::Local,
        1 => Scope::Process,
        _ => Scope::Engine,
    };
    (scope, bare)
}

/// Concrete frame a scoped name lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeKey {
    Frame(Nid),
    Process(Uuid),
    Engine,
}

impl ScopeKey {
    /// Maps a tier to the frame seen from `env`. The process root frame is the
    /// process frame, so local names evaluated there land in `Process`.
    pub fn for_scope(scope: Scope, env: &Nid) -> Self {
        match scope {
            Scope::Local if !env.is_root() => ScopeKey::Frame(env.clone()),
            Scope::Local | Scope::Process => ScopeKey::Process(env.instance_id),
            Scope::Engine => ScopeKey::Engine,
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKey::Frame(nid) => write!(f, "frame:{}", nid),
            ScopeKey::Process(id) => write!(f, "process:{}", id),
            ScopeKey::Engine => write!(f, "engine"),
        }
    }
}

/// Address of one mutex record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MutexKey {
    pub scope: ScopeKey,
    pub name: String,
}

impl MutexKey {
    pub fn new(raw_name: &str, env: &Nid) -> Self {
        let (scope, bare) = resolve(raw_name);
        Self {
            scope: ScopeKey::for_scope(scope, env),
            name: bare.to_string(),
        }
    }
}

impl fmt::Display for MutexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_by_prefix() {
        assert_eq!(resolve("m0"), (Scope::Local, "m0"));
        assert_eq!(resolve("/m0"), (Scope::Process, "m0"));
        assert_eq!(resolve("//m0"), (Scope::Engine, "m0"));
        assert_eq!(resolve("///m0"), (Scope::Engine, "m0"));
    }

    #[test]
    fn local_at_root_is_process() {
        let root = Nid::root(Uuid::new_v4());
        let nested = root.child(1);

        assert_eq!(MutexKey::new("m0", &root), MutexKey::new("/m0", &root));
        assert_eq!(MutexKey::new("m0", &nested).scope, ScopeKey::Frame(nested.clone()));
        assert_eq!(MutexKey::new("/m0", &nested).scope, ScopeKey::Process(root.instance_id));
        assert_eq!(MutexKey::new("//m0", &nested).scope, ScopeKey::Engine);
    }
}
