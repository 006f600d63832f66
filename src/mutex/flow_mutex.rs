use crate::runtime::nid::Nid;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::warn;

/// Outcome of `FlowMutex::register`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The registrant is the holder and may enter right away.
    Acquired,
    /// The registrant waits behind `position` earlier entries.
    Queued { position: usize },
}

/// Outcome of `FlowMutex::withdraw`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Withdrawal {
    pub found: bool,
    pub was_holder: bool,
    /// New holder to wake, only set when the holder withdrew.
    pub next: Option<Nid>,
}

/// FIFO of node identities contending for one named mutex. The head is the
/// holder, everything behind it waits in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowMutex {
    pub name: String,
    waiters: VecDeque<Nid>,
}

impl FlowMutex {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            waiters: VecDeque::new(),
        }
    }

    pub fn register(&mut self, nid: Nid) -> Admission {
        self.waiters.push_back(nid);
        match self.waiters.len() {
            1 => Admission::Acquired,
            n => Admission::Queued { position: n - 1 },
        }
    }

    /// Pops the holder and returns the identity that now holds the mutex.
    pub fn release(&mut self, releaser: &Nid) -> Option<Nid> {
        match self.waiters.pop_front() {
            Some(current) if &current != releaser => {
                warn!(mutex = %self.name, current = %current, releaser = %releaser, "release by non-holder");
            }
            Some(_) => {}
            None => {
                warn!(mutex = %self.name, releaser = %releaser, "release on empty mutex");
            }
        }
        self.waiters.front().cloned()
    }

    /// Removes `nid` wherever it sits, keeping the order of the others.
    pub fn withdraw(&mut self, nid: &Nid) -> Withdrawal {
        let Some(index) = self.waiters.iter().position(|n| n == nid) else {
            return Withdrawal::default();
        };
        self.waiters.remove(index);
        let was_holder = index == 0;
        Withdrawal {
            found: true,
            was_holder,
            next: if was_holder { self.waiters.front().cloned() } else { None },
        }
    }

    /// Like `withdraw`, but a holder stays at the head and is only reported.
    pub fn withdraw_waiter(&mut self, nid: &Nid) -> Withdrawal {
        if self.holder() == Some(nid) {
            return Withdrawal {
                found: true,
                was_holder: true,
                next: None,
            };
        }
        self.withdraw(nid)
    }

    pub fn holder(&self) -> Option<&Nid> {
        self.waiters.front()
    }

    pub fn waiters(&self) -> impl Iterator<Item = &Nid> {
        self.waiters.iter()
    }

    pub fn contains(&self, nid: &Nid) -> bool {
        self.waiters.contains(nid)
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn nids(n: usize) -> Vec<Nid> {
        let root = Nid::root(Uuid::new_v4());
        (0..n).map(|i| root.child(i)).collect()
    }

    #[test]
    fn fifo_admission() {
        let ids = nids(3);
        let mut m = FlowMutex::new("m0");

        assert_eq!(m.register(ids[0].clone()), Admission::Acquired);
        assert_eq!(m.register(ids[1].clone()), Admission::Queued { position: 1 });
        assert_eq!(m.register(ids[2].clone()), Admission::Queued { position: 2 });

        assert_eq!(m.release(&ids[0]), Some(ids[1].clone()));
        assert_eq!(m.holder(), Some(&ids[1]));
        assert_eq!(m.release(&ids[1]), Some(ids[2].clone()));
        assert_eq!(m.release(&ids[2]), None);
        assert!(m.is_empty());
    }

    #[test]
    fn reusable_after_drain() {
        let ids = nids(2);
        let mut m = FlowMutex::new("m0");
        m.register(ids[0].clone());
        m.release(&ids[0]);

        assert_eq!(m.register(ids[1].clone()), Admission::Acquired);
    }

    #[test]
    fn mismatched_release_uses_popped_head() {
        let ids = nids(3);
        let mut m = FlowMutex::new("m0");
        m.register(ids[0].clone());
        m.register(ids[1].clone());

        // ids[2] never registered, the head still goes.
        assert_eq!(m.release(&ids[2]), Some(ids[1].clone()));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn release_on_empty_is_harmless() {
        let ids = nids(1);
        let mut m = FlowMutex::new("m0");
        assert_eq!(m.release(&ids[0]), None);
        assert!(m.is_empty());
    }

    #[test]
    fn withdraw_waiter_keeps_order() {
        let ids = nids(4);
        let mut m = FlowMutex::new("m0");
        for id in &ids {
            m.register(id.clone());
        }

        let w = m.withdraw(&ids[2]);
        assert!(w.found);
        assert!(!w.was_holder);
        assert_eq!(w.next, None);

        let order: Vec<_> = m.waiters().cloned().collect();
        assert_eq!(order, vec![ids[0].clone(), ids[1].clone(), ids[3].clone()]);
    }

    #[test]
    fn withdraw_holder_hands_over() {
        let ids = nids(2);
        let mut m = FlowMutex::new("m0");
        m.register(ids[0].clone());
        m.register(ids[1].clone());

        let w = m.withdraw(&ids[0]);
        assert!(w.was_holder);
        assert_eq!(w.next, Some(ids[1].clone()));
        assert!(!m.withdraw(&ids[0]).found);
    }

    #[test]
    fn withdraw_waiter_leaves_holder() {
        let ids = nids(3);
        let mut m = FlowMutex::new("m0");
        for id in &ids {
            m.register(id.clone());
        }

        let w = m.withdraw_waiter(&ids[0]);
        assert!(w.was_holder);
        assert_eq!(w.next, None);
        assert_eq!(m.holder(), Some(&ids[0]));

        assert!(m.withdraw_waiter(&ids[1]).found);
        assert_eq!(m.waiters().cloned().collect::<Vec<_>>(), vec![ids[0].clone(), ids[2].clone()]);
    }
}
