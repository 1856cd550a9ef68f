//! Registered-listener fan-out.
//!
//! Connections and adapters announce inbound frames, tag batches and errors
//! to every currently registered listener. `ListenerSet` keeps the set and
//! performs the iteration; it never holds its lock while a listener runs,
//! so a listener may register or deregister from inside a callback.

use parking_lot::RwLock;
use std::sync::Arc;

/// Set of listeners notified by iteration.
///
/// Listeners are compared by pointer identity: registering the same `Arc`
/// twice has no effect.
pub struct ListenerSet<L: ?Sized> {
    listeners: RwLock<Vec<Arc<L>>>,
}

impl<L: ?Sized> ListenerSet<L> {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Add a listener. Returns `false` if it was already registered.
    pub fn register(&self, listener: Arc<L>) -> bool {
        let mut listeners = self.listeners.write();
        if listeners.iter().any(|l| same(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn deregister(&self, listener: &Arc<L>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !same(l, listener));
        listeners.len() != before
    }

    /// Call `f` once for every registered listener, in registration order.
    ///
    /// Returns the number of listeners notified.
    pub fn notify(&self, mut f: impl FnMut(&L)) -> usize {
        let snapshot: Vec<Arc<L>> = self.listeners.read().clone();
        for listener in &snapshot {
            f(listener);
        }
        snapshot.len()
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    pub fn clear(&self) {
        self.listeners.write().clear();
    }
}

impl<L: ?Sized> Default for ListenerSet<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ?Sized> std::fmt::Debug for ListenerSet<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("len", &self.len())
            .finish()
    }
}

// Data pointer only; vtable pointers of the same object may differ.
fn same<L: ?Sized>(a: &Arc<L>, b: &Arc<L>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}
