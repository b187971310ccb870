//! Single-threaded listener registry for observable store state.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Handle returned by `subscribe`, used to unsubscribe.
pub type ListenerId = u64;

/// Ordered set of callbacks notified with a borrowed event.
///
/// Listeners may subscribe or unsubscribe from inside a notification; such
/// changes take effect from the next `notify`.
pub struct Listeners<E: ?Sized> {
    next_id: Cell<ListenerId>,
    listeners: RefCell<BTreeMap<ListenerId, Rc<dyn Fn(&E)>>>,
}

impl<E: ?Sized> Listeners<E> {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(0),
            listeners: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&E) + 'static) -> ListenerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.listeners.borrow_mut().insert(id, Rc::new(listener));
        id
    }

    /// Returns `false` when `id` was not subscribed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.borrow_mut().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }

    /// Calls every listener in subscription order.
    pub fn notify(&self, event: &E) {
        let snapshot: Vec<Rc<dyn Fn(&E)>> = self.listeners.borrow().values().cloned().collect();
        for listener in snapshot {
            listener(event);
        }
    }
}

impl<E: ?Sized> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}
