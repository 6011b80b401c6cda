//! Observable state cells shared by the stores.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

pub type SubscriptionId = u64;

type Subscriber<T> = Rc<dyn Fn(&T)>;

/// A value plus the subscribers that want to hear when it changes.
///
/// Subscribers run after the borrow is released, so they may read the cell
/// or update it again. An update made from inside a subscriber is queued and
/// delivered to everyone after the current change, so every subscriber sees
/// changes in the order they were made.
pub struct Observable<T: Clone> {
    value: RefCell<T>,
    subscribers: RefCell<Vec<(SubscriptionId, Subscriber<T>)>>,
    next_id: Cell<SubscriptionId>,
    pending: RefCell<VecDeque<T>>,
    notifying: Cell<bool>,
}

impl<T: Clone + Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: RefCell::new(value),
            subscribers: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
            pending: RefCell::new(VecDeque::new()),
            notifying: Cell::new(false),
        }
    }

    /// A snapshot of the current value.
    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }

    /// Reads a projection without cloning the whole value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.borrow())
    }

    /// Mutates in place, then notifies every subscriber once.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let (result, snapshot) = {
            let mut value = self.value.borrow_mut();
            let result = f(&mut value);
            (result, value.clone())
        };
        self.pending.borrow_mut().push_back(snapshot);
        self.notify();
        result
    }

    pub fn set(&self, value: T) {
        self.update(|current| *current = value);
    }

    pub fn subscribe(&self, subscriber: impl Fn(&T) + 'static) -> SubscriptionId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.subscribers.borrow_mut().push((id, Rc::new(subscriber)));
        id
    }

    /// `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Drains queued changes. A nested call returns at once; the outer
    /// loop picks up what it queued.
    fn notify(&self) {
        if self.notifying.replace(true) {
            return;
        }
        while let Some(snapshot) = self.next_pending() {
            let subscribers: Vec<Subscriber<T>> = self
                .subscribers
                .borrow()
                .iter()
                .map(|(_, s)| s.clone())
                .collect();
            for subscriber in subscribers {
                subscriber(&snapshot);
            }
        }
        self.notifying.set(false);
    }

    fn next_pending(&self) -> Option<T> {
        self.pending.borrow_mut().pop_front()
    }
}
