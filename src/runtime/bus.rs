//! Notification Bus
//!
//! Typed observer registry. Handlers are invoked in ascending order key;
//! handlers sharing a key run in subscription order.

use std::fmt;

/// Ordering key for notification handlers. Lower runs first.
pub type NotificationOrder = i32;

/// Runs before every other handler.
pub const FIRST_NOTIFICATION_ORDER: NotificationOrder = NotificationOrder::MIN;

/// Default position.
pub const DEFAULT_NOTIFICATION_ORDER: NotificationOrder = 0;

/// Runs after every other handler.
pub const LAST_NOTIFICATION_ORDER: NotificationOrder = NotificationOrder::MAX;

/// Handle returned by [`NotificationBus::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

struct Handler<E> {
    id: SubscriptionId,
    order: NotificationOrder,
    callback: Box<dyn FnMut(&E)>,
}

/// Ordered observer list for events of type `E`.
pub struct NotificationBus<E> {
    next_id: u64,
    handlers: Vec<Handler<E>>,
}

impl<E> Default for NotificationBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for NotificationBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationBus")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl<E> NotificationBus<E> {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            next_id: 0,
            handlers: Vec::new(),
        }
    }

    /// Register a handler at `order`.
    pub fn subscribe<F>(&mut self, order: NotificationOrder, callback: F) -> SubscriptionId
    where
        F: FnMut(&E) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;

        // Insert after every handler with order <= ours to keep ties stable
        let pos = self.handlers.partition_point(|h| h.order <= order);
        self.handlers.insert(
            pos,
            Handler {
                id,
                order,
                callback: Box::new(callback),
            },
        );
        id
    }

    /// Remove a handler. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|h| h.id != id);
        self.handlers.len() != before
    }

    /// Deliver `event` to every handler in order.
    pub fn publish(&mut self, event: &E) {
        for handler in &mut self.handlers {
            (handler.callback)(event);
        }
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
