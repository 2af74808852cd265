//! Single-threaded runtime plumbing: timers and ordered notifications.

pub mod timer;
pub mod bus;

pub use timer::{Scheduler, TimerHandle, FiredTimer};
pub use bus::{
    NotificationBus, NotificationOrder, SubscriptionId,
    FIRST_NOTIFICATION_ORDER, DEFAULT_NOTIFICATION_ORDER, LAST_NOTIFICATION_ORDER,
};
