//! Change subscribers.
//!
//! A read layer that wants to know when an attribute changes registers a
//! `Subscriber` on it. Subscribers are deduplicated by handle: registering
//! the same subscriber (or a clone of it) twice on one attribute has no
//! effect.

use crate::name::AttrName;
use crate::node::NodeId;
use crate::numeric::StatValue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identifier for a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// What a subscriber is told after an attribute has been updated.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// The attribute that was updated.
    pub node: NodeId,
    /// Its name at the time of the update.
    pub name: AttrName,
    /// Its value after the update, `None` if it has no value.
    pub value: Option<StatValue>,
}

/// A change observer.
///
/// Cloning a subscriber yields the same handle, so a clone registered on
/// an attribute that already has the original is ignored.
///
/// # Examples
///
/// ```rust
/// use statsheet::{Sheet, Subscriber};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let mut sheet = Sheet::new();
/// let hp = sheet.create_scalar("HP", 10.0);
///
/// let seen = Arc::new(AtomicUsize::new(0));
/// let counter = seen.clone();
/// let sub = Subscriber::new(move |_event| {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// assert!(sheet.add_callback(hp, sub.clone()).unwrap());
/// assert!(!sheet.add_callback(hp, sub).unwrap());
///
/// sheet.set_value(hp, 12.0).unwrap();
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone)]
pub struct Subscriber {
    id: SubscriberId,
    notify: Arc<dyn Fn(&ChangeEvent) + Send + Sync>,
}

impl Subscriber {
    /// Create a new subscriber with the given notification callback.
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        Self {
            id: SubscriberId::new(),
            notify: Arc::new(notify),
        }
    }

    /// Get the subscriber's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Deliver a change notification.
    pub fn notify(&self, event: &ChangeEvent) {
        (self.notify)(event);
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.id).finish()
    }
}
