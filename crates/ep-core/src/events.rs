//! Connectivity event channel
//!
//! A publish/subscribe bus for [`ConnectivityEvent`]s. The transport SDK
//! publishes on it whenever the device link changes, independently of which
//! call caused the change.
//!
//! Handlers run synchronously on the publisher's thread. The subscriber list
//! is snapshotted before delivery, so a handler may subscribe or unsubscribe
//! without deadlocking the channel.
//!
//! Registration is explicit: [`EventChannel::subscribe`] returns a
//! [`Subscription`] that unsubscribes when dropped. There is no "is this
//! object registered" query; owners track their own handle.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use crate::types::ConnectivityEvent;

/// Handler invoked for every published event
pub type EventHandler = Arc<dyn Fn(ConnectivityEvent) + Send + Sync>;

static GLOBAL_CHANNEL: OnceLock<EventChannel> = OnceLock::new();

struct ChannelInner {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(u64, EventHandler)>>,
}

/// Publish/subscribe bus for connectivity events.
///
/// Cloning yields another handle to the same bus.
#[derive(Clone)]
pub struct EventChannel {
    inner: Arc<ChannelInner>,
}

impl EventChannel {
    /// Create an isolated channel (tests, embedded hosts)
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                next_id: AtomicU64::new(1),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The process-wide channel
    pub fn global() -> &'static EventChannel {
        GLOBAL_CHANNEL.get_or_init(EventChannel::new)
    }

    /// Whether this handle refers to the process-wide channel
    pub fn is_global(&self) -> bool {
        GLOBAL_CHANNEL
            .get()
            .is_some_and(|global| Arc::ptr_eq(&global.inner, &self.inner))
    }

    /// Register a handler. It stays registered until the returned
    /// [`Subscription`] is dropped or unsubscribed.
    pub fn subscribe(&self, handler: EventHandler) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner.subscribers.lock().push((id, handler));
        tracing::debug!(subscription = id, "Event channel subscriber registered");

        Subscription {
            id,
            channel: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver an event to every current subscriber.
    ///
    /// Returns the number of handlers invoked.
    pub fn publish(&self, event: ConnectivityEvent) -> usize {
        let handlers: Vec<EventHandler> = self
            .inner
            .subscribers
            .lock()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        tracing::trace!(%event, subscribers = handlers.len(), "Publishing connectivity event");

        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Live registration on an [`EventChannel`]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    channel: Weak<ChannelInner>,
}

impl Subscription {
    /// Registration ID, unique within its channel
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the handler now
    pub fn unsubscribe(self) {
        // Drop does the work
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.upgrade() {
            channel.subscribers.lock().retain(|(id, _)| *id != self.id);
            tracing::debug!(subscription = self.id, "Event channel subscriber removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_handler(counter: &Arc<AtomicUsize>) -> EventHandler {
        let counter = Arc::clone(counter);
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_is_global() {
        let global = EventChannel::global().clone();
        assert!(global.is_global());
        assert!(!EventChannel::new().is_global());
    }

    #[test]
    fn test_publish_reaches_all_subscribers() {
        let channel = EventChannel::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let _a = channel.subscribe(counting_handler(&counter));
        let _b = channel.subscribe(counting_handler(&counter));

        assert_eq!(channel.publish(ConnectivityEvent::DeviceConnected), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let channel = EventChannel::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let sub = channel.subscribe(counting_handler(&counter));
        assert_eq!(channel.subscriber_count(), 1);

        sub.unsubscribe();
        assert_eq!(channel.subscriber_count(), 0);
        assert_eq!(channel.publish(ConnectivityEvent::DeviceDisconnected), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handler_may_unsubscribe_during_delivery() {
        let channel = EventChannel::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let slot_clone = Arc::clone(&slot);
        let sub = channel.subscribe(Arc::new(move |_| {
            slot_clone.lock().take();
        }));
        *slot.lock() = Some(sub);

        assert_eq!(channel.publish(ConnectivityEvent::DeviceConnected), 1);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn test_subscription_outlives_channel() {
        let channel = EventChannel::new();
        let sub = channel.subscribe(Arc::new(|_| {}));
        drop(channel);
        // Must not panic
        drop(sub);
    }

    #[test]
    fn test_clones_share_subscribers() {
        let channel = EventChannel::new();
        let other = channel.clone();
        let _sub = channel.subscribe(Arc::new(|_| {}));
        assert_eq!(other.subscriber_count(), 1);
    }
}
