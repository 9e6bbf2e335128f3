//! Change notification fan-out.
//!
//! Every subscriber owns a bounded mailbox. Publishing never blocks: when a
//! mailbox is full the hub applies the configured [`OverflowPolicy`].
//!
//! | policy | on full mailbox |
//! |---|---|
//! | `DropOldest` | evict the oldest pending event, count it as dropped |
//! | `Disconnect` | close the subscription; pending events stay readable |

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};
use uuid::Uuid;

use crate::config::OverflowPolicy;
use crate::types::AtomEvent;

#[derive(Debug, Default)]
struct MailboxState {
    events: VecDeque<AtomEvent>,
    closed: bool,
}

#[derive(Debug)]
struct Mailbox {
    state: Mutex<MailboxState>,
    ready: Condvar,
    capacity: usize,
    dropped: AtomicU64,
}

/// Outcome of offering an event to one mailbox.
enum Delivery {
    Queued,
    QueuedAfterDrop,
    Overflowed,
    Closed,
}

impl Mailbox {
    fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(MailboxState::default()),
            ready: Condvar::new(),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    fn offer(&self, event: &AtomEvent, policy: OverflowPolicy) -> Delivery {
        let mut state = self.state.lock();
        if state.closed {
            return Delivery::Closed;
        }

        let mut delivery = Delivery::Queued;
        if state.events.len() >= self.capacity {
            match policy {
                OverflowPolicy::DropOldest => {
                    state.events.pop_front();
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    delivery = Delivery::QueuedAfterDrop;
                }
                OverflowPolicy::Disconnect => {
                    state.closed = true;
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    drop(state);
                    self.ready.notify_all();
                    return Delivery::Overflowed;
                }
            }
        }

        state.events.push_back(event.clone());
        drop(state);
        self.ready.notify_one();
        delivery
    }

    fn close(&self) {
        self.state.lock().closed = true;
        self.ready.notify_all();
    }
}

#[derive(Debug)]
struct HubInner {
    subscribers: RwLock<BTreeMap<Uuid, Arc<Mailbox>>>,
    capacity: usize,
    policy: OverflowPolicy,
}

impl HubInner {
    fn unsubscribe(&self, id: &Uuid) -> bool {
        match self.subscribers.write().remove(id) {
            Some(mailbox) => {
                mailbox.close();
                true
            }
            None => false,
        }
    }
}

/// Registry of subscribers.
#[derive(Debug)]
pub struct SubscriberHub {
    inner: Arc<HubInner>,
}

impl SubscriberHub {
    /// Create a hub whose mailboxes hold `capacity` events.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            inner: Arc::new(HubInner {
                subscribers: RwLock::new(BTreeMap::new()),
                capacity,
                policy,
            }),
        }
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> Subscription {
        let id = Uuid::new_v4();
        let mailbox = Arc::new(Mailbox::new(self.inner.capacity));
        self.inner.subscribers.write().insert(id, Arc::clone(&mailbox));
        tracing::debug!(subscription_id = %id, "Subscriber registered");
        Subscription {
            id,
            mailbox,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Remove a subscriber. Returns `false` when it was already gone.
    pub fn unsubscribe(&self, id: &Uuid) -> bool {
        self.inner.unsubscribe(id)
    }

    /// Deliver an event to every subscriber without blocking.
    ///
    /// Returns the number of mailboxes the event was queued in.
    pub fn publish(&self, event: &AtomEvent) -> usize {
        let mut delivered = 0;
        let mut overflowed = Vec::new();
        {
            let subscribers = self.inner.subscribers.read();
            for (id, mailbox) in subscribers.iter() {
                match mailbox.offer(event, self.inner.policy) {
                    Delivery::Queued => delivered += 1,
                    Delivery::QueuedAfterDrop => {
                        delivered += 1;
                        tracing::warn!(
                            subscription_id = %id,
                            dropped = mailbox.dropped.load(Ordering::Relaxed),
                            "Slow subscriber: dropped oldest event"
                        );
                    }
                    Delivery::Overflowed => overflowed.push(*id),
                    Delivery::Closed => {}
                }
            }
        }

        if !overflowed.is_empty() {
            let mut subscribers = self.inner.subscribers.write();
            for id in overflowed {
                subscribers.remove(&id);
                tracing::warn!(subscription_id = %id, "Slow subscriber disconnected");
            }
        }
        delivered
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    /// Close every subscription.
    pub fn close_all(&self) {
        let drained: Vec<Arc<Mailbox>> = {
            let mut subscribers = self.inner.subscribers.write();
            std::mem::take(&mut *subscribers).into_values().collect()
        };
        for mailbox in drained {
            mailbox.close();
        }
    }
}

/// Receiving end of a subscription.
///
/// Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    mailbox: Arc<Mailbox>,
    hub: Weak<HubInner>,
}

impl Subscription {
    /// Subscription id, usable with [`SubscriberHub::unsubscribe`].
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Take the next pending event, if any.
    pub fn try_recv(&self) -> Option<AtomEvent> {
        self.mailbox.state.lock().events.pop_front()
    }

    /// Wait up to `timeout` for the next event.
    ///
    /// Returns `None` on timeout, or immediately once the subscription is
    /// closed and empty.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<AtomEvent> {
        let deadline = Instant::now() + timeout;
        let mut state = self.mailbox.state.lock();
        loop {
            if let Some(event) = state.events.pop_front() {
                return Some(event);
            }
            if state.closed {
                return None;
            }
            if self.mailbox.ready.wait_until(&mut state, deadline).timed_out() {
                return state.events.pop_front();
            }
        }
    }

    /// Take every pending event.
    pub fn drain(&self) -> Vec<AtomEvent> {
        self.mailbox.state.lock().events.drain(..).collect()
    }

    /// Events lost to overflow.
    pub fn dropped(&self) -> u64 {
        self.mailbox.dropped.load(Ordering::Relaxed)
    }

    /// Whether no further events will arrive.
    pub fn is_closed(&self) -> bool {
        self.mailbox.state.lock().closed
    }

    /// Stop receiving events. Safe to call more than once.
    pub fn unsubscribe(&self) {
        match self.hub.upgrade() {
            Some(hub) => {
                hub.unsubscribe(&self.id);
            }
            None => self.mailbox.close(),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
