//! Synchronous, in-process publish/subscribe bus keyed by topic name.
//!
//! The messenger keeps non-owning (`Weak`) references to its handlers and
//! invokes them on the publishing thread, in subscription order.

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    fmt,
    rc::{Rc, Weak},
    str::FromStr,
};

use shared::{domain::SubscriptionId, protocol::Payload};
use tracing::{debug, trace, warn};

pub mod error;

pub use error::{DispatchError, HandlerError};

pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Capability of anything that can receive messages from a [`Messenger`].
pub trait MessageHandler {
    fn message_handler(&self, topic: &str, payload: Option<&Payload>) -> Result<(), HandlerError>;
}

/// What `publish` does when a handler returns an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchPolicy {
    /// Log, record in the report and keep delivering.
    #[default]
    Isolate,
    /// Stop delivering and return the error to the publisher.
    Abort,
}

impl DispatchPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Isolate => "isolate",
            Self::Abort => "abort",
        }
    }
}

impl fmt::Display for DispatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DispatchPolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "isolate" => Ok(Self::Isolate),
            "abort" => Ok(Self::Abort),
            other => Err(format!(
                "unknown dispatch policy '{other}' (expected 'isolate' or 'abort')"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    pub policy: DispatchPolicy,
    pub max_depth: usize,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            policy: DispatchPolicy::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Debug)]
pub struct HandlerFailure {
    pub subscription: SubscriptionId,
    pub error: HandlerError,
}

/// Outcome of a single `publish`.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub delivered: usize,
    /// Registrations whose handler had already been dropped.
    pub skipped_dropped: usize,
    pub failures: Vec<HandlerFailure>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Subscription {
    id: SubscriptionId,
    handler: Weak<dyn MessageHandler>,
}

impl Subscription {
    fn points_to(&self, target: *const ()) -> bool {
        std::ptr::eq(self.handler.as_ptr() as *const (), target)
    }
}

pub struct Messenger {
    subscribers: RefCell<HashMap<String, Vec<Subscription>>>,
    next_id: Cell<u64>,
    depth: Cell<usize>,
    options: DispatchOptions,
}

impl Default for Messenger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Messenger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Messenger")
            .field("topics", &self.topics())
            .field("options", &self.options)
            .finish()
    }
}

impl Messenger {
    pub fn new() -> Self {
        Self::with_options(DispatchOptions::default())
    }

    pub fn with_options(options: DispatchOptions) -> Self {
        Self {
            subscribers: RefCell::new(HashMap::new()),
            next_id: Cell::new(1),
            depth: Cell::new(0),
            options,
        }
    }

    /// Registers `handler` for future publishes on `topic`. Registering the same
    /// handler twice yields two deliveries per publish.
    pub fn subscribe<H>(&self, topic: &str, handler: &Rc<H>) -> SubscriptionId
    where
        H: MessageHandler + 'static,
    {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let handler: Rc<dyn MessageHandler> = handler.clone();
        self.subscribers
            .borrow_mut()
            .entry(topic.to_string())
            .or_default()
            .push(Subscription {
                id,
                handler: Rc::downgrade(&handler),
            });

        debug!(topic, subscription = %id, "subscribed");
        id
    }

    /// Removes every registration of `handler` on `topic`, returning how many
    /// were removed.
    pub fn unsubscribe<H>(&self, topic: &str, handler: &Rc<H>) -> usize
    where
        H: MessageHandler + 'static,
    {
        let target = Rc::as_ptr(handler) as *const ();
        let removed = self.remove_where(topic, |sub| sub.points_to(target));
        debug!(topic, removed, "unsubscribed handler");
        removed
    }

    pub fn unsubscribe_id(&self, topic: &str, id: SubscriptionId) -> bool {
        let removed = self.remove_where(topic, |sub| sub.id == id) > 0;
        debug!(topic, subscription = %id, removed, "unsubscribed id");
        removed
    }

    fn remove_where(&self, topic: &str, matches: impl Fn(&Subscription) -> bool) -> usize {
        let mut subscribers = self.subscribers.borrow_mut();
        let Some(list) = subscribers.get_mut(topic) else {
            return 0;
        };
        let before = list.len();
        list.retain(|sub| !matches(sub));
        let removed = before - list.len();
        if list.is_empty() {
            subscribers.remove(topic);
        }
        removed
    }

    /// Drops registrations whose handler no longer exists.
    pub fn prune_dropped(&self) -> usize {
        let mut subscribers = self.subscribers.borrow_mut();
        let mut pruned = 0;
        subscribers.retain(|_, list| {
            let before = list.len();
            list.retain(|sub| sub.handler.strong_count() > 0);
            pruned += before - list.len();
            !list.is_empty()
        });
        if pruned > 0 {
            debug!(pruned, "pruned dropped handlers");
        }
        pruned
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers
            .borrow()
            .get(topic)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.subscribers.borrow().keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Delivers `payload` to every handler subscribed to `topic` when the call
    /// starts, in subscription order, on the calling thread. A topic without
    /// subscribers is a no-op.
    pub fn publish(
        &self,
        topic: &str,
        payload: Option<Payload>,
    ) -> Result<DispatchReport, DispatchError> {
        let _depth = DepthGuard::enter(self, topic)?;

        // Snapshot so handlers may subscribe/unsubscribe/publish re-entrantly.
        let targets: Vec<(SubscriptionId, Weak<dyn MessageHandler>)> = self
            .subscribers
            .borrow()
            .get(topic)
            .map(|list| {
                list.iter()
                    .map(|sub| (sub.id, sub.handler.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let mut report = DispatchReport::default();
        if targets.is_empty() {
            trace!(topic, "publish without subscribers");
            return Ok(report);
        }

        debug!(
            topic,
            handlers = targets.len(),
            has_payload = payload.is_some(),
            "dispatching"
        );

        for (id, handler) in targets {
            let Some(handler) = handler.upgrade() else {
                trace!(topic, subscription = %id, "handler dropped; skipping");
                report.skipped_dropped += 1;
                continue;
            };

            trace!(topic, subscription = %id, "delivering");
            match handler.message_handler(topic, payload.as_ref()) {
                Ok(()) => report.delivered += 1,
                Err(error) => match self.options.policy {
                    DispatchPolicy::Isolate => {
                        warn!(topic, subscription = %id, %error, "handler failed; continuing dispatch");
                        report.failures.push(HandlerFailure {
                            subscription: id,
                            error,
                        });
                    }
                    DispatchPolicy::Abort => {
                        return Err(DispatchError::Handler {
                            topic: topic.to_string(),
                            subscription: id,
                            source: error,
                        });
                    }
                },
            }
        }

        Ok(report)
    }
}

struct DepthGuard<'a> {
    depth: &'a Cell<usize>,
}

impl<'a> DepthGuard<'a> {
    fn enter(messenger: &'a Messenger, topic: &str) -> Result<Self, DispatchError> {
        let depth = messenger.depth.get();
        if depth >= messenger.options.max_depth {
            return Err(DispatchError::DepthExceeded {
                topic: topic.to_string(),
                max_depth: messenger.options.max_depth,
            });
        }
        messenger.depth.set(depth + 1);
        Ok(Self {
            depth: &messenger.depth,
        })
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
