// SPDX-License-Identifier: MIT OR Apache-2.0
//! Broadcast bus publishing every completed [`scheduler_core::Decision`].
//!
//! Subscribers that fall behind simply miss the oldest buffered events
//! (`tokio::sync::broadcast`'s lagged semantics) rather than blocking the
//! pipeline executor; a slow consumer must never add backpressure to
//! scheduling latency.

use tokio::sync::broadcast;

/// One published decision event, tagged with the pipeline that produced
/// it.
#[derive(Debug, Clone)]
pub struct DecisionEvent {
    /// The configured name of the pipeline that ran.
    pub pipeline_name: String,
    /// The decision that was produced.
    pub decision: scheduler_core::Decision,
}

/// Running counters describing bus health, exposed alongside
/// [`crate::telemetry::RunMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventBusStats {
    /// Number of events ever published.
    pub published_total: u64,
    /// Current number of live subscribers.
    pub subscriber_count: usize,
}

/// A broadcast channel of [`DecisionEvent`]s with a bounded ring buffer.
pub struct EventBus {
    sender: broadcast::Sender<DecisionEvent>,
    published_total: std::sync::atomic::AtomicU64,
}

impl EventBus {
    /// Construct a bus retaining at most `capacity` unconsumed events per
    /// subscriber before it starts dropping the oldest.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            published_total: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Publish a decision. Returns the number of subscribers it reached;
    /// `0` is not an error, it just means nobody is currently listening.
    pub fn publish(&self, event: DecisionEvent) -> usize {
        self.published_total
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.sender.send(event).map_or(0, |n| n)
    }

    /// Subscribe to future decision events.
    #[must_use]
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Current bus statistics.
    #[must_use]
    pub fn stats(&self) -> EventBusStats {
        EventBusStats {
            published_total: self
                .published_total
                .load(std::sync::atomic::Ordering::Relaxed),
            subscriber_count: self.sender.receiver_count(),
        }
    }
}

/// A live subscription returned by [`EventBus::subscribe`].
pub struct EventSubscription {
    receiver: broadcast::Receiver<DecisionEvent>,
}

impl EventSubscription {
    /// Await the next event, or an error if this subscriber lagged and
    /// missed some events (in which case the next successful `recv`
    /// yields the oldest event still buffered).
    pub async fn recv(&mut self) -> Result<DecisionEvent, broadcast::error::RecvError> {
        self.receiver.recv().await
    }
}
