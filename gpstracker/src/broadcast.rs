//! Status broadcast channel.
//!
//! Fire-and-forget publish point for the `STATUS` and `LOCATION` topics.
//! Each publish goes to every subscriber attached at that moment, in publish
//! order, at most once. Nothing is stored for late subscribers, apart from
//! the latest status kept for synchronous queries.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tracing::{trace, warn};

use crate::tracking::{LocationSample, StatusRecord};

/// A published event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerEvent {
    /// `STATUS` topic.
    Status(StatusRecord),
    /// `LOCATION` topic.
    Location(LocationSample),
}

impl TrackerEvent {
    /// Topic name.
    pub fn topic(&self) -> &'static str {
        match self {
            TrackerEvent::Status(_) => "STATUS",
            TrackerEvent::Location(_) => "LOCATION",
        }
    }
}

/// Publisher side of the channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StatusBroadcaster {
    tx: broadcast::Sender<TrackerEvent>,
    latest: Arc<watch::Sender<StatusRecord>>,
}

impl StatusBroadcaster {
    /// Create a channel. Subscribers more than `capacity` events behind lose
    /// the oldest ones.
    ///
    /// A `capacity` of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        if capacity == 0 {
            warn!("Broadcast capacity 0 is not usable, using 1");
        }
        let (tx, _) = broadcast::channel(capacity.max(1));
        let (latest, _) = watch::channel(StatusRecord::default());
        Self {
            tx,
            latest: Arc::new(latest),
        }
    }

    /// Publish a status snapshot.
    pub fn publish_status(&self, status: StatusRecord) {
        self.latest.send_replace(status);
        self.publish(TrackerEvent::Status(status));
    }

    /// Publish a location sample.
    pub fn publish_location(&self, sample: LocationSample) {
        self.publish(TrackerEvent::Location(sample));
    }

    fn publish(&self, event: TrackerEvent) {
        let topic = event.topic();
        match self.tx.send(event) {
            Ok(receivers) => trace!(topic, receivers, "Published"),
            Err(_) => trace!(topic, "Published with no subscribers"),
        }
    }

    /// Attach a subscriber. It sees only events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.tx.subscribe()
    }

    /// The most recently published status.
    pub fn latest(&self) -> StatusRecord {
        *self.latest.borrow()
    }

    /// Number of attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
