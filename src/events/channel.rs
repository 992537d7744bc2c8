//! Event channel implementation using crossbeam-channel.

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::Event;

/// Sends events from pipeline workers.
///
/// Cloned into every stage worker. A sender with no channel behind it
/// discards everything, which is what [`null_sender`] hands out.
#[derive(Debug, Clone, Default)]
pub struct EventSender {
    inner: Option<Sender<Event>>,
}

impl EventSender {
    /// Wrap a raw crossbeam sender.
    pub fn new(sender: Sender<Event>) -> Self {
        Self {
            inner: Some(sender),
        }
    }

    /// Send an event. Dropped silently if nobody is listening.
    pub fn send(&self, event: Event) {
        if let Some(inner) = &self.inner {
            let _ = inner.send(event);
        }
    }

    /// Whether events sent here can reach a receiver
    pub fn is_attached(&self) -> bool {
        self.inner.is_some()
    }
}

/// Receives events for a UI layer.
pub struct EventReceiver {
    inner: Receiver<Event>,
}

impl EventReceiver {
    /// Iterate until every sender is dropped
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.inner.iter()
    }
}

/// Constructors for event channels.
pub struct EventChannel;

impl EventChannel {
    /// Create an unbounded event channel.
    pub fn new() -> (EventSender, EventReceiver) {
        let (sender, receiver) = unbounded();
        (EventSender::new(sender), EventReceiver { inner: receiver })
    }
}

/// A no-op event sender.
pub fn null_sender() -> EventSender {
    EventSender::default()
}
