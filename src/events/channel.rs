//! Event channel implementation using crossbeam-channel.
//!
//! Walker and processor threads send; the CLI progress thread drains the
//! receiver until every sender is gone.

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::Event;

/// Sends events from the walker and processor.
///
/// Cheap to clone; every worker thread may hold one.
#[derive(Clone)]
pub struct EventSender {
    inner: Sender<Event>,
}

impl EventSender {
    /// Send an event. A dropped receiver means the event is discarded.
    pub fn send(&self, event: Event) {
        let _ = self.inner.send(event);
    }
}

/// Receiving end, held by the CLI progress display.
pub struct EventReceiver {
    inner: Receiver<Event>,
}

impl EventReceiver {
    /// Events in send order; ends once all senders are dropped
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.inner.iter()
    }
}

pub struct EventChannel;

impl EventChannel {
    /// Unbounded channel
    pub fn new() -> (EventSender, EventReceiver) {
        let (sender, receiver) = unbounded();
        (
            EventSender { inner: sender },
            EventReceiver { inner: receiver },
        )
    }
}

/// Sender whose events go nowhere; used when no one is watching progress.
pub fn null_sender() -> EventSender {
    let (sender, _receiver) = EventChannel::new();
    sender
}
