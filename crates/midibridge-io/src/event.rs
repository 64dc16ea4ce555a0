//! Typed events delivered to subscribers.
//!
//! Each subscription owns a bounded queue. Publishing never blocks: a full
//! queue drops the event, a dropped receiver is pruned.

use crate::device::{DeviceId, PortKind};
use arc_swap::ArcSwap;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use midibridge_msg::{MessageKind, MidiMessage};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    Attached {
        kind: PortKind,
        id: DeviceId,
    },
    Detached {
        kind: PortKind,
        id: DeviceId,
    },
    /// A decoded message from an attached input.
    Message {
        id: DeviceId,
        message: MidiMessage,
        /// Platform timestamp, passed through untouched.
        timestamp: u64,
    },
}

impl BridgeEvent {
    pub fn device_id(&self) -> &DeviceId {
        match self {
            BridgeEvent::Attached { id, .. }
            | BridgeEvent::Detached { id, .. }
            | BridgeEvent::Message { id, .. } => id,
        }
    }

    pub fn message(&self) -> Option<&MidiMessage> {
        match self {
            BridgeEvent::Message { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Selects which events a subscription receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventFilter {
    input_ports: bool,
    output_ports: bool,
    messages: u32,
}

impl EventFilter {
    pub fn all() -> Self {
        let messages = MessageKind::ALL.iter().fold(0, |acc, k| acc | k.bit());
        Self {
            input_ports: true,
            output_ports: true,
            messages,
        }
    }

    pub fn none() -> Self {
        Self {
            input_ports: false,
            output_ports: false,
            messages: 0,
        }
    }

    /// Attach/detach events for one port direction.
    pub fn with_port_events(mut self, kind: PortKind) -> Self {
        match kind {
            PortKind::Input => self.input_ports = true,
            PortKind::Output => self.output_ports = true,
        }
        self
    }

    pub fn with_message(mut self, kind: MessageKind) -> Self {
        self.messages |= kind.bit();
        self
    }

    pub fn with_messages(self, kinds: impl IntoIterator<Item = MessageKind>) -> Self {
        kinds.into_iter().fold(self, Self::with_message)
    }

    /// Every voice message on any channel.
    pub fn with_channel_messages(self) -> Self {
        self.with_messages(MessageKind::ALL.into_iter().filter(|k| k.is_channel_message()))
    }

    /// Clock, transport and reset bytes.
    pub fn with_realtime_messages(self) -> Self {
        self.with_messages(MessageKind::ALL.into_iter().filter(|k| k.is_realtime()))
    }

    pub fn matches(&self, event: &BridgeEvent) -> bool {
        match event {
            BridgeEvent::Attached { kind, .. } | BridgeEvent::Detached { kind, .. } => match kind {
                PortKind::Input => self.input_ports,
                PortKind::Output => self.output_ports,
            },
            BridgeEvent::Message { message, .. } => self.messages & message.kind().bit() != 0,
        }
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::all()
    }
}

/// Receiving end of a subscription.
///
/// Yields `None` from blocking calls once the bridge has shut down and the
/// queue is drained.
#[derive(Debug, Clone)]
pub struct EventReceiver {
    receiver: Receiver<BridgeEvent>,
}

impl EventReceiver {
    #[inline]
    pub fn try_recv(&self) -> Option<BridgeEvent> {
        self.receiver.try_recv().ok()
    }

    pub fn recv(&self) -> Option<BridgeEvent> {
        self.receiver.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<BridgeEvent> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn drain(&self) -> Vec<BridgeEvent> {
        self.receiver.try_iter().collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// The underlying channel, for use with `crossbeam_channel::select!`.
    pub fn as_receiver(&self) -> &Receiver<BridgeEvent> {
        &self.receiver
    }
}

struct Subscriber {
    filter: EventFilter,
    sender: Sender<BridgeEvent>,
}

/// Copy-on-write subscriber list; publishing is lock-free.
pub(crate) struct EventBus {
    subscribers: ArcSwap<Vec<Arc<Subscriber>>>,
    capacity: usize,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            subscribers: ArcSwap::from_pointee(Vec::new()),
            capacity,
        }
    }

    pub(crate) fn subscribe(&self, filter: EventFilter) -> EventReceiver {
        let (sender, receiver) = bounded(self.capacity);
        let subscriber = Arc::new(Subscriber { filter, sender });
        self.subscribers.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(Arc::clone(&subscriber));
            next
        });
        EventReceiver { receiver }
    }

    pub(crate) fn publish(&self, event: BridgeEvent) {
        let subscribers = self.subscribers.load();
        let mut dead: Vec<Arc<Subscriber>> = Vec::new();

        for subscriber in subscribers.iter() {
            if !subscriber.filter.matches(&event) {
                continue;
            }
            match subscriber.sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    debug!("Event queue full, dropping {:?}", event);
                }
                Err(TrySendError::Disconnected(_)) => dead.push(Arc::clone(subscriber)),
            }
        }

        if !dead.is_empty() {
            self.subscribers.rcu(|current| {
                current
                    .iter()
                    .filter(|s| !dead.iter().any(|d| Arc::ptr_eq(d, *s)))
                    .cloned()
                    .collect::<Vec<_>>()
            });
        }
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.load().len()
    }

    /// Drops every sender; receivers drain what is queued and then end.
    pub(crate) fn close(&self) {
        self.subscribers.store(Arc::new(Vec::new()));
    }
}
