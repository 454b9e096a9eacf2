//! Per-window publish/subscribe.
//!
//! Consumers (an emulator surface, a status line, a test) subscribe to one
//! window id and drain their receiver on the UI thread. Closing a window drops
//! its senders, which the receivers observe as a disconnect.

use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::bridge::TerminalId;
use crate::grid::GridSize;
use crate::window::ModeKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
    /// Raw output from the session, to be written into the emulator.
    Output(String),
    /// The local grid changed; the emulator should resize now.
    Fitted(GridSize),
    /// The remote PTY was told about this grid.
    Negotiated(GridSize),
    ModeChanged(ModeKind),
    Bound,
    Offline,
    Closed,
}

#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: BTreeMap<TerminalId, Vec<Sender<WindowEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, id: &TerminalId) -> Receiver<WindowEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.entry(id.clone()).or_default().push(tx);
        rx
    }

    /// Delivers to every live subscriber of `id`; subscribers whose receiver
    /// was dropped are pruned. Returns the number of deliveries.
    pub fn publish(&mut self, id: &TerminalId, event: WindowEvent) -> usize {
        let Some(senders) = self.subscribers.get_mut(id) else {
            return 0;
        };
        senders.retain(|tx| tx.send(event.clone()).is_ok());
        let delivered = senders.len();
        if senders.is_empty() {
            self.subscribers.remove(id);
        }
        delivered
    }

    /// Sends `Closed` and forgets every subscriber of `id`.
    pub fn remove(&mut self, id: &TerminalId) {
        if let Some(senders) = self.subscribers.remove(id) {
            for tx in senders {
                let _ = tx.send(WindowEvent::Closed);
            }
        }
    }

    pub fn subscriber_count(&self, id: &TerminalId) -> usize {
        self.subscribers.get(id).map_or(0, Vec::len)
    }
}
