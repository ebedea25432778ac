//! Typed signal channel owned by the engine.
//!
//! Collaborators (notifications, UI) register with `subscribe` and receive
//! every signal emitted after registration, in emission order. Delivery is
//! fire-and-forget: a dropped receiver is simply unregistered.

use crate::progression::Form;
use crate::state::StatKind;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", content = "value", rename_all = "snake_case")]
pub enum Signal {
    LevelUp(u32),
    Evolution(Form),
    RunFinished,
    LowResourceWarning(StatKind),
    Death,
}

#[derive(Debug, Default)]
pub struct SignalBus {
    subscribers: Vec<mpsc::UnboundedSender<Signal>>,
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Signal> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn emit(&mut self, signal: Signal) {
        tracing::debug!(?signal, "emit");
        self.subscribers.retain(|tx| tx.send(signal).is_ok());
    }

    pub fn emit_all<I: IntoIterator<Item = Signal>>(&mut self, signals: I) {
        for signal in signals {
            self.emit(signal);
        }
    }
}

/// Drain everything currently queued on a receiver.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Signal>) -> Vec<Signal> {
    let mut out = Vec::new();
    while let Ok(signal) = rx.try_recv() {
        out.push(signal);
    }
    out
}
