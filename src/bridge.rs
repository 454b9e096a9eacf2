//! Message contract with the session manager that owns the PTYs.
//!
//! The channel is fire-and-forget: a message that cannot be sent because the
//! transport is down is dropped, never queued. Callers that care about the
//! outcome look at the returned [`Delivery`].

use std::fmt;
use std::io::Write;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TerminalId(String);

impl TerminalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TerminalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TerminalId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Handle to a live remote session. The session itself is owned by the
/// session manager; holding one only means "this window is bound".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRef {
    terminal_id: TerminalId,
}

impl SessionRef {
    pub fn new(terminal_id: TerminalId) -> Self {
        Self { terminal_id }
    }

    pub fn terminal_id(&self) -> &TerminalId {
        &self.terminal_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OutboundMessage {
    Resize {
        terminal_id: TerminalId,
        cols: u16,
        rows: u16,
    },
    Command {
        terminal_id: TerminalId,
        command: String,
    },
    Detach {
        terminal_id: TerminalId,
    },
    Close {
        terminal_id: TerminalId,
    },
    Spawn {
        terminal_id: TerminalId,
        cols: u16,
        rows: u16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        command: Option<String>,
    },
    Attach {
        terminal_id: TerminalId,
    },
}

impl OutboundMessage {
    pub fn terminal_id(&self) -> &TerminalId {
        match self {
            Self::Resize { terminal_id, .. }
            | Self::Command { terminal_id, .. }
            | Self::Detach { terminal_id }
            | Self::Close { terminal_id }
            | Self::Spawn { terminal_id, .. }
            | Self::Attach { terminal_id } => terminal_id,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Resize { .. } => "resize",
            Self::Command { .. } => "command",
            Self::Detach { .. } => "detach",
            Self::Close { .. } => "close",
            Self::Spawn { .. } => "spawn",
            Self::Attach { .. } => "attach",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum InboundMessage {
    Output { terminal_id: TerminalId, data: String },
    Spawned { terminal_id: TerminalId },
    Exited { terminal_id: TerminalId },
    Process { terminal_id: TerminalId, name: String },
}

impl InboundMessage {
    pub fn terminal_id(&self) -> &TerminalId {
        match self {
            Self::Output { terminal_id, .. }
            | Self::Spawned { terminal_id }
            | Self::Exited { terminal_id }
            | Self::Process { terminal_id, .. } => terminal_id,
        }
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("transport is not open")]
    NotReady,
    #[error("transport write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed message: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("no session for terminal {0}")]
    UnknownSession(TerminalId),
    #[error("pty {stage} failed: {message}")]
    Pty {
        stage: &'static str,
        message: String,
    },
}

/// The peer that owns remote sessions.
pub trait SessionBridge {
    fn is_ready(&self) -> bool;
    fn send(&mut self, message: OutboundMessage) -> Result<(), BridgeError>;
}

impl<T: SessionBridge + ?Sized> SessionBridge for &mut T {
    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn send(&mut self, message: OutboundMessage) -> Result<(), BridgeError> {
        (**self).send(message)
    }
}

/// A bridge that also carries terminal traffic: typed input goes out,
/// output and lifecycle notifications come back.
pub trait SessionIo: SessionBridge {
    fn write_input(&mut self, id: &TerminalId, input: &[u8]) -> Result<(), BridgeError>;
    fn poll_inbound(&mut self) -> Vec<InboundMessage>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Dropped,
}

/// Sends if the transport is open, drops otherwise. Failures are logged and
/// reported as [`Delivery::Dropped`]; nothing is retried.
pub fn deliver<B: SessionBridge + ?Sized>(bridge: &mut B, message: OutboundMessage) -> Delivery {
    if !bridge.is_ready() {
        tracing::debug!(
            terminal_id = %message.terminal_id(),
            kind = message.kind(),
            "transport not ready, dropping message"
        );
        return Delivery::Dropped;
    }
    let terminal_id = message.terminal_id().clone();
    let kind = message.kind();
    match bridge.send(message) {
        Ok(()) => Delivery::Sent,
        Err(err) => {
            tracing::warn!(terminal_id = %terminal_id, kind, error = %err, "dropping message");
            Delivery::Dropped
        }
    }
}

/// Newline-delimited JSON over any byte sink.
pub struct JsonLinesBridge<W: Write> {
    writer: W,
    ready: bool,
}

impl<W: Write> JsonLinesBridge<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            ready: true,
        }
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> SessionBridge for JsonLinesBridge<W> {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn send(&mut self, message: OutboundMessage) -> Result<(), BridgeError> {
        if !self.ready {
            return Err(BridgeError::NotReady);
        }
        let mut line = serde_json::to_vec(&message)?;
        line.push(b'\n');
        let result = self
            .writer
            .write_all(&line)
            .and_then(|()| self.writer.flush());
        if let Err(err) = result {
            // A broken pipe means the peer is gone; stop writing until reopened.
            self.ready = false;
            return Err(err.into());
        }
        Ok(())
    }
}

pub fn decode_inbound(line: &str) -> Result<InboundMessage, BridgeError> {
    Ok(serde_json::from_str(line.trim())?)
}

/// In-memory bridge that records what would have been sent and replays
/// queued inbound messages.
#[derive(Debug)]
pub struct MemoryBridge {
    sent: Vec<OutboundMessage>,
    ready: bool,
    input: Vec<(TerminalId, Vec<u8>)>,
    inbound: Vec<InboundMessage>,
}

impl Default for MemoryBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBridge {
    pub fn new() -> Self {
        Self {
            sent: Vec::new(),
            ready: true,
            input: Vec::new(),
            inbound: Vec::new(),
        }
    }

    /// Queues a message for the next `poll_inbound`.
    pub fn push_inbound(&mut self, message: InboundMessage) {
        self.inbound.push(message);
    }

    pub fn input(&self) -> &[(TerminalId, Vec<u8>)] {
        &self.input
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    pub fn sent(&self) -> &[OutboundMessage] {
        &self.sent
    }

    pub fn take_sent(&mut self) -> Vec<OutboundMessage> {
        std::mem::take(&mut self.sent)
    }

    pub fn resizes(&self) -> Vec<(TerminalId, u16, u16)> {
        self.sent
            .iter()
            .filter_map(|m| match m {
                OutboundMessage::Resize {
                    terminal_id,
                    cols,
                    rows,
                } => Some((terminal_id.clone(), *cols, *rows)),
                _ => None,
            })
            .collect()
    }
}

impl SessionBridge for MemoryBridge {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn send(&mut self, message: OutboundMessage) -> Result<(), BridgeError> {
        if !self.ready {
            return Err(BridgeError::NotReady);
        }
        self.sent.push(message);
        Ok(())
    }
}

impl SessionIo for MemoryBridge {
    fn write_input(&mut self, id: &TerminalId, input: &[u8]) -> Result<(), BridgeError> {
        self.input.push((id.clone(), input.to_vec()));
        Ok(())
    }

    fn poll_inbound(&mut self) -> Vec<InboundMessage> {
        std::mem::take(&mut self.inbound)
    }
}
