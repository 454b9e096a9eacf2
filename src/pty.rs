//! Local session manager: one `portable-pty` child per terminal id, spoken to
//! through the same message contract as a remote session manager.
//!
//! Each PTY has a reader thread that appends to a shared buffer; the UI thread
//! drains the buffers in [`LocalPtyBridge::poll_inbound`] and turns them into
//! inbound messages.

use std::collections::{BTreeMap, VecDeque};
use std::ffi::OsString;
use std::io::{Read, Write};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::thread::{self, JoinHandle};

use portable_pty::{Child, CommandBuilder, MasterPty, PtySize, native_pty_system};

use crate::bridge::{
    BridgeError, InboundMessage, OutboundMessage, SessionBridge, SessionIo, TerminalId,
};
use crate::constants::DETACHED_OUTPUT_LIMIT;

struct PtySession {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    pending: Arc<Mutex<Vec<u8>>>,
    bytes_received: Arc<AtomicUsize>,
    child: Box<dyn Child + Send + Sync>,
    /// Undecoded bytes of a UTF-8 sequence split across reads.
    carry: Vec<u8>,
    detached: bool,
    _reader: JoinHandle<()>,
}

impl PtySession {
    fn open(argv: &[String], size: PtySize) -> Result<Self, BridgeError> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(size)
            .map_err(|err| pty_err("openpty", err))?;
        let child = pair
            .slave
            .spawn_command(command_for(argv))
            .map_err(|err| pty_err("spawn_command", err))?;
        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|err| pty_err("try_clone_reader", err))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|err| pty_err("take_writer", err))?;
        let pending = Arc::new(Mutex::new(Vec::new()));
        let bytes_received = Arc::new(AtomicUsize::new(0));
        let reader_pending = Arc::clone(&pending);
        let reader_bytes = Arc::clone(&bytes_received);
        let reader_handle = thread::spawn(move || read_loop(reader, reader_pending, reader_bytes));
        Ok(Self {
            master: pair.master,
            writer,
            pending,
            bytes_received,
            child,
            carry: Vec::new(),
            detached: false,
            _reader: reader_handle,
        })
    }

    fn write_bytes(&mut self, input: &[u8]) -> std::io::Result<()> {
        self.writer.write_all(input)?;
        self.writer.flush()
    }

    fn drain(&mut self) -> Option<String> {
        let bytes = {
            let mut pending = self.pending.lock().unwrap_or_else(|err| err.into_inner());
            if pending.is_empty() {
                return None;
            }
            pending.split_off(0)
        };
        self.carry.extend_from_slice(&bytes);
        let text = decode_utf8_prefix(&mut self.carry);
        (!text.is_empty()).then_some(text)
    }

    /// Keeps only the newest output of a session nobody is watching.
    fn cap_pending(&mut self, limit: usize) -> usize {
        let mut pending = self.pending.lock().unwrap_or_else(|err| err.into_inner());
        drop_oldest(&mut pending, limit)
    }

    fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }
}

pub struct LocalPtyBridge {
    sessions: BTreeMap<TerminalId, PtySession>,
    shell: Vec<String>,
    inbound: VecDeque<InboundMessage>,
}

impl LocalPtyBridge {
    /// `shell` is the argv used for `spawn` messages that carry no command.
    pub fn new(shell: Vec<String>) -> Self {
        Self {
            sessions: BTreeMap::new(),
            shell,
            inbound: VecDeque::new(),
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn bytes_received(&self, id: &TerminalId) -> usize {
        self.sessions
            .get(id)
            .map_or(0, |s| s.bytes_received.load(Ordering::Relaxed))
    }

    fn session_mut(&mut self, id: &TerminalId) -> Result<&mut PtySession, BridgeError> {
        self.sessions
            .get_mut(id)
            .ok_or_else(|| BridgeError::UnknownSession(id.clone()))
    }

    fn spawn(
        &mut self,
        id: TerminalId,
        cols: u16,
        rows: u16,
        command: Option<String>,
    ) -> Result<(), BridgeError> {
        let argv = match command {
            Some(line) => shell_words::split(&line).map_err(|err| pty_err("parse command", err))?,
            None => self.shell.clone(),
        };
        if argv.is_empty() {
            return Err(pty_err("spawn_command", "empty command line"));
        }
        let session = PtySession::open(&argv, pty_size(cols, rows))?;
        tracing::info!(terminal_id = %id, program = %argv[0], cols, rows, "pty spawned");
        if let Some(mut old) = self.sessions.insert(id.clone(), session) {
            let _ = old.child.kill();
        }
        self.inbound.push_back(InboundMessage::Spawned {
            terminal_id: id.clone(),
        });
        self.inbound.push_back(InboundMessage::Process {
            terminal_id: id,
            name: argv[0].clone(),
        });
        Ok(())
    }
}

impl SessionIo for LocalPtyBridge {
    /// Keyboard and mouse-report bytes from the emulator.
    fn write_input(&mut self, id: &TerminalId, input: &[u8]) -> Result<(), BridgeError> {
        let session = self.session_mut(id)?;
        session.write_bytes(input)?;
        Ok(())
    }

    /// Drains PTY output and exit notifications. Detached sessions keep
    /// buffering, up to a bounded backlog, until they are attached again.
    fn poll_inbound(&mut self) -> Vec<InboundMessage> {
        let mut out: Vec<InboundMessage> = self.inbound.drain(..).collect();
        let mut exited = Vec::new();
        for (id, session) in &mut self.sessions {
            if session.detached {
                let dropped = session.cap_pending(DETACHED_OUTPUT_LIMIT);
                if dropped > 0 {
                    tracing::debug!(terminal_id = %id, dropped, "detached backlog trimmed");
                }
            } else if let Some(data) = session.drain() {
                out.push(InboundMessage::Output {
                    terminal_id: id.clone(),
                    data,
                });
            }
            if session.has_exited() {
                exited.push(id.clone());
            }
        }
        for id in exited {
            self.sessions.remove(&id);
            tracing::info!(terminal_id = %id, "pty child exited");
            out.push(InboundMessage::Exited { terminal_id: id });
        }
        out
    }
}

impl SessionBridge for LocalPtyBridge {
    fn is_ready(&self) -> bool {
        true
    }

    fn send(&mut self, message: OutboundMessage) -> Result<(), BridgeError> {
        match message {
            OutboundMessage::Spawn {
                terminal_id,
                cols,
                rows,
                command,
            } => self.spawn(terminal_id, cols, rows, command),
            OutboundMessage::Resize {
                terminal_id,
                cols,
                rows,
            } => {
                if cols == 0 || rows == 0 {
                    return Ok(());
                }
                self.session_mut(&terminal_id)?
                    .master
                    .resize(pty_size(cols, rows))
                    .map_err(|err| pty_err("resize", err))
            }
            OutboundMessage::Command {
                terminal_id,
                command,
            } => self.write_input(&terminal_id, command.as_bytes()),
            OutboundMessage::Detach { terminal_id } => {
                self.session_mut(&terminal_id)?.detached = true;
                Ok(())
            }
            OutboundMessage::Attach { terminal_id } => {
                self.session_mut(&terminal_id)?.detached = false;
                self.inbound.push_back(InboundMessage::Spawned { terminal_id });
                Ok(())
            }
            OutboundMessage::Close { terminal_id } => {
                if let Some(mut session) = self.sessions.remove(&terminal_id) {
                    let _ = session.child.kill();
                }
                Ok(())
            }
        }
    }
}

impl Drop for LocalPtyBridge {
    fn drop(&mut self) {
        for session in self.sessions.values_mut() {
            let _ = session.child.kill();
        }
    }
}

fn pty_size(cols: u16, rows: u16) -> PtySize {
    PtySize {
        rows,
        cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

fn command_for(argv: &[String]) -> CommandBuilder {
    let mut cmd = CommandBuilder::from_argv(argv.iter().map(OsString::from).collect());
    if let Ok(cwd) = std::env::current_dir() {
        cmd.cwd(cwd);
    }
    cmd
}

#[cfg(unix)]
pub fn default_shell() -> String {
    std::env::var("SHELL").unwrap_or_else(|_| "bash".to_string())
}

#[cfg(windows)]
pub fn default_shell() -> String {
    std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
}

fn read_loop(
    mut reader: Box<dyn Read + Send>,
    pending: Arc<Mutex<Vec<u8>>>,
    bytes_received: Arc<AtomicUsize>,
) {
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                bytes_received.fetch_add(n, Ordering::Relaxed);
                if let Ok(mut pending) = pending.lock() {
                    pending.extend_from_slice(&buf[..n]);
                }
            }
            Err(_) => break,
        }
    }
}

/// Drops bytes from the front until at most `limit` remain, then skips any
/// UTF-8 continuation bytes left dangling at the new start. Returns how many
/// bytes were removed.
fn drop_oldest(bytes: &mut Vec<u8>, limit: usize) -> usize {
    let mut cut = bytes.len().saturating_sub(limit);
    if cut == 0 {
        return 0;
    }
    while bytes.get(cut).is_some_and(|b| b & 0xC0 == 0x80) {
        cut += 1;
    }
    bytes.drain(..cut);
    cut
}

/// Decodes as much of `bytes` as forms complete UTF-8 and leaves a trailing
/// incomplete sequence in place. Invalid bytes become U+FFFD.
fn decode_utf8_prefix(bytes: &mut Vec<u8>) -> String {
    let mut out = String::new();
    let mut rest: &[u8] = bytes;
    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                out.push_str(valid);
                rest = &[];
                break;
            }
            Err(err) => {
                let (valid, after) = rest.split_at(err.valid_up_to());
                out.push_str(&String::from_utf8_lossy(valid));
                match err.error_len() {
                    Some(len) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        rest = &after[len..];
                    }
                    None => {
                        rest = after;
                        break;
                    }
                }
            }
        }
    }
    let keep = rest.len();
    let start = bytes.len() - keep;
    bytes.drain(..start);
    out
}

fn pty_err<E: std::fmt::Display>(stage: &'static str, err: E) -> BridgeError {
    BridgeError::Pty {
        stage,
        message: err.to_string(),
    }
}
