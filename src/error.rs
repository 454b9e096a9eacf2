use thiserror::Error;

use crate::bridge::{BridgeError, TerminalId};
use crate::window::TransitionError;

#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("no window with id {0}")]
    UnknownWindow(TerminalId),
    #[error("window {0} already exists")]
    DuplicateWindow(TerminalId),
    #[error("window {0} has no live session")]
    Offline(TerminalId),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

pub type Result<T, E = CanvasError> = std::result::Result<T, E>;
