//! Debounced grid-size negotiation with the remote PTY.
//!
//! Every fit produces a candidate grid. Candidates that match the last size
//! actually sent are ignored; anything else (re)arms a per-window debounce and
//! only the last candidate of a burst is ever sent.

use std::time::Instant;

use crate::bridge::{Delivery, OutboundMessage, SessionBridge, TerminalId, deliver};
use crate::constants::{REPAINT_BYTE, REPAINT_DELAY};
use crate::grid::GridSize;
use crate::program::ProgramKind;
use crate::timer::Deadline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// Same as the last negotiated grid; nothing will be sent.
    Unchanged,
    Scheduled { at: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollOutcome {
    pub negotiated: Option<(GridSize, Delivery)>,
    pub repaint: Option<Delivery>,
}

impl PollOutcome {
    pub fn is_empty(&self) -> bool {
        self.negotiated.is_none() && self.repaint.is_none()
    }
}

#[derive(Debug, Default)]
pub struct ResizeNegotiator {
    last_negotiated: Option<GridSize>,
    pending: Option<GridSize>,
    emit: Deadline,
    repaint: Deadline,
}

impl ResizeNegotiator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_negotiated(&self) -> Option<GridSize> {
        self.last_negotiated
    }

    pub fn pending(&self) -> Option<GridSize> {
        self.pending
    }

    pub fn offer(&mut self, candidate: GridSize, program: ProgramKind, now: Instant) -> Offer {
        if self.last_negotiated == Some(candidate) {
            // A burst that ends where it started must not send its middle.
            self.pending = None;
            self.emit.cancel();
            return Offer::Unchanged;
        }
        self.pending = Some(candidate);
        self.emit.schedule(now, program.resize_debounce());
        self.repaint.cancel();
        Offer::Scheduled {
            at: self.emit.at().unwrap_or(now),
        }
    }

    /// Services due deadlines. `program` is read at fire time so a window that
    /// switched into a full-screen program mid-debounce still gets a repaint.
    pub fn poll<B: SessionBridge + ?Sized>(
        &mut self,
        terminal_id: &TerminalId,
        program: ProgramKind,
        now: Instant,
        bridge: &mut B,
    ) -> PollOutcome {
        let mut outcome = PollOutcome::default();
        if self.emit.fire(now)
            && let Some(grid) = self.pending.take()
        {
            let delivery = deliver(
                &mut *bridge,
                OutboundMessage::Resize {
                    terminal_id: terminal_id.clone(),
                    cols: grid.cols,
                    rows: grid.rows,
                },
            );
            if delivery == Delivery::Sent {
                self.last_negotiated = Some(grid);
                tracing::debug!(terminal_id = %terminal_id, grid = %grid, "negotiated grid");
                if program.needs_repaint() {
                    self.repaint.schedule(now, REPAINT_DELAY);
                }
            }
            outcome.negotiated = Some((grid, delivery));
        }
        if self.repaint.fire(now) {
            outcome.repaint = Some(deliver(
                &mut *bridge,
                OutboundMessage::Command {
                    terminal_id: terminal_id.clone(),
                    command: REPAINT_BYTE.to_string(),
                },
            ));
        }
        outcome
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.emit.at(), self.repaint.at()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Drops every scheduled emission. Used on dispose and on detach.
    pub fn cancel(&mut self) {
        self.pending = None;
        self.emit.cancel();
        self.repaint.cancel();
    }

    /// Records `grid` as already known to the remote side, e.g. because it
    /// went out with the spawn request.
    pub fn assume(&mut self, grid: GridSize) {
        self.last_negotiated = Some(grid);
    }

    /// Forgets what the remote side was told, so the next fit is sent even if
    /// it matches. Needed after the window is bound to a (new) session.
    pub fn forget(&mut self) {
        self.cancel();
        self.last_negotiated = None;
    }
}
