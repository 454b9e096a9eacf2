//! Global z-order and single focus owner.

use std::collections::BTreeMap;

use crate::bridge::TerminalId;

#[derive(Debug, Default)]
pub struct FocusDirector {
    z: BTreeMap<TerminalId, u64>,
    max_z: u64,
    owner: Option<TerminalId>,
}

impl FocusDirector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a window above everything else without giving it focus.
    pub fn insert(&mut self, id: TerminalId) -> u64 {
        self.max_z += 1;
        self.z.insert(id, self.max_z);
        self.max_z
    }

    /// Raises `id` to `max + 1` and makes it the sole focus owner. Returns the
    /// new z-index, or `None` for an unknown window.
    pub fn focus(&mut self, id: &TerminalId) -> Option<u64> {
        let slot = self.z.get_mut(id)?;
        self.max_z += 1;
        *slot = self.max_z;
        self.owner = Some(id.clone());
        tracing::trace!(terminal_id = %id, z = self.max_z, "focused");
        Some(self.max_z)
    }

    pub fn blur(&mut self) {
        self.owner = None;
    }

    pub fn remove(&mut self, id: &TerminalId) {
        self.z.remove(id);
        if self.owner.as_ref() == Some(id) {
            self.owner = None;
        }
    }

    pub fn owner(&self) -> Option<&TerminalId> {
        self.owner.as_ref()
    }

    pub fn is_focused(&self, id: &TerminalId) -> bool {
        self.owner.as_ref() == Some(id)
    }

    pub fn z_index(&self, id: &TerminalId) -> Option<u64> {
        self.z.get(id).copied()
    }

    pub fn max_z(&self) -> u64 {
        self.max_z
    }

    /// Window ids from bottom to top.
    pub fn stacking_order(&self) -> Vec<TerminalId> {
        let mut ids: Vec<(&TerminalId, &u64)> = self.z.iter().collect();
        ids.sort_by_key(|(_, z)| **z);
        ids.into_iter().map(|(id, _)| id.clone()).collect()
    }

    /// Focuses the next (or previous) window in stacking order relative to
    /// the current owner.
    pub fn cycle(&mut self, forward: bool) -> Option<TerminalId> {
        let mut order = self.stacking_order();
        if order.is_empty() {
            return None;
        }
        // Stable order by id so cycling does not depend on the z it changes.
        order.sort();
        let idx = self
            .owner
            .as_ref()
            .and_then(|owner| order.iter().position(|id| id == owner));
        let next = match idx {
            Some(i) => {
                let step = if forward { 1isize } else { -1isize };
                ((i as isize + step).rem_euclid(order.len() as isize)) as usize
            }
            None => 0,
        };
        let id = order[next].clone();
        self.focus(&id);
        Some(id)
    }
}
