//! The three arbitration slots
//!
//! At most one incoming candidate, one outgoing candidate and one current
//! session. A session id never occupies more than one slot.

use serde::Serialize;

use crate::session::{SessionId, SessionRole};

/// Slot a session can occupy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    IncomingCandidate,
    OutgoingCandidate,
    Current,
}

impl Slot {
    pub fn candidate(role: SessionRole) -> Self {
        match role {
            SessionRole::Incoming => Slot::IncomingCandidate,
            SessionRole::Outgoing => Slot::OutgoingCandidate,
        }
    }
}

/// Why a candidate could not be placed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceError {
    /// Another session already waits in the candidate slot for this role
    Occupied(SessionId),
    /// The session already sits in some slot
    Duplicate(Slot),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArbiterSlots {
    incoming_candidate: Option<SessionId>,
    outgoing_candidate: Option<SessionId>,
    current: Option<SessionId>,
}

impl ArbiterSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn candidate(&self, role: SessionRole) -> Option<&SessionId> {
        match role {
            SessionRole::Incoming => self.incoming_candidate.as_ref(),
            SessionRole::Outgoing => self.outgoing_candidate.as_ref(),
        }
    }

    pub fn current(&self) -> Option<&SessionId> {
        self.current.as_ref()
    }

    pub fn get(&self, slot: Slot) -> Option<&SessionId> {
        match slot {
            Slot::IncomingCandidate => self.incoming_candidate.as_ref(),
            Slot::OutgoingCandidate => self.outgoing_candidate.as_ref(),
            Slot::Current => self.current.as_ref(),
        }
    }

    /// Slot holding `id`, if any
    pub fn slot_of(&self, id: &SessionId) -> Option<Slot> {
        [Slot::Current, Slot::IncomingCandidate, Slot::OutgoingCandidate]
            .into_iter()
            .find(|slot| self.get(*slot) == Some(id))
    }

    pub fn place_candidate(&mut self, role: SessionRole, id: SessionId) -> Result<(), PlaceError> {
        if let Some(slot) = self.slot_of(&id) {
            return Err(PlaceError::Duplicate(slot));
        }

        let slot = self.slot_mut(Slot::candidate(role));
        if let Some(existing) = slot {
            return Err(PlaceError::Occupied(existing.clone()));
        }
        *slot = Some(id);
        Ok(())
    }

    /// Move the `role` candidate into `current`.
    ///
    /// Does nothing and returns `None` when `current` is occupied or the
    /// candidate slot is empty.
    pub fn promote(&mut self, role: SessionRole) -> Option<SessionId> {
        if self.current.is_some() {
            return None;
        }
        let promoted = self.slot_mut(Slot::candidate(role)).take()?;
        self.current = Some(promoted.clone());
        Some(promoted)
    }

    /// Remove `id` from whichever slot holds it. Idempotent.
    pub fn evict(&mut self, id: &SessionId) -> Option<Slot> {
        let slot = self.slot_of(id)?;
        *self.slot_mut(slot) = None;
        Some(slot)
    }

    pub fn take_current(&mut self) -> Option<SessionId> {
        self.current.take()
    }

    /// No session id appears twice
    pub fn is_consistent(&self) -> bool {
        let ids: Vec<&SessionId> = [&self.incoming_candidate, &self.outgoing_candidate, &self.current]
            .into_iter()
            .flatten()
            .collect();
        ids.iter()
            .enumerate()
            .all(|(i, a)| ids[i + 1..].iter().all(|b| a != b))
    }

    pub fn is_empty(&self) -> bool {
        self.incoming_candidate.is_none() && self.outgoing_candidate.is_none() && self.current.is_none()
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Option<SessionId> {
        match slot {
            Slot::IncomingCandidate => &mut self.incoming_candidate,
            Slot::OutgoingCandidate => &mut self.outgoing_candidate,
            Slot::Current => &mut self.current,
        }
    }
}
