use crate::data::{Event, EventId};

/// A change to the event collection that the server has already confirmed.
/// Commits are the only way the mirrored event list is modified after a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Commit {
    /// A newly created event. Appended, unless the ID is already mirrored (for
    /// instance because a reload picked it up first), in which case the
    /// existing record is replaced in place.
    Created(Event),
    /// A replaced event. Only applies if the ID is still mirrored.
    Updated(Event),
    /// A deleted event. Removing an ID that is not mirrored is a no-op.
    Removed(EventId),
    /// A freshly downloaded event. Replaces in place or appends.
    Fetched(Event),
}

impl Commit {
    pub fn event_id(&self) -> EventId {
        match self {
            Commit::Created(event) | Commit::Updated(event) | Commit::Fetched(event) => event.id,
            Commit::Removed(id) => *id,
        }
    }

    /// Applies the commit to the list, preserving the order of every other
    /// record. Returns whether the list changed.
    pub fn apply(self, events: &mut Vec<Event>) -> bool {
        let position = events.iter().position(|event| event.id == self.event_id());
        match (self, position) {
            (Commit::Created(event) | Commit::Updated(event) | Commit::Fetched(event), Some(i)) => {
                events[i] = event;
                true
            }
            (Commit::Created(event) | Commit::Fetched(event), None) => {
                events.push(event);
                true
            }
            (Commit::Updated(_), None) => false,
            (Commit::Removed(_), Some(i)) => {
                events.remove(i);
                true
            }
            (Commit::Removed(_), None) => false,
        }
    }
}
