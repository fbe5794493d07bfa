//! Event model (spec.md §3 "Event").
//!
//! Five built-in event families exist, plus user-defined events. Equality for
//! dispatch purposes is by type-name ([`EventTag`]) only; payload is carried for
//! canonical identity of worlds but never consulted when matching a handler table
//! entry (DESIGN NOTES §9's "tagged sum" recommendation).

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::describe::FieldDetail;
use crate::machine::{MachineId, StateId};

/// The concrete event carried on a queue. Distinguishes the five built-in families
/// from user events, which carry a stable type-tag string assigned at registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Entry,
    Exit,
    TransitionTo(StateId),
    Halt,
    User(String),
}

impl EventKind {
    /// The type-name used for handler-table lookup (matching ignores payload and,
    /// for `TransitionTo`, ignores the target state too — an `on_transition` handler
    /// is registered once per *current* state, not once per target).
    pub fn tag(&self) -> EventTag {
        match self {
            EventKind::Entry => EventTag::Entry,
            EventKind::Exit => EventTag::Exit,
            EventKind::TransitionTo(_) => EventTag::Transition,
            EventKind::Halt => EventTag::Halt,
            EventKind::User(name) => EventTag::User(name.clone()),
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            EventKind::Entry => "entry",
            EventKind::Exit => "exit",
            EventKind::TransitionTo(_) => "transition_to",
            EventKind::Halt => "halt",
            EventKind::User(name) => name,
        }
    }
}

/// Handler-table key: the event family an `on_*` registration matches against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventTag {
    Entry,
    Exit,
    Transition,
    Halt,
    User(String),
}

/// Type-erased, describable event payload. Implemented by any user type that is
/// also [`crate::describe::Describe`] + `Clone`; see [`payload`] for the
/// constructor most callers reach for.
pub trait EventPayload: Send + Sync {
    fn describe(&self) -> Vec<FieldDetail>;
    fn as_any(&self) -> &dyn Any;
    fn clone_payload(&self) -> Arc<dyn EventPayload>;
}

struct TypedPayload<T>(T);

impl<T> EventPayload for TypedPayload<T>
where
    T: crate::describe::Describe + Clone + Send + Sync + 'static,
{
    fn describe(&self) -> Vec<FieldDetail> {
        self.0.describe()
    }

    fn as_any(&self) -> &dyn Any {
        &self.0
    }

    fn clone_payload(&self) -> Arc<dyn EventPayload> {
        Arc::new(TypedPayload(self.0.clone()))
    }
}

/// Wraps a typed, describable value as an [`EventPayload`] for attachment to an
/// [`EventRecord`].
pub fn payload<T>(value: T) -> Arc<dyn EventPayload>
where
    T: crate::describe::Describe + Clone + Send + Sync + 'static,
{
    Arc::new(TypedPayload(value))
}

/// An event sitting on a machine's queue, or just dispatched.
///
/// `sender`/`recipient` are routing references (spec.md §3); they participate in
/// canonical identity like any other non-pointer field.
#[derive(Clone)]
pub struct EventRecord {
    pub kind: EventKind,
    pub sender: Option<MachineId>,
    pub recipient: Option<MachineId>,
    pub payload: Option<Arc<dyn EventPayload>>,
}

impl fmt::Debug for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRecord")
            .field("kind", &self.kind)
            .field("sender", &self.sender)
            .field("recipient", &self.recipient)
            .finish()
    }
}

impl EventRecord {
    fn bare(kind: EventKind) -> Self {
        Self {
            kind,
            sender: None,
            recipient: None,
            payload: None,
        }
    }

    pub fn entry() -> Self {
        Self::bare(EventKind::Entry)
    }

    pub fn exit() -> Self {
        Self::bare(EventKind::Exit)
    }

    pub fn transition_to(state: StateId) -> Self {
        Self::bare(EventKind::TransitionTo(state))
    }

    pub fn halt() -> Self {
        Self::bare(EventKind::Halt)
    }

    /// Constructs a user event. `recipient`/`sender` default to unset; callers that
    /// need routing metadata set the fields directly before enqueueing.
    pub fn user(tag: impl Into<String>, body: Option<Arc<dyn EventPayload>>) -> Self {
        Self {
            kind: EventKind::User(tag.into()),
            sender: None,
            recipient: None,
            payload: body,
        }
    }

    /// Field descriptors used by canonical id computation and pretty-printing.
    /// Includes routing metadata and, for `TransitionTo`, the target state — all of
    /// which matter for world identity even though they are irrelevant to handler
    /// matching (spec.md §3 "Event").
    pub fn details(&self) -> Vec<FieldDetail> {
        let mut out = Vec::new();
        if let EventKind::TransitionTo(target) = &self.kind {
            out.push(FieldDetail::new("target_state", "StateId", target.as_str()));
        }
        if let Some(sender) = &self.sender {
            out.push(FieldDetail::new("sender", "MachineId", sender.as_str()));
        }
        if let Some(recipient) = &self.recipient {
            out.push(FieldDetail::new("recipient", "MachineId", recipient.as_str()));
        }
        if let Some(payload) = &self.payload {
            out.extend(payload.describe());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_to_tag_ignores_target_state() {
        let a = EventKind::TransitionTo(StateId::new("A"));
        let b = EventKind::TransitionTo(StateId::new("B"));
        assert_eq!(a.tag(), b.tag());
        assert_ne!(a, b);
    }

    #[test]
    fn entry_has_no_details_without_routing() {
        assert!(EventRecord::entry().details().is_empty());
    }
}
