//! Machine model (spec.md §3 "Machine") and the type-erasure boundary that lets an
//! [`crate::store::Environment`] hold many distinct user machine types side by side.
//!
//! A machine's typed payload and compiled handler table are only known at the
//! [`crate::spec::Spec<T>`] / [`crate::spec::Instance<T>`] layer. Once an instance is
//! placed into a world, the rest of the engine (store, dispatch, explorer, condition
//! evaluator) only ever sees [`Box<dyn MachineObject>`] — the same "erase at the
//! boundary, recover via downcast where the user actually needs the type back" shape
//! as `event.rs`'s `Arc<dyn EventPayload>`/`TypedPayload<T>` pair.

use std::any::Any;
use std::fmt;

use crate::ctx::Ctx;
use crate::describe::FieldDetail;
use crate::error::HandlerError;
use crate::event::{EventRecord, EventTag};

/// A user-defined state, identified for equality purposes by its printed details
/// string (spec.md §3 "State"). Two states are "the same state" iff their detail
/// strings are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(String);

impl StateId {
    pub fn new(details: impl Into<String>) -> Self {
        Self(details.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StateId {
    fn from(s: &str) -> Self {
        StateId::new(s)
    }
}

/// A machine's stable textual identity, assigned by initial-world construction:
/// the type name, or `TypeName_k` for the k-th duplicate of a type (spec.md §4.3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MachineId(String);

impl MachineId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The object-safe surface every compiled machine instance exposes to the engine,
/// regardless of its payload type. Dispatch (`dispatch.rs`) and the canonical-id
/// computation (`store.rs`) operate entirely through this trait; only the condition
/// evaluator (`condition.rs`) ever downcasts back to a concrete payload type, and
/// only because user predicates are themselves typed.
pub trait MachineObject: Send + Sync {
    fn id(&self) -> &MachineId;
    fn type_name(&self) -> &str;
    fn current_state(&self) -> &StateId;
    fn halted(&self) -> bool;

    /// Non-pointer field descriptors of the machine's payload (spec.md §4.1's
    /// "machine-details").
    fn details(&self) -> Vec<FieldDetail>;

    fn clone_machine(&self) -> Box<dyn MachineObject>;

    /// The machine's payload, for typed condition predicates (`condition.rs`).
    fn as_any(&self) -> &dyn Any;

    /// How many handlers are registered for `(current_state, tag)`. Built-in
    /// `TransitionTo`/`Halt` events with zero registered handlers still have an
    /// implicit default (spec.md §4.2); that default is applied by
    /// [`MachineObject::apply_builtin_default`], not counted here.
    fn handler_count(&self, tag: &EventTag) -> usize;

    /// Runs the `index`-th registered handler for `(current_state, event.tag())`
    /// against this machine, inside `ctx`. Panics if `index` is out of range for the
    /// current state/tag — a programmer error, since callers always consult
    /// [`MachineObject::handler_count`] first.
    fn run_handler_at(
        &mut self,
        index: usize,
        ctx: &mut Ctx<'_>,
        event: &EventRecord,
    ) -> Result<(), HandlerError>;

    /// Applies the mandatory built-in mutation for `TransitionTo`/`Halt` (set state,
    /// set halted) — runs unconditionally after any registered handlers for those
    /// two families, per spec.md §4.2's "default handler ... performs the update".
    fn apply_builtin_default(&mut self, event: &EventRecord);
}
