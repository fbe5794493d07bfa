//! Spec / instance protocol (C6, spec.md §4.6 and §6 "Builder API").
//!
//! A [`Spec<T>`] is a declarative description of one machine type: its prototype
//! payload, declared states, initial state, and a handler-builder table. Calling
//! [`Spec::new_instance`] freezes the builder table and yields an [`Instance<T>`];
//! [`Instance<T>`] is only compiled into an engine-visible
//! [`crate::machine::MachineObject`] once the explorer assigns it a
//! [`crate::machine::MachineId`] (spec.md §4.3) — the deferred-binding step that
//! lets handler builders capture the id they'll be looked up under.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::ctx::Ctx;
use crate::describe::Describe;
use crate::error::{ConfigError, HandlerError};
use crate::event::{EventRecord, EventTag};
use crate::machine::{MachineId, MachineObject, StateId};

/// A compiled, per-instance handler: `(ctx, payload, event) -> Result<(), _>`. The
/// event is `None` only in contexts that never apply here (every dispatch in this
/// engine is event-driven); kept `Option` to mirror the builder signature spec.md
/// §4.6 documents (`(context, machine, [event]) -> ()`).
pub type HandlerFn<T> =
    Arc<dyn Fn(&mut Ctx<'_>, &mut T, Option<&EventRecord>) -> Result<(), HandlerError> + Send + Sync>;

/// A handler-builder: `machine-id -> handler`. The indirection matters because
/// handlers may need the id they'll run under (to address themselves in
/// `send_to`/`halt` independent of `Ctx::acting_machine`, or for logging); ids are
/// only known once an instance is placed into a model (spec.md §4.6).
pub type HandlerBuilder<T> = Arc<dyn Fn(MachineId) -> HandlerFn<T> + Send + Sync>;

fn builder_from_fn<T, F>(f: F) -> HandlerBuilder<T>
where
    T: 'static,
    F: Fn(&mut Ctx<'_>, &mut T, Option<&EventRecord>) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    let f: HandlerFn<T> = Arc::new(f);
    Arc::new(move |_id| f.clone())
}

/// Declarative description of a single machine type (spec.md §4.6).
pub struct Spec<T> {
    type_name: String,
    prototype: T,
    states: Vec<StateId>,
    initial_state: Option<StateId>,
    handlers: BTreeMap<(StateId, EventTag), Vec<HandlerBuilder<T>>>,
}

impl<T> Spec<T>
where
    T: Describe + Clone + Send + Sync + 'static,
{
    /// `new_spec(prototype)`. `type_name` should be a stable, human-readable name
    /// for this machine type (e.g. the Rust type's name) — it seeds the machine-id
    /// assignment in spec.md §4.3 (`TypeName`, `TypeName_1`, ...).
    pub fn new(type_name: impl Into<String>, prototype: T) -> Self {
        Self {
            type_name: type_name.into(),
            prototype,
            states: Vec::new(),
            initial_state: None,
            handlers: BTreeMap::new(),
        }
    }

    /// `Spec::define_states(s1, ...)`.
    pub fn define_states(mut self, states: impl IntoIterator<Item = impl Into<StateId>>) -> Self {
        self.states = states.into_iter().map(Into::into).collect();
        self
    }

    /// `Spec::set_initial_state(s)`.
    pub fn set_initial_state(mut self, state: impl Into<StateId>) -> Self {
        self.initial_state = Some(state.into());
        self
    }

    fn register(
        &mut self,
        state: impl Into<StateId>,
        tag: EventTag,
        builder: HandlerBuilder<T>,
    ) {
        self.handlers
            .entry((state.into(), tag))
            .or_default()
            .push(builder);
    }

    /// `on_entry(&spec, state, fn)`.
    pub fn on_entry<F>(mut self, state: impl Into<StateId>, f: F) -> Self
    where
        F: Fn(&mut Ctx<'_>, &mut T, Option<&EventRecord>) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register(state, EventTag::Entry, builder_from_fn(f));
        self
    }

    /// `on_exit(&spec, state, fn)`.
    pub fn on_exit<F>(mut self, state: impl Into<StateId>, f: F) -> Self
    where
        F: Fn(&mut Ctx<'_>, &mut T, Option<&EventRecord>) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register(state, EventTag::Exit, builder_from_fn(f));
        self
    }

    /// `on_transition(state, fn)` — runs before the mandatory state update that
    /// `transition-to` always applies (spec.md §4.2).
    pub fn on_transition<F>(mut self, state: impl Into<StateId>, f: F) -> Self
    where
        F: Fn(&mut Ctx<'_>, &mut T, Option<&EventRecord>) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register(state, EventTag::Transition, builder_from_fn(f));
        self
    }

    /// `on_halt(state, fn)` — runs before the mandatory `halted = true` update.
    pub fn on_halt<F>(mut self, state: impl Into<StateId>, f: F) -> Self
    where
        F: Fn(&mut Ctx<'_>, &mut T, Option<&EventRecord>) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register(state, EventTag::Halt, builder_from_fn(f));
        self
    }

    /// `on_event(state, event_tag, fn)`.
    pub fn on_event<F>(mut self, state: impl Into<StateId>, event_tag: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Ctx<'_>, &mut T, Option<&EventRecord>) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register(state, EventTag::User(event_tag.into()), builder_from_fn(f));
        self
    }

    /// `Spec::new_instance()`. Validates the initial state is among the declared
    /// states and produces a fresh, independent instance; may be called multiple
    /// times (spec.md §4.6).
    pub fn new_instance(&self) -> Result<Instance<T>, ConfigError> {
        if self.states.is_empty() {
            return Err(ConfigError::NoStatesDeclared(self.type_name.clone()));
        }
        let initial = self
            .initial_state
            .clone()
            .ok_or_else(|| ConfigError::InitialStateNotDeclared("<unset>".to_string()))?;
        if !self.states.contains(&initial) {
            return Err(ConfigError::InitialStateNotDeclared(initial.as_str().to_string()));
        }

        Ok(Instance {
            type_name: self.type_name.clone(),
            payload: self.prototype.clone(),
            state: initial,
            handlers: self.handlers.clone(),
        })
    }
}

/// A frozen instance of a machine type, not yet placed into a world. Builders are
/// immutable from this point on; only id assignment (at initial-world construction)
/// remains before this becomes a live [`MachineObject`].
pub struct Instance<T> {
    type_name: String,
    payload: T,
    state: StateId,
    handlers: BTreeMap<(StateId, EventTag), Vec<HandlerBuilder<T>>>,
}

/// Object-safe handle the explorer uses to assign an id and compile an
/// [`Instance<T>`] into an engine-visible [`MachineObject`], without knowing `T`.
pub trait UninstantiatedMachine: Send + Sync {
    fn type_name(&self) -> &str;
    fn compile(self: Box<Self>, id: MachineId) -> Box<dyn MachineObject>;
}

impl<T> UninstantiatedMachine for Instance<T>
where
    T: Describe + Send + Sync + 'static,
{
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn compile(self: Box<Self>, id: MachineId) -> Box<dyn MachineObject> {
        let mut by_state: BTreeMap<StateId, BTreeMap<EventTag, Vec<HandlerFn<T>>>> = BTreeMap::new();
        for ((state, tag), builders) in self.handlers {
            let compiled = builders.into_iter().map(|b| b(id.clone())).collect();
            by_state.entry(state).or_default().insert(tag, compiled);
        }

        Box::new(CompiledInstance {
            id,
            type_name: self.type_name,
            state: self.state,
            halted: false,
            payload: self.payload,
            handlers: Arc::new(by_state),
        })
    }
}

struct CompiledInstance<T> {
    id: MachineId,
    type_name: String,
    state: StateId,
    halted: bool,
    payload: T,
    handlers: Arc<BTreeMap<StateId, BTreeMap<EventTag, Vec<HandlerFn<T>>>>>,
}

impl<T> fmt::Debug for CompiledInstance<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledInstance")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("halted", &self.halted)
            .finish()
    }
}

impl<T> MachineObject for CompiledInstance<T>
where
    T: Describe + Clone + Send + Sync + 'static,
{
    fn id(&self) -> &MachineId {
        &self.id
    }

    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn current_state(&self) -> &StateId {
        &self.state
    }

    fn halted(&self) -> bool {
        self.halted
    }

    fn details(&self) -> Vec<crate::describe::FieldDetail> {
        self.payload.describe()
    }

    fn clone_machine(&self) -> Box<dyn MachineObject> {
        Box::new(CompiledInstance {
            id: self.id.clone(),
            type_name: self.type_name.clone(),
            state: self.state.clone(),
            halted: self.halted,
            payload: self.payload.clone(),
            handlers: self.handlers.clone(),
        })
    }

    fn as_any(&self) -> &dyn Any {
        &self.payload
    }

    fn handler_count(&self, tag: &EventTag) -> usize {
        self.handlers
            .get(&self.state)
            .and_then(|m| m.get(tag))
            .map(Vec::len)
            .unwrap_or(0)
    }

    fn run_handler_at(
        &mut self,
        index: usize,
        ctx: &mut Ctx<'_>,
        event: &EventRecord,
    ) -> Result<(), HandlerError> {
        let handler = self
            .handlers
            .get(&self.state)
            .and_then(|m| m.get(&event.kind.tag()))
            .and_then(|v| v.get(index))
            .unwrap_or_else(|| {
                panic!(
                    "run_handler_at: no handler at index {index} for state {:?} event {:?} (programmer error)",
                    self.state, event.kind
                )
            })
            .clone();
        handler(ctx, &mut self.payload, Some(event))
    }

    fn apply_builtin_default(&mut self, event: &EventRecord) {
        match &event.kind {
            crate::event::EventKind::TransitionTo(target) => self.state = target.clone(),
            crate::event::EventKind::Halt => self.halted = true,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Counter(i64);

    impl Describe for Counter {
        fn describe(&self) -> Vec<crate::describe::FieldDetail> {
            vec![crate::describe::FieldDetail::new("n", "i64", self.0.to_string())]
        }
    }

    #[test]
    fn new_instance_rejects_undeclared_initial_state() {
        let spec = Spec::new("Counter", Counter(0))
            .define_states(["A", "B"])
            .set_initial_state("Z");
        assert!(matches!(spec.new_instance(), Err(ConfigError::InitialStateNotDeclared(_))));
    }

    #[test]
    fn new_instance_yields_independent_instances() {
        let spec = Spec::new("Counter", Counter(0))
            .define_states(["A"])
            .set_initial_state("A");
        let a = spec.new_instance().expect("valid spec");
        let b = spec.new_instance().expect("valid spec");
        assert_eq!(a.state, b.state);
    }
}
