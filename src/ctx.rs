//! Handler context (DESIGN NOTES §9 "Context parameter for handlers"): the source
//! threads an implicit environment pointer through ambient state, but a systems-
//! language port passes it explicitly. `Ctx` is that explicit parameter, plus the
//! three dispatch primitives (`send_to`, `goto`, `halt`) a handler uses to affect
//! the world it's running in.

use crate::event::EventRecord;
use crate::machine::{MachineId, StateId};
use crate::store::Environment;

/// Threaded through every handler invocation: the environment being built (a fresh
/// clone private to this handler's branch, per spec.md §4.2) and the id of the
/// machine the handler is running on behalf of.
pub struct Ctx<'a> {
    env: &'a mut Environment,
    acting: MachineId,
}

impl<'a> Ctx<'a> {
    pub(crate) fn new(env: &'a mut Environment, acting: MachineId) -> Self {
        Self { env, acting }
    }

    pub fn acting_machine(&self) -> &MachineId {
        &self.acting
    }

    pub fn env(&self) -> &Environment {
        self.env
    }
}

/// `SendTo(target, event)` — enqueues `event` onto `target`'s queue.
///
/// Sending to a machine absent from the world is a programmer error (spec.md §9,
/// open question 2): the initial-world constructor seeds a queue entry for every
/// declared machine, so a missing entry here means the caller named a machine that
/// was never part of the model.
pub fn send_to(ctx: &mut Ctx<'_>, target: &MachineId, event: EventRecord) {
    ctx.env.enqueue(target, event);
}

/// `Goto(state)` — enqueues `exit`, `transition-to(state)`, `entry` on the acting
/// machine, in that order (spec.md §4.2). The actual state change happens later,
/// when `transition-to` is itself dispatched.
pub fn goto(ctx: &mut Ctx<'_>, state: StateId) {
    let me = ctx.acting.clone();
    send_to(ctx, &me, EventRecord::exit());
    send_to(ctx, &me, EventRecord::transition_to(state));
    send_to(ctx, &me, EventRecord::entry());
}

/// `Halt(target)` — enqueues a `halt` event on `target` (which may be any machine,
/// not only the acting one).
pub fn halt(ctx: &mut Ctx<'_>, target: &MachineId) {
    send_to(ctx, target, EventRecord::halt());
}
