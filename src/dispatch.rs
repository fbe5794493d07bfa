//! Event-dispatch core (C2, spec.md §4.2): turns one environment into the set of
//! successor environments reachable by processing one event on one machine.

use crate::ctx::Ctx;
use crate::error::HandlerError;
use crate::event::EventKind;
use crate::machine::MachineId;
use crate::store::Environment;

/// Runs one local step: dequeue one event on machine `m` and run whatever handlers
/// apply, per spec.md §4.2's five-step recipe. Returns the (possibly empty) list of
/// resulting environments — one per matching handler, or the built-in default
/// count (0 or 1) when no handler is registered.
pub fn local_step(env: &Environment, m: &MachineId) -> Result<Vec<Environment>, HandlerError> {
    let mut ec = env.clone();
    let Some(event) = ec.dequeue(m) else {
        return Ok(Vec::new());
    };

    let machine = ec
        .machines
        .get(m)
        .unwrap_or_else(|| panic!("local_step: unknown machine {m:?} (programmer error)"));

    if machine.halted() {
        // Event swallowed silently; the dequeue above already advanced the queue.
        return Ok(vec![ec]);
    }

    let tag = event.kind.tag();
    let registered = machine.handler_count(&tag);
    let has_builtin_default = matches!(event.kind, EventKind::TransitionTo(_) | EventKind::Halt);

    if registered == 0 && !has_builtin_default {
        // Entry/Exit/user event with nothing registered: event consumed, no effect.
        return Ok(vec![ec]);
    }

    let branches = if registered == 0 { 1 } else { registered };
    let mut results = Vec::with_capacity(branches);

    for index in 0..branches {
        let mut branch = ec.clone();
        let mut machine = branch
            .machines
            .remove(m)
            .unwrap_or_else(|| panic!("local_step: unknown machine {m:?} (programmer error)"));

        {
            let mut ctx = Ctx::new(&mut branch, m.clone());
            if index < registered {
                machine.run_handler_at(index, &mut ctx, &event)?;
            }
        }
        machine.apply_builtin_default(&event);

        branch.machines.insert(m.clone(), machine);
        results.push(branch);
    }

    Ok(results)
}

/// Runs one global step: iterate machine ids in sorted order, run a local step on
/// each, and collect every resulting environment across all machines (spec.md
/// §4.2 "Global step"). `BTreeMap` iteration already yields machine ids in sorted
/// order, so no explicit sort is needed here.
pub fn global_step(env: &Environment) -> Result<Vec<Environment>, HandlerError> {
    let mut results = Vec::new();
    for m in env.machines.keys() {
        results.extend(local_step(env, m)?);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::{Describe, FieldDetail};
    use crate::event::EventRecord;
    use crate::spec::Spec;
    use crate::store::canonical_id;

    #[derive(Clone)]
    struct Empty;

    impl Describe for Empty {
        fn describe(&self) -> Vec<FieldDetail> {
            Vec::new()
        }
    }

    fn build_env(spec: &Spec<Empty>) -> (Environment, MachineId) {
        let instance = spec.new_instance().expect("valid spec");
        let id = MachineId::new("M");
        let machine = crate::spec::UninstantiatedMachine::compile(Box::new(instance), id.clone());
        let mut env = Environment::new();
        env.queue.insert(id.clone(), Default::default());
        env.queue.get_mut(&id).unwrap().push_back(EventRecord::entry());
        env.machines.insert(id.clone(), machine);
        (env, id)
    }

    #[test]
    fn entry_with_no_handler_is_a_noop_step() {
        let spec = Spec::new("Empty", Empty).define_states(["A"]).set_initial_state("A");
        let (env, m) = build_env(&spec);
        let successors = local_step(&env, &m).expect("no handler error");
        assert_eq!(successors.len(), 1);
        assert!(successors[0].queue.get(&m).unwrap().is_empty());
    }

    #[test]
    fn halted_machine_swallows_events() {
        let spec = Spec::new("Empty", Empty).define_states(["A"]).set_initial_state("A");
        let (mut env, m) = build_env(&spec);
        env.machines.get_mut(&m).unwrap().apply_builtin_default(&EventRecord::halt());
        let successors = local_step(&env, &m).expect("no handler error");
        assert_eq!(successors.len(), 1);
        assert!(successors[0].machines.get(&m).unwrap().halted());
    }

    #[test]
    fn global_step_is_pure_function_of_environment() {
        let spec = Spec::new("Empty", Empty).define_states(["A"]).set_initial_state("A");
        let (env, _m) = build_env(&spec);
        let a = global_step(&env).expect("ok");
        let b = global_step(&env).expect("ok");
        assert_eq!(a.len(), b.len());
        assert_eq!(canonical_id(&a[0]), canonical_id(&b[0]));
    }
}
