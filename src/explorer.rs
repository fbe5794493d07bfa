//! Reachability explorer (C3, spec.md §4.3): constructs the initial world, then
//! performs a depth-first exploration of the reachable-world set and the
//! accessibility relation, calling the condition evaluator on each newly visited
//! world.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::debug;

use crate::condition::Condition;
use crate::error::{CheckError, ConfigError};
use crate::event::EventRecord;
use crate::machine::MachineId;
use crate::spec::UninstantiatedMachine;
use crate::store::{canonical_id, Environment, World, WorldId};

/// Assigns machine ids (`TypeName`, `TypeName_1`, ...), compiles each instance's
/// handler builders against its assigned id, and seeds every machine's queue with a
/// single `entry` event (spec.md §4.3 "Initial world").
pub(crate) fn build_initial_environment(
    instances: Vec<Box<dyn UninstantiatedMachine>>,
) -> Result<Environment, ConfigError> {
    if instances.is_empty() {
        return Err(ConfigError::NoMachines);
    }

    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    let mut env = Environment::new();

    for instance in instances {
        let type_name = instance.type_name().to_string();
        let count = seen.entry(type_name.clone()).or_insert(0);
        let id = if *count == 0 {
            MachineId::new(type_name.clone())
        } else {
            MachineId::new(format!("{type_name}_{count}"))
        };
        *count += 1;

        let machine = instance.compile(id.clone());
        env.queue.insert(id.clone(), VecDeque::from([EventRecord::entry()]));
        env.machines.insert(id, machine);
    }

    Ok(env)
}

/// The fully explored Kripke structure (spec.md §3 "Model"), minus the LTL rules
/// themselves — those are checked afterward by `ltl.rs` against `accessible`/
/// `labels`.
pub struct ReachableGraph {
    pub initial: WorldId,
    pub worlds: BTreeMap<WorldId, World>,
    pub accessible: BTreeMap<WorldId, Vec<WorldId>>,
}

/// Depth-first construction of the reachable-world set (spec.md §4.3). `conditions`
/// are the registered safety invariants; any world where one fails has
/// `condition_violation` set before the loop continues.
pub fn explore(
    instances: Vec<Box<dyn UninstantiatedMachine>>,
    conditions: &[Condition],
) -> Result<ReachableGraph, CheckError> {
    let initial_env = build_initial_environment(instances)?;
    let initial_id = canonical_id(&initial_env);
    let initial_world = World::new(initial_env);

    let mut worlds: BTreeMap<WorldId, World> = BTreeMap::new();
    let mut accessible: BTreeMap<WorldId, Vec<WorldId>> = BTreeMap::new();
    let mut stack = vec![initial_id];
    worlds.insert(initial_id, initial_world);

    while let Some(id) = stack.pop() {
        let violates = {
            let world = worlds.get(&id).expect("world pushed before being popped");
            conditions.iter().any(|c| !c.evaluate(&world.env))
        };
        if violates {
            worlds.get_mut(&id).expect("world present").condition_violation = true;
        }
        debug!(world = %format!("{id:#018x}"), violates, "world expanded");

        let successors_env = {
            let world = worlds.get(&id).expect("world present");
            crate::dispatch::global_step(&world.env)?
        };

        let mut succ_ids = Vec::with_capacity(successors_env.len());
        for env in successors_env {
            let sid = canonical_id(&env);
            succ_ids.push(sid);
            let is_new = !worlds.contains_key(&sid);
            if is_new {
                worlds.insert(sid, World::new(env));
                stack.push(sid);
            }
            debug!(
                from = %format!("{id:#018x}"),
                to = %format!("{sid:#018x}"),
                new = is_new,
                "successor produced"
            );
        }
        accessible.insert(id, succ_ids);
    }

    Ok(ReachableGraph {
        initial: initial_id,
        worlds,
        accessible,
    })
}

/// BFS from `initial`, returning the first-discovered path (as a sequence of world
/// ids, initial first) to every world with `condition_violation` set — one path per
/// reachable violation cluster, since each BFS branch stops at the first violation
/// it finds (spec.md §4.4 "Shortest-path counterexamples").
pub fn violation_counterexamples(graph: &ReachableGraph) -> BTreeMap<WorldId, Vec<WorldId>> {
    let mut found = BTreeMap::new();
    let mut visited: BTreeSet<WorldId> = BTreeSet::new();
    let mut queue: VecDeque<(WorldId, Vec<WorldId>)> = VecDeque::new();

    visited.insert(graph.initial);
    queue.push_back((graph.initial, vec![graph.initial]));

    while let Some((id, path)) = queue.pop_front() {
        let world = match graph.worlds.get(&id) {
            Some(w) => w,
            None => continue,
        };
        if world.condition_violation {
            found.insert(id, path.clone());
            continue;
        }
        for &next in graph.accessible.get(&id).into_iter().flatten() {
            if visited.insert(next) {
                let mut next_path = path.clone();
                next_path.push(next);
                queue.push_back((next, next_path));
            }
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::{Describe, FieldDetail};
    use crate::spec::Spec;

    #[derive(Clone)]
    struct Empty;

    impl Describe for Empty {
        fn describe(&self) -> Vec<FieldDetail> {
            Vec::new()
        }
    }

    #[test]
    fn no_machines_is_a_config_error() {
        let err = build_initial_environment(vec![]).unwrap_err();
        assert!(matches!(err, ConfigError::NoMachines));
    }

    #[test]
    fn single_machine_no_handlers_yields_two_worlds() {
        let spec = Spec::new("Empty", Empty).define_states(["A"]).set_initial_state("A");
        let instance = spec.new_instance().expect("valid spec");
        let graph = explore(vec![Box::new(instance)], &[]).expect("explore ok");
        assert_eq!(graph.worlds.len(), 2);
        assert_eq!(graph.accessible.get(&graph.initial).map(Vec::len), Some(1));
    }

    #[test]
    fn two_state_cycle_matches_scenario_one() {
        // Scenario 1 (spec.md §8): on_entry(A) -> goto(B); on_entry(B) empty.
        let spec = Spec::new("Cycle", Empty)
            .define_states(["A", "B"])
            .set_initial_state("A")
            .on_entry("A", |ctx, _m, _e| {
                crate::ctx::goto(ctx, "B".into());
                Ok(())
            })
            .on_entry("B", |_ctx, _m, _e| Ok(()));
        let instance = spec.new_instance().expect("valid spec");
        let graph = explore(vec![Box::new(instance)], &[]).expect("explore ok");
        assert_eq!(graph.worlds.len(), 5);

        // Exactly one terminal world (empty accessible list).
        let terminal = graph.accessible.values().filter(|v| v.is_empty()).count();
        assert_eq!(terminal, 1);
    }
}
