//! Condition evaluator (C4, spec.md §4.4): compiles user predicates into named
//! labels over worlds, and evaluates safety invariants locally.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::machine::MachineId;
use crate::store::{Environment, World, WorldId};

/// Read-only accessor handed to multi-machine predicates, so they can look up any
/// named machine's typed payload without the condition evaluator needing to know
/// the set of types involved up front.
pub struct MachineAccessor<'a> {
    env: &'a Environment,
}

impl<'a> MachineAccessor<'a> {
    pub fn get<T: 'static>(&self, id: &MachineId) -> Option<&T> {
        self.env.machines.get(id)?.as_any().downcast_ref::<T>()
    }
}

enum Kind {
    Constant(bool),
    Single {
        machine: MachineId,
        check: Arc<dyn Fn(&dyn Any) -> bool + Send + Sync>,
    },
    Multi {
        check: Arc<dyn Fn(&MachineAccessor<'_>) -> bool + Send + Sync>,
    },
}

/// A named predicate over a world (spec.md §4.4). Cloning is cheap: the evaluation
/// closures live behind `Arc`.
#[derive(Clone)]
pub struct Condition {
    name: String,
    kind: Arc<Kind>,
}

impl Condition {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Constant predicate: ignores the world entirely.
    pub fn constant(name: impl Into<String>, value: bool) -> Self {
        Self {
            name: name.into(),
            kind: Arc::new(Kind::Constant(value)),
        }
    }

    /// Single-machine predicate: evaluates `f` against the typed machine found by
    /// `machine` in the world's machine map. False if the id is absent or the
    /// machine is no longer of type `T`.
    pub fn single<T: 'static>(
        name: impl Into<String>,
        machine: MachineId,
        f: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Self {
        let check: Arc<dyn Fn(&dyn Any) -> bool + Send + Sync> =
            Arc::new(move |any: &dyn Any| any.downcast_ref::<T>().is_some_and(&f));
        Self {
            name: name.into(),
            kind: Arc::new(Kind::Single { machine, check }),
        }
    }

    /// Multi-machine predicate: `f` receives a [`MachineAccessor`] to look up any
    /// number of machines by id and type.
    pub fn multi(
        name: impl Into<String>,
        f: impl Fn(&MachineAccessor<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            kind: Arc::new(Kind::Multi { check: Arc::new(f) }),
        }
    }

    pub fn evaluate(&self, env: &Environment) -> bool {
        match &*self.kind {
            Kind::Constant(v) => *v,
            Kind::Single { machine, check } => env
                .machines
                .get(machine)
                .is_some_and(|m| check(m.as_any())),
            Kind::Multi { check } => check(&MachineAccessor { env }),
        }
    }
}

/// Evaluates `conditions` against every world, keyed by name, for use as Büchi
/// transition labels (`ltl.rs`). Conditions sharing a name are evaluated
/// independently per world; later duplicates in `conditions` overwrite earlier
/// ones for that world, matching how `BTreeMap::insert` behaves.
pub(crate) fn build_labels(
    worlds: &BTreeMap<WorldId, World>,
    conditions: &[Condition],
) -> BTreeMap<WorldId, BTreeMap<String, bool>> {
    worlds
        .iter()
        .map(|(&id, world)| {
            let labels = conditions
                .iter()
                .map(|c| (c.name().to_string(), c.evaluate(&world.env)))
                .collect();
            (id, labels)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_ignores_environment() {
        let c = Condition::constant("always-true", true);
        assert!(c.evaluate(&Environment::new()));
    }

    #[test]
    fn single_is_false_when_machine_absent() {
        let c = Condition::single::<i64>("nonsense", MachineId::new("X"), |_| true);
        assert!(!c.evaluate(&Environment::new()));
    }
}
