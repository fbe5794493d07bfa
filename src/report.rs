//! Structured report (spec.md §6 "External interfaces"): the JSON shape emitted by
//! `Model::debug` and the data `Model::test` summarizes as text.

use std::cmp::Ordering;

use serde::Serialize;

use crate::describe::details_string;
use crate::explorer::ReachableGraph;
use crate::ltl::RuleResult;
use crate::store::WorldId;

#[derive(Serialize, Clone, PartialEq, Eq)]
pub struct MachineEntry {
    pub id: String,
    pub type_name: String,
    pub state: String,
    pub halted: bool,
    pub details: String,
}

impl PartialOrd for MachineEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MachineEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

#[derive(Serialize, Clone, PartialEq, Eq)]
pub struct QueuedEventEntry {
    pub target: String,
    pub event_name: String,
    pub details: String,
}

impl PartialOrd for QueuedEventEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEventEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.target, &self.event_name, &self.details).cmp(&(&other.target, &other.event_name, &other.details))
    }
}

#[derive(Serialize, Clone)]
pub struct WorldEntry {
    pub condition_violation: bool,
    pub state_machines: Vec<MachineEntry>,
    pub queued_events: Vec<QueuedEventEntry>,
}

impl PartialEq for WorldEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for WorldEntry {}

impl PartialOrd for WorldEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WorldEntry {
    /// Worlds sort by the lexicographic order of their already-sorted machine and
    /// event lists (spec.md §6 "Report formats"); `condition_violation` does not
    /// participate.
    fn cmp(&self, other: &Self) -> Ordering {
        self.state_machines
            .cmp(&other.state_machines)
            .then_with(|| self.queued_events.cmp(&other.queued_events))
    }
}

#[derive(Serialize)]
pub struct ViolationSummary {
    pub found: bool,
    pub count: usize,
}

#[derive(Serialize)]
pub struct Summary {
    pub total_worlds: usize,
    pub condition_violations: ViolationSummary,
    pub execution_time_ms: u64,
}

#[derive(Serialize)]
pub struct LassoEntry {
    pub prefix: Vec<WorldId>,
    #[serde(rename = "loop")]
    pub r#loop: Vec<WorldId>,
}

#[derive(Serialize)]
pub struct RuleEntry {
    pub rule: String,
    pub holds: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lasso: Option<LassoEntry>,
}

#[derive(Serialize)]
pub struct Report {
    pub worlds: Vec<WorldEntry>,
    pub summary: Summary,
    pub temporal_rules: Vec<RuleEntry>,
}

fn machine_entry(env: &crate::store::Environment, id: &crate::machine::MachineId) -> MachineEntry {
    let m = env.machines.get(id).expect("machine present in its own environment");
    MachineEntry {
        id: id.as_str().to_string(),
        type_name: m.type_name().to_string(),
        state: m.current_state().as_str().to_string(),
        halted: m.halted(),
        details: details_string(&m.details()),
    }
}

fn world_entry(world: &crate::store::World) -> WorldEntry {
    let mut state_machines: Vec<MachineEntry> = world
        .env
        .machines
        .keys()
        .map(|id| machine_entry(&world.env, id))
        .collect();
    state_machines.sort();

    let mut queued_events: Vec<QueuedEventEntry> = world
        .env
        .queue
        .iter()
        .flat_map(|(target, events)| {
            events.iter().map(move |event| QueuedEventEntry {
                target: target.as_str().to_string(),
                event_name: event.kind.type_name().to_string(),
                details: details_string(&event.details()),
            })
        })
        .collect();
    queued_events.sort();

    WorldEntry {
        condition_violation: world.condition_violation,
        state_machines,
        queued_events,
    }
}

/// Assembles the full report from an explored graph, its LTL results, and how long
/// exploration took.
pub fn build_report(graph: &ReachableGraph, rule_results: &[RuleResult], execution_time_ms: u64) -> Report {
    let mut worlds: Vec<WorldEntry> = graph.worlds.values().map(world_entry).collect();
    worlds.sort();

    let violated: Vec<&WorldId> = graph
        .worlds
        .iter()
        .filter(|(_, w)| w.condition_violation)
        .map(|(id, _)| id)
        .collect();

    let summary = Summary {
        total_worlds: graph.worlds.len(),
        condition_violations: ViolationSummary {
            found: !violated.is_empty(),
            count: violated.len(),
        },
        execution_time_ms,
    };

    let temporal_rules = rule_results
        .iter()
        .map(|r| RuleEntry {
            rule: r.rule.clone(),
            holds: r.holds,
            lasso: r.lasso.as_ref().map(|l| LassoEntry {
                prefix: l.prefix.clone(),
                r#loop: l.r#loop.clone(),
            }),
        })
        .collect();

    Report {
        worlds,
        summary,
        temporal_rules,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn machine_entry_ordering_is_by_id() {
        let a = MachineEntry {
            id: "A".into(),
            type_name: "T".into(),
            state: "S".into(),
            halted: false,
            details: "no fields".into(),
        };
        let b = MachineEntry {
            id: "B".into(),
            type_name: "T".into(),
            state: "S".into(),
            halted: false,
            details: "no fields".into(),
        };
        assert!(a < b);
    }

    #[test]
    fn queued_event_ordering_is_by_target_then_name_then_details() {
        let a = QueuedEventEntry {
            target: "A".into(),
            event_name: "entry".into(),
            details: "no fields".into(),
        };
        let b = QueuedEventEntry {
            target: "A".into(),
            event_name: "exit".into(),
            details: "no fields".into(),
        };
        assert!(a < b);
    }
}
