//! LTL checker (C5, spec.md §4.5): three temporal patterns, each compiled to a
//! small Büchi automaton over `2^{condition-names}`; satisfaction is decided by
//! building the product graph against the reachable Kripke structure and looking
//! for an accepting cycle via Tarjan's SCC algorithm.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use tracing::{debug, info};

use crate::condition::Condition;
use crate::explorer::ReachableGraph;
use crate::store::WorldId;

/// A small propositional formula over named conditions, used to label Büchi
/// transitions.
#[derive(Clone)]
enum Formula {
    True,
    Atom(String),
    Not(Box<Formula>),
    And(Box<Formula>, Box<Formula>),
    Or(Box<Formula>, Box<Formula>),
}

impl Formula {
    fn eval(&self, labels: &BTreeMap<String, bool>) -> bool {
        match self {
            Formula::True => true,
            Formula::Atom(name) => labels.get(name).copied().unwrap_or(false),
            Formula::Not(f) => !f.eval(labels),
            Formula::And(a, b) => a.eval(labels) && b.eval(labels),
            Formula::Or(a, b) => a.eval(labels) || b.eval(labels),
        }
    }
}

fn atom(name: &str) -> Formula {
    Formula::Atom(name.to_string())
}
fn not(f: Formula) -> Formula {
    Formula::Not(Box::new(f))
}
fn and(a: Formula, b: Formula) -> Formula {
    Formula::And(Box::new(a), Box::new(b))
}
fn or(a: Formula, b: Formula) -> Formula {
    Formula::Or(Box::new(a), Box::new(b))
}

/// A tiny Büchi automaton: numbered states, an accepting subset, and a transition
/// relation labelled by [`Formula`]s over `2^{condition-names}`.
struct BuchiAutomaton {
    accepting: BTreeSet<usize>,
    transitions: Vec<(usize, Formula, usize)>,
}

impl BuchiAutomaton {
    /// All `(target_state, ())` reachable from `state` by a transition whose
    /// formula the successor world's labels satisfy.
    fn step(&self, state: usize, labels: &BTreeMap<String, bool>) -> Vec<usize> {
        self.transitions
            .iter()
            .filter(|(from, _, _)| *from == state)
            .filter(|(_, formula, _)| formula.eval(labels))
            .map(|(_, _, to)| *to)
            .collect()
    }
}

/// G (p → F q), encoded as its negation (spec.md §4.5 table).
fn whenever_p_eventually_q(p: &str, q: &str) -> BuchiAutomaton {
    BuchiAutomaton {
        accepting: BTreeSet::from([1]),
        transitions: vec![
            (0, and(atom(p), not(atom(q))), 1),
            (0, or(not(atom(p)), atom(q)), 0),
            (1, not(atom(q)), 1),
            (1, atom(q), 2),
            (2, Formula::True, 2),
        ],
    }
}

/// F G c.
fn eventually_always(c: &str) -> BuchiAutomaton {
    BuchiAutomaton {
        accepting: BTreeSet::from([1]),
        transitions: vec![
            (0, not(atom(c)), 1),
            (0, atom(c), 0),
            (1, not(atom(c)), 1),
            (1, atom(c), 0),
        ],
    }
}

/// G F c.
fn always_eventually(c: &str) -> BuchiAutomaton {
    BuchiAutomaton {
        accepting: BTreeSet::from([1]),
        transitions: vec![
            (0, not(atom(c)), 1),
            (0, Formula::True, 0),
            (1, not(atom(c)), 1),
            (1, atom(c), 2),
            (2, Formula::True, 2),
        ],
    }
}

/// Either a safety invariant, checked locally per world by the condition
/// evaluator, or one of the three temporal patterns this module compiles to a
/// Büchi automaton (spec.md glossary "Rule").
pub enum Rule {
    Always(Condition),
    WheneverPEventuallyQ(Condition, Condition),
    EventuallyAlways(Condition),
    AlwaysEventually(Condition),
}

impl Rule {
    /// `Always(condition)` — a safety invariant, checked locally per world by the
    /// condition evaluator rather than compiled to a Büchi automaton.
    pub fn always(condition: Condition) -> Self {
        Rule::Always(condition)
    }

    /// `WheneverPEventuallyQ(p, q)` — G (p → F q).
    pub fn whenever_p_eventually_q(p: Condition, q: Condition) -> Self {
        Rule::WheneverPEventuallyQ(p, q)
    }

    /// `EventuallyAlways(c)` — F G c.
    pub fn eventually_always(c: Condition) -> Self {
        Rule::EventuallyAlways(c)
    }

    /// `AlwaysEventually(c)` — G F c.
    pub fn always_eventually(c: Condition) -> Self {
        Rule::AlwaysEventually(c)
    }

    /// Conditions this rule needs labels for.
    pub fn conditions(&self) -> Vec<Condition> {
        match self {
            Rule::Always(c) => vec![c.clone()],
            Rule::WheneverPEventuallyQ(p, q) => vec![p.clone(), q.clone()],
            Rule::EventuallyAlways(c) | Rule::AlwaysEventually(c) => vec![c.clone()],
        }
    }

    /// The safety invariant this rule checks locally, if it is an `Always` rule.
    pub fn as_safety_condition(&self) -> Option<&Condition> {
        match self {
            Rule::Always(c) => Some(c),
            _ => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            Rule::Always(c) => format!("always({})", c.name()),
            Rule::WheneverPEventuallyQ(p, q) => format!("whenever {} eventually {}", p.name(), q.name()),
            Rule::EventuallyAlways(c) => format!("eventually always {}", c.name()),
            Rule::AlwaysEventually(c) => format!("always eventually {}", c.name()),
        }
    }

    fn automaton(&self) -> Option<BuchiAutomaton> {
        match self {
            Rule::Always(_) => None,
            Rule::WheneverPEventuallyQ(p, q) => Some(whenever_p_eventually_q(p.name(), q.name())),
            Rule::EventuallyAlways(c) => Some(eventually_always(c.name())),
            Rule::AlwaysEventually(c) => Some(always_eventually(c.name())),
        }
    }
}

/// A counterexample for a violated liveness rule: a finite prefix into a reachable
/// cycle (spec.md glossary "Lasso"). World ids only — the Büchi state component of
/// the product graph is projected away for user-facing output.
pub(crate) struct Lasso {
    pub(crate) prefix: Vec<WorldId>,
    pub(crate) r#loop: Vec<WorldId>,
}

pub(crate) struct RuleResult {
    pub(crate) rule: String,
    pub(crate) holds: bool,
    pub(crate) lasso: Option<Lasso>,
}

type ProductNode = (WorldId, usize);

/// Checks one rule against the reachable graph and its precomputed labels.
/// Terminal worlds (no recorded successors) are treated as self-loops, so an
/// infinite fair execution exists for every finite run (spec.md §4.5).
pub(crate) fn check_rule(
    graph: &ReachableGraph,
    labels: &BTreeMap<WorldId, BTreeMap<String, bool>>,
    rule: &Rule,
) -> RuleResult {
    let description = rule.describe();
    debug!(rule = %description, "checking rule");

    if let Rule::Always(condition) = rule {
        // A plain safety invariant: holds iff no reachable world's label for it is
        // false. The explorer separately marks `condition_violation` per world for
        // reporting, but that doesn't feed back here, so this re-derives the verdict
        // from the same labels rather than assuming `true`.
        let holds = graph.worlds.keys().all(|w| {
            labels
                .get(w)
                .and_then(|l| l.get(condition.name()))
                .copied()
                .unwrap_or(false)
        });
        if !holds {
            info!(rule = %description, "rule violated");
        }
        return RuleResult {
            rule: description,
            holds,
            lasso: None,
        };
    }
    let ba = rule.automaton().expect("every non-Always rule compiles to an automaton");

    let empty_labels = BTreeMap::new();

    // BFS over the product graph, recording parents for the prefix and all edges
    // for SCC analysis.
    let start: ProductNode = (graph.initial, 0);
    let mut parent: HashMap<ProductNode, ProductNode> = HashMap::new();
    let mut visited: HashSet<ProductNode> = HashSet::new();
    let mut edges: Vec<(ProductNode, ProductNode)> = Vec::new();
    let mut queue: VecDeque<ProductNode> = VecDeque::new();

    visited.insert(start);
    queue.push_back(start);

    while let Some((w, s)) = queue.pop_front() {
        let successors: Vec<WorldId> = match graph.accessible.get(&w) {
            Some(v) if !v.is_empty() => v.clone(),
            _ => vec![w],
        };
        for w_next in successors {
            let w_labels = labels.get(&w_next).unwrap_or(&empty_labels);
            for s_next in ba.step(s, w_labels) {
                let node = (w_next, s_next);
                edges.push(((w, s), node));
                if visited.insert(node) {
                    parent.insert(node, (w, s));
                    queue.push_back(node);
                }
            }
        }
    }

    let mut pg: DiGraphMap<ProductNode, ()> = DiGraphMap::new();
    for &node in &visited {
        pg.add_node(node);
    }
    for (from, to) in &edges {
        pg.add_edge(*from, *to, ());
    }

    let self_loops: HashSet<ProductNode> = edges
        .iter()
        .filter(|(from, to)| from == to)
        .map(|(from, _)| *from)
        .collect();

    let sccs = tarjan_scc(&pg);

    for scc in &sccs {
        let is_cyclic = scc.len() >= 2 || scc.iter().any(|n| self_loops.contains(n));
        if !is_cyclic {
            continue;
        }
        let witness = scc.iter().find(|(_, s)| ba.accepting.contains(s));
        let Some(&witness) = witness else { continue };

        // Prefix: walk parent pointers back to the start.
        let mut prefix_nodes = vec![witness];
        let mut cur = witness;
        while cur != start {
            cur = parent[&cur];
            prefix_nodes.push(cur);
        }
        prefix_nodes.reverse();

        // Loop: BFS from witness, restricted to nodes in this SCC, until we return
        // to witness via at least one edge.
        let scc_set: HashSet<ProductNode> = scc.iter().copied().collect();
        let loop_nodes = find_cycle_through(&pg, witness, &scc_set);

        info!(rule = %description, "rule violated");
        return RuleResult {
            rule: description,
            holds: false,
            lasso: Some(Lasso {
                prefix: prefix_nodes.into_iter().map(|(w, _)| w).collect(),
                r#loop: loop_nodes.into_iter().map(|(w, _)| w).collect(),
            }),
        };
    }

    RuleResult {
        rule: description,
        holds: true,
        lasso: None,
    }
}

/// BFS restricted to `within`, from `start` back to `start`, returning the simple
/// cycle found (start included once, as the first element; not repeated at the
/// end).
fn find_cycle_through(
    pg: &DiGraphMap<ProductNode, ()>,
    start: ProductNode,
    within: &HashSet<ProductNode>,
) -> Vec<ProductNode> {
    let mut parent: HashMap<ProductNode, ProductNode> = HashMap::new();
    let mut visited: HashSet<ProductNode> = HashSet::from([start]);
    let mut queue: VecDeque<ProductNode> = VecDeque::new();

    for neighbor in pg.neighbors(start) {
        if !within.contains(&neighbor) {
            continue;
        }
        if neighbor == start {
            return vec![start];
        }
        visited.insert(neighbor);
        parent.insert(neighbor, start);
        queue.push_back(neighbor);
    }

    while let Some(node) = queue.pop_front() {
        for neighbor in pg.neighbors(node) {
            if !within.contains(&neighbor) {
                continue;
            }
            if neighbor == start {
                let mut path = vec![start];
                let mut cur = node;
                let mut rev = vec![cur];
                while let Some(&p) = parent.get(&cur) {
                    if p == start {
                        break;
                    }
                    rev.push(p);
                    cur = p;
                }
                rev.reverse();
                path.extend(rev);
                return path;
            }
            if visited.insert(neighbor) {
                parent.insert(neighbor, node);
                queue.push_back(neighbor);
            }
        }
    }

    // An accepting SCC of size >= 2 (or with a recorded self-loop) always has a
    // cycle back to any of its nodes; reaching here means `within` was
    // inconsistent with `pg`, which is a programmer error.
    panic!("find_cycle_through: no cycle found through a node its own SCC should contain");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::World;

    fn fake_graph(
        initial: WorldId,
        accessible: Vec<(WorldId, Vec<WorldId>)>,
    ) -> ReachableGraph {
        let mut worlds = BTreeMap::new();
        let mut acc = BTreeMap::new();
        for (id, succ) in accessible {
            worlds.insert(
                id,
                World {
                    id,
                    env: crate::store::Environment::new(),
                    condition_violation: false,
                },
            );
            acc.insert(id, succ);
        }
        ReachableGraph {
            initial,
            worlds,
            accessible: acc,
        }
    }

    #[test]
    fn always_eventually_true_constant_holds() {
        let graph = fake_graph(0, vec![(0, vec![0])]);
        let mut labels = BTreeMap::new();
        labels.insert(0u64, BTreeMap::from([("c".to_string(), true)]));
        let rule = Rule::AlwaysEventually(Condition::constant("c", true));
        let result = check_rule(&graph, &labels, &rule);
        assert!(result.holds);
        assert!(result.lasso.is_none());
    }

    #[test]
    fn always_eventually_false_constant_violates() {
        let graph = fake_graph(0, vec![(0, vec![0])]);
        let mut labels = BTreeMap::new();
        labels.insert(0u64, BTreeMap::from([("c".to_string(), false)]));
        let rule = Rule::AlwaysEventually(Condition::constant("c", false));
        let result = check_rule(&graph, &labels, &rule);
        assert!(!result.holds);
        let lasso = result.lasso.expect("violation has a lasso");
        assert!(!lasso.r#loop.is_empty());
    }

    #[test]
    fn always_rule_holds_when_every_world_is_true() {
        let graph = fake_graph(0, vec![(0, vec![1]), (1, vec![1])]);
        let mut labels = BTreeMap::new();
        labels.insert(0u64, BTreeMap::from([("safe".to_string(), true)]));
        labels.insert(1u64, BTreeMap::from([("safe".to_string(), true)]));
        let rule = Rule::Always(Condition::constant("safe", true));
        let result = check_rule(&graph, &labels, &rule);
        assert!(result.holds);
        assert!(result.lasso.is_none());
    }

    #[test]
    fn always_rule_reports_violation_when_any_world_is_false() {
        let graph = fake_graph(0, vec![(0, vec![1]), (1, vec![1])]);
        let mut labels = BTreeMap::new();
        labels.insert(0u64, BTreeMap::from([("safe".to_string(), true)]));
        labels.insert(1u64, BTreeMap::from([("safe".to_string(), false)]));
        let rule = Rule::Always(Condition::constant("safe", true));
        let result = check_rule(&graph, &labels, &rule);
        assert!(!result.holds);
        assert!(result.lasso.is_none());
    }
}
