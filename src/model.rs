//! Model API (spec.md §6 "Model API"): the top-level entry point user code calls
//! after building specs and conditions — `Model::with_state_machines`,
//! `Model::with_rules`, `Model::test`, `Model::debug`.

use std::io::Write;

use tracing::info;

use crate::condition::{build_labels, Condition};
use crate::error::CheckError;
use crate::explorer::{explore, violation_counterexamples};
use crate::ltl::{check_rule, Rule};
use crate::report::build_report;
use crate::spec::UninstantiatedMachine;

/// Options accepted by both [`Model::test`] and [`Model::debug`] — the only
/// "configuration" surface the core exposes (spec.md §6 notes there is no file/env
/// config surface).
#[derive(Default, Clone, Copy)]
pub struct ExploreOptions {
    /// When set, [`Model::test`] returns an error if any world has
    /// `condition_violation = true`, instead of merely reporting it (spec.md §7
    /// "Violation").
    pub fail_on_violation: bool,
}

/// A fully specified model: the machine instances to explore from, plus the rules
/// (safety invariants and temporal patterns) to check against the resulting graph.
/// Built with `WithStateMachines`/`WithRules`, consumed by `Test`/`Debug` — there is
/// exactly one exploration per model, matching the single-threaded, run-to-completion
/// scheduling model (spec.md §5).
pub struct Model {
    instances: Vec<Box<dyn UninstantiatedMachine>>,
    rules: Vec<Rule>,
}

impl Model {
    pub fn new() -> Self {
        Self {
            instances: Vec::new(),
            rules: Vec::new(),
        }
    }

    /// `WithStateMachines(instances...)`.
    pub fn with_state_machines(
        mut self,
        instances: impl IntoIterator<Item = Box<dyn UninstantiatedMachine>>,
    ) -> Self {
        self.instances.extend(instances);
        self
    }

    /// `WithRules(rules...)`.
    pub fn with_rules(mut self, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.rules.extend(rules);
        self
    }

    fn safety_conditions(&self) -> Vec<Condition> {
        self.rules.iter().filter_map(Rule::as_safety_condition).cloned().collect()
    }

    /// Runs exploration once, checks every rule, and returns the pieces `test`/
    /// `debug` both need.
    fn run(self) -> Result<RunResult, CheckError> {
        let started = std::time::Instant::now();
        let safety = self.safety_conditions();
        let graph = explore(self.instances, &safety)?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let mut all_conditions = safety.clone();
        for rule in &self.rules {
            all_conditions.extend(rule.conditions());
        }
        let labels = build_labels(&graph.worlds, &all_conditions);

        let rule_results = self.rules.iter().map(|r| check_rule(&graph, &labels, r)).collect();

        info!(
            total_worlds = graph.worlds.len(),
            elapsed_ms, "exploration finished"
        );

        Ok(RunResult {
            graph,
            rule_results,
            elapsed_ms,
        })
    }

    /// `Test(opts...)` — runs exploration and checks, printing a human-readable
    /// report to stdout. Returns an error only on a handler/config failure, or (when
    /// `fail_on_violation` is set) when any world violated a safety rule — per
    /// spec.md §7, violations are a normal outcome otherwise.
    pub fn test(self, opts: ExploreOptions) -> Result<(), CheckError> {
        self.test_to(&mut std::io::stdout(), opts)
    }

    /// Same as [`Model::test`] but writes the human-readable summary to an arbitrary
    /// writer, for tests that want to capture it.
    pub fn test_to(self, writer: &mut impl Write, opts: ExploreOptions) -> Result<(), CheckError> {
        let result = self.run()?;
        let counterexamples = violation_counterexamples(&result.graph);

        let _ = writeln!(writer, "worlds explored: {}", result.graph.worlds.len());
        let _ = writeln!(writer, "condition violations: {}", counterexamples.len());
        for (world_id, path) in &counterexamples {
            let _ = writeln!(writer, "  violation at {world_id:#018x}: path {path:?}");
        }
        for r in &result.rule_results {
            match &r.lasso {
                None => {
                    let _ = writeln!(writer, "rule {:?}: holds", r.rule);
                }
                Some(lasso) => {
                    let _ = writeln!(
                        writer,
                        "rule {:?}: violated (prefix {:?}, loop {:?})",
                        r.rule, lasso.prefix, lasso.r#loop
                    );
                }
            }
        }

        if opts.fail_on_violation && !counterexamples.is_empty() {
            return Err(CheckError::ViolationsFound {
                count: counterexamples.len(),
            });
        }
        Ok(())
    }

    /// `Debug(writer, opts...)` — emits the full structured JSON report (spec.md §6).
    pub fn debug(self, writer: &mut impl Write, _opts: ExploreOptions) -> Result<(), CheckError> {
        let result = self.run()?;
        let report = build_report(&result.graph, &result.rule_results, result.elapsed_ms);
        serde_json::to_writer_pretty(writer, &report).expect("report serialization cannot fail");
        Ok(())
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

struct RunResult {
    graph: crate::explorer::ReachableGraph,
    rule_results: Vec<crate::ltl::RuleResult>,
    elapsed_ms: u64,
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
    fn test_runs_without_error_on_a_trivial_model() {
        let spec = Spec::new("Empty", Empty).define_states(["A"]).set_initial_state("A");
        let instance = spec.new_instance().expect("valid spec");
        let model = Model::new().with_state_machines(vec![Box::new(instance) as Box<dyn UninstantiatedMachine>]);
        let mut buf = Vec::new();
        model.test_to(&mut buf, ExploreOptions::default()).expect("test ok");
        assert!(String::from_utf8(buf).unwrap().contains("worlds explored: 2"));
    }

    #[test]
    fn debug_emits_well_formed_json() {
        let spec = Spec::new("Empty", Empty).define_states(["A"]).set_initial_state("A");
        let instance = spec.new_instance().expect("valid spec");
        let model = Model::new().with_state_machines(vec![Box::new(instance) as Box<dyn UninstantiatedMachine>]);
        let mut buf = Vec::new();
        model.debug(&mut buf, ExploreOptions::default()).expect("debug ok");
        let value: serde_json::Value = serde_json::from_slice(&buf).expect("valid json");
        assert_eq!(value["summary"]["total_worlds"], 2);
    }
}
