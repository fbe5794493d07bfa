//! Error types at the core boundary (spec.md §7).
//!
//! Three kinds suffice: a configuration error (bad spec/model inputs), a handler
//! error (a user handler signalled failure), and the umbrella error returned by the
//! exploration entry points. Programmer errors — unknown machine id in dispatch, a
//! corrupted world, a missing built-in handler — are not represented here at all;
//! they panic, per spec.md §7's closing paragraph.

use thiserror::Error;

/// Returned by [`crate::spec::Spec::new_instance`] and by model construction when
/// inputs are structurally invalid.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no state machines supplied to the model")]
    NoMachines,

    #[error("initial state {0:?} is not among the declared states")]
    InitialStateNotDeclared(String),

    #[error("machine type {0:?} declares no states")]
    NoStatesDeclared(String),
}

/// A handler signalled failure. This aborts the in-progress global step; the
/// explorer propagates it out of [`crate::model::Model::test`] /
/// [`crate::model::Model::debug`] without marking any partial result.
#[derive(Debug, Error)]
#[error("handler for machine {machine:?} in state {state:?} on event {event:?} failed: {source}")]
pub struct HandlerError {
    pub machine: String,
    pub state: String,
    pub event: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl HandlerError {
    pub fn new(
        machine: impl Into<String>,
        state: impl Into<String>,
        event: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            machine: machine.into(),
            state: state.into(),
            event: event.into(),
            source: Box::new(source),
        }
    }
}

/// Top-level error returned by model construction and exploration.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// Only returned by [`crate::model::Model::test`] when the caller opted in via
    /// [`crate::model::ExploreOptions::fail_on_violation`] — a condition violation
    /// is otherwise a normal, non-error outcome (spec.md §7 "Violation").
    #[error("{count} world(s) violated a safety condition")]
    ViolationsFound { count: usize },
}
