//! A model checker for communicating state machines: exhaustive reachability
//! exploration over a Kripke structure built from user-supplied machine
//! specifications, plus LTL-style temporal checking over the result.
//!
//! The six components from the design (configuration store, dispatch core,
//! reachability explorer, condition evaluator, LTL checker, spec/instance
//! protocol) map onto [`store`], an internal dispatch module, an internal
//! explorer module, [`condition`], [`ltl`], and [`spec`]. [`model`] is the thin
//! entry point that wires all six together for a caller.
//!
//! ```
//! use caspian::describe::{Describe, FieldDetail};
//! use caspian::model::{ExploreOptions, Model};
//! use caspian::spec::{Spec, UninstantiatedMachine};
//!
//! #[derive(Clone)]
//! struct Light;
//!
//! impl Describe for Light {
//!     fn describe(&self) -> Vec<FieldDetail> {
//!         Vec::new()
//!     }
//! }
//!
//! let spec = Spec::new("Light", Light)
//!     .define_states(["red", "green"])
//!     .set_initial_state("red")
//!     .on_entry("red", |ctx, _light, _event| {
//!         caspian::ctx::goto(ctx, "green".into());
//!         Ok(())
//!     });
//!
//! let instance = spec.new_instance().expect("valid spec");
//! let model = Model::new().with_state_machines(vec![Box::new(instance) as Box<dyn UninstantiatedMachine>]);
//! model.test(ExploreOptions::default()).expect("exploration succeeds");
//! ```

pub mod condition;
pub mod ctx;
pub mod describe;
pub mod error;
pub mod event;
pub mod ltl;
pub mod machine;
pub mod model;
pub mod spec;
pub mod store;

mod dispatch;
mod explorer;
mod report;
