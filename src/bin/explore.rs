//! Demo entrypoint: wires a couple of the scenarios from spec.md §8 end-to-end
//! through the public `Model` API and prints a `Test`-style report for each.
//!
//! Grounded in the teacher's `main.rs` pattern of assembling a small runnable
//! scenario from library pieces, trimmed of all networking/TUI concerns (see
//! `SPEC_FULL.md` §0).

use caspian::condition::Condition;
use caspian::ctx;
use caspian::describe::{Describe, FieldDetail};
use caspian::event::EventRecord;
use caspian::ltl::Rule;
use caspian::machine::MachineId;
use caspian::model::{ExploreOptions, Model};
use caspian::spec::{Spec, UninstantiatedMachine};

#[derive(Clone)]
struct Empty;

impl Describe for Empty {
    fn describe(&self) -> Vec<FieldDetail> {
        Vec::new()
    }
}

/// Scenario 1 (spec.md §8): a deterministic two-state cycle. One machine,
/// `on_entry(A)` goes to B, `on_entry(B)` does nothing. Five worlds expected.
fn two_state_cycle() -> Model {
    let spec = Spec::new("Cycle", Empty)
        .define_states(["A", "B"])
        .set_initial_state("A")
        .on_entry("A", |ctx, _m, _event| {
            ctx::goto(ctx, "B".into());
            Ok(())
        });
    let instance = spec.new_instance().expect("valid spec");
    Model::new().with_state_machines(vec![Box::new(instance) as Box<dyn UninstantiatedMachine>])
}

#[derive(Clone)]
struct Db {
    bookings: i64,
}

impl Describe for Db {
    fn describe(&self) -> Vec<FieldDetail> {
        vec![FieldDetail::new("bookings", "i64", self.bookings.to_string())]
    }
}

fn db_spec(with_mutex: bool) -> Spec<Db> {
    let spec = Spec::new("Db", Db { bookings: 0 })
        .define_states(["available", "booked"])
        .set_initial_state("available");
    if with_mutex {
        spec.on_event("available", "book", |ctx, db, _event| {
            db.bookings += 1;
            ctx::goto(ctx, "booked".into());
            Ok(())
        })
    } else {
        spec.on_event("available", "book", |_ctx, db, _event| {
            db.bookings += 1;
            Ok(())
        })
        .on_event("booked", "book", |_ctx, db, _event| {
            db.bookings += 1;
            Ok(())
        })
    }
}

fn client_spec(db: MachineId) -> Spec<Empty> {
    Spec::new("Client", Empty).define_states(["idle"]).set_initial_state("idle").on_entry("idle", move |ctx, _m, _event| {
        ctx::send_to(ctx, &db, EventRecord::user("book", None));
        Ok(())
    })
}

/// Scenarios 3/4 (spec.md §8): two clients contend for one `Db`, with and
/// without a mutual-exclusion guard. The `Db` machine is always assigned the id
/// `"Db"` because it is the first (and only) instance of its type registered.
fn contended_booking(with_mutex: bool) -> Model {
    let db_id = MachineId::new("Db");
    let db = db_spec(with_mutex).new_instance().expect("valid spec");
    let client_a = client_spec(db_id.clone()).new_instance().expect("valid spec");
    let client_b = client_spec(db_id.clone()).new_instance().expect("valid spec");

    let no_double_booking = Condition::single::<Db>("no_double_booking", db_id, |db| db.bookings <= 1);

    Model::new()
        .with_state_machines(vec![
            Box::new(db) as Box<dyn UninstantiatedMachine>,
            Box::new(client_a) as Box<dyn UninstantiatedMachine>,
            Box::new(client_b) as Box<dyn UninstantiatedMachine>,
        ])
        .with_rules(vec![Rule::always(no_double_booking)])
}

/// Scenarios 5/6 (spec.md §8): `always eventually` against a constant condition,
/// once satisfied and once violated.
fn liveness(condition_value: bool) -> Model {
    let spec = Spec::new("Light", Empty).define_states(["on"]).set_initial_state("on");
    let instance = spec.new_instance().expect("valid spec");
    let condition = Condition::constant("always-on", condition_value);
    Model::new()
        .with_state_machines(vec![Box::new(instance) as Box<dyn UninstantiatedMachine>])
        .with_rules(vec![Rule::always_eventually(condition)])
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("== Scenario 1: two-state cycle ==");
    two_state_cycle().test(ExploreOptions::default()).expect("exploration succeeds");

    println!("\n== Scenario 3: contended booking, no mutex ==");
    contended_booking(false).test(ExploreOptions::default()).expect("exploration succeeds");

    println!("\n== Scenario 4: contended booking, with mutex ==");
    contended_booking(true).test(ExploreOptions::default()).expect("exploration succeeds");

    println!("\n== Scenario 5: liveness holds ==");
    liveness(true).test(ExploreOptions::default()).expect("exploration succeeds");

    println!("\n== Scenario 6: liveness violated ==");
    liveness(false).test(ExploreOptions::default()).expect("exploration succeeds");
}
