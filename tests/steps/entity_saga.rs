//! Entity saga step definitions.
//!
//! Drives a saga wired to the recording collaborators from `test_utils` and
//! asserts on the shared call log and the emitted actions.

use std::sync::Arc;
use std::time::Duration;

use cucumber::gherkin::Step;
use cucumber::{given, then, when, World};
use entity_saga::test_utils::{recording_saga_with, Recorder};
use entity_saga::{Emission, SagaOptions, SagaOutcome};
use serde_json::{json, Value};

#[derive(World)]
#[world(init = Self::new)]
pub struct EntitySagaWorld {
    recorder: Arc<Recorder>,
    entity: Value,
    response: Value,
    timeout: Option<Duration>,
    outcome: Option<SagaOutcome>,
    error: Option<String>,
    emissions: Vec<Emission<Value>>,
}

impl std::fmt::Debug for EntitySagaWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitySagaWorld")
            .field("entity", &self.entity)
            .field("outcome", &self.outcome)
            .field("error", &self.error)
            .field("calls", &self.recorder.calls())
            .finish()
    }
}

impl EntitySagaWorld {
    fn new() -> Self {
        Self {
            recorder: Recorder::new(),
            entity: Value::Null,
            response: Value::Null,
            timeout: None,
            outcome: None,
            error: None,
            emissions: Vec::new(),
        }
    }

    fn options(&self) -> SagaOptions<entity_saga::test_utils::JsonMutation> {
        let options = SagaOptions::default().name("feature-saga");
        match self.timeout {
            Some(timeout) => options.timeout(timeout),
            None => options,
        }
    }

    fn count(&self, compensate: bool) -> usize {
        self.emissions
            .iter()
            .filter(|e| e.is_compensate() == compensate)
            .count()
    }

    fn compensate_action(&self) -> &Value {
        self.emissions
            .iter()
            .find(|e| e.is_compensate())
            .map(Emission::action)
            .expect("a compensate action was emitted")
    }

    async fn finish(&mut self, task: entity_saga::SagaTask<Value>) {
        match task.collect().await {
            Ok((outcome, emissions)) => {
                self.outcome = Some(outcome);
                self.emissions = emissions;
            }
            Err(e) => self.error = Some(e.message()),
        }
    }
}

fn parse_outcome(name: &str) -> SagaOutcome {
    match name {
        "completed" => SagaOutcome::Completed { applied: true },
        "skipped" => SagaOutcome::Skipped,
        "failed" => SagaOutcome::Failed,
        "cancelled" => SagaOutcome::Cancelled,
        other => panic!("unknown outcome {other}"),
    }
}

// ==========================================================================
// Given Steps
// ==========================================================================

#[given(expr = "an entity named {string}")]
async fn given_entity_named(world: &mut EntitySagaWorld, name: String) {
    world.entity = json!({"name": name});
}

#[given(expr = "an entity with id {string} named {string}")]
async fn given_entity_with_id(world: &mut EntitySagaWorld, id: String, name: String) {
    world.entity = json!({"id": id, "name": name});
}

#[given(expr = "the remote call resolves to id {string} named {string}")]
async fn given_remote_resolves(world: &mut EntitySagaWorld, id: String, name: String) {
    world.response = json!({"id": id, "name": name});
}

#[given(expr = "{string} fails with {string}")]
async fn given_step_fails(world: &mut EntitySagaWorld, name: String, message: String) {
    world.recorder.fail_on(&name, &message);
}

#[given(expr = "{string} vetoes")]
async fn given_step_vetoes(world: &mut EntitySagaWorld, name: String) {
    world.recorder.veto(&name);
}

#[given(expr = "{string} stalls")]
async fn given_step_stalls(world: &mut EntitySagaWorld, name: String) {
    world.recorder.stall_on(&name);
}

#[given(expr = "a timeout of {int} milliseconds")]
async fn given_timeout(world: &mut EntitySagaWorld, millis: u64) {
    world.timeout = Some(Duration::from_millis(millis));
}

// ==========================================================================
// When Steps
// ==========================================================================

#[when("the saga runs to completion")]
async fn when_saga_runs(world: &mut EntitySagaWorld) {
    let saga = recording_saga_with(&world.recorder, world.response.clone(), world.options());
    let task = saga.spawn(world.entity.clone(), json!({}));
    world.finish(task).await;
}

#[when("the saga is cancelled before it starts")]
async fn when_cancelled_before_start(world: &mut EntitySagaWorld) {
    let saga = recording_saga_with(&world.recorder, world.response.clone(), world.options());
    let task = saga.spawn(world.entity.clone(), json!({}));
    task.cancel();
    world.finish(task).await;
}

#[when("the saga is cancelled while stalled")]
async fn when_cancelled_while_stalled(world: &mut EntitySagaWorld) {
    let saga = recording_saga_with(&world.recorder, world.response.clone(), world.options());
    let task = saga.spawn(world.entity.clone(), json!({}));
    world.recorder.wait_until_stalled().await;
    task.cancel();
    world.finish(task).await;
}

// ==========================================================================
// Then Steps
// ==========================================================================

#[then(expr = "the outcome is {string}")]
async fn then_outcome(world: &mut EntitySagaWorld, name: String) {
    assert_eq!(world.outcome, Some(parse_outcome(&name)), "{world:?}");
}

#[then(expr = "exactly {int} apply action(s) is/are emitted")]
async fn then_apply_count(world: &mut EntitySagaWorld, expected: usize) {
    assert_eq!(world.count(false), expected);
}

#[then(expr = "exactly {int} compensate action(s) is/are emitted")]
async fn then_compensate_count(world: &mut EntitySagaWorld, expected: usize) {
    assert_eq!(world.count(true), expected);
}

#[then("the apply action carries the remote result")]
async fn then_apply_payload(world: &mut EntitySagaWorld) {
    let apply = world
        .emissions
        .iter()
        .find(|e| e.is_apply())
        .expect("an apply action was emitted");
    assert_eq!(apply.action()["payload"], world.response);
}

#[then(expr = "the compensate action carries id {string}")]
async fn then_compensate_id(world: &mut EntitySagaWorld, id: String) {
    assert_eq!(world.compensate_action()["payload"]["id"], json!(id));
}

#[then(expr = "{string} is recorded {int} time(s)")]
async fn then_recorded_times(world: &mut EntitySagaWorld, name: String, expected: usize) {
    assert_eq!(world.recorder.count(&name), expected, "{world:?}");
}

#[then(expr = "{string} is recorded before {string}")]
async fn then_recorded_before(world: &mut EntitySagaWorld, first: String, second: String) {
    let first_at = world.recorder.position(&first).expect("first step recorded");
    let second_at = world
        .recorder
        .position(&second)
        .expect("second step recorded");
    assert!(first_at < second_at, "{world:?}");
}

#[then(expr = "{string} received {string}")]
async fn then_received(world: &mut EntitySagaWorld, name: String, detail: String) {
    assert_eq!(world.recorder.details(&name), vec![detail]);
}

#[then(expr = "the request lifecycle error step received {string}")]
async fn then_error_request(world: &mut EntitySagaWorld, request_id: String) {
    assert_eq!(world.recorder.details("error_request"), vec![request_id]);
}

#[then(expr = "the host observes the error {string}")]
async fn then_host_error(world: &mut EntitySagaWorld, message: String) {
    assert_eq!(world.error.as_deref(), Some(message.as_str()));
    assert!(world.outcome.is_none());
}

#[then("the steps are recorded in order:")]
async fn then_steps_in_order(world: &mut EntitySagaWorld, step: &Step) {
    let table = step.table.as_ref().expect("step table");
    let expected: Vec<String> = table
        .rows
        .iter()
        .skip(1)
        .map(|row| row[0].clone())
        .collect();

    let recorded: Vec<String> = world
        .recorder
        .steps()
        .into_iter()
        .filter(|s| expected.contains(s))
        .collect();

    assert_eq!(recorded, expected);
}
