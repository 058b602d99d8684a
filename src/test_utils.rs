//! Test utilities and recording implementations.
//!
//! Every adapter and hook here writes to one shared [`Recorder`], so tests
//! can assert the exact order of side effects across all collaborators.
//! Any step can be scripted to fail, and any async step can be scripted to
//! stall forever so a test can cancel while the invocation is suspended there.

use std::collections::HashSet;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use crate::adapters::{LocalActions, RemoteCall, RequestLifecycle};
use crate::bus::{ActionBus, Emission};
use crate::error::{Result, SagaError};
use crate::hooks::SagaHooks;
use crate::mutation::Mutation;
use crate::orchestration::{run_entity_mutation, EntitySaga, SagaOptions};

/// Action type of apply actions built by [`MockActions`].
pub const APPLY_ACTION_TYPE: &str = "@namespace/entity/APPLY";
/// Action type of compensate actions built by [`MockActions`].
pub const COMPENSATE_ACTION_TYPE: &str = "@namespace/entity/COMPENSATE";
/// Id of the request handle created by [`MockLifecycle`].
pub const REQUEST_ID: &str = "req-1";

/// Mutation over JSON payloads.
///
/// Identity is the `id` field (string or number); the fallback is the
/// `name` field.
pub struct JsonMutation;

fn id_field(value: &Value) -> Option<String> {
    match value.get("id") {
        Some(Value::String(id)) => Some(id.clone()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    }
}

impl Mutation for JsonMutation {
    type Entity = Value;
    type Options = Value;
    type Output = Value;
    type Request = Value;
    type Action = Value;
    type Id = String;

    fn entity_id(entity: &Value) -> Option<String> {
        id_field(entity)
    }

    fn output_id(output: &Value) -> Option<String> {
        id_field(output)
    }

    fn fallback_id(entity: &Value) -> String {
        entity
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }
}

/// Shared call log and step script.
#[derive(Default)]
pub struct Recorder {
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, String>>,
    stalls: Mutex<HashSet<String>>,
    vetoes: Mutex<HashSet<String>>,
    stalled: Notify,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `step` fail with `message`.
    pub fn fail_on(&self, step: &str, message: &str) {
        lock(&self.failures).insert(step.to_string(), message.to_string());
    }

    /// Make `step` suspend forever after recording itself.
    pub fn stall_on(&self, step: &str) {
        lock(&self.stalls).insert(step.to_string());
    }

    /// Make the predicate hook `step` return false.
    pub fn veto(&self, step: &str) {
        lock(&self.vetoes).insert(step.to_string());
    }

    /// Resolves once an invocation is suspended at a stalled step.
    pub async fn wait_until_stalled(&self) {
        self.stalled.notified().await;
    }

    pub fn record(&self, entry: impl Into<String>) {
        lock(&self.calls).push(entry.into());
    }

    /// Every recorded entry, `step` or `step:detail`.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Recorded step names without details.
    pub fn steps(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|entry| match entry.split_once(':') {
                Some((step, _)) => step.to_string(),
                None => entry,
            })
            .collect()
    }

    pub fn count(&self, step: &str) -> usize {
        self.steps().iter().filter(|s| s.as_str() == step).count()
    }

    pub fn called(&self, step: &str) -> bool {
        self.count(step) > 0
    }

    pub fn position(&self, step: &str) -> Option<usize> {
        self.steps().iter().position(|s| s.as_str() == step)
    }

    /// Details recorded for `step`, in call order.
    pub fn details(&self, step: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|entry| match entry.split_once(':') {
                Some((s, detail)) if s == step => Some(detail.to_string()),
                _ => None,
            })
            .collect()
    }

    fn vetoed(&self, step: &str) -> bool {
        lock(&self.vetoes).contains(step)
    }

    fn scripted_failure(&self, step: &str) -> Result<()> {
        match lock(&self.failures).get(step) {
            Some(message) => Err(SagaError::failed(message.clone())),
            None => Ok(()),
        }
    }

    fn entry(step: &str, detail: Option<&str>) -> String {
        match detail {
            Some(detail) => format!("{step}:{detail}"),
            None => step.to_string(),
        }
    }

    /// Record a synchronous step and apply its scripted failure.
    pub fn step_sync(&self, step: &str, detail: Option<&str>) -> Result<()> {
        self.record(Self::entry(step, detail));
        self.scripted_failure(step)
    }

    /// Record an async step, then stall or fail as scripted.
    pub async fn step(&self, step: &str, detail: Option<&str>) -> Result<()> {
        self.record(Self::entry(step, detail));
        tokio::task::yield_now().await;

        let stall = lock(&self.stalls).contains(step);
        if stall {
            self.stalled.notify_one();
            std::future::pending::<()>().await;
        }
        self.scripted_failure(step)
    }
}

fn request_id(request: &Value) -> String {
    request
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string()
}

/// Remote call resolving to a fixed response.
pub struct MockRemote {
    recorder: Arc<Recorder>,
    response: Value,
}

impl MockRemote {
    pub fn new(recorder: Arc<Recorder>, response: Value) -> Self {
        Self { recorder, response }
    }
}

#[async_trait]
impl RemoteCall<JsonMutation> for MockRemote {
    async fn dispatch(&self, _entity: &Value, _options: &Value) -> Result<Value> {
        self.recorder.step("dispatch", None).await?;
        Ok(self.response.clone())
    }

    async fn compensate(&self, _entity: &Value, result: Option<&Value>) -> Result<()> {
        let detail = if result.is_some() { "result" } else { "absent" };
        self.recorder.step("compensate_remote", Some(detail)).await
    }
}

/// Builds `{type, payload}` actions.
pub struct MockActions {
    recorder: Arc<Recorder>,
}

impl MockActions {
    pub fn new(recorder: Arc<Recorder>) -> Self {
        Self { recorder }
    }
}

impl LocalActions<JsonMutation> for MockActions {
    fn apply_action(&self, result: &Value) -> Result<Value> {
        self.recorder.step_sync("build_apply", None)?;
        Ok(json!({"type": APPLY_ACTION_TYPE, "payload": result}))
    }

    fn compensate_action(&self, id: String) -> Result<Value> {
        self.recorder.step_sync("build_compensate", Some(&id))?;
        Ok(json!({"type": COMPENSATE_ACTION_TYPE, "payload": {"id": id}}))
    }
}

/// Request lifecycle creating an in-progress request record.
pub struct MockLifecycle {
    recorder: Arc<Recorder>,
}

impl MockLifecycle {
    pub fn new(recorder: Arc<Recorder>) -> Self {
        Self { recorder }
    }
}

#[async_trait]
impl RequestLifecycle<JsonMutation> for MockLifecycle {
    async fn create(&self, entity: &Value) -> Result<Value> {
        self.recorder.step("create_request", None).await?;
        Ok(json!({
            "id": REQUEST_ID,
            "status": "in-progress",
            "body": entity,
        }))
    }

    async fn complete(&self, request: &Value) -> Result<()> {
        self.recorder
            .step("complete_request", Some(&request_id(request)))
            .await
    }

    async fn error(&self, request: Option<&Value>) -> Result<()> {
        let id = request.map(request_id).unwrap_or_else(|| "none".to_string());
        self.recorder.step("error_request", Some(&id)).await
    }

    async fn cancel(&self, request: &Value) -> Result<()> {
        self.recorder
            .step("cancel_request", Some(&request_id(request)))
            .await
    }
}

/// Hook set recording every invocation.
pub struct RecordingHooks {
    recorder: Arc<Recorder>,
}

impl RecordingHooks {
    pub fn new(recorder: Arc<Recorder>) -> Self {
        Self { recorder }
    }

    async fn predicate(&self, step: &str) -> Result<bool> {
        self.recorder.step(step, None).await?;
        Ok(!self.recorder.vetoed(step))
    }
}

#[async_trait]
impl SagaHooks<JsonMutation> for RecordingHooks {
    async fn on_start(&self, _entity: &Value) -> Result<()> {
        self.recorder.step("on_start", None).await
    }

    async fn before_remote_call(&self, _entity: &Value) -> Result<()> {
        self.recorder.step("before_remote_call", None).await
    }

    async fn should_perform_remote_call(&self, _entity: &Value) -> Result<bool> {
        self.predicate("should_perform_remote_call").await
    }

    async fn after_remote_call(&self, _result: &Value, _entity: &Value) -> Result<()> {
        self.recorder.step("after_remote_call", None).await
    }

    async fn before_apply_local_action(&self, _result: &Value, _entity: &Value) -> Result<()> {
        self.recorder.step("before_apply_local_action", None).await
    }

    async fn should_apply_local_action(&self, _result: &Value, _entity: &Value) -> Result<bool> {
        self.predicate("should_apply_local_action").await
    }

    async fn after_apply_local_action(
        &self,
        _applied: &Value,
        _result: &Value,
        _entity: &Value,
    ) -> Result<()> {
        self.recorder.step("after_apply_local_action", None).await
    }

    async fn on_finish(&self, _entity: &Value) -> Result<()> {
        self.recorder.step("on_finish", None).await
    }

    async fn on_error(&self, error: &SagaError) -> Result<()> {
        self.recorder
            .step("on_error", Some(&error.to_string()))
            .await
    }

    async fn on_cancel(&self, _entity: &Value) -> Result<()> {
        self.recorder.step("on_cancel", None).await
    }
}

/// Bus recording `emit:apply` / `emit:compensate` into the call log.
pub struct RecordingBus {
    recorder: Arc<Recorder>,
}

impl RecordingBus {
    pub fn new(recorder: Arc<Recorder>) -> Self {
        Self { recorder }
    }
}

impl ActionBus<Value> for RecordingBus {
    fn publish(&self, emission: Arc<Emission<Value>>) {
        self.recorder.record(format!("emit:{}", emission.kind()));
    }
}

/// Saga wired to recording collaborators, with emissions logged.
pub fn recording_saga(recorder: &Arc<Recorder>, response: Value) -> EntitySaga<JsonMutation> {
    recording_saga_with(recorder, response, SagaOptions::default())
}

/// Like [`recording_saga`], with caller options. A bus already set in
/// `options` is kept instead of the recording one.
pub fn recording_saga_with(
    recorder: &Arc<Recorder>,
    response: Value,
    options: SagaOptions<JsonMutation>,
) -> EntitySaga<JsonMutation> {
    let options = match options.bus {
        Some(_) => options,
        None => options.bus(Arc::new(RecordingBus::new(recorder.clone()))),
    };

    run_entity_mutation(
        Arc::new(MockRemote::new(recorder.clone(), response)),
        Arc::new(MockActions::new(recorder.clone())),
        Arc::new(MockLifecycle::new(recorder.clone())),
        Arc::new(RecordingHooks::new(recorder.clone())),
        options,
    )
}
