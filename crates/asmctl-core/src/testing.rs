//! Scripted collaborators for tests
//!
//! [`ScriptedClient`] answers operation status queries from per-operation
//! scripts and records every call; [`ScriptedStates`] does the same for
//! resource state reads. Both are deterministic and never touch a network.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Mutex;

use crate::client::{ApiError, ManagementClient, RequestDescription, StateSource};
use crate::operation::{OperationId, OperationStatus};

type StatusResult = Result<OperationStatus, ApiError>;

/// Status answers for one operation
///
/// Steps are returned in order; once they run out, `then` is returned for
/// every further query.
#[derive(Debug, Clone)]
pub struct StatusScript {
    steps: VecDeque<StatusResult>,
    then: StatusResult,
}

impl StatusScript {
    /// Steps followed by `Succeeded` forever
    pub fn new(steps: impl IntoIterator<Item = StatusResult>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            then: Ok(OperationStatus::Succeeded),
        }
    }

    /// Steps given as statuses, followed by `Succeeded` forever
    pub fn statuses(steps: impl IntoIterator<Item = OperationStatus>) -> Self {
        Self::new(steps.into_iter().map(Ok))
    }

    /// Never leaves `InProgress`
    pub fn never_finishes() -> Self {
        Self {
            steps: VecDeque::new(),
            then: Ok(OperationStatus::InProgress),
        }
    }

    pub fn then(mut self, then: StatusResult) -> Self {
        self.then = then;
        self
    }

    fn next(&mut self) -> StatusResult {
        self.steps.pop_front().unwrap_or_else(|| self.then.clone())
    }
}

#[derive(Debug, Default)]
struct ClientState {
    next_id: u32,
    submit_failures: VecDeque<ApiError>,
    pending_scripts: VecDeque<StatusScript>,
    scripts: HashMap<OperationId, StatusScript>,
    submitted: Vec<RequestDescription>,
    status_queries: Vec<OperationId>,
}

/// Management client whose answers are scripted up front
#[derive(Debug, Default)]
pub struct ScriptedClient {
    state: Mutex<ClientState>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the status stream of the next operation handed out by `submit`
    pub fn next_operation(self, script: StatusScript) -> Self {
        self.lock().pending_scripts.push_back(script);
        self
    }

    /// Script the status stream of a known operation id
    pub fn operation(self, id: impl Into<OperationId>, script: StatusScript) -> Self {
        self.lock().scripts.insert(id.into(), script);
        self
    }

    /// Make the next `submit` call fail without issuing a handle
    pub fn fail_next_submit(self, error: ApiError) -> Self {
        self.lock().submit_failures.push_back(error);
        self
    }

    /// Requests submitted so far, in order
    pub fn submitted(&self) -> Vec<RequestDescription> {
        self.lock().submitted.clone()
    }

    /// Number of status queries issued across all operations
    pub fn status_queries(&self) -> usize {
        self.lock().status_queries.len()
    }

    /// Number of status queries issued for one operation
    pub fn status_queries_for(&self, id: &OperationId) -> usize {
        self.lock()
            .status_queries
            .iter()
            .filter(|queried| *queried == id)
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ManagementClient for ScriptedClient {
    async fn submit(&self, request: &RequestDescription) -> Result<OperationId, ApiError> {
        let mut state = self.lock();
        state.submitted.push(request.clone());
        if let Some(error) = state.submit_failures.pop_front() {
            return Err(error);
        }

        state.next_id += 1;
        let id = OperationId::new(format!("op-{}", state.next_id));
        if let Some(script) = state.pending_scripts.pop_front() {
            state.scripts.insert(id.clone(), script);
        }
        Ok(id)
    }

    async fn operation_status(&self, id: &OperationId) -> Result<OperationStatus, ApiError> {
        let mut state = self.lock();
        state.status_queries.push(id.clone());
        match state.scripts.get_mut(id) {
            Some(script) => script.next(),
            None => Ok(OperationStatus::Succeeded),
        }
    }
}

/// State source that replays a fixed sequence of reads per key
#[derive(Debug)]
pub struct ScriptedStates<K, S> {
    inner: Mutex<StatesInner<K, S>>,
}

#[derive(Debug)]
struct StatesInner<K, S> {
    sequences: HashMap<K, VecDeque<Result<S, ApiError>>>,
    fetches: HashMap<K, u32>,
}

impl<K, S> Default for ScriptedStates<K, S> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(StatesInner {
                sequences: HashMap::new(),
                fetches: HashMap::new(),
            }),
        }
    }
}

impl<K, S> ScriptedStates<K, S>
where
    K: Eq + Hash + Clone,
    S: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads returned for `key`; the last one repeats once the rest are used
    pub fn with_sequence(self, key: K, reads: impl IntoIterator<Item = Result<S, ApiError>>) -> Self {
        self.lock().sequences.insert(key, reads.into_iter().collect());
        self
    }

    pub fn with_states(self, key: K, states: impl IntoIterator<Item = S>) -> Self {
        self.with_sequence(key, states.into_iter().map(Ok))
    }

    pub fn fetches(&self, key: &K) -> u32 {
        self.lock().fetches.get(key).copied().unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StatesInner<K, S>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl<K, S> StateSource<K, S> for ScriptedStates<K, S>
where
    K: Eq + Hash + Clone + std::fmt::Display + Send + Sync,
    S: Clone + Send,
{
    async fn fetch_state(&self, key: &K) -> Result<S, ApiError> {
        let mut inner = self.lock();
        *inner.fetches.entry(key.clone()).or_insert(0) += 1;
        let Some(reads) = inner.sequences.get_mut(key) else {
            return Err(ApiError::http(404, "ResourceNotFound", format!("{key} not found")));
        };
        match reads.len() {
            0 => Err(ApiError::http(404, "ResourceNotFound", format!("{key} has no state"))),
            1 => reads[0].clone(),
            _ => reads.pop_front().unwrap_or_else(|| {
                Err(ApiError::Transport("state script exhausted".to_string()))
            }),
        }
    }
}
