//! Scriptable in-memory protocol for exercising statements without a server.
//!
//! [`MockProtocol`] records every call it receives and answers according to what the test
//! configured: update counts or a result set for executions, a bulk behaviour for batches,
//! failures for SQL matching a pattern, and a canned answer for metadata probes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use crate::compiler::CompiledQuery;
use crate::connection::{StatementEvent, StatementEventListener};
use crate::metadata::ParameterMetadata;
use crate::protocol::{ProbeMetadata, Protocol, ProtocolError, ServerPrepared};
use crate::results::{ResultSet, Results};
use crate::types::{ParameterSet, ParameterValue};

/// How [`MockProtocol`] answers `execute_batch_client`.
#[derive(Debug, Clone)]
pub enum BulkBehavior {
    /// Bulk is not possible; the statement falls back to one round trip per entry.
    Decline,
    /// Send a multi-row rewrite when the query allows it (one aggregate count), decline
    /// otherwise.
    Rewrite,
    /// Handle the batch in bulk, reporting one update per entry.
    PerEntry,
    /// Fail the whole bulk attempt.
    Fail(ProtocolError),
}

/// How [`MockProtocol`] answers metadata probes.
#[derive(Debug, Clone)]
pub enum ProbeBehavior {
    Describe(ProbeMetadata),
    OpenFails(ProtocolError),
    DescribeFails(ProtocolError),
}

#[derive(Debug)]
struct MockState {
    bulk: BulkBehavior,
    probe: ProbeBehavior,
    update_count: i64,
    next_insert_id: i64,
    result_set: Option<ResultSet>,
    delay: Option<Duration>,
    bulk_delay: Option<Duration>,
    fail_patterns: Vec<(Regex, ProtocolError)>,
    fail_calls: HashMap<usize, ProtocolError>,
    interrupt_after_polls: Option<usize>,
    executed: Vec<String>,
    executed_params: Vec<Vec<ParameterValue>>,
    rewritten: Vec<String>,
    server_timeouts: Vec<Option<Duration>>,
    bulk_attempts: usize,
    bulk_long_data: Vec<bool>,
    probes_opened: usize,
    probes_closed: usize,
    interrupt_polls: usize,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            bulk: BulkBehavior::Decline,
            probe: ProbeBehavior::Describe(ProbeMetadata {
                result: None,
                parameters: ParameterMetadata::Known(Vec::new()),
            }),
            update_count: 1,
            next_insert_id: 1,
            result_set: None,
            delay: None,
            bulk_delay: None,
            fail_patterns: Vec::new(),
            fail_calls: HashMap::new(),
            interrupt_after_polls: None,
            executed: Vec::new(),
            executed_params: Vec::new(),
            rewritten: Vec::new(),
            server_timeouts: Vec::new(),
            bulk_attempts: 0,
            bulk_long_data: Vec::new(),
            probes_opened: 0,
            probes_closed: 0,
            interrupt_polls: 0,
        }
    }
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// In-memory [`Protocol`] driven by test scripts.
#[derive(Debug)]
pub struct MockProtocol {
    thread_id: u64,
    primary: bool,
    no_backslash_escapes: bool,
    server_timeout: bool,
    state: Arc<Mutex<MockState>>,
}

impl Default for MockProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProtocol {
    #[must_use]
    pub fn new() -> Self {
        Self {
            thread_id: 1,
            primary: true,
            no_backslash_escapes: false,
            server_timeout: false,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    #[must_use]
    pub fn with_thread_id(mut self, thread_id: u64) -> Self {
        self.thread_id = thread_id;
        self
    }

    #[must_use]
    pub fn with_primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }

    #[must_use]
    pub fn with_no_backslash_escapes(mut self, enabled: bool) -> Self {
        self.no_backslash_escapes = enabled;
        self
    }

    /// Claim the server enforces statement timeouts.
    #[must_use]
    pub fn with_server_timeout(mut self, enabled: bool) -> Self {
        self.server_timeout = enabled;
        self
    }

    pub fn set_bulk(&self, behavior: BulkBehavior) {
        lock(&self.state).bulk = behavior;
    }

    pub fn set_probe(&self, behavior: ProbeBehavior) {
        lock(&self.state).probe = behavior;
    }

    /// Count reported by each successful update execution.
    pub fn set_update_count(&self, count: i64) {
        lock(&self.state).update_count = count;
    }

    /// Answer every execution with `result_set` instead of an update count.
    pub fn set_result_set(&self, result_set: Option<ResultSet>) {
        lock(&self.state).result_set = result_set;
    }

    /// Sleep this long inside each execution.
    pub fn set_delay(&self, delay: Option<Duration>) {
        lock(&self.state).delay = delay;
    }

    /// Sleep for `delay` at the start of every bulk batch attempt.
    pub fn set_bulk_delay(&self, delay: Option<Duration>) {
        lock(&self.state).bulk_delay = delay;
    }

    /// Fail executions whose rendered SQL matches `pattern`.
    ///
    /// # Panics
    /// When `pattern` is not a valid regex.
    pub fn fail_matching(&self, pattern: &str, error: ProtocolError) {
        let regex = Regex::new(pattern).expect("invalid fail pattern");
        lock(&self.state).fail_patterns.push((regex, error));
    }

    /// Fail the `call`-th execution (1-based, counted across the mock's lifetime).
    pub fn fail_call(&self, call: usize, error: ProtocolError) {
        lock(&self.state).fail_calls.insert(call, error);
    }

    /// Report an interruption once `stop_if_interrupted` has been polled `polls` times.
    pub fn interrupt_after_polls(&self, polls: usize) {
        lock(&self.state).interrupt_after_polls = Some(polls);
    }

    /// Rendered SQL of every `execute_query` call, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        lock(&self.state).executed.clone()
    }

    #[must_use]
    pub fn executed_params(&self) -> Vec<Vec<ParameterValue>> {
        lock(&self.state).executed_params.clone()
    }

    /// Multi-row statements sent by the `Rewrite` bulk behaviour.
    #[must_use]
    pub fn rewritten(&self) -> Vec<String> {
        lock(&self.state).rewritten.clone()
    }

    /// Timeout passed with every `execute_query` call.
    #[must_use]
    pub fn server_timeouts(&self) -> Vec<Option<Duration>> {
        lock(&self.state).server_timeouts.clone()
    }

    #[must_use]
    pub fn bulk_attempts(&self) -> usize {
        lock(&self.state).bulk_attempts
    }

    /// `has_long_data` flag of every bulk attempt.
    #[must_use]
    pub fn bulk_long_data(&self) -> Vec<bool> {
        lock(&self.state).bulk_long_data.clone()
    }

    #[must_use]
    pub fn probes_opened(&self) -> usize {
        lock(&self.state).probes_opened
    }

    #[must_use]
    pub fn probes_closed(&self) -> usize {
        lock(&self.state).probes_closed
    }

    #[must_use]
    pub fn interrupt_polls(&self) -> usize {
        lock(&self.state).interrupt_polls
    }
}

fn render(query: &CompiledQuery, params: &[ParameterValue]) -> String {
    query
        .render(params)
        .unwrap_or_else(|_| query.sql().to_owned())
}

#[async_trait]
impl Protocol for MockProtocol {
    fn is_primary_connection(&self) -> bool {
        self.primary
    }

    fn server_thread_id(&self) -> u64 {
        self.thread_id
    }

    fn no_backslash_escapes(&self) -> bool {
        self.no_backslash_escapes
    }

    fn supports_server_timeout(&self) -> bool {
        self.server_timeout
    }

    async fn execute_query(
        &self,
        _primary: bool,
        results: &mut Results,
        query: &CompiledQuery,
        params: &[ParameterValue],
        timeout: Option<Duration>,
    ) -> Result<(), ProtocolError> {
        let sql = render(query, params);
        let delay = {
            let mut state = lock(&self.state);
            state.executed.push(sql.clone());
            state.executed_params.push(params.to_vec());
            state.server_timeouts.push(timeout);
            state.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = lock(&self.state);
        let call = state.executed.len();
        if let Some(err) = state.fail_calls.get(&call) {
            return Err(err.clone());
        }
        if let Some((_, err)) = state.fail_patterns.iter().find(|(re, _)| re.is_match(&sql)) {
            return Err(err.clone());
        }
        match state.result_set.clone() {
            Some(result_set) => results.add_result_set(result_set),
            None => {
                let insert_id = state.next_insert_id;
                state.next_insert_id += 1;
                results.add_stats(state.update_count, insert_id);
            }
        }
        Ok(())
    }

    async fn execute_batch_client(
        &self,
        _primary: bool,
        results: &mut Results,
        query: &CompiledQuery,
        entries: &[ParameterSet],
        has_long_data: bool,
    ) -> Result<bool, ProtocolError> {
        let delay = lock(&self.state).bulk_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = lock(&self.state);
        state.bulk_attempts += 1;
        state.bulk_long_data.push(has_long_data);
        match state.bulk.clone() {
            BulkBehavior::Decline => Ok(false),
            BulkBehavior::Fail(err) => Err(err),
            BulkBehavior::PerEntry => {
                for _ in entries {
                    let insert_id = state.next_insert_id;
                    state.next_insert_id += 1;
                    results.add_stats(state.update_count, insert_id);
                }
                Ok(true)
            }
            BulkBehavior::Rewrite => match query.render_multi_values(entries) {
                Some(sql) => {
                    state.rewritten.push(sql);
                    let rows = i64::try_from(entries.len()).unwrap_or(i64::MAX);
                    let affected = state.update_count.saturating_mul(rows);
                    results.set_rewritten(true);
                    results.add_stats(affected, state.next_insert_id);
                    Ok(true)
                }
                None => Ok(false),
            },
        }
    }

    fn stop_if_interrupted(&self) -> Result<(), ProtocolError> {
        let mut state = lock(&self.state);
        state.interrupt_polls += 1;
        match state.interrupt_after_polls {
            Some(limit) if state.interrupt_polls > limit => Err(ProtocolError::interrupted()),
            _ => Ok(()),
        }
    }

    async fn open_probe(&self, _sql: &str) -> Result<Box<dyn ServerPrepared>, ProtocolError> {
        let mut state = lock(&self.state);
        if let ProbeBehavior::OpenFails(err) = &state.probe {
            return Err(err.clone());
        }
        state.probes_opened += 1;
        Ok(Box::new(MockServerPrepared {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockServerPrepared {
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl ServerPrepared for MockServerPrepared {
    async fn describe(&mut self) -> Result<ProbeMetadata, ProtocolError> {
        match &lock(&self.state).probe {
            ProbeBehavior::Describe(described) => Ok(described.clone()),
            ProbeBehavior::OpenFails(err) | ProbeBehavior::DescribeFails(err) => Err(err.clone()),
        }
    }

    async fn close(&mut self) -> Result<(), ProtocolError> {
        lock(&self.state).probes_closed += 1;
        Ok(())
    }
}

/// Listener that keeps every event it receives.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<StatementEvent>>,
}

impl RecordingListener {
    #[must_use]
    pub fn events(&self) -> Vec<StatementEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl StatementEventListener for RecordingListener {
    fn statement_closed(&self, event: &StatementEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
