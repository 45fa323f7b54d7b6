//! # Action Dispatcher
//!
//! Collects enqueued actions, resolves cache hits from the action store, runs client actions
//! locally and sends server actions to the transport in partitioned batches. Responses are
//! applied in response order; each action's callback fires exactly once.
//!
//! ## Locking
//!
//! An action lock is never held while taking the queue lock. The abort coordinator releases
//! its group map before it locks members. Callbacks run with their own action locked, so a
//! callback must not lock its own handle or abort a group it still belongs to.

use super::queue::{ActionQueue, Partition};
use super::transport::{ActionResponse, ActionTransport, TransportBatch};
use crate::abort::{AbortGroupCoordinator, AbortGroupId};
use crate::action::{Action, ActionFactory, ActionHandle, ActionState, TerminalState};
use crate::config::DispatchConfig;
use crate::constants::{is_error_reporting_descriptor, REFRESH_BEGIN_EVENT, REFRESH_END_EVENT};
use crate::context::ExecutionContext;
use crate::diagnostics::DiagnosticsReporter;
use crate::error::{ActionError, Result};
use crate::events::{ActionLifecycleEvent, EventPublisher, PublishedEvent};
use crate::logging::{log_action_operation, log_dispatch_operation, log_error};
use crate::storage::{ActionStore, StoredAction};
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What `enqueue` did with an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Waiting in a server partition
    Queued(Partition),
    /// Waiting in the client lane
    Local,
    /// Served from the action store and already finished
    CacheHit,
    /// Held back until the current cycle finishes
    Deferred,
}

/// Counters for one or more dispatch cycles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub local_actions: usize,
    pub batches_sent: usize,
    pub actions_sent: usize,
    pub actions_completed: usize,
    pub reports_enqueued: usize,
    pub chained_promoted: usize,
}

impl CycleStats {
    fn merge(&mut self, other: CycleStats) {
        self.local_actions += other.local_actions;
        self.batches_sent += other.batches_sent;
        self.actions_sent += other.actions_sent;
        self.actions_completed += other.actions_completed;
        self.reports_enqueued += other.reports_enqueued;
        self.chained_promoted += other.chained_promoted;
    }
}

struct PreparedBatch {
    batch: TransportBatch,
    handles: Vec<ActionHandle>,
}

pub struct ActionDispatcher {
    config: DispatchConfig,
    factory: ActionFactory,
    transport: Arc<dyn ActionTransport>,
    store: Arc<dyn ActionStore>,
    context: Arc<dyn ExecutionContext>,
    reporter: Arc<dyn DiagnosticsReporter>,
    abort_groups: AbortGroupCoordinator,
    queue: Mutex<ActionQueue>,
    in_flight: DashMap<String, ActionHandle>,
    events: EventPublisher,
    work_available: Notify,
}

impl ActionDispatcher {
    pub fn new(
        config: DispatchConfig,
        factory: ActionFactory,
        transport: Arc<dyn ActionTransport>,
        store: Arc<dyn ActionStore>,
        context: Arc<dyn ExecutionContext>,
        reporter: Arc<dyn DiagnosticsReporter>,
    ) -> Self {
        info!(
            max_batch_size = config.max_batch_size,
            storage = %store.name(),
            report_failures = config.report_failures,
            "Creating action dispatcher"
        );
        let events = EventPublisher::new(config.event_channel_capacity);
        Self {
            config,
            factory,
            transport,
            store,
            context,
            reporter,
            abort_groups: AbortGroupCoordinator::new(),
            queue: Mutex::new(ActionQueue::new()),
            in_flight: DashMap::new(),
            events,
            work_available: Notify::new(),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn factory(&self) -> &ActionFactory {
        &self.factory
    }

    pub fn store(&self) -> &Arc<dyn ActionStore> {
        &self.store
    }

    pub fn context(&self) -> &Arc<dyn ExecutionContext> {
        &self.context
    }

    pub fn abort_groups(&self) -> &AbortGroupCoordinator {
        &self.abort_groups
    }

    pub fn events(&self) -> &EventPublisher {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.events.subscribe()
    }

    /// Create a `NEW` action handle for `descriptor`
    pub fn create_action(&self, descriptor: &str) -> Result<ActionHandle> {
        Ok(self.factory.create_handle(descriptor)?)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn has_pending(&self) -> bool {
        self.queue.lock().has_pending()
    }

    pub fn pending_count(&self) -> usize {
        let queue = self.queue.lock();
        queue.ready_len() + queue.chained_len()
    }

    /// Submit an action.
    ///
    /// Abortable actions join the current abort group. A storable action whose result is in
    /// the store is finished synchronously from the stored entry. Everything else waits for
    /// the next cycle.
    pub fn enqueue(&self, handle: &ActionHandle) -> Result<EnqueueOutcome> {
        let mut action = handle.lock();
        if action.get_state() != ActionState::New {
            return Err(ActionError::NotEnqueueable {
                id: handle.id().to_string(),
                state: action.get_state(),
            }
            .into());
        }

        let abortable_id = self.abort_groups.assign(handle, &mut action);
        let descriptor = action.descriptor().to_string();

        if action.get_def().is_client_action() {
            drop(action);
            self.queue.lock().push_client(handle.clone());
            self.events.publish(ActionLifecycleEvent::Enqueued {
                action_id: handle.id().to_string(),
                descriptor,
                partition: None,
            });
            self.work_available.notify_one();
            return Ok(EnqueueOutcome::Local);
        }

        if action.consults_store() {
            if let Some((storage_key, stored)) = self.lookup_stored(&action) {
                if let Some(group) = abortable_id {
                    self.abort_groups.release(group, handle.id());
                }
                action.update_from_stored(&stored);
                action.finish_action(self.context.as_ref());
                let state = action.get_state();
                drop(action);

                debug!(action_id = %handle.id(), storage_key = %storage_key, "Action served from storage");
                self.events.publish(ActionLifecycleEvent::CacheHit {
                    action_id: handle.id().to_string(),
                    storage_key,
                });
                self.events.publish(ActionLifecycleEvent::Completed {
                    action_id: handle.id().to_string(),
                    state,
                    from_storage: true,
                });
                return Ok(EnqueueOutcome::CacheHit);
            }
        }

        let partition = Partition::classify(action.is_background(), action.is_exclusive());
        drop(action);

        self.queue.lock().push(partition, handle.clone());
        log_action_operation(
            "enqueue",
            handle.id(),
            &descriptor,
            "NEW",
            Some(&partition.to_string()),
        );
        self.events.publish(ActionLifecycleEvent::Enqueued {
            action_id: handle.id().to_string(),
            descriptor,
            partition: Some(partition),
        });
        self.work_available.notify_one();
        Ok(EnqueueOutcome::Queued(partition))
    }

    fn lookup_stored(&self, action: &Action) -> Option<(String, StoredAction)> {
        let storage_key = match action.get_storage_key() {
            Ok(key) => key,
            Err(error) => {
                warn!(action_id = %action.get_id(), error = %error, "Unable to build storage key");
                action.handle_storage_error(&error);
                return None;
            }
        };
        match self.store.get(&storage_key) {
            Ok(Some(stored)) => Some((storage_key, stored)),
            Ok(None) => None,
            Err(error) => {
                warn!(
                    action_id = %action.get_id(),
                    storage = %self.store.name(),
                    error = %error,
                    "Action store lookup failed; dispatching"
                );
                action.handle_storage_error(&error);
                None
            }
        }
    }

    /// Mark the action chained and run it after the current cycle
    pub fn set_chained(&self, handle: &ActionHandle) -> Result<EnqueueOutcome> {
        handle.lock().set_chained();
        self.run_after(handle)
    }

    /// Enqueue the action once the current cycle finishes
    pub fn run_after(&self, handle: &ActionHandle) -> Result<EnqueueOutcome> {
        let state = handle.state();
        if state != ActionState::New {
            return Err(ActionError::NotEnqueueable {
                id: handle.id().to_string(),
                state,
            }
            .into());
        }
        self.queue.lock().push_chained(handle.clone());
        self.work_available.notify_one();
        Ok(EnqueueOutcome::Deferred)
    }

    /// Start a new abort group, aborting every unfinished member of older groups
    pub fn begin_abortable_transaction(&self) -> AbortGroupId {
        let next = self.abort_groups.begin_transaction();
        for group in self.abort_groups.groups_before(next) {
            self.abort_group(group);
        }
        next
    }

    /// Abort every unfinished member of `group`; returns how many were aborted
    pub fn abort_group(&self, group: AbortGroupId) -> usize {
        let aborted = self.abort_groups.abort_group(group);
        for handle in &aborted {
            self.in_flight.remove(handle.id());
            self.events.publish(ActionLifecycleEvent::Aborted {
                action_id: handle.id().to_string(),
                abortable_id: Some(group),
            });
        }
        aborted.len()
    }

    /// Run one dispatch cycle
    pub async fn process_cycle(&self) -> CycleStats {
        let mut stats = CycleStats {
            reports_enqueued: self.dispatch_failure_reports(),
            ..CycleStats::default()
        };

        let client_actions = self.queue.lock().take_client();
        for handle in client_actions {
            if self.run_client_action(&handle) {
                stats.local_actions += 1;
                stats.actions_completed += 1;
            }
        }
        stats.reports_enqueued += self.dispatch_failure_reports();

        let partitions: Vec<(Partition, Vec<ActionHandle>)> = {
            let mut queue = self.queue.lock();
            Partition::ALL
                .into_iter()
                .map(|partition| (partition, queue.take_partition(partition)))
                .collect()
        };

        let mut exclusive = Vec::new();
        let mut concurrent = Vec::new();
        for (partition, handles) in partitions {
            for chunk in handles.chunks(self.config.max_batch_size.max(1)) {
                if let Some(prepared) = self.prepare_batch(partition, chunk) {
                    stats.batches_sent += 1;
                    stats.actions_sent += prepared.handles.len();
                    if partition.is_exclusive() {
                        exclusive.push(prepared);
                    } else {
                        concurrent.push(prepared);
                    }
                }
            }
        }

        let exclusive_run = async {
            let mut completed = 0;
            for prepared in exclusive {
                completed += self.send_batch(prepared).await;
            }
            completed
        };
        let concurrent_run = join_all(concurrent.into_iter().map(|p| self.send_batch(p)));
        let (exclusive_completed, concurrent_completed) =
            tokio::join!(exclusive_run, concurrent_run);
        stats.actions_completed += exclusive_completed + concurrent_completed.iter().sum::<usize>();

        stats.chained_promoted = self.promote_chained();
        if stats.batches_sent > 0 || stats.local_actions > 0 {
            debug!(?stats, "Dispatch cycle complete");
        }
        stats
    }

    /// Run cycles until nothing is pending
    pub async fn run_until_idle(&self) -> CycleStats {
        let mut total = CycleStats::default();
        while self.has_pending() {
            total.merge(self.process_cycle().await);
        }
        total
    }

    /// Run cycles in a background task whenever work is enqueued, until `shutdown` fires
    pub fn spawn_processing_loop(
        self: Arc<Self>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Action dispatcher processing loop started");
            loop {
                tokio::select! {
                    _ = shutdown.recv() => {
                        info!("Action dispatcher processing loop shutting down");
                        break;
                    }
                    _ = self.wait_for_work() => {
                        self.run_until_idle().await;
                    }
                }
            }
        })
    }

    async fn wait_for_work(&self) {
        if self.has_pending() {
            return;
        }
        self.work_available.notified().await;
    }

    fn run_client_action(&self, handle: &ActionHandle) -> bool {
        let mut action = handle.lock();
        if action.get_state() != ActionState::New {
            debug!(action_id = %handle.id(), state = %action.get_state(), "Skipping client action");
            return false;
        }
        if let Err(error) = action.run_local(self.reporter.as_ref()) {
            log_error("dispatcher", "run_local", &error.to_string(), Some(handle.id()));
            return false;
        }
        if let Some(group) = action.get_abortable_id() {
            self.abort_groups.release(group, handle.id());
        }
        action.finish_action(self.context.as_ref());
        let state = action.get_state();
        drop(action);

        self.events.publish(ActionLifecycleEvent::Completed {
            action_id: handle.id().to_string(),
            state,
            from_storage: false,
        });
        true
    }

    /// Turn queued failure reports into failure-report actions
    fn dispatch_failure_reports(&self) -> usize {
        let reports = self.reporter.drain_reports();
        if reports.is_empty() {
            return 0;
        }
        if !self.config.report_failures {
            debug!(count = reports.len(), "Failure reporting disabled; dropping reports");
            return 0;
        }
        let Some(descriptor) = self
            .factory
            .registry()
            .find_descriptor(is_error_reporting_descriptor)
        else {
            warn!(count = reports.len(), "No failure report action registered; dropping reports");
            return 0;
        };

        let mut enqueued = 0;
        for report in reports {
            let handle = match self.factory.create_handle(&descriptor) {
                Ok(handle) => handle,
                Err(error) => {
                    log_error("dispatcher", "report_failure", &error.to_string(), None);
                    continue;
                }
            };
            handle.lock().set_params(&report.to_params());
            match self.enqueue(&handle) {
                Ok(_) => {
                    enqueued += 1;
                    self.events.publish(ActionLifecycleEvent::FailureReported {
                        failed_action: report.failed_action,
                        failed_id: report.failed_id,
                    });
                }
                Err(error) => {
                    log_error("dispatcher", "report_failure", &error.to_string(), None);
                }
            }
        }
        enqueued
    }

    fn prepare_batch(&self, partition: Partition, handles: &[ActionHandle]) -> Option<PreparedBatch> {
        let mut requests = Vec::with_capacity(handles.len());
        let mut members = Vec::with_capacity(handles.len());

        for handle in handles {
            let mut action = handle.lock();
            if action.get_state() != ActionState::New {
                debug!(action_id = %handle.id(), state = %action.get_state(), "Dropping action from batch");
                if let Some(group) = action.get_abortable_id() {
                    self.abort_groups.release(group, handle.id());
                }
                continue;
            }
            action.mark_running();
            action.fire_all_aboard();
            if action.ignores_existing() {
                action.fire_refresh_event(REFRESH_BEGIN_EVENT);
            }
            requests.push(action.to_request());
            drop(action);

            self.in_flight.insert(handle.id().to_string(), handle.clone());
            members.push(handle.clone());
        }

        if requests.is_empty() {
            return None;
        }
        Some(PreparedBatch {
            batch: TransportBatch {
                partition,
                actions: requests,
            },
            handles: members,
        })
    }

    async fn send_batch(&self, prepared: PreparedBatch) -> usize {
        let PreparedBatch { batch, handles } = prepared;
        let partition = batch.partition;
        log_dispatch_operation(
            "send",
            batch.len(),
            partition.is_background(),
            partition.is_exclusive(),
            None,
        );
        self.events.publish(ActionLifecycleEvent::BatchSent {
            partition,
            action_ids: batch.ids().map(str::to_string).collect(),
        });

        let mut completed = 0;
        match self.transport.send(batch).await {
            Ok(responses) => {
                let mut waiting: HashMap<&str, &ActionHandle> =
                    handles.iter().map(|handle| (handle.id(), handle)).collect();
                for response in &responses {
                    match waiting.remove(response.id.as_str()) {
                        Some(handle) => {
                            if self.complete(handle, response) {
                                completed += 1;
                            }
                        }
                        None => {
                            warn!(action_id = %response.id, "Response for unknown or duplicate action");
                        }
                    }
                }
                for handle in handles.iter().filter(|h| waiting.contains_key(h.id())) {
                    debug!(action_id = %handle.id(), "No response for action; marking incomplete");
                    if self.complete(handle, &ActionResponse::incomplete(handle.id())) {
                        completed += 1;
                    }
                }
            }
            Err(error) => {
                log_error(
                    "dispatcher",
                    "send",
                    &error.to_string(),
                    Some(&partition.to_string()),
                );
                for handle in &handles {
                    let response = if error.is_connectivity() {
                        ActionResponse::incomplete(handle.id())
                    } else {
                        ActionResponse::error(handle.id(), json!({ "message": error.to_string() }))
                    };
                    if self.complete(handle, &response) {
                        completed += 1;
                    }
                }
            }
        }
        completed
    }

    /// Apply a response and deliver the result; false when the action was already delivered
    fn complete(&self, handle: &ActionHandle, response: &ActionResponse) -> bool {
        self.in_flight.remove(handle.id());
        let mut action = handle.lock();
        if !action.update_from_response(response) {
            if let Some(group) = action.get_abortable_id() {
                self.abort_groups.release(group, handle.id());
            }
            return false;
        }
        if response.state == TerminalState::Error {
            warn!(
                action_id = %handle.id(),
                descriptor = %action.descriptor(),
                error = ?response.error,
                "Server action failed"
            );
        }

        if let Some(stored) = action.get_stored() {
            let written = action
                .get_storage_key()
                .and_then(|key| self.store.put(&key, stored));
            if let Err(error) = written {
                warn!(action_id = %handle.id(), error = %error, "Failed to store action result");
                action.handle_storage_error(&error);
            }
        }
        if action.ignores_existing() {
            action.fire_refresh_event(REFRESH_END_EVENT);
        }
        if let Some(group) = action.get_abortable_id() {
            self.abort_groups.release(group, handle.id());
        }
        action.finish_action(self.context.as_ref());
        let state = action.get_state();
        let descriptor = action.descriptor().to_string();
        drop(action);

        log_action_operation("complete", handle.id(), &descriptor, &state.to_string(), None);
        self.events.publish(ActionLifecycleEvent::Completed {
            action_id: handle.id().to_string(),
            state,
            from_storage: false,
        });
        true
    }

    fn promote_chained(&self) -> usize {
        let chained = self.queue.lock().take_chained();
        let mut promoted = 0;
        for handle in chained {
            match self.enqueue(&handle) {
                Ok(_) => promoted += 1,
                Err(error) => {
                    debug!(action_id = %handle.id(), error = %error, "Chained action not promoted");
                }
            }
        }
        promoted
    }
}

impl std::fmt::Debug for ActionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDispatcher")
            .field("config", &self.config)
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}
