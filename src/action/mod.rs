//! # Action
//!
//! A unit of remote or local work: descriptor, parameters, lifecycle state, result, callback
//! table and abort/storage configuration.
//!
//! ## Lifecycle
//!
//! ```text
//! NEW ──▶ RUNNING ──▶ SUCCESS | ERROR | INCOMPLETE
//!  │         │
//!  └────┬────┘
//!       ▼
//!    ABORTED
//! ```
//!
//! No transition leaves a terminal state. Delivery is latched: once an action has been
//! finished or aborted, later responses and repeated `finish_action`/`abort` calls do nothing,
//! so every terminal callback fires at most once.

pub mod callbacks;
pub mod definition;
pub mod factory;
pub mod handle;
pub mod id;
pub mod params;
pub mod states;

pub use callbacks::{callback_fn, ActionCallback, CallbackFn, CallbackTable};
pub use definition::{
    local_method, ActionDef, ActionDefRegistry, ActionDescriptor, ActionKind, LocalMethod,
    ParamDef, ParamSchema,
};
pub use factory::ActionFactory;
pub use handle::ActionHandle;
pub use id::{format_action_id, ActionIdAllocator};
pub use params::ActionParams;
pub use states::{ActionState, CallbackTarget, TerminalState};

use crate::abort::AbortGroupId;
use crate::component::{CallbackScope, ComponentHandle};
use crate::constants::{REFRESH_OBSERVER_CAPABILITY, UNKNOWN_CALLING_DESCRIPTOR};
use crate::context::ExecutionContext;
use crate::diagnostics::{ActionFailure, DiagnosticsReporter};
use crate::dispatch::{ActionRequest, ActionResponse};
use crate::error::{ActionError, ActionResult};
use crate::storage::{storage_key, StorageMeta, StoreError, StoreResult, StoredAction};
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Handler invoked when the action store fails for a storable action
pub type StorageErrorHandler = Arc<dyn Fn(&StoreError) + Send + Sync>;

/// Storage options of a storable action
#[derive(Clone, Default)]
pub struct StorableConfig {
    /// Skip the store lookup; a successful result is still written
    pub ignore_existing: bool,
    error_handler: Option<StorageErrorHandler>,
}

impl StorableConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignoring_existing(mut self) -> Self {
        self.ignore_existing = true;
        self
    }

    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&StoreError) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    pub fn error_handler(&self) -> Option<&StorageErrorHandler> {
        self.error_handler.as_ref()
    }
}

impl fmt::Debug for StorableConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorableConfig")
            .field("ignore_existing", &self.ignore_existing)
            .field("has_error_handler", &self.error_handler.is_some())
            .finish()
    }
}

pub struct Action {
    def: Arc<ActionDef>,
    ids: Arc<ActionIdAllocator>,
    context_num: String,
    id: OnceLock<String>,
    params: ActionParams,
    state: ActionState,
    response_state: Option<TerminalState>,
    return_value: Option<Value>,
    return_value_unmodified: Option<Value>,
    error: Option<Value>,
    components: Vec<Value>,
    events: Vec<Value>,
    component: Option<Arc<dyn ComponentHandle>>,
    callbacks: CallbackTable,
    all_aboard_callback: Option<ActionCallback>,
    delivered: bool,
    abortable: bool,
    abortable_id: Option<AbortGroupId>,
    exclusive: bool,
    background: bool,
    storable: bool,
    storable_config: Option<StorableConfig>,
    storage_key: Option<String>,
    from_storage: bool,
    chained: bool,
    calling_descriptor: Option<String>,
    version: Option<String>,
    next_global_id: u64,
}

impl Action {
    /// A `NEW` action. The id is allocated from `ids` on first access, not here.
    pub fn new(
        def: Arc<ActionDef>,
        ids: Arc<ActionIdAllocator>,
        context_num: impl Into<String>,
    ) -> Self {
        let params = ActionParams::from_schema(def.params(), &Map::new());
        Self {
            def,
            ids,
            context_num: context_num.into(),
            id: OnceLock::new(),
            params,
            state: ActionState::New,
            response_state: None,
            return_value: None,
            return_value_unmodified: None,
            error: None,
            components: Vec::new(),
            events: Vec::new(),
            component: None,
            callbacks: CallbackTable::default(),
            all_aboard_callback: None,
            delivered: false,
            abortable: false,
            abortable_id: None,
            exclusive: false,
            background: false,
            storable: false,
            storable_config: None,
            storage_key: None,
            from_storage: false,
            chained: false,
            calling_descriptor: None,
            version: None,
            next_global_id: 1,
        }
    }

    /// `"{counter};{context}"`, allocated on first call and stable afterwards
    pub fn get_id(&self) -> &str {
        self.id
            .get_or_init(|| format_action_id(self.ids.next_action_id(), &self.context_num))
    }

    /// Assign an explicit id. Fails once an id exists, whether assigned or allocated by
    /// `get_id`; handles and in-flight bookkeeping key on it.
    pub fn set_id(&mut self, id: impl Into<String>) -> ActionResult<()> {
        self.id.set(id.into()).map_err(|requested| ActionError::IdAlreadyAssigned {
            current: self.get_id().to_string(),
            requested,
        })
    }

    pub fn get_def(&self) -> &Arc<ActionDef> {
        &self.def
    }

    pub fn descriptor(&self) -> &ActionDescriptor {
        self.def.descriptor()
    }

    /// Replace the parameters. Each declared name takes `config[name]` or becomes absent;
    /// undeclared names are dropped.
    pub fn set_params(&mut self, config: &Map<String, Value>) {
        self.params = ActionParams::from_schema(self.def.params(), config);
        self.storage_key = None;
        if self.storable {
            self.storage_key = self.compute_storage_key().ok();
        }
    }

    pub fn get_param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    pub fn get_params(&self) -> &ActionParams {
        &self.params
    }

    pub fn set_component(&mut self, component: Option<Arc<dyn ComponentHandle>>) {
        self.component = component;
    }

    pub fn get_component(&self) -> Option<&Arc<dyn ComponentHandle>> {
        self.component.as_ref()
    }

    /// Register `func` for one terminal state, or for all four when `name` is `None`/`"ALL"`
    pub fn set_callback(
        &mut self,
        scope: CallbackScope,
        func: Option<CallbackFn>,
        name: Option<&str>,
    ) -> ActionResult<()> {
        let Some(func) = func else {
            return Err(ActionError::InvalidCallback(
                name.unwrap_or("ALL").to_string(),
            ));
        };
        let callback = ActionCallback::new(scope, func);
        match CallbackTarget::resolve(name)? {
            CallbackTarget::All => self.callbacks.set_all(callback),
            CallbackTarget::State(state) => self.callbacks.set(state, callback),
        }
        Ok(())
    }

    pub fn get_callback(&self, state: TerminalState) -> Option<&ActionCallback> {
        self.callbacks.get(state)
    }

    pub fn callbacks(&self) -> &CallbackTable {
        &self.callbacks
    }

    /// Chain `func` after the callback of the current terminal state. The previous callback
    /// returns before `func` starts.
    pub fn wrap_callback(&mut self, scope: CallbackScope, func: CallbackFn) -> ActionResult<()> {
        let slot = self.state.terminal().ok_or_else(|| ActionError::NoCallbackSlot {
            id: self.get_id().to_string(),
            state: self.state,
        })?;
        let prior = self.callbacks.get(slot).cloned();
        let wrapped: CallbackFn = Arc::new(move |scope: &CallbackScope, action: &Action| {
            if let Some(prior) = &prior {
                prior.invoke(action);
            }
            func(scope, action);
        });
        self.callbacks.set(slot, ActionCallback::new(scope, wrapped));
        Ok(())
    }

    /// Callback run by the dispatcher right before the action's batch is sent
    pub fn set_all_aboard_callback(
        &mut self,
        scope: CallbackScope,
        func: Option<CallbackFn>,
    ) -> ActionResult<()> {
        let func = func.ok_or_else(|| ActionError::InvalidCallback("allAboard".to_string()))?;
        self.all_aboard_callback = Some(ActionCallback::new(scope, func));
        Ok(())
    }

    pub(crate) fn fire_all_aboard(&self) {
        if let Some(callback) = self.all_aboard_callback.clone() {
            callback.invoke(self);
        }
    }

    /// `None` means true; `null` and `false` mean false; any other value, including the
    /// string `"false"`, means true.
    pub fn set_abortable(&mut self, flag: Option<Value>) {
        self.abortable = !matches!(flag, Some(Value::Null) | Some(Value::Bool(false)));
    }

    pub fn is_abortable(&self) -> bool {
        self.abortable
    }

    pub fn set_abortable_id(&mut self, id: AbortGroupId) {
        self.abortable_id = Some(id);
    }

    pub fn get_abortable_id(&self) -> Option<AbortGroupId> {
        self.abortable_id
    }

    /// `None` means true; otherwise the literal value
    pub fn set_exclusive(&mut self, flag: Option<bool>) {
        self.exclusive = flag.unwrap_or(true);
    }

    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// One-way latch
    pub fn set_background(&mut self) {
        self.background = true;
    }

    pub fn is_background(&self) -> bool {
        self.background
    }

    /// Make the result cacheable. Only server actions may be storable.
    pub fn set_storable(&mut self, config: Option<StorableConfig>) -> ActionResult<()> {
        if !self.def.is_server_action() {
            return Err(ActionError::StorableRequiresServerAction(
                self.descriptor().to_string(),
            ));
        }
        self.storable = true;
        self.storable_config = config;
        self.storage_key = self.compute_storage_key().ok();
        Ok(())
    }

    /// Raw storable flag
    pub fn is_storable(&self) -> bool {
        self.storable
    }

    /// Storable and not configured to ignore existing entries
    pub fn consults_store(&self) -> bool {
        self.storable
            && !self
                .storable_config
                .as_ref()
                .is_some_and(|config| config.ignore_existing)
    }

    pub(crate) fn ignores_existing(&self) -> bool {
        self.storable
            && self
                .storable_config
                .as_ref()
                .is_some_and(|config| config.ignore_existing)
    }

    pub fn get_storable_config(&self) -> Option<&StorableConfig> {
        self.storable_config.as_ref()
    }

    pub fn get_storage_error_handler(&self) -> Option<&StorageErrorHandler> {
        self.storable_config
            .as_ref()
            .and_then(StorableConfig::error_handler)
    }

    /// Pass a store failure to the configured handler; false when there is none
    pub fn handle_storage_error(&self, error: &StoreError) -> bool {
        match self.get_storage_error_handler() {
            Some(handler) => {
                handler(error);
                true
            }
            None => false,
        }
    }

    /// Join the abort group of `parent`.
    ///
    /// The parent must be abortable and already enqueued, and this action must not have a
    /// group yet.
    pub fn set_parent_action(&mut self, parent: Option<&Action>) -> ActionResult<()> {
        let parent = match parent {
            Some(parent) if parent.is_abortable() => parent,
            Some(parent) => {
                return Err(ActionError::InvalidParentAction(
                    parent.get_id().to_string(),
                ))
            }
            None => return Err(ActionError::InvalidParentAction("null".to_string())),
        };
        let Some(group) = parent.get_abortable_id() else {
            return Err(ActionError::ParentNotEnqueued(parent.get_id().to_string()));
        };
        if self.abortable_id.is_some() {
            return Err(ActionError::AbortableGroupAlreadySet(
                self.get_id().to_string(),
            ));
        }
        self.abortable_id = Some(group);
        Ok(())
    }

    pub fn set_chained(&mut self) {
        self.chained = true;
    }

    pub fn is_chained(&self) -> bool {
        self.chained
    }

    pub fn set_calling_descriptor(&mut self, descriptor: impl Into<String>) {
        self.calling_descriptor = Some(descriptor.into());
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = Some(version.into());
    }

    /// Per-action counter for ids of components the action creates
    pub fn get_next_global_id(&mut self) -> u64 {
        let id = self.next_global_id;
        self.next_global_id += 1;
        id
    }

    pub fn get_state(&self) -> ActionState {
        self.state
    }

    pub(crate) fn mark_running(&mut self) {
        if self.state == ActionState::New {
            self.state = ActionState::Running;
        }
    }

    pub fn get_return_value(&self) -> Option<&Value> {
        self.return_value.as_ref()
    }

    /// Mutable result; the stored copy is unaffected
    pub fn get_return_value_mut(&mut self) -> Option<&mut Value> {
        self.return_value.as_mut()
    }

    pub fn get_error(&self) -> Option<&Value> {
        self.error.as_ref()
    }

    pub fn get_components(&self) -> &[Value] {
        &self.components
    }

    pub fn is_from_storage(&self) -> bool {
        self.from_storage
    }

    /// Whether a terminal callback has been delivered (or suppressed)
    pub fn is_delivered(&self) -> bool {
        self.delivered
    }

    pub fn get_storage_key(&self) -> StoreResult<String> {
        match &self.storage_key {
            Some(key) => Ok(key.clone()),
            None => self.compute_storage_key(),
        }
    }

    fn compute_storage_key(&self) -> StoreResult<String> {
        storage_key(self.def.descriptor().qualified_name(), &self.params)
    }

    /// Cache entry for this action, only for a storable action whose response was `SUCCESS`
    pub fn get_stored(&self) -> Option<StoredAction> {
        if !self.storable || self.response_state != Some(TerminalState::Success) {
            return None;
        }
        Some(StoredAction {
            state: ActionState::Success,
            return_value: self.return_value_unmodified.clone(),
            components: self.components.clone(),
            storage: StorageMeta::now(),
        })
    }

    /// Apply a transport response; returns false when the action was already delivered or
    /// aborted
    pub fn update_from_response(&mut self, response: &ActionResponse) -> bool {
        if self.delivered || self.state == ActionState::Aborted {
            debug!(action_id = %self.get_id(), state = %self.state, "Ignoring late response");
            return false;
        }
        self.state = response.state.into();
        self.response_state = Some(response.state);
        self.return_value = response.return_value.clone();
        self.return_value_unmodified =
            if self.storable && response.state == TerminalState::Success {
                response.return_value.clone()
            } else {
                None
            };
        self.error = if response.state == TerminalState::Error {
            response.error.clone()
        } else {
            None
        };
        self.components = response.components.clone();
        self.events = response.events.clone();
        true
    }

    /// Apply a cache entry as though the action had completed with the stored outcome
    pub fn update_from_stored(&mut self, stored: &StoredAction) -> bool {
        if self.delivered || self.state == ActionState::Aborted {
            return false;
        }
        self.state = stored.state;
        self.response_state = stored.state.terminal();
        self.return_value = stored.return_value.clone();
        self.return_value_unmodified = stored.return_value.clone();
        self.error = None;
        self.components = stored.components.clone();
        self.events = Vec::new();
        self.from_storage = true;
        true
    }

    /// Deliver the terminal state: sync component configs, fire response events and invoke
    /// the matching callback. Runs at most once; returns whether it ran.
    ///
    /// When the owning component has been destroyed the callback is skipped, not retried.
    /// Configs are committed for non-storable actions and discarded for storable ones.
    pub fn finish_action(&mut self, context: &dyn ExecutionContext) -> bool {
        let Some(slot) = self.state.terminal() else {
            return false;
        };
        if self.delivered {
            return false;
        }
        self.delivered = true;

        let id = self.get_id().to_string();
        let previous = context.set_current_action(Some(id.clone()));

        if self.component.as_ref().map_or(true, |c| c.is_valid()) {
            context.set_current_access(self.component.as_ref());
            if !self.components.is_empty() {
                context.join_component_configs(&self.components, &id);
            }
            for event in &self.events {
                self.parse_and_fire_event(event, context);
            }
            self.invoke_callback(slot);
            context.release_current_access();
        } else {
            debug!(action_id = %id, state = %self.state, "Component invalid; skipping callback");
        }

        context.set_current_action(previous);
        if self.storable {
            context.clear_component_configs(&id);
        } else {
            context.finish_component_configs(&id);
        }
        true
    }

    fn invoke_callback(&self, slot: TerminalState) {
        let Some(callback) = self.callbacks.get(slot).cloned() else {
            return;
        };
        if callback.scope().as_ref().is_some_and(|scope| !scope.is_valid()) {
            debug!(action_id = %self.get_id(), state = %slot, "Callback scope invalid; skipping");
            return;
        }
        callback.invoke(self);
    }

    /// Move to `ABORTED` and fire the `ABORTED` callback. Only `NEW` and `RUNNING` actions
    /// that have not been delivered can be aborted; returns whether this call aborted.
    pub fn abort(&mut self) -> bool {
        if self.delivered || !self.state.is_abortable_from() {
            return false;
        }
        self.state = ActionState::Aborted;
        self.response_state = Some(TerminalState::Aborted);
        self.delivered = true;
        debug!(action_id = %self.get_id(), abortable_id = ?self.abortable_id, "Action aborted");
        self.invoke_callback(TerminalState::Aborted);
        true
    }

    /// Execute a client action locally. Failures end in `ERROR` and are reported once.
    pub fn run_local(&mut self, reporter: &dyn DiagnosticsReporter) -> ActionResult<ActionState> {
        if !self.def.is_client_action() {
            return Err(ActionError::NotClientAction(self.descriptor().to_string()));
        }
        if self.state != ActionState::New {
            return Ok(self.state);
        }
        self.state = ActionState::Running;

        let result = match self.def.method().cloned() {
            Some(method) => method(&*self),
            None => Err(ActionFailure::new(format!(
                "Unable to find action method '{}'",
                self.descriptor().name()
            ))),
        };

        match result {
            Ok(value) => {
                self.state = ActionState::Success;
                self.response_state = Some(TerminalState::Success);
                self.return_value = Some(value);
            }
            Err(mut failure) => {
                let descriptor = self.descriptor().qualified_name().to_string();
                warn!(
                    action_id = %self.get_id(),
                    error = %failure,
                    "Action failed: {} -> {}",
                    descriptor,
                    self.descriptor().name()
                );
                self.state = ActionState::Error;
                self.response_state = Some(TerminalState::Error);
                self.error = Some(failure.to_json());
                let id = self.get_id().to_string();
                reporter.report_error(&mut failure, &descriptor, &id);
            }
        }
        Ok(self.state)
    }

    /// Fire `name` on the owning component if it observes storage refreshes
    pub fn fire_refresh_event(&self, name: &str) -> bool {
        match &self.component {
            Some(component)
                if component.is_valid()
                    && component.is_instance_of(REFRESH_OBSERVER_CAPABILITY) =>
            {
                component.fire_event(name, &json!({ "action": self.get_id() }));
                true
            }
            _ => false,
        }
    }

    /// Fire a response event through the owning component, falling back to the
    /// application-level handler when the component does not declare it
    pub fn parse_and_fire_event(&self, event: &Value, context: &dyn ExecutionContext) {
        let params = event
            .pointer("/attributes/values")
            .cloned()
            .unwrap_or_else(|| json!({}));
        let handled = match (event.get("descriptor").and_then(Value::as_str), &self.component) {
            (Some(descriptor), Some(component)) if component.is_valid() => {
                component.fire_event_by_descriptor(descriptor, &params)
            }
            _ => false,
        };
        if !handled {
            context.fire_application_event(event);
        }
    }

    /// Diagnostic form: `{id, descriptor, params, callingDescriptor, version}`
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.get_id(),
            "descriptor": self.descriptor().qualified_name(),
            "params": self.params.to_value(),
            "callingDescriptor": self
                .calling_descriptor
                .as_deref()
                .unwrap_or(UNKNOWN_CALLING_DESCRIPTOR),
            "version": self.version,
        })
    }

    pub fn to_request(&self) -> ActionRequest {
        ActionRequest {
            id: self.get_id().to_string(),
            descriptor: self.descriptor().qualified_name().to_string(),
            params: self.params.clone(),
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("id", &self.id.get())
            .field("descriptor", self.descriptor())
            .field("state", &self.state)
            .field("params", &self.params)
            .field("abortable", &self.abortable)
            .field("abortable_id", &self.abortable_id)
            .field("exclusive", &self.exclusive)
            .field("background", &self.background)
            .field("storable", &self.storable)
            .field("delivered", &self.delivered)
            .finish_non_exhaustive()
    }
}
