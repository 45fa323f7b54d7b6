//! # Diagnostics
//!
//! Failures raised while an action executes locally are reported at most once. The failure
//! carries a one-way `reported` latch; the reporter checks it before doing anything.
//!
//! Reports are queued rather than sent inline. The dispatcher drains the queue at the start of
//! each cycle and turns every report into a failure-report action, except for failures of the
//! failure-report action itself, which are only logged so reporting never recurses.

use crate::constants::{is_error_reporting_descriptor, report_params};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::{debug, error, warn};

/// Failure of a locally executed action
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ActionFailure {
    message: String,
    stack: Option<String>,
    reported: bool,
}

impl ActionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
            reported: false,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }

    pub fn is_reported(&self) -> bool {
        self.reported
    }

    /// Latch the failure as reported; returns false if it already was
    pub fn mark_reported(&mut self) -> bool {
        !std::mem::replace(&mut self.reported, true)
    }

    /// Error payload stored on the action
    pub fn to_json(&self) -> Value {
        json!({
            "message": self.message,
            "stack": self.stack,
        })
    }
}

impl From<anyhow::Error> for ActionFailure {
    fn from(error: anyhow::Error) -> Self {
        Self::new(format!("{error:#}")).with_stack(format!("{error:?}"))
    }
}

/// A queued report of a failed action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub failed_action: String,
    pub failed_id: String,
    pub client_error: String,
    pub client_stack: Option<String>,
}

impl FailureReport {
    /// Parameters of the failure-report action
    pub fn to_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert(
            report_params::FAILED_ACTION.to_string(),
            Value::from(self.failed_action.clone()),
        );
        params.insert(
            report_params::FAILED_ID.to_string(),
            Value::from(self.failed_id.clone()),
        );
        params.insert(
            report_params::CLIENT_ERROR.to_string(),
            Value::from(self.client_error.clone()),
        );
        if let Some(stack) = &self.client_stack {
            params.insert(
                report_params::CLIENT_STACK.to_string(),
                Value::from(stack.clone()),
            );
        }
        params
    }
}

/// Diagnostics collaborator receiving execution failures
pub trait DiagnosticsReporter: Send + Sync {
    /// Report a failure; a failure already marked reported must be ignored
    fn report_error(&self, failure: &mut ActionFailure, descriptor: &str, action_id: &str);

    /// Take the reports waiting to be dispatched
    fn drain_reports(&self) -> Vec<FailureReport> {
        Vec::new()
    }
}

/// Reporter that queues failures for the dispatcher to send
#[derive(Debug, Default)]
pub struct QueuedFailureReporter {
    pending: Mutex<VecDeque<FailureReport>>,
    reported: AtomicUsize,
}

impl QueuedFailureReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of failures accepted for reporting
    pub fn reported_count(&self) -> usize {
        self.reported.load(Ordering::Relaxed)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl DiagnosticsReporter for QueuedFailureReporter {
    fn report_error(&self, failure: &mut ActionFailure, descriptor: &str, action_id: &str) {
        if !failure.mark_reported() {
            debug!(descriptor = %descriptor, action_id = %action_id, "Failure already reported");
            return;
        }
        self.reported.fetch_add(1, Ordering::Relaxed);

        if is_error_reporting_descriptor(descriptor) {
            error!(
                descriptor = %descriptor,
                action_id = %action_id,
                error = %failure.message(),
                "Failure report action failed; not re-reporting"
            );
            return;
        }

        warn!(
            descriptor = %descriptor,
            action_id = %action_id,
            error = %failure.message(),
            "Queueing failure report"
        );
        self.pending.lock().push_back(FailureReport {
            failed_action: descriptor.to_string(),
            failed_id: action_id.to_string(),
            client_error: failure.message().to_string(),
            client_stack: failure.stack().map(str::to_string),
        });
    }

    fn drain_reports(&self) -> Vec<FailureReport> {
        self.pending.lock().drain(..).collect()
    }
}
