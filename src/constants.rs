//! # System Constants
//!
//! Well-known descriptors, capabilities, event names and parameter names shared by the
//! action, storage and dispatch layers.

/// Descriptor of the server operation that records client-side action failures
pub const REPORT_FAILED_ACTION_DESCRIPTOR: &str = "ComponentController.reportFailedAction";

/// Capability a component implements to receive storage refresh notifications
pub const REFRESH_OBSERVER_CAPABILITY: &str = "storage:refreshObserver";

/// Component event fired when a storable action is sent for a forced refresh
pub const REFRESH_BEGIN_EVENT: &str = "refreshBegin";

/// Component event fired when a forced refresh completes
pub const REFRESH_END_EVENT: &str = "refreshEnd";

/// `callingDescriptor` value used in diagnostics when none was set
pub const UNKNOWN_CALLING_DESCRIPTOR: &str = "UNKNOWN";

/// Default name of the action result store
pub const DEFAULT_STORAGE_NAME: &str = "actions";

/// Parameter names of the failure report action
pub mod report_params {
    pub const FAILED_ACTION: &str = "failedAction";
    pub const FAILED_ID: &str = "failedId";
    pub const CLIENT_ERROR: &str = "clientError";
    pub const CLIENT_STACK: &str = "clientStack";
}

/// Lifecycle event names published by the dispatcher
pub mod events {
    pub const ACTION_ENQUEUED: &str = "action.enqueued";
    pub const ACTION_CACHE_HIT: &str = "action.cache_hit";
    pub const BATCH_SENT: &str = "action.batch_sent";
    pub const ACTION_COMPLETED: &str = "action.completed";
    pub const ACTION_ABORTED: &str = "action.aborted";
    pub const FAILURE_REPORTED: &str = "action.failure_reported";
}

/// Returns true when `descriptor` names the failure-reporting operation, with or without a
/// `scheme://` prefix.
pub fn is_error_reporting_descriptor(descriptor: &str) -> bool {
    let unprefixed = descriptor
        .split_once("://")
        .map_or(descriptor, |(_, rest)| rest);
    unprefixed == REPORT_FAILED_ACTION_DESCRIPTOR
}
