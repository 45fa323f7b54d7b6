use crate::common::{registry, CallbackLog, StubComponent, CLIENT_NO_METHOD, ITEMS_LIST, REPORT_FAILED};
use action_dispatch_core::action::{
    callback_fn, ActionFactory, ActionIdAllocator, ActionState, StorableConfig,
};
use action_dispatch_core::constants::{REFRESH_OBSERVER_CAPABILITY, REFRESH_BEGIN_EVENT};
use action_dispatch_core::context::InMemoryExecutionContext;
use action_dispatch_core::diagnostics::{DiagnosticsReporter, QueuedFailureReporter};
use action_dispatch_core::dispatch::ActionResponse;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

fn factory() -> ActionFactory {
    ActionFactory::new(registry(), Arc::new(ActionIdAllocator::new()), "1")
}

#[test]
fn test_each_terminal_callback_fires_at_most_once() {
    let context = InMemoryExecutionContext::default();
    let log = CallbackLog::default();
    let mut action = factory().create(ITEMS_LIST).unwrap();
    action.set_callback(None, log.callback(), None).unwrap();

    action.update_from_response(&ActionResponse::success(action.get_id(), json!(1)));
    for _ in 0..3 {
        action.finish_action(&context);
        action.abort();
    }

    assert_eq!(log.states(), vec![ActionState::Success]);
    assert_eq!(context.finished_actions().len(), 1);
}

#[test]
fn test_abort_before_response_ignores_late_response() {
    let context = InMemoryExecutionContext::default();
    let log = CallbackLog::default();
    let mut action = factory().create(ITEMS_LIST).unwrap();
    action.set_callback(None, log.callback(), None).unwrap();

    assert!(action.abort());
    assert!(!action.update_from_response(&ActionResponse::success(action.get_id(), json!(1))));
    assert!(!action.finish_action(&context));

    assert_eq!(log.states(), vec![ActionState::Aborted]);
    assert_eq!(action.get_return_value(), None);
}

#[test]
fn test_incomplete_and_error_are_not_stored() {
    for response in [
        ActionResponse::incomplete("x"),
        ActionResponse::error("x", json!({"message": "bad"})),
    ] {
        let mut action = factory().create(ITEMS_LIST).unwrap();
        action.set_storable(None).unwrap();
        action.update_from_response(&response);
        assert!(action.get_stored().is_none());
    }
}

#[test]
fn test_destroyed_component_suppresses_callback_but_syncs_configs() {
    let context = InMemoryExecutionContext::default();
    let component = StubComponent::new();
    let log = CallbackLog::default();
    let mut action = factory().create(ITEMS_LIST).unwrap();
    action.set_component(Some(component.clone()));
    action.set_callback(None, log.callback(), None).unwrap();

    action.update_from_response(
        &ActionResponse::success(action.get_id(), json!(1))
            .with_components(vec![json!({"creationPath": "/*[0]"})]),
    );
    component.destroy();
    assert!(action.finish_action(&context));

    assert_eq!(log.count(), 0);
    assert_eq!(context.finished_actions(), vec![action.get_id().to_string()]);
    assert!(context.committed_configs().is_empty());
}

#[test]
fn test_wrapped_callback_runs_after_prior() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let mut action = factory().create(ITEMS_LIST).unwrap();
    let prior = Arc::clone(&order);
    action
        .set_callback(
            None,
            Some(callback_fn(move |_, _| prior.lock().push(1))),
            Some("INCOMPLETE"),
        )
        .unwrap();

    action.update_from_response(&ActionResponse::incomplete(action.get_id()));
    let wrapped = Arc::clone(&order);
    action
        .wrap_callback(None, callback_fn(move |_, _| wrapped.lock().push(2)))
        .unwrap();
    action.finish_action(&InMemoryExecutionContext::default());

    assert_eq!(*order.lock(), vec![1, 2]);
}

#[test]
fn test_missing_method_on_report_action_reports_once_without_recursion() {
    let registry = registry();
    registry.register(action_dispatch_core::action::ActionDef::client(
        REPORT_FAILED,
        Default::default(),
        None,
    ));
    let factory = ActionFactory::new(registry, Arc::new(ActionIdAllocator::new()), "1");
    let reporter = QueuedFailureReporter::new();

    let mut action = factory.create(REPORT_FAILED).unwrap();
    assert_eq!(action.run_local(&reporter).unwrap(), ActionState::Error);

    assert_eq!(reporter.reported_count(), 1);
    assert!(reporter.drain_reports().is_empty());
}

#[test]
fn test_missing_method_is_reported() {
    let reporter = QueuedFailureReporter::new();
    let mut action = factory().create(CLIENT_NO_METHOD).unwrap();

    assert_eq!(action.run_local(&reporter).unwrap(), ActionState::Error);
    assert_eq!(action.run_local(&reporter).unwrap(), ActionState::Error);

    let reports = reporter.drain_reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].failed_id, action.get_id());
    assert!(reports[0].client_error.contains("missing"));
}

#[test]
fn test_refresh_event_only_for_observers() {
    let observer = StubComponent::with_capabilities(&[REFRESH_OBSERVER_CAPABILITY]);
    let mut action = factory().create(ITEMS_LIST).unwrap();
    action
        .set_storable(Some(StorableConfig::new().ignoring_existing()))
        .unwrap();
    action.set_component(Some(observer.clone()));

    assert!(action.fire_refresh_event(REFRESH_BEGIN_EVENT));
    assert_eq!(observer.fired(), vec![REFRESH_BEGIN_EVENT.to_string()]);

    observer.destroy();
    assert!(!action.fire_refresh_event(REFRESH_BEGIN_EVENT));
}
