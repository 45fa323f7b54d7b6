use crate::common::{
    params, CallbackLog, Harness, ScriptedTransport, CLIENT_FAIL, CLIENT_NO_METHOD, CLIENT_OK,
    REPORT_FAILED,
};
use action_dispatch_core::action::ActionState;
use action_dispatch_core::config::DispatchConfig;
use action_dispatch_core::dispatch::{ActionResponse, EnqueueOutcome};
use serde_json::json;

#[tokio::test]
async fn test_client_action_runs_locally() {
    let harness = Harness::new(ScriptedTransport::echo());
    let log = CallbackLog::default();
    let handle = harness.dispatcher.create_action(CLIENT_OK).unwrap();
    {
        let mut action = handle.lock();
        action.set_params(&params(json!({"value": 42})));
        action.set_callback(None, log.callback(), None).unwrap();
    }

    assert_eq!(harness.dispatcher.enqueue(&handle).unwrap(), EnqueueOutcome::Local);
    let stats = harness.dispatcher.run_until_idle().await;

    assert_eq!(log.calls(), vec![(ActionState::Success, Some(json!({"value": 42})))]);
    assert_eq!(stats.local_actions, 1);
    assert_eq!(harness.transport.sent_count(), 0);
}

#[tokio::test]
async fn test_client_failure_sends_one_report() {
    let harness = Harness::new(ScriptedTransport::echo());
    let log = CallbackLog::default();
    let handle = harness.dispatcher.create_action(CLIENT_FAIL).unwrap();
    handle.lock().set_callback(None, log.callback(), None).unwrap();

    harness.dispatcher.enqueue(&handle).unwrap();
    let stats = harness.dispatcher.run_until_idle().await;

    assert_eq!(log.states(), vec![ActionState::Error]);
    assert_eq!(stats.reports_enqueued, 1);
    assert_eq!(harness.transport.sent_descriptors(), vec![REPORT_FAILED.to_string()]);

    let batches = harness.transport.batches();
    let report = &batches[0].actions[0];
    assert_eq!(report.params.get("failedAction"), Some(&json!(CLIENT_FAIL)));
    assert_eq!(report.params.get("failedId"), Some(&json!(handle.id())));
    assert_eq!(
        report.params.get("clientError"),
        Some(&json!("client method exploded"))
    );
    assert_eq!(report.params.get("clientStack"), None);
}

#[tokio::test]
async fn test_missing_client_method_is_reported() {
    let harness = Harness::new(ScriptedTransport::echo());
    let handle = harness.dispatcher.create_action(CLIENT_NO_METHOD).unwrap();

    harness.dispatcher.enqueue(&handle).unwrap();
    harness.dispatcher.run_until_idle().await;

    assert_eq!(handle.state(), ActionState::Error);
    let batches = harness.transport.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(
        batches[0].actions[0].params.get("clientError"),
        Some(&json!("Unable to find action method 'missing'"))
    );
}

#[tokio::test]
async fn test_failed_report_is_not_reported_again() {
    let harness = Harness::new(ScriptedTransport::new(|request| {
        Some(ActionResponse::error(request.id.clone(), json!({"message": "down"})))
    }));
    let handle = harness.dispatcher.create_action(CLIENT_FAIL).unwrap();

    harness.dispatcher.enqueue(&handle).unwrap();
    harness.dispatcher.run_until_idle().await;

    assert_eq!(harness.transport.sent_count(), 1);
    assert_eq!(harness.reporter.reported_count(), 1);
    assert!(!harness.dispatcher.has_pending());
}

#[tokio::test]
async fn test_reporting_can_be_disabled() {
    let config = DispatchConfig {
        report_failures: false,
        ..DispatchConfig::default()
    };
    let harness = Harness::with_config(ScriptedTransport::echo(), config);
    let handle = harness.dispatcher.create_action(CLIENT_FAIL).unwrap();

    harness.dispatcher.enqueue(&handle).unwrap();
    let stats = harness.dispatcher.run_until_idle().await;

    assert_eq!(handle.state(), ActionState::Error);
    assert_eq!(stats.reports_enqueued, 0);
    assert_eq!(harness.transport.sent_count(), 0);
    assert_eq!(harness.reporter.pending_count(), 0);
}
