use crate::common::{params, CallbackLog, Harness, ScriptedTransport, ITEMS_LIST, ITEMS_SAVE};
use action_dispatch_core::action::{ActionHandle, ActionState};
use action_dispatch_core::error::ActionError;
use action_dispatch_core::config::DispatchConfig;
use action_dispatch_core::dispatch::{ActionResponse, EnqueueOutcome, Partition, TransportError};
use serde_json::json;
use std::collections::HashSet;

#[tokio::test]
async fn test_actions_are_partitioned_by_flags() {
    let harness = Harness::new(ScriptedTransport::echo());
    let dispatcher = &harness.dispatcher;

    let plain = dispatcher.create_action(ITEMS_LIST).unwrap();
    let background = dispatcher.create_action(ITEMS_LIST).unwrap();
    background.lock().set_background();
    let exclusive = dispatcher.create_action(ITEMS_SAVE).unwrap();
    exclusive.lock().set_exclusive(None);
    let both = dispatcher.create_action(ITEMS_SAVE).unwrap();
    {
        let mut action = both.lock();
        action.set_background();
        action.set_exclusive(Some(true));
    }

    let outcomes: Vec<_> = [&plain, &background, &exclusive, &both]
        .into_iter()
        .map(|handle| dispatcher.enqueue(handle).unwrap())
        .collect();
    assert_eq!(
        outcomes,
        vec![
            EnqueueOutcome::Queued(Partition::ForegroundConcurrent),
            EnqueueOutcome::Queued(Partition::BackgroundConcurrent),
            EnqueueOutcome::Queued(Partition::ForegroundExclusive),
            EnqueueOutcome::Queued(Partition::BackgroundExclusive),
        ]
    );

    let stats = dispatcher.run_until_idle().await;
    assert_eq!(stats.batches_sent, 4);
    assert_eq!(stats.actions_completed, 4);

    let partitions: HashSet<_> = harness
        .transport
        .batches()
        .iter()
        .map(|batch| batch.partition)
        .collect();
    assert_eq!(partitions.len(), 4);
}

#[tokio::test]
async fn test_exclusive_actions_run_one_batch_at_a_time_in_order() {
    let config = DispatchConfig {
        max_batch_size: 1,
        ..DispatchConfig::default()
    };
    let harness = Harness::with_config(ScriptedTransport::echo(), config);
    let dispatcher = &harness.dispatcher;
    let log = CallbackLog::default();

    let mut ids = Vec::new();
    for page in 0..3 {
        let handle = dispatcher.create_action(ITEMS_LIST).unwrap();
        {
            let mut action = handle.lock();
            action.set_exclusive(None);
            action.set_params(&params(json!({ "page": page })));
            action.set_callback(None, log.callback(), None).unwrap();
        }
        dispatcher.enqueue(&handle).unwrap();
        ids.push(handle.id().to_string());
    }
    dispatcher.run_until_idle().await;

    let sent: Vec<Vec<String>> = harness
        .transport
        .batches()
        .iter()
        .map(|batch| batch.ids().map(str::to_string).collect())
        .collect();
    assert_eq!(
        sent,
        ids.iter().map(|id| vec![id.clone()]).collect::<Vec<_>>()
    );

    let pages: Vec<_> = log
        .calls()
        .into_iter()
        .map(|(_, value)| value.unwrap()["echo"]["page"].clone())
        .collect();
    assert_eq!(pages, vec![json!(0), json!(1), json!(2)]);
}

#[tokio::test]
async fn test_batches_respect_max_batch_size() {
    let config = DispatchConfig {
        max_batch_size: 2,
        ..DispatchConfig::default()
    };
    let harness = Harness::with_config(ScriptedTransport::echo(), config);
    for _ in 0..5 {
        let handle = harness.dispatcher.create_action(ITEMS_LIST).unwrap();
        harness.dispatcher.enqueue(&handle).unwrap();
    }

    let stats = harness.dispatcher.run_until_idle().await;

    let mut sizes: Vec<_> = harness.transport.batches().iter().map(|b| b.len()).collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![1, 2, 2]);
    assert_eq!(stats.actions_sent, 5);
    assert_eq!(stats.actions_completed, 5);
}

#[tokio::test]
async fn test_missing_response_completes_incomplete() {
    let harness = Harness::new(ScriptedTransport::new(|request| {
        (request.descriptor == ITEMS_LIST)
            .then(|| ActionResponse::success(request.id.clone(), json!("listed")))
    }));
    let answered_log = CallbackLog::default();
    let dropped_log = CallbackLog::default();

    let answered = harness.dispatcher.create_action(ITEMS_LIST).unwrap();
    answered
        .lock()
        .set_callback(None, answered_log.callback(), None)
        .unwrap();
    let dropped = harness.dispatcher.create_action(ITEMS_SAVE).unwrap();
    dropped
        .lock()
        .set_callback(None, dropped_log.callback(), None)
        .unwrap();

    harness.dispatcher.enqueue(&answered).unwrap();
    harness.dispatcher.enqueue(&dropped).unwrap();
    harness.dispatcher.run_until_idle().await;

    assert_eq!(answered_log.calls(), vec![(ActionState::Success, Some(json!("listed")))]);
    assert_eq!(dropped_log.states(), vec![ActionState::Incomplete]);
    assert_eq!(harness.dispatcher.in_flight_count(), 0);
}

#[tokio::test]
async fn test_responses_for_unknown_actions_are_ignored() {
    let harness = Harness::new(ScriptedTransport::new(|request| {
        Some(ActionResponse::success(format!("{}-stray", request.id), json!(null)))
    }));
    let log = CallbackLog::default();
    let handle = harness.dispatcher.create_action(ITEMS_LIST).unwrap();
    handle.lock().set_callback(None, log.callback(), None).unwrap();

    harness.dispatcher.enqueue(&handle).unwrap();
    harness.dispatcher.run_until_idle().await;

    assert_eq!(log.states(), vec![ActionState::Incomplete]);
}

#[tokio::test]
async fn test_connectivity_failure_is_incomplete() {
    let harness = Harness::new(ScriptedTransport::echo());
    harness
        .transport
        .fail_with(TransportError::Connectivity("offline".into()));
    let log = CallbackLog::default();
    let handle = harness.dispatcher.create_action(ITEMS_LIST).unwrap();
    handle.lock().set_callback(None, log.callback(), None).unwrap();

    harness.dispatcher.enqueue(&handle).unwrap();
    harness.dispatcher.run_until_idle().await;

    assert_eq!(log.states(), vec![ActionState::Incomplete]);
    assert_eq!(handle.lock().get_error(), None);
}

#[tokio::test]
async fn test_server_failure_is_error_with_message() {
    let harness = Harness::new(ScriptedTransport::echo());
    harness
        .transport
        .fail_with(TransportError::Server("boom".into()));
    let log = CallbackLog::default();
    let handle = harness.dispatcher.create_action(ITEMS_LIST).unwrap();
    handle.lock().set_callback(None, log.callback(), None).unwrap();

    harness.dispatcher.enqueue(&handle).unwrap();
    harness.dispatcher.run_until_idle().await;

    assert_eq!(log.states(), vec![ActionState::Error]);
    assert_eq!(
        handle.lock().get_error(),
        Some(&json!({"message": "Server error: boom"}))
    );
    assert_eq!(harness.reporter.reported_count(), 0);
}

#[tokio::test]
async fn test_response_components_and_events_are_delivered() {
    let harness = Harness::new(ScriptedTransport::new(|request| {
        Some(
            ActionResponse::success(request.id.clone(), json!(true))
                .with_components(vec![json!({"creationPath": "/*[0]"})])
                .with_events(vec![json!({
                    "descriptor": "markup://app:refreshed",
                    "attributes": {"values": {"count": 1}},
                })]),
        )
    }));
    let handle = harness.dispatcher.create_action(ITEMS_LIST).unwrap();

    harness.dispatcher.enqueue(&handle).unwrap();
    harness.dispatcher.run_until_idle().await;

    assert_eq!(
        harness.context.committed_configs(),
        vec![json!({"creationPath": "/*[0]"})]
    );
    assert_eq!(harness.context.application_events().len(), 1);
    assert_eq!(harness.context.finished_actions(), vec![handle.id().to_string()]);
}

#[tokio::test]
async fn test_handle_id_cannot_be_replaced_before_dispatch() {
    let harness = Harness::new(ScriptedTransport::echo());
    let log = CallbackLog::default();
    let handle = harness.dispatcher.create_action(ITEMS_LIST).unwrap();
    {
        let mut action = handle.lock();
        assert!(matches!(
            action.set_id("explicit-7"),
            Err(ActionError::IdAlreadyAssigned { .. })
        ));
        assert_eq!(action.get_id(), handle.id());
        action.set_callback(None, log.callback(), None).unwrap();
    }

    harness.dispatcher.enqueue(&handle).unwrap();
    harness.dispatcher.run_until_idle().await;

    let sent: Vec<String> = harness
        .transport
        .batches()
        .iter()
        .flat_map(|batch| batch.ids().map(str::to_string).collect::<Vec<_>>())
        .collect();
    assert_eq!(sent, vec![handle.id().to_string()]);
    assert_eq!(log.states(), vec![ActionState::Success]);
}

#[tokio::test]
async fn test_explicit_id_assigned_before_handle_is_used_on_the_wire() {
    let harness = Harness::new(ScriptedTransport::echo());
    let mut action = harness.dispatcher.factory().create(ITEMS_LIST).unwrap();
    action.set_id("explicit-7").unwrap();
    let handle = ActionHandle::new(action);
    assert_eq!(handle.id(), "explicit-7");

    harness.dispatcher.enqueue(&handle).unwrap();
    harness.dispatcher.run_until_idle().await;

    assert_eq!(handle.state(), ActionState::Success);
    assert_eq!(harness.transport.batches()[0].actions[0].id, "explicit-7");
}
