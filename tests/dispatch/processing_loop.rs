use crate::common::{CallbackLog, Harness, ScriptedTransport, ITEMS_LIST, ITEMS_SAVE};
use action_dispatch_core::action::{callback_fn, ActionState};
use action_dispatch_core::constants::events;
use action_dispatch_core::dispatch::EnqueueOutcome;
use action_dispatch_core::events::ActionLifecycleEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

#[tokio::test]
async fn test_processing_loop_dispatches_until_shutdown() {
    let harness = Harness::new(ScriptedTransport::echo());
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let worker = Arc::clone(&harness.dispatcher).spawn_processing_loop(shutdown_rx);

    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    for _ in 0..2 {
        let handle = harness.dispatcher.create_action(ITEMS_LIST).unwrap();
        let done = done_tx.clone();
        handle
            .lock()
            .set_callback(
                None,
                Some(callback_fn(move |_, action| {
                    let _ = done.send(action.get_state());
                })),
                None,
            )
            .unwrap();
        harness.dispatcher.enqueue(&handle).unwrap();

        let state = tokio::time::timeout(Duration::from_secs(5), done_rx.recv())
            .await
            .expect("action was never dispatched");
        assert_eq!(state, Some(ActionState::Success));
    }

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), worker)
        .await
        .expect("processing loop did not stop")
        .unwrap();
    assert_eq!(harness.transport.sent_count(), 2);
}

#[tokio::test]
async fn test_chained_actions_wait_for_the_next_cycle() {
    let harness = Harness::new(ScriptedTransport::echo());
    let dispatcher = &harness.dispatcher;
    let log = CallbackLog::default();

    let first = dispatcher.create_action(ITEMS_LIST).unwrap();
    let chained = dispatcher.create_action(ITEMS_SAVE).unwrap();
    chained.lock().set_callback(None, log.callback(), None).unwrap();

    dispatcher.enqueue(&first).unwrap();
    assert_eq!(dispatcher.set_chained(&chained).unwrap(), EnqueueOutcome::Deferred);
    assert!(chained.lock().is_chained());

    let stats = dispatcher.process_cycle().await;
    assert_eq!(stats.actions_sent, 1);
    assert_eq!(stats.chained_promoted, 1);
    assert_eq!(log.count(), 0);

    dispatcher.run_until_idle().await;
    assert_eq!(
        harness.transport.sent_descriptors(),
        vec![ITEMS_LIST.to_string(), ITEMS_SAVE.to_string()]
    );
    assert_eq!(log.states(), vec![ActionState::Success]);
}

#[tokio::test]
async fn test_callbacks_may_enqueue_follow_up_actions() {
    let harness = Harness::new(ScriptedTransport::echo());
    let dispatcher = Arc::clone(&harness.dispatcher);
    let follow_up = dispatcher.create_action(ITEMS_SAVE).unwrap();

    let first = dispatcher.create_action(ITEMS_LIST).unwrap();
    {
        let dispatcher = Arc::downgrade(&dispatcher);
        let follow_up = follow_up.clone();
        first
            .lock()
            .set_callback(
                None,
                Some(callback_fn(move |_, _| {
                    if let Some(dispatcher) = dispatcher.upgrade() {
                        dispatcher.enqueue(&follow_up).unwrap();
                    }
                })),
                None,
            )
            .unwrap();
    }

    dispatcher.enqueue(&first).unwrap();
    dispatcher.run_until_idle().await;

    assert_eq!(follow_up.state(), ActionState::Success);
    assert_eq!(harness.transport.sent_count(), 2);
}

#[tokio::test]
async fn test_lifecycle_events_are_published() {
    let harness = Harness::new(ScriptedTransport::echo());
    let mut events_rx = harness.dispatcher.subscribe();
    let handle = harness.dispatcher.create_action(ITEMS_LIST).unwrap();

    harness.dispatcher.enqueue(&handle).unwrap();
    harness.dispatcher.run_until_idle().await;

    let mut names = Vec::new();
    while let Ok(published) = events_rx.try_recv() {
        names.push(published.event.name());
        if let ActionLifecycleEvent::Completed {
            action_id,
            state,
            from_storage,
        } = &published.event
        {
            assert_eq!(action_id, handle.id());
            assert_eq!(*state, ActionState::Success);
            assert!(!from_storage);
        }
    }
    assert_eq!(
        names,
        vec![events::ACTION_ENQUEUED, events::BATCH_SENT, events::ACTION_COMPLETED]
    );
}
