//! Integration tests for listener registration:
//! - live and lazy add/remove
//! - filtered registration with persistence
//! - store write-through and rehydration
//! - observer notifications

mod common;

use std::sync::Arc;

use common::harness::{event_name, start_router, subscriber};
use courier_router::{ListenerInfo, RouterObserver};
use courier_store::RegistrationStore;
use courier_types::{ContextId, ProcessId};
use courier_router::ProcessHandle;
use parking_lot::Mutex;
use serde_json::json;

fn process(id: u64) -> ProcessHandle {
    ProcessHandle::new(ProcessId::new(id), ContextId::new(0))
}

#[tracing_test::traced_test]
#[tokio::test]
async fn test_live_listener_add_remove() {
    let harness = start_router().await;
    let handle = &harness.handle;
    let name = event_name("tabs.on_created");
    let sub = subscriber("alarm-clock");

    assert!(
        handle
            .add_listener(name.clone(), sub.clone(), process(1), None)
            .await
            .unwrap()
    );
    // Identical registration is a no-op
    assert!(
        !handle
            .add_listener(name.clone(), sub.clone(), process(1), None)
            .await
            .unwrap()
    );
    assert!(handle.has_listener_for_event(name.clone()).await.unwrap());
    assert!(
        handle
            .has_process_listener(ProcessId::new(1), sub.clone())
            .await
            .unwrap()
    );
    assert_eq!(handle.listener_count(name.clone()).await.unwrap(), 1);

    assert!(
        handle
            .remove_listener(name.clone(), sub.clone(), process(1), None)
            .await
            .unwrap()
    );
    assert!(!handle.has_listener_for_event(name.clone()).await.unwrap());
    // Removing again reports nothing removed
    assert!(
        !handle
            .remove_listener(name, sub, process(1), None)
            .await
            .unwrap()
    );
}

#[tracing_test::traced_test]
#[tokio::test]
async fn test_lazy_listener_persists_to_store() {
    let harness = start_router().await;
    let handle = &harness.handle;
    let name = event_name("alarms.on_fire");
    let sub = subscriber("alarm-clock");

    assert!(
        handle
            .add_lazy_listener(name.clone(), sub.clone(), None)
            .await
            .unwrap()
    );
    let persisted = harness.store.registered_events(&sub).await.unwrap();
    assert!(persisted.contains(&name));

    assert!(
        handle
            .remove_lazy_listener(name.clone(), sub.clone(), None)
            .await
            .unwrap()
    );
    let persisted = harness.store.registered_events(&sub).await.unwrap();
    assert!(persisted.is_empty());
}

#[tracing_test::traced_test]
#[tokio::test]
async fn test_lazy_listener_filter_persists_to_filtered_record() {
    let harness = start_router().await;
    let handle = &harness.handle;
    let name = event_name("web.on_navigate");
    let sub = subscriber("nav-watcher");
    let filter = json!({"url": [{"hostSuffix": "example.com"}]});

    assert!(
        handle
            .add_lazy_listener(name.clone(), sub.clone(), Some(filter.clone()))
            .await
            .unwrap()
    );
    // Filtered lazy registrations go to the filtered record, not the
    // unfiltered event-name set.
    assert!(
        harness
            .store
            .registered_events(&sub)
            .await
            .unwrap()
            .is_empty()
    );
    let persisted = harness.store.filtered_events(&sub).await.unwrap().unwrap();
    assert_eq!(persisted[name.as_str()], json!([filter.clone()]));
    assert_eq!(handle.matcher_count(name.clone()).await.unwrap(), 1);

    assert!(
        handle
            .remove_lazy_listener(name.clone(), sub.clone(), Some(filter))
            .await
            .unwrap()
    );
    assert_eq!(handle.matcher_count(name.clone()).await.unwrap(), 0);
    let persisted = harness.store.filtered_events(&sub).await.unwrap();
    assert!(persisted.is_none() || persisted.unwrap()[name.as_str()] == json!([]));
}

#[tracing_test::traced_test]
#[tokio::test]
async fn test_live_listener_filter_is_not_persisted() {
    let harness = start_router().await;
    let handle = &harness.handle;
    let name = event_name("web.on_navigate");
    let sub = subscriber("nav-watcher");
    let filter = json!({"url": [{"hostSuffix": "example.com"}]});

    assert!(
        handle
            .add_listener(name.clone(), sub.clone(), process(1), Some(filter.clone()))
            .await
            .unwrap()
    );
    assert_eq!(handle.matcher_count(name.clone()).await.unwrap(), 1);
    assert!(harness.store.filtered_events(&sub).await.unwrap().is_none());

    assert!(
        handle
            .remove_listener(name.clone(), sub, process(1), Some(filter))
            .await
            .unwrap()
    );
    assert_eq!(handle.matcher_count(name).await.unwrap(), 0);
}

#[tracing_test::traced_test]
#[tokio::test]
async fn test_filtered_listener_with_lazy_persistence() {
    let harness = start_router().await;
    let handle = &harness.handle;
    let name = event_name("web.on_navigate");
    let sub = subscriber("nav-watcher");
    let filter = json!({"url": [{"hostSuffix": "example.com"}]});

    assert!(
        handle
            .add_filtered_listener(name.clone(), sub.clone(), process(1), filter.clone(), true)
            .await
            .unwrap()
    );
    assert_eq!(handle.matcher_count(name.clone()).await.unwrap(), 2);
    let persisted = harness.store.filtered_events(&sub).await.unwrap().unwrap();
    assert_eq!(persisted[name.as_str()], json!([filter.clone()]));

    assert!(
        handle
            .remove_filtered_listener(name.clone(), sub.clone(), process(1), filter, true)
            .await
            .unwrap()
    );
    assert_eq!(handle.matcher_count(name.clone()).await.unwrap(), 0);
    let persisted = harness.store.filtered_events(&sub).await.unwrap();
    assert!(persisted.is_none() || persisted.unwrap()[name.as_str()] == json!([]));
}

#[tracing_test::traced_test]
#[tokio::test]
async fn test_malformed_filter_registers_nothing() {
    let harness = start_router().await;
    let handle = &harness.handle;
    let name = event_name("web.on_navigate");
    let sub = subscriber("nav-watcher");

    let added = handle
        .add_filtered_listener(
            name.clone(),
            sub.clone(),
            process(1),
            json!({"bogusKey": 1}),
            true,
        )
        .await
        .unwrap();
    assert!(!added);
    assert!(!handle.has_listener_for_event(name.clone()).await.unwrap());
    assert!(harness.store.filtered_events(&sub).await.unwrap().is_none());
}

#[tracing_test::traced_test]
#[tokio::test]
async fn test_subscriber_removal_keeps_persisted_registrations() {
    let harness = start_router().await;
    let handle = &harness.handle;
    let name = event_name("alarms.on_fire");
    let sub = subscriber("alarm-clock");

    handle
        .add_lazy_listener(name.clone(), sub.clone(), None)
        .await
        .unwrap();
    handle
        .add_listener(event_name("tabs.on_created"), sub.clone(), process(1), None)
        .await
        .unwrap();

    handle
        .remove_listeners_for_subscriber(sub.clone())
        .await
        .unwrap();
    assert!(!handle.has_listener_for_event(name.clone()).await.unwrap());
    assert!(
        !handle
            .has_listener_for_event(event_name("tabs.on_created"))
            .await
            .unwrap()
    );

    // The persisted lazy set survives and rehydrates
    let persisted = harness.store.registered_events(&sub).await.unwrap();
    assert!(persisted.contains(&name));

    handle.notify_subscriber_loaded(sub.clone()).await.unwrap();
    assert!(handle.has_listener_for_event(name.clone()).await.unwrap());
    assert!(
        handle
            .has_listener_for_subscriber(sub, name)
            .await
            .unwrap()
    );
}

#[tracing_test::traced_test]
#[tokio::test]
async fn test_process_removal_leaves_lazy_listeners() {
    let harness = start_router().await;
    let handle = &harness.handle;
    let name = event_name("tabs.on_created");
    let sub = subscriber("alarm-clock");

    handle
        .add_listener(name.clone(), sub.clone(), process(1), None)
        .await
        .unwrap();
    handle
        .add_lazy_listener(name.clone(), sub.clone(), None)
        .await
        .unwrap();

    handle
        .remove_listeners_for_process(ProcessId::new(1))
        .await
        .unwrap();
    assert!(
        !handle
            .has_process_listener(ProcessId::new(1), sub.clone())
            .await
            .unwrap()
    );
    assert_eq!(handle.listener_count(name).await.unwrap(), 1);
}

#[tracing_test::traced_test]
#[tokio::test]
async fn test_corrupted_filtered_registrations_are_skipped() {
    let harness = start_router().await;
    let handle = &harness.handle;
    let sub = subscriber("nav-watcher");

    handle
        .load_filtered_lazy_listeners(
            sub.clone(),
            json!({
                "web.on_navigate": "not-a-list",
                "tabs.on_created": [{"url": [{"hostSuffix": "example.com"}]}],
            }),
        )
        .await
        .unwrap();

    // The well-formed entry loads; the corrupted one is skipped.
    assert!(
        !handle
            .has_listener_for_event(event_name("web.on_navigate"))
            .await
            .unwrap()
    );
    assert_eq!(
        handle
            .listener_count(event_name("tabs.on_created"))
            .await
            .unwrap(),
        1
    );
}

#[derive(Default)]
struct RecordingObserver {
    added: Mutex<Vec<String>>,
    removed: Mutex<Vec<String>>,
}

impl RouterObserver for RecordingObserver {
    fn on_listener_added(&self, info: &ListenerInfo) {
        self.added.lock().push(info.event_name.to_string());
    }

    fn on_listener_removed(&self, info: &ListenerInfo) {
        self.removed.lock().push(info.event_name.to_string());
    }
}

#[tracing_test::traced_test]
#[tokio::test]
async fn test_observer_sees_sub_event_registrations() {
    let harness = start_router().await;
    let handle = &harness.handle;
    let sub = subscriber("alarm-clock");
    let observer = Arc::new(RecordingObserver::default());
    handle.register_observer(&event_name("alarms.on_fire"), observer.clone());

    handle
        .add_listener(event_name("alarms.on_fire/42"), sub.clone(), process(1), None)
        .await
        .unwrap();
    handle
        .add_listener(event_name("tabs.on_created"), sub.clone(), process(1), None)
        .await
        .unwrap();
    handle
        .remove_listeners_for_subscriber(sub)
        .await
        .unwrap();

    assert_eq!(*observer.added.lock(), vec!["alarms.on_fire/42"]);
    assert_eq!(*observer.removed.lock(), vec!["alarms.on_fire/42"]);
}
