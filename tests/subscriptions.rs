//! Subscription bus and catch-up behavior.

use parking_lot::Mutex;
use sequent::{
    EventBody, EventFilter, EventStore, Logger, SchemaSet, Sequence, Upgrader,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn test_store() -> EventStore {
    let store = EventStore::builder(
        SchemaSet::new()
            .define_open("page-visited", 1)
            .define_open("page-visited", 2)
            .define_open("broken-link", 1),
    )
    .build();
    store.init().unwrap();
    store
}

fn visit(entity: &str, url: &str) -> Value {
    json!({
        "type": "page-visited",
        "entityId": entity,
        "payload": { "url": url },
    })
}

#[test]
fn test_subscriber_sees_event_exactly_once() {
    let store = test_store();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    store.subscribe(EventFilter::all(), move |event| {
        sink.lock().push(event.id.clone());
        Ok(())
    });

    let committed = store.emit(visit("page-1", "https://example.com")).unwrap();

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], committed.id);
}

#[test]
fn test_late_subscriber_misses_earlier_events() {
    let store = test_store();
    store.emit(visit("page-1", "https://example.com")).unwrap();

    let seen = Arc::new(Mutex::new(0u32));
    let sink = Arc::clone(&seen);
    store.subscribe(EventFilter::all(), move |_| {
        *sink.lock() += 1;
        Ok(())
    });

    store.emit(visit("page-1", "https://example.com/2")).unwrap();
    assert_eq!(*seen.lock(), 1);
}

#[test]
fn test_filtered_subscription_only_matching_events() {
    let store = test_store();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    store.subscribe(
        EventFilter::event_types(vec!["broken-link".to_string()]),
        move |event| {
            sink.lock().push(event.event_type.clone());
            Ok(())
        },
    );

    store.emit(visit("page-1", "https://example.com")).unwrap();
    store
        .emit(json!({
            "type": "broken-link",
            "entityId": "page-1",
            "payload": { "url": "https://bad-link.com" },
        }))
        .unwrap();

    assert_eq!(*seen.lock(), vec!["broken-link".to_string()]);
}

#[test]
fn test_failing_handler_does_not_fail_emit() {
    struct CapturingLogger(Mutex<Vec<String>>);
    impl Logger for CapturingLogger {
        fn error(&self, message: &str) {
            self.0.lock().push(message.to_string());
        }
    }

    let logger = Arc::new(CapturingLogger(Mutex::new(Vec::new())));
    let store = EventStore::builder(SchemaSet::new().define_open("page-visited", 1))
        .logger(Arc::clone(&logger))
        .build();
    store.init().unwrap();

    let reached = Arc::new(Mutex::new(false));
    store.subscribe(EventFilter::all(), |_| Err("projection exploded".into()));
    let flag = Arc::clone(&reached);
    store.subscribe(EventFilter::all(), move |_| {
        *flag.lock() = true;
        Ok(())
    });

    // The commit stands even though the first handler failed.
    let committed = store.emit(visit("page-1", "https://example.com"));
    assert!(committed.is_ok());
    assert!(*reached.lock());

    let errors = logger.0.lock();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("projection exploded"));
}

#[test]
fn test_catch_up_then_live() {
    let store = test_store();
    store.emit(visit("page-1", "https://example.com/1")).unwrap();
    store.emit(visit("page-1", "https://example.com/2")).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    store
        .catch_up_and_subscribe(EventFilter::entity("page-1"), move |event| {
            sink.lock().push(event.seq);
            Ok(())
        })
        .unwrap();

    // Both historical events replayed, in order, exactly once.
    assert_eq!(*seen.lock(), vec![Sequence(1), Sequence(2)]);

    store.emit(visit("page-1", "https://example.com/3")).unwrap();
    assert_eq!(*seen.lock(), vec![Sequence(1), Sequence(2), Sequence(3)]);
}

#[test]
fn test_catch_up_applies_upgrades_to_history() {
    struct AddUserAgent;
    impl Upgrader for AddUserAgent {
        fn upgrade(&self, mut body: EventBody) -> EventBody {
            if body.event_type == "page-visited" && body.version == 1 {
                body.payload
                    .insert("userAgent".to_string(), json!("unknown"));
                body.version = 2;
            }
            body
        }
        fn downgrade(&self, mut body: EventBody) -> EventBody {
            if body.event_type == "page-visited" && body.version == 2 {
                body.payload.remove("userAgent");
                body.version = 1;
            }
            body
        }
    }

    // The repository is pre-loaded through a store without the upgrader,
    // simulating events written before the upgrader existed.
    let plain = test_store();
    plain.emit(visit("page-1", "https://example.com")).unwrap();
    let repo_events = plain.all_events().unwrap();
    assert_eq!(repo_events[0].version, 1);

    let upgraded_store = EventStore::builder(
        SchemaSet::new()
            .define_open("page-visited", 1)
            .define_open("page-visited", 2),
    )
    .upgrader(AddUserAgent)
    .build();
    upgraded_store.init().unwrap();
    // Replay the old-shape event into the new store's log.
    upgraded_store
        .emit(json!({
            "type": "page-visited",
            "entityId": "page-1",
            "version": 1,
            "payload": { "url": "https://example.com" },
        }))
        .unwrap();

    let versions = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&versions);
    upgraded_store
        .catch_up_and_subscribe(EventFilter::entity("page-1"), move |event| {
            sink.lock().push(event.version);
            Ok(())
        })
        .unwrap();

    assert_eq!(*versions.lock(), vec![2]);
}

#[test]
fn test_channel_subscription_through_store() {
    let store = test_store();
    let handle = store.subscribe_channel(EventFilter::entity("page-1"), 16);

    store.emit(visit("page-2", "https://example.com")).unwrap();
    store.emit(visit("page-1", "https://example.com")).unwrap();

    let event = handle.recv_timeout(Duration::from_millis(100)).unwrap();
    assert_eq!(event.entity_id.as_deref(), Some("page-1"));
    assert!(handle.try_recv().is_err());
}

#[test]
fn test_live_dispatch_from_concurrent_emitters() {
    use std::thread;

    let store = Arc::new(test_store());
    let handle = store.subscribe_channel(EventFilter::all(), 64);

    let emitters: Vec<_> = (0..4)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for j in 0..8 {
                    store
                        .emit(visit(&format!("page-{i}"), &format!("https://example.com/{j}")))
                        .unwrap();
                }
            })
        })
        .collect();
    for emitter in emitters {
        emitter.join().unwrap();
    }

    let mut seqs = Vec::new();
    while let Ok(event) = handle.try_recv() {
        seqs.push(event.seq.0);
    }
    seqs.sort_unstable();
    assert_eq!(seqs, (1..=32).collect::<Vec<u64>>());
}
