//! Room lifecycle tests against a scripted dispatcher.
//!
//! These tests verify that:
//!
//! - operations requested while a subscription is in flight run afterwards,
//!   in call order, exactly once;
//! - a failed subscription drops the queued operations;
//! - the server-side unsubscribe is sent only by the last local subscriber,
//!   and only once no subscription is in flight;
//! - self-notifications are filtered according to `subscribe_to_self`.

use live_link::{LiveLinkError, Room, RoomOptions, RoomStatus};
use serde_json::{json, Map};
use std::sync::{Arc, Mutex};

mod common;

use common::{collector, harness, noop, settle, Harness};

fn room(h: &Harness) -> Room {
    Room::new(h.ctx.clone(), "shop", "orders", RoomOptions::default(), Map::new())
}

fn room_with(h: &Harness, options: RoomOptions) -> Room {
    Room::new(h.ctx.clone(), "shop", "orders", options, Map::new())
}

/// Subscribe `room` and answer with `room_id`/`channel`.
async fn subscribed(h: &Harness, room: &Room, room_id: &str, channel: &str) {
    room.renew(Some(json!({})), Some(noop())).unwrap();
    let index = h.dispatcher.len() - 1;
    h.dispatcher.respond_subscribe(index, room_id, channel);
    settle().await;
    assert_eq!(room.status(), RoomStatus::Active);
}

#[tokio::test]
async fn test_queued_operations_run_in_call_order_after_subscription() {
    let h = harness();
    let room = room(&h);
    let counts = Arc::new(Mutex::new(Vec::new()));

    room.renew(Some(json!({"equals": {"a": 1}})), Some(noop())).unwrap();
    let first = counts.clone();
    room.count(move |result| first.lock().unwrap().push(("first", result.ok())));
    room.renew(Some(json!({"equals": {"a": 2}})), None).unwrap();
    let second = counts.clone();
    room.count(move |result| second.lock().unwrap().push(("second", result.ok())));

    assert_eq!(h.dispatcher.actions(), vec!["on"]);
    assert_eq!(room.queued_operations(), 3);

    h.dispatcher.respond_subscribe(0, "r1", "c1");
    settle().await;

    // count, then the renew (releasing r1 first); the second count waits again
    assert_eq!(h.dispatcher.actions(), vec!["on", "count", "off", "on"]);
    assert_eq!(h.dispatcher.request(2).body, Some(json!({"roomId": "r1"})));
    assert_eq!(h.dispatcher.request(3).body, Some(json!({"equals": {"a": 2}})));
    assert_eq!(room.queued_operations(), 1);
    assert!(room.is_subscribing());

    h.dispatcher.respond_count(1, 4);
    h.dispatcher.respond_subscribe(3, "r2", "c2");
    settle().await;

    assert_eq!(h.dispatcher.actions(), vec!["on", "count", "off", "on", "count"]);
    assert_eq!(h.dispatcher.request(4).body, Some(json!({"roomId": "r2"})));
    h.dispatcher.respond_count(4, 7);
    settle().await;

    assert_eq!(
        *counts.lock().unwrap(),
        vec![("first", Some(4)), ("second", Some(7))]
    );
    assert_eq!(room.room_id().as_deref(), Some("r2"));
    assert_eq!(room.queued_operations(), 0);
}

#[tokio::test]
async fn test_count_queued_behind_renew_is_issued_right_after_it() {
    let h = harness();
    let room = room(&h);

    room.renew(Some(json!({"exists": "f1"})), Some(noop())).unwrap();
    room.count(|_| {});
    assert_eq!(h.dispatcher.actions(), vec!["on"]);

    h.dispatcher.respond_subscribe(0, "r1", "c1");
    settle().await;

    assert_eq!(h.dispatcher.actions(), vec!["on", "count"]);
    assert_eq!(h.dispatcher.request(1).controller, "subscribe");
    assert_eq!(h.dispatcher.request(1).body, Some(json!({"roomId": "r1"})));
}

#[tokio::test]
async fn test_failed_subscription_drops_queued_operations() {
    let h = harness();
    let room = room(&h);
    let (callback, received) = collector();
    let counted = Arc::new(Mutex::new(0));

    room.renew(Some(json!({})), Some(callback)).unwrap();
    let c = counted.clone();
    room.count(move |_| *c.lock().unwrap() += 1);
    room.unsubscribe();
    assert_eq!(room.queued_operations(), 2);

    h.dispatcher.fail(0, 400, "bad filters");
    settle().await;

    assert_eq!(h.dispatcher.actions(), vec!["on"]);
    assert_eq!(*counted.lock().unwrap(), 0);
    assert_eq!(room.queued_operations(), 0);
    assert_eq!(room.status(), RoomStatus::Idle);
    assert_eq!(h.registry.pending_count(), 0);

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    match &received[0] {
        Err(LiveLinkError::SubscriptionError(message)) => {
            assert!(message.contains("bad filters"), "unexpected message: {}", message)
        },
        other => panic!("expected a subscription error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_count_async_fails_when_pending_subscription_fails() {
    let h = harness();
    let room = room(&h);
    room.renew(None, Some(noop())).unwrap();

    let waiting = room.clone();
    let count = tokio::spawn(async move { waiting.count_async().await });
    settle().await;
    h.dispatcher.fail(0, 500, "boom");

    let result = count.await.unwrap();
    assert!(matches!(result, Err(LiveLinkError::SubscriptionError(_))));
}

#[tokio::test]
async fn test_unsubscribe_during_subscription_is_deferred() {
    let h = harness();
    let room = room(&h);

    room.renew(None, Some(noop())).unwrap();
    room.unsubscribe();
    assert_eq!(h.dispatcher.actions(), vec!["on"]);

    h.dispatcher.respond_subscribe(0, "r1", "c1");
    settle().await;

    assert_eq!(h.dispatcher.actions(), vec!["on", "off"]);
    assert_eq!(room.status(), RoomStatus::Unsubscribed);
    assert_eq!(room.room_id(), None);
    assert!(!h.registry.contains_room("r1"));
}

#[tokio::test]
async fn test_unsubscribe_sends_off_with_room_id_and_stops_notifications() {
    let h = harness();
    let room = room(&h);
    let (callback, received) = collector();

    room.renew(Some(json!({})), Some(callback)).unwrap();
    h.dispatcher.respond_subscribe(0, "r1", "c1");
    settle().await;
    assert_eq!(h.router.listener_count("c1"), 1);

    room.unsubscribe();

    assert_eq!(h.dispatcher.indexes_of("off"), vec![1]);
    let off = h.dispatcher.request(1);
    assert_eq!(off.controller, "subscribe");
    assert_eq!(off.body, Some(json!({"roomId": "r1"})));

    assert_eq!(h.router.listener_count("c1"), 0);
    h.router.dispatch("c1", json!({"result": {"action": "create"}}));
    assert!(received.lock().unwrap().is_empty());

    // Unsubscribing twice is a no-op
    room.unsubscribe();
    assert_eq!(h.dispatcher.len(), 2);
}

#[tokio::test]
async fn test_shared_room_sends_off_only_for_last_subscriber() {
    let h = harness();
    let first = room(&h);
    let second = room(&h);
    let third = room(&h);
    subscribed(&h, &first, "r1", "c1").await;
    subscribed(&h, &second, "r1", "c1").await;
    subscribed(&h, &third, "r1", "c1").await;
    assert_eq!(h.registry.subscribers("r1"), 3);

    first.unsubscribe();
    second.unsubscribe();
    settle().await;
    assert!(h.dispatcher.indexes_of("off").is_empty());
    assert_eq!(h.registry.subscribers("r1"), 1);

    third.unsubscribe();
    assert_eq!(h.dispatcher.indexes_of("off").len(), 1);
    assert!(!h.registry.contains_room("r1"));
}

#[tokio::test]
async fn test_off_waits_for_pending_subscriptions() {
    let h = harness();
    let active = room(&h);
    let pending = room(&h);
    subscribed(&h, &active, "r1", "c1").await;

    pending.renew(None, Some(noop())).unwrap();
    let pending_index = h.dispatcher.len() - 1;

    active.unsubscribe();
    settle().await;
    assert!(h.dispatcher.indexes_of("off").is_empty());
    assert_eq!(h.registry.pending_count(), 1);

    h.dispatcher.respond_subscribe(pending_index, "r2", "c2");
    settle().await;

    let offs = h.dispatcher.indexes_of("off");
    assert_eq!(offs.len(), 1);
    assert_eq!(h.dispatcher.request(offs[0]).body, Some(json!({"roomId": "r1"})));

    settle().await;
    assert_eq!(h.dispatcher.indexes_of("off").len(), 1);
}

#[tokio::test]
async fn test_resubscribed_room_is_not_unsubscribed() {
    let h = harness();
    let leaving = room(&h);
    let joining = room(&h);
    subscribed(&h, &leaving, "r1", "c1").await;

    joining.renew(None, Some(noop())).unwrap();
    let joining_index = h.dispatcher.len() - 1;
    leaving.unsubscribe();
    assert!(!h.registry.contains_room("r1"));

    // The pending subscription lands on the same server room
    h.dispatcher.respond_subscribe(joining_index, "r1", "c1");
    settle().await;

    assert!(h.dispatcher.indexes_of("off").is_empty());
    assert!(h.registry.contains_room("r1"));
    assert_eq!(joining.status(), RoomStatus::Active);
}

#[tokio::test]
async fn test_self_notifications_follow_subscribe_to_self() {
    let h = harness();
    let quiet = room(&h);
    let (quiet_cb, quiet_received) = collector();
    quiet.renew(None, Some(quiet_cb)).unwrap();
    h.dispatcher.respond_subscribe(0, "r1", "c1");

    let echoing = room_with(&h, RoomOptions::new().with_subscribe_to_self(true));
    let (echo_cb, echo_received) = collector();
    echoing.renew(None, Some(echo_cb)).unwrap();
    h.dispatcher.respond_subscribe(1, "r2", "c2");
    settle().await;

    h.registry.record_request("mine-1");
    h.registry.record_request("mine-2");
    h.router.dispatch("c1", json!({"result": {"requestId": "mine-1"}}));
    h.router.dispatch("c2", json!({"result": {"requestId": "mine-2"}}));
    h.router.dispatch("c1", json!({"result": {"requestId": "theirs"}}));

    let quiet_received = quiet_received.lock().unwrap();
    assert_eq!(quiet_received.len(), 1);
    assert_eq!(
        quiet_received[0].as_ref().unwrap().request_id.as_deref(),
        Some("theirs")
    );
    assert_eq!(echo_received.lock().unwrap().len(), 1);
    assert_eq!(h.registry.request_history_len(), 0);
}

#[tokio::test]
async fn test_self_echo_is_consumed_by_the_first_sibling_only() {
    let h = harness();
    let first = room(&h);
    let (first_cb, first_received) = collector();
    first.renew(None, Some(first_cb)).unwrap();
    h.dispatcher.respond_subscribe(0, "r1", "c1");
    settle().await;

    let second = room(&h);
    let (second_cb, second_received) = collector();
    second.renew(None, Some(second_cb)).unwrap();
    h.dispatcher.respond_subscribe(1, "r1", "c1");
    settle().await;

    h.registry.record_request("mine");
    h.router.dispatch("c1", json!({"result": {"requestId": "mine"}}));

    // The first listener recognizes the echo and drops it; the sibling no
    // longer finds the request in the history.
    assert!(first_received.lock().unwrap().is_empty());
    assert_eq!(second_received.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_error_notifications_reach_the_callback() {
    let h = harness();
    let room = room(&h);
    let (callback, received) = collector();
    room.renew(None, Some(callback)).unwrap();
    h.dispatcher.respond_subscribe(0, "r1", "c1");
    settle().await;

    h.router.dispatch("c1", json!({"error": {"status": 403, "message": "forbidden"}}));

    let received = received.lock().unwrap();
    assert!(matches!(&received[0], Err(LiveLinkError::ServerError(e)) if e.status == 403));
}

#[tokio::test]
async fn test_subscribe_carries_options_and_metadata() {
    let h = harness();
    let room = room_with(
        &h,
        RoomOptions::new()
            .with_scope(live_link::Scope::Out)
            .with_users(live_link::UsersScope::All)
            .with_metadata(json!({"origin": "tests"})),
    );
    room.set_headers(json!({"tenant": "acme"}), false).unwrap();
    room.renew(Some(json!({"equals": {"a": 1}})), Some(noop())).unwrap();

    let request = h.dispatcher.request(0);
    assert_eq!(request.arg("scope"), Some(&json!("out")));
    assert_eq!(request.arg("users"), Some(&json!("all")));
    assert_eq!(request.arg("tenant"), Some(&json!("acme")));
    assert_eq!(h.dispatcher.options(0).metadata, Some(json!({"origin": "tests"})));
    assert_eq!(h.registry.pending_count(), 1);
    assert!(h.registry.is_pending(room.id()));
}
