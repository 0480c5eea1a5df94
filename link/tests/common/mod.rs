#![allow(dead_code)]

use futures_util::FutureExt;
use live_link::{
    DriverEvent, DriverEventSender, EventHandlers, LiveLinkError, Notification,
    NotificationCallback, NotificationRouter, QueryDispatcher, QueryOptions, QueryRequest,
    QueryResponse, RealtimeDriver, ResponseFuture, Result, SubscriptionContext,
    SubscriptionRegistry,
};
use serde_json::{json, Value as JsonValue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .is_test(true)
        .try_init();
}

/// Let spawned tasks run until they block again.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

// ── scripted dispatcher ──────────────────────────────────────────────────────

struct Call {
    request: QueryRequest,
    options: QueryOptions,
    responder: Option<oneshot::Sender<Result<QueryResponse>>>,
}

/// Records every request in issue order and answers only when told to.
#[derive(Default)]
pub struct ScriptedDispatcher {
    calls: Mutex<Vec<Call>>,
}

impl ScriptedDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn len(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> QueryRequest {
        self.calls.lock().unwrap()[index].request.clone()
    }

    pub fn options(&self, index: usize) -> QueryOptions {
        self.calls.lock().unwrap()[index].options.clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|call| call.request.action.clone())
            .collect()
    }

    /// Indexes of the requests with the given action.
    pub fn indexes_of(&self, action: &str) -> Vec<usize> {
        self.actions()
            .iter()
            .enumerate()
            .filter(|(_, a)| a.as_str() == action)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn respond(&self, index: usize, result: Result<QueryResponse>) {
        let responder = self.calls.lock().unwrap()[index]
            .responder
            .take()
            .expect("request already answered");
        let _ = responder.send(result);
    }

    pub fn respond_subscribe(&self, index: usize, room_id: &str, channel: &str) {
        self.respond(
            index,
            Ok(QueryResponse::ok(json!({"roomId": room_id, "channel": channel}))),
        );
    }

    pub fn respond_count(&self, index: usize, count: u64) {
        self.respond(index, Ok(QueryResponse::ok(json!({"count": count}))));
    }

    pub fn fail(&self, index: usize, status: u16, message: &str) {
        self.respond(
            index,
            Err(LiveLinkError::ServerError(live_link::ErrorDetail::new(status, message))),
        );
    }
}

impl QueryDispatcher for ScriptedDispatcher {
    fn query(&self, request: QueryRequest, options: QueryOptions) -> ResponseFuture {
        let (tx, rx) = oneshot::channel();
        self.calls.lock().unwrap().push(Call {
            request,
            options,
            responder: Some(tx),
        });
        async move {
            rx.await
                .unwrap_or_else(|_| Err(LiveLinkError::NotConnected("dropped".to_string())))
        }
        .boxed()
    }
}

pub struct Harness {
    pub dispatcher: Arc<ScriptedDispatcher>,
    pub registry: Arc<SubscriptionRegistry>,
    pub router: Arc<NotificationRouter>,
    pub ctx: SubscriptionContext,
}

pub fn harness() -> Harness {
    let dispatcher = ScriptedDispatcher::new();
    let registry = Arc::new(SubscriptionRegistry::new());
    let router = Arc::new(NotificationRouter::new());
    let ctx = SubscriptionContext::new(dispatcher.clone(), registry.clone(), router.clone());
    Harness {
        dispatcher,
        registry,
        router,
        ctx,
    }
}

// ── callbacks ────────────────────────────────────────────────────────────────

pub type Received = Arc<Mutex<Vec<Result<Notification>>>>;

pub fn collector() -> (NotificationCallback, Received) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let callback: NotificationCallback = Arc::new(move |notification: Result<Notification>| {
        sink.lock().unwrap().push(notification);
    });
    (callback, received)
}

pub fn noop() -> NotificationCallback {
    Arc::new(|_: Result<Notification>| {})
}

// ── recording driver ─────────────────────────────────────────────────────────

/// In-memory transport: records what is sent and lets tests inject events.
#[derive(Default)]
pub struct RecordingDriver {
    opens: AtomicUsize,
    closes: AtomicUsize,
    sent: Mutex<Vec<JsonValue>>,
    events: Mutex<Option<DriverEventSender>>,
}

impl RecordingDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<JsonValue> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_actions(&self) -> Vec<String> {
        self.sent()
            .iter()
            .map(|request| request["action"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn request_id(&self, index: usize) -> String {
        self.sent()[index]["requestId"]
            .as_str()
            .expect("request without requestId")
            .to_string()
    }

    /// Inject a driver event into the current session.
    pub fn emit(&self, event: DriverEvent) {
        let events = self.events.lock().unwrap();
        let sender = events.as_ref().expect("driver was never opened");
        let _ = sender.send(event);
    }

    /// Answer the `index`-th sent request with `result`.
    pub fn respond(&self, index: usize, result: JsonValue) {
        let request_id = self.request_id(index);
        self.emit(DriverEvent::Message {
            channel: request_id.clone(),
            payload: json!({"requestId": request_id, "status": 200, "result": result}),
        });
    }
}

impl RealtimeDriver for RecordingDriver {
    fn open(&self, _host: &str, _port: u16, _ssl: bool, events: DriverEventSender) {
        self.opens.fetch_add(1, Ordering::SeqCst);
        *self.events.lock().unwrap() = Some(events);
    }

    fn send(&self, payload: String) -> Result<()> {
        let request: JsonValue = serde_json::from_str(&payload)?;
        self.sent.lock().unwrap().push(request);
        Ok(())
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

// ── event counters ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct EventCounts {
    pub connects: AtomicUsize,
    pub reconnects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub network_errors: AtomicUsize,
    pub queue_pushes: AtomicUsize,
    pub queue_pops: AtomicUsize,
    pub discarded: AtomicUsize,
    pub login_attempts: Mutex<Vec<live_link::LoginAttempt>>,
}

impl EventCounts {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn handlers(self: &Arc<Self>) -> EventHandlers {
        let connect = self.clone();
        let reconnect = self.clone();
        let disconnect = self.clone();
        let network_error = self.clone();
        let push = self.clone();
        let pop = self.clone();
        let discarded = self.clone();
        let login = self.clone();
        EventHandlers::new()
            .on_connect(move || {
                connect.connects.fetch_add(1, Ordering::SeqCst);
            })
            .on_reconnect(move || {
                reconnect.reconnects.fetch_add(1, Ordering::SeqCst);
            })
            .on_disconnect(move || {
                disconnect.disconnects.fetch_add(1, Ordering::SeqCst);
            })
            .on_network_error(move |_| {
                network_error.network_errors.fetch_add(1, Ordering::SeqCst);
            })
            .on_offline_queue_push(move |_| {
                push.queue_pushes.fetch_add(1, Ordering::SeqCst);
            })
            .on_offline_queue_pop(move |_| {
                pop.queue_pops.fetch_add(1, Ordering::SeqCst);
            })
            .on_discarded(move |_| {
                discarded.discarded.fetch_add(1, Ordering::SeqCst);
            })
            .on_login_attempt(move |attempt| {
                login.login_attempts.lock().unwrap().push(attempt);
            })
    }
}
