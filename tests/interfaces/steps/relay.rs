//! Relay interface step definitions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use cucumber::{given, then, when, World};

use eventrelay::bus::{
    Broadcaster, BusError, DeliveryOutcome, LossyHandler, SubmitReceipt, Subscriber,
};
use eventrelay::event::Event;
use eventrelay::projectors::{ThreadProjector, ThreadView};
use eventrelay::replay::StoreReplayFeed;
use eventrelay::subscriber::ViewSubscriber;
use eventrelay::test_utils::{child_created, child_updated, parent_created, RecordingHandler};

use crate::backend::{StorageBackend, StorageContext};

/// A view subscriber and the lossy wrapper it is registered behind.
struct ViewHandle {
    subscriber: ViewSubscriber<ThreadProjector>,
    lossy: Arc<LossyHandler>,
}

/// Test context for relay scenarios.
#[derive(World)]
#[world(init = Self::new)]
pub struct RelayWorld {
    backend: StorageBackend,
    context: Option<StorageContext>,
    registrations: Vec<Subscriber>,
    broadcaster: Option<Arc<Broadcaster>>,
    views: HashMap<String, ViewHandle>,
    recorders: HashMap<String, Arc<RecordingHandler>>,
    last_result: Option<Result<SubmitReceipt, BusError>>,
    view_before_restart: Option<ThreadView>,
}

impl std::fmt::Debug for RelayWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayWorld")
            .field("backend", &self.backend)
            .field("subscribers", &self.registrations)
            .field("last_result", &self.last_result)
            .finish()
    }
}

impl RelayWorld {
    fn new() -> Self {
        Self {
            backend: StorageBackend::from_env(),
            context: None,
            registrations: Vec::new(),
            broadcaster: None,
            views: HashMap::new(),
            recorders: HashMap::new(),
            last_result: None,
            view_before_restart: None,
        }
    }

    fn context(&self) -> &StorageContext {
        self.context
            .as_ref()
            .expect("Storage context not initialized")
    }

    fn replace_store(&mut self, context: StorageContext) {
        self.context = Some(context);
        self.registrations.clear();
        self.broadcaster = None;
        self.views.clear();
        self.recorders.clear();
    }

    fn feed(&self) -> Arc<StoreReplayFeed> {
        Arc::new(StoreReplayFeed::new(Arc::clone(&self.context().event_store)))
    }

    /// The broadcaster, built on first use from the registrations so far.
    fn broadcaster(&mut self) -> Arc<Broadcaster> {
        if let Some(broadcaster) = &self.broadcaster {
            return Arc::clone(broadcaster);
        }
        let broadcaster = Arc::new(
            Broadcaster::builder(Arc::clone(&self.context().event_store))
                .subscribers(self.registrations.clone())
                .build(),
        );
        self.broadcaster = Some(Arc::clone(&broadcaster));
        broadcaster
    }

    async fn submit(&mut self, event: Event) {
        let broadcaster = self.broadcaster();
        self.last_result = Some(broadcaster.submit(event).await);
    }

    fn view(&self, name: &str) -> &ViewHandle {
        self.views
            .get(name)
            .unwrap_or_else(|| panic!("no view subscriber named {name}"))
    }

    fn receipt(&self) -> &SubmitReceipt {
        match &self.last_result {
            Some(Ok(receipt)) => receipt,
            other => panic!("expected a successful submit, got {:?}", other),
        }
    }

    fn outcome_for(&self, name: &str) -> &DeliveryOutcome {
        &self
            .receipt()
            .deliveries
            .iter()
            .find(|d| d.subscriber == name)
            .unwrap_or_else(|| panic!("no delivery record for {name}"))
            .outcome
    }
}

// --- Background ---

#[given("a relay backed by the configured store")]
async fn given_relay(world: &mut RelayWorld) {
    println!("Using backend: {}", world.backend.name());
    let context = StorageContext::new(world.backend).await;
    world.replace_store(context);
}

#[given(expr = "a relay whose log holds at most {int} event")]
#[given(expr = "a relay whose log holds at most {int} events")]
async fn given_bounded_relay(world: &mut RelayWorld, capacity: usize) {
    world.replace_store(StorageContext::with_capacity(capacity));
}

#[given(expr = "a view subscriber {string}")]
async fn given_view_subscriber(world: &mut RelayWorld, name: String) {
    let subscriber = ViewSubscriber::builder(name.clone(), ThreadProjector::default())
        .replay_feed(world.feed())
        .build();
    let lossy = Arc::new(LossyHandler::passthrough(Arc::new(subscriber.clone())));

    world
        .registrations
        .push(Subscriber::new(name.clone(), lossy.clone()));
    world.views.insert(name, ViewHandle { subscriber, lossy });
}

#[given(expr = "a recording subscriber {string}")]
async fn given_recording_subscriber(world: &mut RelayWorld, name: String) {
    let recorder = Arc::new(RecordingHandler::new());
    world
        .registrations
        .push(Subscriber::new(name.clone(), recorder.clone()));
    world.recorders.insert(name, recorder);
}

// --- Producer steps ---

#[given(expr = "a producer submits ParentCreated {string} titled {string}")]
#[when(expr = "a producer submits ParentCreated {string} titled {string}")]
async fn submit_parent(world: &mut RelayWorld, id: String, title: String) {
    world.submit(parent_created(&id, &title)).await;
}

#[given(expr = "a producer submits ChildCreated {string} on {string} with content {string} and status {string}")]
#[when(expr = "a producer submits ChildCreated {string} on {string} with content {string} and status {string}")]
async fn submit_child_created(
    world: &mut RelayWorld,
    id: String,
    parent: String,
    content: String,
    status: String,
) {
    world
        .submit(child_created(&id, &parent, &content, &status))
        .await;
}

#[when(expr = "a producer submits ChildUpdated {string} on {string} with content {string} and status {string}")]
async fn submit_child_updated(
    world: &mut RelayWorld,
    id: String,
    parent: String,
    content: String,
    status: String,
) {
    world
        .submit(child_updated(&id, &parent, &content, &status))
        .await;
}

// --- Subscriber lifecycle steps ---

#[given(expr = "{string} goes offline")]
async fn goes_offline(world: &mut RelayWorld, name: String) {
    world.view(&name).lossy.set_offline(true);
}

#[when(expr = "{string} comes back online")]
async fn comes_online(world: &mut RelayWorld, name: String) {
    world.view(&name).lossy.set_offline(false);
}

#[when(expr = "{string} restarts and replays the history")]
async fn restarts(world: &mut RelayWorld, name: String) {
    let before = world.view(&name).subscriber.snapshot().await;
    world.view_before_restart = Some(before);

    let subscriber = ViewSubscriber::builder(name.clone(), ThreadProjector::default())
        .replay_feed(world.feed())
        .build();
    subscriber
        .catch_up()
        .await
        .expect("replay after restart should succeed");

    let lossy = Arc::new(LossyHandler::passthrough(Arc::new(subscriber.clone())));
    world.views.insert(name, ViewHandle { subscriber, lossy });
}

// --- Assertions ---

#[then(expr = "the last submit succeeded with sequence {int}")]
async fn submit_succeeded(world: &mut RelayWorld, sequence: u64) {
    assert_eq!(world.receipt().sequence, sequence);
}

#[then("the last submit failed to append")]
async fn submit_failed(world: &mut RelayWorld) {
    assert!(
        matches!(world.last_result, Some(Err(BusError::Append(_)))),
        "expected an append failure, got {:?}",
        world.last_result
    );
}

#[then(expr = "in the view of {string} parent {string} has {int} child")]
#[then(expr = "in the view of {string} parent {string} has {int} children")]
async fn parent_has_children(world: &mut RelayWorld, name: String, parent: String, count: usize) {
    let view = world.view(&name).subscriber.snapshot().await;
    let record = view
        .parent(&parent)
        .unwrap_or_else(|| panic!("parent {parent} missing from view"));
    assert_eq!(record.children.len(), count);
}

#[then(expr = "in the view of {string} child {string} of {string} has status {string}")]
async fn child_has_status(
    world: &mut RelayWorld,
    name: String,
    child: String,
    parent: String,
    status: String,
) {
    let view = world.view(&name).subscriber.snapshot().await;
    let record = view
        .parent(&parent)
        .unwrap_or_else(|| panic!("parent {parent} missing from view"));
    let child = record
        .children
        .iter()
        .find(|c| c.id == child)
        .unwrap_or_else(|| panic!("child {child} missing from {parent}"));
    assert_eq!(child.status, status);
}

#[then(expr = "{string} received sequences {string}")]
async fn received_sequences(world: &mut RelayWorld, name: String, expected: String) {
    let expected: Vec<u64> = expected
        .split(',')
        .map(|s| s.trim().parse().expect("sequence list"))
        .collect();
    let recorder = world
        .recorders
        .get(&name)
        .unwrap_or_else(|| panic!("no recording subscriber named {name}"));
    assert_eq!(recorder.sequences(), expected);
}

#[then(expr = "the delivery to {string} was reported as failed")]
async fn delivery_failed(world: &mut RelayWorld, name: String) {
    assert!(world.outcome_for(&name).is_failure());
}

#[then(expr = "the delivery to {string} succeeded")]
async fn delivery_succeeded(world: &mut RelayWorld, name: String) {
    assert_eq!(world.outcome_for(&name), &DeliveryOutcome::Delivered);
}

#[then(expr = "the view of {string} equals the view before the restart")]
async fn view_equals_before_restart(world: &mut RelayWorld, name: String) {
    let after = world.view(&name).subscriber.snapshot().await;
    let before = world
        .view_before_restart
        .as_ref()
        .expect("no view captured before restart");
    assert_eq!(&after, before);
}

#[then(expr = "the watermark of {string} is {int}")]
async fn watermark_is(world: &mut RelayWorld, name: String, expected: u64) {
    assert_eq!(world.view(&name).subscriber.watermark().await, expected);
}

#[then(expr = "the watermark of {string} eventually reaches {int}")]
async fn watermark_eventually(world: &mut RelayWorld, name: String, expected: u64) {
    let subscriber = world.view(&name).subscriber.clone();
    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        while subscriber.watermark().await < expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(
        reached.is_ok(),
        "watermark of {name} stuck at {}",
        subscriber.watermark().await
    );
}
