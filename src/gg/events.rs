// Event dispatch
// Domain events raised by the session and the subscriber list that delivers them.

use log::{debug, warn};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::models::{
    ContactList, MessageAck, MultiloginSession, PublicDirectoryReply, ReceivedMessage, StatusInfo,
    TypingNotify,
};

/// Everything the engine reports to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum GGEvent {
    /// Server discovery produced an address.
    ServerResolved(IpAddr),
    /// Server discovery failed or found nothing; the session is idle again.
    DiscoveryFailed(String),
    /// TCP connection established, waiting for the welcome seed.
    Connected(SocketAddr),
    ConnectFailed(String),
    LoggedIn,
    LoginFailed,
    /// The session ended, by request or because the connection dropped.
    Disconnected(String),
    MessageReceived(ReceivedMessage),
    /// A message sent from another session of our own account.
    OwnMessageReceived(ReceivedMessage),
    MessageAcknowledged(MessageAck),
    /// Presence of a contact, or of ourselves when `uin` is our own number.
    StatusChanged(StatusInfo),
    NeedEmail,
    MultiloginSession(MultiloginSession),
    TypingNotify(TypingNotify),
    PublicDirectoryReply(PublicDirectoryReply),
    XmlSystemMessage(String),
    XmlActionMessage(String),
    /// Server contact list reply; `list` is `None` for a bare version notice.
    ContactListReceived { version: u32, list: Option<ContactList> },
}

/// Discriminant of [`GGEvent`], used to filter subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ServerResolved,
    DiscoveryFailed,
    Connected,
    ConnectFailed,
    LoggedIn,
    LoginFailed,
    Disconnected,
    MessageReceived,
    OwnMessageReceived,
    MessageAcknowledged,
    StatusChanged,
    NeedEmail,
    MultiloginSession,
    TypingNotify,
    PublicDirectoryReply,
    XmlSystemMessage,
    XmlActionMessage,
    ContactListReceived,
}

impl GGEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GGEvent::ServerResolved(_) => EventKind::ServerResolved,
            GGEvent::DiscoveryFailed(_) => EventKind::DiscoveryFailed,
            GGEvent::Connected(_) => EventKind::Connected,
            GGEvent::ConnectFailed(_) => EventKind::ConnectFailed,
            GGEvent::LoggedIn => EventKind::LoggedIn,
            GGEvent::LoginFailed => EventKind::LoginFailed,
            GGEvent::Disconnected(_) => EventKind::Disconnected,
            GGEvent::MessageReceived(_) => EventKind::MessageReceived,
            GGEvent::OwnMessageReceived(_) => EventKind::OwnMessageReceived,
            GGEvent::MessageAcknowledged(_) => EventKind::MessageAcknowledged,
            GGEvent::StatusChanged(_) => EventKind::StatusChanged,
            GGEvent::NeedEmail => EventKind::NeedEmail,
            GGEvent::MultiloginSession(_) => EventKind::MultiloginSession,
            GGEvent::TypingNotify(_) => EventKind::TypingNotify,
            GGEvent::PublicDirectoryReply(_) => EventKind::PublicDirectoryReply,
            GGEvent::XmlSystemMessage(_) => EventKind::XmlSystemMessage,
            GGEvent::XmlActionMessage(_) => EventKind::XmlActionMessage,
            GGEvent::ContactListReceived { .. } => EventKind::ContactListReceived,
        }
    }
}

/// Somewhere events can be handed off to instead of running on the I/O task.
pub trait ExecutionContext: Send + Sync {
    fn post(&self, task: Box<dyn FnOnce() + Send>);
}

type Task = Box<dyn FnOnce() + Send>;

/// FIFO execution context; the paired [`ContextRunner`] executes posted tasks
/// wherever the consumer polls it.
pub struct QueueContext {
    tx: mpsc::UnboundedSender<Task>,
}

pub struct ContextRunner {
    rx: mpsc::UnboundedReceiver<Task>,
}

impl QueueContext {
    pub fn new() -> (Arc<QueueContext>, ContextRunner) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(QueueContext { tx }), ContextRunner { rx })
    }
}

impl ExecutionContext for QueueContext {
    fn post(&self, task: Task) {
        if self.tx.send(task).is_err() {
            warn!("Execution context runner is gone, dropping event delivery");
        }
    }
}

impl ContextRunner {
    /// Run tasks until every [`QueueContext`] handle is dropped.
    pub async fn run(mut self) {
        while let Some(task) = self.rx.recv().await {
            task();
        }
    }

    /// Run whatever is queued right now and return how many tasks ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }
}

/// Handle returned by a subscription, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(&GGEvent) + Send + Sync>;

#[derive(Clone)]
enum Sink {
    Callback(Callback),
    Channel(mpsc::UnboundedSender<GGEvent>),
}

impl Sink {
    fn deliver(&self, event: &GGEvent) {
        match self {
            Sink::Callback(callback) => callback(event),
            Sink::Channel(tx) => {
                if tx.send(event.clone()).is_err() {
                    debug!("Event stream closed, {:?} not delivered", event.kind());
                }
            }
        }
    }
}

struct Subscription {
    id: SubscriptionId,
    filter: Option<EventKind>,
    sink: Sink,
}

/// Subscriber list for [`GGEvent`]s.
///
/// Delivery is synchronous on the dispatching task unless an
/// [`ExecutionContext`] is set, in which case each event becomes one posted
/// task, so events keep their order on that context.
pub struct EventDispatcher {
    subscriptions: Mutex<Vec<Subscription>>,
    context: Mutex<Option<Arc<dyn ExecutionContext>>>,
    next_id: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        EventDispatcher {
            subscriptions: Mutex::new(Vec::new()),
            context: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    fn add(&self, filter: Option<EventKind>, sink: Sink) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.subscriptions).push(Subscription { id, filter, sink });
        id
    }

    /// Call `handler` for every event of `kind`.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&GGEvent) + Send + Sync + 'static,
    {
        self.add(Some(kind), Sink::Callback(Arc::new(handler)))
    }

    /// Call `handler` for every event.
    pub fn on_any<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&GGEvent) + Send + Sync + 'static,
    {
        self.add(None, Sink::Callback(Arc::new(handler)))
    }

    /// Stream of every event; dropping the stream ends the subscription.
    pub fn subscribe(&self) -> UnboundedReceiverStream<GGEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.add(None, Sink::Channel(tx));
        UnboundedReceiverStream::new(rx)
    }

    /// Stream of events of one kind.
    pub fn subscribe_kind(&self, kind: EventKind) -> UnboundedReceiverStream<GGEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.add(Some(kind), Sink::Channel(tx));
        UnboundedReceiverStream::new(rx)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = lock(&self.subscriptions);
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscriptions).len()
    }

    /// Route future deliveries through `context`, or back to synchronous
    /// delivery with `None`.
    pub fn set_context(&self, context: Option<Arc<dyn ExecutionContext>>) {
        *lock(&self.context) = context;
    }

    pub fn dispatch(&self, event: GGEvent) {
        let kind = event.kind();
        let sinks: Vec<Sink> = {
            let mut subscriptions = lock(&self.subscriptions);
            subscriptions.retain(|s| !matches!(&s.sink, Sink::Channel(tx) if tx.is_closed()));
            subscriptions
                .iter()
                .filter(|s| s.filter.map_or(true, |k| k == kind))
                .map(|s| s.sink.clone())
                .collect()
        };
        if sinks.is_empty() {
            debug!("No subscribers for {:?}", kind);
            return;
        }

        let context = lock(&self.context).clone();
        match context {
            Some(context) => context.post(Box::new(move || {
                for sink in &sinks {
                    sink.deliver(&event);
                }
            })),
            None => {
                for sink in &sinks {
                    sink.deliver(&event);
                }
            }
        }
    }
}
