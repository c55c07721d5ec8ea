// GG protocol client
// Entry point for the Gadu-Gadu protocol engine. GGClient is split across
// files by protocol concern, each adding its own impl block.

use log::debug;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use tokio_stream::wrappers::UnboundedReceiverStream;

pub mod chat_states;
pub mod connection;
pub mod consts;
pub mod contact_list;
pub mod discovery;
pub mod events;
pub mod hash;
pub mod messages;
pub mod multilogin;
pub mod packets;
pub mod presence;
pub mod public_directory;
pub mod roster;
pub mod session;
pub mod transport;

pub use contact_list::{ContactListCodec, Gg70Codec};
pub use discovery::{FnDiscovery, ServerDiscovery, StaticDiscovery};
pub use events::{
    ContextRunner, EventKind, ExecutionContext, GGEvent, QueueContext, SubscriptionId,
};
pub use hash::HashType;
pub use messages::OutgoingMessage;
pub use session::SessionState;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::models::Uin;
use connection::Link;
use events::EventDispatcher;
use session::{Effects, SessionCore};

/// Mutable client state, always locked as a whole.
pub(crate) struct State {
    pub(crate) core: SessionCore,
    pub(crate) link: Option<Link>,
    /// Bumped whenever a connection attempt starts or a link is torn down;
    /// background tasks holding an older value stay silent.
    pub(crate) generation: u64,
    /// Events in the order their steps ran, waiting for delivery.
    pub(crate) pending: VecDeque<GGEvent>,
}

pub(crate) struct Inner {
    pub(crate) state: Mutex<State>,
    /// Held by whichever thread is draining `State::pending`.
    pub(crate) delivery: Mutex<()>,
    pub(crate) events: EventDispatcher,
    pub(crate) config: ClientConfig,
    pub(crate) discovery: Option<Arc<dyn ServerDiscovery>>,
}

impl Inner {
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver queued events one at a time, outside the state lock.
    ///
    /// Only one thread drains at a time, so subscribers see events in the
    /// order the state machine produced them. A callback that calls back
    /// into the client finds the drain busy and leaves its events to the
    /// running loop.
    pub(crate) fn deliver_pending(&self) {
        loop {
            let guard = match self.delivery.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => return,
            };
            loop {
                let next = self.lock_state().pending.pop_front();
                match next {
                    Some(event) => self.events.dispatch(event),
                    None => break,
                }
            }
            drop(guard);
            // Events queued after the last pop but before the release found
            // the drain busy; pick them up here.
            if self.lock_state().pending.is_empty() {
                return;
            }
        }
    }
}

/// Handle to one GG account session. Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct GGClient {
    pub(crate) inner: Arc<Inner>,
}

/// Builder for [`GGClient`] with optional collaborators.
pub struct GGClientBuilder {
    config: ClientConfig,
    discovery: Option<Arc<dyn ServerDiscovery>>,
    contact_list_codec: Option<Arc<dyn ContactListCodec>>,
}

impl GGClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        GGClientBuilder {
            config,
            discovery: None,
            contact_list_codec: None,
        }
    }

    pub fn discovery(mut self, discovery: impl ServerDiscovery + 'static) -> Self {
        self.discovery = Some(Arc::new(discovery));
        self
    }

    pub fn contact_list_codec(mut self, codec: impl ContactListCodec + 'static) -> Self {
        self.contact_list_codec = Some(Arc::new(codec));
        self
    }

    pub fn build(self) -> GGClient {
        let mut core = SessionCore::new(&self.config);
        if let Some(codec) = self.contact_list_codec {
            core = core.with_contact_list_codec(codec);
        }
        debug!("Created client for {}", self.config.uin);
        GGClient {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    core,
                    link: None,
                    generation: 0,
                    pending: VecDeque::new(),
                }),
                delivery: Mutex::new(()),
                events: EventDispatcher::new(),
                config: self.config,
                discovery: self.discovery,
            }),
        }
    }
}

impl GGClient {
    pub fn new(config: ClientConfig) -> Self {
        GGClientBuilder::new(config).build()
    }

    pub fn builder(config: ClientConfig) -> GGClientBuilder {
        GGClientBuilder::new(config)
    }

    pub fn uin(&self) -> Uin {
        self.inner.config.uin
    }

    pub fn state(&self) -> SessionState {
        self.with_core(|core| core.state())
    }

    pub fn is_logged_in(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Subscriber list for session events.
    pub fn events(&self) -> &EventDispatcher {
        &self.inner.events
    }

    /// Stream of every event raised from now on.
    pub fn subscribe(&self) -> UnboundedReceiverStream<GGEvent> {
        self.inner.events.subscribe()
    }

    /// Deliver events through `context` instead of on the I/O task.
    pub fn set_execution_context(&self, context: Option<Arc<dyn ExecutionContext>>) {
        self.inner.events.set_context(context);
    }

    pub(crate) fn with_core<T>(&self, read: impl FnOnce(&SessionCore) -> T) -> T {
        read(&self.inner.lock_state().core)
    }

    /// Run one state machine step under the lock and apply its effects,
    /// then deliver queued events after unlocking.
    pub(crate) fn perform<T>(
        &self,
        step: impl FnOnce(&mut SessionCore) -> Result<(T, Effects)>,
    ) -> Result<T> {
        let value = {
            let mut state = self.inner.lock_state();
            let (value, fx) = step(&mut state.core)?;
            connection::apply(&self.inner, &mut state, fx);
            value
        };
        self.inner.deliver_pending();
        Ok(value)
    }
}
