// Connection handling
// Socket lifecycle around the session state machine: server discovery,
// TCP connect, the reader/writer tasks, keep-alive and teardown.

use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

use super::packets;
use super::session::{Effects, KeepAlive, SessionState};
use super::transport::FrameReceiver;
use super::{GGClient, Inner, State};
use crate::error::{GGError, Result};

const READ_BUFFER_LEN: usize = 8192;

/// An open connection: the outbound frame queue and the tasks serving it.
pub(crate) struct Link {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    reader: JoinHandle<()>,
    keepalive: Option<JoinHandle<()>>,
}

impl Link {
    fn send(&self, frame: Vec<u8>) {
        if self.outbound.send(frame).is_err() {
            warn!("Writer task is gone, dropping outbound frame");
        }
    }

    fn stop_keepalive(&mut self) {
        if let Some(task) = self.keepalive.take() {
            task.abort();
        }
    }

    /// Stop reading and let the writer flush what is queued, then shut the
    /// socket down.
    fn close(mut self) {
        self.stop_keepalive();
        self.reader.abort();
        drop(self.outbound);
    }
}

/// Carry out `fx` against the link and queue its events for delivery.
pub(crate) fn apply(inner: &Arc<Inner>, state: &mut State, fx: Effects) {
    let Effects {
        frames,
        events,
        keepalive,
        close,
    } = fx;

    match state.link.as_ref() {
        Some(link) => {
            for frame in frames {
                link.send(frame);
            }
        }
        None if !frames.is_empty() => {
            warn!("No open connection, dropping {} outbound frames", frames.len());
        }
        None => {}
    }

    match keepalive {
        Some(KeepAlive::Start) => {
            let generation = state.generation;
            let period = inner.config.ping_interval();
            if let Some(link) = state.link.as_mut() {
                link.stop_keepalive();
                link.keepalive = Some(spawn_keepalive(Arc::downgrade(inner), generation, period));
            }
        }
        Some(KeepAlive::Stop) => {
            if let Some(link) = state.link.as_mut() {
                link.stop_keepalive();
            }
        }
        None => {}
    }

    if close {
        state.generation += 1;
        if let Some(link) = state.link.take() {
            debug!("Closing connection");
            link.close();
        }
    }

    state.pending.extend(events);
}

fn spawn_keepalive(weak: Weak<Inner>, generation: u64, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            let Some(inner) = weak.upgrade() else {
                break;
            };
            let state = inner.lock_state();
            if state.generation != generation || state.core.state() != SessionState::Active {
                break;
            }
            if let Some(link) = state.link.as_ref() {
                debug!("Sending ping");
                link.send(packets::encode_ping());
            }
        }
    })
}

async fn write_loop(mut socket: OwnedWriteHalf, mut outbound: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = socket.write_all(&frame).await {
            warn!("Write failed, dropping the rest of the queue: {}", e);
            break;
        }
    }
    if let Err(e) = socket.shutdown().await {
        debug!("Ignoring error while closing socket: {}", e);
    }
}

/// Run one step for a background task, unless its generation is stale.
fn step_if_current(
    weak: &Weak<Inner>,
    generation: u64,
    step: impl FnOnce(&mut State) -> Effects,
) -> bool {
    let Some(inner) = weak.upgrade() else {
        return false;
    };
    {
        let mut state = inner.lock_state();
        if state.generation != generation {
            debug!("Suppressing completion from a closed connection");
            return false;
        }
        let fx = step(&mut state);
        apply(&inner, &mut state, fx);
    }
    inner.deliver_pending();
    true
}

async fn read_loop(weak: Weak<Inner>, generation: u64, mut socket: OwnedReadHalf, max_frame_len: u32) {
    let mut receiver = FrameReceiver::new(max_frame_len);
    let mut buffer = vec![0u8; READ_BUFFER_LEN];

    let reason = 'receive: loop {
        let n = match socket.read(&mut buffer).await {
            Ok(0) => break 'receive "connection closed by server".to_string(),
            Ok(n) => n,
            Err(e) => break 'receive format!("read failed: {}", e),
        };
        receiver.push(&buffer[..n]);
        loop {
            match receiver.next_frame() {
                Ok(Some(frame)) => {
                    let delivered = step_if_current(&weak, generation, |state| {
                        state.core.handle_frame(frame.packet_type, &frame.payload)
                    });
                    if !delivered {
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Protocol violation: {}", e);
                    break 'receive e.to_string();
                }
            }
        }
    };

    step_if_current(&weak, generation, |state| state.core.connection_lost(&reason));
}

/// Open the TCP connection for attempt `generation` and start its tasks.
async fn open(weak: Weak<Inner>, generation: u64, addr: SocketAddr) {
    debug!("Connecting to {}", addr);
    let result = TcpStream::connect(addr).await;
    let Some(inner) = weak.upgrade() else {
        return;
    };

    match result {
        Ok(stream) => {
            if let Err(e) = stream.set_nodelay(true) {
                debug!("Could not disable Nagle: {}", e);
            }
            let (read_half, write_half) = stream.into_split();
            let max_frame_len = inner.config.max_frame_len;
            step_if_current(&weak, generation, |state| {
                let (tx, rx) = mpsc::unbounded_channel();
                tokio::spawn(write_loop(write_half, rx));
                let reader = tokio::spawn(read_loop(weak.clone(), generation, read_half, max_frame_len));
                state.link = Some(Link {
                    outbound: tx,
                    reader,
                    keepalive: None,
                });
                state.core.connected(addr)
            });
        }
        Err(e) => {
            step_if_current(&weak, generation, |state| state.core.connect_failed(e.to_string()));
        }
    }
}

impl GGClient {
    /// Connect through server discovery. Returns once the lookup has been
    /// started; progress is reported through events. Needs a Tokio runtime.
    pub fn connect(&self) -> Result<()> {
        if let Some(addr) = self.inner.config.server_addr()? {
            return self.connect_to(addr);
        }
        let discovery = self
            .inner
            .discovery
            .clone()
            .ok_or_else(|| GGError::Discovery("no server discovery configured".to_string()))?;

        let generation = {
            let mut state = self.inner.lock_state();
            state.core.begin_resolve()?;
            state.generation += 1;
            state.generation
        };

        let uin = self.uin();
        let port = self.inner.config.port;
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let result = discovery.resolve(uin).await;
            let mut resolved = None;
            step_if_current(&weak, generation, |state| match result {
                Ok(Some(ip)) => {
                    resolved = Some(SocketAddr::new(ip, port));
                    state.core.server_resolved(ip)
                }
                Ok(None) => state.core.discovery_failed(format!("no server found for {}", uin)),
                Err(e) => state.core.discovery_failed(e.to_string()),
            });
            if let Some(addr) = resolved {
                open(weak, generation, addr).await;
            }
        });
        Ok(())
    }

    /// Connect straight to `addr`, skipping discovery.
    pub fn connect_to(&self, addr: SocketAddr) -> Result<()> {
        let generation = {
            let mut state = self.inner.lock_state();
            state.core.begin_connect()?;
            state.generation += 1;
            state.generation
        };
        info!("Connecting to {}", addr);
        tokio::spawn(open(Arc::downgrade(&self.inner), generation, addr));
        Ok(())
    }

    /// Close the session. Queued frames are flushed before the socket shuts
    /// down; errors during teardown are not reported.
    pub fn disconnect(&self) -> Result<()> {
        {
            let mut state = self.inner.lock_state();
            let fx = state.core.begin_disconnect()?;
            apply(&self.inner, &mut state, fx);
            let fx = state.core.finish_close("disconnected by user");
            apply(&self.inner, &mut state, fx);
        }
        self.inner.deliver_pending();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::gg::events::{EventKind, GGEvent};
    use crate::gg::packets::{encode_typing_notify, split_frame};
    use crate::gg::session::tests::login;
    use crate::models::TypingState;
    use std::sync::Mutex;

    fn recorded(client: &GGClient) -> Arc<Mutex<Vec<EventKind>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        client.events().on_any(move |event: &GGEvent| sink.lock().unwrap().push(event.kind()));
        seen
    }

    /// Apply the login and a typing notice as the reader task would, but
    /// stop before delivering, as if the task were preempted there.
    fn frames_in_flight(client: &GGClient) {
        let mut state = client.inner.lock_state();
        let fx = login(&mut state.core);
        apply(&client.inner, &mut state, fx);
        let frame = encode_typing_notify(2000, TypingState::Typing, 4);
        let (packet_type, payload) = split_frame(&frame).unwrap();
        let fx = state.core.handle_frame(packet_type, payload);
        apply(&client.inner, &mut state, fx);
    }

    #[test]
    fn test_disconnect_does_not_overtake_frames_in_flight() {
        let client = GGClient::new(ClientConfig::new(1000, "haslo"));
        let seen = recorded(&client);

        frames_in_flight(&client);
        client.disconnect().unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![EventKind::LoggedIn, EventKind::TypingNotify, EventKind::Disconnected]
        );
        assert_eq!(client.state(), SessionState::Idle);

        // The preempted task resuming later has nothing left to deliver.
        client.inner.deliver_pending();
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_callback_may_call_back_into_client() {
        let client = GGClient::new(ClientConfig::new(1000, "haslo"));
        let seen = recorded(&client);
        let handle = client.clone();
        client.events().on(EventKind::TypingNotify, move |_| {
            handle.disconnect().unwrap();
        });

        frames_in_flight(&client);
        client.inner.deliver_pending();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![EventKind::LoggedIn, EventKind::TypingNotify, EventKind::Disconnected]
        );
        assert_eq!(client.state(), SessionState::Idle);
    }
}
