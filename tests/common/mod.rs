// Common test utilities for integration tests
// A loopback fake server speaking raw GG frames, plus event helpers.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Once;
use std::time::Duration;

use anyhow::{anyhow, Result};
use futures_util::StreamExt;
use log::{debug, LevelFilter};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_stream::wrappers::UnboundedReceiverStream;

use gadu::gg::consts::*;
use gadu::gg::packets;
use gadu::gg::transport::{FrameReceiver, RawFrame};
use gadu::{ClientConfig, GGClient, GGEvent};

// Initialize logging once
static INIT_LOGGER: Once = Once::new();

pub const TEST_UIN: u32 = 1000;
pub const TEST_PASSWORD: &str = "tajne haslo";
pub const TEST_SEED: u32 = 0x5eed_1234;

const WAIT: Duration = Duration::from_secs(5);

/// Set up the logger for the tests
pub fn setup_logging() {
    INIT_LOGGER.call_once(|| {
        env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .init();
    });
}

pub fn test_config() -> ClientConfig {
    ClientConfig::new(TEST_UIN, TEST_PASSWORD)
}

/// Wait for the next event, failing after a few seconds.
pub async fn next_event(events: &mut UnboundedReceiverStream<GGEvent>) -> Result<GGEvent> {
    timeout(WAIT, events.next())
        .await
        .map_err(|_| anyhow!("timed out waiting for an event"))?
        .ok_or_else(|| anyhow!("event stream ended"))
}

/// Skip events until one matches `wanted`.
pub async fn wait_for<F>(events: &mut UnboundedReceiverStream<GGEvent>, wanted: F) -> Result<GGEvent>
where
    F: Fn(&GGEvent) -> bool,
{
    loop {
        let event = next_event(events).await?;
        if wanted(&event) {
            return Ok(event);
        }
        debug!("Skipping event {:?}", event);
    }
}

/// Listening side of the fake server.
pub struct FakeServer {
    listener: TcpListener,
}

impl FakeServer {
    pub async fn bind() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Ok(FakeServer { listener })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn accept(&self) -> Result<ServerConn> {
        let (stream, peer) = timeout(WAIT, self.listener.accept())
            .await
            .map_err(|_| anyhow!("timed out waiting for the client"))??;
        debug!("Fake server accepted {}", peer);
        Ok(ServerConn {
            stream,
            receiver: FrameReceiver::new(GG_DEFAULT_MAX_FRAME_LEN),
            pending: Vec::new(),
        })
    }
}

/// One accepted client connection.
pub struct ServerConn {
    stream: TcpStream,
    receiver: FrameReceiver,
    pending: Vec<RawFrame>,
}

impl ServerConn {
    pub async fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.stream.write_all(frame).await?;
        Ok(())
    }

    /// Read the next complete frame from the client.
    pub async fn read_frame(&mut self) -> Result<RawFrame> {
        let mut buffer = [0u8; 4096];
        loop {
            if !self.pending.is_empty() {
                return Ok(self.pending.remove(0));
            }
            let n = timeout(WAIT, self.stream.read(&mut buffer))
                .await
                .map_err(|_| anyhow!("timed out waiting for a frame"))??;
            if n == 0 {
                return Err(anyhow!("client closed the connection"));
            }
            self.pending.extend(self.receiver.feed(&buffer[..n])?);
        }
    }

    /// Read frames until one of `packet_type` arrives; pings are skipped.
    pub async fn expect(&mut self, packet_type: u32) -> Result<RawFrame> {
        loop {
            let frame = self.read_frame().await?;
            if frame.packet_type == packet_type {
                return Ok(frame);
            }
            if frame.packet_type != GG_PING {
                return Err(anyhow!(
                    "expected frame {:#x}, got {:#x}",
                    packet_type,
                    frame.packet_type
                ));
            }
        }
    }

    /// Wait until the client shuts its side of the socket.
    pub async fn expect_closed(&mut self) -> Result<()> {
        loop {
            match self.read_frame().await {
                Ok(frame) => debug!("Draining frame {:#x}", frame.packet_type),
                Err(_) => return Ok(()),
            }
        }
    }

    /// Send the welcome seed and return the login frame the client answers with.
    pub async fn welcome(&mut self) -> Result<RawFrame> {
        self.send(&packets::encode_welcome(TEST_SEED)).await?;
        self.expect(GG_LOGIN80).await
    }

    pub async fn accept_login(&mut self) -> Result<()> {
        self.send(&packets::frame(GG_LOGIN80_OK, &[])).await
    }

    pub async fn close(mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

/// Connect `client` to `server` and walk through welcome and login.
/// Returns the server side with the post-login frames still unread.
pub async fn logged_in(
    client: &GGClient,
    server: &FakeServer,
    events: &mut UnboundedReceiverStream<GGEvent>,
) -> Result<ServerConn> {
    client.connect_to(server.addr()?)?;
    let mut conn = server.accept().await?;
    conn.welcome().await?;
    conn.accept_login().await?;
    wait_for(events, |event| matches!(event, GGEvent::LoggedIn)).await?;
    Ok(conn)
}
