// Session state machine
// Connection/login lifecycle and inbound frame dispatch. Everything here is
// synchronous: each transition returns the Effects (frames to write, events
// to raise, timer and socket changes) for the connection layer to carry out.

use log::{debug, info, trace, warn};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use zeroize::Zeroizing;

use super::contact_list::ContactListCodec;
use super::events::GGEvent;
use super::hash::{login_hash, HashType};
use super::packets::{self, InboundKind, LoginParams};
use super::roster::Roster;
use crate::config::ClientConfig;
use crate::error::{GGError, Result};
use crate::models::{Status, Uin};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    ResolvingServer,
    Connecting,
    AwaitingWelcome,
    Authenticating,
    Active,
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAlive {
    Start,
    Stop,
}

/// Side effects of one state machine step, applied in order: frames,
/// keep-alive change, socket close. Events are raised last, outside any lock.
#[derive(Debug, Default)]
pub struct Effects {
    pub frames: Vec<Vec<u8>>,
    pub events: Vec<GGEvent>,
    pub keepalive: Option<KeepAlive>,
    pub close: bool,
}

impl Effects {
    pub fn send(&mut self, frame: Vec<u8>) {
        self.frames.push(frame);
    }

    pub fn emit(&mut self, event: GGEvent) {
        self.events.push(event);
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty() && self.events.is_empty() && self.keepalive.is_none() && !self.close
    }
}

type Handler = fn(&mut SessionCore, &[u8], &mut Effects);

/// Inbound frame kind to handler.
const DISPATCH: &[(InboundKind, Handler)] = &[
    (InboundKind::Welcome, SessionCore::handle_welcome),
    (InboundKind::LoginOk, SessionCore::handle_login_ok),
    (InboundKind::LoginFailed, SessionCore::handle_login_failed),
    (InboundKind::Disconnecting, SessionCore::handle_disconnecting),
    (InboundKind::Pong, SessionCore::handle_pong),
    (InboundKind::ReceiveMessage, SessionCore::handle_receive_message),
    (InboundKind::ReceiveOwnMessage, SessionCore::handle_receive_own_message),
    (InboundKind::SendMessageAck, SessionCore::handle_send_message_ack),
    (InboundKind::NotifyReply, SessionCore::handle_notify_reply),
    (InboundKind::Status, SessionCore::handle_notify_reply),
    (InboundKind::NeedEmail, SessionCore::handle_need_email),
    (InboundKind::MultiloginInfo, SessionCore::handle_multilogin_info),
    (InboundKind::TypingNotify, SessionCore::handle_typing_notify),
    (InboundKind::PublicDirectoryReply, SessionCore::handle_public_directory_reply),
    (InboundKind::XmlEvent, SessionCore::handle_xml_event),
    (InboundKind::XmlAction, SessionCore::handle_xml_action),
    (InboundKind::UserListReply, SessionCore::handle_userlist_reply),
    (InboundKind::UserListVersion, SessionCore::handle_userlist_version),
];

/// Protocol state of one account.
pub struct SessionCore {
    pub(super) state: SessionState,
    pub(super) uin: Uin,
    pub(super) password: Zeroizing<String>,
    pub(super) hash_type: HashType,
    pub(super) status: Status,
    pub(super) description: String,
    pub(super) status_flags: u32,
    pub(super) features: u32,
    pub(super) version: String,
    pub(super) language: String,
    pub(super) seed: Option<u32>,
    pub(super) roster: Roster,
    pub(super) next_seq: u32,
    pub(super) contact_list_codec: Option<Arc<dyn ContactListCodec>>,
    /// Upper bound for inflated payload bodies; tracks the frame length cap.
    pub(super) max_frame_len: u32,
}

impl SessionCore {
    pub fn new(config: &ClientConfig) -> Self {
        SessionCore {
            state: SessionState::Idle,
            uin: config.uin,
            password: Zeroizing::new(config.password.clone()),
            hash_type: config.hash_type,
            status: config.status,
            description: config.description.clone(),
            status_flags: config.status_flags,
            features: config.features,
            version: config.version_string.clone(),
            language: config.language.clone(),
            seed: None,
            roster: Roster::new(),
            next_seq: rand::random(),
            contact_list_codec: None,
            max_frame_len: config.max_frame_len,
        }
    }

    pub fn with_contact_list_codec(mut self, codec: Arc<dyn ContactListCodec>) -> Self {
        self.contact_list_codec = Some(codec);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn uin(&self) -> Uin {
        self.uin
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub(crate) fn require_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(GGError::NotAuthenticated)
        }
    }

    pub(crate) fn next_seq(&mut self) -> u32 {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        seq
    }

    // -----------------------------------------------------------------------
    // Lifecycle

    pub(crate) fn begin_resolve(&mut self) -> Result<Effects> {
        if self.state != SessionState::Idle {
            return Err(GGError::AlreadyConnected);
        }
        debug!("Resolving server for {}", self.uin);
        self.state = SessionState::ResolvingServer;
        Ok(Effects::default())
    }

    pub(crate) fn server_resolved(&mut self, addr: IpAddr) -> Effects {
        let mut fx = Effects::default();
        if self.state != SessionState::ResolvingServer {
            debug!("Ignoring resolved address {} in state {:?}", addr, self.state);
            return fx;
        }
        info!("Server for {} is {}", self.uin, addr);
        self.state = SessionState::Connecting;
        fx.emit(GGEvent::ServerResolved(addr));
        fx
    }

    pub(crate) fn discovery_failed(&mut self, reason: String) -> Effects {
        let mut fx = Effects::default();
        if self.state != SessionState::ResolvingServer {
            return fx;
        }
        warn!("Server discovery for {} failed: {}", self.uin, reason);
        self.state = SessionState::Idle;
        fx.emit(GGEvent::DiscoveryFailed(reason));
        fx
    }

    pub(crate) fn begin_connect(&mut self) -> Result<Effects> {
        match self.state {
            SessionState::Idle | SessionState::ResolvingServer => {
                self.state = SessionState::Connecting;
                Ok(Effects::default())
            }
            _ => Err(GGError::AlreadyConnected),
        }
    }

    pub(crate) fn connected(&mut self, addr: SocketAddr) -> Effects {
        let mut fx = Effects::default();
        if self.state != SessionState::Connecting {
            return fx;
        }
        info!("Connected to {}, waiting for welcome", addr);
        self.state = SessionState::AwaitingWelcome;
        fx.emit(GGEvent::Connected(addr));
        fx
    }

    pub(crate) fn connect_failed(&mut self, reason: String) -> Effects {
        let mut fx = Effects::default();
        if self.state != SessionState::Connecting {
            return fx;
        }
        warn!("Connection failed: {}", reason);
        self.state = SessionState::Idle;
        fx.close = true;
        fx.emit(GGEvent::ConnectFailed(reason));
        fx
    }

    /// Start an explicit disconnect. The caller tears the link down and then
    /// calls [`Self::finish_close`].
    pub(crate) fn begin_disconnect(&mut self) -> Result<Effects> {
        if self.state == SessionState::Idle {
            return Err(GGError::NotConnected);
        }
        info!("Disconnecting {} from state {:?}", self.uin, self.state);
        self.state = SessionState::Closing;
        Ok(Effects {
            keepalive: Some(KeepAlive::Stop),
            close: true,
            ..Default::default()
        })
    }

    pub(crate) fn finish_close(&mut self, reason: &str) -> Effects {
        let mut fx = Effects::default();
        if self.state == SessionState::Idle {
            return fx;
        }
        self.state = SessionState::Idle;
        self.seed = None;
        fx.emit(GGEvent::Disconnected(reason.to_string()));
        fx
    }

    /// Socket error, EOF or protocol violation.
    pub(crate) fn connection_lost(&mut self, reason: &str) -> Effects {
        match self.state {
            SessionState::Idle => Effects::default(),
            SessionState::Connecting => self.connect_failed(reason.to_string()),
            _ => {
                warn!("Connection lost in state {:?}: {}", self.state, reason);
                let mut fx = Effects {
                    keepalive: Some(KeepAlive::Stop),
                    close: true,
                    ..Default::default()
                };
                fx.events.extend(self.finish_close(reason).events);
                fx
            }
        }
    }

    // -----------------------------------------------------------------------
    // Inbound frames

    fn accepts(&self, kind: InboundKind) -> bool {
        match kind {
            InboundKind::Welcome => self.state == SessionState::AwaitingWelcome,
            kind if kind.is_handshake() => self.state == SessionState::Authenticating,
            _ => self.state == SessionState::Active,
        }
    }

    pub fn handle_frame(&mut self, packet_type: u32, payload: &[u8]) -> Effects {
        let mut fx = Effects::default();
        let Some(kind) = InboundKind::from_type(packet_type) else {
            debug!("Ignoring unknown frame {:#x} ({} bytes)", packet_type, payload.len());
            trace!("Unknown frame payload: {}", hex::encode(&payload[..payload.len().min(64)]));
            return fx;
        };
        if !self.accepts(kind) {
            debug!("Ignoring {:?} frame in state {:?}", kind, self.state);
            return fx;
        }
        match DISPATCH.iter().find(|(k, _)| *k == kind) {
            Some((_, handler)) => handler(self, payload, &mut fx),
            None => debug!("No handler for {:?}", kind),
        }
        fx
    }

    fn handle_welcome(&mut self, payload: &[u8], fx: &mut Effects) {
        let seed = match packets::decode_welcome(payload) {
            Ok(seed) => seed,
            Err(e) => {
                let lost = self.connection_lost(&format!("malformed welcome: {}", e));
                fx.keepalive = lost.keepalive;
                fx.close = lost.close;
                fx.events.extend(lost.events);
                return;
            }
        };
        debug!("Welcome seed {:#010x}, logging in as {}", seed, self.uin);
        self.seed = Some(seed);
        let params = LoginParams {
            uin: self.uin,
            language: &self.language,
            hash_type: self.hash_type.code(),
            hash: login_hash(self.hash_type, &self.password, seed),
            status: self.status,
            status_flags: self.status_flags,
            features: self.features,
            version: &self.version,
            description: &self.description,
        };
        fx.send(packets::encode_login(&params));
        self.state = SessionState::Authenticating;
    }

    fn handle_login_ok(&mut self, _payload: &[u8], fx: &mut Effects) {
        fx.send(packets::encode_list_empty());
        let batches = self.roster.notify_frames();
        debug!(
            "Uploading {} contacts in {} frames",
            self.roster.len(),
            batches.len()
        );
        fx.frames.extend(batches);
        fx.keepalive = Some(KeepAlive::Start);
        self.state = SessionState::Active;
        info!("Logged in as {}", self.uin);
        fx.emit(GGEvent::LoggedIn);
    }

    fn handle_login_failed(&mut self, _payload: &[u8], fx: &mut Effects) {
        warn!("Login for {} rejected", self.uin);
        self.state = SessionState::Idle;
        self.seed = None;
        fx.close = true;
        fx.emit(GGEvent::LoginFailed);
    }

    fn handle_disconnecting(&mut self, _payload: &[u8], _fx: &mut Effects) {
        info!("Server is closing the session");
    }

    fn handle_pong(&mut self, _payload: &[u8], _fx: &mut Effects) {
        debug!("Pong");
    }
}
