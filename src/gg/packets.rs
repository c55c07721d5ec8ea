//! Binary frame codec.
//!
//! Pure encode/decode routines for every frame kind the client speaks. No
//! I/O happens here: encoders return complete frames (header included),
//! decoders take the payload that [`FrameReceiver`](super::transport::FrameReceiver)
//! cut out of the stream.
//!
//! ```text
//! +-------------+---------------+-------------------+
//! | type (u32)  | length (u32)  | payload (length)  |
//! +-------------+---------------+-------------------+
//! ```
//!
//! All integers are little-endian.

use chrono::{DateTime, TimeZone, Utc};
use log::warn;
use std::net::Ipv4Addr;

use super::consts::*;
use crate::error::DecodeError;
use crate::models::{
    Contact, ContactType, DeliveryStatus, MessageAck, MultiloginSession, ReceivedMessage, Status,
    StatusInfo, TypingNotify, TypingState, Uin,
};

type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Closed set of inbound frame kinds the session understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InboundKind {
    Welcome,
    LoginOk,
    LoginFailed,
    Disconnecting,
    Pong,
    ReceiveMessage,
    ReceiveOwnMessage,
    SendMessageAck,
    NotifyReply,
    Status,
    NeedEmail,
    MultiloginInfo,
    TypingNotify,
    PublicDirectoryReply,
    XmlEvent,
    XmlAction,
    UserListReply,
    UserListVersion,
}

impl InboundKind {
    pub fn from_type(packet_type: u32) -> Option<Self> {
        let kind = match packet_type {
            GG_WELCOME => InboundKind::Welcome,
            GG_LOGIN80_OK => InboundKind::LoginOk,
            GG_LOGIN80_FAILED => InboundKind::LoginFailed,
            GG_DISCONNECTING => InboundKind::Disconnecting,
            GG_PONG => InboundKind::Pong,
            GG_RECV_MSG80 => InboundKind::ReceiveMessage,
            GG_RECV_OWN_MSG => InboundKind::ReceiveOwnMessage,
            GG_SEND_MSG_ACK => InboundKind::SendMessageAck,
            GG_NOTIFY_REPLY80 => InboundKind::NotifyReply,
            GG_STATUS80 => InboundKind::Status,
            GG_NEED_EMAIL => InboundKind::NeedEmail,
            GG_MULTILOGON_INFO => InboundKind::MultiloginInfo,
            GG_TYPING_NOTIFY => InboundKind::TypingNotify,
            GG_PUBDIR50_REPLY => InboundKind::PublicDirectoryReply,
            GG_XML_EVENT => InboundKind::XmlEvent,
            GG_XML_ACTION => InboundKind::XmlAction,
            GG_USERLIST100_REPLY => InboundKind::UserListReply,
            GG_USERLIST100_VERSION => InboundKind::UserListVersion,
            _ => return None,
        };
        Some(kind)
    }

    /// Frames that are meaningful before the session is active.
    pub fn is_handshake(self) -> bool {
        matches!(
            self,
            InboundKind::Welcome | InboundKind::LoginOk | InboundKind::LoginFailed
        )
    }
}

/// Sequential little-endian reader over a payload.
pub struct PacketReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        PacketReader { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn read_bytes(&mut self, len: usize) -> DecodeResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(DecodeError::UnexpectedEof {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> DecodeResult<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> DecodeResult<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> DecodeResult<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_u64(&mut self) -> DecodeResult<u64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.read_bytes(8)?);
        Ok(u64::from_le_bytes(raw))
    }

    /// IPv4 address in network byte order.
    pub fn read_ipv4(&mut self) -> DecodeResult<Ipv4Addr> {
        let bytes = self.read_bytes(4)?;
        Ok(Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]))
    }

    /// String prefixed by a u32 byte length.
    pub fn read_sized_string(&mut self) -> DecodeResult<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// NUL-terminated string; a missing terminator ends at the payload end.
    pub fn read_cstring(&mut self) -> DecodeResult<String> {
        let rest = &self.data[self.pos..];
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        let text = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.pos += (end + 1).min(rest.len());
        Ok(text)
    }

    /// Everything not consumed yet.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos..];
        self.pos = self.data.len();
        rest
    }
}

/// Little-endian frame builder.
#[derive(Default)]
pub struct PacketWriter {
    data: Vec<u8>,
}

impl PacketWriter {
    pub fn new() -> Self {
        PacketWriter { data: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.data.push(value);
        self
    }

    pub fn write_u16(&mut self, value: u16) -> &mut Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.data.extend_from_slice(bytes);
        self
    }

    /// NUL-terminated string.
    pub fn write_cstring(&mut self, text: &str) -> &mut Self {
        self.data.extend_from_slice(text.as_bytes());
        self.data.push(0);
        self
    }

    /// String prefixed by a u32 byte length, no terminator.
    pub fn write_sized_string(&mut self, text: &str) -> &mut Self {
        self.write_u32(text.len() as u32);
        self.data.extend_from_slice(text.as_bytes());
        self
    }

    pub fn payload(&self) -> &[u8] {
        &self.data
    }

    /// Prefix the accumulated payload with a frame header.
    pub fn into_frame(self, packet_type: u32) -> Vec<u8> {
        frame(packet_type, &self.data)
    }
}

/// Build a complete frame from a type and payload.
pub fn frame(packet_type: u32, payload: &[u8]) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(GG_HEADER_LEN + payload.len());
    buffer.extend_from_slice(&packet_type.to_le_bytes());
    buffer.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buffer.extend_from_slice(payload);
    buffer
}

/// Split a complete frame back into its type and payload.
pub fn split_frame(bytes: &[u8]) -> DecodeResult<(u32, &[u8])> {
    let mut reader = PacketReader::new(bytes);
    let packet_type = reader.read_u32()?;
    let len = reader.read_u32()? as usize;
    let payload = reader.read_bytes(len)?;
    Ok((packet_type, payload))
}

fn timestamp(secs: u32) -> DateTime<Utc> {
    Utc.timestamp_opt(i64::from(secs), 0)
        .single()
        .unwrap_or_else(|| DateTime::<Utc>::from(std::time::UNIX_EPOCH))
}

// ---------------------------------------------------------------------------
// Handshake

pub fn decode_welcome(payload: &[u8]) -> DecodeResult<u32> {
    PacketReader::new(payload).read_u32()
}

pub fn encode_welcome(seed: u32) -> Vec<u8> {
    let mut writer = PacketWriter::new();
    writer.write_u32(seed);
    writer.into_frame(GG_WELCOME)
}

/// Everything that goes into a LOGIN80 frame.
#[derive(Debug, Clone)]
pub struct LoginParams<'a> {
    pub uin: Uin,
    pub language: &'a str,
    pub hash_type: u8,
    pub hash: [u8; GG_LOGIN_HASH_LEN],
    pub status: Status,
    pub status_flags: u32,
    pub features: u32,
    pub version: &'a str,
    pub description: &'a str,
}

pub fn encode_login(params: &LoginParams<'_>) -> Vec<u8> {
    let mut language = [0u8; 2];
    for (slot, byte) in language.iter_mut().zip(params.language.bytes()) {
        *slot = byte;
    }

    let mut writer = PacketWriter::new();
    writer
        .write_u32(params.uin)
        .write_bytes(&language)
        .write_u8(params.hash_type)
        .write_bytes(&params.hash)
        .write_u32(params.status.code(!params.description.is_empty()))
        .write_u32(params.status_flags)
        .write_u32(params.features)
        .write_u32(0) // local ip
        .write_u16(0) // local port
        .write_u32(0) // external ip
        .write_u16(0) // external port
        .write_u8(GG_IMAGE_SIZE)
        .write_u8(0x64)
        .write_sized_string(params.version)
        .write_sized_string(params.description);
    writer.into_frame(GG_LOGIN80)
}

/// Fields of a decoded LOGIN80 payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLogin {
    pub uin: Uin,
    pub hash_type: u8,
    pub hash: Vec<u8>,
    pub status: Status,
    pub status_flags: u32,
    pub features: u32,
    pub version: String,
    pub description: String,
}

pub fn decode_login(payload: &[u8]) -> DecodeResult<DecodedLogin> {
    let mut reader = PacketReader::new(payload);
    let uin = reader.read_u32()?;
    reader.read_bytes(2)?;
    let hash_type = reader.read_u8()?;
    let hash = reader.read_bytes(GG_LOGIN_HASH_LEN)?.to_vec();
    let code = reader.read_u32()?;
    let (status, _) = Status::from_code(code)
        .ok_or_else(|| DecodeError::InvalidValue(format!("status code {:#x}", code)))?;
    let status_flags = reader.read_u32()?;
    let features = reader.read_u32()?;
    reader.read_bytes(4 + 2 + 4 + 2 + 1 + 1)?;
    let version = reader.read_sized_string()?;
    let description = reader.read_sized_string()?;
    Ok(DecodedLogin {
        uin,
        hash_type,
        hash,
        status,
        status_flags,
        features,
        version,
        description,
    })
}

// ---------------------------------------------------------------------------
// Status

pub fn encode_status(status: Status, flags: u32, description: &str) -> Vec<u8> {
    let mut writer = PacketWriter::new();
    writer
        .write_u32(status.code(!description.is_empty()))
        .write_u32(flags)
        .write_sized_string(description);
    writer.into_frame(GG_NEW_STATUS80)
}

/// Decode a NEW_STATUS80 payload into status, flags and description.
pub fn decode_status(payload: &[u8]) -> DecodeResult<(Status, u32, String)> {
    let mut reader = PacketReader::new(payload);
    let code = reader.read_u32()?;
    let (status, _) = Status::from_code(code)
        .ok_or_else(|| DecodeError::InvalidValue(format!("status code {:#x}", code)))?;
    let flags = reader.read_u32()?;
    let description = reader.read_sized_string()?;
    Ok((status, flags, description))
}

fn read_status_entry(reader: &mut PacketReader<'_>) -> DecodeResult<StatusInfo> {
    let uin = reader.read_u32()?;
    let code = reader.read_u32()?;
    let flags = reader.read_u32()?;
    let remote_ip = reader.read_ipv4()?;
    let remote_port = reader.read_u16()?;
    let _image_size = reader.read_u8()?;
    let _unknown1 = reader.read_u8()?;
    let _unknown2 = reader.read_u32()?;
    let description = reader.read_sized_string()?;
    let status = match Status::from_code(code) {
        Some((status, _)) => status,
        None => {
            warn!("Unknown status code {:#x} for {}, treating as not available", code, uin);
            Status::NotAvailable
        }
    };
    Ok(StatusInfo {
        uin,
        status,
        description,
        flags,
        remote_ip,
        remote_port,
    })
}

/// Entries of a NOTIFY_REPLY80 or STATUS80 frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyReply {
    pub entries: Vec<StatusInfo>,
    /// Why decoding stopped early; the entries before it are still valid.
    pub truncated: Option<DecodeError>,
}

/// Decode NOTIFY_REPLY80 (any number of entries) or STATUS80 (one entry).
/// A bad entry ends decoding without discarding the ones before it.
pub fn decode_notify_reply(payload: &[u8]) -> NotifyReply {
    let mut reader = PacketReader::new(payload);
    let mut entries = Vec::new();
    while reader.remaining() > 0 {
        match read_status_entry(&mut reader) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                return NotifyReply {
                    entries,
                    truncated: Some(e),
                }
            }
        }
    }
    NotifyReply {
        entries,
        truncated: None,
    }
}

pub fn encode_notify_reply(packet_type: u32, entries: &[StatusInfo]) -> Vec<u8> {
    let mut writer = PacketWriter::new();
    for entry in entries {
        writer
            .write_u32(entry.uin)
            .write_u32(entry.status.code(!entry.description.is_empty()))
            .write_u32(entry.flags)
            .write_bytes(&entry.remote_ip.octets())
            .write_u16(entry.remote_port)
            .write_u8(0)
            .write_u8(0)
            .write_u32(0)
            .write_sized_string(&entry.description);
    }
    writer.into_frame(packet_type)
}

// ---------------------------------------------------------------------------
// Roster subscription

pub fn encode_list_empty() -> Vec<u8> {
    frame(GG_LIST_EMPTY, &[])
}

fn encode_notify_entries(packet_type: u32, contacts: &[Contact]) -> Vec<u8> {
    let mut writer = PacketWriter::new();
    for contact in contacts {
        writer.write_u32(contact.uin).write_u8(contact.contact_type.code());
    }
    writer.into_frame(packet_type)
}

pub fn encode_add_notify(uin: Uin, contact_type: ContactType) -> Vec<u8> {
    let mut writer = PacketWriter::new();
    writer.write_u32(uin).write_u8(contact_type.code());
    writer.into_frame(GG_ADD_NOTIFY)
}

pub fn encode_remove_notify(uin: Uin, contact_type: ContactType) -> Vec<u8> {
    let mut writer = PacketWriter::new();
    writer.write_u32(uin).write_u8(contact_type.code());
    writer.into_frame(GG_REMOVE_NOTIFY)
}

/// One NOTIFY_FIRST / NOTIFY_LAST batch.
pub fn encode_notify_batch(contacts: &[Contact], last: bool) -> Vec<u8> {
    let packet_type = if last { GG_NOTIFY_LAST } else { GG_NOTIFY_FIRST };
    encode_notify_entries(packet_type, contacts)
}

/// Decode the (uin, type) entries of a subscription frame.
pub fn decode_notify_entries(payload: &[u8]) -> DecodeResult<Vec<(Uin, ContactType)>> {
    let mut reader = PacketReader::new(payload);
    let mut entries = Vec::with_capacity(payload.len() / 5);
    while reader.remaining() > 0 {
        let uin = reader.read_u32()?;
        let code = reader.read_u8()?;
        let contact_type = ContactType::from_code(code)
            .ok_or_else(|| DecodeError::InvalidValue(format!("contact type {:#x}", code)))?;
        entries.push((uin, contact_type));
    }
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Messages

/// Build the conference attribute block sent to `recipient`: option byte,
/// count of the other participants, then their numbers.
pub fn conference_attributes(recipients: &[Uin], recipient: Uin) -> Vec<u8> {
    let others: Vec<Uin> = recipients.iter().copied().filter(|&uin| uin != recipient).collect();
    let mut writer = PacketWriter::new();
    writer.write_u8(GG_MSG_OPTION_CONFERENCE).write_u32(others.len() as u32);
    for uin in others {
        writer.write_u32(uin);
    }
    writer.payload().to_vec()
}

/// Pull the conference member list out of a message attribute blob.
///
/// The blob may start either at the option byte or at the NUL closing the
/// plain text (`00 01 count ...`). Returns `Ok(None)` when there is no
/// conference marker.
pub fn parse_conference(attributes: &[u8]) -> DecodeResult<Option<Vec<Uin>>> {
    let body = match attributes {
        [0x00, GG_MSG_OPTION_CONFERENCE, rest @ ..] => rest,
        [GG_MSG_OPTION_CONFERENCE, rest @ ..] => rest,
        _ => return Ok(None),
    };
    let mut reader = PacketReader::new(body);
    let count = reader.read_u32()? as usize;
    if count > reader.remaining() / 4 {
        return Err(DecodeError::InvalidValue(format!(
            "conference lists {} members but only {} bytes follow",
            count,
            reader.remaining()
        )));
    }
    let mut members = Vec::with_capacity(count);
    for _ in 0..count {
        members.push(reader.read_u32()?);
    }
    Ok(Some(members))
}

pub fn encode_send_message(
    recipient: Uin,
    seq: u32,
    plain: &str,
    html: &str,
    attributes: &[u8],
) -> Vec<u8> {
    const HEADER: usize = 20;
    let offset_plain = HEADER + html.len() + 1;
    let offset_attributes = offset_plain + plain.len() + 1;

    let mut writer = PacketWriter::new();
    writer
        .write_u32(recipient)
        .write_u32(seq)
        .write_u32(GG_CLASS_CHAT)
        .write_u32(offset_plain as u32)
        .write_u32(offset_attributes as u32)
        .write_cstring(html)
        .write_cstring(plain)
        .write_bytes(attributes);
    writer.into_frame(GG_SEND_MSG80)
}

/// Fields of a decoded SEND_MSG80 payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingFrame {
    pub recipient: Uin,
    pub seq: u32,
    pub plain: String,
    pub html: String,
    pub attributes: Vec<u8>,
}

pub fn decode_send_message(payload: &[u8]) -> DecodeResult<OutgoingFrame> {
    let mut reader = PacketReader::new(payload);
    let recipient = reader.read_u32()?;
    let seq = reader.read_u32()?;
    let _class = reader.read_u32()?;
    let offset_plain = reader.read_u32()? as usize;
    let offset_attributes = reader.read_u32()? as usize;
    let body = MessageBody::decode(payload, reader.position(), offset_plain, offset_attributes)?;
    Ok(OutgoingFrame {
        recipient,
        seq,
        plain: body.plain,
        html: body.html,
        attributes: body.attributes,
    })
}

struct MessageBody {
    plain: String,
    html: String,
    attributes: Vec<u8>,
}

impl MessageBody {
    fn decode(
        payload: &[u8],
        html_start: usize,
        offset_plain: usize,
        offset_attributes: usize,
    ) -> DecodeResult<Self> {
        let len = payload.len();
        if offset_plain < html_start || offset_plain > len {
            return Err(DecodeError::InvalidOffset { offset: offset_plain, len });
        }
        if offset_attributes < offset_plain || offset_attributes > len {
            return Err(DecodeError::InvalidOffset { offset: offset_attributes, len });
        }
        Ok(MessageBody {
            html: cstring(&payload[html_start..offset_plain]),
            plain: cstring(&payload[offset_plain..offset_attributes]),
            attributes: payload[offset_attributes..].to_vec(),
        })
    }
}

/// Text up to the first NUL.
fn cstring(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Decode RECV_MSG80 / RECV_OWN_MSG.
///
/// The fixed header must be present, otherwise the frame is rejected. A
/// broken body (bad offsets) degrades to empty texts so the caller can still
/// acknowledge the sequence number. Conference parsing only happens when
/// `parse_conference_members` is set, and a malformed conference block is
/// dropped rather than failing the message.
pub fn decode_receive_message(
    payload: &[u8],
    parse_conference_members: bool,
) -> DecodeResult<ReceivedMessage> {
    let mut reader = PacketReader::new(payload);
    let sender = reader.read_u32()?;
    let seq = reader.read_u32()?;
    let time = reader.read_u32()?;
    let _class = reader.read_u32()?;
    let offset_plain = reader.read_u32()? as usize;
    let offset_attributes = reader.read_u32()? as usize;

    let body = match MessageBody::decode(payload, reader.position(), offset_plain, offset_attributes) {
        Ok(body) => body,
        Err(e) => {
            warn!("Discarding unparsable body of message {} from {}: {}", seq, sender, e);
            MessageBody {
                plain: String::new(),
                html: String::new(),
                attributes: Vec::new(),
            }
        }
    };

    let conference = if parse_conference_members {
        match parse_conference(&body.attributes) {
            Ok(members) => members,
            Err(e) => {
                warn!("Ignoring malformed conference attributes in message {} from {}: {}", seq, sender, e);
                None
            }
        }
    } else {
        None
    };

    Ok(ReceivedMessage {
        sender,
        seq,
        timestamp: timestamp(time),
        plain: body.plain,
        html: body.html,
        attributes: body.attributes,
        conference,
    })
}

/// Read only the sequence number, for acknowledging frames whose header is cut short.
pub fn peek_message_seq(payload: &[u8]) -> Option<u32> {
    let mut reader = PacketReader::new(payload);
    reader.read_u32().ok()?;
    reader.read_u32().ok()
}

pub fn encode_receive_message(packet_type: u32, message: &ReceivedMessage) -> Vec<u8> {
    const HEADER: usize = 24;
    let offset_plain = HEADER + message.html.len() + 1;
    let offset_attributes = offset_plain + message.plain.len() + 1;

    let mut writer = PacketWriter::new();
    writer
        .write_u32(message.sender)
        .write_u32(message.seq)
        .write_u32(message.timestamp.timestamp() as u32)
        .write_u32(GG_CLASS_CHAT)
        .write_u32(offset_plain as u32)
        .write_u32(offset_attributes as u32)
        .write_cstring(&message.html)
        .write_cstring(&message.plain)
        .write_bytes(&message.attributes);
    writer.into_frame(packet_type)
}

pub fn encode_receive_ack(seq: u32) -> Vec<u8> {
    let mut writer = PacketWriter::new();
    writer.write_u32(seq);
    writer.into_frame(GG_RECV_MSG_ACK)
}

pub fn decode_send_message_ack(payload: &[u8]) -> DecodeResult<MessageAck> {
    let mut reader = PacketReader::new(payload);
    let status = DeliveryStatus::from_code(reader.read_u32()?);
    let recipient = reader.read_u32()?;
    let seq = reader.read_u32()?;
    Ok(MessageAck {
        recipient,
        seq,
        status,
    })
}

// ---------------------------------------------------------------------------
// Keep-alive, typing, multilogin

pub fn encode_ping() -> Vec<u8> {
    frame(GG_PING, &[])
}

pub fn encode_typing_notify(uin: Uin, state: TypingState, length: u16) -> Vec<u8> {
    let wire_length = match state {
        TypingState::None => length,
        TypingState::Stopped => 0,
        TypingState::Typing => length.max(1),
    };
    let mut writer = PacketWriter::new();
    writer.write_u16(wire_length).write_u32(uin);
    writer.into_frame(GG_TYPING_NOTIFY)
}

pub fn decode_typing_notify(payload: &[u8]) -> DecodeResult<TypingNotify> {
    let mut reader = PacketReader::new(payload);
    let length = reader.read_u16()?;
    let uin = reader.read_u32()?;
    let state = if length == 0 {
        TypingState::Stopped
    } else {
        TypingState::Typing
    };
    Ok(TypingNotify { uin, state, length })
}

pub fn decode_multilogin_info(payload: &[u8]) -> DecodeResult<Vec<MultiloginSession>> {
    let mut reader = PacketReader::new(payload);
    let count = reader.read_u32()? as usize;
    // each entry is at least 32 bytes
    let mut sessions = Vec::with_capacity(count.min(reader.remaining() / 32));
    for _ in 0..count {
        let ip = reader.read_ipv4()?;
        let flags = reader.read_u32()?;
        let features = reader.read_u32()?;
        let logon_time = timestamp(reader.read_u32()?);
        let connection_id = reader.read_u64()?;
        let _unknown = reader.read_u32()?;
        let client_name = reader.read_sized_string()?;
        sessions.push(MultiloginSession {
            connection_id,
            ip,
            flags,
            features,
            logon_time,
            client_name,
        });
    }
    Ok(sessions)
}

pub fn encode_multilogin_info(sessions: &[MultiloginSession]) -> Vec<u8> {
    let mut writer = PacketWriter::new();
    writer.write_u32(sessions.len() as u32);
    for session in sessions {
        writer
            .write_bytes(&session.ip.octets())
            .write_u32(session.flags)
            .write_u32(session.features)
            .write_u32(session.logon_time.timestamp() as u32)
            .write_u64(session.connection_id)
            .write_u32(0)
            .write_sized_string(&session.client_name);
    }
    writer.into_frame(GG_MULTILOGON_INFO)
}

pub fn encode_multilogin_disconnect(connection_id: u64) -> Vec<u8> {
    let mut writer = PacketWriter::new();
    writer.write_u64(connection_id);
    writer.into_frame(GG_MULTILOGON_DISCONNECT)
}

// ---------------------------------------------------------------------------
// XML pushes and contact list version

pub fn decode_xml(payload: &[u8]) -> String {
    cstring(payload)
}

pub fn decode_userlist_version(payload: &[u8]) -> DecodeResult<u32> {
    PacketReader::new(payload).read_u32()
}
