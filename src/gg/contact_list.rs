// Server-side contact list (userlist100)
// Import, export and deletion of the contact list stored on the server.
// The text itself is zlib-compressed on the wire; turning it into entries is
// the job of a ContactListCodec.

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::{debug, info, warn};
use std::io::{Read, Write};

use super::consts::*;
use super::packets::{PacketReader, PacketWriter};
use super::session::{Effects, SessionCore};
use super::{GGClient, GGEvent};
use crate::error::{DecodeError, GGError, Result};
use crate::models::{ContactList, ContactListEntry, ContactListFormat, ContactType};

/// Converts between contact list text and [`ContactList`].
pub trait ContactListCodec: Send + Sync {
    /// Format requested on import and used on export.
    fn format(&self) -> ContactListFormat;

    fn parse(&self, text: &str, format: ContactListFormat) -> anyhow::Result<ContactList>;

    fn serialize(&self, list: &ContactList, format: ContactListFormat) -> anyhow::Result<String>;
}

/// The semicolon separated Gadu-Gadu 7.0 export format:
/// `first;last;nick;display;mobile;groups;uin;email;...`
#[derive(Debug, Clone, Copy, Default)]
pub struct Gg70Codec;

const GG70_HEADER: &str = "GG70ExportString";
const GG70_FIELDS: usize = 14;
const GG70_BLOCKED_GROUP: &str = "Ignorowani";

impl ContactListCodec for Gg70Codec {
    fn format(&self) -> ContactListFormat {
        ContactListFormat::Gg70
    }

    fn parse(&self, text: &str, format: ContactListFormat) -> anyhow::Result<ContactList> {
        if format != ContactListFormat::Gg70 {
            anyhow::bail!("unsupported contact list format {:?}", format);
        }
        let mut list = ContactList::default();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with(GG70_HEADER) {
                continue;
            }
            let fields: Vec<&str> = line.split(';').collect();
            let Some(uin) = fields.get(6).and_then(|f| f.trim().parse::<u32>().ok()) else {
                debug!("Skipping contact list line without a number: {}", line);
                continue;
            };
            let field = |i: usize| fields.get(i).map(|f| f.to_string()).unwrap_or_default();
            let groups: Vec<String> = field(5)
                .split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(String::from)
                .collect();
            let contact_type = if groups.iter().any(|g| g == GG70_BLOCKED_GROUP) {
                ContactType::Blocked
            } else {
                ContactType::Normal
            };
            list.entries.push(ContactListEntry {
                uin,
                display_name: field(3),
                first_name: field(0),
                last_name: field(1),
                groups,
                contact_type,
            });
        }
        Ok(list)
    }

    fn serialize(&self, list: &ContactList, format: ContactListFormat) -> anyhow::Result<String> {
        if format != ContactListFormat::Gg70 {
            anyhow::bail!("unsupported contact list format {:?}", format);
        }
        let mut text = String::new();
        for entry in &list.entries {
            let mut groups = entry.groups.clone();
            if entry.contact_type == ContactType::Blocked && !groups.iter().any(|g| g == GG70_BLOCKED_GROUP) {
                groups.push(GG70_BLOCKED_GROUP.to_string());
            }
            let mut fields = vec![String::new(); GG70_FIELDS];
            fields[0] = entry.first_name.clone();
            fields[1] = entry.last_name.clone();
            fields[3] = entry.display_name.clone();
            fields[5] = groups.join(",");
            fields[6] = entry.uin.to_string();
            text.push_str(&fields.join(";"));
            text.push_str("\r\n");
        }
        Ok(text)
    }
}

/// Decoded USERLIST100_REPLY payload. The header and the compressed body
/// fail independently, so a broken body still leaves kind and version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserListReply {
    pub kind: u8,
    pub version: u32,
    pub format: ContactListFormat,
    pub body: std::result::Result<String, DecodeError>,
}

pub fn encode_userlist_request(
    kind: u8,
    version: u32,
    format: ContactListFormat,
    body: Option<&str>,
) -> Result<Vec<u8>> {
    let mut writer = PacketWriter::new();
    writer
        .write_u8(kind)
        .write_u32(version)
        .write_u8(format.code())
        .write_u8(0x01);
    if let Some(body) = body {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(body.as_bytes())?;
        writer.write_bytes(&encoder.finish()?);
    }
    Ok(writer.into_frame(GG_USERLIST100_REQUEST))
}

/// Inflate at most `limit` bytes; anything longer is rejected.
fn inflate(compressed: &[u8], limit: usize) -> std::result::Result<String, DecodeError> {
    if compressed.is_empty() {
        return Ok(String::new());
    }
    let mut raw = Vec::new();
    ZlibDecoder::new(compressed)
        .take(limit as u64 + 1)
        .read_to_end(&mut raw)
        .map_err(|e| DecodeError::InvalidValue(format!("contact list body: {}", e)))?;
    if raw.len() > limit {
        return Err(DecodeError::InvalidValue(format!(
            "contact list body inflates past {} bytes",
            limit
        )));
    }
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Decode a USERLIST100_REPLY payload. Only a broken header is an error;
/// the body is inflated up to `max_text_len` bytes into [`UserListReply::body`].
pub fn decode_userlist_reply(
    payload: &[u8],
    max_text_len: usize,
) -> std::result::Result<UserListReply, DecodeError> {
    let mut reader = PacketReader::new(payload);
    let kind = reader.read_u8()?;
    let version = reader.read_u32()?;
    let format_code = reader.read_u8()?;
    let format = ContactListFormat::from_code(format_code)
        .ok_or_else(|| DecodeError::InvalidValue(format!("contact list format {:#x}", format_code)))?;
    let _unknown = reader.read_u8()?;
    let body = inflate(reader.read_rest(), max_text_len);
    Ok(UserListReply {
        kind,
        version,
        format,
        body,
    })
}

/// Decode a USERLIST100_REQUEST payload, body inflated. Used by tests and
/// tooling that play the server side.
pub fn decode_userlist_request(payload: &[u8]) -> std::result::Result<UserListReply, DecodeError> {
    decode_userlist_reply(payload, GG_DEFAULT_MAX_FRAME_LEN as usize)
}

pub fn encode_userlist_reply(kind: u8, version: u32, format: ContactListFormat, body: &str) -> Result<Vec<u8>> {
    let mut frame = encode_userlist_request(kind, version, format, Some(body))?;
    frame[..4].copy_from_slice(&GG_USERLIST100_REPLY.to_le_bytes());
    Ok(frame)
}

impl SessionCore {
    pub(super) fn handle_userlist_reply(&mut self, payload: &[u8], fx: &mut Effects) {
        let reply = match decode_userlist_reply(payload, self.max_frame_len as usize) {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Dropping malformed contact list reply: {}", e);
                return;
            }
        };
        match reply.kind {
            GG_USERLIST100_REPLY_LIST => {
                self.roster.set_version(reply.version);
                let list = match (&self.contact_list_codec, &reply.body) {
                    (_, Err(e)) => {
                        warn!("Contact list version {} has an unreadable body: {}", reply.version, e);
                        None
                    }
                    (Some(codec), Ok(text)) => match codec.parse(text, reply.format) {
                        Ok(list) => Some(list),
                        Err(e) => {
                            warn!("Could not parse contact list version {}: {}", reply.version, e);
                            None
                        }
                    },
                    (None, Ok(_)) => {
                        debug!("No contact list codec configured, passing version {} only", reply.version);
                        None
                    }
                };
                info!("Received contact list version {}", reply.version);
                fx.emit(GGEvent::ContactListReceived {
                    version: reply.version,
                    list,
                });
            }
            GG_USERLIST100_REPLY_UPTODATE | GG_USERLIST100_REPLY_ACK => {
                debug!("Contact list version is now {}", reply.version);
                self.roster.set_version(reply.version);
            }
            GG_USERLIST100_REPLY_REJECT => {
                warn!(
                    "Server rejected contact list update, server version is {}",
                    reply.version
                );
            }
            other => debug!("Ignoring contact list reply kind {:#x}", other),
        }
    }

    pub(super) fn handle_userlist_version(&mut self, payload: &[u8], fx: &mut Effects) {
        match PacketReader::new(payload).read_u32() {
            Ok(version) => {
                self.roster.set_version(version);
                fx.emit(GGEvent::ContactListReceived { version, list: None });
            }
            Err(e) => warn!("Dropping malformed contact list version notice: {}", e),
        }
    }

    fn contact_list_format(&self) -> ContactListFormat {
        self.contact_list_codec
            .as_ref()
            .map(|codec| codec.format())
            .unwrap_or_default()
    }

    pub(crate) fn import_contact_list(&mut self) -> Result<Effects> {
        self.require_active()?;
        let mut fx = Effects::default();
        fx.send(encode_userlist_request(
            GG_USERLIST100_GET,
            0,
            self.contact_list_format(),
            None,
        )?);
        Ok(fx)
    }

    pub(crate) fn export_contact_list(&mut self, list: &ContactList) -> Result<Effects> {
        self.require_active()?;
        let codec = self
            .contact_list_codec
            .clone()
            .ok_or_else(|| GGError::ContactList("no contact list codec configured".to_string()))?;
        let format = codec.format();
        let text = codec
            .serialize(list, format)
            .map_err(|e| GGError::ContactList(e.to_string()))?;
        let mut fx = Effects::default();
        fx.send(encode_userlist_request(
            GG_USERLIST100_PUT,
            self.roster.version(),
            format,
            Some(&text),
        )?);
        Ok(fx)
    }

    pub(crate) fn delete_contact_list(&mut self) -> Result<Effects> {
        self.require_active()?;
        let mut fx = Effects::default();
        fx.send(encode_userlist_request(
            GG_USERLIST100_PUT,
            self.roster.version(),
            self.contact_list_format(),
            Some(" "),
        )?);
        Ok(fx)
    }
}

impl GGClient {
    /// Ask the server for the stored contact list; it arrives as a
    /// [`GGEvent::ContactListReceived`].
    pub fn import_contact_list(&self) -> Result<()> {
        self.perform(|core| Ok(((), core.import_contact_list()?)))
    }

    /// Replace the stored contact list. The last known version is sent as is;
    /// the server resolves conflicts.
    pub fn export_contact_list(&self, list: &ContactList) -> Result<()> {
        self.perform(|core| Ok(((), core.export_contact_list(list)?)))?;
        info!("Exported contact list with {} entries", list.entries.len());
        Ok(())
    }

    pub fn delete_contact_list(&self) -> Result<()> {
        self.perform(|core| Ok(((), core.delete_contact_list()?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gg::packets::split_frame;
    use crate::gg::session::tests::active_core;
    use std::sync::Arc;

    fn sample_list() -> ContactList {
        ContactList {
            entries: vec![
                ContactListEntry {
                    uin: 1234,
                    display_name: "Ala".to_string(),
                    first_name: "Alicja".to_string(),
                    last_name: "Kowalska".to_string(),
                    groups: vec!["Praca".to_string()],
                    contact_type: ContactType::Normal,
                },
                ContactListEntry {
                    uin: 999,
                    display_name: "spam".to_string(),
                    contact_type: ContactType::Blocked,
                    ..Default::default()
                },
            ],
        }
    }

    #[test]
    fn test_gg70_codec_round_trip() {
        let codec = Gg70Codec;
        let text = codec.serialize(&sample_list(), ContactListFormat::Gg70).unwrap();
        let parsed = codec.parse(&text, ContactListFormat::Gg70).unwrap();
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.find(1234).unwrap().display_name, "Ala");
        assert_eq!(parsed.find(1234).unwrap().groups, vec!["Praca".to_string()]);
        assert_eq!(parsed.find(999).unwrap().contact_type, ContactType::Blocked);
    }

    #[test]
    fn test_gg70_codec_skips_header_and_junk() {
        let text = "GG70ExportString,;\r\nJan;Nowak;;Janek;;;555;;0;;0;;0;\r\nbroken line\r\n";
        let parsed = Gg70Codec.parse(text, ContactListFormat::Gg70).unwrap();
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].uin, 555);
        assert_eq!(parsed.entries[0].first_name, "Jan");
        assert!(Gg70Codec.parse(text, ContactListFormat::Gg100).is_err());
    }

    #[test]
    fn test_request_body_is_compressed() {
        let frame = encode_userlist_request(GG_USERLIST100_PUT, 17, ContactListFormat::Gg70, Some("a;b;c")).unwrap();
        let (packet_type, payload) = split_frame(&frame).unwrap();
        assert_eq!(packet_type, GG_USERLIST100_REQUEST);
        assert_eq!(payload[0], GG_USERLIST100_PUT);
        assert_eq!(payload[6], 0x01);
        assert_ne!(&payload[7..], b"a;b;c");

        let decoded = decode_userlist_request(payload).unwrap();
        assert_eq!(decoded.version, 17);
        assert_eq!(decoded.format, ContactListFormat::Gg70);
        assert_eq!(decoded.body, Ok("a;b;c".to_string()));
    }

    #[test]
    fn test_get_request_has_no_body() {
        let frame = encode_userlist_request(GG_USERLIST100_GET, 0, ContactListFormat::Gg100, None).unwrap();
        let (_, payload) = split_frame(&frame).unwrap();
        assert_eq!(payload.len(), 7);
    }

    #[test]
    fn test_reply_decoding() {
        let frame = encode_userlist_reply(GG_USERLIST100_REPLY_LIST, 8, ContactListFormat::Gg70, "x").unwrap();
        let (packet_type, payload) = split_frame(&frame).unwrap();
        assert_eq!(packet_type, GG_USERLIST100_REPLY);
        let reply = decode_userlist_reply(payload, 1024).unwrap();
        assert_eq!(reply.kind, GG_USERLIST100_REPLY_LIST);
        assert_eq!(reply.version, 8);
        assert_eq!(reply.body, Ok("x".to_string()));
    }

    fn garbage_list_reply(version: u32) -> Vec<u8> {
        let mut payload = vec![GG_USERLIST100_REPLY_LIST];
        payload.extend_from_slice(&version.to_le_bytes());
        payload.extend_from_slice(&[GG_USERLIST100_FORMAT_TYPE_GG70, 1]);
        payload.extend_from_slice(b"definitely not zlib");
        payload
    }

    #[test]
    fn test_reply_with_garbage_body_keeps_header() {
        let reply = decode_userlist_reply(&garbage_list_reply(1), 1024).unwrap();
        assert_eq!(reply.kind, GG_USERLIST100_REPLY_LIST);
        assert_eq!(reply.version, 1);
        assert!(matches!(reply.body, Err(DecodeError::InvalidValue(_))));
    }

    #[test]
    fn test_reply_with_truncated_header_is_an_error() {
        assert!(decode_userlist_reply(&[GG_USERLIST100_REPLY_LIST, 1, 0], 1024).is_err());
    }

    #[test]
    fn test_inflate_stops_at_limit() {
        // 4 MiB of one byte compresses to a few KiB.
        let bomb = "a".repeat(4 * 1024 * 1024);
        let frame = encode_userlist_reply(GG_USERLIST100_REPLY_LIST, 3, ContactListFormat::Gg70, &bomb).unwrap();
        let (_, payload) = split_frame(&frame).unwrap();
        assert!(payload.len() < 64 * 1024);

        let reply = decode_userlist_reply(payload, GG_DEFAULT_MAX_FRAME_LEN as usize).unwrap();
        assert_eq!(reply.version, 3);
        assert!(matches!(reply.body, Err(DecodeError::InvalidValue(_))));

        let small = encode_userlist_reply(GG_USERLIST100_REPLY_LIST, 3, ContactListFormat::Gg70, "abcd").unwrap();
        let (_, payload) = split_frame(&small).unwrap();
        assert_eq!(decode_userlist_reply(payload, 4).unwrap().body, Ok("abcd".to_string()));
        assert!(decode_userlist_reply(payload, 3).unwrap().body.is_err());
    }

    #[test]
    fn test_corrupt_list_body_still_reports_version() {
        let mut core = active_core().with_contact_list_codec(Arc::new(Gg70Codec));
        let fx = core.handle_frame(GG_USERLIST100_REPLY, &garbage_list_reply(12));
        assert_eq!(core.roster.version(), 12);
        assert_eq!(
            fx.events,
            vec![GGEvent::ContactListReceived {
                version: 12,
                list: None,
            }]
        );
    }

    #[test]
    fn test_oversized_list_body_is_not_parsed() {
        let mut core = active_core().with_contact_list_codec(Arc::new(Gg70Codec));
        core.max_frame_len = 1024;
        let body = format!("{}\r\n{}", GG70_HEADER, "Jan;Nowak;;Janek;;;555;;0;;0;;0;\r\n".repeat(100));
        let frame = encode_userlist_reply(GG_USERLIST100_REPLY_LIST, 4, ContactListFormat::Gg70, &body).unwrap();
        let (packet_type, payload) = split_frame(&frame).unwrap();
        let fx = core.handle_frame(packet_type, payload);
        assert_eq!(core.roster.version(), 4);
        assert_eq!(
            fx.events,
            vec![GGEvent::ContactListReceived {
                version: 4,
                list: None,
            }]
        );
    }

    #[test]
    fn test_corrupt_ack_body_still_applies_version() {
        let mut core = active_core();
        let mut payload = garbage_list_reply(21);
        payload[0] = GG_USERLIST100_REPLY_ACK;
        let fx = core.handle_frame(GG_USERLIST100_REPLY, &payload);
        assert_eq!(core.roster.version(), 21);
        assert!(fx.events.is_empty());
    }
}
