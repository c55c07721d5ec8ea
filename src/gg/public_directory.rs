// Public directory (pubdir50)
// Searching the user directory and publishing our own profile. Requests and
// replies are lists of NUL-terminated key/value pairs; an empty key ends a
// record in a reply.

use log::{debug, warn};

use super::consts::*;
use super::packets::{PacketReader, PacketWriter};
use super::session::{Effects, SessionCore};
use super::{GGClient, GGEvent};
use crate::error::{DecodeError, Result};
use crate::models::{
    Gender, PublicDirectoryEntry, PublicDirectoryProfile, PublicDirectoryQuery,
    PublicDirectoryReply, Status,
};

const KEY_UIN: &str = "FmNumber";
const KEY_STATUS: &str = "FmStatus";
const KEY_FIRST_NAME: &str = "firstname";
const KEY_LAST_NAME: &str = "lastname";
const KEY_NICKNAME: &str = "nickname";
const KEY_BIRTH_YEAR: &str = "birthyear";
const KEY_CITY: &str = "city";
const KEY_GENDER: &str = "gender";
const KEY_ACTIVE_ONLY: &str = "ActiveOnly";
const KEY_FAMILY_NAME: &str = "familyname";
const KEY_FAMILY_CITY: &str = "familycity";
const KEY_START: &str = "fmstart";
const KEY_NEXT_START: &str = "nextstart";

/// Search and write requests use opposite gender codes.
fn gender_code(gender: Gender, kind: u8) -> &'static str {
    match (gender, kind) {
        (Gender::Unspecified, _) => "",
        (Gender::Female, GG_PUBDIR50_WRITE) => "2",
        (Gender::Male, GG_PUBDIR50_WRITE) => "1",
        (Gender::Female, _) => "1",
        (Gender::Male, _) => "2",
    }
}

fn gender_from_code(code: &str, kind: u8) -> Gender {
    let own_profile = kind == GG_PUBDIR50_READ || kind == GG_PUBDIR50_WRITE;
    match (code.trim(), own_profile) {
        ("1", false) | ("2", true) => Gender::Female,
        ("2", false) | ("1", true) => Gender::Male,
        _ => Gender::Unspecified,
    }
}

fn encode_request(kind: u8, seq: u32, fields: &[(&str, String)]) -> Vec<u8> {
    let mut writer = PacketWriter::new();
    writer.write_u8(kind).write_u32(seq);
    for (key, value) in fields.iter().filter(|(_, value)| !value.is_empty()) {
        writer.write_cstring(key).write_cstring(value);
    }
    writer.into_frame(GG_PUBDIR50_REQUEST)
}

fn birth_year_range(from: Option<u16>, to: Option<u16>) -> String {
    match (from, to) {
        (Some(from), Some(to)) if to != from => format!("{} {}", from, to),
        (Some(year), _) | (None, Some(year)) => year.to_string(),
        (None, None) => String::new(),
    }
}

pub fn encode_search(seq: u32, query: &PublicDirectoryQuery) -> Vec<u8> {
    let fields = [
        (KEY_UIN, query.uin.map(|u| u.to_string()).unwrap_or_default()),
        (KEY_FIRST_NAME, query.first_name.clone()),
        (KEY_LAST_NAME, query.last_name.clone()),
        (KEY_NICKNAME, query.nickname.clone()),
        (KEY_BIRTH_YEAR, birth_year_range(query.birth_year_from, query.birth_year_to)),
        (KEY_CITY, query.city.clone()),
        (KEY_GENDER, gender_code(query.gender, GG_PUBDIR50_SEARCH).to_string()),
        (KEY_ACTIVE_ONLY, if query.active_only { "1".to_string() } else { String::new() }),
        (KEY_FAMILY_NAME, query.family_name.clone()),
        (KEY_FAMILY_CITY, query.family_city.clone()),
        (KEY_START, if query.start > 0 { query.start.to_string() } else { String::new() }),
    ];
    encode_request(GG_PUBDIR50_SEARCH, seq, &fields)
}

pub fn encode_write(seq: u32, profile: &PublicDirectoryProfile) -> Vec<u8> {
    let fields = [
        (KEY_FIRST_NAME, profile.first_name.clone()),
        (KEY_LAST_NAME, profile.last_name.clone()),
        (KEY_NICKNAME, profile.nickname.clone()),
        (KEY_BIRTH_YEAR, profile.birth_year.map(|y| y.to_string()).unwrap_or_default()),
        (KEY_CITY, profile.city.clone()),
        (KEY_GENDER, gender_code(profile.gender, GG_PUBDIR50_WRITE).to_string()),
        (KEY_FAMILY_NAME, profile.family_name.clone()),
        (KEY_FAMILY_CITY, profile.family_city.clone()),
    ];
    encode_request(GG_PUBDIR50_WRITE, seq, &fields)
}

/// Key/value pairs of a request or reply body, with the kind and sequence.
pub fn decode_pairs(payload: &[u8]) -> std::result::Result<(u8, u32, Vec<(String, String)>), DecodeError> {
    let mut reader = PacketReader::new(payload);
    let kind = reader.read_u8()?;
    let seq = reader.read_u32()?;
    let mut pairs = Vec::new();
    while reader.remaining() > 0 {
        let key = reader.read_cstring()?;
        if key.is_empty() {
            pairs.push((String::new(), String::new()));
            continue;
        }
        let value = reader.read_cstring()?;
        pairs.push((key, value));
    }
    Ok((kind, seq, pairs))
}

pub fn decode_reply(payload: &[u8]) -> std::result::Result<PublicDirectoryReply, DecodeError> {
    let (kind, seq, pairs) = decode_pairs(payload)?;
    let mut reply = PublicDirectoryReply {
        kind,
        seq,
        ..Default::default()
    };
    let mut current = PublicDirectoryEntry::default();
    let mut dirty = false;
    for (key, value) in pairs {
        if key.is_empty() {
            if dirty {
                reply.entries.push(std::mem::take(&mut current));
                dirty = false;
            }
            continue;
        }
        match key.as_str() {
            KEY_NEXT_START => {
                reply.next_start = value.trim().parse().unwrap_or(0);
                continue;
            }
            KEY_UIN => current.uin = value.trim().parse().ok(),
            KEY_STATUS => {
                current.status = value
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .and_then(Status::from_code)
                    .map(|(status, _)| status)
            }
            KEY_FIRST_NAME => current.first_name = value,
            KEY_LAST_NAME => current.last_name = value,
            KEY_NICKNAME => current.nickname = value,
            KEY_BIRTH_YEAR => current.birth_year = value.trim().parse().ok(),
            KEY_CITY => current.city = value,
            KEY_GENDER => current.gender = gender_from_code(&value, kind),
            KEY_FAMILY_NAME => current.family_name = value,
            KEY_FAMILY_CITY => current.family_city = value,
            other => {
                debug!("Ignoring public directory field {}", other);
                continue;
            }
        }
        dirty = true;
    }
    if dirty {
        reply.entries.push(current);
    }
    Ok(reply)
}

impl SessionCore {
    pub(super) fn handle_public_directory_reply(&mut self, payload: &[u8], fx: &mut Effects) {
        match decode_reply(payload) {
            Ok(reply) => {
                debug!(
                    "Public directory reply {} with {} entries, next start {}",
                    reply.seq,
                    reply.entries.len(),
                    reply.next_start
                );
                fx.emit(GGEvent::PublicDirectoryReply(reply));
            }
            Err(e) => warn!("Dropping malformed public directory reply: {}", e),
        }
    }

    pub(crate) fn search_public_directory(&mut self, query: &PublicDirectoryQuery) -> Result<(u32, Effects)> {
        self.require_active()?;
        let seq = self.next_seq();
        let mut fx = Effects::default();
        fx.send(encode_search(seq, query));
        Ok((seq, fx))
    }

    pub(crate) fn write_public_directory(&mut self, profile: &PublicDirectoryProfile) -> Result<(u32, Effects)> {
        self.require_active()?;
        let seq = self.next_seq();
        let mut fx = Effects::default();
        fx.send(encode_write(seq, profile));
        Ok((seq, fx))
    }
}

impl GGClient {
    /// Search the directory; results arrive as [`GGEvent::PublicDirectoryReply`]
    /// carrying the returned sequence number.
    pub fn search_public_directory(&self, query: &PublicDirectoryQuery) -> Result<u32> {
        self.perform(|core| core.search_public_directory(query))
    }

    /// Publish our own profile.
    pub fn write_public_directory(&self, profile: &PublicDirectoryProfile) -> Result<u32> {
        self.perform(|core| core.write_public_directory(profile))
    }

    /// Look ourselves up in the directory.
    pub fn read_own_public_directory(&self) -> Result<u32> {
        let uin = self.uin();
        self.search_public_directory(&PublicDirectoryQuery {
            uin: Some(uin),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gg::packets::split_frame;
    use crate::gg::session::tests::{active_core, core};

    fn pairs_of(frame: &[u8]) -> (u8, Vec<(String, String)>) {
        let (packet_type, payload) = split_frame(frame).unwrap();
        assert_eq!(packet_type, GG_PUBDIR50_REQUEST);
        let (kind, _, pairs) = decode_pairs(payload).unwrap();
        (kind, pairs)
    }

    fn pair(key: &str, value: &str) -> (String, String) {
        (key.to_string(), value.to_string())
    }

    #[test]
    fn test_search_fields_in_order_and_empty_omitted() {
        let query = PublicDirectoryQuery {
            first_name: "Jan".to_string(),
            birth_year_from: Some(1980),
            birth_year_to: Some(1990),
            gender: Gender::Female,
            active_only: true,
            start: 20,
            ..Default::default()
        };
        let (kind, pairs) = pairs_of(&encode_search(1, &query));
        assert_eq!(kind, GG_PUBDIR50_SEARCH);
        assert_eq!(
            pairs,
            vec![
                pair("firstname", "Jan"),
                pair("birthyear", "1980 1990"),
                pair("gender", "1"),
                pair("ActiveOnly", "1"),
                pair("fmstart", "20"),
            ]
        );
    }

    #[test]
    fn test_write_uses_profile_gender_codes() {
        let profile = PublicDirectoryProfile {
            nickname: "janek".to_string(),
            gender: Gender::Female,
            birth_year: Some(1985),
            ..Default::default()
        };
        let (kind, pairs) = pairs_of(&encode_write(2, &profile));
        assert_eq!(kind, GG_PUBDIR50_WRITE);
        assert_eq!(
            pairs,
            vec![pair("nickname", "janek"), pair("birthyear", "1985"), pair("gender", "2")]
        );
    }

    fn reply_payload(pairs: &[(&str, &str)], separators_after: &[usize]) -> Vec<u8> {
        let mut writer = PacketWriter::new();
        writer.write_u8(GG_PUBDIR50_SEARCH_REPLY).write_u32(77);
        for (i, (key, value)) in pairs.iter().enumerate() {
            writer.write_cstring(key).write_cstring(value);
            if separators_after.contains(&i) {
                writer.write_u8(0);
            }
        }
        writer.payload().to_vec()
    }

    #[test]
    fn test_reply_records_and_cursor() {
        let payload = reply_payload(
            &[
                ("FmNumber", "123"),
                ("FmStatus", "2"),
                ("firstname", "Ala"),
                ("gender", "1"),
                ("FmNumber", "456"),
                ("nickname", "olo"),
                ("nextstart", "457"),
            ],
            &[3],
        );
        let reply = decode_reply(&payload).unwrap();
        assert_eq!(reply.seq, 77);
        assert_eq!(reply.next_start, 457);
        assert_eq!(reply.entries.len(), 2);
        assert_eq!(reply.entries[0].uin, Some(123));
        assert_eq!(reply.entries[0].status, Some(Status::Available));
        assert_eq!(reply.entries[0].gender, Gender::Female);
        assert_eq!(reply.entries[1].nickname, "olo");
    }

    #[test]
    fn test_reply_event_and_request_gating() {
        let mut core = core();
        assert!(core.search_public_directory(&PublicDirectoryQuery::default()).is_err());

        let mut core = active_core();
        let (seq, fx) = core.write_public_directory(&PublicDirectoryProfile::default()).unwrap();
        assert_eq!(fx.frames.len(), 1);
        let (_, payload) = split_frame(&fx.frames[0]).unwrap();
        assert_eq!(decode_pairs(payload).unwrap().1, seq);

        let payload = reply_payload(&[("FmNumber", "1")], &[]);
        let fx = core.handle_frame(GG_PUBDIR50_REPLY, &payload);
        assert!(matches!(&fx.events[..], [GGEvent::PublicDirectoryReply(r)] if r.entries.len() == 1));
    }
}
