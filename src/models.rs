use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use crate::gg::consts::*;

/// GG account number.
pub type Uin = u32;

/// Presence status of a contact or of ourselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    NotAvailable,
    Available,
    Busy,
    Invisible,
    DoNotDisturb,
    FreeForChat,
    Blocked,
}

impl Status {
    /// Wire code, choosing the "+description" sibling when `with_description` is set.
    pub fn code(self, with_description: bool) -> u32 {
        match (self, with_description) {
            (Status::NotAvailable, false) => GG_STATUS_NOT_AVAIL,
            (Status::NotAvailable, true) => GG_STATUS_NOT_AVAIL_DESCR,
            (Status::Available, false) => GG_STATUS_AVAIL,
            (Status::Available, true) => GG_STATUS_AVAIL_DESCR,
            (Status::Busy, false) => GG_STATUS_BUSY,
            (Status::Busy, true) => GG_STATUS_BUSY_DESCR,
            (Status::Invisible, false) => GG_STATUS_INVISIBLE,
            (Status::Invisible, true) => GG_STATUS_INVISIBLE_DESCR,
            (Status::DoNotDisturb, false) => GG_STATUS_DND,
            (Status::DoNotDisturb, true) => GG_STATUS_DND_DESCR,
            (Status::FreeForChat, false) => GG_STATUS_FFC,
            (Status::FreeForChat, true) => GG_STATUS_FFC_DESCR,
            (Status::Blocked, _) => GG_STATUS_BLOCKED,
        }
    }

    /// Map a wire code back to a status. Modifier bits are ignored; the
    /// boolean reports whether the code was a "+description" variant.
    pub fn from_code(code: u32) -> Option<(Status, bool)> {
        let described = code & GG_STATUS_DESCR_MASK != 0;
        let base = code
            & !(GG_STATUS_IMAGE_MASK
                | GG_STATUS_ADAPT_STATUS_MASK
                | GG_STATUS_DESCR_MASK
                | GG_STATUS_FRIENDS_MASK);
        let mapped = match base {
            GG_STATUS_NOT_AVAIL => (Status::NotAvailable, false),
            GG_STATUS_NOT_AVAIL_DESCR => (Status::NotAvailable, true),
            GG_STATUS_AVAIL => (Status::Available, false),
            GG_STATUS_AVAIL_DESCR => (Status::Available, true),
            GG_STATUS_BUSY => (Status::Busy, false),
            GG_STATUS_BUSY_DESCR => (Status::Busy, true),
            GG_STATUS_INVISIBLE => (Status::Invisible, false),
            GG_STATUS_INVISIBLE_DESCR => (Status::Invisible, true),
            GG_STATUS_DND => (Status::DoNotDisturb, false),
            GG_STATUS_DND_DESCR => (Status::DoNotDisturb, true),
            GG_STATUS_FFC => (Status::FreeForChat, false),
            GG_STATUS_FFC_DESCR => (Status::FreeForChat, true),
            GG_STATUS_BLOCKED => (Status::Blocked, false),
            _ => return None,
        };
        Some((mapped.0, mapped.1 || described))
    }

    pub fn is_online(self) -> bool {
        !matches!(self, Status::NotAvailable | Status::Blocked)
    }
}

/// How a roster entry relates to us; sent with every subscription frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactType {
    /// We stay offline to this contact.
    Buddy,
    /// Contact sees us in friends-only mode.
    Friend,
    #[default]
    Normal,
    Blocked,
}

impl ContactType {
    pub fn code(self) -> u8 {
        match self {
            ContactType::Buddy => GG_USER_BUDDY,
            ContactType::Friend => GG_USER_FRIEND,
            ContactType::Normal => GG_USER_NORMAL,
            ContactType::Blocked => GG_USER_BLOCKED,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            GG_USER_BUDDY => Some(ContactType::Buddy),
            GG_USER_FRIEND => Some(ContactType::Friend),
            GG_USER_NORMAL => Some(ContactType::Normal),
            GG_USER_BLOCKED => Some(ContactType::Blocked),
            _ => None,
        }
    }
}

/// One roster entry as mirrored locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub uin: Uin,
    pub contact_type: ContactType,
    pub status: Status,
    pub description: String,
    pub flags: u32,
}

impl Contact {
    pub fn new(uin: Uin, contact_type: ContactType) -> Self {
        Contact {
            uin,
            contact_type,
            status: Status::NotAvailable,
            description: String::new(),
            flags: 0,
        }
    }
}

/// A decoded presence entry from a notify reply or status frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusInfo {
    pub uin: Uin,
    pub status: Status,
    pub description: String,
    pub flags: u32,
    pub remote_ip: Ipv4Addr,
    pub remote_port: u16,
}

/// A message delivered by the server, either from a contact or echoed
/// from another session of our own account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub sender: Uin,
    pub seq: u32,
    pub timestamp: DateTime<Utc>,
    pub plain: String,
    pub html: String,
    pub attributes: Vec<u8>,
    /// Other conference participants, when the attributes carry a conference marker.
    pub conference: Option<Vec<Uin>>,
}

/// Server verdict on a message we sent.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DeliveryStatus {
    Unknown = 0,      // Code not recognised
    Blocked = 1,      // Recipient blocks us
    Delivered = 2,    // Delivered to an online recipient
    Queued = 3,       // Stored for an offline recipient
    MailboxFull = 4,  // Recipient's offline queue is full
    NotDelivered = 6, // Rejected
}

impl DeliveryStatus {
    pub fn from_code(code: u32) -> Self {
        match code {
            GG_ACK_BLOCKED => DeliveryStatus::Blocked,
            GG_ACK_DELIVERED => DeliveryStatus::Delivered,
            GG_ACK_QUEUED => DeliveryStatus::Queued,
            GG_ACK_MBOXFULL => DeliveryStatus::MailboxFull,
            GG_ACK_NOT_DELIVERED => DeliveryStatus::NotDelivered,
            _ => DeliveryStatus::Unknown,
        }
    }
}

/// Acknowledgment of one of our outgoing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageAck {
    pub recipient: Uin,
    pub seq: u32,
    pub status: DeliveryStatus,
}

/// Another live login under our own account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiloginSession {
    pub connection_id: u64,
    pub ip: Ipv4Addr,
    pub flags: u32,
    pub features: u32,
    pub logon_time: DateTime<Utc>,
    pub client_name: String,
}

/// The wire only carries a length hint, so inbound notices decode as
/// `Typing` (hint above zero) or `Stopped` (zero) and never as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingState {
    /// No explicit state: the length hint is sent exactly as given.
    None,
    Typing,
    Stopped,
}

/// Typing indicator received from a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingNotify {
    pub uin: Uin,
    pub state: TypingState,
    /// Length of the message being typed, as reported by the sender.
    pub length: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    #[default]
    Unspecified,
    Female,
    Male,
}

/// Fields of a public directory search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicDirectoryQuery {
    pub uin: Option<Uin>,
    pub first_name: String,
    pub last_name: String,
    pub nickname: String,
    pub birth_year_from: Option<u16>,
    /// Upper bound of the birth year range; `None` searches the exact year.
    pub birth_year_to: Option<u16>,
    pub city: String,
    pub gender: Gender,
    pub active_only: bool,
    pub family_name: String,
    pub family_city: String,
    pub start: u32,
}

/// Our own profile as written to the public directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicDirectoryProfile {
    pub first_name: String,
    pub last_name: String,
    pub nickname: String,
    pub birth_year: Option<u16>,
    pub city: String,
    pub gender: Gender,
    pub family_name: String,
    pub family_city: String,
}

/// One record of a public directory reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicDirectoryEntry {
    pub uin: Option<Uin>,
    pub status: Option<Status>,
    pub first_name: String,
    pub last_name: String,
    pub nickname: String,
    pub birth_year: Option<u16>,
    pub city: String,
    pub gender: Gender,
    pub family_name: String,
    pub family_city: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicDirectoryReply {
    pub kind: u8,
    pub seq: u32,
    pub entries: Vec<PublicDirectoryEntry>,
    /// Start index for the next page; zero when there is none.
    pub next_start: u32,
}

/// Serialization format of a server-side contact list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactListFormat {
    None,
    /// Gadu-Gadu 7.0 text format.
    Gg70,
    #[default]
    /// Gadu-Gadu 10 XML format.
    Gg100,
}

impl ContactListFormat {
    pub fn code(self) -> u8 {
        match self {
            ContactListFormat::None => GG_USERLIST100_FORMAT_TYPE_NONE,
            ContactListFormat::Gg70 => GG_USERLIST100_FORMAT_TYPE_GG70,
            ContactListFormat::Gg100 => GG_USERLIST100_FORMAT_TYPE_GG100,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            GG_USERLIST100_FORMAT_TYPE_NONE => Some(ContactListFormat::None),
            GG_USERLIST100_FORMAT_TYPE_GG70 => Some(ContactListFormat::Gg70),
            GG_USERLIST100_FORMAT_TYPE_GG100 => Some(ContactListFormat::Gg100),
            _ => None,
        }
    }
}

/// Entry of a server-stored contact list, as produced by a contact list codec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactListEntry {
    pub uin: Uin,
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
    pub groups: Vec<String>,
    pub contact_type: ContactType,
}

/// Server-stored contact list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactList {
    pub entries: Vec<ContactListEntry>,
}

impl ContactList {
    pub fn find(&self, uin: Uin) -> Option<&ContactListEntry> {
        self.entries.iter().find(|entry| entry.uin == uin)
    }
}
