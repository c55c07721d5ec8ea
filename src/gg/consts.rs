// GG protocol constants
// Frame type codes, status codes, login capability flags and misc markers.
// Inbound and outbound frame types share a number space in places
// (0x0014, 0x000e, 0x0059), so they are kept in separate groups.

// Server -> client frame types
pub const GG_WELCOME: u32 = 0x0001;
pub const GG_SEND_MSG_ACK: u32 = 0x0005;
pub const GG_PONG: u32 = 0x0007;
pub const GG_DISCONNECTING: u32 = 0x000b;
pub const GG_PUBDIR50_REPLY: u32 = 0x000e;
pub const GG_NEED_EMAIL: u32 = 0x0014;
pub const GG_XML_EVENT: u32 = 0x0027;
pub const GG_XML_ACTION: u32 = 0x002c;
pub const GG_RECV_MSG80: u32 = 0x002e;
pub const GG_LOGIN80_OK: u32 = 0x0035;
pub const GG_STATUS80: u32 = 0x0036;
pub const GG_NOTIFY_REPLY80: u32 = 0x0037;
pub const GG_USERLIST100_REPLY: u32 = 0x0041;
pub const GG_LOGIN80_FAILED: u32 = 0x0043;
pub const GG_RECV_OWN_MSG: u32 = 0x005a;
pub const GG_MULTILOGON_INFO: u32 = 0x005b;
pub const GG_USERLIST100_VERSION: u32 = 0x005c;

// Client -> server frame types
pub const GG_PING: u32 = 0x0008;
pub const GG_ADD_NOTIFY: u32 = 0x000d;
pub const GG_REMOVE_NOTIFY: u32 = 0x000e;
pub const GG_NOTIFY_FIRST: u32 = 0x000f;
pub const GG_NOTIFY_LAST: u32 = 0x0010;
pub const GG_LIST_EMPTY: u32 = 0x0012;
pub const GG_PUBDIR50_REQUEST: u32 = 0x0014;
pub const GG_SEND_MSG80: u32 = 0x002d;
pub const GG_LOGIN80: u32 = 0x0031;
pub const GG_NEW_STATUS80: u32 = 0x0038;
pub const GG_USERLIST100_REQUEST: u32 = 0x0040;
pub const GG_RECV_MSG_ACK: u32 = 0x0046;
pub const GG_MULTILOGON_DISCONNECT: u32 = 0x0062;

// Both directions
pub const GG_TYPING_NOTIFY: u32 = 0x0059;

/// Size of the frame header: type + length.
pub const GG_HEADER_LEN: usize = 8;

// Login hash selection
pub const GG_LOGIN_HASH_GG32: u8 = 0x01;
pub const GG_LOGIN_HASH_SHA1: u8 = 0x02;

// Status codes
pub const GG_STATUS_NOT_AVAIL: u32 = 0x0001;
pub const GG_STATUS_NOT_AVAIL_DESCR: u32 = 0x0015;
pub const GG_STATUS_FFC: u32 = 0x0017;
pub const GG_STATUS_FFC_DESCR: u32 = 0x0018;
pub const GG_STATUS_AVAIL: u32 = 0x0002;
pub const GG_STATUS_AVAIL_DESCR: u32 = 0x0004;
pub const GG_STATUS_BUSY: u32 = 0x0003;
pub const GG_STATUS_BUSY_DESCR: u32 = 0x0005;
pub const GG_STATUS_DND: u32 = 0x0021;
pub const GG_STATUS_DND_DESCR: u32 = 0x0022;
pub const GG_STATUS_INVISIBLE: u32 = 0x0014;
pub const GG_STATUS_INVISIBLE_DESCR: u32 = 0x0016;
pub const GG_STATUS_BLOCKED: u32 = 0x0006;

// Status modifier bits, masked off before mapping a status code
pub const GG_STATUS_IMAGE_MASK: u32 = 0x0100;
pub const GG_STATUS_ADAPT_STATUS_MASK: u32 = 0x0400;
pub const GG_STATUS_DESCR_MASK: u32 = 0x4000;
pub const GG_STATUS_FRIENDS_MASK: u32 = 0x8000;

// Login capability flags
pub const GG_LOGIN_FLAG_NOTIFYTYPE_77: u32 = 0x0000_0001;
pub const GG_LOGIN_FLAG_MSGTYPE_80: u32 = 0x0000_0002;
pub const GG_LOGIN_FLAG_STATUSTYPE_80: u32 = 0x0000_0004;
pub const GG_LOGIN_FLAG_DNDFFC: u32 = 0x0000_0010;
pub const GG_LOGIN_FLAG_GRAPHICSTATUSES: u32 = 0x0000_0020;
pub const GG_LOGIN_FLAG_LOGINFAILEDTYPE: u32 = 0x0000_0040;
pub const GG_LOGIN_FLAG_UNKNOWN: u32 = 0x0000_0100;
pub const GG_LOGIN_FLAG_ADDINFO: u32 = 0x0000_0200;
pub const GG_LOGIN_FLAG_SENDMSGACK: u32 = 0x0000_0400;
pub const GG_LOGIN_FLAG_TYPINGNOTIF: u32 = 0x0000_2000;
pub const GG_LOGIN_FLAG_MULTILOGIN: u32 = 0x0000_4000;

/// Every capability this client understands.
pub const GG_LOGIN_FEATURES_DEFAULT: u32 = GG_LOGIN_FLAG_NOTIFYTYPE_77
    | GG_LOGIN_FLAG_MSGTYPE_80
    | GG_LOGIN_FLAG_STATUSTYPE_80
    | GG_LOGIN_FLAG_DNDFFC
    | GG_LOGIN_FLAG_GRAPHICSTATUSES
    | GG_LOGIN_FLAG_LOGINFAILEDTYPE
    | GG_LOGIN_FLAG_UNKNOWN
    | GG_LOGIN_FLAG_ADDINFO
    | GG_LOGIN_FLAG_SENDMSGACK
    | GG_LOGIN_FLAG_TYPINGNOTIF
    | GG_LOGIN_FLAG_MULTILOGIN;

// Status flags sent with login and status changes
pub const GG_STATUS_FLAG_AUDIO: u32 = 0x0000_0001;
pub const GG_STATUS_FLAG_VIDEO: u32 = 0x0000_0002;
pub const GG_STATUS_FLAG_MOBILE: u32 = 0x0010_0000;
pub const GG_STATUS_FLAG_LINKS_FROM_UNKNOWN: u32 = 0x0080_0000;

pub const GG_STATUS_FLAGS_DEFAULT: u32 = GG_STATUS_FLAG_AUDIO | GG_STATUS_FLAG_LINKS_FROM_UNKNOWN;

// Contact (user) types used in roster upload frames
pub const GG_USER_BUDDY: u8 = 0x01;
pub const GG_USER_FRIEND: u8 = 0x02;
pub const GG_USER_NORMAL: u8 = 0x03;
pub const GG_USER_BLOCKED: u8 = 0x04;

/// Contacts per NOTIFY_FIRST / NOTIFY_LAST frame.
pub const GG_NOTIFY_BATCH: usize = 400;

// Message class and options
pub const GG_CLASS_CHAT: u32 = 0x0008;
pub const GG_MSG_OPTION_CONFERENCE: u8 = 0x01;

// Send-message acknowledgment status
pub const GG_ACK_BLOCKED: u32 = 0x0001;
pub const GG_ACK_DELIVERED: u32 = 0x0002;
pub const GG_ACK_QUEUED: u32 = 0x0003;
pub const GG_ACK_MBOXFULL: u32 = 0x0004;
pub const GG_ACK_NOT_DELIVERED: u32 = 0x0006;

// Public directory request / reply kinds
pub const GG_PUBDIR50_WRITE: u8 = 0x01;
pub const GG_PUBDIR50_READ: u8 = 0x02;
pub const GG_PUBDIR50_SEARCH: u8 = 0x03;
pub const GG_PUBDIR50_SEARCH_REPLY: u8 = 0x05;

// Contact list (userlist) requests and replies
pub const GG_USERLIST100_PUT: u8 = 0x00;
pub const GG_USERLIST100_GET: u8 = 0x02;
pub const GG_USERLIST100_REPLY_LIST: u8 = 0x00;
pub const GG_USERLIST100_REPLY_UPTODATE: u8 = 0x01;
pub const GG_USERLIST100_REPLY_ACK: u8 = 0x10;
pub const GG_USERLIST100_REPLY_REJECT: u8 = 0x12;

pub const GG_USERLIST100_FORMAT_TYPE_NONE: u8 = 0x00;
pub const GG_USERLIST100_FORMAT_TYPE_GG70: u8 = 0x01;
pub const GG_USERLIST100_FORMAT_TYPE_GG100: u8 = 0x02;

// Login frame fixed values
pub const GG_LANGUAGE: &str = "pl";
pub const GG_DEFAULT_VERSION: &str = "Gadu-Gadu Client build 10.0.0.10450";
pub const GG_DEFAULT_PORT: u16 = 8074;
pub const GG_LOGIN_HASH_LEN: usize = 64;
pub const GG_IMAGE_SIZE: u8 = 255;

/// Default cap on a single frame payload.
pub const GG_DEFAULT_MAX_FRAME_LEN: u32 = 1024 * 1024;

/// Default keep-alive period in seconds.
pub const GG_PING_INTERVAL_SECS: u64 = 50;

/// HTML used when a message is sent without explicit HTML.
pub fn default_html(text: &str) -> String {
    format!(
        "<span style=\"color:#000000; font-family:'MS Shell Dlg 2'; font-size:9pt; \">{}</span>",
        text
    )
}
