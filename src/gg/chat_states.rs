// Typing notifications
// GG_TYPING_NOTIFY in both directions: a length hint of zero means the
// contact stopped typing.

use log::{debug, warn};

use super::packets;
use super::session::{Effects, SessionCore};
use super::{GGClient, GGEvent};
use crate::error::Result;
use crate::models::{TypingState, Uin};

impl SessionCore {
    pub(super) fn handle_typing_notify(&mut self, payload: &[u8], fx: &mut Effects) {
        match packets::decode_typing_notify(payload) {
            Ok(notify) => {
                debug!("{} typing state {:?} ({})", notify.uin, notify.state, notify.length);
                fx.emit(GGEvent::TypingNotify(notify));
            }
            Err(e) => warn!("Dropping malformed typing notification: {}", e),
        }
    }

    pub(crate) fn send_typing(&mut self, uin: Uin, state: TypingState, length: u16) -> Result<Effects> {
        self.require_active()?;
        let mut fx = Effects::default();
        fx.send(packets::encode_typing_notify(uin, state, length));
        Ok(fx)
    }
}

impl GGClient {
    /// Tell `uin` we are typing a message of `length` characters, or stopped.
    pub fn send_typing_notify(&self, uin: Uin, state: TypingState, length: u16) -> Result<()> {
        self.perform(|core| Ok(((), core.send_typing(uin, state, length)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GGError;
    use crate::gg::consts::GG_TYPING_NOTIFY;
    use crate::gg::packets::split_frame;
    use crate::gg::session::tests::{active_core, core};
    use crate::models::TypingNotify;

    #[test]
    fn test_typing_requires_login() {
        let mut core = core();
        assert!(matches!(
            core.send_typing(5, TypingState::Typing, 3),
            Err(GGError::NotAuthenticated)
        ));
    }

    #[test]
    fn test_inbound_typing_event() {
        let mut core = active_core();
        let frame = packets::encode_typing_notify(42, TypingState::Typing, 9);
        let (packet_type, payload) = split_frame(&frame).unwrap();
        assert_eq!(packet_type, GG_TYPING_NOTIFY);
        let fx = core.handle_frame(packet_type, payload);
        assert_eq!(
            fx.events,
            vec![GGEvent::TypingNotify(TypingNotify {
                uin: 42,
                state: TypingState::Typing,
                length: 9,
            })]
        );
    }

    #[test]
    fn test_outbound_stop_frame() {
        let mut core = active_core();
        let fx = core.send_typing(42, TypingState::Stopped, 9).unwrap();
        let (_, payload) = split_frame(&fx.frames[0]).unwrap();
        assert_eq!(&payload[..2], &[0, 0]);
        assert_eq!(&payload[2..], &42u32.to_le_bytes());
    }
}
