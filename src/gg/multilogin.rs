// Multilogin
// Other sessions logged in on the same account, and kicking them off.

use log::{info, warn};

use super::packets;
use super::session::{Effects, SessionCore};
use super::{GGClient, GGEvent};
use crate::error::Result;

impl SessionCore {
    pub(super) fn handle_multilogin_info(&mut self, payload: &[u8], fx: &mut Effects) {
        match packets::decode_multilogin_info(payload) {
            Ok(sessions) => {
                for session in sessions {
                    fx.emit(GGEvent::MultiloginSession(session));
                }
            }
            Err(e) => warn!("Dropping malformed multilogin info: {}", e),
        }
    }

    pub(crate) fn disconnect_multilogin_session(&mut self, connection_id: u64) -> Result<Effects> {
        self.require_active()?;
        let mut fx = Effects::default();
        fx.send(packets::encode_multilogin_disconnect(connection_id));
        Ok(fx)
    }
}

impl GGClient {
    /// Ask the server to end another session on our account.
    pub fn disconnect_multilogin_session(&self, connection_id: u64) -> Result<()> {
        self.perform(|core| Ok(((), core.disconnect_multilogin_session(connection_id)?)))?;
        info!("Requested disconnect of session {:#x}", connection_id);
        Ok(())
    }
}
