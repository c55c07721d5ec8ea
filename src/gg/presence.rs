// Presence
// Our own status and description, and status updates for roster contacts.

use log::{debug, info, warn};

use super::packets;
use super::session::{Effects, SessionCore, SessionState};
use super::{GGClient, GGEvent};
use crate::error::Result;
use crate::models::Status;

impl SessionCore {
    /// NOTIFY_REPLY80 and STATUS80 share one entry layout.
    pub(super) fn handle_notify_reply(&mut self, payload: &[u8], fx: &mut Effects) {
        let reply = packets::decode_notify_reply(payload);
        if let Some(e) = &reply.truncated {
            warn!(
                "Status frame truncated after {} entries: {}",
                reply.entries.len(),
                e
            );
        }
        for info in reply.entries {
            if info.uin == self.uin {
                debug!("Another session changed our status to {:?}", info.status);
                self.status = info.status;
                self.description = info.description.clone();
                fx.emit(GGEvent::StatusChanged(info));
            } else if self.roster.apply_status(&info).is_some() {
                fx.emit(GGEvent::StatusChanged(info));
            } else {
                debug!("Status for {} who is not in the roster, dropped", info.uin);
            }
        }
    }

    pub(super) fn handle_need_email(&mut self, _payload: &[u8], fx: &mut Effects) {
        info!("Server asks for an e-mail address in the profile");
        fx.emit(GGEvent::NeedEmail);
    }

    pub(crate) fn set_status(&mut self, status: Status, description: Option<&str>) -> Effects {
        self.status = status;
        if let Some(description) = description {
            self.description = description.to_string();
        }
        self.status_update()
    }

    pub(crate) fn set_description(&mut self, description: &str) -> Effects {
        self.description = description.to_string();
        self.status_update()
    }

    fn status_update(&self) -> Effects {
        let mut fx = Effects::default();
        if self.state == SessionState::Active {
            fx.send(packets::encode_status(self.status, self.status_flags, &self.description));
        }
        fx
    }
}

impl GGClient {
    pub fn status(&self) -> Status {
        self.with_core(|core| core.status())
    }

    pub fn description(&self) -> String {
        self.with_core(|core| core.description().to_string())
    }

    /// Change our status, and optionally the description with it. Sent
    /// immediately when logged in, otherwise used for the next login.
    pub fn set_status(&self, status: Status, description: Option<&str>) -> Result<()> {
        self.perform(|core| Ok(((), core.set_status(status, description))))?;
        info!("Status set to {:?}", status);
        Ok(())
    }

    pub fn set_description(&self, description: &str) -> Result<()> {
        self.perform(|core| Ok(((), core.set_description(description))))
    }
}
