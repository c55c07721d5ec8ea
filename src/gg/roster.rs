// Roster management
// Local mirror of the contacts whose presence we subscribe to, plus the
// server-side contact list version.

use log::{debug, info};
use std::collections::BTreeMap;

use super::consts::GG_NOTIFY_BATCH;
use super::packets;
use super::session::{Effects, SessionCore, SessionState};
use super::GGClient;
use crate::error::Result;
use crate::models::{Contact, ContactType, StatusInfo, Uin};

/// Contacts keyed by account number. Numbers are unique; adding an existing
/// number updates its type in place.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    contacts: BTreeMap<Uin, Contact>,
    version: u32,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or retype a contact. Returns `true` when the number was new.
    pub fn add(&mut self, uin: Uin, contact_type: ContactType) -> bool {
        match self.contacts.get_mut(&uin) {
            Some(existing) => {
                existing.contact_type = contact_type;
                false
            }
            None => {
                self.contacts.insert(uin, Contact::new(uin, contact_type));
                true
            }
        }
    }

    pub fn remove(&mut self, uin: Uin) -> Option<Contact> {
        self.contacts.remove(&uin)
    }

    pub fn get(&self, uin: Uin) -> Option<&Contact> {
        self.contacts.get(&uin)
    }

    pub fn contains(&self, uin: Uin) -> bool {
        self.contacts.contains_key(&uin)
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.values()
    }

    /// Copies of every contact, ordered by number.
    pub fn contacts(&self) -> Vec<Contact> {
        self.contacts.values().cloned().collect()
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: u32) {
        self.version = version;
    }

    /// Apply a presence update to a known contact and hand back a copy.
    /// Unknown numbers are left alone.
    pub fn apply_status(&mut self, info: &StatusInfo) -> Option<Contact> {
        let contact = self.contacts.get_mut(&info.uin)?;
        contact.status = info.status;
        contact.description = info.description.clone();
        contact.flags = info.flags;
        Some(contact.clone())
    }

    /// Subscription frames for the whole roster: at most [`GG_NOTIFY_BATCH`]
    /// contacts each, the final one marked as last.
    pub fn notify_frames(&self) -> Vec<Vec<u8>> {
        let contacts = self.contacts();
        let batches: Vec<&[Contact]> = contacts.chunks(GG_NOTIFY_BATCH).collect();
        let last = batches.len().saturating_sub(1);
        batches
            .iter()
            .enumerate()
            .map(|(i, batch)| packets::encode_notify_batch(batch, i == last))
            .collect()
    }
}

impl SessionCore {
    pub(crate) fn add_contact(&mut self, uin: Uin, contact_type: ContactType) -> Effects {
        let mut fx = Effects::default();
        if self.roster.add(uin, contact_type) {
            debug!("Added {} to roster as {:?}", uin, contact_type);
        } else {
            debug!("Roster already had {}, type set to {:?}", uin, contact_type);
        }
        if self.state == SessionState::Active {
            fx.send(packets::encode_add_notify(uin, contact_type));
        }
        fx
    }

    pub(crate) fn remove_contact(
        &mut self,
        uin: Uin,
        contact_type: Option<ContactType>,
    ) -> (Option<Contact>, Effects) {
        let mut fx = Effects::default();
        let removed = self.roster.remove(uin);
        let wire_type = contact_type.or_else(|| removed.as_ref().map(|c| c.contact_type));
        match wire_type {
            Some(contact_type) if self.state == SessionState::Active => {
                fx.send(packets::encode_remove_notify(uin, contact_type));
            }
            Some(_) => {}
            None => debug!("{} is not in the roster, nothing to remove", uin),
        }
        (removed, fx)
    }
}

impl GGClient {
    /// Add a contact to the roster, subscribing to its presence right away
    /// when logged in. Works offline too; the roster is uploaded on login.
    pub fn add_contact(&self, uin: Uin, contact_type: ContactType) -> Result<()> {
        self.perform(|core| Ok(((), core.add_contact(uin, contact_type))))?;
        info!("Contact {} added", uin);
        Ok(())
    }

    /// Remove a contact. `contact_type` overrides the type sent in the
    /// unsubscribe frame.
    pub fn remove_contact(
        &self,
        uin: Uin,
        contact_type: Option<ContactType>,
    ) -> Result<Option<Contact>> {
        let removed = self.perform(|core| Ok(core.remove_contact(uin, contact_type)))?;
        if removed.is_some() {
            info!("Contact {} removed", uin);
        }
        Ok(removed)
    }

    pub fn contact(&self, uin: Uin) -> Option<Contact> {
        self.with_core(|core| core.roster().get(uin).cloned())
    }

    pub fn contacts(&self) -> Vec<Contact> {
        self.with_core(|core| core.roster().contacts())
    }

    /// Last server contact list version seen.
    pub fn contact_list_version(&self) -> u32 {
        self.with_core(|core| core.roster().version())
    }
}
