// Messaging
// Outgoing chat and conference messages, incoming messages with their
// acknowledgments, delivery acks and server-pushed XML notices.

use log::{debug, info, warn};

use super::consts::{default_html, GG_CLASS_CHAT};
use super::packets;
use super::session::{Effects, SessionCore};
use super::{GGClient, GGEvent};
use crate::error::{GGError, Result};
use crate::models::Uin;

/// A message to one or more recipients. Two or more recipients make it a
/// conference message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub recipients: Vec<Uin>,
    pub text: String,
    pub html: Option<String>,
    pub attributes: Vec<u8>,
}

impl OutgoingMessage {
    pub fn new(recipient: Uin, text: &str) -> Self {
        OutgoingMessage {
            recipients: vec![recipient],
            text: text.to_string(),
            ..Default::default()
        }
    }

    pub fn conference(recipients: &[Uin], text: &str) -> Self {
        OutgoingMessage {
            recipients: recipients.to_vec(),
            text: text.to_string(),
            ..Default::default()
        }
    }

    pub fn html(mut self, html: &str) -> Self {
        self.html = Some(html.to_string());
        self
    }

    pub fn attributes(mut self, attributes: &[u8]) -> Self {
        self.attributes = attributes.to_vec();
        self
    }

    fn rendered_html(&self) -> String {
        match &self.html {
            Some(html) => html.clone(),
            None => default_html(&self.text),
        }
    }
}

impl SessionCore {
    /// Build the SEND_MSG80 frames for `message`, one per recipient, and
    /// return the sequence numbers they carry.
    pub(crate) fn send_message(&mut self, message: &OutgoingMessage) -> Result<(Vec<u32>, Effects)> {
        self.require_active()?;

        let mut recipients: Vec<Uin> = Vec::with_capacity(message.recipients.len());
        for &uin in &message.recipients {
            if uin != self.uin && !recipients.contains(&uin) {
                recipients.push(uin);
            }
        }
        if recipients.is_empty() {
            return Err(GGError::InvalidRequest("message has no recipients".to_string()));
        }

        let html = message.rendered_html();
        let conference = recipients.len() > 1;
        let mut fx = Effects::default();
        let mut seqs = Vec::with_capacity(recipients.len());
        for &recipient in &recipients {
            let attributes = if conference {
                let mut block = packets::conference_attributes(&recipients, recipient);
                block.extend_from_slice(&message.attributes);
                block
            } else {
                message.attributes.clone()
            };
            let seq = self.next_seq();
            fx.send(packets::encode_send_message(
                recipient,
                seq,
                &message.text,
                &html,
                &attributes,
            ));
            seqs.push(seq);
        }
        debug!(
            "Queued message class {:#x} to {:?} with seqs {:?}",
            GG_CLASS_CHAT, recipients, seqs
        );
        Ok((seqs, fx))
    }

    fn acknowledge(payload: &[u8], fx: &mut Effects) -> bool {
        match packets::peek_message_seq(payload) {
            Some(seq) => {
                fx.send(packets::encode_receive_ack(seq));
                true
            }
            None => {
                warn!("Message frame too short to acknowledge ({} bytes)", payload.len());
                false
            }
        }
    }

    pub(super) fn handle_receive_message(&mut self, payload: &[u8], fx: &mut Effects) {
        if !Self::acknowledge(payload, fx) {
            return;
        }
        match packets::decode_receive_message(payload, true) {
            Ok(message) => {
                debug!("Message {} from {}", message.seq, message.sender);
                fx.emit(GGEvent::MessageReceived(message));
            }
            Err(e) => warn!("Dropping undecodable message: {}", e),
        }
    }

    pub(super) fn handle_receive_own_message(&mut self, payload: &[u8], fx: &mut Effects) {
        if !Self::acknowledge(payload, fx) {
            return;
        }
        match packets::decode_receive_message(payload, false) {
            Ok(message) => fx.emit(GGEvent::OwnMessageReceived(message)),
            Err(e) => warn!("Dropping undecodable own message: {}", e),
        }
    }

    pub(super) fn handle_send_message_ack(&mut self, payload: &[u8], fx: &mut Effects) {
        match packets::decode_send_message_ack(payload) {
            Ok(ack) => {
                debug!("Message {} to {} acknowledged: {:?}", ack.seq, ack.recipient, ack.status);
                fx.emit(GGEvent::MessageAcknowledged(ack));
            }
            Err(e) => warn!("Dropping malformed message ack: {}", e),
        }
    }

    pub(super) fn handle_xml_event(&mut self, payload: &[u8], fx: &mut Effects) {
        fx.emit(GGEvent::XmlSystemMessage(packets::decode_xml(payload)));
    }

    pub(super) fn handle_xml_action(&mut self, payload: &[u8], fx: &mut Effects) {
        fx.emit(GGEvent::XmlActionMessage(packets::decode_xml(payload)));
    }
}

impl GGClient {
    /// Send a message and return the sequence numbers assigned to each frame,
    /// in recipient order. Roster membership is not required.
    pub fn send_message(&self, message: &OutgoingMessage) -> Result<Vec<u32>> {
        let seqs = self.perform(|core| core.send_message(message))?;
        info!("Sent message to {} recipient(s)", seqs.len());
        Ok(seqs)
    }

    /// Shorthand for a plain text message to one contact.
    pub fn send_text(&self, recipient: Uin, text: &str) -> Result<u32> {
        let seqs = self.send_message(&OutgoingMessage::new(recipient, text))?;
        seqs.first()
            .copied()
            .ok_or_else(|| GGError::InvalidRequest("message was not sent".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gg::consts::*;
    use crate::gg::packets::{
        decode_send_message, encode_receive_message, parse_conference, split_frame, PacketReader,
        PacketWriter,
    };
    use crate::gg::session::tests::{active_core, core, frame_types};
    use crate::models::{DeliveryStatus, ReceivedMessage};
    use chrono::Utc;

    #[test]
    fn test_send_requires_active_session() {
        let mut core = core();
        let result = core.send_message(&OutgoingMessage::new(5, "hej"));
        assert!(matches!(result, Err(GGError::NotAuthenticated)));
    }

    #[test]
    fn test_send_without_roster_entries() {
        let mut core = active_core();
        assert!(core.roster().is_empty());
        let (seqs, fx) = core.send_message(&OutgoingMessage::new(5, "hej")).unwrap();
        assert_eq!(seqs.len(), 1);
        assert_eq!(frame_types(&fx), vec![GG_SEND_MSG80]);

        let (_, payload) = split_frame(&fx.frames[0]).unwrap();
        let sent = decode_send_message(payload).unwrap();
        assert_eq!(sent.recipient, 5);
        assert_eq!(sent.seq, seqs[0]);
        assert_eq!(sent.html, default_html("hej"));
        assert!(sent.attributes.is_empty());
    }

    #[test]
    fn test_conference_fans_out_one_frame_per_recipient() {
        let mut core = active_core();
        let recipients = [11, 22, 33, 44];
        let message = OutgoingMessage::conference(&recipients, "narada").html("<b>narada</b>");
        let (seqs, fx) = core.send_message(&message).unwrap();
        assert_eq!(fx.frames.len(), 4);
        assert_eq!(seqs.len(), 4);

        for (frame, &recipient) in fx.frames.iter().zip(recipients.iter()) {
            let (_, payload) = split_frame(frame).unwrap();
            let sent = decode_send_message(payload).unwrap();
            assert_eq!(sent.recipient, recipient);
            assert_eq!(sent.html, "<b>narada</b>");

            let mut reader = PacketReader::new(&sent.attributes);
            assert_eq!(reader.read_u8().unwrap(), GG_MSG_OPTION_CONFERENCE);
            assert_eq!(reader.read_u32().unwrap(), 3);

            let members = parse_conference(&sent.attributes).unwrap().unwrap();
            let expected: Vec<u32> = recipients.iter().copied().filter(|&u| u != recipient).collect();
            assert_eq!(members, expected);
        }
    }

    #[test]
    fn test_recipients_are_deduplicated_and_exclude_self() {
        let mut core = active_core();
        let message = OutgoingMessage::conference(&[1000, 7, 7], "x");
        let (_, fx) = core.send_message(&message).unwrap();
        assert_eq!(fx.frames.len(), 1);

        let message = OutgoingMessage::conference(&[1000], "x");
        assert!(matches!(core.send_message(&message), Err(GGError::InvalidRequest(_))));
    }

    fn incoming(seq: u32, attributes: Vec<u8>) -> Vec<u8> {
        let message = ReceivedMessage {
            sender: 77,
            seq,
            timestamp: Utc::now(),
            plain: "czesc".to_string(),
            html: default_html("czesc"),
            attributes,
            conference: None,
        };
        encode_receive_message(GG_RECV_MSG80, &message)
    }

    #[test]
    fn test_receive_message_is_acknowledged() {
        let mut core = active_core();
        let mut attributes = vec![0x00];
        attributes.extend(packets::conference_attributes(&[1000, 88], 1000));
        let frame = incoming(4242, attributes);
        let (packet_type, payload) = split_frame(&frame).unwrap();
        let fx = core.handle_frame(packet_type, payload);

        assert_eq!(frame_types(&fx), vec![GG_RECV_MSG_ACK]);
        let (_, ack) = split_frame(&fx.frames[0]).unwrap();
        assert_eq!(ack, &4242u32.to_le_bytes());
        match &fx.events[..] {
            [GGEvent::MessageReceived(message)] => {
                assert_eq!(message.plain, "czesc");
                assert_eq!(message.conference, Some(vec![88]));
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[test]
    fn test_unparsable_body_is_still_acknowledged() {
        let mut core = active_core();
        let mut writer = PacketWriter::new();
        writer
            .write_u32(77)
            .write_u32(31337)
            .write_u32(0)
            .write_u32(GG_CLASS_CHAT)
            .write_u32(0xffff)
            .write_u32(0xffff);
        let fx = core.handle_frame(GG_RECV_MSG80, writer.payload());
        assert_eq!(frame_types(&fx), vec![GG_RECV_MSG_ACK]);
        let (_, ack) = split_frame(&fx.frames[0]).unwrap();
        assert_eq!(ack, &31337u32.to_le_bytes());

        // header cut after the sequence number: ack, but no event
        let fx = core.handle_frame(GG_RECV_MSG80, &writer.payload()[..10]);
        assert_eq!(frame_types(&fx), vec![GG_RECV_MSG_ACK]);
        assert!(fx.events.is_empty());
    }

    #[test]
    fn test_own_message_is_acknowledged_without_conference_parsing() {
        let mut core = active_core();
        let frame = incoming(9, packets::conference_attributes(&[1, 2], 1));
        let (_, payload) = split_frame(&frame).unwrap();
        let fx = core.handle_frame(GG_RECV_OWN_MSG, payload);
        assert_eq!(frame_types(&fx), vec![GG_RECV_MSG_ACK]);
        match &fx.events[..] {
            [GGEvent::OwnMessageReceived(message)] => assert_eq!(message.conference, None),
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[test]
    fn test_send_ack_event() {
        let mut core = active_core();
        let mut writer = PacketWriter::new();
        writer.write_u32(GG_ACK_QUEUED).write_u32(55).write_u32(12);
        let fx = core.handle_frame(GG_SEND_MSG_ACK, writer.payload());
        match &fx.events[..] {
            [GGEvent::MessageAcknowledged(ack)] => {
                assert_eq!(ack.recipient, 55);
                assert_eq!(ack.seq, 12);
                assert_eq!(ack.status, DeliveryStatus::Queued);
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[test]
    fn test_xml_notices() {
        let mut core = active_core();
        let fx = core.handle_frame(GG_XML_EVENT, b"<event/>\0");
        assert_eq!(fx.events, vec![GGEvent::XmlSystemMessage("<event/>".into())]);
        let fx = core.handle_frame(GG_XML_ACTION, b"<action/>");
        assert_eq!(fx.events, vec![GGEvent::XmlActionMessage("<action/>".into())]);
    }
}
