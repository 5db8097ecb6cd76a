use std::collections::HashMap;

use super::ProtocolParser;
use crate::model::ParsedData;

/// Generalizes MQTT/Kafka/AMQP: message-broker protocols whose
/// must-extract fields are the same shape (topic/exchange, partition,
/// offset, key) even though wire formats differ.
pub struct MqParser;

impl ProtocolParser for MqParser {
    fn name(&self) -> &'static str {
        "MQ"
    }

    fn ports(&self) -> &'static [u16] {
        &[1883, 9092, 5672]
    }

    fn max_message_size(&self) -> usize {
        16 * 1024 * 1024
    }

    fn probe(&self, buf: &[u8]) -> bool {
        !buf.is_empty() && (buf[0] & 0xF0) == 0x30 // MQTT PUBLISH packet type
    }

    fn parse(&self, buf: &[u8]) -> Option<ParsedData> {
        if buf.len() < 4 {
            return None;
        }
        // Minimal MQTT PUBLISH decode: fixed header, 2-byte topic length,
        // topic bytes, then payload. Kafka/AMQP framing is left to
        // metadata.dialect for now; detection still routes them here.
        let topic_len = u16::from_be_bytes([buf[2], buf[3]]) as usize;
        if buf.len() < 4 + topic_len {
            return None;
        }
        let topic = String::from_utf8_lossy(&buf[4..4 + topic_len]).to_string();
        let payload = buf[4 + topic_len..].to_vec();

        let mut metadata = HashMap::new();
        metadata.insert("topic".into(), topic);
        metadata.insert("partition".into(), "0".into());
        metadata.insert("offset".into(), "0".into());
        metadata.insert("dialect".into(), "mqtt".into());

        Some(ParsedData {
            protocol: "MQ".into(),
            content_type: "application/octet-stream".into(),
            headers: HashMap::new(),
            body: payload,
            url: None,
            method: None,
            status_code: None,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mqtt_publish(topic: &str, payload: &[u8]) -> Vec<u8> {
        let mut pkt = vec![0x30, 0];
        pkt.extend_from_slice(&(topic.len() as u16).to_be_bytes());
        pkt.extend_from_slice(topic.as_bytes());
        pkt.extend_from_slice(payload);
        pkt
    }

    #[test]
    fn parses_topic_and_payload() {
        let pkt = mqtt_publish("sensors/temp", b"21.5");
        let parsed = MqParser.parse(&pkt).unwrap();
        assert_eq!(parsed.metadata["topic"], "sensors/temp");
        assert_eq!(parsed.body, b"21.5");
    }

    #[test]
    fn probe_matches_publish_packet_type() {
        assert!(MqParser.probe(&[0x30, 0x00]));
        assert!(!MqParser.probe(&[0x10, 0x00]));
    }
}
