use std::collections::HashMap;

use super::ProtocolParser;
use crate::model::ParsedData;

pub struct SmbParser;

const SMB2_MAGIC: &[u8] = b"\xfeSMB";

impl ProtocolParser for SmbParser {
    fn name(&self) -> &'static str {
        "SMB"
    }

    fn ports(&self) -> &'static [u16] {
        &[445, 139]
    }

    fn max_message_size(&self) -> usize {
        32 * 1024 * 1024
    }

    fn probe(&self, buf: &[u8]) -> bool {
        buf.starts_with(SMB2_MAGIC)
    }

    fn parse(&self, buf: &[u8]) -> Option<ParsedData> {
        if !buf.starts_with(SMB2_MAGIC) || buf.len() < 20 {
            return None;
        }
        let command = u16::from_le_bytes([buf[12], buf[13]]);
        let op = match command {
            8 => "read",
            9 => "write",
            _ => "other",
        };

        let mut metadata = HashMap::new();
        metadata.insert("op".into(), op.into());
        metadata.insert("file_path".into(), String::new());
        metadata.insert("bytes_transferred".into(), buf.len().to_string());

        Some(ParsedData {
            protocol: "SMB".into(),
            content_type: String::new(),
            headers: HashMap::new(),
            body: buf.to_vec(),
            url: None,
            method: Some(op.into()),
            status_code: None,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smb_header(command: u16) -> Vec<u8> {
        let mut pkt = vec![0u8; 20];
        pkt[0..4].copy_from_slice(SMB2_MAGIC);
        pkt[12..14].copy_from_slice(&command.to_le_bytes());
        pkt
    }

    #[test]
    fn recognizes_read_and_write_ops() {
        assert_eq!(SmbParser.parse(&smb_header(8)).unwrap().metadata["op"], "read");
        assert_eq!(SmbParser.parse(&smb_header(9)).unwrap().metadata["op"], "write");
    }

    #[test]
    fn non_smb_bytes_are_rejected() {
        assert!(!SmbParser.probe(b"not smb"));
    }
}
