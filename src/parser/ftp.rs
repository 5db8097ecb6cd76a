use std::collections::HashMap;

use super::ProtocolParser;
use crate::model::ParsedData;

pub struct FtpParser;

impl ProtocolParser for FtpParser {
    fn name(&self) -> &'static str {
        "FTP"
    }

    fn ports(&self) -> &'static [u16] {
        &[21, 22]
    }

    fn max_message_size(&self) -> usize {
        100 * 1024 * 1024
    }

    fn probe(&self, buf: &[u8]) -> bool {
        let text = String::from_utf8_lossy(buf);
        ["STOR ", "RETR ", "LIST", "USER "].iter().any(|c| text.starts_with(c))
    }

    fn parse(&self, buf: &[u8]) -> Option<ParsedData> {
        let text = String::from_utf8_lossy(buf);
        let line = text.lines().next()?;
        let mut parts = line.splitn(2, ' ');
        let command = parts.next()?.to_string();
        let arg = parts.next().unwrap_or("").trim().to_string();

        let direction = match command.as_str() {
            "STOR" => "up",
            "RETR" => "down",
            _ => "",
        };

        let mut metadata = HashMap::new();
        metadata.insert("command".into(), command.clone());
        metadata.insert("file_name".into(), arg.clone());
        metadata.insert("file_size".into(), buf.len().to_string());
        metadata.insert("direction".into(), direction.into());

        Some(ParsedData {
            protocol: "FTP".into(),
            content_type: String::new(),
            headers: HashMap::new(),
            body: buf.to_vec(),
            url: Some(arg),
            method: Some(command),
            status_code: None,
            metadata,
        })
    }
}
