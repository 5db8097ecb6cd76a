use std::collections::HashMap;

use super::ProtocolParser;
use crate::model::ParsedData;

pub struct SmtpParser;

impl ProtocolParser for SmtpParser {
    fn name(&self) -> &'static str {
        "SMTP"
    }

    fn ports(&self) -> &'static [u16] {
        &[25, 465, 587]
    }

    fn max_message_size(&self) -> usize {
        50 * 1024 * 1024
    }

    fn probe(&self, buf: &[u8]) -> bool {
        let text = String::from_utf8_lossy(buf);
        text.starts_with("MAIL FROM:") || text.starts_with("EHLO") || text.starts_with("HELO")
    }

    fn parse(&self, buf: &[u8]) -> Option<ParsedData> {
        let text = String::from_utf8_lossy(buf);
        if !text.contains("\r\n.\r\n") && !text.ends_with("\r\n.\r\n") {
            return None;
        }

        let mut sender = String::new();
        let mut recipients = Vec::new();
        let mut subject = String::new();
        let mut attachment_count = 0usize;

        for line in text.lines() {
            if let Some(addr) = line.strip_prefix("MAIL FROM:") {
                sender = addr.trim().to_string();
            } else if let Some(addr) = line.strip_prefix("RCPT TO:") {
                recipients.push(addr.trim().to_string());
            } else if let Some(subj) = line.strip_prefix("Subject:") {
                subject = subj.trim().chars().take(100).collect();
            } else if line.contains("Content-Disposition: attachment") {
                attachment_count += 1;
            }
        }

        let mut metadata = HashMap::new();
        metadata.insert("sender".into(), sender);
        metadata.insert("recipients".into(), recipients.join(","));
        metadata.insert("subject".into(), subject);
        metadata.insert("attachment_count".into(), attachment_count.to_string());
        metadata.insert("message_size".into(), buf.len().to_string());

        Some(ParsedData {
            protocol: "SMTP".into(),
            content_type: "message/rfc822".into(),
            headers: HashMap::new(),
            body: buf.to_vec(),
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

    #[test]
    fn parses_sender_recipients_subject_and_attachments() {
        let raw = "MAIL FROM:<a@co.com>\r\nRCPT TO:<b@co.com>\r\nSubject: Q3 Payroll\r\nContent-Disposition: attachment; filename=a.csv\r\nContent-Disposition: attachment; filename=b.csv\r\n.\r\n";
        let parsed = SmtpParser.parse(raw.as_bytes()).unwrap();
        assert_eq!(parsed.metadata["sender"], "<a@co.com>");
        assert_eq!(parsed.metadata["subject"], "Q3 Payroll");
        assert_eq!(parsed.metadata["attachment_count"], "2");
    }

    #[test]
    fn incomplete_dot_terminator_returns_none() {
        assert!(SmtpParser.parse(b"MAIL FROM:<a@co.com>\r\n").is_none());
    }
}
