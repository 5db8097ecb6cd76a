use std::collections::HashMap;

use super::ProtocolParser;
use crate::model::ParsedData;

/// Generalizes MySQL/PostgreSQL/SQL Server into one text-query parser: all
/// three are wire-protocol-distinct but expose the same must-extract fields
/// (database, tables, query type), so one parser covers the family and the
/// concrete dialect is recorded in `metadata.dialect`.
pub struct SqlParser;

const QUERY_TYPES: &[&str] = &["SELECT", "INSERT", "UPDATE", "DELETE", "CREATE", "DROP", "ALTER"];

impl ProtocolParser for SqlParser {
    fn name(&self) -> &'static str {
        "SQL"
    }

    fn ports(&self) -> &'static [u16] {
        &[3306, 5432, 1433]
    }

    fn max_message_size(&self) -> usize {
        20 * 1024 * 1024
    }

    fn probe(&self, buf: &[u8]) -> bool {
        let text = String::from_utf8_lossy(buf).trim_start().to_uppercase();
        QUERY_TYPES.iter().any(|q| text.starts_with(q))
    }

    fn parse(&self, buf: &[u8]) -> Option<ParsedData> {
        let text = String::from_utf8_lossy(buf);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        let upper = trimmed.to_uppercase();
        let query_type = QUERY_TYPES.iter().find(|q| upper.starts_with(**q))?.to_string();

        let table = extract_table(&upper, &query_type);

        let mut metadata = HashMap::new();
        metadata.insert("query_type".into(), query_type);
        metadata.insert("table".into(), table);
        metadata.insert("dialect".into(), "generic".into());

        Some(ParsedData {
            protocol: "SQL".into(),
            content_type: "text/x-sql".into(),
            headers: HashMap::new(),
            body: buf.to_vec(),
            url: None,
            method: None,
            status_code: None,
            metadata,
        })
    }
}

fn extract_table(upper: &str, query_type: &str) -> String {
    let keyword = match query_type {
        "SELECT" | "DELETE" => "FROM",
        "INSERT" => "INTO",
        "UPDATE" => "UPDATE",
        _ => return String::new(),
    };
    upper
    .split(keyword)
    .nth(1)
    .and_then(|rest| rest.split_whitespace().next())
    .unwrap_or_default()
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_query_type_and_table() {
        let parsed = SqlParser.parse(b"SELECT * FROM customers WHERE id = 1").unwrap();
        assert_eq!(parsed.metadata["query_type"], "SELECT");
        assert_eq!(parsed.metadata["table"], "CUSTOMERS");
    }

    #[test]
    fn insert_extracts_target_table() {
        let parsed = SqlParser.parse(b"INSERT INTO orders VALUES (1,2,3)").unwrap();
        assert_eq!(parsed.metadata["table"], "ORDERS");
    }

    #[test]
    fn empty_buffer_returns_none() {
        assert!(SqlParser.parse(b"").is_none());
    }
}
