//! Tab-separated line encoding of transaction records.
//!
//! Field order is fixed: agent id, session id, request uri, status code,
//! HTTP date, local time, request body, response body. Newline characters
//! are stripped from every field. Tabs are not escaped, so a payload that
//! contains a tab will shift the columns of its own line.

use super::types::TransactionRecord;

/// Column delimiter.
pub const FIELD_SEPARATOR: char = '\t';
/// Terminator appended after every serialized record.
pub const LINE_TERMINATOR: &str = "\n";

fn clean(field: &str) -> String {
    field.chars().filter(|c| *c != '\n' && *c != '\r').collect()
}

fn clean_opt(field: Option<&str>) -> String {
    field.map(clean).unwrap_or_default()
}

/// Serializes one record into a single line, without the terminator.
pub fn serialize(agent_id: &str, session_id: &str, record: &TransactionRecord) -> String {
    let status = record
        .status_code
        .map(|s| s.to_string())
        .unwrap_or_default();
    let fields = [
        clean(agent_id),
        clean(session_id),
        clean(&record.request_uri),
        status,
        clean_opt(record.http_date.as_deref()),
        clean_opt(record.local_time.as_deref()),
        clean_opt(record.request_body.as_deref()),
        clean_opt(record.response_body.as_deref()),
    ];
    let mut line = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            line.push(FIELD_SEPARATOR);
        }
        line.push_str(field);
    }
    line
}

/// Concatenates the terminated lines for `records`, preserving input order.
pub fn serialize_batch(agent_id: &str, session_id: &str, records: &[TransactionRecord]) -> String {
    let mut text = String::new();
    for record in records {
        text.push_str(&serialize(agent_id, session_id, record));
        text.push_str(LINE_TERMINATOR);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_record() -> TransactionRecord {
        TransactionRecord {
            request_uri: "/api/orders?id=7".into(),
            status_code: Some(201),
            http_date: Some("Mon, 01 Jan 2024 10:00:00 GMT".into()),
            local_time: Some("2024-01-01T02:00:00-08:00".into()),
            request_body: Some("{\"qty\":1}".into()),
            response_body: Some("created".into()),
        }
    }

    #[test]
    fn fields_in_declared_order() {
        let line = serialize("agent1", "sess1", &full_record());
        let cols: Vec<&str> = line.split('\t').collect();
        assert_eq!(
            cols,
            vec![
                "agent1",
                "sess1",
                "/api/orders?id=7",
                "201",
                "Mon, 01 Jan 2024 10:00:00 GMT",
                "2024-01-01T02:00:00-08:00",
                "{\"qty\":1}",
                "created",
            ]
        );
    }

    #[test]
    fn absent_fields_are_empty() {
        let line = serialize("a", "s", &TransactionRecord::new("/x"));
        assert_eq!(line, "a\ts\t/x\t\t\t\t\t");
        assert_eq!(line.split('\t').count(), 8);
    }

    #[test]
    fn embedded_newlines_are_stripped() {
        let mut record = full_record();
        record.request_body = Some("line one\nline two\r\n".into());
        record.response_body = Some("\n".into());
        let line = serialize("agent\n1", "sess1", &record);
        assert!(!line.contains('\n'));
        assert!(!line.contains('\r'));
        let cols: Vec<&str> = line.split('\t').collect();
        assert_eq!(cols[0], "agent1");
        assert_eq!(cols[6], "line oneline two");
        assert_eq!(cols[7], "");
    }

    #[test]
    fn tabs_pass_through_unescaped() {
        let mut record = TransactionRecord::new("/x");
        record.request_body = Some("a\tb".into());
        let line = serialize("a", "s", &record);
        assert_eq!(line.split('\t').count(), 9);
    }

    #[test]
    fn batch_terminates_every_line() {
        let records = vec![TransactionRecord::new("/one"), TransactionRecord::new("/two")];
        let text = serialize_batch("a", "s", &records);
        let lines: Vec<&str> = text.split_terminator(LINE_TERMINATOR).collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("/one"));
        assert!(lines[1].contains("/two"));
        assert!(text.ends_with('\n'));
        assert_eq!(serialize_batch("a", "s", &[]), "");
    }
}
