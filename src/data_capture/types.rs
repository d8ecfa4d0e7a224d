//! Common data types used across the data_capture subsystem.

use serde::{Deserialize, Serialize};

/// One captured HTTP transaction as reported by a client agent.
///
/// Records are immutable once received; the rotation engine only reads
/// `request_uri` (marker matching) and hands the rest to the serializer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    /// Request target, matched against the rotation marker
    pub request_uri: String,
    /// Response status, absent when the exchange never completed
    #[serde(default)]
    pub status_code: Option<i32>,
    /// Value of the HTTP `Date` header
    #[serde(default)]
    pub http_date: Option<String>,
    /// Agent-local wall-clock time of the capture
    #[serde(default)]
    pub local_time: Option<String>,
    #[serde(default)]
    pub request_body: Option<String>,
    #[serde(default)]
    pub response_body: Option<String>,
}

impl TransactionRecord {
    /// Builds a record with only the request target set.
    pub fn new<S: Into<String>>(request_uri: S) -> Self {
        Self {
            request_uri: request_uri.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_camel_case_with_nulls() {
        let json = r#"{
            "requestUri": "/api/orders",
            "statusCode": null,
            "httpDate": "Mon, 01 Jan 2024 10:00:00 GMT",
            "requestBody": null
        }"#;
        let record: TransactionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.request_uri, "/api/orders");
        assert_eq!(record.status_code, None);
        assert_eq!(record.http_date.as_deref(), Some("Mon, 01 Jan 2024 10:00:00 GMT"));
        assert_eq!(record.local_time, None);
        assert_eq!(record.request_body, None);
    }

    #[test]
    fn request_uri_is_required() {
        let json = r#"{ "statusCode": 200 }"#;
        assert!(serde_json::from_str::<TransactionRecord>(json).is_err());
    }
}
