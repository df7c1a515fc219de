//! Object-created notifications carried in queue message bodies
//!
//! The body is an S3 event notification:
//!
//! ```json
//! {"Records":[{"s3":{"object":{"key":"data/batch1.json"}}}]}
//! ```
//!
//! Only the first record is used. Keys arrive URL-encoded (`+` for space,
//! `%XX` escapes) and are decoded here.

use serde::Deserialize;
use tracing::warn;

use crate::error::ProcessingError;

#[derive(Debug, Deserialize)]
struct EventBody {
    #[serde(rename = "Records", default)]
    records: Vec<EventRecord>,
}

#[derive(Debug, Deserialize)]
struct EventRecord {
    s3: Option<S3Entity>,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    object: Option<S3Object>,
}

#[derive(Debug, Deserialize)]
struct S3Object {
    key: Option<String>,
}

/// The input object a message asks us to process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNotification {
    key: String,
}

impl FileNotification {
    /// Extract the object key from a message body
    pub fn parse(body: &str) -> Result<Self, ProcessingError> {
        let event: EventBody = serde_json::from_str(body)
            .map_err(|e| ProcessingError::malformed(format!("body is not an event document: {}", e)))?;

        if event.records.len() > 1 {
            warn!(
                records = event.records.len(),
                "Notification carries several records, only the first is processed"
            );
        }

        let raw_key = event
            .records
            .into_iter()
            .next()
            .ok_or_else(|| ProcessingError::malformed("Records is missing or empty"))?
            .s3
            .and_then(|s3| s3.object)
            .and_then(|object| object.key)
            .ok_or_else(|| ProcessingError::malformed("Records[0].s3.object.key is missing"))?;

        let key = decode_key(&raw_key)?;
        if key.is_empty() {
            return Err(ProcessingError::malformed("object key is empty"));
        }

        Ok(Self { key })
    }

    /// Decoded key of the object in the input store
    pub fn object_key(&self) -> &str {
        &self.key
    }

    /// Final path segment of the key; names both the working file and the
    /// uploaded result
    pub fn base_name(&self) -> Result<&str, ProcessingError> {
        match self.key.rsplit('/').next() {
            Some(name) if !name.is_empty() && name != "." && name != ".." => Ok(name),
            _ => Err(ProcessingError::malformed(format!(
                "object key {:?} has no file name",
                self.key
            ))),
        }
    }
}

fn decode_key(raw: &str) -> Result<String, ProcessingError> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|key| key.into_owned())
        .map_err(|e| ProcessingError::malformed(format!("object key {:?} is not valid UTF-8: {}", raw, e)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    #[test]
    fn test_parse_event_notification() {
        let body = r#"{"Records":[{"s3":{"object":{"key":"data/batch1.json"}}}]}"#;
        let notification = FileNotification::parse(body).unwrap();
        assert_eq!(notification.object_key(), "data/batch1.json");
        assert_eq!(notification.base_name().unwrap(), "batch1.json");
    }

    #[test]
    fn test_parse_full_s3_event() {
        let body = r#"{
            "Records": [{
                "eventVersion": "2.1",
                "eventSource": "aws:s3",
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": {"name": "input-bucket"},
                    "object": {"key": "incoming/2024/day+one%2Cfinal.json", "size": 42}
                }
            }]
        }"#;
        let notification = FileNotification::parse(body).unwrap();
        assert_eq!(notification.object_key(), "incoming/2024/day one,final.json");
        assert_eq!(notification.base_name().unwrap(), "day one,final.json");
    }

    #[test]
    fn test_top_level_key_without_directory() {
        let body = r#"{"Records":[{"s3":{"object":{"key":"batch.json"}}}]}"#;
        let notification = FileNotification::parse(body).unwrap();
        assert_eq!(notification.base_name().unwrap(), "batch.json");
    }

    #[test]
    fn test_malformed_bodies() {
        let cases = [
            "not json at all",
            "[]",
            "{}",
            r#"{"Records":[]}"#,
            r#"{"Records":[{}]}"#,
            r#"{"Records":[{"s3":{}}]}"#,
            r#"{"Records":[{"s3":{"object":{}}}]}"#,
            r#"{"Records":[{"s3":{"object":{"key":""}}}]}"#,
            r#"{"Records":[{"s3":{"object":{"key":"%FF%FE"}}}]}"#,
            r#"{"Service":"Amazon S3","Event":"s3:TestEvent"}"#,
        ];

        for body in cases {
            let err = FileNotification::parse(body).unwrap_err();
            assert_eq!(err.kind, FailureKind::MalformedNotification, "body: {}", body);
        }
    }

    #[test]
    fn test_key_without_file_name() {
        for key in ["data/", "data/..", "."] {
            let body = format!(r#"{{"Records":[{{"s3":{{"object":{{"key":"{}"}}}}}}]}}"#, key);
            let notification = FileNotification::parse(&body).unwrap();
            let err = notification.base_name().unwrap_err();
            assert_eq!(err.kind, FailureKind::MalformedNotification, "key: {}", key);
        }
    }

    #[test]
    fn test_only_first_record_used() {
        let body = r#"{"Records":[
            {"s3":{"object":{"key":"first.json"}}},
            {"s3":{"object":{"key":"second.json"}}}
        ]}"#;
        let notification = FileNotification::parse(body).unwrap();
        assert_eq!(notification.object_key(), "first.json");
    }
}
