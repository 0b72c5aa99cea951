//! Message model shared by the history endpoint and the real-time channel

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::conversation::ConversationProps;

/// Chat message.
///
/// Carries no id and no server ordering key: outgoing and incoming messages
/// differ only in whose `sender_id` they carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub sender_id: String,
    pub sender_role: String,
    pub receiver_id: String,
    pub receiver_role: String,
    pub content: String,
    /// ISO-8601 timestamp generated by the sending client.
    pub timestamp: String,
}

impl Message {
    /// Build an outgoing message for a conversation, stamped with `now`.
    pub fn outgoing(props: &ConversationProps, content: &str, now: DateTime<Utc>) -> Self {
        Self {
            sender_id: props.sender.id.clone(),
            sender_role: props.sender.role.clone(),
            receiver_id: props.receiver.id.clone(),
            receiver_role: props.receiver.role.clone(),
            content: content.to_string(),
            timestamp: format_timestamp(now),
        }
    }

    /// Whether this message was authored by the participant with `viewer_id`.
    pub fn is_from(&self, viewer_id: &str) -> bool {
        self.sender_id == viewer_id
    }

    /// Parsed timestamp, if it is valid RFC 3339.
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Format a timestamp the way browsers do for `toISOString()`.
pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Participant;
    use chrono::TimeZone;

    #[test]
    fn test_outgoing_fields() {
        let props = ConversationProps::new(
            Participant::new("u1", "student"),
            Participant::new("u2", "teacher"),
            "Ms. Lee",
        );
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        let msg = Message::outgoing(&props, "hello", now);

        assert_eq!(msg.sender_id, "u1");
        assert_eq!(msg.sender_role, "student");
        assert_eq!(msg.receiver_id, "u2");
        assert_eq!(msg.receiver_role, "teacher");
        assert_eq!(msg.content, "hello");
        assert_eq!(msg.timestamp, "2024-03-01T12:30:05.000Z");
        assert_eq!(msg.sent_at(), Some(now));
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let json = serde_json::json!({
            "_id": "65f0c0ffee",
            "senderId": "u2",
            "senderRole": "teacher",
            "receiverId": "u1",
            "receiverRole": "student",
            "content": "hi",
            "timestamp": "2024-03-01T12:00:00.000Z",
            "__v": 0
        });
        let msg: Message = serde_json::from_value(json).unwrap();
        assert_eq!(msg.sender_id, "u2");
        assert!(msg.is_from("u2"));
        assert!(!msg.is_from("u1"));

        let back = serde_json::to_value(&msg).unwrap();
        assert_eq!(back["receiverRole"], "student");
        assert!(back.get("_id").is_none());
    }

    #[test]
    fn test_bad_timestamp() {
        let msg = Message {
            sender_id: "a".into(),
            sender_role: "r".into(),
            receiver_id: "b".into(),
            receiver_role: "r".into(),
            content: "x".into(),
            timestamp: "yesterday".into(),
        };
        assert!(msg.sent_at().is_none());
    }
}
