use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use uuid::Uuid;

// --- Enums ---

/// Lifecycle state of the single connection owned by a manager.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionKind {
    Location,
    Report,
    Global,
}

/// Inbound message types pushed by the server.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    MentionUpdate,
    ReportUpdate,
    Alert,
    SystemStatus,
    #[serde(other)]
    Unknown,
}

impl MessageType {
    /// The subscription kind whose entries receive this message type.
    pub fn topic(&self) -> Option<SubscriptionKind> {
        match self {
            MessageType::MentionUpdate => Some(SubscriptionKind::Location),
            MessageType::ReportUpdate => Some(SubscriptionKind::Report),
            MessageType::Alert | MessageType::SystemStatus => Some(SubscriptionKind::Global),
            MessageType::Unknown => None,
        }
    }
}

/// Outbound control frame types.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FrameType {
    SubscribeLocation,
    SubscribeReport,
    SubscribeGlobal,
    Unsubscribe,
    Ping,
}

// --- Subscription data ---

/// Identifier handed out by `subscribe_*`. Never reused while the manager lives.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub fn generate() -> Self {
        SubscriptionId(format!("sub_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubscriptionId {
    fn from(value: &str) -> Self {
        SubscriptionId(value.to_string())
    }
}

/// Kind-specific topic parameters of a subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum TopicParams {
    Location { lat: f64, lng: f64, radius_km: f64 },
    Report { report_id: String },
    Global,
}

impl TopicParams {
    pub fn kind(&self) -> SubscriptionKind {
        match self {
            TopicParams::Location { .. } => SubscriptionKind::Location,
            TopicParams::Report { .. } => SubscriptionKind::Report,
            TopicParams::Global => SubscriptionKind::Global,
        }
    }

    fn frame_type(&self) -> FrameType {
        match self {
            TopicParams::Location { .. } => FrameType::SubscribeLocation,
            TopicParams::Report { .. } => FrameType::SubscribeReport,
            TopicParams::Global => FrameType::SubscribeGlobal,
        }
    }

    fn frame_data(&self) -> Value {
        match self {
            TopicParams::Location {
                lat,
                lng,
                radius_km,
            } => json!({ "lat": lat, "lng": lng, "radius": radius_km }),
            TopicParams::Report { report_id } => json!({ "reportId": report_id }),
            TopicParams::Global => json!({}),
        }
    }
}

// --- Wire envelopes ---

/// A message pushed by the server: `{type, data, timestamp, id}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InboundMessage {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl InboundMessage {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// A control frame sent to the server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OutboundFrame {
    #[serde(rename = "type")]
    pub frame_type: FrameType,
    pub data: Value,
    pub id: String,
    pub timestamp: DateTime<Utc>,
}

impl OutboundFrame {
    fn new(frame_type: FrameType, data: Value, id: String) -> Self {
        Self {
            frame_type,
            data,
            id,
            timestamp: Utc::now(),
        }
    }

    /// `subscribe_*` frame; the frame id is the subscription id so the server can correlate.
    pub fn subscribe(id: &SubscriptionId, params: &TopicParams) -> Self {
        Self::new(params.frame_type(), params.frame_data(), id.to_string())
    }

    pub fn unsubscribe(id: &SubscriptionId) -> Self {
        Self::new(
            FrameType::Unsubscribe,
            json!({ "subscriptionId": id }),
            Uuid::new_v4().to_string(),
        )
    }

    pub fn ping() -> Self {
        Self::new(FrameType::Ping, json!({}), Uuid::new_v4().to_string())
    }

    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings() {
        assert_eq!(ConnectionStatus::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionStatus::Connected.to_string(), "connected");
        assert_eq!(ConnectionStatus::Disconnected.to_string(), "disconnected");
        assert_eq!(ConnectionStatus::Error.to_string(), "error");
    }

    #[test]
    fn test_message_type_topics() {
        assert_eq!(
            MessageType::MentionUpdate.topic(),
            Some(SubscriptionKind::Location)
        );
        assert_eq!(
            MessageType::ReportUpdate.topic(),
            Some(SubscriptionKind::Report)
        );
        assert_eq!(MessageType::Alert.topic(), Some(SubscriptionKind::Global));
        assert_eq!(
            MessageType::SystemStatus.topic(),
            Some(SubscriptionKind::Global)
        );
        assert_eq!(MessageType::Unknown.topic(), None);
    }

    #[test]
    fn test_parse_inbound_alert() {
        let text = r#"{"type":"alert","data":{"level":"critical","message":"Flood warning"},"timestamp":"2026-03-01T10:00:00Z","id":"m-1"}"#;
        let msg = InboundMessage::parse(text).expect("alert should parse");
        assert_eq!(msg.message_type, MessageType::Alert);
        assert_eq!(msg.data["level"], "critical");
        assert_eq!(msg.id.as_deref(), Some("m-1"));
    }

    #[test]
    fn test_parse_unknown_type_is_not_an_error() {
        let msg = InboundMessage::parse(r#"{"type":"weather_digest","data":{}}"#)
            .expect("unknown types still parse");
        assert_eq!(msg.message_type, MessageType::Unknown);
        assert!(msg.timestamp.is_none());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(InboundMessage::parse("not json at all").is_err());
        assert!(InboundMessage::parse(r#"{"data":{}}"#).is_err());
        assert!(InboundMessage::parse(r#"[1,2,3]"#).is_err());
    }

    #[test]
    fn test_subscribe_location_frame_shape() {
        let id = SubscriptionId::from("sub_abc");
        let frame = OutboundFrame::subscribe(
            &id,
            &TopicParams::Location {
                lat: 13.08,
                lng: 80.27,
                radius_km: 5.0,
            },
        );
        let value: Value = serde_json::from_str(&frame.to_text().unwrap()).unwrap();
        assert_eq!(value["type"], "subscribe_location");
        assert_eq!(value["id"], "sub_abc");
        assert_eq!(value["data"]["lat"], 13.08);
        assert_eq!(value["data"]["lng"], 80.27);
        assert_eq!(value["data"]["radius"], 5.0);
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_unsubscribe_and_ping_frames() {
        let id = SubscriptionId::from("sub_xyz");
        let unsub: Value =
            serde_json::from_str(&OutboundFrame::unsubscribe(&id).to_text().unwrap()).unwrap();
        assert_eq!(unsub["type"], "unsubscribe");
        assert_eq!(unsub["data"]["subscriptionId"], "sub_xyz");

        let ping: Value = serde_json::from_str(&OutboundFrame::ping().to_text().unwrap()).unwrap();
        assert_eq!(ping["type"], "ping");
        assert_eq!(ping["data"], json!({}));
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        let a = SubscriptionId::generate();
        let b = SubscriptionId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("sub_"));
    }
}
