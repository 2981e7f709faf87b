//! Event and wire types shared with the connector sidecar.

use serde::{Deserialize, Serialize};

/// Low-level connection phase reported by the connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    Connecting,
    Open,
    Closed,
}

/// Disconnect reason code reported on `Closed` events.
///
/// Values follow the WhatsApp Web (Baileys) `DisconnectReason` status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisconnectCode(pub u16);

impl DisconnectCode {
    pub const BAD_SESSION: Self = Self(500);
    pub const CONNECTION_CLOSED: Self = Self(428);
    pub const CONNECTION_LOST: Self = Self(408);
    pub const CONNECTION_REPLACED: Self = Self(440);
    pub const FORBIDDEN: Self = Self(403);
    pub const LOGGED_OUT: Self = Self(401);
    pub const MULTIDEVICE_MISMATCH: Self = Self(411);
    pub const RESTART_REQUIRED: Self = Self(515);
    pub const TIMED_OUT: Self = Self(408);
    pub const UNAVAILABLE_SERVICE: Self = Self(503);
}

impl std::fmt::Display for DisconnectCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One connection-status event from the connector.
///
/// `disconnect` is only meaningful when `phase` is `Closed`; `pairing` may
/// accompany any phase while the account is waiting for a scan.
#[derive(Debug, Clone)]
pub struct ConnectionEvent {
    pub phase: ConnectionPhase,
    /// Fresh pairing code awaiting a scan, if the connector requested one.
    pub pairing: Option<String>,
    pub disconnect: Option<DisconnectCode>,
}

impl ConnectionEvent {
    pub fn open() -> Self {
        Self {
            phase: ConnectionPhase::Open,
            pairing: None,
            disconnect: None,
        }
    }

    pub fn connecting() -> Self {
        Self {
            phase: ConnectionPhase::Connecting,
            pairing: None,
            disconnect: None,
        }
    }

    pub fn closed(code: impl Into<Option<DisconnectCode>>) -> Self {
        Self {
            phase: ConnectionPhase::Closed,
            pairing: None,
            disconnect: code.into(),
        }
    }

    pub fn with_pairing(mut self, code: impl Into<String>) -> Self {
        self.pairing = Some(code.into());
        self
    }
}

/// Acknowledgment for a completed send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendAck {
    #[serde(rename = "messageId")]
    pub message_id: Option<String>,
}

/// Kind of outbound media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
        }
    }
}

/// Outbound media descriptor. The connector downloads `url` itself.
#[derive(Debug, Clone)]
pub struct OutboundMedia {
    pub kind: MediaKind,
    pub url: String,
    pub caption: Option<String>,
    /// Send audio as a voice note (push-to-talk).
    pub voice_note: bool,
    pub filename: Option<String>,
}

/// Group descriptor returned by `fetch_groups`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupInfo {
    pub id: String,
    pub subject: String,
    #[serde(default)]
    pub participants: u32,
}

/// Requests sent to the sidecar.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum WireRequest {
    Login {
        tenant: String,
        #[serde(rename = "authDir")]
        auth_dir: String,
    },
    Logout {
        tenant: String,
    },
    SendText {
        tenant: String,
        to: String,
        text: String,
        #[serde(rename = "requestId")]
        request_id: String,
    },
    SendMedia {
        tenant: String,
        to: String,
        #[serde(rename = "mediaUrl")]
        media_url: String,
        #[serde(rename = "mediaType")]
        media_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
        #[serde(rename = "voiceNote")]
        voice_note: bool,
        #[serde(rename = "fileName", skip_serializing_if = "Option::is_none")]
        file_name: Option<String>,
        #[serde(rename = "requestId")]
        request_id: String,
    },
    FetchGroups {
        tenant: String,
        #[serde(rename = "requestId")]
        request_id: String,
    },
}

/// Messages received from the sidecar.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum WireEvent {
    Connection {
        tenant: String,
        phase: ConnectionPhase,
        #[serde(rename = "pairingCode")]
        pairing_code: Option<String>,
        reason: Option<u16>,
    },
    SendResult {
        #[serde(rename = "requestId")]
        request_id: String,
        success: bool,
        #[serde(rename = "messageId")]
        message_id: Option<String>,
        error: Option<String>,
    },
    Groups {
        #[serde(rename = "requestId")]
        request_id: String,
        groups: Vec<GroupInfo>,
    },
    Error {
        tenant: Option<String>,
        error: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_request_uses_tagged_snake_case() {
        let req = WireRequest::SendText {
            tenant: "acme".into(),
            to: "628123@c.us".into(),
            text: "hi".into(),
            request_id: "r-1".into(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["type"], "send_text");
        assert_eq!(json["requestId"], "r-1");
    }

    #[test]
    fn wire_event_connection_roundtrip() {
        let json = r#"{
            "type": "connection",
            "tenant": "acme",
            "phase": "closed",
            "pairingCode": null,
            "reason": 401
        }"#;
        let ev: WireEvent = serde_json::from_str(json).unwrap();
        match ev {
            WireEvent::Connection { phase, reason, .. } => {
                assert_eq!(phase, ConnectionPhase::Closed);
                assert_eq!(reason, Some(401));
            },
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn media_kind_names() {
        assert_eq!(MediaKind::Image.as_str(), "image");
        assert_eq!(MediaKind::Document.as_str(), "document");
    }
}
