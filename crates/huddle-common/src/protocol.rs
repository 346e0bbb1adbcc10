//! Wire protocol spoken between room participants and the relay.
//!
//! Every frame is a JSON text message discriminated by `type`. Messages a
//! participant sends (`ClientMessage`) never carry a sender id; the relay
//! stamps `from` / `peerId` itself before forwarding (`RelayMessage`).

use serde::{Deserialize, Serialize};

use crate::errors::SignalingError;
use crate::id::PeerId;

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

/// A session description, shaped like the browser's `RTCSessionDescriptionInit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }

    /// Discards our outstanding local offer.
    pub fn rollback() -> Self {
        Self {
            sdp_type: SdpType::Rollback,
            sdp: String::new(),
        }
    }
}

/// A trickled ICE candidate, shaped like `RTCIceCandidateInit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_mline_index: Option<u16>,
}

/// One member of the roster delivered in `welcome`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: PeerId,
    pub name: String,
    #[serde(rename = "screenSharing", default)]
    pub screen_sharing: bool,
}

// ---------------------------------------------------------------------------
// Participant -> relay
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    RenameRequest {
        name: String,
    },
    Offer {
        to: PeerId,
        sdp: SessionDescription,
    },
    Answer {
        to: PeerId,
        sdp: SessionDescription,
    },
    IceCandidate {
        to: PeerId,
        candidate: IceCandidate,
    },
    MuteStatus {
        muted: bool,
    },
    CameraStatus {
        enabled: bool,
    },
    ScreenStart,
    ScreenStop,
    ScreenSubscribe {
        to: PeerId,
    },
    ScreenUnsubscribe {
        to: PeerId,
    },
    ScreenOffer {
        to: PeerId,
        sdp: SessionDescription,
    },
    ScreenAnswer {
        to: PeerId,
        sdp: SessionDescription,
    },
    ScreenIce {
        to: PeerId,
        candidate: IceCandidate,
    },
}

impl ClientMessage {
    pub fn decode(text: &str) -> Result<Self, SignalingError> {
        serde_json::from_str(text).map_err(|e| SignalingError::Parse(e.to_string()))
    }

    pub fn encode(&self) -> Result<String, SignalingError> {
        serde_json::to_string(self).map_err(|e| SignalingError::Parse(e.to_string()))
    }

    /// Stamp the sender onto a targeted message, producing the frame the
    /// destination receives. Returns the destination alongside it.
    ///
    /// Non-targeted kinds return `None`; the relay handles them itself.
    pub fn into_targeted(self, from: &str) -> Option<(PeerId, RelayMessage)> {
        let from = from.to_string();
        let routed = match self {
            ClientMessage::Offer { to, sdp } => (to.clone(), RelayMessage::Offer { from, to, sdp }),
            ClientMessage::Answer { to, sdp } => {
                (to.clone(), RelayMessage::Answer { from, to, sdp })
            }
            ClientMessage::IceCandidate { to, candidate } => (
                to.clone(),
                RelayMessage::IceCandidate {
                    from,
                    to,
                    candidate,
                },
            ),
            ClientMessage::ScreenSubscribe { to } => {
                (to.clone(), RelayMessage::ScreenSubscribe { from, to })
            }
            ClientMessage::ScreenUnsubscribe { to } => {
                (to.clone(), RelayMessage::ScreenUnsubscribe { from, to })
            }
            ClientMessage::ScreenOffer { to, sdp } => {
                (to.clone(), RelayMessage::ScreenOffer { from, to, sdp })
            }
            ClientMessage::ScreenAnswer { to, sdp } => {
                (to.clone(), RelayMessage::ScreenAnswer { from, to, sdp })
            }
            ClientMessage::ScreenIce { to, candidate } => (
                to.clone(),
                RelayMessage::ScreenIce {
                    from,
                    to,
                    candidate,
                },
            ),
            _ => return None,
        };
        Some(routed)
    }
}

// ---------------------------------------------------------------------------
// Relay -> participant
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RelayMessage {
    Welcome {
        #[serde(rename = "peerId")]
        peer_id: PeerId,
        name: String,
        peers: Vec<RosterEntry>,
    },
    Join {
        #[serde(rename = "peerId")]
        peer_id: PeerId,
        name: String,
    },
    Leave {
        #[serde(rename = "peerId")]
        peer_id: PeerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Rename {
        #[serde(rename = "peerId")]
        peer_id: PeerId,
        name: String,
    },
    Offer {
        from: PeerId,
        to: PeerId,
        sdp: SessionDescription,
    },
    Answer {
        from: PeerId,
        to: PeerId,
        sdp: SessionDescription,
    },
    IceCandidate {
        from: PeerId,
        to: PeerId,
        candidate: IceCandidate,
    },
    MuteStatus {
        #[serde(rename = "peerId")]
        peer_id: PeerId,
        muted: bool,
    },
    CameraStatus {
        #[serde(rename = "peerId")]
        peer_id: PeerId,
        enabled: bool,
    },
    ScreenStart {
        #[serde(rename = "peerId")]
        peer_id: PeerId,
    },
    ScreenStop {
        #[serde(rename = "peerId")]
        peer_id: PeerId,
    },
    ScreenSubscribe {
        from: PeerId,
        to: PeerId,
    },
    ScreenUnsubscribe {
        from: PeerId,
        to: PeerId,
    },
    ScreenOffer {
        from: PeerId,
        to: PeerId,
        sdp: SessionDescription,
    },
    ScreenAnswer {
        from: PeerId,
        to: PeerId,
        sdp: SessionDescription,
    },
    ScreenIce {
        from: PeerId,
        to: PeerId,
        candidate: IceCandidate,
    },
}

impl RelayMessage {
    pub fn decode(text: &str) -> Result<Self, SignalingError> {
        serde_json::from_str(text).map_err(|e| SignalingError::Parse(e.to_string()))
    }

    pub fn encode(&self) -> Result<String, SignalingError> {
        serde_json::to_string(self).map_err(|e| SignalingError::Parse(e.to_string()))
    }

    /// Whether this is one of the mesh negotiation kinds (`offer`, `answer`,
    /// `ice-candidate`).
    pub fn is_mesh_signal(&self) -> bool {
        matches!(
            self,
            RelayMessage::Offer { .. } | RelayMessage::Answer { .. } | RelayMessage::IceCandidate { .. }
        )
    }
}
